// Response cache with per-entry expiry
//
// Entries are never swept eagerly: an access past expiry is treated as a
// miss and the stale entry is dropped on the spot. `purge_expired` exists for
// an optional background sweep.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past what the clock can represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(at) => now < at,
            None => true,
        }
    }
}

/// Key/value store with lazy TTL expiry.
///
/// The lock is held only for map access and never across an `.await`, so two
/// callers missing on the same key may both run their compute future. The
/// later write wins.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live value, discarding the entry if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        entries.remove(key);
        tracing::trace!(key, "Cache entry expired");
        None
    }

    /// Store a value, replacing any previous value and expiry for the key
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.lock().insert(key.into(), entry);
    }

    /// Drop a key. Returns whether an entry (live or stale) was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Return the cached value, or run `compute` and cache its result for `ttl`.
    ///
    /// Errors from `compute` are returned as-is and nothing is stored.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!(key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(key, ttl_secs = ttl.as_secs(), "Cache miss");
        let value = compute().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including stale ones not yet discarded
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently stored under a namespace prefix
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Spawn a task that purges expired entries every `interval`
    pub fn spawn_sweeper(cache: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired cache entries");
                }
            }
        })
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// TTLs by data volatility. Live state has no TTL because it is never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Chain list and resolved token metadata
    pub reference_ttl: Duration,
    /// Token lists, tools and connections
    pub listing_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            reference_ttl: Duration::from_secs(24 * 60 * 60),
            listing_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Cache key builders. Each operation owns a namespace prefix so unrelated
/// lookups never collide and the cache can be inspected by prefix.
pub struct CacheKey;

impl CacheKey {
    pub const CHAINS: &'static str = "chains";
    pub const TOKENS: &'static str = "tokens";
    pub const TOKEN: &'static str = "token";
    pub const TOOLS: &'static str = "tools";
    pub const CONNECTIONS: &'static str = "connections";

    pub fn chains() -> String {
        Self::CHAINS.to_string()
    }

    pub fn tokens(chains: Option<&[String]>, chain_types: Option<&str>) -> String {
        match chain_types {
            Some(types) => format!("{}:{}:{}", Self::TOKENS, join_or_all(chains), types),
            None => format!("{}:{}", Self::TOKENS, join_or_all(chains)),
        }
    }

    pub fn token(chain: &str, token: &str) -> String {
        format!("{}:{}-{}", Self::TOKEN, chain, token)
    }

    pub fn tools(chains: Option<&[String]>) -> String {
        format!("{}:{}", Self::TOOLS, join_or_all(chains))
    }

    pub fn connections(parts: &[Option<&str>]) -> String {
        let discriminator = parts
            .iter()
            .map(|p| p.unwrap_or("*"))
            .collect::<Vec<_>>()
            .join("-");
        format!("{}:{}", Self::CONNECTIONS, discriminator)
    }
}

// `*` is never a chain id or key, so an unfiltered lookup cannot share an
// entry with a filter such as `["all"]`
fn join_or_all(chains: Option<&[String]>) -> String {
    match chains {
        Some(chains) if !chains.is_empty() => chains.join(","),
        _ => "*".to_string(),
    }
}
