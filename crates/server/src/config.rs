use anyhow::{ensure, Context, Result};
use clap::Parser;
use routegate_core::{CachePolicy, TtlCache, UpstreamApi, UpstreamConfig, DEFAULT_BASE_URL};
use routegate_mcp::ToolAdapter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::registry::SessionRegistry;

#[derive(Parser, Debug)]
#[command(name = "routegate")]
#[command(about = "MCP gateway for cross-chain quotes, routes and balances", long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "ROUTEGATE_CONFIG", default_value = "routegate.toml")]
    pub config: PathBuf,

    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// API key sent to the upstream service
    #[arg(long, env = "UPSTREAM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Integrator identity reported to the upstream service
    #[arg(long, env = "UPSTREAM_INTEGRATOR")]
    pub integrator: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub upstream: UpstreamSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub sessions: SessionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_reference_ttl_secs")]
    pub reference_ttl_secs: u64,

    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,

    /// Background purge of expired entries; off when absent
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

fn default_reference_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_listing_ttl_secs() -> u64 {
    5 * 60
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            reference_ttl_secs: default_reference_ttl_secs(),
            listing_ttl_secs: default_listing_ttl_secs(),
            sweep_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Sessions with no activity for this long are closed
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_session_sweep_secs")]
    pub sweep_interval_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

fn default_session_sweep_secs() -> u64 {
    60
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: default_session_sweep_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if !config_path.exists() {
            tracing::info!(path = %config_path.display(), "Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path).context("Failed to read configuration file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the background tasks cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.sessions.sweep_interval_secs > 0,
            "sessions.sweep_interval_secs must be greater than zero"
        );
        ensure!(
            self.cache.sweep_interval_secs != Some(0),
            "cache.sweep_interval_secs must be greater than zero when set"
        );
        Ok(())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            reference_ttl: Duration::from_secs(self.cache.reference_ttl_secs),
            listing_ttl: Duration::from_secs(self.cache.listing_ttl_secs),
        }
    }

    /// Upstream client settings; credentials come from the command line or env
    pub fn upstream_config(&self, args: &Args) -> Result<UpstreamConfig> {
        let config = UpstreamConfig::parse(&self.upstream.base_url)
            .with_context(|| format!("Invalid upstream base_url: {}", self.upstream.base_url))?;

        Ok(config
            .with_api_key(args.api_key.clone())
            .with_integrator(args.integrator.clone())
            .with_timeout(Duration::from_secs(self.upstream.timeout_secs)))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.sessions.idle_timeout_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.sweep_interval_secs)
    }

    pub fn cache_sweep_interval(&self) -> Option<Duration> {
        self.cache.sweep_interval_secs.map(Duration::from_secs)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub adapter: Arc<ToolAdapter>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(upstream: Arc<dyn UpstreamApi>, policy: CachePolicy) -> Self {
        let cache: Arc<TtlCache<Value>> = Arc::new(TtlCache::new());
        let adapter = Arc::new(ToolAdapter::new(upstream, cache, policy));
        let registry = Arc::new(SessionRegistry::new(adapter.clone()));

        Self {
            registry,
            adapter,
            started_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.cache_policy(), CachePolicy::default());
        assert_eq!(config.cache_sweep_interval(), None);
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_partial_sections() {
        let config = ServerConfig::from_toml(
            r#"
            [upstream]
            base_url = "https://staging.example.com/api/"

            [cache]
            listing_ttl_secs = 60
            sweep_interval_secs = 300

            [sessions]
            idle_timeout_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.cache_policy().listing_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_policy().reference_ttl, Duration::from_secs(86_400));
        assert_eq!(config.cache_sweep_interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.idle_timeout(), Duration::from_secs(120));
        assert_eq!(config.session_sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_upstream_config_takes_credentials_from_args() {
        let args = Args::parse_from([
            "routegate",
            "--api-key",
            "secret",
            "--integrator",
            "acme",
        ]);
        let upstream = ServerConfig::default().upstream_config(&args).unwrap();

        assert_eq!(upstream.api_key.as_deref(), Some("secret"));
        assert_eq!(upstream.integrator.as_deref(), Some("acme"));
        assert_eq!(upstream.base_url.as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = ServerConfig::from_toml("[upstream]\nbase_url = \"not a url\"").unwrap();
        let args = Args::parse_from(["routegate"]);
        assert!(config.upstream_config(&args).is_err());
    }

    #[test]
    fn test_zero_sweep_intervals_rejected() {
        let err = ServerConfig::from_toml("[sessions]\nsweep_interval_secs = 0").unwrap_err();
        assert!(err.to_string().contains("sessions.sweep_interval_secs"));

        let err = ServerConfig::from_toml("[cache]\nsweep_interval_secs = 0").unwrap_err();
        assert!(err.to_string().contains("cache.sweep_interval_secs"));

        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_huge_ttl_accepted() {
        let config = ServerConfig::from_toml(&format!(
            "[cache]\nreference_ttl_secs = {max}\nlisting_ttl_secs = {max}",
            max = i64::MAX
        ))
        .unwrap();

        let cache = TtlCache::new();
        cache.insert("chains", 1u8, config.cache_policy().reference_ttl);
        assert_eq!(cache.get("chains"), Some(1));
    }

    #[test]
    fn test_unknown_toml_type_is_error() {
        assert!(ServerConfig::from_toml("[cache]\nlisting_ttl_secs = \"soon\"").is_err());
    }
}
