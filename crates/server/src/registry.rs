use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use routegate_core::SessionId;
use routegate_mcp::{SessionTransport, ToolAdapter};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type SessionMap = HashMap<SessionId, Session>;

/// A live session. Only the registry constructs or drops these.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub transport: Arc<SessionTransport>,
    pub created_at: DateTime<Utc>,
}

/// Owner of every live session
pub struct SessionRegistry {
    sessions: Arc<RwLock<SessionMap>>,
    adapter: Arc<ToolAdapter>,
}

impl SessionRegistry {
    pub fn new(adapter: Arc<ToolAdapter>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            adapter,
        }
    }

    /// Allocate a session with a fresh id. The transport's close callback is
    /// wired to `remove` before the session becomes reachable.
    pub fn create(&self) -> (SessionId, Arc<SessionTransport>) {
        let mut sessions = self.sessions.write();

        let id = loop {
            let candidate = SessionId::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let transport = Arc::new(SessionTransport::new(id.clone(), self.adapter.clone()));
        let map = Arc::downgrade(&self.sessions);
        transport.on_close(move |id| remove_from(&map, id));

        sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                transport: transport.clone(),
                created_at: transport.created_at(),
            },
        );
        let live = sessions.len();
        drop(sessions);

        tracing::info!(session_id = %id, live, "Session created");
        (id, transport)
    }

    pub fn lookup(&self, id: &SessionId) -> Option<Arc<SessionTransport>> {
        self.get(id).map(|s| s.transport)
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    /// Forget a session. Unknown or already-removed ids are a no-op.
    ///
    /// Sessions normally leave through their transport's close callback.
    #[cfg(test)]
    pub fn remove(&self, id: &SessionId) -> bool {
        remove_entry(&self.sessions, id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn sessions(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// Close every session, e.g. on shutdown
    pub fn close_all(&self) -> usize {
        let sessions = self.sessions();
        for session in &sessions {
            session.transport.close();
        }
        if !sessions.is_empty() {
            tracing::info!(closed = sessions.len(), "Closed all sessions");
        }
        sessions.len()
    }

    /// Close sessions with no activity for `max_idle` and no attached stream
    pub fn close_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<_> = self
            .sessions()
            .into_iter()
            .filter(|s| !s.transport.has_stream() && s.transport.idle_for() >= max_idle)
            .collect();

        for session in &idle {
            let age = Utc::now() - session.created_at;
            tracing::info!(
                session_id = %session.id,
                idle_secs = session.transport.idle_for().as_secs(),
                age_secs = age.num_seconds(),
                "Closing idle session"
            );
            session.transport.close();
        }
        idle.len()
    }

    /// Spawn a task that closes idle sessions every `interval` until `shutdown`
    pub fn spawn_idle_sweeper(
        registry: &Arc<Self>,
        max_idle: Duration,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::downgrade(registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let closed = registry.close_idle(max_idle);
                if closed > 0 {
                    tracing::debug!(closed, "Idle session sweep");
                }
            }
        })
    }
}

fn remove_entry(sessions: &RwLock<SessionMap>, id: &SessionId) -> bool {
    let removed = sessions.write().remove(id).is_some();
    if removed {
        tracing::debug!(session_id = %id, "Session removed");
    }
    removed
}

fn remove_from(sessions: &Weak<RwLock<SessionMap>>, id: &SessionId) {
    if let Some(sessions) = sessions.upgrade() {
        remove_entry(&sessions, id);
    }
}
