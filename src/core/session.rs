//! Per-caller expansion sessions
//!
//! A session holds the set of tools whose original description the caller
//! asked to see. Sessions are kept alive by access and reaped by a
//! background sweep once they have been idle longer than the inactivity
//! window.

use crate::config::SessionConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One caller's expansion state
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Instant,
    pub expanded_tools: HashSet<(String, String)>,
}

impl Session {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
            last_accessed_at: Instant::now(),
            expanded_tools: HashSet::new(),
        }
    }

    fn touch(&mut self) {
        self.last_accessed_at = Instant::now();
    }

    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_accessed_at) > window
    }

    pub fn is_expanded(&self, backend: &str, tool: &str) -> bool {
        self.expanded_tools
            .contains(&(backend.to_string(), tool.to_string()))
    }
}

/// Session store timing
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Idle time after which a session is reaped
    pub inactivity_timeout: Duration,
    /// How often the sweep runs
    pub sweep_interval: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl From<&SessionConfig> for SessionStoreConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(config.inactivity_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }
}

/// Session id -> expansion state, with background expiry
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    config: SessionStoreConfig,
    sweep_token: CancellationToken,
}

impl SessionStore {
    /// Create a store with default timing and start its sweep.
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        Self::with_config(SessionStoreConfig::default())
    }

    pub fn with_config(config: SessionStoreConfig) -> Self {
        let store = Self {
            sessions: Arc::new(DashMap::new()),
            config,
            sweep_token: CancellationToken::new(),
        };

        store.start_sweep_task();

        store
    }

    fn start_sweep_task(&self) {
        let sessions = self.sessions.clone();
        let window = self.config.inactivity_timeout;
        let period = self.config.sweep_interval;
        let token = self.sweep_token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Session sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweep(&sessions, window);
                    }
                }
            }
        });
    }

    /// Create a new session and return its id
    pub fn create(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .insert(session_id.clone(), Session::new(session_id.clone()));
        debug!("Created session {}", session_id);
        session_id
    }

    /// Fetch a session, refreshing its last access time
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get_mut(session_id).map(|mut session| {
            session.touch();
            session.clone()
        })
    }

    /// Existence check without refreshing the session
    pub fn has(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!("Deleted session {}", session_id);
        }
        removed
    }

    /// Mark a tool as expanded. Returns false when the session does not exist.
    pub fn expand(&self, session_id: &str, backend: &str, tool: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session
                    .expanded_tools
                    .insert((backend.to_string(), tool.to_string()));
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Unmark a tool. Returns whether it was expanded.
    pub fn collapse(&self, session_id: &str, backend: &str, tool: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                let removed = session
                    .expanded_tools
                    .remove(&(backend.to_string(), tool.to_string()));
                if removed {
                    session.touch();
                }
                removed
            }
            None => false,
        }
    }

    /// Whether a tool is expanded in the given session.
    /// A missing session id is never expanded and touches nothing.
    pub fn is_expanded(&self, session_id: Option<&str>, backend: &str, tool: &str) -> bool {
        let Some(session_id) = session_id else {
            return false;
        };

        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.touch();
                session.is_expanded(backend, tool)
            }
            None => false,
        }
    }

    /// Run one expiry pass now. Returns the number of sessions removed.
    pub fn sweep_expired(&self) -> usize {
        sweep(&self.sessions, self.config.inactivity_timeout)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop the sweep and drop every session
    pub fn destroy(&self) {
        self.sweep_token.cancel();
        let count = self.sessions.len();
        self.sessions.clear();
        info!("Session store destroyed ({} sessions dropped)", count);
    }
}

fn sweep(sessions: &DashMap<String, Session>, window: Duration) -> usize {
    let now = Instant::now();
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_idle(now, window));
    let removed = before.saturating_sub(sessions.len());

    if removed > 0 {
        debug!(
            "Session sweep: removed {} idle sessions, {} remaining",
            removed,
            sessions.len()
        );
    }

    removed
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.sweep_token.cancel();
    }
}
