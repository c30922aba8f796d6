use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::browser::BrowserManager;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::page::PageSnapshot;

/// One browser page and its most recent capture
pub struct Session {
    pub browser: Arc<BrowserManager>,
    pub url: String,
    pub snapshot: Arc<PageSnapshot>,
    pub captured_at: DateTime<Utc>,
}

/// Shared application state
pub struct AppState {
    /// Active sessions: session_id -> session
    pub sessions: DashMap<String, Session>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Current snapshot of a session, without holding the map entry
    pub fn snapshot(&self, session_id: &str) -> AppResult<Arc<PageSnapshot>> {
        self.sessions
            .get(session_id)
            .map(|s| Arc::clone(&s.snapshot))
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
    }

    pub fn browser(&self, session_id: &str) -> AppResult<Arc<BrowserManager>> {
        self.sessions
            .get(session_id)
            .map(|s| Arc::clone(&s.browser))
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
    }

    /// Swap in a fresh capture; false if the session was closed meanwhile
    pub fn replace_snapshot(&self, session_id: &str, snapshot: Arc<PageSnapshot>) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.snapshot = snapshot;
                session.captured_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
