//! Cookie sessions

use std::time::Duration;

use moka::sync::Cache;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "promrules_session";

/// Session token to user ID. Sessions unused for `idle_timeout` expire.
pub struct SessionStore {
    sessions: Cache<String, i64>,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: u64) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    /// Open a session and return its token
    pub fn open(&self, user_id: i64) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        self.sessions.insert(token.clone(), user_id);
        token
    }

    /// User of a live session; counts as activity
    pub fn lookup(&self, token: &str) -> Option<i64> {
        self.sessions.get(token)
    }

    pub fn close(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }
}
