//! Server-side session storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::SessionResult;
use crate::identity::SessionIdentity;
use crate::state::SessionAuthState;

/// Generates an opaque session id for the session cookie.
#[must_use]
pub fn new_session_id() -> String {
    da_crypto::random::generate_session_id()
}

/// Storage for session state, keyed by session id.
///
/// Implementations may keep state in memory or in a shared cache. Unknown
/// ids load as [`SessionAuthState::Anonymous`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the state of a session.
    async fn load(&self, id: &str) -> SessionResult<SessionAuthState>;

    /// Stores the state of a session. Saving an anonymous state removes it.
    async fn save(&self, id: &str, state: &SessionAuthState) -> SessionResult<()>;

    /// Removes a session.
    async fn remove(&self, id: &str) -> SessionResult<()>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionIdentity>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drops every session that has expired at `now`. Returns how many.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, identity| !identity.is_expired_at(now));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "purged expired sessions");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> SessionResult<SessionAuthState> {
        Ok(self
            .sessions
            .read()
            .get(id)
            .cloned()
            .map_or(SessionAuthState::Anonymous, SessionAuthState::Authenticated))
    }

    async fn save(&self, id: &str, state: &SessionAuthState) -> SessionResult<()> {
        let mut sessions = self.sessions.write();
        match state.identity() {
            Some(identity) => {
                sessions.insert(id.to_string(), identity.clone());
            }
            None => {
                sessions.remove(id);
            }
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> SessionResult<()> {
        self.sessions.write().remove(id);
        Ok(())
    }
}
