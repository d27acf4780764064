//! In-process session store for tests and local development.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{PlayerId, Session, SessionStore, StoreError};

/// A [`SessionStore`] backed by a `HashMap`.
///
/// Never fails. Sessions vanish when the process exits.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<PlayerId, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `session`, replacing any existing session for the same
    /// player.
    pub async fn insert(&self, session: Session) {
        tracing::debug!(player_id = %session.player_id, "session stored");
        self.sessions
            .write()
            .await
            .insert(session.player_id.clone(), session);
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn lookup(
        &self,
        player: &PlayerId,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(player).cloned())
    }

    async fn invalidate(&self, player: &PlayerId) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(player).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}
