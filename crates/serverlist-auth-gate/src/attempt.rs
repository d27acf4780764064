//! The input to one admission check.

use chrono::{DateTime, Utc};
use serverlist_auth_session::{PlayerId, SessionToken};

/// A player trying to connect, as reported by the host.
///
/// Lives for exactly one admission check and is never stored.
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    /// Who the player claims to be.
    pub player_id: PlayerId,
    /// The serverlist session token they presented.
    pub token: SessionToken,
    /// When the host saw the connection. Expiry is judged against this
    /// instant, not against when validation happens to run.
    pub at: DateTime<Utc>,
}

impl ConnectionAttempt {
    /// Creates an attempt stamped with the current time.
    pub fn new(player_id: PlayerId, token: impl Into<String>) -> Self {
        Self::at(player_id, token, Utc::now())
    }

    /// Creates an attempt stamped with `at`.
    pub fn at(
        player_id: PlayerId,
        token: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id,
            token: SessionToken::new(token.into()),
            at,
        }
    }
}
