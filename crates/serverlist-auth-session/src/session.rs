//! Session types: the data structures that describe a serverlist session.
//!
//! A "session" is the record an issuing authority leaves behind when a
//! player authorizes through the public server list. It tracks:
//! - WHO the session was issued to (`PlayerId`)
//! - WHAT the player must present to prove it (`SessionToken`)
//! - WHEN it was issued and when it stops being valid

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// The identity a player connects with.
///
/// Player identities are opaque strings handed to us by the host (a
/// username, a UUID, whatever the game server uses). Leading and trailing
/// whitespace is stripped so `" player42"` and `"player42"` are the same
/// player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Creates a player identity. Returns `None` for an empty (or
    /// whitespace-only) identity, which can never own a session.
    pub fn new(id: impl AsRef<str>) -> Option<Self> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionToken
// ---------------------------------------------------------------------------

/// An opaque bearer credential.
///
/// Anyone holding the token can claim the session, so the value never
/// appears in `Debug` output (and therefore never in logs).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps an existing token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a random 32-character hex token (128 bits of entropy).
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the raw token value.
    ///
    /// Only the validator and the stores should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A serverlist authorization issued to one player.
///
/// There is at most one session per player: stores key sessions by
/// `player_id`, and inserting a new one replaces the old.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Who the session was issued to.
    pub player_id: PlayerId,

    /// The secret the player presents when connecting.
    pub token: SessionToken,

    /// When the authority issued the session.
    pub issued_at: DateTime<Utc>,

    /// The first instant at which the session is no longer valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Issues a fresh session for `player_id` that lives for `ttl`,
    /// starting now. Generates a random token.
    pub fn issue(player_id: PlayerId, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or(chrono::Duration::MAX);
        Self {
            player_id,
            token: SessionToken::generate(),
            issued_at,
            expires_at: issued_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Returns `true` if the session is no longer valid at `now`.
    ///
    /// Expiry is inclusive: at exactly `expires_at` the session is dead.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_new_trims_whitespace() {
        let id = PlayerId::new("  player42 ").expect("valid id");
        assert_eq!(id.as_str(), "player42");
        assert_eq!(id.to_string(), "player42");
    }

    #[test]
    fn test_player_id_new_empty_returns_none() {
        assert!(PlayerId::new("").is_none());
        assert!(PlayerId::new("   ").is_none());
    }

    #[test]
    fn test_session_token_generate_is_32_hex_chars() {
        let token = SessionToken::generate();
        assert_eq!(token.expose().len(), 32);
        assert!(token.expose().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_token_generate_is_unique() {
        assert_ne!(SessionToken::generate(), SessionToken::generate());
    }

    #[test]
    fn test_session_token_debug_redacts_value() {
        let token = SessionToken::new("abc123");
        let printed = format!("{token:?}");
        assert!(!printed.contains("abc123"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn test_session_is_expired_at_boundary_is_expired() {
        let player = PlayerId::new("p").unwrap();
        let session = Session::issue(player, Duration::from_secs(60));

        assert!(!session.is_expired_at(session.issued_at));
        assert!(session.is_expired_at(session.expires_at));
        assert!(session.is_expired_at(
            session.expires_at + chrono::Duration::seconds(1)
        ));
    }

    #[test]
    fn test_session_issue_sets_expiry_from_ttl() {
        let player = PlayerId::new("p").unwrap();
        let session = Session::issue(player, Duration::from_secs(3600));
        assert_eq!(
            session.expires_at - session.issued_at,
            chrono::Duration::seconds(3600)
        );
    }
}
