//! Credential validation: does this player hold a live serverlist session?
//!
//! The validator asks a [`SessionStore`] for the player's session and
//! checks two things:
//!
//! 1. The presented token matches the stored one.
//! 2. The session hasn't expired.
//!
//! It answers with a three-way [`Validation`], not a `bool`. "The store
//! is down" is a different answer from "the token is wrong", and the
//! admission gate needs to tell them apart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::{PlayerId, Session, SessionStore, StoreError};

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Why a credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// No session exists for this player.
    UnknownPlayer,
    /// A session exists but the presented token is not its token.
    TokenMismatch,
    /// The session's expiry time has passed.
    Expired,
    /// The store returned a session issued to someone else.
    WrongPlayer,
}

/// The outcome of a single validation.
#[derive(Debug, Clone)]
pub enum Validation {
    /// The player holds a live session and presented its token.
    Valid(Session),
    /// The credential is bad. The player can fix this by
    /// re-authenticating with the server list.
    Invalid(InvalidReason),
    /// The store couldn't answer. Says nothing about the credential.
    Unavailable(StoreError),
}

impl Validation {
    /// Returns `true` for [`Validation::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

// ---------------------------------------------------------------------------
// CredentialValidator
// ---------------------------------------------------------------------------

/// Checks presented tokens against stored sessions.
///
/// Holds no per-request state, so one validator serves every concurrent
/// admission check.
pub struct CredentialValidator<S: SessionStore> {
    store: Arc<S>,
}

impl<S: SessionStore> CredentialValidator<S> {
    /// Creates a validator over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The store this validator reads from.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validates `presented` for `player` as of now.
    pub async fn validate(&self, player: &PlayerId, presented: &str) -> Validation {
        self.validate_at(player, presented, Utc::now()).await
    }

    /// Validates `presented` for `player` as of `now`.
    ///
    /// Expiry is checked even when the token is wrong, and the token is
    /// checked even when the session is expired, so the work done does
    /// not depend on which check fails.
    pub async fn validate_at(
        &self,
        player: &PlayerId,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Validation {
        let session = match self.store.lookup(player).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!(player_id = %player, "no session for player");
                return Validation::Invalid(InvalidReason::UnknownPlayer);
            }
            Err(err) => return Validation::Unavailable(err),
        };

        if session.player_id != *player {
            tracing::warn!(
                player_id = %player,
                session_player = %session.player_id,
                "store returned a session for a different player"
            );
            return Validation::Invalid(InvalidReason::WrongPlayer);
        }

        let token_ok = tokens_match(presented, session.token.expose());
        let expired = session.is_expired_at(now);

        match (token_ok, expired) {
            (_, true) => Validation::Invalid(InvalidReason::Expired),
            (false, false) => Validation::Invalid(InvalidReason::TokenMismatch),
            (true, false) => Validation::Valid(session),
        }
    }
}

impl<S: SessionStore> Clone for CredentialValidator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Compares two tokens in time independent of where they differ.
///
/// Both sides are hashed first so the comparison always runs over two
/// 32-byte digests: a length difference or a shared prefix takes exactly
/// as long as a full match.
fn tokens_match(presented: &str, stored: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let stored = Sha256::digest(stored.as_bytes());
    let diff = presented
        .iter()
        .zip(stored.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    std::hint::black_box(diff) == 0
}
