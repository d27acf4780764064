//! The storage seam between validation and wherever sessions live.
//!
//! The validator doesn't care whether sessions come from PostgreSQL, an
//! HTTP authority, or a `HashMap` in a test. It only needs something
//! that implements [`SessionStore`].

use chrono::{DateTime, Utc};

use crate::{PlayerId, Session, StoreError};

/// Looks up and invalidates serverlist sessions.
///
/// # Trait bounds
///
/// - `Send + Sync` → one store is shared by every concurrent admission
///   check.
/// - `'static` → the store lives as long as the plugin.
///
/// # Contract
///
/// - `Ok(None)` means the backend answered and there is no session.
/// - `Err(_)` means the backend could not answer. Implementations must
///   never turn a backend failure into `Ok(None)`.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the session issued to `player`, if any.
    ///
    /// Expired sessions are still returned; deciding what expiry means
    /// is the validator's job.
    fn lookup(
        &self,
        player: &PlayerId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Removes the session for `player` (forced logout).
    ///
    /// Returns `true` if a session was removed.
    fn invalidate(
        &self,
        player: &PlayerId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes every session that is expired at `now`.
    ///
    /// Returns the number of sessions removed.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Releases pooled resources. Later operations fail with
    /// [`StoreError::Unavailable`]. Stores holding nothing use the
    /// default no-op.
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
