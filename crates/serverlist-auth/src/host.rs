//! The seam between the authenticator and a game server host.
//!
//! A host calls [`ConnectionHook::on_connect`] while a player is
//! logging in and acts on the [`HostVerdict`]: let them through, or
//! disconnect them with the given message. Hosts that keep no player
//! list of their own can use [`PresenceCounter`] to feed the status
//! query service.

use std::sync::atomic::{AtomicUsize, Ordering};

use serverlist_auth_gate::AdmissionResult;
use serverlist_auth_session::SessionStore;
use serverlist_auth_status::PlayerCounts;

use crate::ServerlistAuthenticator;

/// What the host should do with a connecting player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostVerdict {
    Admit,
    /// Disconnect the player. `code` is stable and meant for logs;
    /// `message` is meant for the player.
    Reject {
        code: &'static str,
        message: &'static str,
    },
}

impl HostVerdict {
    pub fn is_admit(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

impl From<AdmissionResult> for HostVerdict {
    fn from(result: AdmissionResult) -> Self {
        match result {
            AdmissionResult::Allowed | AdmissionResult::AllowedUnverified => Self::Admit,
            AdmissionResult::Denied(reason) => Self::Reject {
                code: reason.code(),
                message: reason.player_message(),
            },
        }
    }
}

/// Connection events a host reports.
pub trait ConnectionHook: Send + Sync + 'static {
    /// A player presented `token` while logging in.
    fn on_connect(
        &self,
        player: &str,
        token: &str,
    ) -> impl Future<Output = HostVerdict> + Send;

    /// An admitted player left. Only call this for players whose
    /// `on_connect` returned [`HostVerdict::Admit`].
    fn on_disconnect(&self, player: &str);
}

impl<S: SessionStore> ConnectionHook for ServerlistAuthenticator<S, PresenceCounter> {
    async fn on_connect(&self, player: &str, token: &str) -> HostVerdict {
        let verdict = HostVerdict::from(self.admit(player, token).await);
        if verdict.is_admit() {
            let online = self.counts().connected();
            tracing::debug!(player_id = player, online, "player joined");
        }
        verdict
    }

    fn on_disconnect(&self, player: &str) {
        let online = self.counts().disconnected();
        tracing::debug!(player_id = player, online, "player left");
    }
}

// ---------------------------------------------------------------------------
// PresenceCounter
// ---------------------------------------------------------------------------

/// Online player count kept from connect/disconnect events, with a
/// fixed capacity.
#[derive(Debug)]
pub struct PresenceCounter {
    online: AtomicUsize,
    capacity: usize,
}

impl PresenceCounter {
    pub fn new(capacity: usize) -> Self {
        Self {
            online: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Counts a join. Returns the new total.
    pub fn connected(&self) -> usize {
        self.online.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Counts a leave. Never goes below zero. Returns the new total.
    pub fn disconnected(&self) -> usize {
        match self
            .online
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }
}

impl PlayerCounts for PresenceCounter {
    fn online(&self) -> usize {
        self.online.load(Ordering::Relaxed)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
