//! `ServerlistAuthenticator`: startup, the admission callback, and
//! shutdown.
//!
//! This ties the layers together: configuration → session backend →
//! admission gate, plus the optional status query service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serverlist_auth_gate::{AdmissionGate, AdmissionResult, ConnectionAttempt, DenyReason};
use serverlist_auth_session::{PlayerId, SessionStore};
use serverlist_auth_status::{
    PlayerCounts, StatusConfig, StatusError, StatusHandle, StatusServer,
};
use tokio::task::JoinHandle;

use crate::ServerlistAuthError;
use crate::backend::SessionBackend;
use crate::config::AuthConfig;
use crate::host::PresenceCounter;

/// A running status query service.
struct StatusService {
    addr: SocketAddr,
    handle: StatusHandle,
    task: JoinHandle<()>,
}

impl StatusService {
    async fn spawn<P: PlayerCounts>(
        config: StatusConfig,
        counts: Arc<P>,
    ) -> Result<Self, StatusError> {
        let bind_addr = config.bind_addr.clone();
        let server = StatusServer::bind(config, counts).await?;
        let addr = server
            .local_addr()
            .map_err(|source| StatusError::Bind { addr: bind_addr, source })?;
        let handle = server.handle();
        let task = tokio::spawn(server.run());
        Ok(Self { addr, handle, task })
    }

    async fn stop(self) {
        self.handle.shutdown();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "status query task ended abnormally");
        }
    }
}

/// The authenticator a host embeds.
///
/// Built once at startup, shared across connection handlers (it is
/// `Sync`), and stopped with [`shutdown`](Self::shutdown).
///
/// `S` is the session store and `P` supplies player counts to the
/// status query service. Production use is
/// `ServerlistAuthenticator<SessionBackend, _>` via [`start`](Self::start).
pub struct ServerlistAuthenticator<
    S: SessionStore = SessionBackend,
    P: PlayerCounts = PresenceCounter,
> {
    gate: Arc<AdmissionGate<S>>,
    counts: Arc<P>,
    status: Option<StatusService>,
}

impl<P: PlayerCounts> ServerlistAuthenticator<SessionBackend, P> {
    /// Builds the configured backend and starts everything.
    ///
    /// An unreachable database is logged, not fatal: checks report
    /// unavailable until it comes back.
    pub async fn start(
        config: &AuthConfig,
        counts: Arc<P>,
    ) -> Result<Self, ServerlistAuthError> {
        tracing::info!("serverlist authenticator setting up");
        config.validate()?;

        let backend = SessionBackend::from_config(config)?;
        if let Err(e) = backend.ping().await {
            tracing::warn!(
                error = %e,
                backend = backend.kind(),
                "session store not reachable at startup"
            );
        }
        Self::with_store(Arc::new(backend), config, counts).await
    }
}

impl<S: SessionStore, P: PlayerCounts> ServerlistAuthenticator<S, P> {
    /// Starts the authenticator over an already-built store. Only the
    /// gate and status sections of `config` are used.
    pub async fn with_store(
        store: Arc<S>,
        config: &AuthConfig,
        counts: Arc<P>,
    ) -> Result<Self, ServerlistAuthError> {
        let gate_config = config.gate_config();
        let outage_policy = gate_config.outage_policy;
        let gate = Arc::new(AdmissionGate::new(store, gate_config));

        let status = if config.status.enabled {
            let status_config = config.status.to_status_config();
            Some(StatusService::spawn(status_config, Arc::clone(&counts)).await?)
        } else {
            tracing::info!("status query service disabled");
            None
        };

        tracing::info!(
            %outage_policy,
            max_in_flight = gate.max_in_flight(),
            status_addr = ?status.as_ref().map(|s| s.addr),
            "serverlist authenticator started"
        );
        Ok(Self { gate, counts, status })
    }

    /// Decides whether `player` presenting `token` may connect.
    ///
    /// A blank player id can't own a session, so it is denied as an
    /// invalid credential without touching the store.
    pub async fn admit(&self, player: &str, token: &str) -> AdmissionResult {
        match PlayerId::new(player) {
            Some(player_id) => {
                self.gate
                    .check(ConnectionAttempt::new(player_id, token))
                    .await
            }
            None => blank_player(),
        }
    }

    /// Like [`admit`](Self::admit), but finishes within `budget` (the
    /// time the host has left before it gives up on the login).
    pub async fn admit_within(
        &self,
        player: &str,
        token: &str,
        budget: Duration,
    ) -> AdmissionResult {
        match PlayerId::new(player) {
            Some(player_id) => {
                self.gate
                    .check_within(ConnectionAttempt::new(player_id, token), budget)
                    .await
            }
            None => blank_player(),
        }
    }

    /// The admission gate.
    pub fn gate(&self) -> &Arc<AdmissionGate<S>> {
        &self.gate
    }

    /// The player count source given at startup.
    pub fn counts(&self) -> &Arc<P> {
        &self.counts
    }

    /// Where the status query service listens, if it is enabled.
    pub fn status_addr(&self) -> Option<SocketAddr> {
        self.status.as_ref().map(|s| s.addr)
    }

    /// Stops the status query service and releases the session store.
    pub async fn shutdown(self) {
        tracing::info!("serverlist authenticator shutting down");
        if let Some(status) = self.status {
            status.stop().await;
        }
        self.gate.store().close().await;

        let metrics = self.gate.metrics();
        tracing::info!(
            checks = metrics.checks,
            allowed = metrics.allowed,
            denied_credential = metrics.denied_credential,
            denied_unavailable = metrics.denied_unavailable,
            "serverlist authenticator stopped"
        );
    }
}

fn blank_player() -> AdmissionResult {
    tracing::info!(reason = %DenyReason::InvalidCredential, "connection denied: blank player id");
    AdmissionResult::Denied(DenyReason::InvalidCredential)
}
