//! # Serverlist Auth
//!
//! Admission control for game servers listed on a server list.
//!
//! Players join through the server list, which issues them a session.
//! When they then connect to the game server, the host asks
//! [`ServerlistAuthenticator::admit`] whether their session is real and
//! current. Sessions live in PostgreSQL behind a bounded connection
//! pool (or at a remote validation authority), and an unreachable store
//! is always reported as such, never as a bad credential.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serverlist_auth::prelude::*;
//!
//! # async fn run() -> Result<(), ServerlistAuthError> {
//! let config = AuthConfig::load("serverlist-auth.toml")?;
//! let auth = ServerlistAuthenticator::start(&config, Arc::new(PresenceCounter::new(100))).await?;
//!
//! match auth.on_connect("player42", "abc123").await {
//!     HostVerdict::Admit => { /* continue the login */ }
//!     HostVerdict::Reject { message, .. } => { /* disconnect with `message` */ }
//! }
//!
//! auth.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - [`serverlist_auth_session`]: sessions, stores, credential validation
//! - [`serverlist_auth_gate`]: allow/deny decisions under a deadline
//! - [`serverlist_auth_status`]: the `QUERY` player-count service

pub mod backend;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod runtime;

pub use backend::SessionBackend;
pub use config::{AuthConfig, ConfigError};
pub use error::ServerlistAuthError;
pub use host::{ConnectionHook, HostVerdict, PresenceCounter};
pub use runtime::ServerlistAuthenticator;

pub use serverlist_auth_gate;
pub use serverlist_auth_session;
pub use serverlist_auth_status;

/// Everything a host typically needs.
pub mod prelude {
    pub use crate::{
        AuthConfig, ConfigError, ConnectionHook, HostVerdict, PresenceCounter,
        ServerlistAuthError, ServerlistAuthenticator, SessionBackend,
    };
    pub use serverlist_auth_gate::{AdmissionResult, DenyReason, OutagePolicy};
    pub use serverlist_auth_session::{PlayerId, Session, SessionStore, SessionToken};
    pub use serverlist_auth_status::PlayerCounts;
}
