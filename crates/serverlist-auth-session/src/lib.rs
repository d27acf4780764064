//! Serverlist sessions: where they live and how they are checked.
//!
//! This crate covers the two lower layers of the authenticator:
//!
//! 1. **Storage**: the [`SessionStore`] trait and its implementations:
//!    [`PgSessionStore`] (pooled PostgreSQL), [`AuthorityStore`] (remote
//!    validation authority), [`MemorySessionStore`] (tests, local dev)
//! 2. **Validation**: [`CredentialValidator`], which turns a lookup into
//!    a three-way [`Validation`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Admission Gate (above)  ← maps a Validation to allow/deny
//!     ↕
//! Session Layer (this crate)  ← validator + stores
//!     ↕
//! PostgreSQL / validation authority (below)
//! ```

#![allow(async_fn_in_trait)]

mod authority;
mod error;
mod memory;
mod metrics;
mod postgres;
mod session;
mod store;
mod validator;

pub use authority::AuthorityStore;
pub use error::StoreError;
pub use memory::MemorySessionStore;
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
pub use postgres::{PgSessionStore, PoolSettings, PoolStatus};
pub use session::{PlayerId, Session, SessionToken};
pub use store::SessionStore;
pub use validator::{CredentialValidator, InvalidReason, Validation};
