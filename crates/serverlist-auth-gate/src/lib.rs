//! Admission gate for serverlist authentication.
//!
//! The host reports each connection attempt; the gate answers allow or
//! deny. Denials always say *why*, and "our database is down" is never
//! reported as "your credential is bad".
//!
//! # Key types
//!
//! - [`AdmissionGate`]: runs checks, bounded in concurrency and time
//! - [`ConnectionAttempt`]: the input
//! - [`AdmissionResult`] / [`DenyReason`]: the output
//! - [`AdmissionState`]: per-attempt state machine
//! - [`GateConfig`] / [`OutagePolicy`]: fail-open or fail-closed

mod attempt;
mod config;
mod decision;
mod gate;
mod metrics;

pub use attempt::ConnectionAttempt;
pub use config::{GateConfig, OutagePolicy, UnknownPolicy};
pub use decision::{AdmissionResult, AdmissionState, DenyReason};
pub use gate::AdmissionGate;
pub use metrics::GateMetricsSnapshot;
