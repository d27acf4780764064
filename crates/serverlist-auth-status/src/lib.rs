//! Status query service for server lists.
//!
//! Server lists poll each game server for its player count. This crate
//! answers those polls over a one-line TCP protocol (`QUERY` →
//! `OK <online> <max>`), with per-IP rate limiting so a misbehaving
//! poller can't hog the service.
//!
//! # Key types
//!
//! - [`StatusServer`] / [`StatusHandle`]: listener and its stop switch
//! - [`PlayerCounts`]: implemented by the host to supply the numbers
//! - [`RateLimiter`]: per-IP rolling-minute limit
//! - [`StatusConfig`]: port, limits, timeouts

mod config;
mod error;
mod limiter;
mod server;

pub use config::StatusConfig;
pub use error::StatusError;
pub use limiter::RateLimiter;
pub use server::{PlayerCounts, Reply, StatusHandle, StatusServer};
