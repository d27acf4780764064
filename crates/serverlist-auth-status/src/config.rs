//! Status service configuration.

use std::time::Duration;

/// Settings for a [`StatusServer`](crate::StatusServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Whether per-IP rate limiting is applied.
    pub enable_rate_limiting: bool,

    /// Requests each IP may make per rolling minute.
    pub max_requests_per_minute: usize,

    /// How long a client has to send its request line.
    pub read_timeout: Duration,

    /// Queries answered at once. Further clients wait their turn.
    pub max_concurrent: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8193".to_string(),
            enable_rate_limiting: true,
            max_requests_per_minute: 120,
            read_timeout: Duration::from_secs(5),
            max_concurrent: 10,
        }
    }
}
