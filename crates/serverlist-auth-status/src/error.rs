//! Error types for the status query service.

/// Errors that stop the status service from running.
///
/// Problems with individual clients (timeouts, garbage input, resets)
/// are logged and the socket closed; they never surface here.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// The listening socket couldn't be opened.
    #[error("failed to bind status query service to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
