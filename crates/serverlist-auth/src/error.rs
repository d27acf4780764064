//! Unified error type for the authenticator.

use serverlist_auth_session::StoreError;
use serverlist_auth_status::StatusError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// Startup and the CLI deal with this single type; `?` converts the
/// sub-crate errors through the `#[from]` impls.
#[derive(Debug, thiserror::Error)]
pub enum ServerlistAuthError {
    /// The configuration file is missing, malformed or inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session store could not be built or could not answer.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The status query service failed to start.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// The log subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// A command-line argument was rejected.
    #[error("invalid argument: {0}")]
    Argument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Missing("database.url");
        let wrapped: ServerlistAuthError = err.into();
        assert!(matches!(wrapped, ServerlistAuthError::Config(_)));
        assert!(wrapped.to_string().contains("database.url"));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::Unavailable("connection refused".into());
        let wrapped: ServerlistAuthError = err.into();
        assert!(matches!(wrapped, ServerlistAuthError::Store(_)));
        assert!(wrapped.to_string().contains("connection refused"));
    }

    #[test]
    fn test_from_status_error() {
        let err = StatusError::Bind {
            addr: "0.0.0.0:8193".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        let wrapped: ServerlistAuthError = err.into();
        assert!(matches!(wrapped, ServerlistAuthError::Status(_)));
        assert!(wrapped.to_string().contains("8193"));
    }
}
