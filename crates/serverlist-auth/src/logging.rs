//! Log subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::ServerlistAuthError;
use crate::config::LoggingSettings;

/// Installs the global subscriber. `RUST_LOG`, when set, replaces the
/// configured level. Output goes to stderr; stdout is left to the CLI.
///
/// # Errors
/// Fails if the filter directive doesn't parse or a subscriber is
/// already installed.
pub fn init(settings: &LoggingSettings) -> Result<(), ServerlistAuthError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| {
            ServerlistAuthError::Logging(format!("bad level {:?}: {e}", settings.level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if settings.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(true),
            )
            .try_init()
    };
    installed.map_err(|e| ServerlistAuthError::Logging(e.to_string()))?;

    tracing::debug!(level = %settings.level, json = settings.json, "logging initialized");
    Ok(())
}
