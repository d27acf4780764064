//! `serverlist-auth`: operator commands for the session store.
//!
//! ```text
//! serverlist-auth --config serverlist-auth.toml migrate
//! serverlist-auth issue player42 --ttl-secs 3600
//! serverlist-auth check player42 3f9c...
//! serverlist-auth revoke player42
//! serverlist-auth purge
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serverlist_auth::logging;
use serverlist_auth::prelude::*;
use serverlist_auth::serverlist_auth_gate::{AdmissionGate, ConnectionAttempt};
use serverlist_auth::serverlist_auth_session::PgSessionStore;

#[derive(Debug, Parser)]
#[command(name = "serverlist-auth", version, about = "Serverlist session administration")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "serverlist-auth.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the session table and index
    Migrate,
    /// Issue a fresh session and print its token
    Issue {
        player: String,
        /// Session lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
    /// Run one admission check
    Check { player: String, token: String },
    /// Invalidate a player's session
    Revoke { player: String },
    /// Delete expired sessions
    Purge,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AuthConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("warning: {e}");
    }

    let backend = match SessionBackend::from_config(&config) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let outcome = run(cli.command, &config, &backend).await;
    backend.close().await;
    match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Command,
    config: &AuthConfig,
    backend: &SessionBackend,
) -> Result<ExitCode, ServerlistAuthError> {
    match command {
        Command::Migrate => {
            postgres(backend, "migrate")?.ensure_schema().await?;
            println!("schema ready");
        }
        Command::Issue { player, ttl_secs } => {
            if ttl_secs == 0 {
                return Err(ServerlistAuthError::Argument(
                    "--ttl-secs must be at least 1".into(),
                ));
            }
            let store = postgres(backend, "issue")?;
            let session = Session::issue(player_id(&player)?, Duration::from_secs(ttl_secs));
            store.insert(&session).await?;
            println!("{}", session.token.expose());
        }
        Command::Check { player, token } => {
            let gate = AdmissionGate::new(Arc::new(backend.clone()), config.gate_config());
            let result = gate
                .check(ConnectionAttempt::new(player_id(&player)?, token))
                .await;
            return Ok(match result {
                AdmissionResult::Allowed => {
                    println!("allowed");
                    ExitCode::SUCCESS
                }
                AdmissionResult::AllowedUnverified => {
                    println!("allowed (unverified: session store unavailable)");
                    ExitCode::SUCCESS
                }
                AdmissionResult::Denied(reason) => {
                    println!("denied: {reason}");
                    ExitCode::FAILURE
                }
            });
        }
        Command::Revoke { player } => {
            if backend.invalidate(&player_id(&player)?).await? {
                println!("revoked");
            } else {
                println!("no session");
            }
        }
        Command::Purge => {
            let removed = backend.purge_expired(Utc::now()).await?;
            println!("purged {removed} expired session(s)");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn player_id(raw: &str) -> Result<PlayerId, ServerlistAuthError> {
    PlayerId::new(raw)
        .ok_or_else(|| ServerlistAuthError::Argument("player id must not be blank".into()))
}

/// Session issuing and schema management only exist for the database
/// backend; the authority manages its own.
fn postgres<'a>(
    backend: &'a SessionBackend,
    command: &str,
) -> Result<&'a PgSessionStore, ServerlistAuthError> {
    backend.as_postgres().ok_or_else(|| {
        ServerlistAuthError::Argument(format!("`{command}` needs a [database] session source"))
    })
}
