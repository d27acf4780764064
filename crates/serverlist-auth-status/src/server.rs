//! The status query listener and per-connection handler.
//!
//! The protocol is one request line and one reply line:
//!
//! ```text
//! → QUERY
//! ← OK 12 100
//! ```
//!
//! Anything other than `QUERY` gets an `ERROR <reason>` line. The server
//! closes the connection after replying.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time;

use crate::{RateLimiter, StatusConfig, StatusError};

/// Longest request line read. `QUERY` fits many times over; anything
/// longer is not a valid request anyway.
const MAX_REQUEST_LEN: u64 = 256;

/// How long shutdown waits for in-flight queries before aborting them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// PlayerCounts
// ---------------------------------------------------------------------------

/// Where the player numbers in an `OK` reply come from.
///
/// The host implements this; only it knows who is online and what its
/// player cap is.
pub trait PlayerCounts: Send + Sync + 'static {
    /// Players currently connected.
    fn online(&self) -> usize;

    /// Maximum players the server accepts.
    fn capacity(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK <online> <capacity>`
    Status { online: usize, capacity: usize },
    /// `ERROR <reason>`
    Error(&'static str),
}

impl Reply {
    /// Builds the reply to a request line.
    pub fn to_request(request: &str, counts: &impl PlayerCounts) -> Self {
        match request.trim() {
            "" => Self::Error("Empty request"),
            "QUERY" => Self::Status {
                online: counts.online(),
                capacity: counts.capacity(),
            },
            _ => Self::Error("Invalid command"),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { online, capacity } => write!(f, "OK {online} {capacity}"),
            Self::Error(reason) => write!(f, "ERROR {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusServer
// ---------------------------------------------------------------------------

/// Stops a running [`StatusServer`]. Cheap to clone.
#[derive(Clone)]
pub struct StatusHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl StatusHandle {
    /// Asks the server to stop accepting and drain. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// A bound status query listener.
pub struct StatusServer<P: PlayerCounts> {
    listener: TcpListener,
    config: StatusConfig,
    counts: Arc<P>,
    limiter: Arc<RateLimiter>,
    shutdown: Arc<watch::Sender<bool>>,
    stop: watch::Receiver<bool>,
}

impl<P: PlayerCounts> StatusServer<P> {
    /// Binds the listener. Call [`run`](Self::run) to start serving.
    pub async fn bind(config: StatusConfig, counts: Arc<P>) -> Result<Self, StatusError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| StatusError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        tracing::info!(addr = %config.bind_addr, "status query service listening");

        let limiter = Arc::new(RateLimiter::per_minute(config.max_requests_per_minute));
        let (shutdown, stop) = watch::channel(false);
        Ok(Self {
            listener,
            config,
            counts,
            limiter,
            shutdown: Arc::new(shutdown),
            stop,
        })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle that stops this server.
    pub fn handle(&self) -> StatusHandle {
        StatusHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Serves queries until [`StatusHandle::shutdown`] is called.
    ///
    /// Each client gets its own task; at most `max_concurrent` of them
    /// work at once. On shutdown, in-flight queries get a few seconds to
    /// finish before they are aborted.
    pub async fn run(self) {
        let mut stop = self.stop;
        let slots = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let config = Arc::new(self.config);
        let mut tasks = JoinSet::new();

        // A shutdown requested between `bind` and `run` still counts.
        while !*stop.borrow_and_update() {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let slots = Arc::clone(&slots);
                        let config = Arc::clone(&config);
                        let counts = Arc::clone(&self.counts);
                        let limiter = Arc::clone(&self.limiter);
                        tasks.spawn(async move {
                            let Ok(_permit) = slots.acquire_owned().await else {
                                return;
                            };
                            if let Err(e) =
                                serve(stream, peer, &config, &*counts, &limiter).await
                            {
                                tracing::debug!(%peer, error = %e, "status query failed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "status query accept failed");
                    }
                },
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(self.listener);
        let drained = time::timeout(DRAIN_TIMEOUT, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = tasks.len(), "aborting unfinished status queries");
            tasks.abort_all();
        }
        self.limiter.clear();
        tracing::info!("status query service stopped");
    }
}

/// Answers a single client.
async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    config: &StatusConfig,
    counts: &impl PlayerCounts,
    limiter: &RateLimiter,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();

    if config.enable_rate_limiting && !limiter.allow(peer.ip()) {
        tracing::warn!(%peer, "status query rate limit exceeded");
        return send(&mut writer, &Reply::Error("Rate limit exceeded")).await;
    }

    // Bytes that aren't UTF-8 decode to replacement characters and get
    // the usual invalid-command reply.
    let mut raw = Vec::new();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_LEN));
    match time::timeout(config.read_timeout, reader.read_until(b'\n', &mut raw)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            tracing::warn!(%peer, "status query timed out");
            return Ok(());
        }
    }

    let line = String::from_utf8_lossy(&raw);
    let reply = Reply::to_request(&line, counts);
    match &reply {
        Reply::Status { online, capacity } => {
            tracing::debug!(%peer, online, capacity, "status query answered");
        }
        Reply::Error(reason) => {
            tracing::warn!(%peer, request = line.trim(), reason, "bad status query");
        }
    }
    send(&mut writer, &reply).await
}

async fn send(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    reply: &Reply,
) -> std::io::Result<()> {
    writer.write_all(format!("{reply}\n").as_bytes()).await?;
    writer.shutdown().await
}
