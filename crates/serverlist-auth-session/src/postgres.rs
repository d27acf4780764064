//! PostgreSQL session store over a `sqlx` connection pool.
//!
//! The pool is the only shared, mutable resource in the authenticator.
//! Every operation here borrows one connection for the duration of a
//! single statement. The connection is a `PoolConnection`, which goes
//! back to the pool when it is dropped, so success, query error, and
//! an early `?` return all release it the same way.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;

use crate::{
    PlayerId, Session, SessionStore, SessionToken, StoreError, StoreMetrics,
    StoreMetricsSnapshot,
};

const CREATE_TABLE: &str = "\
    CREATE TABLE IF NOT EXISTS serverlist_sessions (
        player_id  TEXT PRIMARY KEY,
        token      TEXT NOT NULL,
        issued_at  TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )";

const CREATE_EXPIRY_INDEX: &str = "\
    CREATE INDEX IF NOT EXISTS serverlist_sessions_expires_at_idx
        ON serverlist_sessions (expires_at)";

const SELECT_SESSION: &str = "\
    SELECT player_id, token, issued_at, expires_at
      FROM serverlist_sessions
     WHERE player_id = $1";

const UPSERT_SESSION: &str = "\
    INSERT INTO serverlist_sessions (player_id, token, issued_at, expires_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (player_id) DO UPDATE
       SET token = EXCLUDED.token,
           issued_at = EXCLUDED.issued_at,
           expires_at = EXCLUDED.expires_at";

const DELETE_SESSION: &str =
    "DELETE FROM serverlist_sessions WHERE player_id = $1";

const DELETE_EXPIRED: &str =
    "DELETE FROM serverlist_sessions WHERE expires_at <= $1";

// ---------------------------------------------------------------------------
// PoolSettings
// ---------------------------------------------------------------------------

/// Connection pool bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Hard cap on open connections. Admission checks beyond this wait
    /// for a free connection (up to `acquire_timeout`) instead of opening
    /// more.
    pub max_connections: u32,

    /// Connections kept open even when idle.
    pub min_connections: u32,

    /// How long a lookup waits for a free connection before giving up
    /// with [`StoreError::PoolExhausted`].
    pub acquire_timeout: Duration,

    /// Idle connections above `min_connections` are closed after this.
    pub idle_timeout: Duration,

    /// Connections are recycled after this age.
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// How many connections the pool holds right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Open connections, idle or in use.
    pub size: u32,
    /// Open connections not currently lent out.
    pub idle: usize,
    /// Configured maximum.
    pub max: u32,
}

// ---------------------------------------------------------------------------
// PgSessionStore
// ---------------------------------------------------------------------------

/// A [`SessionStore`] backed by the `serverlist_sessions` table.
///
/// Cloning is cheap: clones share the same pool and counters.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    metrics: Arc<StoreMetrics>,
}

/// Row shape of `serverlist_sessions`.
#[derive(sqlx::FromRow)]
struct SessionRow {
    player_id: String,
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, StoreError> {
        let player_id = PlayerId::new(&self.player_id).ok_or_else(|| {
            StoreError::Query("session row has an empty player_id".into())
        })?;
        Ok(Session {
            player_id,
            token: SessionToken::new(self.token),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
    }
}

impl PgSessionStore {
    /// Builds a pool for `url` with the given bounds.
    ///
    /// The pool is lazy: no connection is opened until the first
    /// operation, so a database that is down at startup shows up as
    /// unavailable lookups rather than a refusal to start.
    ///
    /// # Errors
    /// Returns [`StoreError::Query`] if `url` is not a valid PostgreSQL
    /// connection string.
    pub fn connect(url: &str, settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .idle_timeout(settings.idle_timeout)
            .max_lifetime(settings.max_lifetime)
            .connect_lazy(url)
            .map_err(classify)?;

        tracing::info!(
            max_connections = settings.max_connections,
            acquire_timeout_ms = settings.acquire_timeout.as_millis() as u64,
            "session store pool configured"
        );
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool. The store takes a handle to it; the
    /// caller may keep its own clone.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            metrics: Arc::new(StoreMetrics::new()),
        }
    }

    /// Creates the sessions table and its expiry index if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        for statement in [CREATE_TABLE, CREATE_EXPIRY_INDEX] {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .map_err(|e| self.fail(e))?;
        }
        tracing::info!("session schema ready");
        Ok(())
    }

    /// Stores `session`, replacing any session the player already has.
    pub async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        sqlx::query(UPSERT_SESSION)
            .bind(session.player_id.as_str())
            .bind(session.token.expose())
            .bind(session.issued_at)
            .bind(session.expires_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| self.fail(e))?;
        tracing::debug!(player_id = %session.player_id, "session stored");
        Ok(())
    }

    /// Round-trips a trivial query to check the database is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(())
    }

    /// Current pool occupancy.
    pub fn pool_status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    /// Failure counters for this store.
    pub fn metrics(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Closes the pool. Later operations fail with
    /// [`StoreError::Unavailable`].
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("session store pool closed");
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        self.pool.acquire().await.map_err(|e| self.fail(e))
    }

    fn fail(&self, err: sqlx::Error) -> StoreError {
        let err = classify(err);
        self.metrics.record(&err);
        err
    }
}

impl SessionStore for PgSessionStore {
    async fn lookup(
        &self,
        player: &PlayerId,
    ) -> Result<Option<Session>, StoreError> {
        let mut conn = self.acquire().await?;
        let row: Option<SessionRow> = sqlx::query_as(SELECT_SESSION)
            .bind(player.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| self.fail(e))?;

        row.map(SessionRow::into_session).transpose().inspect_err(|e| {
            self.metrics.record(e);
        })
    }

    async fn invalidate(&self, player: &PlayerId) -> Result<bool, StoreError> {
        let mut conn = self.acquire().await?;
        let result = sqlx::query(DELETE_SESSION)
            .bind(player.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| self.fail(e))?;

        let removed = result.rows_affected() > 0;
        tracing::info!(player_id = %player, removed, "session invalidated");
        Ok(removed)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut conn = self.acquire().await?;
        let result = sqlx::query(DELETE_EXPIRED)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| self.fail(e))?;

        let removed = result.rows_affected();
        tracing::info!(removed, "expired sessions purged");
        Ok(removed)
    }

    async fn close(&self) {
        // Inherent method: closes the pool and logs.
        PgSessionStore::close(self).await;
    }
}

/// Sorts a `sqlx` error into "couldn't reach the database" versus "the
/// database said no".
///
/// SQLSTATE class `08` (connection exception), `53300`
/// (too_many_connections) and class `57P` (server shutting down) come
/// back as database errors but describe an outage, not a bad query.
pub(crate) fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_) => StoreError::Unavailable(err.to_string()),
        sqlx::Error::Database(db)
            if db.code().is_some_and(|code| {
                code.starts_with("08") || code == "53300" || code.starts_with("57P")
            }) =>
        {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}
