//! Session store that asks an external validation authority over HTTP.
//!
//! Some deployments don't keep a local copy of sessions: the server list
//! that issued them answers lookups directly. The authority exposes one
//! resource per player:
//!
//! ```text
//! GET    {endpoint}/sessions/{player_id}   200 → session JSON, 404 → none
//! DELETE {endpoint}/sessions/{player_id}   204/200 → removed, 404 → none
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::{
    PlayerId, Session, SessionStore, SessionToken, StoreError, StoreMetrics,
    StoreMetricsSnapshot,
};

/// Session body returned by the authority.
#[derive(Debug, Deserialize)]
struct AuthoritySession {
    player_id: String,
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AuthoritySession {
    fn into_session(self) -> Result<Session, StoreError> {
        let player_id = PlayerId::new(&self.player_id).ok_or_else(|| {
            StoreError::Query("authority returned an empty player_id".into())
        })?;
        Ok(Session {
            player_id,
            token: SessionToken::new(self.token),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
    }
}

/// A [`SessionStore`] backed by a remote validation authority.
///
/// `reqwest::Client` pools its HTTP connections internally, so one
/// `AuthorityStore` is shared by all admission checks the same way the
/// PostgreSQL store shares its pool.
#[derive(Debug, Clone)]
pub struct AuthorityStore {
    client: reqwest::Client,
    base: Url,
    metrics: Arc<StoreMetrics>,
}

impl AuthorityStore {
    /// Creates a store talking to `endpoint`. Every request is bounded
    /// by `timeout`.
    ///
    /// # Errors
    /// Returns [`StoreError::Query`] if `endpoint` is not an absolute
    /// `http`/`https` URL or the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base = Url::parse(endpoint).map_err(|e| {
            StoreError::Query(format!("invalid authority endpoint: {e}"))
        })?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(StoreError::Query(format!(
                "authority endpoint must be an http(s) URL, got {endpoint}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Query(format!("http client: {e}")))?;

        tracing::info!(endpoint = %base, "validation authority configured");
        Ok(Self {
            client,
            base,
            metrics: Arc::new(StoreMetrics::new()),
        })
    }

    /// Failure counters for this store.
    pub fn metrics(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// `{endpoint}/sessions/{player}`, with the player id percent-encoded
    /// as a single path segment.
    fn session_url(&self, player: &PlayerId) -> Url {
        let mut url = self.base.clone();
        // `new` rejected cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("sessions").push(player.as_str());
        }
        url
    }

    fn fail(&self, err: StoreError) -> StoreError {
        self.metrics.record(&err);
        err
    }
}

impl SessionStore for AuthorityStore {
    async fn lookup(
        &self,
        player: &PlayerId,
    ) -> Result<Option<Session>, StoreError> {
        let response = self
            .client
            .get(self.session_url(player))
            .send()
            .await
            .map_err(|e| self.fail(classify(e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: AuthoritySession = response.json().await.map_err(|e| {
                    self.fail(StoreError::Query(format!("authority body: {e}")))
                })?;
                body.into_session().map(Some).map_err(|e| self.fail(e))
            }
            status => Err(self.fail(status_error(status))),
        }
    }

    async fn invalidate(&self, player: &PlayerId) -> Result<bool, StoreError> {
        let response = self
            .client
            .delete(self.session_url(player))
            .send()
            .await
            .map_err(|e| self.fail(classify(e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                tracing::info!(player_id = %player, "session revoked at authority");
                Ok(true)
            }
            status => Err(self.fail(status_error(status))),
        }
    }

    /// The authority owns expiry; there is nothing to purge locally.
    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Server-side trouble and throttling mean "try later"; any other
/// unexpected status means we and the authority disagree on the API.
fn status_error(status: StatusCode) -> StoreError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        StoreError::Unavailable(format!("authority returned {status}"))
    } else {
        StoreError::Query(format!("authority returned {status}"))
    }
}

fn classify(err: reqwest::Error) -> StoreError {
    if err.is_decode() || err.is_builder() {
        StoreError::Query(err.to_string())
    } else {
        StoreError::Unavailable(err.to_string())
    }
}
