//! The configured session backend.

use chrono::{DateTime, Utc};
use serverlist_auth_session::{
    AuthorityStore, PgSessionStore, PlayerId, Session, SessionStore,
    StoreError, StoreMetricsSnapshot,
};

use crate::config::{AuthConfig, SessionSource};
use crate::ServerlistAuthError;

/// Whichever store the configuration selected.
///
/// An enum rather than a trait object: [`SessionStore`] returns
/// `impl Future`, so it isn't object safe, and there are only two
/// backends.
#[derive(Debug, Clone)]
pub enum SessionBackend {
    Postgres(PgSessionStore),
    Authority(AuthorityStore),
}

impl SessionBackend {
    /// Builds the store named by `config`. Opens no connections.
    pub fn from_config(config: &AuthConfig) -> Result<Self, ServerlistAuthError> {
        let backend = match config.session_source()? {
            SessionSource::Database(db) => {
                Self::Postgres(PgSessionStore::connect(&db.url, &db.pool_settings())?)
            }
            SessionSource::Authority(authority) => {
                Self::Authority(AuthorityStore::new(&authority.endpoint, authority.timeout())?)
            }
        };
        tracing::info!(backend = backend.kind(), "session backend selected");
        Ok(backend)
    }

    /// `"postgres"` or `"authority"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Authority(_) => "authority",
        }
    }

    /// The PostgreSQL store, if that is the backend.
    pub fn as_postgres(&self) -> Option<&PgSessionStore> {
        match self {
            Self::Postgres(store) => Some(store),
            Self::Authority(_) => None,
        }
    }

    /// Checks the database answers. The authority has no health
    /// endpoint, so it always reports healthy here.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Authority(_) => Ok(()),
        }
    }

    /// Failure counters of the underlying store.
    pub fn metrics(&self) -> StoreMetricsSnapshot {
        match self {
            Self::Postgres(store) => store.metrics(),
            Self::Authority(store) => store.metrics(),
        }
    }
}

impl SessionStore for SessionBackend {
    async fn lookup(&self, player: &PlayerId) -> Result<Option<Session>, StoreError> {
        match self {
            Self::Postgres(store) => store.lookup(player).await,
            Self::Authority(store) => store.lookup(player).await,
        }
    }

    async fn invalidate(&self, player: &PlayerId) -> Result<bool, StoreError> {
        match self {
            Self::Postgres(store) => store.invalidate(player).await,
            Self::Authority(store) => store.invalidate(player).await,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        match self {
            Self::Postgres(store) => store.purge_expired(now).await,
            Self::Authority(store) => store.purge_expired(now).await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Postgres(store) => SessionStore::close(store).await,
            Self::Authority(store) => SessionStore::close(store).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(content: &str) -> AuthConfig {
        AuthConfig::from_toml_with_env(content, |_| None).unwrap()
    }

    #[tokio::test]
    async fn test_from_config_database_selects_postgres() {
        let backend = SessionBackend::from_config(&config(
            "[database]\nurl = \"postgres://serverlist@127.0.0.1:1/serverlist\"\n",
        ))
        .unwrap();

        assert_eq!(backend.kind(), "postgres");
        assert!(backend.as_postgres().is_some());
    }

    #[tokio::test]
    async fn test_from_config_authority_selects_authority() {
        let backend = SessionBackend::from_config(&config(
            "[authority]\nendpoint = \"https://auth.example.com\"\n",
        ))
        .unwrap();

        assert_eq!(backend.kind(), "authority");
        assert!(backend.as_postgres().is_none());
        assert!(backend.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_lookup_after_close_is_unavailable() {
        let backend = SessionBackend::from_config(&config(
            "[database]\nurl = \"postgres://serverlist@127.0.0.1:1/serverlist\"\n",
        ))
        .unwrap();
        backend.close().await;

        let result = backend.lookup(&PlayerId::new("player42").unwrap()).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(backend.metrics().unavailable, 1);
    }
}
