//! Integration tests for the PostgreSQL store against a real database.
//!
//! Each test starts a throwaway PostgreSQL container. Without a Docker
//! daemon the tests log why and return early.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serverlist_auth_session::{
    CredentialValidator, InvalidReason, PgSessionStore, PlayerId, PoolSettings, Session,
    SessionStore, SessionToken, Validation,
};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::ContainerAsync;
use testcontainers_modules::testcontainers::runners::AsyncRunner;

// =========================================================================
// Helpers
// =========================================================================

/// A migrated store on a fresh container. The container lives as long as
/// the returned handle.
async fn live_store(max_connections: u32) -> Option<(ContainerAsync<Postgres>, PgSessionStore)> {
    let container = match Postgres::default().start().await {
        Ok(container) => container,
        Err(e) => {
            eprintln!("skipping: cannot start postgres container: {e}");
            return None;
        }
    };
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres?sslmode=disable");

    let settings = PoolSettings {
        max_connections,
        acquire_timeout: Duration::from_secs(10),
        ..PoolSettings::default()
    };
    let store = PgSessionStore::connect(&url, &settings).expect("url parses");
    store.ensure_schema().await.expect("schema");
    Some((container, store))
}

fn pid(id: &str) -> PlayerId {
    PlayerId::new(id).unwrap()
}

fn session(player: &str, token: &str, ttl_secs: i64) -> Session {
    let issued_at = Utc::now();
    Session {
        player_id: pid(player),
        token: SessionToken::new(token),
        issued_at,
        expires_at: issued_at + chrono::Duration::seconds(ttl_secs),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_store_operations_round_trip_through_postgres() {
    let Some((_container, store)) = live_store(4).await else {
        return;
    };

    // Idempotent.
    store.ensure_schema().await.unwrap();
    store.ping().await.unwrap();

    assert!(store.lookup(&pid("player42")).await.unwrap().is_none());

    store.insert(&session("player42", "abc123", 3600)).await.unwrap();
    let found = store.lookup(&pid("player42")).await.unwrap().unwrap();
    assert_eq!(found.player_id, pid("player42"));
    assert_eq!(found.token.expose(), "abc123");
    assert!(found.expires_at > found.issued_at);

    // One session per player: a second insert replaces the first.
    store.insert(&session("player42", "def456", 3600)).await.unwrap();
    let found = store.lookup(&pid("player42")).await.unwrap().unwrap();
    assert_eq!(found.token.expose(), "def456");

    assert!(store.invalidate(&pid("player42")).await.unwrap());
    assert!(!store.invalidate(&pid("player42")).await.unwrap());
    assert!(store.lookup(&pid("player42")).await.unwrap().is_none());

    store.insert(&session("live", "t1", 3600)).await.unwrap();
    store.insert(&session("dead", "t2", -60)).await.unwrap();
    assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
    assert!(store.lookup(&pid("live")).await.unwrap().is_some());
    assert!(store.lookup(&pid("dead")).await.unwrap().is_none());

    let metrics = store.metrics();
    assert_eq!(metrics.query_errors + metrics.unavailable + metrics.pool_exhaustions, 0);
    store.close().await;
}

#[tokio::test]
async fn test_validate_player42_scenario_against_postgres() {
    let Some((_container, store)) = live_store(4).await else {
        return;
    };
    store.insert(&session("player42", "abc123", 3600)).await.unwrap();
    store.insert(&session("stale", "old-token", -1)).await.unwrap();
    let validator = CredentialValidator::new(Arc::new(store));

    assert!(matches!(
        validator.validate(&pid("player42"), "abc123").await,
        Validation::Valid(ref s) if s.player_id == pid("player42")
    ));
    assert!(matches!(
        validator.validate(&pid("player42"), "wrong").await,
        Validation::Invalid(InvalidReason::TokenMismatch)
    ));
    assert!(matches!(
        validator.validate(&pid("stale"), "old-token").await,
        Validation::Invalid(InvalidReason::Expired)
    ));
    assert!(matches!(
        validator.validate(&pid("nobody"), "abc123").await,
        Validation::Invalid(InvalidReason::UnknownPlayer)
    ));
}

#[tokio::test]
async fn test_concurrent_lookups_return_every_connection_to_pool() {
    let Some((_container, store)) = live_store(4).await else {
        return;
    };
    store.insert(&session("player42", "abc123", 3600)).await.unwrap();
    let store = Arc::new(store);

    // Far more concurrent operations than connections, hits and misses.
    let mut handles = Vec::new();
    for i in 0..64 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let player = if i % 2 == 0 { "player42".to_string() } else { format!("player{i}") };
            store.lookup(&pid(&player)).await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let found = handle.await.expect("task should not panic").unwrap();
        assert_eq!(found.is_some(), i % 2 == 0);
    }

    // Connections go back to the pool from their drop, so give the
    // returns a moment to land.
    let mut status = store.pool_status();
    for _ in 0..100 {
        if status.idle == status.size as usize {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        status = store.pool_status();
    }
    assert!(status.size >= 1 && status.size <= status.max);
    assert_eq!(status.idle, status.size as usize, "leaked connections: {status:?}");
    assert_eq!(store.metrics().pool_exhaustions, 0);
}
