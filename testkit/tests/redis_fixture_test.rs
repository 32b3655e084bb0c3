//! Integration tests for the Redis fixture
//!
//! These tests start real containers and are skipped without Docker.

mod common;

use common::{docker_or_skip, fixture_config};
use errors::FixtureError;
use redis::AsyncCommands;
use testkit::assert::{assert_equal, assert_error};
use testkit::{Fixture, FixtureKind, FixtureScope, FixtureState, RedisFixture, provision};

#[tokio::test]
async fn test_flush_removes_keys() {
    if !docker_or_skip("test_flush_removes_keys") {
        return;
    }
    let config = fixture_config();

    FixtureScope::run("redis-flush", |scope| async move {
        let fixture = RedisFixture::provision(&scope, &config)
            .await
            .expect("provision redis");
        assert!(fixture.url().starts_with("redis://"));

        let mut conn = fixture.connection().unwrap();
        let _: () = conn.set("key", "value").await.unwrap();
        let before: Option<String> = conn.get("key").await.unwrap();
        assert_equal(before.as_deref(), Some("value"));

        fixture.flush_all().await.expect("flush");

        let after: Option<String> = conn.get("key").await.unwrap();
        assert_equal(after, None);
    })
    .await;
}

#[tokio::test]
async fn test_reset_ignores_targets_and_flushes_everything() {
    if !docker_or_skip("test_reset_ignores_targets_and_flushes_everything") {
        return;
    }
    let config = fixture_config();

    FixtureScope::run("redis-reset", |scope| async move {
        let fixture = RedisFixture::provision(&scope, &config).await.unwrap();
        let mut conn = fixture.connection().unwrap();
        let _: () = conn.set("session:1", "a").await.unwrap();
        let _: () = conn.set("cart:1", "b").await.unwrap();

        fixture.reset(&["session:*"]).await.unwrap();

        let remaining: usize = redis::cmd("DBSIZE").query_async(&mut conn).await.unwrap();
        assert_equal(remaining, 0);
        assert_equal(fixture.state(), FixtureState::Ready);
    })
    .await;
}

#[tokio::test]
async fn test_flush_db_only_clears_selected_database() {
    if !docker_or_skip("test_flush_db_only_clears_selected_database") {
        return;
    }
    let config = fixture_config();

    FixtureScope::run("redis-flushdb", |scope| async move {
        let fixture = RedisFixture::provision(&scope, &config).await.unwrap();
        let other = redis::Client::open(format!("{}/1", fixture.url())).unwrap();
        let mut other_conn = other.get_multiplexed_async_connection().await.unwrap();
        let _: () = other_conn.set("kept", "1").await.unwrap();

        let mut conn = fixture.connection().unwrap();
        let _: () = conn.set("dropped", "1").await.unwrap();

        fixture.flush_db().await.unwrap();

        let dropped: Option<String> = conn.get("dropped").await.unwrap();
        let kept: Option<String> = other_conn.get("kept").await.unwrap();
        assert_equal(dropped, None);
        assert_equal(kept.as_deref(), Some("1"));
    })
    .await;
}

#[tokio::test]
async fn test_teardown_terminates_redis() {
    if !docker_or_skip("test_teardown_terminates_redis") {
        return;
    }
    let config = fixture_config();

    let fixture = FixtureScope::run("redis-teardown", |scope| async move {
        RedisFixture::provision(&scope, &config).await.unwrap()
    })
    .await;

    assert_equal(fixture.state(), FixtureState::Terminated);
    assert_error(&fixture.flush_all().await);

    let err = fixture.connection().unwrap_err();
    assert!(
        matches!(err, FixtureError::Connection { .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_generic_redis_handle_rejects_transactions() {
    if !docker_or_skip("test_generic_redis_handle_rejects_transactions") {
        return;
    }
    let config = fixture_config();

    FixtureScope::run("redis-generic", |scope| async move {
        let handle = provision(&scope, FixtureKind::Redis, &config).await.unwrap();
        assert_equal(handle.kind(), FixtureKind::Redis);
        assert!(handle.as_postgres().is_none());

        let err = handle.with_transaction(async |_conn| ()).await.unwrap_err();
        assert!(matches!(err, FixtureError::UnsupportedOperation { .. }));

        handle.reset(&[]).await.unwrap();
    })
    .await;
}
