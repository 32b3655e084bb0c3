//! Ephemeral backing services for integration tests.
//!
//! Each test gets its own containers, started on demand and removed when the
//! test's [`FixtureScope`] ends:
//! - PostgreSQL ([`PostgresFixture`]) with an `sqlx` pool
//! - Redis ([`RedisFixture`]) with a multiplexed connection
//!
//! ```rust,no_run
//! use config::FixtureConfig;
//! use errors::FixtureError;
//! use testkit::{Fixture, FixtureScope, PostgresFixture};
//!
//! # async fn example() -> Result<(), FixtureError> {
//! FixtureScope::run("orders", |scope| async move {
//!     let pg = PostgresFixture::provision(&scope, &FixtureConfig::default()).await?;
//!     pg.reset(&["orders"]).await?;
//!     Ok::<_, FixtureError>(())
//! })
//! .await
//! # }
//! ```
//!
//! Assertion and wait helpers live in [`assert`] and [`wait`].

pub mod assert;
mod fixtures;
pub mod lifecycle;
pub mod postgres;
pub mod provision;
pub mod redis;
pub mod scope;
pub mod wait;

pub use fixtures::*;
pub use lifecycle::{FixtureLifecycle, FixtureState};
pub use postgres::PostgresFixture;
pub use provision::{Fixture, FixtureHandle, FixtureKind, provision};
pub use crate::redis::RedisFixture;
pub use scope::{CleanupFailure, FixtureScope, TeardownReport};
pub use wait::{
    poll_until, poll_until_async, wait_for, wait_for_async, wait_for_async_with_config,
    wait_for_with_config, wait_for_with_interval,
};

use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a `tracing` subscriber that writes through the test harness'
/// captured output. Filtered by `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
