//! Kind-erased provisioning entry point.

use crate::lifecycle::FixtureState;
use crate::postgres::PostgresFixture;
use crate::redis::RedisFixture;
use crate::scope::FixtureScope;
use async_trait::async_trait;
use config::FixtureConfig;
use errors::FixtureError;
use std::fmt;

/// Backing services a test can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureKind {
    Postgres,
    Redis,
}

impl FixtureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FixtureKind::Postgres => "postgres",
            FixtureKind::Redis => "redis",
        }
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FixtureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(FixtureKind::Postgres),
            "redis" => Ok(FixtureKind::Redis),
            other => Err(format!("unknown fixture kind: {}", other)),
        }
    }
}

/// A disposable backing service bound to one [`FixtureScope`].
#[async_trait]
pub trait Fixture: Sized + Send + Sync {
    const KIND: FixtureKind;

    /// Starts the service, waits for readiness and connects a client.
    /// The fixture is torn down when `scope` is.
    async fn provision(scope: &FixtureScope, config: &FixtureConfig) -> Result<Self, FixtureError>;

    /// Clears persisted data. The meaning of `targets` is kind specific.
    async fn reset(&self, targets: &[&str]) -> Result<(), FixtureError>;

    fn url(&self) -> &str;

    fn host(&self) -> &str;

    fn port(&self) -> u16;

    fn container_id(&self) -> &str;

    fn state(&self) -> FixtureState;
}

/// A provisioned fixture of any kind.
#[derive(Debug, Clone)]
pub enum FixtureHandle {
    Postgres(PostgresFixture),
    Redis(RedisFixture),
}

impl FixtureHandle {
    #[must_use]
    pub fn kind(&self) -> FixtureKind {
        match self {
            FixtureHandle::Postgres(_) => FixtureKind::Postgres,
            FixtureHandle::Redis(_) => FixtureKind::Redis,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            FixtureHandle::Postgres(f) => f.url(),
            FixtureHandle::Redis(f) => f.url(),
        }
    }

    /// `host:port` the container is reachable at.
    #[must_use]
    pub fn address(&self) -> String {
        match self {
            FixtureHandle::Postgres(f) => format!("{}:{}", f.host(), f.port()),
            FixtureHandle::Redis(f) => format!("{}:{}", f.host(), f.port()),
        }
    }

    #[must_use]
    pub fn container_id(&self) -> &str {
        match self {
            FixtureHandle::Postgres(f) => f.container_id(),
            FixtureHandle::Redis(f) => f.container_id(),
        }
    }

    #[must_use]
    pub fn state(&self) -> FixtureState {
        match self {
            FixtureHandle::Postgres(f) => f.state(),
            FixtureHandle::Redis(f) => f.state(),
        }
    }

    /// Truncates the named tables (PostgreSQL) or flushes every key (Redis).
    pub async fn reset(&self, targets: &[&str]) -> Result<(), FixtureError> {
        match self {
            FixtureHandle::Postgres(f) => f.reset(targets).await,
            FixtureHandle::Redis(f) => f.reset(targets).await,
        }
    }

    #[must_use]
    pub fn as_postgres(&self) -> Option<&PostgresFixture> {
        match self {
            FixtureHandle::Postgres(f) => Some(f),
            FixtureHandle::Redis(_) => None,
        }
    }

    #[must_use]
    pub fn as_redis(&self) -> Option<&RedisFixture> {
        match self {
            FixtureHandle::Redis(f) => Some(f),
            FixtureHandle::Postgres(_) => None,
        }
    }

    /// Runs `f` inside a transaction that is always rolled back.
    /// Only PostgreSQL fixtures support this.
    pub async fn with_transaction<F, R>(&self, f: F) -> Result<R, FixtureError>
    where
        F: AsyncFnOnce(&mut sqlx::PgConnection) -> R,
    {
        match self {
            FixtureHandle::Postgres(pg) => pg.with_transaction(f).await,
            FixtureHandle::Redis(_) => Err(FixtureError::UnsupportedOperation {
                kind: FixtureKind::Redis.to_string(),
                operation: "with_transaction".to_string(),
            }),
        }
    }
}

/// Provisions a fixture of `kind` in `scope`.
///
/// # Errors
///
/// `AlreadyProvisioned` when `scope` already holds a fixture of `kind`,
/// `Provision` when the container does not start or become ready in time,
/// `Connection` when the client cannot bind to the ready container.
pub async fn provision(
    scope: &FixtureScope,
    kind: FixtureKind,
    config: &FixtureConfig,
) -> Result<FixtureHandle, FixtureError> {
    match kind {
        FixtureKind::Postgres => PostgresFixture::provision(scope, config)
            .await
            .map(FixtureHandle::Postgres),
        FixtureKind::Redis => RedisFixture::provision(scope, config)
            .await
            .map(FixtureHandle::Redis),
    }
}
