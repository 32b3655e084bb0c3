//! Disposable PostgreSQL instances backed by testcontainers.

use crate::lifecycle::{FixtureLifecycle, FixtureState};
use crate::provision::{Fixture, FixtureKind};
use crate::scope::FixtureScope;
use async_trait::async_trait;
use config::{FixtureConfig, PostgresFixtureConfig};
use errors::FixtureError;
use parking_lot::Mutex;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{AssertSqlSafe, PgConnection, PgPool};
use std::sync::Arc;
use std::time::Instant;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

const KIND: &str = "postgres";
const POSTGRES_PORT: u16 = 5432;

/// A running PostgreSQL container with a connected pool.
///
/// Clones share the same container and pool. The container is removed when
/// the owning [`FixtureScope`] is torn down.
#[derive(Debug, Clone)]
pub struct PostgresFixture {
    pool: PgPool,
    url: String,
    host: String,
    port: u16,
    container_id: String,
    lifecycle: FixtureLifecycle,
}

impl PostgresFixture {
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Truncates every table in `tables` (`TRUNCATE TABLE ... CASCADE`).
    ///
    /// All names are validated before anything is truncated.
    pub async fn truncate_tables(&self, tables: &[&str]) -> Result<(), FixtureError> {
        for table in tables {
            validate_identifier(table)?;
        }

        let _in_use = self.lifecycle.begin_use()?;
        for table in tables {
            let sql = format!("TRUNCATE TABLE {} CASCADE", table);
            sqlx::query(AssertSqlSafe(sql.as_str()))
                .execute(&self.pool)
                .await
                .map_err(|e| FixtureError::Reset {
                    kind: KIND.to_string(),
                    target: (*table).to_string(),
                    reason: e.to_string(),
                })?;
            tracing::debug!(container_id = %self.container_id, table, "truncated table");
        }
        Ok(())
    }

    /// Runs `f` inside a transaction and rolls it back afterwards.
    ///
    /// The rollback is unconditional: even a successful `f` leaves no trace.
    /// If `f` panics the transaction is dropped, which also rolls it back.
    pub async fn with_transaction<F, R>(&self, f: F) -> Result<R, FixtureError>
    where
        F: AsyncFnOnce(&mut PgConnection) -> R,
    {
        let _in_use = self.lifecycle.begin_use()?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| transaction_error("begin", e))?;

        let value = f(&mut *tx).await;

        tx.rollback()
            .await
            .map_err(|e| transaction_error("rollback", e))?;
        tracing::debug!(container_id = %self.container_id, "transaction rolled back");
        Ok(value)
    }

    /// `SELECT count(*)` of a table.
    pub async fn row_count(&self, table: &str) -> Result<i64, FixtureError> {
        validate_identifier(table)?;
        let sql = format!("SELECT count(*) FROM {}", table);
        sqlx::query_scalar::<_, i64>(AssertSqlSafe(sql.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FixtureError::Query {
                kind: KIND.to_string(),
                target: table.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Fixture for PostgresFixture {
    const KIND: FixtureKind = FixtureKind::Postgres;

    async fn provision(scope: &FixtureScope, config: &FixtureConfig) -> Result<Self, FixtureError> {
        let cfg = &config.postgres;
        scope.claim_kind(Self::KIND)?;

        let lifecycle = FixtureLifecycle::new(KIND);
        lifecycle.transition(FixtureState::Starting)?;
        let started = Instant::now();

        tracing::info!(scope = %scope.name(), image = %cfg.image_ref(), "starting postgres fixture");
        let container = Postgres::default()
            .with_db_name(&cfg.database)
            .with_user(&cfg.user)
            .with_password(&cfg.password)
            .with_name(cfg.image.clone())
            .with_tag(cfg.tag.clone())
            .with_startup_timeout(cfg.startup_timeout())
            .start()
            .await
            .map_err(|e| abort_start(&lifecycle, e))?;

        let container_id = container.id().to_string();
        let host = container
            .get_host()
            .await
            .map_err(|e| abort_start(&lifecycle, e))?
            .to_string();
        let port = container
            .get_host_port_ipv4(POSTGRES_PORT)
            .await
            .map_err(|e| abort_start(&lifecycle, e))?;

        let pool_slot: Arc<Mutex<Option<PgPool>>> = Arc::default();
        scope.register_cleanup(format!("postgres container {}", container_id), {
            let lifecycle = lifecycle.clone();
            let pool_slot = Arc::clone(&pool_slot);
            move || teardown(container, pool_slot, lifecycle)
        })?;

        let url = cfg.connection_url(&host, port);
        let address = format!("{}:{}", host, port);
        let pool = PgPoolOptions::new()
            .max_connections(cfg.pool_size)
            .acquire_timeout(cfg.connect_timeout())
            .connect_with(connect_options(cfg, &host, port))
            .await
            .map_err(|e| FixtureError::connection(KIND, &address, e))?;
        *pool_slot.lock() = Some(pool.clone());

        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| FixtureError::connection(KIND, &address, e))?;

        lifecycle.transition(FixtureState::Ready)?;
        tracing::info!(
            scope = %scope.name(),
            container_id = %container_id,
            address = %address,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "postgres fixture ready"
        );

        Ok(Self {
            pool,
            url,
            host,
            port,
            container_id,
            lifecycle,
        })
    }

    async fn reset(&self, targets: &[&str]) -> Result<(), FixtureError> {
        self.truncate_tables(targets).await
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn container_id(&self) -> &str {
        &self.container_id
    }

    fn state(&self) -> FixtureState {
        self.lifecycle.state()
    }
}

/// Closes the pool, then removes the container.
async fn teardown(
    container: ContainerAsync<Postgres>,
    pool_slot: Arc<Mutex<Option<PgPool>>>,
    lifecycle: FixtureLifecycle,
) -> Result<(), FixtureError> {
    let container_id = container.id().to_string();
    if let Err(e) = lifecycle.transition(FixtureState::Terminating) {
        tracing::warn!(container_id = %container_id, error = %e, "unexpected fixture state at teardown");
    }

    let pool = pool_slot.lock().take();
    if let Some(pool) = pool {
        pool.close().await;
    }

    let removed = container
        .rm()
        .await
        .map_err(|e| FixtureError::cleanup(format!("postgres container {}", container_id), e));
    let _ = lifecycle.transition(FixtureState::Terminated);
    tracing::info!(container_id = %container_id, "postgres fixture terminated");
    removed
}

fn abort_start(lifecycle: &FixtureLifecycle, reason: impl ToString) -> FixtureError {
    let _ = lifecycle.transition(FixtureState::Terminating);
    let _ = lifecycle.transition(FixtureState::Terminated);
    FixtureError::provision(KIND, reason)
}

/// Client options built from the individual settings rather than by parsing
/// [`PostgresFixtureConfig::connection_url`].
fn connect_options(cfg: &PostgresFixtureConfig, host: &str, port: u16) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.database)
}

fn transaction_error(step: &str, e: sqlx::Error) -> FixtureError {
    FixtureError::Transaction {
        kind: KIND.to_string(),
        reason: format!("{}: {}", step, e),
    }
}

/// Accepts `table` or `schema.table` made of unquoted SQL identifiers.
pub(crate) fn validate_identifier(name: &str) -> Result<(), FixtureError> {
    let invalid = || FixtureError::InvalidIdentifier {
        name: name.to_string(),
    };

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(invalid());
    }
    for part in parts {
        let mut chars = part.chars();
        let Some(first) = chars.next() else {
            return Err(invalid());
        };
        if part.len() > 63 || !(first.is_ascii_alphabetic() || first == '_') {
            return Err(invalid());
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_accepts_plain_and_qualified_names() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("_audit_log").is_ok());
        assert!(validate_identifier("billing.invoices").is_ok());
        assert!(validate_identifier("t$1").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        for name in [
            "",
            "users; DROP TABLE users",
            "1users",
            "a.b.c",
            "users.",
            "\"users\"",
            "users--",
        ] {
            assert!(
                matches!(
                    validate_identifier(name),
                    Err(FixtureError::InvalidIdentifier { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    fn config_with_reserved_characters() -> PostgresFixtureConfig {
        PostgresFixtureConfig {
            user: "ci:user".to_string(),
            password: "p@ss/w#rd".to_string(),
            ..PostgresFixtureConfig::default()
        }
    }

    #[test]
    fn test_connect_options_keep_credentials_verbatim() {
        let cfg = config_with_reserved_characters();
        let options = connect_options(&cfg, "localhost", 49160);
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 49160);
        assert_eq!(options.get_username(), "ci:user");
        assert_eq!(options.get_database(), Some("testdb"));
    }

    #[test]
    fn test_connection_url_parses_back_to_same_server() {
        use std::str::FromStr;

        let cfg = config_with_reserved_characters();
        let url = cfg.connection_url("localhost", 5432);
        let parsed = PgConnectOptions::from_str(&url).unwrap();
        assert_eq!(parsed.get_host(), "localhost");
        assert_eq!(parsed.get_port(), 5432);
        assert_eq!(parsed.get_username(), "ci:user");
        assert_eq!(parsed.get_database(), Some("testdb"));
    }

    #[test]
    fn test_abort_start_terminates_lifecycle() {
        let lifecycle = FixtureLifecycle::new(KIND);
        lifecycle.transition(FixtureState::Starting).unwrap();
        let err = abort_start(&lifecycle, "image not found");
        assert_eq!(lifecycle.state(), FixtureState::Terminated);
        assert_eq!(
            err.to_string(),
            "Failed to start postgres fixture: image not found"
        );
    }
}
