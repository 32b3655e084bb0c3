//! Disposable Redis instances backed by testcontainers.

use crate::lifecycle::{FixtureLifecycle, FixtureState};
use crate::provision::{Fixture, FixtureKind};
use crate::scope::FixtureScope;
use async_trait::async_trait;
use config::FixtureConfig;
use errors::FixtureError;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Instant;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

const KIND: &str = "redis";
const REDIS_PORT: u16 = 6379;

/// A running Redis container with a connected client.
///
/// The client lives in a slot shared with the scope's cleanup action, which
/// empties it before the container is removed.
#[derive(Clone)]
pub struct RedisFixture {
    connection: Arc<Mutex<Option<ConnectionManager>>>,
    url: String,
    host: String,
    port: u16,
    container_id: String,
    lifecycle: FixtureLifecycle,
}

impl std::fmt::Debug for RedisFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisFixture")
            .field("url", &self.url)
            .field("container_id", &self.container_id)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

impl RedisFixture {
    /// A multiplexed connection to the fixture. Cheap to clone.
    ///
    /// Fails once the fixture has been torn down.
    pub fn connection(&self) -> Result<ConnectionManager, FixtureError> {
        self.connection.lock().clone().ok_or_else(|| {
            FixtureError::connection(
                KIND,
                format!("{}:{}", self.host, self.port),
                "client closed by teardown",
            )
        })
    }

    /// Removes every key from every logical database (`FLUSHALL`).
    pub async fn flush_all(&self) -> Result<(), FixtureError> {
        self.flush("FLUSHALL").await
    }

    /// Removes every key from the selected logical database (`FLUSHDB`).
    pub async fn flush_db(&self) -> Result<(), FixtureError> {
        self.flush("FLUSHDB").await
    }

    async fn flush(&self, command: &str) -> Result<(), FixtureError> {
        let _in_use = self.lifecycle.begin_use()?;
        let mut conn = self.connection()?;
        let _: () = redis::cmd(command)
            .query_async(&mut conn)
            .await
            .map_err(|e| FixtureError::Reset {
                kind: KIND.to_string(),
                target: command.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(container_id = %self.container_id, command, "flushed redis fixture");
        Ok(())
    }
}

#[async_trait]
impl Fixture for RedisFixture {
    const KIND: FixtureKind = FixtureKind::Redis;

    async fn provision(scope: &FixtureScope, config: &FixtureConfig) -> Result<Self, FixtureError> {
        let cfg = &config.redis;
        scope.claim_kind(Self::KIND)?;

        let lifecycle = FixtureLifecycle::new(KIND);
        lifecycle.transition(FixtureState::Starting)?;
        let started = Instant::now();

        tracing::info!(scope = %scope.name(), image = %cfg.image_ref(), "starting redis fixture");
        let container = Redis::default()
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
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .map_err(|e| abort_start(&lifecycle, e))?;

        let connection_slot: Arc<Mutex<Option<ConnectionManager>>> = Arc::default();
        scope.register_cleanup(format!("redis container {}", container_id), {
            let lifecycle = lifecycle.clone();
            let connection_slot = Arc::clone(&connection_slot);
            move || teardown(container, connection_slot, lifecycle)
        })?;

        let url = cfg.connection_url(&host, port);
        let address = format!("{}:{}", host, port);
        let client =
            redis::Client::open(url.as_str()).map_err(|e| FixtureError::connection(KIND, &address, e))?;
        let mut connection = client
            .get_connection_manager()
            .await
            .map_err(|e| FixtureError::connection(KIND, &address, e))?;
        *connection_slot.lock() = Some(connection.clone());

        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| FixtureError::connection(KIND, &address, e))?;
        if pong != "PONG" {
            return Err(FixtureError::connection(
                KIND,
                &address,
                format!("unexpected PING reply: {}", pong),
            ));
        }

        lifecycle.transition(FixtureState::Ready)?;
        tracing::info!(
            scope = %scope.name(),
            container_id = %container_id,
            address = %address,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "redis fixture ready"
        );

        Ok(Self {
            connection: connection_slot,
            url,
            host,
            port,
            container_id,
            lifecycle,
        })
    }

    /// Flushes the whole instance; `targets` are not used.
    async fn reset(&self, targets: &[&str]) -> Result<(), FixtureError> {
        if !targets.is_empty() {
            tracing::debug!(?targets, "redis reset flushes every key; targets ignored");
        }
        self.flush_all().await
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

/// Drops the fixture's client, then removes the container. Clones handed
/// out by [`RedisFixture::connection`] earlier stay usable until dropped.
async fn teardown(
    container: ContainerAsync<Redis>,
    connection_slot: Arc<Mutex<Option<ConnectionManager>>>,
    lifecycle: FixtureLifecycle,
) -> Result<(), FixtureError> {
    let container_id = container.id().to_string();
    if let Err(e) = lifecycle.transition(FixtureState::Terminating) {
        tracing::warn!(container_id = %container_id, error = %e, "unexpected fixture state at teardown");
    }

    drop(connection_slot.lock().take());

    let removed = container
        .rm()
        .await
        .map_err(|e| FixtureError::cleanup(format!("redis container {}", container_id), e));
    let _ = lifecycle.transition(FixtureState::Terminated);
    tracing::info!(container_id = %container_id, "redis fixture terminated");
    removed
}

fn abort_start(lifecycle: &FixtureLifecycle, reason: impl ToString) -> FixtureError {
    let _ = lifecycle.transition(FixtureState::Terminating);
    let _ = lifecycle.transition(FixtureState::Terminated);
    FixtureError::provision(KIND, reason)
}
