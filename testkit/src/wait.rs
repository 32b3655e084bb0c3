//! Polling helpers for conditions that become true eventually.
//!
//! The predicate is checked first, then every poll interval. A timeout is
//! only reported once the deadline has passed, after one last check.

use config::WaitConfig;
use errors::{FixtureError, FixtureResult};
use std::future::Future;
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Blocks until `predicate` returns `true` or `timeout` elapses.
///
/// # Errors
///
/// `FixtureError::Timeout` when the deadline passes first.
pub fn poll_until<P>(timeout: Duration, interval: Duration, mut predicate: P) -> FixtureResult<()>
where
    P: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(timeout_error(timeout));
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}

/// Async counterpart of [`poll_until`]; sleeps on the tokio timer.
pub async fn poll_until_async<P, Fut>(
    timeout: Duration,
    interval: Duration,
    mut predicate: P,
) -> FixtureResult<()>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return Ok(());
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(timeout_error(timeout));
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Fails the test unless `predicate` becomes true within `timeout`.
/// Polls every 100ms.
#[track_caller]
pub fn wait_for<P>(timeout: Duration, predicate: P)
where
    P: FnMut() -> bool,
{
    wait_for_with_interval(timeout, DEFAULT_POLL_INTERVAL, predicate);
}

#[track_caller]
pub fn wait_for_with_interval<P>(timeout: Duration, interval: Duration, predicate: P)
where
    P: FnMut() -> bool,
{
    if let Err(err) = poll_until(timeout, interval, predicate) {
        panic!("{}", err);
    }
}

/// [`wait_for`] polling at the configured interval
/// (`FX_WAIT_POLL_INTERVAL_MS` when loaded from the environment).
#[track_caller]
pub fn wait_for_with_config<P>(config: &WaitConfig, timeout: Duration, predicate: P)
where
    P: FnMut() -> bool,
{
    wait_for_with_interval(timeout, config.poll_interval(), predicate);
}

/// Async form of [`wait_for`] for predicates that need to await, such as a
/// query against a fixture.
pub async fn wait_for_async<P, Fut>(timeout: Duration, predicate: P)
where
    P: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_for_async_with_interval(timeout, DEFAULT_POLL_INTERVAL, predicate).await;
}

pub async fn wait_for_async_with_config<P, Fut>(config: &WaitConfig, timeout: Duration, predicate: P)
where
    P: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_for_async_with_interval(timeout, config.poll_interval(), predicate).await;
}

async fn wait_for_async_with_interval<P, Fut>(timeout: Duration, interval: Duration, predicate: P)
where
    P: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if let Err(err) = poll_until_async(timeout, interval, predicate).await {
        panic!("{}", err);
    }
}

fn timeout_error(timeout: Duration) -> FixtureError {
    FixtureError::Timeout {
        timeout_ms: timeout.as_millis() as u64,
    }
}
