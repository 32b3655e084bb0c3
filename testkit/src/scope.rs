//! Test-scoped cleanup registry.
//!
//! Every provisioning call receives a [`FixtureScope`]. Fixtures register
//! one cleanup action each; [`FixtureScope::teardown`] runs them in reverse
//! registration order exactly once. [`FixtureScope::run`] wraps a test body
//! so teardown happens after it returns, fails or panics.

use crate::provision::FixtureKind;
use errors::FixtureError;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

pub type CleanupFuture = Pin<Box<dyn Future<Output = Result<(), FixtureError>> + Send>>;

type CleanupFn = Box<dyn FnOnce() -> CleanupFuture + Send>;

struct CleanupAction {
    label: String,
    run: CleanupFn,
}

#[derive(Default)]
struct ScopeState {
    actions: Vec<CleanupAction>,
    kinds: HashSet<FixtureKind>,
    torn_down: bool,
}

struct ScopeInner {
    name: String,
    state: Mutex<ScopeState>,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.torn_down && !state.actions.is_empty() {
            // Dropping the actions drops the containers they own, which the
            // container runtime removes on its own.
            tracing::warn!(
                scope = %self.name,
                pending = state.actions.len(),
                "fixture scope dropped without teardown"
            );
            state.actions.clear();
        }
    }
}

/// Explicit per-test context for fixture provisioning. Clones share state.
#[derive(Clone)]
pub struct FixtureScope {
    inner: Arc<ScopeInner>,
}

impl FixtureScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name: name.into(),
                state: Mutex::new(ScopeState::default()),
            }),
        }
    }

    /// Scope named after the running test. The libtest harness names each
    /// test thread after its test.
    #[must_use]
    pub fn for_current_test() -> Self {
        let name = std::thread::current()
            .name()
            .map_or_else(|| crate::unique_id("scope"), str::to_string);
        Self::new(name)
    }

    /// Runs `body` with a fresh scope and tears the scope down afterwards.
    ///
    /// Teardown runs whether the body returns normally, returns an error or
    /// panics; a panic is resumed once teardown has finished, so the test
    /// still fails with its original message.
    pub async fn run<F, Fut, T>(name: impl Into<String>, body: F) -> T
    where
        F: FnOnce(FixtureScope) -> Fut,
        Fut: Future<Output = T>,
    {
        let scope = FixtureScope::new(name);
        let body_scope = scope.clone();
        let outcome = AssertUnwindSafe(async move { body(body_scope).await })
            .catch_unwind()
            .await;

        let report = scope.teardown().await;
        if !report.is_clean() {
            tracing::warn!(
                scope = %scope.name(),
                failures = report.failures.len(),
                "fixture teardown finished with errors"
            );
        }

        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.state.lock().torn_down
    }

    #[must_use]
    pub fn pending_cleanups(&self) -> usize {
        self.inner.state.lock().actions.len()
    }

    /// Registers a cleanup action. It runs exactly once, during teardown.
    pub fn register_cleanup<F, Fut>(&self, label: impl Into<String>, action: F) -> Result<(), FixtureError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FixtureError>> + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.torn_down {
            return Err(FixtureError::ScopeClosed {
                scope: self.inner.name.clone(),
            });
        }
        state.actions.push(CleanupAction {
            label: label.into(),
            run: Box::new(move || Box::pin(action()) as CleanupFuture),
        });
        Ok(())
    }

    /// Reserves `kind` for this scope. Each kind can be provisioned once.
    pub(crate) fn claim_kind(&self, kind: FixtureKind) -> Result<(), FixtureError> {
        let mut state = self.inner.state.lock();
        if state.torn_down {
            return Err(FixtureError::ScopeClosed {
                scope: self.inner.name.clone(),
            });
        }
        if !state.kinds.insert(kind) {
            return Err(FixtureError::AlreadyProvisioned {
                kind: kind.to_string(),
                scope: self.inner.name.clone(),
            });
        }
        Ok(())
    }

    /// Runs every registered cleanup action, newest first.
    ///
    /// Idempotent: only the first call runs anything. Failures and panics
    /// inside an action are logged and collected; the remaining actions
    /// still run.
    pub async fn teardown(&self) -> TeardownReport {
        let actions = {
            let mut state = self.inner.state.lock();
            if state.torn_down {
                return TeardownReport::default();
            }
            state.torn_down = true;
            std::mem::take(&mut state.actions)
        };

        let mut report = TeardownReport::default();
        for action in actions.into_iter().rev() {
            let CleanupAction { label, run } = action;
            let outcome = AssertUnwindSafe(async move { run().await })
                .catch_unwind()
                .await;
            report.ran += 1;

            let error = match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(scope = %self.inner.name, cleanup = %label, "cleanup finished");
                    continue;
                }
                Ok(Err(e)) => e,
                Err(panic) => FixtureError::cleanup(&label, panic_message(panic.as_ref())),
            };
            tracing::warn!(
                scope = %self.inner.name,
                cleanup = %label,
                error = %error,
                "cleanup failed"
            );
            report.failures.push(CleanupFailure { label, error });
        }
        report
    }
}

impl std::fmt::Debug for FixtureScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureScope")
            .field("name", &self.inner.name)
            .field("pending_cleanups", &self.pending_cleanups())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

#[derive(Debug)]
pub struct CleanupFailure {
    pub label: String,
    pub error: FixtureError,
}

/// Outcome of [`FixtureScope::teardown`].
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub ran: usize,
    pub failures: Vec<CleanupFailure>,
}

impl TeardownReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "cleanup panicked".to_string()
    }
}
