//! Per-fixture lifecycle state.
//!
//! `Uninitialized → Starting → Ready → (InUse ⇄ Ready) → Terminating → Terminated`
//!
//! `Starting → Terminating` covers a container that started but never became
//! usable, `InUse → Terminating` covers teardown of an interrupted operation.

use errors::FixtureError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureState {
    Uninitialized,
    Starting,
    Ready,
    InUse,
    Terminating,
    Terminated,
}

impl FixtureState {
    #[must_use]
    pub fn can_transition_to(self, next: FixtureState) -> bool {
        use FixtureState::*;
        matches!(
            (self, next),
            (Uninitialized, Starting)
                | (Starting, Ready)
                | (Starting, Terminating)
                | (Ready, InUse)
                | (InUse, Ready)
                | (Ready, Terminating)
                | (InUse, Terminating)
                | (Terminating, Terminated)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, FixtureState::Terminated)
    }
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FixtureState::Uninitialized => "uninitialized",
            FixtureState::Starting => "starting",
            FixtureState::Ready => "ready",
            FixtureState::InUse => "in_use",
            FixtureState::Terminating => "terminating",
            FixtureState::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// Shared state cell of one fixture. The handle and its cleanup action both
/// hold a clone.
#[derive(Debug, Clone)]
pub struct FixtureLifecycle {
    kind: &'static str,
    state: Arc<Mutex<FixtureState>>,
}

impl FixtureLifecycle {
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(FixtureState::Uninitialized)),
        }
    }

    #[must_use]
    pub fn state(&self) -> FixtureState {
        *self.state.lock()
    }

    pub fn transition(&self, next: FixtureState) -> Result<(), FixtureError> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(FixtureError::InvalidTransition {
                from: state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::trace!(kind = self.kind, from = %*state, to = %next, "fixture state change");
        *state = next;
        Ok(())
    }

    /// Marks the fixture `InUse` until the returned guard is dropped.
    pub fn begin_use(&self) -> Result<InUseGuard, FixtureError> {
        let mut state = self.state.lock();
        if *state != FixtureState::Ready {
            return Err(FixtureError::NotReady {
                kind: self.kind.to_string(),
                state: state.to_string(),
            });
        }
        *state = FixtureState::InUse;
        Ok(InUseGuard {
            lifecycle: self.clone(),
        })
    }
}

/// Returns the fixture to `Ready` on drop, including when the operation
/// panicked. A fixture already being torn down is left alone.
#[derive(Debug)]
pub struct InUseGuard {
    lifecycle: FixtureLifecycle,
}

impl Drop for InUseGuard {
    fn drop(&mut self) {
        let mut state = self.lifecycle.state.lock();
        if *state == FixtureState::InUse {
            *state = FixtureState::Ready;
        }
    }
}
