//! # Fixture Errors
//!
//! Error taxonomy shared by the fixture provisioner, the configuration
//! loader and the assertion helpers.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields so messages stay readable in test output
//! - Cleanup failures are kept apart from fatal errors via
//!   [`FixtureError::is_fatal`]

use thiserror::Error;

/// Errors raised while provisioning, using or tearing down a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The container could not be started or never became ready.
    #[error("Failed to start {kind} fixture: {reason}")]
    Provision { kind: String, reason: String },

    /// The container is running but the client could not bind to it.
    #[error("Failed to connect to {kind} fixture at {address}: {reason}")]
    Connection {
        kind: String,
        address: String,
        reason: String
    },

    #[error("{kind} fixture already provisioned in scope {scope}")]
    AlreadyProvisioned { kind: String, scope: String },

    #[error("{kind} fixture is not ready (state: {state})")]
    NotReady { kind: String, state: String },

    #[error("Invalid fixture state transition: {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid table name: {name}")]
    InvalidIdentifier { name: String },

    #[error("Failed to reset {kind} fixture target {target}: {reason}")]
    Reset {
        kind: String,
        target: String,
        reason: String
    },

    /// A read against the fixture failed, e.g. the table does not exist.
    #[error("Query on {kind} fixture table {target} failed: {reason}")]
    Query {
        kind: String,
        target: String,
        reason: String
    },

    #[error("Transaction on {kind} fixture failed: {reason}")]
    Transaction { kind: String, reason: String },

    #[error("Fixture scope {scope} is already torn down")]
    ScopeClosed { scope: String },

    /// Teardown of a resource failed. Reported as a warning only.
    #[error("Failed to clean up {resource}: {reason}")]
    Cleanup { resource: String, reason: String },

    #[error("Timeout waiting for condition after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Assertion failed: {message}")]
    Assertion { message: String },

    #[error("{operation} is not supported by {kind} fixtures")]
    UnsupportedOperation { kind: String, operation: String }
}

impl FixtureError {
    /// Returns `false` for errors that must never fail a test on their own.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FixtureError::Cleanup { .. })
    }

    pub fn provision(kind: impl Into<String>, reason: impl ToString) -> Self {
        FixtureError::Provision {
            kind: kind.into(),
            reason: reason.to_string()
        }
    }

    pub fn connection(
        kind: impl Into<String>,
        address: impl Into<String>,
        reason: impl ToString
    ) -> Self {
        FixtureError::Connection {
            kind: kind.into(),
            address: address.into(),
            reason: reason.to_string()
        }
    }

    pub fn cleanup(resource: impl Into<String>, reason: impl ToString) -> Self {
        FixtureError::Cleanup {
            resource: resource.into(),
            reason: reason.to_string()
        }
    }
}

pub type FixtureResult<T> = Result<T, FixtureError>;
