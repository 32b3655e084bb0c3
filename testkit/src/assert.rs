//! Assertion helpers that fail the current test with a readable message.
//!
//! All helpers are `#[track_caller]`, so the panic points at the test line
//! that made the assertion.

use errors::FixtureError;
use std::fmt::{Debug, Display};

/// Fails the test when `result` is an error.
#[track_caller]
pub fn assert_no_error<T, E: Display>(result: &Result<T, E>) {
    if let Err(err) = result {
        panic!("Unexpected error: {}", err);
    }
}

/// Fails the test when `result` is `Ok`.
#[track_caller]
pub fn assert_error<T: Debug, E>(result: &Result<T, E>) {
    if let Ok(value) = result {
        panic!("Expected an error but got Ok({:?})", value);
    }
}

#[track_caller]
pub fn assert_equal<T: PartialEq + Debug>(got: T, want: T) {
    if got != want {
        panic!("Got {:?}, want {:?}", got, want);
    }
}

#[track_caller]
pub fn assert_not_equal<T: PartialEq + Debug>(got: T, want: T) {
    if got == want {
        panic!("Got {:?}, want not equal", got);
    }
}

#[track_caller]
pub fn assert_true(condition: bool, message: &str) {
    if !condition {
        fail(message);
    }
}

#[track_caller]
pub fn assert_false(condition: bool, message: &str) {
    if condition {
        fail(message);
    }
}

#[track_caller]
fn fail(message: &str) -> ! {
    let err = FixtureError::Assertion {
        message: message.to_string(),
    };
    panic!("{}", err);
}
