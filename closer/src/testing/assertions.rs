//! Test assertions for closer invocations.

use super::mocks::CallLog;
use crate::errors::AggregateError;

/// Asserts that the invocation reported no failure.
pub fn assert_closed_cleanly(result: &Result<(), AggregateError>) {
    if let Err(e) = result {
        panic!("Expected no failures, got {}: {:?}", e.len(), e.messages());
    }
}

/// Asserts that the invocation failed with exactly `expected`, in order.
pub fn assert_failures(result: &Result<(), AggregateError>, expected: &[&str]) {
    match result {
        Ok(()) => panic!("Expected failures {expected:?}, got none"),
        Err(e) => assert_eq!(
            e.messages(),
            expected,
            "Expected failures {:?}, got {:?}",
            expected,
            e.messages()
        ),
    }
}

/// Asserts that resources were closed in exactly the given order.
pub fn assert_call_order(log: &CallLog, expected: &[&str]) {
    let calls = log.calls();
    assert_eq!(
        calls, expected,
        "Expected call order {expected:?}, got {calls:?}"
    );
}
