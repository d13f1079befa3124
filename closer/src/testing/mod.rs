//! Testing utilities for closers.
//!
//! This module provides:
//! - Mock resources that record every close into a shared call log
//! - Assertions for call order and collected failures

mod assertions;
mod mocks;

pub use assertions::{assert_call_order, assert_closed_cleanly, assert_failures};
pub use mocks::{CallLog, MockFailure, MockResource};
