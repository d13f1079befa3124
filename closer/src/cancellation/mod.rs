//! Cooperative cancellation with deadlines.
//!
//! This module provides:
//! - CancellationToken, the handle threaded to context-aware close actions
//! - Timeout constructors that arm a timer and cancel the token when it fires

mod timeout;
mod token;

pub use timeout::{short_token, short_token_with_parent, timeout_token, with_timeout, SHORT_TIMEOUT};
pub use token::{CancelCallback, CancellationToken, DEADLINE_EXCEEDED};
