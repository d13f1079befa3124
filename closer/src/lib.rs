//! # Closer
//!
//! Shutdown helpers for services that acquire many resources at startup.
//!
//! - **Aggregate closing**: register a close action for every resource as it
//!   is acquired, then release them all in reverse order with one call.
//!   Every action runs even when earlier ones fail, and every failure is
//!   reported back in a single [`AggregateError`](errors::AggregateError).
//! - **Deadline tokens**: [`CancellationToken`](cancellation::CancellationToken)s
//!   that cancel themselves after a short fixed timeout or a caller-chosen
//!   one, to bound how long context-aware close actions may take.
//!
//! ## Quick Start
//!
//! ```rust
//! use closer::prelude::*;
//!
//! let mut closer = AggregateCloser::new();
//!
//! // Registered first, closed last.
//! closer.register(|| {
//!     println!("closing database pool");
//!     Ok(())
//! });
//! closer.register_context(|token| {
//!     token.check()?;
//!     println!("draining connections");
//!     Ok(())
//! });
//! closer.register_infallible(|| println!("flushing metrics"));
//!
//! let token = CancellationToken::new();
//! if let Err(failures) = closer.shutdown(&token) {
//!     for failure in failures.iter() {
//!         eprintln!("shutdown failure: {failure}");
//!     }
//! }
//! ```
//!
//! In an async service the token usually comes from
//! [`short_token`](cancellation::short_token), which cancels after five
//! seconds.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod aggregate;
pub mod cancellation;
pub mod config;
pub mod errors;
#[cfg(feature = "subscriber")]
pub mod observability;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::{
        AggregateCloser, CloseFn, Closeable, ContextCloseFn, ContextCloseable,
    };
    pub use crate::cancellation::{
        short_token, short_token_with_parent, timeout_token, CancellationToken, SHORT_TIMEOUT,
    };
    pub use crate::config::TimeoutConfig;
    pub use crate::errors::{AggregateError, BoxError, CancelledError, CloserError};
}

pub use prelude::*;
