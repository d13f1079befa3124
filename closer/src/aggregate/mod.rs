//! Aggregate closing of heterogeneous resources.
//!
//! This module provides:
//! - AggregateCloser, which runs registered close actions in reverse order
//! - Closeable and ContextCloseable, the capabilities a resource implements
//!   to be registered without a hand-written closure

mod capability;
mod closer;


pub use capability::{Closeable, ContextCloseable};
pub use closer::{AggregateCloser, CloseFn, ContextCloseFn};
