//! Capabilities a resource exposes to be registered with a closer.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::errors::BoxError;

/// A resource that can release itself, possibly failing.
pub trait Closeable {
    /// Releases the resource.
    fn close(&mut self) -> Result<(), BoxError>;
}

/// A resource whose release honours a cancellation token.
pub trait ContextCloseable {
    /// Releases the resource, stopping early once `token` is cancelled.
    fn close_with(&mut self, token: &CancellationToken) -> Result<(), BoxError>;
}

impl<T: Closeable + ?Sized> Closeable for Box<T> {
    fn close(&mut self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: ContextCloseable + ?Sized> ContextCloseable for Box<T> {
    fn close_with(&mut self, token: &CancellationToken) -> Result<(), BoxError> {
        (**self).close_with(token)
    }
}

/// Lets a resource stay usable elsewhere while a closer holds a handle to it.
impl<T: Closeable + ?Sized> Closeable for Arc<Mutex<T>> {
    fn close(&mut self) -> Result<(), BoxError> {
        self.lock().close()
    }
}

impl<T: ContextCloseable + ?Sized> ContextCloseable for Arc<Mutex<T>> {
    fn close_with(&mut self, token: &CancellationToken) -> Result<(), BoxError> {
        self.lock().close_with(token)
    }
}
