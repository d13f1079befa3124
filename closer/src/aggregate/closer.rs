//! The aggregate closer.

use tracing::{debug, trace};

use super::capability::{Closeable, ContextCloseable};
use crate::cancellation::CancellationToken;
use crate::errors::{AggregateError, BoxError};

/// A close action that takes no token.
pub type CloseFn = Box<dyn FnMut() -> Result<(), BoxError> + Send>;

/// A close action that receives the invocation's cancellation token.
pub type ContextCloseFn = Box<dyn FnMut(&CancellationToken) -> Result<(), BoxError> + Send>;

/// Collects shutdown actions and runs them all in reverse registration order.
///
/// Actions are registered while a system starts up, usually one per
/// acquired resource, and released together by [`AggregateCloser::invoke`]:
///
/// - plain actions run first, last registered first;
/// - context actions run afterwards, last registered first, each receiving
///   the token passed to `invoke`;
/// - a failing action never stops the ones after it. Every failure is
///   returned in one [`AggregateError`], in the order the actions ran.
///
/// The closer does not enforce the token's deadline; context actions are
/// expected to honour it. Registration and invocation need `&mut self`, so
/// a closer shared between threads has to sit behind a lock.
///
/// `invoke` leaves the registered actions in place and a second call runs
/// them all again. Use [`AggregateCloser::shutdown`] to invoke once and
/// drop the closer.
///
/// # Example
///
/// ```
/// use closer::prelude::*;
///
/// let mut closer = AggregateCloser::new();
/// closer.register(|| Ok(()));
/// closer.register(|| Err("disk unavailable".into()));
/// closer.register_infallible(|| println!("flushed"));
///
/// let err = closer.invoke(&CancellationToken::new()).unwrap_err();
/// assert_eq!(err.messages(), vec!["disk unavailable"]);
/// ```
#[derive(Default)]
pub struct AggregateCloser {
    plain: Vec<ContextCloseFn>,
    contextual: Vec<ContextCloseFn>,
}

impl AggregateCloser {
    /// Creates an empty closer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a closer whose plain actions are `actions`, in order.
    #[must_use]
    pub fn from_actions<I>(actions: I) -> Self
    where
        I: IntoIterator<Item = CloseFn>,
    {
        actions.into_iter().collect()
    }

    /// Appends a plain close action.
    pub fn register<F>(&mut self, mut action: F)
    where
        F: FnMut() -> Result<(), BoxError> + Send + 'static,
    {
        self.plain.push(Box::new(move |_: &CancellationToken| action()));
    }

    /// Appends a plain action that calls `resource.close()`.
    pub fn register_closeable<C>(&mut self, mut resource: C)
    where
        C: Closeable + Send + 'static,
    {
        self.register(move || resource.close());
    }

    /// Appends an action that receives the invocation's token.
    pub fn register_context<F>(&mut self, action: F)
    where
        F: FnMut(&CancellationToken) -> Result<(), BoxError> + Send + 'static,
    {
        self.contextual.push(Box::new(action));
    }

    /// Appends a context action that calls `resource.close_with(token)`.
    pub fn register_context_closeable<C>(&mut self, mut resource: C)
    where
        C: ContextCloseable + Send + 'static,
    {
        self.register_context(move |token| resource.close_with(token));
    }

    /// Appends a plain action that cannot fail.
    pub fn register_infallible<F>(&mut self, mut action: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.register(move || {
            action();
            Ok(())
        });
    }

    /// Returns the total number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plain.len() + self.contextual.len()
    }

    /// Returns true if no actions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.contextual.is_empty()
    }

    /// Runs every registered action once and reports all failures.
    ///
    /// Plain actions run first, then context actions, each sequence from
    /// last registered to first. Returns `Ok(())` when every action
    /// succeeded.
    pub fn invoke(&mut self, token: &CancellationToken) -> Result<(), AggregateError> {
        debug!(
            plain = self.plain.len(),
            context = self.contextual.len(),
            "Invoking closers"
        );

        let failures: Vec<BoxError> = self
            .plain
            .iter_mut()
            .rev()
            .chain(self.contextual.iter_mut().rev())
            .filter_map(|action| action(token).err())
            .collect();

        trace!(failed = failures.len(), "Closers invoked");
        AggregateError::from_failures(failures)
    }

    /// Invokes every action once and drops the closer.
    pub fn shutdown(mut self, token: &CancellationToken) -> Result<(), AggregateError> {
        self.invoke(token)
    }
}

impl FromIterator<CloseFn> for AggregateCloser {
    fn from_iter<I: IntoIterator<Item = CloseFn>>(iter: I) -> Self {
        let mut closer = Self::new();
        for action in iter {
            closer.register(action);
        }
        closer
    }
}

impl Extend<CloseFn> for AggregateCloser {
    fn extend<I: IntoIterator<Item = CloseFn>>(&mut self, iter: I) {
        for action in iter {
            self.register(action);
        }
    }
}

/// Nested closers forward the parent's token.
impl ContextCloseable for AggregateCloser {
    fn close_with(&mut self, token: &CancellationToken) -> Result<(), BoxError> {
        self.invoke(token).map_err(Into::into)
    }
}

/// Closes with a background token that is never cancelled.
impl Closeable for AggregateCloser {
    fn close(&mut self) -> Result<(), BoxError> {
        self.invoke(&CancellationToken::new()).map_err(Into::into)
    }
}

impl std::fmt::Debug for AggregateCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateCloser")
            .field("plain", &self.plain.len())
            .field("context", &self.contextual.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_closer_creation() {
        let closer = AggregateCloser::new();
        assert!(closer.is_empty());
        assert_eq!(closer.len(), 0);
    }

    #[test]
    fn test_register_counts() {
        let mut closer = AggregateCloser::new();
        closer.register(|| Ok(()));
        closer.register_infallible(|| {});
        closer.register_context(|_| Ok(()));

        assert_eq!(closer.len(), 3);
        assert!(!closer.is_empty());
    }

    #[test]
    fn test_empty_invoke_is_ok() {
        let mut closer = AggregateCloser::new();
        assert!(closer.invoke(&CancellationToken::new()).is_ok());
    }

    #[test]
    fn test_debug_shows_counts() {
        let mut closer = AggregateCloser::new();
        closer.register(|| Ok(()));
        closer.register_context(|_| Ok(()));
        closer.register_context(|_| Ok(()));

        assert_eq!(
            format!("{closer:?}"),
            "AggregateCloser { plain: 1, context: 2 }"
        );
    }

    #[test]
    fn test_infallible_never_fails() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let mut closer = AggregateCloser::new();
        closer.register_infallible(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(closer.invoke(&CancellationToken::new()).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extend_appends_plain_actions() {
        let mut closer = AggregateCloser::new();
        let actions: Vec<CloseFn> = vec![Box::new(|| Ok(())), Box::new(|| Err("late".into()))];
        closer.extend(actions);

        let err = closer.invoke(&CancellationToken::new()).unwrap_err();
        assert_eq!(err.messages(), vec!["late"]);
    }
}
