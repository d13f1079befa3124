//! Mock resources for testing closers.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

use crate::aggregate::{Closeable, ContextCloseable};
use crate::cancellation::CancellationToken;
use crate::errors::BoxError;

/// A shared, ordered record of which resources were closed.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty call log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call.
    pub fn record(&self, name: impl Into<String>) {
        self.calls.lock().push(name.into());
    }

    /// Returns the recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns how many times `name` was recorded.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == name).count()
    }

    /// Clears the record.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Failure returned by a [`MockResource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MockFailure {
    /// Name of the resource that failed.
    pub resource: String,
    /// The configured failure message.
    pub message: String,
}

/// A resource that records each close into a [`CallLog`].
#[derive(Debug, Clone)]
pub struct MockResource {
    name: String,
    log: CallLog,
    failure: Option<String>,
    fail_when_cancelled: bool,
}

impl MockResource {
    /// Creates a resource that closes successfully.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            failure: None,
            fail_when_cancelled: false,
        }
    }

    /// Creates a resource whose close always fails with `message`.
    #[must_use]
    pub fn failing(name: impl Into<String>, log: &CallLog, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(name, log)
        }
    }

    /// Makes `close_with` fail when the token is already cancelled.
    #[must_use]
    pub fn fail_when_cancelled(mut self) -> Self {
        self.fail_when_cancelled = true;
        self
    }

    /// Returns the resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn outcome(&self) -> Result<(), BoxError> {
        match &self.failure {
            Some(message) => Err(Box::new(MockFailure {
                resource: self.name.clone(),
                message: message.clone(),
            })),
            None => Ok(()),
        }
    }
}

impl Closeable for MockResource {
    fn close(&mut self) -> Result<(), BoxError> {
        self.log.record(&self.name);
        self.outcome()
    }
}

impl ContextCloseable for MockResource {
    fn close_with(&mut self, token: &CancellationToken) -> Result<(), BoxError> {
        self.log.record(&self.name);
        if self.fail_when_cancelled {
            token.check()?;
        }
        self.outcome()
    }
}
