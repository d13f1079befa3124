//! Error types for the closer crate.
//!
//! Closing actions fail with a [`BoxError`], so any error type can be
//! returned from them. An invocation that sees one or more failures reports
//! them together as an [`AggregateError`].

use std::fmt;
use thiserror::Error;

/// The failure type returned by every registered close action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for closer operations.
#[derive(Debug, Error)]
pub enum CloserError {
    /// One or more close actions failed.
    #[error("{0}")]
    Aggregate(#[from] AggregateError),

    /// A cancellation token was cancelled or passed its deadline.
    #[error("{0}")]
    Cancelled(#[from] CancelledError),

    /// A configuration value was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Ordered collection of failures from a single closer invocation.
///
/// The failures are kept in the order their actions were invoked and each
/// keeps its own type, so callers can inspect them individually with
/// [`AggregateError::find`] or [`AggregateError::iter`].
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<BoxError>,
}

impl AggregateError {
    /// Builds a result from collected failures: `Ok(())` when there are none.
    pub(crate) fn from_failures(errors: Vec<BoxError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self { errors })
        }
    }

    /// Returns the number of underlying failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if there are no underlying failures.
    ///
    /// Errors produced by a closer are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the underlying failures in invocation order.
    pub fn iter(&self) -> impl Iterator<Item = &(dyn std::error::Error + Send + Sync + 'static)> {
        self.errors.iter().map(AsRef::as_ref)
    }

    /// Returns the display message of each underlying failure.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Returns the first underlying failure of type `E`, if any.
    #[must_use]
    pub fn find<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.errors.iter().find_map(|e| e.downcast_ref::<E>())
    }

    /// Consumes the aggregate and returns the underlying failures.
    #[must_use]
    pub fn into_errors(self) -> Vec<BoxError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl IntoIterator for AggregateError {
    type Item = BoxError;
    type IntoIter = std::vec::IntoIter<BoxError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Error returned when a cancellation token has been cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation cancelled: {reason}")]
pub struct CancelledError {
    /// The reason the token was cancelled.
    pub reason: String,
}

impl CancelledError {
    /// Creates a new cancelled error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
