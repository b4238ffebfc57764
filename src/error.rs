//! Error types and error handling strategy for joblet.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Cancellation is a normal terminal outcome, not a fault
//! - Programmer errors (double resume) are reported, never panicked on

use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation was cancelled, or observed a cancelled job.
    Cancelled,
    /// A terminal job received a second result.
    AlreadyCompleted,
    /// Internal invariant violation (bug).
    Internal,
    /// User-provided failure carried inside a job result.
    User,
}

/// The main error type for joblet operations.
///
/// Carries a kind, optional deterministic context text, and an optional
/// source error chain.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns the context text, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Adds deterministic context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a cancellation error with the given message.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled).with_context(message)
    }

    /// Creates the error reported when a terminal job is resumed again.
    #[must_use]
    pub fn already_completed() -> Self {
        Self::new(ErrorKind::AlreadyCompleted).with_context("job already completed")
    }

    /// Creates a user failure with the given message.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_context(message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// A specialized Result type for joblet operations.
///
/// This alias doubles as the job result: `Ok(v)` is a successful
/// completion value, `Err(e)` a failure carried to completion handlers.
pub type Result<T> = core::result::Result<T, Error>;
