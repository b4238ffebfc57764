//! Registration handles.
//!
//! A [`Disposable`] undoes a handler registration. Handles are idempotent,
//! callable from any thread, and hold only weak references internally: a
//! retained handle never keeps a completed job alive, and disposing after
//! the job reached its terminal state is a silent no-op.

use crate::types::JobId;
use core::fmt;
use std::sync::Arc;

/// Type-erased removal action behind a live handle.
pub(crate) trait Dispose: Send + Sync {
    fn dispose(&self);
}

/// An opaque handle whose sole effect is to cancel a prior registration.
pub struct Disposable {
    owner: Option<JobId>,
    inner: Option<Arc<dyn Dispose>>,
}

impl Disposable {
    /// Creates the inert handle returned for registrations that already
    /// fired inline.
    pub(crate) fn noop() -> Self {
        Self {
            owner: None,
            inner: None,
        }
    }

    pub(crate) fn live(owner: JobId, inner: Arc<dyn Dispose>) -> Self {
        Self {
            owner: Some(owner),
            inner: Some(inner),
        }
    }

    /// Returns the ID of the job that issued this handle, if it is live.
    pub(crate) fn owner(&self) -> Option<JobId> {
        self.owner
    }

    /// Removes the registration from its owning job.
    ///
    /// Safe to call from any thread, any number of times; a no-op once the
    /// job is terminal or the registration is already gone.
    pub fn dispose(&self) {
        if let Some(inner) = &self.inner {
            inner.dispose();
        }
    }

    /// Returns true if this handle never had a registration to undo.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            Some(owner) => write!(f, "Disposable(owner = {owner})"),
            None => f.write_str("Disposable(noop)"),
        }
    }
}
