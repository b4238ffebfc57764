//! The job state machine and notification engine.
//!
//! A job is a terminable unit of work with an observable lifecycle:
//!
//! - [`JobHandle`] owns the atomic state cell and implements every public
//!   operation as a compare-and-swap update loop,
//! - [`Job`] is the object-safe surface stored in contexts and used for
//!   the parent/child cancellation link,
//! - [`Continuation`] is the producer-side interface that delivers the
//!   result,
//! - [`Disposable`] undoes a handler registration,
//! - [`Join`] awaits termination from another task.
//!
//! # Lifecycle
//!
//! ```text
//!   Incomplete ──cancel()──→ Cancelling ──resume_with()──→ Complete
//!        │                                                    ▲
//!        └────────────────resume_with()──────────────────────┘
//! ```
//!
//! Completion handlers fire once on the terminal transition with the
//! producer's result; cancel handlers fire once when cancellation is
//! requested. Handlers registered after the fact fire inline. Cancelling a
//! job with a parent link unsubscribes it from the parent; a child failure
//! that is not a cancellation cancels its ancestors.

mod disposable;
mod handle;
mod join;
mod list;
mod state;

pub use disposable::Disposable;
pub use handle::JobHandle;
pub use join::Join;

use crate::error::{Error, Result};
use crate::types::JobId;
use core::fmt;

/// The type-erased surface of a job.
///
/// This is the interface a job exposes to its children and to contexts:
/// everything needed for the parent/child cancellation link, without the
/// completion value type. The typed operations (`invoke_on_completion`,
/// `resume_with`, `join`) live on [`JobHandle`].
pub trait Job: Send + Sync + fmt::Debug {
    /// Returns the job's unique identifier.
    fn id(&self) -> JobId;

    /// True while the job is neither cancelling nor complete.
    fn is_active(&self) -> bool;

    /// True once the job reached its terminal state.
    fn is_completed(&self) -> bool;

    /// Requests cancellation; a no-op after the first request or after
    /// completion.
    fn cancel(&self);

    /// Registers a cancellation handler.
    ///
    /// Fires inline and returns a no-op handle when the job is already
    /// cancelling or complete.
    fn invoke_on_cancel(&self, callback: Box<dyn Fn() + Send + Sync>) -> Disposable;

    /// Removes a registration issued by this job; ignores foreign handles.
    fn remove(&self, handle: &Disposable);

    /// Receives a failure from a child job.
    ///
    /// Returns true when the failure was consumed and propagation must
    /// stop. The default chain cancels the receiver and asks its parent.
    fn handle_child_exception(&self, error: &Error) -> bool;

    /// Last-resort handling for this job's own terminal failure, consulted
    /// when no ancestor consumed it. Returns true when the failure was
    /// delivered somewhere.
    fn handle_job_exception(&self, error: &Error) -> bool {
        let _ = error;
        false
    }
}

/// The resumable side of a job: external code delivers the result exactly
/// once through this interface.
pub trait Continuation<T> {
    /// Delivers the producer's result, completing the job.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyCompleted` when called on a terminal job.
    fn resume_with(&self, result: Result<T>) -> Result<()>;
}
