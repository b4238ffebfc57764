//! The job engine: an atomic lifecycle cell with notification fan-out.
//!
//! All public operations funnel through one compare-and-swap loop over an
//! [`ArcSwap`] state cell. A candidate state is built from the observed
//! previous state (inheriting its handler list), installed with a CAS, and
//! only the winning racer performs externally visible effects: callback
//! dispatch, parent notification, subscription disposal. Losing racers
//! discard their candidate and retry against the fresh state, so every
//! transition's effects run exactly once.

use super::disposable::{Disposable, Dispose};
use super::join::Join;
use super::list::Handler;
use super::state::JobState;
use super::{Continuation, Job};
use crate::context::{ExceptionHandler, JobContext};
use crate::error::{Error, ErrorKind, Result};
use crate::tracing_compat::{debug, trace};
use crate::types::JobId;
use arc_swap::ArcSwap;
use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Message stored when a cancelled job nevertheless receives a result.
pub(crate) const RESUMED_AFTER_CANCEL: &str = "Result arrived, but cancelled already.";

/// Message reported when observing a completed job whose parent died.
pub(crate) const PARENT_CANCELLED: &str = "Parent cancelled.";

struct Core<T> {
    id: JobId,
    state: ArcSwap<JobState<T>>,
    /// The construction context, without this job re-inserted.
    context: JobContext,
    parent: Option<Arc<dyn Job>>,
    /// Subscription on the parent's cancel list. Written once during
    /// construction, taken once on the first cancel/terminal transition.
    parent_handle: Mutex<Option<Disposable>>,
    top_level: bool,
}

impl<T> Core<T> {
    /// Attempts to install `next` over `expected`. True iff this caller won.
    fn install(&self, expected: &Arc<JobState<T>>, next: Arc<JobState<T>>) -> bool {
        let previous = self.state.compare_and_swap(expected, next);
        Arc::ptr_eq(&*previous, expected)
    }

    fn parent_slot(&self) -> MutexGuard<'_, Option<Disposable>> {
        match self.parent_handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Disposes the parent-cancel subscription, at most once.
    fn dispose_parent_handle(&self) {
        let taken = self.parent_slot().take();
        if let Some(subscription) = taken {
            subscription.dispose();
            trace!(job_id = ?self.id, "parent subscription disposed");
        }
    }
}

impl<T: Send + Sync + 'static> Core<T> {
    /// Removes a registered handler via the CAS loop. Idempotent; a no-op
    /// once the job is terminal or the handler is no longer present.
    fn remove_handler(&self, handler: &Arc<Handler<T>>) {
        loop {
            let current = self.state.load_full();
            let Some(next) = current.without_handler(handler) else {
                return;
            };
            if self.install(&current, Arc::new(next)) {
                trace!(job_id = ?self.id, "handler removed");
                return;
            }
        }
    }
}

/// Removal action captured by a live [`Disposable`].
///
/// Both references are weak: the handle must neither keep a completed job
/// alive nor extend the registration cycle described in the parent/child
/// linkage rules.
struct HandlerRegistration<T> {
    job: Weak<Core<T>>,
    handler: Weak<Handler<T>>,
}

impl<T: Send + Sync + 'static> Dispose for HandlerRegistration<T> {
    fn dispose(&self) {
        if let (Some(core), Some(handler)) = (self.job.upgrade(), self.handler.upgrade()) {
            core.remove_handler(&handler);
        }
    }
}

/// A handle to a job: a terminable unit of work with observable lifecycle.
///
/// Handles are cheaply cloneable references to one shared job. The type
/// parameter is the completion value delivered to completion handlers.
///
/// # Example
///
/// ```
/// use joblet::{JobContext, JobHandle};
///
/// let job = JobHandle::new(JobContext::new());
/// let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
/// let sink = std::sync::Arc::clone(&seen);
/// job.invoke_on_completion(move |result: &joblet::Result<u32>| {
///     *sink.lock().unwrap() = result.as_ref().ok().copied();
/// });
/// job.resume_with(Ok(42)).unwrap();
/// assert!(job.is_completed());
/// assert_eq!(*seen.lock().unwrap(), Some(42));
/// ```
pub struct JobHandle<T> {
    core: Arc<Core<T>>,
}

impl<T> Clone for JobHandle<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + Sync + 'static> JobHandle<T> {
    /// Creates a job in the `Incomplete` state.
    ///
    /// If `context` carries a job, it becomes this job's parent: the new
    /// job subscribes to the parent's cancellation as the last step of
    /// construction, so cancelling the parent cancels this job.
    #[must_use]
    pub fn new(context: JobContext) -> Self {
        Self::build(context, false)
    }

    /// Creates a top-level job.
    ///
    /// Top-level jobs additionally deliver terminal failures that no
    /// ancestor consumed to the context's [`ExceptionHandler`] element.
    #[must_use]
    pub fn top_level(context: JobContext) -> Self {
        Self::build(context, true)
    }

    fn build(context: JobContext, top_level: bool) -> Self {
        let parent = context.job();
        let core = Arc::new(Core {
            id: JobId::next(),
            state: ArcSwap::from_pointee(JobState::incomplete()),
            context,
            parent,
            parent_handle: Mutex::new(None),
            top_level,
        });
        let job = Self { core };
        debug!(job_id = ?job.core.id, parent = ?job.core.parent.as_ref().map(|p| p.id()), "job created");

        if let Some(parent) = job.core.parent.clone() {
            let child = job.clone();
            let subscription = parent.invoke_on_cancel(Box::new(move || child.cancel()));
            *job.core.parent_slot() = Some(subscription);
        }
        job
    }

    /// Returns this job's unique identifier.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.core.id
    }

    /// Returns the context for children of this job: the construction
    /// context with this job re-inserted under the job key.
    #[must_use]
    pub fn context(&self) -> JobContext {
        self.core.context.with_job(Arc::new(self.clone()))
    }

    pub(crate) fn parent(&self) -> Option<&Arc<dyn Job>> {
        self.core.parent.as_ref()
    }

    /// True while the job is neither cancelling nor complete.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.core.state.load().is_active()
    }

    /// True once the job reached its terminal state.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.core.state.load().is_complete()
    }

    /// Delivers the producer's result, completing the job.
    ///
    /// From `Incomplete` the result is stored as-is. From `Cancelling` the
    /// job terminates with a cancellation error regardless of `result`,
    /// but completion handlers still observe the original `result`: the
    /// body finished with it, and observers registered before the cancel
    /// see what it produced. Cancellation observers are notified through
    /// the separate cancel channel.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyCompleted`] if the job already has a
    /// terminal state.
    pub fn resume_with(&self, result: Result<T>) -> Result<()> {
        let mut result = result;
        loop {
            let current = self.core.state.load_full();
            match &*current {
                JobState::Complete { .. } => {
                    return Err(Error::already_completed());
                }
                JobState::Cancelling { handlers } => {
                    let snapshot = handlers.clone();
                    let next = Arc::new(JobState::Complete {
                        outcome: Err(Error::cancelled(RESUMED_AFTER_CANCEL)),
                    });
                    if self.core.install(&current, next) {
                        debug!(
                            job_id = ?self.core.id,
                            old_state = "Cancelling",
                            new_state = "Complete",
                            outcome = "Cancelled",
                            "job completed after cancellation"
                        );
                        snapshot.notify_completion(&result);
                        self.core.dispose_parent_handle();
                        return Ok(());
                    }
                }
                JobState::Incomplete { handlers } => {
                    let snapshot = handlers.clone();
                    let failure = result.as_ref().err().cloned();
                    let next = Arc::new(JobState::Complete { outcome: result });
                    if self.core.install(&current, Arc::clone(&next)) {
                        debug!(
                            job_id = ?self.core.id,
                            old_state = "Incomplete",
                            new_state = "Complete",
                            failed = failure.is_some(),
                            "job completed"
                        );
                        if let Some(error) = &failure {
                            self.try_handle_exception(error);
                        }
                        if let Some(outcome) = next.outcome() {
                            snapshot.notify_completion(outcome);
                        }
                        self.core.dispose_parent_handle();
                        return Ok(());
                    }
                    // Lost the race: the candidate was never published, so
                    // this is the only reference and the result moves back
                    // out for the retry.
                    match Arc::try_unwrap(next) {
                        Ok(JobState::Complete { outcome }) => result = outcome,
                        _ => {
                            debug_assert!(false, "unpublished candidate escaped");
                            return Err(Error::new(ErrorKind::Internal)
                                .with_context("unpublished candidate escaped"));
                        }
                    }
                }
            }
        }
    }

    /// Requests cancellation.
    ///
    /// From `Incomplete` this moves the job to `Cancelling`, fires every
    /// registered cancel handler before returning, and disposes the
    /// parent-cancel subscription. From any other state it is a no-op.
    pub fn cancel(&self) {
        loop {
            let current = self.core.state.load_full();
            let JobState::Incomplete { handlers } = &*current else {
                return;
            };
            let snapshot = handlers.clone();
            let next = Arc::new(JobState::Cancelling {
                handlers: handlers.clone(),
            });
            if self.core.install(&current, next) {
                debug!(
                    job_id = ?self.core.id,
                    old_state = "Incomplete",
                    new_state = "Cancelling",
                    "job cancel requested"
                );
                snapshot.notify_cancel();
                self.core.dispose_parent_handle();
                return;
            }
        }
    }

    /// Registers a handler invoked once with the job's result.
    ///
    /// If the job is already complete, `callback` runs immediately and
    /// synchronously with the stored outcome and the returned handle is a
    /// no-op. Otherwise the handler fires on the terminal transition; a
    /// registration that loses the race to a completing writer is invoked
    /// inline by this call, never dropped.
    pub fn invoke_on_completion(
        &self,
        callback: impl Fn(&Result<T>) + Send + Sync + 'static,
    ) -> Disposable {
        let handler = Arc::new(Handler::completion(Box::new(callback)));
        loop {
            let current = self.core.state.load_full();
            if let Some(outcome) = current.outcome() {
                handler.fire_completion(outcome);
                return Disposable::noop();
            }
            let Some(next) = current.with_handler(Arc::clone(&handler)) else {
                continue;
            };
            if self.core.install(&current, Arc::new(next)) {
                trace!(job_id = ?self.core.id, "completion handler registered");
                return self.registration_handle(&handler);
            }
        }
    }

    /// Registers a handler invoked when cancellation is requested.
    ///
    /// If the job is already cancelling or complete, `callback` runs
    /// immediately and the returned handle is a no-op. Note that a job
    /// that completed normally still fires the callback at registration.
    pub fn invoke_on_cancel(&self, callback: impl Fn() + Send + Sync + 'static) -> Disposable {
        self.register_cancel(Box::new(callback))
    }

    fn register_cancel(&self, callback: Box<dyn Fn() + Send + Sync>) -> Disposable {
        let handler = Arc::new(Handler::cancel(callback));
        loop {
            let current = self.core.state.load_full();
            match &*current {
                JobState::Cancelling { .. } | JobState::Complete { .. } => {
                    handler.fire_cancel();
                    return Disposable::noop();
                }
                JobState::Incomplete { .. } => {
                    let Some(next) = current.with_handler(Arc::clone(&handler)) else {
                        continue;
                    };
                    if self.core.install(&current, Arc::new(next)) {
                        trace!(job_id = ?self.core.id, "cancel handler registered");
                        return self.registration_handle(&handler);
                    }
                }
            }
        }
    }

    /// Removes a registration issued by this job. Handles owned by other
    /// jobs are ignored; disposing twice is safe.
    pub fn remove(&self, handle: &Disposable) {
        if handle.owner() == Some(self.core.id) {
            handle.dispose();
        }
    }

    /// Waits for this job to reach its terminal state.
    ///
    /// The returned future resolves with `Ok(())` once the job is
    /// complete. If the job is already complete when first polled and its
    /// parent is no longer active, the future resolves with a
    /// cancellation error instead. Dropping the future disposes the
    /// underlying registration without affecting the awaited job.
    #[must_use]
    pub fn join(&self) -> Join<'_, T> {
        Join::new(self)
    }

    fn registration_handle(&self, handler: &Arc<Handler<T>>) -> Disposable {
        Disposable::live(
            self.core.id,
            Arc::new(HandlerRegistration {
                job: Arc::downgrade(&self.core),
                handler: Arc::downgrade(handler),
            }),
        )
    }

    /// Routes a terminal non-cancellation failure.
    ///
    /// The parent chain is asked first; the default chain cancels every
    /// ancestor on the way up. Only if no ancestor consumed the failure is
    /// this job's own [`Job::handle_job_exception`] consulted.
    fn try_handle_exception(&self, error: &Error) {
        if error.is_cancelled() {
            return;
        }
        let handled = match &self.core.parent {
            Some(parent) => parent.handle_child_exception(error),
            None => false,
        };
        if !handled && !self.handle_job_exception(error) {
            debug!(job_id = ?self.core.id, error = %error, "job failure left unhandled");
        }
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self) -> usize {
        self.core.state.load().handlers().map_or(0, super::list::HandlerList::len)
    }
}

impl<T: Send + Sync + 'static> Job for JobHandle<T> {
    fn id(&self) -> JobId {
        JobHandle::id(self)
    }

    fn is_active(&self) -> bool {
        JobHandle::is_active(self)
    }

    fn is_completed(&self) -> bool {
        JobHandle::is_completed(self)
    }

    fn cancel(&self) {
        JobHandle::cancel(self);
    }

    fn invoke_on_cancel(&self, callback: Box<dyn Fn() + Send + Sync>) -> Disposable {
        self.register_cancel(callback)
    }

    fn remove(&self, handle: &Disposable) {
        JobHandle::remove(self, handle);
    }

    fn handle_child_exception(&self, error: &Error) -> bool {
        debug!(job_id = ?self.core.id, error = %error, "child failure received");
        self.cancel();
        match &self.core.parent {
            Some(parent) => parent.handle_child_exception(error),
            None => false,
        }
    }

    fn handle_job_exception(&self, error: &Error) -> bool {
        if !self.core.top_level {
            return false;
        }
        match self.core.context.get::<ExceptionHandler>() {
            Some(handler) => {
                handler.handle(error);
                true
            }
            None => false,
        }
    }
}

impl<T: Send + Sync + 'static> Continuation<T> for JobHandle<T> {
    fn resume_with(&self, result: Result<T>) -> Result<()> {
        JobHandle::resume_with(self, result)
    }
}

impl<T: Send + Sync + 'static> fmt::Display for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.load();
        match self.core.context.name() {
            Some(name) => write!(f, "{}#{}{{{}}}", name.as_str(), self.core.id, state.name()),
            None => write!(f, "Job#{}{{{}}}", self.core.id, state.name()),
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.core.id)
            .field("state", &self.core.state.load().name())
            .finish()
    }
}
