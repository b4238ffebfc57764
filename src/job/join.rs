//! Cancel-aware waiting for job termination.
//!
//! [`Join`] is the suspension point of the engine: it parks the caller on a
//! completion handler and resumes it on the target's terminal transition.
//! The future is cancel-safe in both directions: dropping it disposes the
//! registration without affecting the awaited job, and the awaited job's
//! own cancellation still terminates the wait normally once it completes.

use super::disposable::Disposable;
use super::handle::{JobHandle, PARENT_CANCELLED};
use super::Job;
use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

#[derive(Debug)]
struct JoinWaiter {
    done: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl JoinWaiter {
    fn new(waker: Waker) -> Self {
        Self {
            done: AtomicBool::new(false),
            waker: Mutex::new(Some(waker)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Waker>> {
        match self.waker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Marks the wait finished and wakes the parked task, outside the lock.
    fn notify(&self) {
        self.done.store(true, Ordering::Release);
        let waker = self.slot().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Parks the current waker. Returns true if the wait finished while the
    /// waker was being stored, in which case the caller must not sleep.
    fn park(&self, waker: &Waker) -> bool {
        *self.slot() = Some(waker.clone());
        self.done.load(Ordering::Acquire)
    }
}

/// Future returned by [`JobHandle::join`].
///
/// Resolves with `Ok(())` once the target job is complete. When the target
/// is already complete on first poll and its parent is no longer active,
/// resolves with a cancellation error instead.
#[must_use = "futures do nothing unless polled"]
pub struct Join<'a, T> {
    job: &'a JobHandle<T>,
    waiter: Option<Arc<JoinWaiter>>,
    registration: Option<Disposable>,
}

impl<'a, T: Send + Sync + 'static> Join<'a, T> {
    pub(crate) fn new(job: &'a JobHandle<T>) -> Self {
        Self {
            job,
            waiter: None,
            registration: None,
        }
    }
}

impl<T: Send + Sync + 'static> Future for Join<'_, T> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.waiter.is_none() {
            if this.job.is_completed() {
                // Completed before the wait began: a dead parent surfaces
                // as cancellation of the observer.
                if let Some(parent) = this.job.parent() {
                    if !parent.is_active() {
                        return Poll::Ready(Err(Error::cancelled(PARENT_CANCELLED)));
                    }
                }
                return Poll::Ready(Ok(()));
            }
            let waiter = Arc::new(JoinWaiter::new(cx.waker().clone()));
            let observer = Arc::clone(&waiter);
            // May fire inline if the job completes during registration; the
            // done flag below covers that case.
            let registration = this.job.invoke_on_completion(move |_| observer.notify());
            this.waiter = Some(waiter);
            this.registration = Some(registration);
        }

        if let Some(waiter) = &this.waiter {
            if waiter.done.load(Ordering::Acquire) || waiter.park(cx.waker()) {
                return Poll::Ready(Ok(()));
            }
        }
        Poll::Pending
    }
}

impl<T> Drop for Join<'_, T> {
    fn drop(&mut self) {
        if let Some(registration) = &self.registration {
            registration.dispose();
        }
    }
}
