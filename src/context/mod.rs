//! Job context: immutable keyed metadata passed at construction.
//!
//! A [`JobContext`] is a persistent map of elements keyed by their type,
//! plus a dedicated slot for the job itself so children constructed with a
//! job's context can discover their parent. Contexts are never mutated;
//! [`JobContext::with`] returns a new context sharing the old entries.
//!
//! The core reads two element types: [`JobName`] (used only by `Display`)
//! and [`ExceptionHandler`] (consulted by top-level jobs for unhandled
//! failures). Higher layers attach their own elements — a dispatcher, for
//! example — by implementing [`ContextElement`]; the core stores them
//! opaquely.

use crate::error::Error;
use crate::job::Job;
use core::fmt;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Marker trait for values that can live in a [`JobContext`].
///
/// One element per concrete type: inserting a second value of the same type
/// replaces the first.
pub trait ContextElement: Any + Send + Sync {}

type Entry = (TypeId, Arc<dyn Any + Send + Sync>);

/// An immutable, shareable set of context elements.
#[derive(Clone, Default)]
pub struct JobContext {
    job: Option<Arc<dyn Job>>,
    entries: Arc<Vec<Entry>>,
}

impl JobContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with `element` added, replacing any existing
    /// element of the same type.
    #[must_use]
    pub fn with<E: ContextElement>(&self, element: E) -> Self {
        let key = TypeId::of::<E>();
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|(k, _)| *k != key)
            .cloned()
            .collect();
        entries.push((key, Arc::new(element)));
        Self {
            job: self.job.clone(),
            entries: Arc::new(entries),
        }
    }

    /// Looks up an element by type.
    #[must_use]
    pub fn get<E: ContextElement>(&self) -> Option<Arc<E>> {
        let key = TypeId::of::<E>();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| Arc::clone(v).downcast::<E>().ok())
    }

    /// Returns the job element, if present.
    ///
    /// A job constructed with this context treats this as its parent.
    #[must_use]
    pub fn job(&self) -> Option<Arc<dyn Job>> {
        self.job.clone()
    }

    /// Returns a new context with `job` installed under the job key.
    #[must_use]
    pub fn with_job(&self, job: Arc<dyn Job>) -> Self {
        Self {
            job: Some(job),
            entries: Arc::clone(&self.entries),
        }
    }

    /// Returns the name element's value, if present.
    #[must_use]
    pub fn name(&self) -> Option<Arc<JobName>> {
        self.get::<JobName>()
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job", &self.job.as_ref().map(|j| j.id()))
            .field("elements", &self.entries.len())
            .finish()
    }
}

/// A human-readable name for a job, used only by `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobName(String);

impl JobName {
    /// Creates a new name element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ContextElement for JobName {}

/// Context element receiving failures no ancestor consumed.
///
/// Top-level jobs deliver a terminal non-cancellation error here when the
/// parent chain declined it.
#[derive(Clone)]
pub struct ExceptionHandler {
    handler: Arc<dyn Fn(&Error) + Send + Sync>,
}

impl ExceptionHandler {
    /// Creates a handler element from the given callback.
    #[must_use]
    pub fn new(handler: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Delivers an error to the callback.
    pub fn handle(&self, error: &Error) {
        (self.handler)(error);
    }
}

impl fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExceptionHandler(..)")
    }
}

impl ContextElement for ExceptionHandler {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq, Eq)]
    struct Marker(u32);

    impl ContextElement for Marker {}

    #[test]
    fn empty_context_has_no_elements() {
        let ctx = JobContext::new();
        assert!(ctx.get::<JobName>().is_none());
        assert!(ctx.job().is_none());
    }

    #[test]
    fn with_adds_and_get_finds() {
        let ctx = JobContext::new().with(JobName::new("worker"));
        let name = ctx.name().expect("name missing");
        assert_eq!(name.as_str(), "worker");
    }

    #[test]
    fn with_replaces_same_type() {
        let ctx = JobContext::new().with(Marker(1)).with(Marker(2));
        let marker = ctx.get::<Marker>().expect("marker missing");
        assert_eq!(*marker, Marker(2));
    }

    #[test]
    fn with_leaves_original_untouched() {
        let base = JobContext::new().with(Marker(1));
        let derived = base.with(Marker(9)).with(JobName::new("derived"));

        assert_eq!(base.get::<Marker>().expect("base marker").0, 1);
        assert!(base.name().is_none());
        assert_eq!(derived.get::<Marker>().expect("derived marker").0, 9);
    }

    #[test]
    fn exception_handler_delivers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = ExceptionHandler::new(move |e| {
            sink.lock().expect("lock").push(e.to_string());
        });

        handler.handle(&Error::user("boom"));
        let seen = seen.lock().expect("lock");
        assert_eq!(seen.as_slice(), ["User: boom"]);
    }
}
