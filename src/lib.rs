//! Joblet: the job core of a miniature structured-concurrency runtime.
//!
//! # Overview
//!
//! Every coroutine-like task in a structured-concurrency system rests on
//! one primitive: a job with an atomically-updated lifecycle state, a
//! parent/child cancellation link, and completion/cancellation callback
//! dispatch. Joblet is that primitive, and only that primitive: it does
//! not schedule work, own threads, or define timers. Dispatchers, launcher
//! variants, and timeout services compose it from the outside through the
//! context mechanism.
//!
//! # Core Guarantees
//!
//! - **Lock-free**: every state transition is a compare-and-swap over one
//!   atomic cell; no operation blocks another
//! - **Exactly-once effects**: callback dispatch and parent notification
//!   run only for the racer whose CAS succeeded
//! - **No lost handlers**: a registration that races a completing writer
//!   fires inline from the registering call
//! - **Cancel-correctness**: cancellation is a state, not a silent drop;
//!   a cancelled job still delivers the producer's result to observers
//!   that registered before the cancel
//! - **Structured failure**: a child failure that is not a cancellation
//!   cancels its ancestors and can be consumed by a context-provided
//!   exception handler
//!
//! # Module Structure
//!
//! - [`job`]: the state machine and notification engine
//! - [`context`]: immutable keyed metadata, including the parent link
//! - [`error`]: error types
//! - [`types`]: identifier types
//! - [`tracing_compat`]: feature-gated structured logging shim

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod error;
pub mod job;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use context::{ContextElement, ExceptionHandler, JobContext, JobName};
pub use error::{Error, ErrorKind, Result};
pub use job::{Continuation, Disposable, Job, JobHandle, Join};
pub use types::JobId;
