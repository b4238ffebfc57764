//! The job lifecycle state machine.
//!
//! Legal transitions form a DAG:
//!
//! ```text
//!   Incomplete ──→ Cancelling ──→ Complete
//!        │                           ▲
//!        └───────────────────────────┘
//! ```
//!
//! `Complete` is absorbing. Non-terminal states carry the handler list;
//! every transition inherits the observed list until the terminal state,
//! which drops it so late registrations fire inline instead.

use super::list::{Handler, HandlerList};
use crate::error::Result;
use core::fmt;
use std::sync::Arc;

/// The state of a job in its lifecycle.
pub(crate) enum JobState<T> {
    /// No result yet and no cancellation requested.
    Incomplete {
        /// Registered handlers of both kinds.
        handlers: HandlerList<T>,
    },
    /// Cancellation requested; the producer may still deliver a result.
    Cancelling {
        /// Handlers carried over from `Incomplete`.
        handlers: HandlerList<T>,
    },
    /// Terminal state with the stored outcome.
    Complete {
        /// Exactly the value or the failure the job terminated with. A
        /// cancelled-then-resumed job stores a cancellation error here
        /// regardless of the producer's result.
        outcome: Result<T>,
    },
}

impl<T> JobState<T> {
    pub(crate) fn incomplete() -> Self {
        Self::Incomplete {
            handlers: HandlerList::new(),
        }
    }

    /// Returns the handler list for non-terminal states.
    pub(crate) fn handlers(&self) -> Option<&HandlerList<T>> {
        match self {
            Self::Incomplete { handlers } | Self::Cancelling { handlers } => Some(handlers),
            Self::Complete { .. } => None,
        }
    }

    /// Returns the stored outcome for the terminal state.
    pub(crate) fn outcome(&self) -> Option<&Result<T>> {
        match self {
            Self::Complete { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// Builds the same non-terminal state with `handler` added.
    ///
    /// Returns `None` when the state is terminal.
    pub(crate) fn with_handler(&self, handler: Arc<Handler<T>>) -> Option<Self> {
        match self {
            Self::Incomplete { handlers } => Some(Self::Incomplete {
                handlers: handlers.pushed(handler),
            }),
            Self::Cancelling { handlers } => Some(Self::Cancelling {
                handlers: handlers.pushed(handler),
            }),
            Self::Complete { .. } => None,
        }
    }

    /// Builds the same non-terminal state with `handler` removed.
    ///
    /// Returns `None` when the state is terminal or the handler is absent.
    pub(crate) fn without_handler(&self, handler: &Arc<Handler<T>>) -> Option<Self> {
        match self {
            Self::Incomplete { handlers } => Some(Self::Incomplete {
                handlers: handlers.without(handler)?,
            }),
            Self::Cancelling { handlers } => Some(Self::Cancelling {
                handlers: handlers.without(handler)?,
            }),
            Self::Complete { .. } => None,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }

    pub(crate) fn is_cancelling(&self) -> bool {
        matches!(self, Self::Cancelling { .. })
    }

    pub(crate) fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Returns a string name for the current state (for log fields).
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Incomplete { .. } => "Incomplete",
            Self::Cancelling { .. } => "Cancelling",
            Self::Complete { .. } => "Complete",
        }
    }
}

impl<T> fmt::Debug for JobState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete { handlers } | Self::Cancelling { handlers } => f
                .debug_struct(self.name())
                .field("handlers", &handlers.len())
                .finish(),
            Self::Complete { outcome } => f
                .debug_struct("Complete")
                .field("ok", &outcome.is_ok())
                .finish(),
        }
    }
}
