//! Immutable handler list traversed to fan out notifications.
//!
//! The list is a persistent cons list: pushing shares the whole previous
//! list, removal rebuilds only the prefix before the removed node. A
//! snapshot captured together with a state transition can therefore be
//! iterated without locks while concurrent removals build newer lists.

use crate::error::Result;
use core::fmt;
use std::sync::Arc;

type CompletionCallback<T> = Box<dyn Fn(&Result<T>) + Send + Sync>;
type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// A registered callback, one of two kinds.
///
/// Completion handlers observe the terminal result; cancel handlers observe
/// the transition into `Cancelling`. Fan-out filters by kind with a match.
pub(crate) enum Handler<T> {
    /// Invoked with the job result on the terminal transition.
    Completion(CompletionCallback<T>),
    /// Invoked when cancellation is requested.
    Cancel(CancelCallback),
}

impl<T> Handler<T> {
    pub(crate) fn completion(callback: CompletionCallback<T>) -> Self {
        Self::Completion(callback)
    }

    pub(crate) fn cancel(callback: CancelCallback) -> Self {
        Self::Cancel(callback)
    }

    pub(crate) fn fire_completion(&self, result: &Result<T>) {
        if let Self::Completion(callback) = self {
            callback(result);
        }
    }

    pub(crate) fn fire_cancel(&self) {
        if let Self::Cancel(callback) = self {
            callback();
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completion(_) => f.write_str("Handler::Completion"),
            Self::Cancel(_) => f.write_str("Handler::Cancel"),
        }
    }
}

struct Node<T> {
    handler: Arc<Handler<T>>,
    next: Option<Arc<Node<T>>>,
}

/// Persistent list of registered handlers, iterated most-recent first.
pub(crate) struct HandlerList<T> {
    head: Option<Arc<Node<T>>>,
    len: usize,
}

// Derived Clone would demand `T: Clone`; only the Arc spine is cloned.
impl<T> Clone for HandlerList<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T> HandlerList<T> {
    pub(crate) fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Returns a new list with `handler` prepended.
    pub(crate) fn pushed(&self, handler: Arc<Handler<T>>) -> Self {
        Self {
            head: Some(Arc::new(Node {
                handler,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Returns a new list with the first node holding `target` removed, or
    /// `None` if no node holds it. Identity is pointer equality.
    pub(crate) fn without(&self, target: &Arc<Handler<T>>) -> Option<Self> {
        let mut prefix = Vec::new();
        let mut cursor = self.head.as_ref();
        let suffix = loop {
            let node = cursor?;
            if Arc::ptr_eq(&node.handler, target) {
                break node.next.clone();
            }
            prefix.push(Arc::clone(&node.handler));
            cursor = node.next.as_ref();
        };

        let mut head = suffix;
        for handler in prefix.into_iter().rev() {
            head = Some(Arc::new(Node {
                handler,
                next: head,
            }));
        }
        Some(Self {
            head,
            len: self.len - 1,
        })
    }

    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            node: self.head.as_deref(),
        }
    }

    /// Invokes every completion-kind handler with `result`.
    pub(crate) fn notify_completion(&self, result: &Result<T>) {
        for handler in self.iter() {
            handler.fire_completion(result);
        }
    }

    /// Invokes every cancel-kind handler.
    pub(crate) fn notify_cancel(&self) {
        for handler in self.iter() {
            handler.fire_cancel();
        }
    }
}

impl<T> fmt::Debug for HandlerList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerList(len = {})", self.len)
    }
}

pub(crate) struct Iter<'a, T> {
    node: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a Arc<Handler<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.node?;
        self.node = node.next.as_deref();
        Some(&node.handler)
    }
}
