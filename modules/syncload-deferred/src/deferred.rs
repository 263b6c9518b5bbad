//! The settlement cell.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::DeferredError;

/// Why a deferred value rejected. Shared so a single failure can settle many
/// cells and still be compared by identity.
pub type Reason = Arc<anyhow::Error>;

/// Final state of a settled deferred value.
pub type Outcome<T> = Result<T, Reason>;

type Continuation<T> = Box<dyn FnOnce(Outcome<T>)>;

enum State<T> {
    Pending(Vec<Continuation<T>>),
    Fulfilled(T),
    Rejected(Reason),
}

/// A single-assignment value that is either pending, fulfilled or rejected.
///
/// Cloning the handle does not clone the cell: every clone observes the same
/// settlement. Transitions are `Pending → Fulfilled` or `Pending → Rejected`,
/// once; any later `fulfill`/`reject` is ignored (first write wins).
pub struct Deferred<T> {
    cell: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Clone + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    pub fn new() -> Self {
        Self {
            cell: Rc::new(RefCell::new(State::Pending(Vec::new()))),
        }
    }

    pub fn fulfilled(value: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(State::Fulfilled(value))),
        }
    }

    pub fn rejected(reason: impl Into<Reason>) -> Self {
        Self {
            cell: Rc::new(RefCell::new(State::Rejected(reason.into()))),
        }
    }

    /// Settle with a value. Returns `false` if the cell had already settled.
    pub fn fulfill(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with a rejection. Returns `false` if the cell had already settled.
    pub fn reject(&self, reason: impl Into<Reason>) -> bool {
        self.settle(Err(reason.into()))
    }

    /// Settle with a finished outcome.
    ///
    /// Continuations run after the cell borrow is released, so they are free to
    /// register further continuations (on this cell or any other) or to settle
    /// other cells.
    pub fn settle(&self, outcome: Outcome<T>) -> bool {
        let waiting = {
            let mut state = self.cell.borrow_mut();
            let State::Pending(waiting) = &mut *state else {
                return false;
            };
            let waiting = std::mem::take(waiting);
            *state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(Arc::clone(reason)),
            };
            waiting
        };

        for continuation in waiting {
            continuation(outcome.clone());
        }
        true
    }

    /// Register a continuation for the final outcome. Runs immediately when
    /// the cell has already settled.
    pub fn on_settle<F>(&self, continuation: F)
    where
        F: FnOnce(Outcome<T>) + 'static,
    {
        let settled = {
            let mut state = self.cell.borrow_mut();
            match &mut *state {
                State::Pending(waiting) => {
                    waiting.push(Box::new(continuation));
                    return;
                }
                State::Fulfilled(value) => Ok(value.clone()),
                State::Rejected(reason) => Err(Arc::clone(reason)),
            }
        };
        continuation(settled);
    }

    /// Chain a transformation of either outcome.
    ///
    /// The returned value settles with whatever the chosen handler returns; a
    /// handler returning `Err` rejects it.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Outcome<U> + 'static,
        R: FnOnce(Reason) -> Outcome<U> + 'static,
    {
        let next = Deferred::new();
        let settle = next.clone();
        self.on_settle(move |outcome| {
            let result = match outcome {
                Ok(value) => on_fulfilled(value),
                Err(reason) => on_rejected(reason),
            };
            settle.settle(result);
        });
        next
    }

    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Ok(f(value)), Err)
    }

    /// Chain a step that itself produces a deferred value; the result follows
    /// that inner value.
    pub fn and_then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Deferred<U> + 'static,
    {
        let next = Deferred::new();
        let settle = next.clone();
        self.on_settle(move |outcome| match outcome {
            Ok(value) => f(value).on_settle(move |inner| {
                settle.settle(inner);
            }),
            Err(reason) => {
                settle.reject(reason);
            }
        });
        next
    }

    /// Turn a rejection into a value.
    pub fn recover<F>(&self, f: F) -> Deferred<T>
    where
        F: FnOnce(Reason) -> T + 'static,
    {
        self.then(Ok, move |reason| Ok(f(reason)))
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.cell.borrow(), State::Pending(_))
    }

    /// Settled either way.
    pub fn is_ready(&self) -> bool {
        !self.is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(*self.cell.borrow(), State::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(*self.cell.borrow(), State::Rejected(_))
    }

    /// Snapshot of the final outcome, `None` while pending.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        match &*self.cell.borrow() {
            State::Pending(_) => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(Arc::clone(reason))),
        }
    }

    pub fn try_value(&self) -> Result<T, DeferredError> {
        match self.outcome() {
            None => Err(DeferredError::NotReady),
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(DeferredError::Rejected(reason)),
        }
    }

    /// Read the fulfilled value.
    ///
    /// # Panics
    ///
    /// Panics when the value is pending or rejected. Only call this once the
    /// drain loop has guaranteed completion.
    pub fn peek_value(&self) -> T {
        match self.try_value() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// True when both handles point at the same cell.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.cell, &b.cell)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.cell.borrow() {
            State::Pending(waiting) => format!("pending ({} waiting)", waiting.len()),
            State::Fulfilled(_) => "fulfilled".to_string(),
            State::Rejected(reason) => format!("rejected: {reason}"),
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}
