//! Synchronous deferred values.
//!
//! A `Deferred<T>` is a single-assignment cell that settles exactly once and
//! runs its continuations synchronously, in registration order, at the moment
//! it settles. There is no scheduler tick: settlement is a plain function call,
//! which lets a depth-first, non-suspending evaluator build "asynchronous
//! looking" chains that complete once an outer loop feeds them values.
//!
//! `all` / `all_of` merge many deferred values into one, failing fast on the
//! first rejection.

pub mod combinators;
pub mod deferred;
pub mod error;

pub use combinators::{all, all_of, MaybeDeferred};
pub use deferred::{Deferred, Outcome, Reason};
pub use error::DeferredError;
