use thiserror::Error;

use crate::deferred::Reason;

#[derive(Error, Debug, Clone)]
pub enum DeferredError {
    /// The value was read before anything settled it. Reading a pending value
    /// means the caller skipped the drain loop.
    #[error("Deferred value is not ready yet")]
    NotReady,

    #[error("Deferred value was rejected: {0}")]
    Rejected(Reason),
}
