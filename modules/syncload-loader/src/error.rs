use syncload_deferred::DeferredError;
use thiserror::Error;

/// Whole-batch failures raised by the loader itself (as opposed to errors
/// returned by a `BatchFn`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error(
        "Received wrong number of results in dataloader, expected: {expected}, received: {received}"
    )]
    WrongNumberOfResultsReturned { expected: usize, received: usize },
}

#[derive(Error, Debug, Clone)]
pub enum DrainError {
    #[error("Drain loop gave up after {limit} passes with batches still pending")]
    PassLimitExceeded { limit: usize },

    /// A loader still has work queued after the drain loop finished. This is a
    /// broken drain contract, never a normal runtime condition.
    #[error("Loader {loader} has undispatched batches after draining")]
    UndispatchedBatches { loader: String },

    #[error(transparent)]
    Deferred(#[from] DeferredError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}
