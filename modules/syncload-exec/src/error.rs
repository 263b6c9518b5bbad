use syncload_loader::DrainError;
use thiserror::Error;

/// Failures that abort a whole execution. Field-level failures are reported
/// in `ExecutionResult::errors` instead.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to drain loaders: {0}")]
    Drain(#[from] DrainError),
}
