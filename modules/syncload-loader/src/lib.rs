//! Batching, deduplicating loaders for synchronous evaluators.
//!
//! `load(key)` hands back a pending `Deferred` right away and queues the key
//! into the loader's current batch. Nothing is fetched until the evaluation's
//! `LoaderContext` drains: every undispatched batch of every registered loader
//! goes to its `BatchFn` in one call, results settle the waiting values, and
//! any loads queued by their continuations are picked up on the next pass.
//! Draining stops once a pass leaves nothing undispatched.

pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod traits;

pub use config::LoaderConfig;
pub use context::{DrainReport, LoaderContext};
pub use error::{ConfigError, DrainError, LoaderError};
pub use loader::{BatchSnapshot, LoaderOptions, LoaderStats, SyncDataLoader};
pub use traits::{BatchFn, PendingBatches};
