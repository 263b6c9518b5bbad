//! The drain loop.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use syncload_deferred::Deferred;
use tracing::{debug, debug_span, error, info};
use uuid::Uuid;

use crate::config::LoaderConfig;
use crate::error::DrainError;
use crate::loader::LoaderStats;
use crate::traits::PendingBatches;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub passes: usize,
    pub batches_dispatched: usize,
}

struct ContextInner {
    id: Uuid,
    max_passes: Option<usize>,
    loaders: RefCell<Vec<Rc<dyn PendingBatches>>>,
}

/// Registry of the loaders belonging to one top-level evaluation.
///
/// Loaders register themselves on construction. Create a fresh context per
/// evaluation and drop it afterwards; sharing one between evaluations leaks
/// cached values and queued batches across them.
#[derive(Clone)]
pub struct LoaderContext {
    inner: Rc<ContextInner>,
}

impl Default for LoaderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderContext {
    pub fn new() -> Self {
        Self::with_max_passes(None)
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::with_max_passes(config.max_drain_passes)
    }

    /// `max_passes` bounds the drain loop; `None` or `Some(0)` lets it run
    /// until settled.
    pub fn with_max_passes(max_passes: Option<usize>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                id: Uuid::new_v4(),
                max_passes: max_passes.filter(|max| *max > 0),
                loaders: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Evaluation id, attached to every drain span.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub(crate) fn register(&self, loader: Rc<dyn PendingBatches>) {
        debug!(evaluation = %self.inner.id, loader = %loader.name(), "loader registered");
        self.inner.loaders.borrow_mut().push(loader);
    }

    /// Number of registered loaders.
    pub fn len(&self) -> usize {
        self.inner.loaders.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot in registration order. Loaders created while the snapshot is
    /// in use show up in the next one.
    fn snapshot(&self) -> Vec<Rc<dyn PendingBatches>> {
        self.inner.loaders.borrow().clone()
    }

    /// True when no registered loader has an undispatched batch.
    pub fn is_ready(&self) -> bool {
        self.snapshot().iter().all(|loader| loader.is_ready())
    }

    pub fn stats(&self) -> Vec<LoaderStats> {
        self.snapshot().iter().map(|loader| loader.stats()).collect()
    }

    /// Dispatch batches across all loaders until a pass leaves nothing pending.
    ///
    /// Dispatching settles deferred values, whose continuations may queue new
    /// batches or create new loaders, so one pass is rarely enough. Readiness
    /// is checked against the live registry rather than the pass snapshot, so
    /// a loader born during the last pass is never skipped.
    pub fn drain(&self) -> Result<DrainReport, DrainError> {
        let span = debug_span!("drain", evaluation = %self.inner.id);
        let _guard = span.enter();

        let mut report = DrainReport::default();
        loop {
            report.passes += 1;
            for loader in self.snapshot() {
                report.batches_dispatched += loader.dispatch_pending();
            }

            if self.is_ready() {
                break;
            }

            if let Some(limit) = self.inner.max_passes {
                if report.passes >= limit {
                    error!(limit, "drain loop exceeded pass limit");
                    return Err(DrainError::PassLimitExceeded { limit });
                }
            }
        }

        info!(
            passes = report.passes,
            batches = report.batches_dispatched,
            loaders = self.len(),
            "drain complete"
        );
        Ok(report)
    }

    /// Fail if any registered loader still holds an undispatched batch.
    pub fn check_drained(&self) -> Result<(), DrainError> {
        match self.snapshot().iter().find(|loader| !loader.is_ready()) {
            Some(loader) => {
                error!(
                    evaluation = %self.inner.id,
                    loader = %loader.name(),
                    "undispatched batches after drain"
                );
                Err(DrainError::UndispatchedBatches {
                    loader: loader.name(),
                })
            }
            None => Ok(()),
        }
    }

    /// Drain, then read the root value of the evaluation.
    pub fn resolve<T: Clone + 'static>(&self, root: &Deferred<T>) -> Result<T, DrainError> {
        self.drain()?;
        self.check_drained()?;
        Ok(root.try_value()?)
    }
}
