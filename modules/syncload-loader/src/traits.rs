//! Seams between loaders, their load functions and the registry.

use crate::loader::LoaderStats;

/// The user-supplied batch function.
///
/// Receives keys in request order and must return one slot per key, in the
/// same order. An `Err` slot fails only that key; returning `Err` from `load`
/// fails every key in the batch.
pub trait BatchFn<K, V> {
    fn load(&self, keys: &[K]) -> anyhow::Result<Vec<anyhow::Result<V>>>;
}

impl<K, V, F> BatchFn<K, V> for F
where
    F: Fn(&[K]) -> anyhow::Result<Vec<anyhow::Result<V>>>,
{
    fn load(&self, keys: &[K]) -> anyhow::Result<Vec<anyhow::Result<V>>> {
        self(keys)
    }
}

/// Type-erased view of a loader, as held by the `LoaderContext` registry.
pub trait PendingBatches {
    fn name(&self) -> String;

    /// Dispatch every batch not yet dispatched. Returns how many were sent.
    fn dispatch_pending(&self) -> usize;

    /// True when every batch has been dispatched.
    fn is_ready(&self) -> bool;

    fn stats(&self) -> LoaderStats;
}
