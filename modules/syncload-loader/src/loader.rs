//! The batch loader.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use syncload_deferred::{all, Deferred, MaybeDeferred, Reason};
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use crate::context::LoaderContext;
use crate::error::LoaderError;
use crate::traits::{BatchFn, PendingBatches};

/// Per-loader settings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LoaderOptions {
    /// Label used in logs and stats. Defaults to the loader's registry slot.
    #[builder(default, setter(into, strip_option))]
    pub name: Option<String>,
    /// Largest number of keys sent to one `BatchFn` call. `None` or `Some(0)`
    /// means unbounded.
    #[builder(default, setter(strip_option))]
    pub max_batch_size: Option<usize>,
    /// Deduplicate keys through a per-loader cache of deferred values.
    #[builder(default = true)]
    pub cache: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone)]
struct Task<K, V> {
    key: K,
    outcome: Deferred<V>,
}

struct Batch<K, V> {
    tasks: Vec<Task<K, V>>,
    dispatched: bool,
}

/// Inspection copy of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSnapshot<K> {
    pub keys: Vec<K>,
    pub dispatched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    pub name: String,
    pub batches: usize,
    pub dispatched: usize,
    pub tasks: usize,
}

struct LoaderInner<K, V> {
    name: String,
    batch_fn: Box<dyn BatchFn<K, V>>,
    max_batch_size: Option<usize>,
    cache: Option<RefCell<HashMap<K, Deferred<V>>>>,
    batches: RefCell<Vec<Batch<K, V>>>,
}

/// A batching, deduplicating loader for one logical data source.
///
/// Cheap to clone; clones share batches and cache. Create one per data source
/// per evaluation and let it die with its `LoaderContext`: a loader reused
/// across evaluations would serve stale cached values. A batch function that
/// holds a handle to its own loader forms an `Rc` cycle and is never freed.
pub struct SyncDataLoader<K, V> {
    inner: Rc<LoaderInner<K, V>>,
}

impl<K, V> Clone for SyncDataLoader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K, V> SyncDataLoader<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    /// Create a loader and register it with `ctx` so the drain loop sees it.
    pub fn new<B>(ctx: &LoaderContext, batch_fn: B, options: LoaderOptions) -> Self
    where
        B: BatchFn<K, V> + 'static,
    {
        let name = options
            .name
            .unwrap_or_else(|| format!("loader#{}", ctx.len()));
        let inner = Rc::new(LoaderInner {
            name,
            batch_fn: Box::new(batch_fn),
            max_batch_size: options.max_batch_size.filter(|max| *max > 0),
            cache: options.cache.then(|| RefCell::new(HashMap::new())),
            batches: RefCell::new(Vec::new()),
        });
        ctx.register(inner.clone());
        Self { inner }
    }

    /// Like [`SyncDataLoader::new`] for a plain closure, so its argument and
    /// return types are inferred.
    pub fn from_fn<F>(ctx: &LoaderContext, f: F, options: LoaderOptions) -> Self
    where
        F: Fn(&[K]) -> anyhow::Result<Vec<anyhow::Result<V>>> + 'static,
    {
        Self::new(ctx, f, options)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Request the value for `key`.
    ///
    /// Returns immediately. With caching on, a repeated key gets the very same
    /// deferred value back and is sent to the batch function once.
    pub fn load(&self, key: K) -> Deferred<V> {
        if let Some(cache) = &self.inner.cache {
            if let Some(hit) = cache.borrow().get(&key) {
                return hit.clone();
            }
        }

        let outcome = Deferred::new();
        if let Some(cache) = &self.inner.cache {
            cache.borrow_mut().insert(key.clone(), outcome.clone());
        }

        let task = Task {
            key,
            outcome: outcome.clone(),
        };
        let mut batches = self.inner.batches.borrow_mut();
        let reuse = batches
            .last()
            .is_some_and(|batch| !self.inner.should_start_new_batch(batch));
        if !reuse {
            batches.push(Batch {
                tasks: Vec::new(),
                dispatched: false,
            });
        }
        if let Some(batch) = batches.last_mut() {
            batch.tasks.push(task);
        }

        outcome
    }

    /// Load several keys and combine them, in order, into one deferred list.
    pub fn load_many<I>(&self, keys: I) -> Deferred<Vec<V>>
    where
        I: IntoIterator<Item = K>,
    {
        all(keys
            .into_iter()
            .map(|key| MaybeDeferred::Deferred(self.load(key))))
    }

    /// Seed the cache with a known value. Ignored when caching is off or the
    /// key is already cached. Returns whether the value was stored.
    pub fn prime(&self, key: K, value: V) -> bool {
        let Some(cache) = &self.inner.cache else {
            return false;
        };
        let mut cache = cache.borrow_mut();
        if cache.contains_key(&key) {
            return false;
        }
        cache.insert(key, Deferred::fulfilled(value));
        true
    }

    pub fn dispatch_pending(&self) -> usize {
        self.inner.dispatch_pending()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    pub fn batches(&self) -> Vec<BatchSnapshot<K>> {
        self.inner
            .batches
            .borrow()
            .iter()
            .map(|batch| BatchSnapshot {
                keys: batch.tasks.iter().map(|task| task.key.clone()).collect(),
                dispatched: batch.dispatched,
            })
            .collect()
    }

    pub fn stats(&self) -> LoaderStats {
        self.inner.stats()
    }
}

impl<K, V> LoaderInner<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn should_start_new_batch(&self, batch: &Batch<K, V>) -> bool {
        batch.dispatched
            || self
                .max_batch_size
                .is_some_and(|max| batch.tasks.len() >= max)
    }

    /// Claim the batch at `index` for dispatch. The flag flips before the
    /// batch function runs, so a reentrant `load` starts a fresh batch.
    fn claim(&self, index: usize) -> Option<Vec<Task<K, V>>> {
        let mut batches = self.batches.borrow_mut();
        let batch = batches.get_mut(index)?;
        if batch.dispatched {
            return None;
        }
        batch.dispatched = true;
        Some(batch.tasks.clone())
    }

    fn dispatch_batch(&self, tasks: Vec<Task<K, V>>) {
        let keys: Vec<K> = tasks.iter().map(|task| task.key.clone()).collect();
        debug!(loader = %self.name, keys = keys.len(), "dispatching batch");

        let values = match self.batch_fn.load(&keys) {
            Ok(values) => values,
            Err(err) => {
                warn!(loader = %self.name, error = %err, "batch load failed");
                reject_all(&tasks, Arc::new(err));
                return;
            }
        };

        if values.len() != tasks.len() {
            let err = LoaderError::WrongNumberOfResultsReturned {
                expected: tasks.len(),
                received: values.len(),
            };
            warn!(loader = %self.name, error = %err, "batch load returned wrong number of results");
            reject_all(&tasks, Arc::new(anyhow::Error::new(err)));
            return;
        }

        for (task, value) in tasks.iter().zip(values) {
            match value {
                Ok(value) => task.outcome.fulfill(value),
                Err(err) => task.outcome.reject(err),
            };
        }
    }
}

fn reject_all<K, V: Clone + 'static>(tasks: &[Task<K, V>], reason: Reason) {
    for task in tasks {
        task.outcome.reject(Arc::clone(&reason));
    }
}

impl<K, V> PendingBatches for LoaderInner<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn dispatch_pending(&self) -> usize {
        // Batches queued by continuations while this runs wait for the next pass.
        let queued = self.batches.borrow().len();
        let mut dispatched = 0;
        for index in 0..queued {
            if let Some(tasks) = self.claim(index) {
                self.dispatch_batch(tasks);
                dispatched += 1;
            }
        }
        dispatched
    }

    fn is_ready(&self) -> bool {
        self.batches.borrow().iter().all(|batch| batch.dispatched)
    }

    fn stats(&self) -> LoaderStats {
        let batches = self.batches.borrow();
        LoaderStats {
            name: self.name.clone(),
            batches: batches.len(),
            dispatched: batches.iter().filter(|batch| batch.dispatched).count(),
            tasks: batches.iter().map(|batch| batch.tasks.len()).sum(),
        }
    }
}

impl<K, V> fmt::Debug for SyncDataLoader<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDataLoader")
            .field("name", &self.inner.name)
            .field("max_batch_size", &self.inner.max_batch_size)
            .field("cache", &self.inner.cache.is_some())
            .field("batches", &self.inner.batches.borrow().len())
            .finish()
    }
}
