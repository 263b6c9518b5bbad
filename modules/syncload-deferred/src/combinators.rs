//! Aggregation: many deferred values → one deferred value.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::deferred::Deferred;

/// An input to the combinators: either a plain value or a deferred one.
#[derive(Debug, Clone)]
pub enum MaybeDeferred<T> {
    Value(T),
    Deferred(Deferred<T>),
}

impl<T> From<Deferred<T>> for MaybeDeferred<T> {
    fn from(deferred: Deferred<T>) -> Self {
        MaybeDeferred::Deferred(deferred)
    }
}

impl<T: Clone + 'static> MaybeDeferred<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, MaybeDeferred::Deferred(_))
    }

    pub fn into_deferred(self) -> Deferred<T> {
        match self {
            MaybeDeferred::Value(value) => Deferred::fulfilled(value),
            MaybeDeferred::Deferred(deferred) => deferred,
        }
    }

    /// Transform the value, staying plain when the input is plain.
    pub fn map<U, F>(self, f: F) -> MaybeDeferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        match self {
            MaybeDeferred::Value(value) => MaybeDeferred::Value(f(value)),
            MaybeDeferred::Deferred(deferred) => MaybeDeferred::Deferred(deferred.map(f)),
        }
    }
}

struct Collector<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

/// Combine values into one deferred list, preserving input order.
///
/// Settled inputs are recorded immediately; pending ones get a continuation
/// that records their value at its input index. The result fulfills once
/// every slot is filled, or rejects on the first rejection seen. Inputs that
/// settle after that still run their continuations but cannot change the
/// result.
pub fn all<T, I>(values: I) -> Deferred<Vec<T>>
where
    T: Clone + 'static,
    I: IntoIterator<Item = MaybeDeferred<T>>,
{
    let values: Vec<MaybeDeferred<T>> = values.into_iter().collect();
    let combined = Deferred::new();

    if values.is_empty() {
        combined.fulfill(Vec::new());
        return combined;
    }

    let collector = Rc::new(RefCell::new(Collector {
        slots: (0..values.len()).map(|_| None).collect(),
        remaining: values.len(),
    }));

    for (index, value) in values.into_iter().enumerate() {
        match value {
            MaybeDeferred::Value(value) => record(&collector, &combined, index, value),
            MaybeDeferred::Deferred(deferred) => {
                let collector = Rc::clone(&collector);
                let combined = combined.clone();
                deferred.on_settle(move |outcome| match outcome {
                    Ok(value) => record(&collector, &combined, index, value),
                    Err(reason) => {
                        if combined.reject(reason) {
                            trace!(index, "combined value rejected by element");
                        }
                    }
                });
            }
        }
    }

    combined
}

fn record<T: Clone + 'static>(
    collector: &Rc<RefCell<Collector<T>>>,
    combined: &Deferred<Vec<T>>,
    index: usize,
    value: T,
) {
    let finished = {
        let mut collector = collector.borrow_mut();
        if collector.slots[index].replace(value).is_none() {
            collector.remaining -= 1;
        }
        collector.remaining == 0
    };
    if !finished || combined.is_ready() {
        return;
    }

    let values: Option<Vec<T>> = collector
        .borrow_mut()
        .slots
        .iter_mut()
        .map(Option::take)
        .collect();
    if let Some(values) = values {
        combined.fulfill(values);
    }
}

/// Keyed form of [`all`]: combines the map's values in iteration order and
/// zips them back onto the same keys.
pub fn all_of<K, T>(entries: IndexMap<K, MaybeDeferred<T>>) -> Deferred<IndexMap<K, T>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
{
    let (keys, values): (Vec<K>, Vec<MaybeDeferred<T>>) = entries.into_iter().unzip();
    all(values).map(move |values| keys.into_iter().zip(values).collect())
}
