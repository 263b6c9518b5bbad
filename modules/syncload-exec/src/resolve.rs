//! What a resolver hands back to the executor.

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use syncload_deferred::Deferred;

/// Field arguments.
pub type Args = Map<String, Value>;

/// An object the executor can select fields from.
pub trait Resolve {
    fn resolve(&self, field: &str, args: &Args) -> anyhow::Result<Resolved>;
}

/// A field's raw result, before completion against its sub-selection.
#[derive(Clone)]
pub enum Resolved {
    Null,
    Value(Value),
    Object(Rc<dyn Resolve>),
    List(Vec<Resolved>),
    /// Not known yet; typically a `load` chained into one of the other forms.
    Deferred(Deferred<Resolved>),
}

impl Resolved {
    pub fn value(value: impl Into<Value>) -> Self {
        Resolved::Value(value.into())
    }

    pub fn object(object: impl Resolve + 'static) -> Self {
        Resolved::Object(Rc::new(object))
    }

    /// Resolve later, from a loaded value.
    pub fn from_deferred<T, F>(deferred: &Deferred<T>, f: F) -> Self
    where
        T: Clone + 'static,
        F: FnOnce(T) -> Resolved + 'static,
    {
        Resolved::Deferred(deferred.map(f))
    }
}

impl From<Deferred<Resolved>> for Resolved {
    fn from(deferred: Deferred<Resolved>) -> Self {
        Resolved::Deferred(deferred)
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Null => f.write_str("Null"),
            Resolved::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolved::Object(_) => f.write_str("Object(..)"),
            Resolved::List(items) => f.debug_tuple("List").field(items).finish(),
            Resolved::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
        }
    }
}
