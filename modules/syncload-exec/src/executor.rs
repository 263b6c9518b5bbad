//! Depth-first field evaluation with deferred completion.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use syncload_deferred::{all, all_of, Deferred, MaybeDeferred};
use syncload_loader::LoaderContext;
use tracing::{debug, info_span};

use crate::error::ExecError;
use crate::resolve::{Resolve, Resolved};
use crate::response::{ExecutionResult, FieldError, PathSegment};
use crate::selection::Selection;

/// Runs selections against a root object within one evaluation.
///
/// Holds the evaluation's `LoaderContext`; build loaders against
/// [`Executor::context`] and hand them to your resolvers. One executor per
/// top-level evaluation.
#[derive(Clone)]
pub struct Executor {
    ctx: LoaderContext,
    errors: Rc<RefCell<Vec<FieldError>>>,
}

impl Executor {
    pub fn new(ctx: LoaderContext) -> Self {
        Self {
            ctx,
            errors: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn context(&self) -> &LoaderContext {
        &self.ctx
    }

    pub fn execute(
        &self,
        root: &dyn Resolve,
        selections: &[Selection],
    ) -> Result<ExecutionResult, ExecError> {
        let span = info_span!("execute", evaluation = %self.ctx.id());
        let _guard = span.enter();

        let errors = self.errors.clone();
        let data = self
            .execute_fields(root, selections, &[])
            .into_deferred()
            .recover(move |reason| {
                errors.borrow_mut().push(FieldError {
                    message: reason.to_string(),
                    path: Vec::new(),
                });
                Value::Null
            });

        let resolved = self.ctx.resolve(&data);
        let errors = self.errors.borrow_mut().drain(..).collect();
        Ok(ExecutionResult {
            data: resolved?,
            errors,
        })
    }

    /// Evaluate sibling fields. Stays a plain value unless some field is
    /// still pending, in which case the object is combined with `all_of`.
    fn execute_fields(
        &self,
        source: &dyn Resolve,
        selections: &[Selection],
        path: &[PathSegment],
    ) -> MaybeDeferred<Value> {
        let mut fields = IndexMap::new();
        for selection in selections {
            let field_path = child_path(
                path,
                PathSegment::Field(selection.response_name().to_string()),
            );
            let completed = match source.resolve(&selection.name, &selection.args) {
                Ok(resolved) => self.complete_value(resolved, selection, &field_path),
                Err(err) => {
                    self.field_error(err.to_string(), field_path);
                    MaybeDeferred::Value(Value::Null)
                }
            };
            fields.insert(selection.response_name().to_string(), completed);
        }

        let object = all_of(fields).map(|fields| Value::Object(fields.into_iter().collect()));
        settled_early(object)
    }

    fn complete_value(
        &self,
        resolved: Resolved,
        selection: &Selection,
        path: &[PathSegment],
    ) -> MaybeDeferred<Value> {
        match resolved {
            Resolved::Null => MaybeDeferred::Value(Value::Null),
            Resolved::Value(value) => MaybeDeferred::Value(value),
            Resolved::Object(object) => {
                self.execute_fields(object.as_ref(), &selection.children, path)
            }
            Resolved::List(items) => {
                let completed: Vec<_> = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let item_path = child_path(path, PathSegment::Index(index));
                        self.complete_value(item, selection, &item_path)
                    })
                    .collect();
                settled_early(all(completed).map(Value::Array))
            }
            Resolved::Deferred(deferred) => self.complete_deferred(deferred, selection, path),
        }
    }

    /// Finish a field once its value arrives; a rejection nulls the field and
    /// records an error at its path.
    fn complete_deferred(
        &self,
        deferred: Deferred<Resolved>,
        selection: &Selection,
        path: &[PathSegment],
    ) -> MaybeDeferred<Value> {
        let (executor, selection, field_path) = (self.clone(), selection.clone(), path.to_vec());
        let (on_error, error_path) = (self.clone(), path.to_vec());

        let completed = deferred
            .and_then(move |resolved| {
                executor
                    .complete_value(resolved, &selection, &field_path)
                    .into_deferred()
            })
            .recover(move |reason| {
                on_error.field_error(reason.to_string(), error_path);
                Value::Null
            });
        settled_early(completed)
    }

    fn field_error(&self, message: String, path: Vec<PathSegment>) {
        debug!(%message, ?path, "field error");
        self.errors.borrow_mut().push(FieldError { message, path });
    }
}

fn child_path(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut child = path.to_vec();
    child.push(segment);
    child
}

/// Collapse a deferred value that has already fulfilled back into a plain one.
fn settled_early(deferred: Deferred<Value>) -> MaybeDeferred<Value> {
    match deferred.outcome() {
        Some(Ok(value)) => MaybeDeferred::Value(value),
        _ => MaybeDeferred::Deferred(deferred),
    }
}
