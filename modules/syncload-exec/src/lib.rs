//! Synchronous field executor built on deferred values and batch loaders.
//!
//! Fields are evaluated depth-first. A field whose resolver hands back a
//! deferred value is completed through a continuation, and an object with any
//! deferred field becomes a deferred value itself via `all_of`. Once the walk
//! is done the executor drains the evaluation's loaders and reads the root.

pub mod error;
pub mod executor;
pub mod resolve;
pub mod response;
pub mod selection;

pub use error::ExecError;
pub use executor::Executor;
pub use resolve::{Args, Resolve, Resolved};
pub use response::{ExecutionResult, FieldError, PathSegment};
pub use selection::Selection;
