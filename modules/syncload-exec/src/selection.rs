use serde_json::Value;

use crate::resolve::Args;

/// A requested field and its sub-selection, built in code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub name: String,
    pub alias: Option<String>,
    pub args: Args,
    pub children: Vec<Selection>,
}

impl Selection {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn select<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Selection>,
    {
        self.children.extend(children);
        self
    }

    /// Key under which the field appears in the response.
    pub fn response_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
