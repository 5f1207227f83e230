use serde::Serialize;

use crate::node::Node;
use crate::pointer::{path_to_pointer, PathSegment};

/// One schema failure.
///
/// Combinator keywords (`allOf`, `anyOf`, `oneOf`) carry one nested
/// violation per rejected branch in [`nested`](Self::nested).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationViolation {
    message: String,
    keyword: String,
    path: Vec<PathSegment>,
    schema_path: Vec<PathSegment>,
    nested: Vec<ValidationViolation>,
    instance: Node,
    schema: Node,
}

impl ValidationViolation {
    pub(crate) fn new(
        message: impl Into<String>,
        keyword: impl Into<String>,
        path: Vec<PathSegment>,
        schema_path: Vec<PathSegment>,
        instance: &Node,
        schema: &Node,
    ) -> Self {
        Self {
            message: message.into(),
            keyword: keyword.into(),
            path,
            schema_path,
            nested: Vec::new(),
            instance: instance.clone(),
            schema: schema.clone(),
        }
    }

    pub(crate) fn with_nested(mut self, nested: Vec<ValidationViolation>) -> Self {
        self.nested = nested;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The schema keyword that rejected the instance (`required`, `oneOf`...).
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Location of the offending node in the document.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// The path as a JSON pointer (`/paths/~1pets/get`).
    pub fn pointer(&self) -> String {
        path_to_pointer(&self.path)
    }

    /// Location of the failing keyword in the meta-schema.
    pub fn schema_path(&self) -> &[PathSegment] {
        &self.schema_path
    }

    pub fn nested(&self) -> &[ValidationViolation] {
        &self.nested
    }

    /// The offending document fragment.
    pub fn instance(&self) -> &Node {
        &self.instance
    }

    /// The schema fragment that rejected the instance.
    pub fn schema(&self) -> &Node {
        &self.schema
    }
}
