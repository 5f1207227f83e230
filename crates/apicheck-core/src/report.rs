//! Human-readable and machine-readable rendering of validation outcomes.
//!
//! Rendering is purely structural: it never touches the network or the
//! parser, and it cannot fail.

use std::fmt::Write;

use serde::Serialize;

use crate::node::Node;
use crate::pointer::PathSegment;
use crate::schema::{ValidationResult, ValidationViolation};

/// Text reported for a document without violations.
pub const VALID_TEXT: &str = "Valid Swagger Specification";

/// Render one violation and, indented beneath it, its nested violations.
pub fn format_violation(violation: &ValidationViolation) -> String {
    let mut out = String::new();
    write_violation(&mut out, violation, 0);
    out
}

/// Render a whole validation outcome.
pub fn format_result(result: &ValidationResult) -> String {
    match result {
        ValidationResult::Valid(_) => VALID_TEXT.to_string(),
        ValidationResult::Invalid(violations) => violations
            .iter()
            .map(format_violation)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render a failure that has no violation structure: its message, verbatim.
pub fn format_error(error: &dyn std::error::Error) -> String {
    error.to_string()
}

fn write_violation(out: &mut String, violation: &ValidationViolation, depth: usize) {
    let indent = "  ".repeat(depth);
    let bullet = if depth == 0 { "" } else { "- " };
    let cont = if depth == 0 { "" } else { "  " };

    // Writing to a String cannot fail
    let _ = writeln!(
        out,
        "{indent}{bullet}Validation failed due to: {}",
        violation.message()
    );
    let _ = writeln!(out, "{indent}{cont}Keyword: {}", violation.keyword());
    let _ = writeln!(out, "{indent}{cont}Path: {}", join_path(violation.path()));
    if !violation.schema_path().is_empty() {
        let _ = writeln!(
            out,
            "{indent}{cont}Schema Path: {}",
            join_path(violation.schema_path())
        );
    }
    if !violation.nested().is_empty() {
        let _ = writeln!(out, "{indent}{cont}Validation Errors:");
        for nested in violation.nested() {
            write_violation(out, nested, depth + 1);
        }
    }
    write_fragment(out, &format!("{indent}{cont}"), "Instance", violation.instance());
    write_fragment(out, &format!("{indent}{cont}"), "Schema", violation.schema());
}

fn write_fragment(out: &mut String, prefix: &str, label: &str, node: &Node) {
    let pretty = node.to_pretty_string();
    let mut lines = pretty.lines();
    let _ = writeln!(out, "{prefix}{label}: {}", lines.next().unwrap_or_default());
    for line in lines {
        let _ = writeln!(out, "{prefix}{line}");
    }
}

fn join_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "(root)".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Overall outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Valid,
    Invalid,
    Failed,
}

/// A failure that stopped the pipeline before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

/// Serializable summary of a validation outcome, for `--output json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub status: Status,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<ValidationViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl Report {
    pub fn from_result(result: &ValidationResult) -> Self {
        let status = if result.is_valid() {
            Status::Valid
        } else {
            Status::Invalid
        };
        Self {
            status,
            violations: result.violations().to_vec(),
            error: None,
        }
    }

    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            violations: Vec::new(),
            error: Some(ErrorReport {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }
}
