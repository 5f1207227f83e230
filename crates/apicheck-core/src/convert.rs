//! JSON ↔ YAML conversion of parsed documents.
//!
//! Conversion works on the [`Node`] tree, so key order, sequence order and
//! scalar types survive both directions. It never validates or resolves:
//! an invalid document converts as readily as a valid one. Converting a
//! document into the format it is already in is refused.
//!
//! # Examples
//!
//! ```
//! use apicheck_core::convert::convert_text;
//! use apicheck_core::format::Format;
//!
//! let yaml = "openapi: \"3.0.0\"\ninfo:\n  title: t\n  version: \"1\"\npaths: {}\n";
//! let converted = convert_text(yaml, Format::Json, 2).unwrap();
//! assert!(converted.text().starts_with("{\n  \"openapi\": \"3.0.0\""));
//! ```

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::format::Format;
use crate::history::Action;
use crate::node::{Node, Scalar};
use crate::parser::{self, SyntaxError};
use crate::pointer::{path_to_pointer, PathSegment};

/// A document that cannot be written in the requested format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("document is already {format}")]
    SameFormat { format: Format },

    /// `.inf`/`.nan` are YAML-only; JSON has no representation for them
    #[error("non-finite number at {path} has no JSON representation")]
    NonFiniteNumber { path: String },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("serialization failed: {message}")]
    Serialize { message: String },
}

/// Converted text together with the formats involved. The source and
/// target formats always differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    source: Format,
    target: Format,
    text: String,
}

impl Conversion {
    pub fn source(&self) -> Format {
        self.source
    }

    pub fn target(&self) -> Format {
        self.target
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// History label of this conversion. The target is always the other
    /// format, so the source decides.
    pub fn action(&self) -> Action {
        match self.source {
            Format::Json => Action::ConvertJsonToYaml,
            Format::Yaml => Action::ConvertYamlToJson,
        }
    }

    /// Filename offered when the converted text is saved.
    pub fn suggested_filename(&self) -> &'static str {
        self.target.suggested_filename()
    }
}

/// Render `node` as JSON indented by `indent` spaces, newline-terminated.
pub fn to_json(node: &Node, indent: usize) -> Result<String, ConversionError> {
    let mut path = Vec::new();
    ensure_finite(node, &mut path)?;

    let indent = " ".repeat(indent);
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    node.serialize(&mut serializer).map_err(|e| ConversionError::Serialize {
        message: e.to_string(),
    })?;

    let mut text = String::from_utf8(out).map_err(|e| ConversionError::Serialize {
        message: e.to_string(),
    })?;
    text.push('\n');
    Ok(text)
}

/// Render `node` as block-style YAML.
pub fn to_yaml(node: &Node) -> Result<String, ConversionError> {
    serde_yaml::to_string(node).map_err(|e| ConversionError::Serialize {
        message: e.to_string(),
    })
}

/// Render `node` in `target`.
pub fn to_format(node: &Node, target: Format, json_indent: usize) -> Result<String, ConversionError> {
    match target {
        Format::Json => to_json(node, json_indent),
        Format::Yaml => to_yaml(node),
    }
}

/// Render `node`, read from a `source` document, in `target`.
pub fn convert_node(
    node: &Node,
    source: Format,
    target: Format,
    json_indent: usize,
) -> Result<Conversion, ConversionError> {
    if source == target {
        return Err(ConversionError::SameFormat { format: source });
    }
    log::debug!("converting {source} document to {target}");
    Ok(Conversion {
        source,
        target,
        text: to_format(node, target, json_indent)?,
    })
}

/// Detect the format of `text`, parse it and render it in `target`.
pub fn convert_text(text: &str, target: Format, json_indent: usize) -> Result<Conversion, ConversionError> {
    let (source, node) = parser::parse_detected(text)?;
    convert_node(&node, source, target, json_indent)
}

fn ensure_finite(node: &Node, path: &mut Vec<PathSegment>) -> Result<(), ConversionError> {
    match node {
        Node::Scalar(Scalar::Number(n)) if !n.is_finite() => Err(ConversionError::NonFiniteNumber {
            path: path_to_pointer(path),
        }),
        Node::Mapping(map) => {
            for (key, value) in map {
                path.push(PathSegment::from(key.as_str()));
                ensure_finite(value, path)?;
                path.pop();
            }
            Ok(())
        }
        Node::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                ensure_finite(item, path)?;
                path.pop();
            }
            Ok(())
        }
        Node::Scalar(_) => Ok(()),
    }
}
