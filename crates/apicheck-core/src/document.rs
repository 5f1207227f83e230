//! Raw and parsed API description documents.
//!
//! A [`RawDocument`] is immutable source text plus its format. Parsing it
//! yields a [`ParsedDocument`]: the root [`Node`] together with the
//! OpenAPI version declared by its `swagger` or `openapi` field. Documents
//! without a supported version are rejected here, before any reference
//! is resolved.
//!
//! # Examples
//!
//! ```
//! use apicheck_core::document::{RawDocument, SpecVersion};
//!
//! let raw = RawDocument::new("openapi: 3.0.3\ninfo: {title: t, version: '1'}\npaths: {}\n");
//! let doc = raw.parse().unwrap();
//! assert_eq!(doc.version(), &SpecVersion::V3 { minor: 0, patch: 3 });
//! assert_eq!(doc.title(), Some("t"));
//! ```

use std::fmt;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::format::Format;
use crate::node::Node;
use crate::parser::{self, SyntaxError};
use crate::resolver::{fetch_bounded, ResolutionError};
use crate::source::{DocumentSource, Locator};

static OPENAPI_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^3\.(\d+)\.(\d+)(-[0-9A-Za-z.\-]+)?$").unwrap());

/// Immutable document text with a declared or inferred format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    text: String,
    format: Format,
    declared: bool,
    origin: Option<Locator>,
}

impl RawDocument {
    /// Wrap inline text; the format is inferred by the detector.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let format = Format::detect(&text);
        Self {
            text,
            format,
            declared: false,
            origin: None,
        }
    }

    /// Wrap text whose format is known up front.
    pub fn with_format(text: impl Into<String>, format: Format) -> Self {
        Self {
            text: text.into(),
            format,
            declared: true,
            origin: None,
        }
    }

    /// Record where the text came from; relative `$ref`s resolve against it.
    pub fn with_origin(mut self, origin: Locator) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Load a document from a file path or an `http(s)` URL.
    ///
    /// The format is declared by the response media type or the extension
    /// when either is recognised, and inferred from the text otherwise.
    pub async fn load<S: DocumentSource>(
        location: &str,
        source: &S,
        timeout: Duration,
    ) -> Result<Self, ResolutionError> {
        let locator = Locator::parse(location).map_err(|e| ResolutionError::InvalidReference {
            reference: location.to_string(),
            reason: e.to_string(),
        })?;
        let fetched = fetch_bounded(source, &locator, timeout).await?;
        let raw = match fetched.declared_format(&locator) {
            Some(format) => Self::with_format(fetched.text, format),
            None => Self::new(fetched.text),
        };
        Ok(raw.with_origin(locator))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Whether the format was declared rather than detected.
    pub fn is_declared(&self) -> bool {
        self.declared
    }

    pub fn origin(&self) -> Option<&Locator> {
        self.origin.as_ref()
    }

    /// Parse the text into a tree without looking at its version.
    pub fn parse_node(&self) -> Result<Node, SyntaxError> {
        parser::parse(&self.text, self.format)
    }

    /// Parse the text and extract the declared OpenAPI version.
    pub fn parse(&self) -> Result<ParsedDocument, DocumentError> {
        let root = self.parse_node()?;
        Ok(ParsedDocument::from_node(root)?)
    }
}

/// OpenAPI version family declared by a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpecVersion {
    /// `swagger: "2.0"`
    V2,
    /// `openapi: "3.<minor>.<patch>"`
    V3 { minor: u32, patch: u32 },
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => f.write_str("Swagger 2.0"),
            Self::V3 { minor, patch } => write!(f, "OpenAPI 3.{minor}.{patch}"),
        }
    }
}

/// The document has no usable `swagger`/`openapi` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("document root must be a mapping, found {found}")]
    NotAMapping { found: &'static str },
    #[error("missing version field: expected `openapi` (3.x) or `swagger` (2.0)")]
    Missing,
    #[error("document declares both `swagger` and `openapi`")]
    Ambiguous,
    #[error("unsupported `{field}` value {found}")]
    Unsupported { field: &'static str, found: String },
}

/// Either stage of turning text into a [`ParsedDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// A parsed document with a supported declared version.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    root: Node,
    version: SpecVersion,
}

impl ParsedDocument {
    pub fn from_node(root: Node) -> Result<Self, VersionError> {
        let version = detect_version(&root)?;
        Ok(Self { root, version })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn version(&self) -> &SpecVersion {
        &self.version
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Get the title of the API
    pub fn title(&self) -> Option<&str> {
        self.root.get("info")?.get("title")?.as_str()
    }

    /// Get the version of the API (`info.version`)
    pub fn api_version(&self) -> Option<&str> {
        self.root.get("info")?.get("version")?.as_str()
    }
}

fn detect_version(root: &Node) -> Result<SpecVersion, VersionError> {
    let map = root.as_mapping().ok_or(VersionError::NotAMapping {
        found: root.type_name(),
    })?;
    match (map.get("swagger"), map.get("openapi")) {
        (Some(_), Some(_)) => Err(VersionError::Ambiguous),
        (None, None) => Err(VersionError::Missing),
        (Some(swagger), None) => match swagger.as_str() {
            Some("2.0") => Ok(SpecVersion::V2),
            _ => Err(VersionError::Unsupported {
                field: "swagger",
                found: swagger.to_compact_string(),
            }),
        },
        (None, Some(openapi)) => {
            let unsupported = || VersionError::Unsupported {
                field: "openapi",
                found: openapi.to_compact_string(),
            };
            let declared = openapi.as_str().ok_or_else(unsupported)?;
            let caps = OPENAPI_VERSION.captures(declared).ok_or_else(unsupported)?;
            let minor = caps[1].parse().map_err(|_| unsupported())?;
            let patch = caps[2].parse().map_err(|_| unsupported())?;
            Ok(SpecVersion::V3 { minor, patch })
        }
    }
}
