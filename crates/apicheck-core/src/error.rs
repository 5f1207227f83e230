//! Error handling for the apicheck validation library.
//!
//! Every pipeline stage owns a typed error ([`SyntaxError`],
//! [`VersionError`], [`ResolutionError`], [`ConversionError`]). This module
//! defines the crate-wide `Error` that wraps them together with I/O,
//! serialization and configuration failures, along with a convenient
//! `Result` type alias.
//!
//! # Examples
//!
//! ```
//! use apicheck_core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     // Operations that might fail...
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::convert::ConversionError;
use crate::document::VersionError;
use crate::parser::SyntaxError;
use crate::pipeline::PipelineError;
use crate::resolver::ResolutionError;
use crate::schema::SchemaError;

/// Result type for apicheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for apicheck operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error outside the document parser
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error outside the document parser
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be read
    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML configuration could not be written
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON or YAML text
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Missing or unsupported `swagger`/`openapi` field
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A `$ref` could not be dereferenced
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A document could not be represented in the target format
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A user-supplied schema cannot be compiled
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The validation pipeline stopped before validation
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}
