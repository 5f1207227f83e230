//! The validation pipeline: detect, parse, dereference, validate.
//!
//! ```text
//! Start -> Detected -> Parsed -> Dereferenced -> Valid | Invalid
//! ```
//!
//! Any step before validation may stop the run with a [`PipelineError`]
//! (the `Failed` state). Validation itself always produces a
//! [`ValidationResult`]; finding violations is an outcome, not a failure.
//!
//! # Examples
//!
//! ```no_run
//! use apicheck_core::{Config, Pipeline};
//!
//! # #[tokio::main]
//! # async fn main() -> apicheck_core::Result<()> {
//! let pipeline = Pipeline::with_defaults(Config::default())?;
//! let raw = pipeline.load("openapi.yaml").await?;
//! let result = pipeline.validate(&raw).await?;
//! println!("valid: {}", result.is_valid());
//! # Ok(())
//! # }
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::document::{DocumentError, ParsedDocument, RawDocument, VersionError};
use crate::parser::SyntaxError;
use crate::resolver::{ResolutionError, Resolver};
use crate::schema::{self, ValidationResult};
use crate::source::{DefaultSource, DocumentSource};

/// States of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Start,
    Detected,
    Parsed,
    Dereferenced,
    Valid,
    Invalid,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a run stopped before validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl PipelineError {
    /// The last state reached before the failure.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Syntax(_) => Stage::Detected,
            Self::Version(_) | Self::Resolution(_) => Stage::Parsed,
        }
    }

    /// Stable name of the failure, e.g. `SyntaxError` or `CyclicReference`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "SyntaxError",
            Self::Version(_) => "VersionError",
            Self::Resolution(e) => e.kind(),
        }
    }
}

impl From<DocumentError> for PipelineError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Syntax(e) => Self::Syntax(e),
            DocumentError::Version(e) => Self::Version(e),
        }
    }
}

/// Runs documents through the pipeline using one document source.
///
/// A pipeline holds no per-run state; independent documents may be
/// validated concurrently through the same instance.
pub struct Pipeline<S> {
    source: S,
    config: Config,
}

impl Pipeline<DefaultSource> {
    /// Pipeline reading files and URLs as `config` permits.
    pub fn with_defaults(config: Config) -> crate::Result<Self> {
        let source = DefaultSource::new(&config)?;
        Ok(Self::new(source, config))
    }
}

impl<S: DocumentSource> Pipeline<S> {
    pub fn new(source: S, config: Config) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load a document from a path or URL through this pipeline's source.
    pub async fn load(&self, location: &str) -> Result<RawDocument, PipelineError> {
        let raw = RawDocument::load(location, &self.source, self.config.fetch_timeout()).await?;
        log::debug!("{}: loaded {location} ({})", Stage::Start, raw.format());
        Ok(raw)
    }

    /// Parse a raw document and check its declared version.
    pub fn parse(&self, raw: &RawDocument) -> Result<ParsedDocument, PipelineError> {
        log::debug!(
            "{}: {} ({})",
            Stage::Detected,
            raw.format(),
            if raw.is_declared() { "declared" } else { "inferred" }
        );
        let parsed = raw.parse()?;
        log::debug!("{}: {}", Stage::Parsed, parsed.version());
        Ok(parsed)
    }

    /// Run `raw` through every stage.
    pub async fn validate(&self, raw: &RawDocument) -> Result<ValidationResult, PipelineError> {
        let parsed = self.parse(raw)?;

        let dereferenced = Resolver::new(&self.source)
            .with_timeout(self.config.fetch_timeout())
            .with_base_dir(self.config.base_dir.clone())
            .resolve(parsed, raw.origin())
            .await?;
        log::debug!("{}: no references remain", Stage::Dereferenced);

        let result = schema::validate(dereferenced);
        let stage = if result.is_valid() {
            Stage::Valid
        } else {
            Stage::Invalid
        };
        log::debug!("{stage}: {} violation(s)", result.violations().len());
        Ok(result)
    }
}
