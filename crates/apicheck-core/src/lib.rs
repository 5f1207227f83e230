//! apicheck Core Library
//!
//! This library validates OpenAPI/Swagger documents: it detects whether
//! text is JSON or YAML, parses it, dereferences every `$ref`, checks the
//! result against the OpenAPI rules for its declared version, and reports
//! each violation in a structured form. It also converts documents between
//! JSON and YAML.

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod format;
pub mod history;
pub mod node;
pub mod parser;
pub mod pipeline;
pub mod pointer;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod source;

pub use crate::{
    config::Config,
    convert::{convert_text, Conversion, ConversionError},
    document::{ParsedDocument, RawDocument, SpecVersion, VersionError},
    error::{Error, Result},
    format::Format,
    history::{Action, HistoryEntry, SessionHistory},
    node::Node,
    parser::SyntaxError,
    pipeline::{Pipeline, PipelineError, Stage},
    resolver::{DereferencedDocument, ResolutionError},
    schema::{SchemaError, ValidationResult, ValidationViolation},
    source::{DefaultSource, DocumentSource, Locator, MemorySource},
};
