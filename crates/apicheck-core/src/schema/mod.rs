//! Validation of dereferenced documents against the OpenAPI rule sets.
//!
//! The rule set is picked from the declared version: Swagger 2.0, OpenAPI
//! 3.0.x, or OpenAPI 3.1 (used for every later 3.x as well). Each rule set
//! is a bundled draft-04 meta-schema compiled once by the `jsonschema`
//! crate, followed by the [`semantic`] checks a meta-schema cannot express.
//! OpenAPI 3.1 Schema Objects are checked against the JSON Schema 2020-12
//! meta-schema.
//!
//! # Examples
//!
//! ```no_run
//! use apicheck_core::schema::{validate, ValidationResult};
//! # async fn run(doc: apicheck_core::resolver::DereferencedDocument) {
//! match validate(doc) {
//!     ValidationResult::Valid(_) => println!("valid"),
//!     ValidationResult::Invalid(violations) => {
//!         for violation in &violations {
//!             println!("{}: {}", violation.pointer(), violation.message());
//!         }
//!     }
//! }
//! # }
//! ```

mod engine;
mod semantic;
mod violation;

use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;

use crate::document::SpecVersion;
use crate::node::Node;
use crate::resolver::DereferencedDocument;

use engine::Engine;
pub use violation::ValidationViolation;

static SWAGGER_20: Lazy<Engine> = Lazy::new(|| bundled(include_str!("../../schemas/swagger-2.0.json")));
static OPENAPI_30: Lazy<Engine> = Lazy::new(|| bundled(include_str!("../../schemas/openapi-3.0.json")));
static OPENAPI_31: Lazy<Engine> = Lazy::new(|| bundled(include_str!("../../schemas/openapi-3.1.json")));

fn bundled(text: &str) -> Engine {
    let schema = serde_json::from_str(text).expect("bundled meta-schema is valid JSON");
    Engine::compile(schema).expect("bundled meta-schema compiles")
}

/// A schema that cannot be used for validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema does not compile: {message}")]
    Invalid { message: String },

    /// Evaluating the schema at `pointer` leads back to itself for the
    /// same instance
    #[error("schema at '{pointer}' applies itself to the same instance")]
    SelfReferential { pointer: String },
}

/// The structural rules a document is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuleSet {
    Swagger20,
    OpenApi30,
    OpenApi31,
}

impl RuleSet {
    pub fn for_version(version: &SpecVersion) -> Self {
        match version {
            SpecVersion::V2 => Self::Swagger20,
            SpecVersion::V3 { minor: 0, .. } => Self::OpenApi30,
            SpecVersion::V3 { .. } => Self::OpenApi31,
        }
    }

    /// The bundled meta-schema for this rule set.
    pub fn meta_schema(self) -> &'static serde_json::Value {
        self.engine().schema()
    }

    fn engine(self) -> &'static Engine {
        match self {
            Self::Swagger20 => &SWAGGER_20,
            Self::OpenApi30 => &OPENAPI_30,
            Self::OpenApi31 => &OPENAPI_31,
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Swagger20 => "Swagger 2.0",
            Self::OpenApi30 => "OpenAPI 3.0",
            Self::OpenApi31 => "OpenAPI 3.1",
        })
    }
}

/// Outcome of validation: the document, or everything wrong with it.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid(DereferencedDocument),
    Invalid(Vec<ValidationViolation>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Violations found; empty when valid.
    pub fn violations(&self) -> &[ValidationViolation] {
        match self {
            Self::Valid(_) => &[],
            Self::Invalid(violations) => violations,
        }
    }

    pub fn document(&self) -> Option<&DereferencedDocument> {
        match self {
            Self::Valid(doc) => Some(doc),
            Self::Invalid(_) => None,
        }
    }
}

/// Validate a dereferenced document with the rules of its declared version.
pub fn validate(doc: DereferencedDocument) -> ValidationResult {
    let rules = RuleSet::for_version(doc.version());
    log::debug!("validating against {rules} rules");

    let mut violations = rules.engine().check(doc.root());
    violations.extend(semantic::check(doc.root()));

    if violations.is_empty() {
        ValidationResult::Valid(doc)
    } else {
        log::info!("document failed validation with {} violation(s)", violations.len());
        ValidationResult::Invalid(violations)
    }
}

/// Validate any instance against a JSON Schema. The draft is taken from
/// `$schema` (2020-12 when absent); `#/...` references inside `schema`
/// resolve against `schema` itself.
pub fn validate_against(instance: &Node, schema: &Node) -> Result<Vec<ValidationViolation>, SchemaError> {
    let engine = Engine::compile(serde_json::Value::from(schema))?;
    Ok(engine.check(instance))
}
