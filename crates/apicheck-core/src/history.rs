//! Session-scoped history of validations and conversions.
//!
//! A [`SessionHistory`] is created when an interactive session starts and
//! dropped when it ends. It only grows: entries are appended in call order
//! and never edited or removed.

use std::fmt;

use serde::Serialize;

/// What was done to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Action {
    Validate,
    ConvertJsonToYaml,
    ConvertYamlToJson,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Self::Validate => "Validate",
            Self::ConvertJsonToYaml => "Convert JSON to YAML",
            Self::ConvertYamlToJson => "Convert YAML to JSON",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One recorded action: the input text and the rendered result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub action: Action,
    pub input: String,
    pub result: String,
}

/// Append-only log owned by one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&mut self, action: Action, input: impl Into<String>, result: impl Into<String>) {
        self.entries.push(HistoryEntry {
            action,
            input: input.into(),
            result: result.into(),
        });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a SessionHistory {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
