//! Serialization formats and the JSON/YAML detector.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Textual serialization of an API description document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Classify raw text.
    ///
    /// Text whose first non-whitespace character is `{` or `[` is JSON,
    /// everything else is YAML. A YAML flow mapping is therefore reported
    /// as JSON and fails later in the strict JSON parser.
    pub fn detect(text: &str) -> Self {
        match text.trim_start().chars().next() {
            Some('{') | Some('[') => Self::Json,
            _ => Self::Yaml,
        }
    }

    /// Format declared by a file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_extension(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Format declared by an HTTP `Content-Type` value. Parameters such as
    /// `; charset=utf-8` are ignored.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(Self::Json),
            "text/yaml" | "application/yaml" | "application/x-yaml" | "text/x-yaml" => {
                Some(Self::Yaml)
            }
            _ if essence.ends_with("+json") => Some(Self::Json),
            _ if essence.ends_with("+yaml") => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Filename offered when converted text is saved.
    pub fn suggested_filename(self) -> &'static str {
        match self {
            Self::Json => "swagger.json",
            Self::Yaml => "swagger.yaml",
        }
    }

    /// The other format.
    pub fn opposite(self) -> Self {
        match self {
            Self::Json => Self::Yaml,
            Self::Yaml => Self::Json,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("JSON"),
            Self::Yaml => f.write_str("YAML"),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unknown format '{other}', expected json or yaml")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_json_object_and_array() {
        assert_eq!(Format::detect(r#"{"openapi": "3.0.0"}"#), Format::Json);
        assert_eq!(Format::detect("\n\t  [1, 2]"), Format::Json);
    }

    #[test]
    fn test_detect_yaml_mapping_key() {
        assert_eq!(Format::detect("openapi: 3.0.0\ninfo: {}"), Format::Yaml);
        assert_eq!(Format::detect("---\nswagger: '2.0'"), Format::Yaml);
        assert_eq!(Format::detect(""), Format::Yaml);
    }

    #[test]
    fn test_detect_flow_mapping_is_json() {
        // Flow mappings look like JSON to the detector
        assert_eq!(Format::detect("{openapi: 3.0.0}"), Format::Json);
    }

    #[test]
    fn test_declared_formats() {
        assert_eq!(Format::from_extension("api/spec.YML"), Some(Format::Yaml));
        assert_eq!(Format::from_extension("spec.json"), Some(Format::Json));
        assert_eq!(Format::from_extension("spec.txt"), None);
        assert_eq!(
            Format::from_media_type("application/json; charset=utf-8"),
            Some(Format::Json)
        );
        assert_eq!(Format::from_media_type("text/yaml"), Some(Format::Yaml));
        assert_eq!(Format::from_media_type("text/plain"), None);
    }

    #[test]
    fn test_suggested_filename() {
        assert_eq!(Format::Json.suggested_filename(), "swagger.json");
        assert_eq!(Format::Yaml.suggested_filename(), "swagger.yaml");
        assert_eq!("yml".parse::<Format>(), Ok(Format::Yaml));
    }
}
