//! JSON pointers (RFC 6901) and document paths.

use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use thiserror::Error;

use crate::node::Node;

/// One step from a node to a child: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Render a path as a JSON pointer string (`/paths/~1pets/get`).
pub fn path_to_pointer(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| format!("/{}", escape(&segment.to_string())))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    #[error("JSON pointer '{0}' must be empty or start with '/'")]
    MissingLeadingSlash(String),
    #[error("JSON pointer '{0}' contains an invalid escape sequence")]
    InvalidEscape(String),
}

/// A parsed JSON pointer: the unescaped reference tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse the fragment part of a `$ref` (`/components/schemas/Pet`).
    /// Fragments are percent-decoded before `~1`/`~0` are unescaped.
    pub fn from_fragment(fragment: &str) -> Result<Self, PointerError> {
        let decoded = percent_decode_str(fragment).decode_utf8_lossy();
        decoded.parse()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Find the node this pointer designates inside `root`.
    pub fn lookup<'n>(&self, root: &'n Node) -> Option<&'n Node> {
        self.tokens.iter().try_fold(root, |node, token| match node {
            Node::Mapping(map) => map.get(token),
            Node::Sequence(items) => parse_index(token).and_then(|i| items.get(i)),
            Node::Scalar(_) => None,
        })
    }
}

fn parse_index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

impl FromStr for JsonPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(PointerError::MissingLeadingSlash(s.to_string()));
        };
        let tokens = rest
            .split('/')
            .map(|token| unescape(token).ok_or_else(|| PointerError::InvalidEscape(s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", escape(token))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Node {
        serde_json::from_str(
            r#"{"paths": {"/pets/{id}": {"get": {"tags": ["a", "b"]}}}, "m~n": 1}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_and_display_escapes() {
        let pointer: JsonPointer = "/paths/~1pets~1{id}/get".parse().unwrap();
        assert_eq!(pointer.tokens(), ["paths", "/pets/{id}", "get"]);
        assert_eq!(pointer.to_string(), "/paths/~1pets~1{id}/get");
    }

    #[test]
    fn test_lookup() {
        let doc = doc();
        let tag: JsonPointer = "/paths/~1pets~1{id}/get/tags/1".parse().unwrap();
        assert_eq!(tag.lookup(&doc).and_then(Node::as_str), Some("b"));
        let tilde: JsonPointer = "/m~0n".parse().unwrap();
        assert!(tilde.lookup(&doc).is_some());
        assert_eq!(JsonPointer::root().lookup(&doc), Some(&doc));
    }

    #[test]
    fn test_lookup_misses() {
        let doc = doc();
        for missing in ["/nope", "/paths/~1pets~1{id}/get/tags/01", "/m~0n/deeper"] {
            let pointer: JsonPointer = missing.parse().unwrap();
            assert!(pointer.lookup(&doc).is_none(), "{missing}");
        }
    }

    #[test]
    fn test_fragment_percent_decoding() {
        let pointer = JsonPointer::from_fragment("/components/schemas/User%20Profile").unwrap();
        assert_eq!(pointer.tokens(), ["components", "schemas", "User Profile"]);
    }

    #[test]
    fn test_invalid_pointers() {
        assert!(matches!(
            "components".parse::<JsonPointer>(),
            Err(PointerError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            "/a~2".parse::<JsonPointer>(),
            Err(PointerError::InvalidEscape(_))
        ));
    }

    #[test]
    fn test_path_to_pointer() {
        let path = vec![
            PathSegment::from("paths"),
            PathSegment::from("/pets"),
            PathSegment::from(0),
        ];
        assert_eq!(path_to_pointer(&path), "/paths/~1pets/0");
    }
}
