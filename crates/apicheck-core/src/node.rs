//! The structured document tree shared by every pipeline stage.
//!
//! A [`Node`] is a closed tagged variant: an ordered mapping, a sequence or
//! a scalar. Both the JSON and the YAML parser deserialize straight into
//! it, so key order survives every stage and every conversion.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Ordered `key -> node` mapping with unique keys.
pub type Mapping = IndexMap<String, Node>;

/// One value of a parsed document.
#[derive(Debug, Clone)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

/// Leaf values.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// Numbers keep the narrowest lossless representation they were written in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    /// Only used for integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
}

impl Number {
    fn from_u64(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Self::Int(v),
            Err(_) => Self::UInt(value),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Integral in the JSON Schema sense (`1.0` counts).
    pub fn is_integer(self) -> bool {
        match self {
            Self::Int(_) | Self::UInt(_) => true,
            Self::Float(v) => v.is_finite() && v.fract() == 0.0,
        }
    }

    pub fn is_finite(self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl Node {
    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(value.into()))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Scalar(Scalar::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Member lookup on a mapping; `None` for every other variant.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()?.get(key)
    }

    /// JSON type name of this node, as used by the `type` keyword.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Mapping(_) => "object",
            Self::Sequence(_) => "array",
            Self::Scalar(Scalar::Null) => "null",
            Self::Scalar(Scalar::Bool(_)) => "boolean",
            Self::Scalar(Scalar::Number(n)) if n.is_integer() => "integer",
            Self::Scalar(Scalar::Number(_)) => "number",
            Self::Scalar(Scalar::String(_)) => "string",
        }
    }

    /// Compact single-line JSON rendering for diagnostics.
    pub fn to_compact_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    /// Indented JSON rendering for diagnostics.
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:#?}"))
    }
}

/// Equality is strict: mapping keys must appear in the same order and
/// numbers must keep their representation.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Mapping(a), Self::Mapping(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Number(Number::Int(value)))
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Self::Sequence(value)
    }
}

/// Non-finite floats have no JSON form and become `null`.
impl From<&Node> for serde_json::Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Mapping(map) => Self::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from(value)))
                    .collect(),
            ),
            Node::Sequence(items) => Self::Array(items.iter().map(Self::from).collect()),
            Node::Scalar(Scalar::Null) => Self::Null,
            Node::Scalar(Scalar::Bool(b)) => Self::Bool(*b),
            Node::Scalar(Scalar::Number(Number::Int(v))) => Self::from(*v),
            Node::Scalar(Scalar::Number(Number::UInt(v))) => Self::from(*v),
            Node::Scalar(Scalar::Number(Number::Float(v))) => {
                serde_json::Number::from_f64(*v).map_or(Self::Null, Self::Number)
            }
            Node::Scalar(Scalar::String(s)) => Self::String(s.clone()),
        }
    }
}

impl From<&serde_json::Value> for Node {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Object(map) => Self::Mapping(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from(value)))
                    .collect(),
            ),
            Value::Array(items) => Self::Sequence(items.iter().map(Self::from).collect()),
            Value::Null => Self::null(),
            Value::Bool(b) => Self::from(*b),
            Value::Number(n) => Self::Scalar(Scalar::Number(match (n.as_i64(), n.as_u64()) {
                (Some(v), _) => Number::Int(v),
                (None, Some(v)) => Number::UInt(v),
                (None, None) => Number::Float(n.as_f64().unwrap_or(f64::NAN)),
            })),
            Value::String(s) => Self::string(s.as_str()),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Self::Sequence(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
            Self::Scalar(Scalar::Null) => serializer.serialize_unit(),
            Self::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            Self::Scalar(Scalar::Number(Number::Int(v))) => serializer.serialize_i64(*v),
            Self::Scalar(Scalar::Number(Number::UInt(v))) => serializer.serialize_u64(*v),
            Self::Scalar(Scalar::Number(Number::Float(v))) => serializer.serialize_f64(*v),
            Self::Scalar(Scalar::String(s)) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping, sequence, string, number, boolean or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Number(Number::Int(v))))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Number(Number::from_u64(v))))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Scalar(Scalar::Number(Number::Float(v))))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::string(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Node>()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Node, A::Error> {
        let mut map = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(MapKey(key)) = access.next_key::<MapKey>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format_args!("duplicate key `{key}`")));
            }
            let value = access.next_value::<Node>()?;
            map.insert(key, value);
        }
        Ok(Node::Mapping(map))
    }
}

/// Mapping key. YAML allows any scalar as a key (`200:` is an integer);
/// those are normalised to their string form. Collection keys are rejected.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl<'de> Visitor<'de> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
        Ok(MapKey(Number::Float(v).to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MapKey, E> {
        Ok(MapKey(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<MapKey, E> {
        Ok(MapKey("null".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_preserves_key_order() {
        let node: Node = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<_> = node.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_numbers_keep_narrowest_representation() {
        let node: Node = serde_json::from_str(r#"[1, -2, 1.0, 18446744073709551615]"#).unwrap();
        let items = node.as_sequence().unwrap();
        assert_eq!(items[0].as_number(), Some(Number::Int(1)));
        assert_eq!(items[1].as_number(), Some(Number::Int(-2)));
        assert_eq!(items[2].as_number(), Some(Number::Float(1.0)));
        assert_eq!(items[3].as_number(), Some(Number::UInt(u64::MAX)));
        assert_ne!(items[0], items[2]);
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let err = serde_json::from_str::<Node>(r#"{"a": 1, "a": 2}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate key `a`"));
        let err = serde_yaml::from_str::<Node>("a: 1\na: 2\n").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_yaml_scalar_keys_become_strings() {
        let node: Node = serde_yaml::from_str("200:\n  description: ok\ntrue: 1\n").unwrap();
        let keys: Vec<_> = node.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["200", "true"]);
    }

    #[test]
    fn test_strict_equality_is_order_sensitive() {
        let a: Node = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: Node = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_json_value_conversion_keeps_order_and_numbers() {
        let node: Node =
            serde_json::from_str(r#"{"z": [1, -2, 2.5, 18446744073709551615], "a": {"k": null}}"#)
                .unwrap();
        let value = serde_json::Value::from(&node);
        assert_eq!(value["z"][3], serde_json::json!(u64::MAX));
        assert_eq!(Node::from(&value), node);

        let inf = Node::Scalar(Scalar::Number(Number::Float(f64::INFINITY)));
        assert_eq!(serde_json::Value::from(&inf), serde_json::Value::Null);
    }

    #[test]
    fn test_type_names() {
        let node: Node = serde_json::from_str(r#"[{}, [], null, true, 3, 2.5, "s", 4.0]"#).unwrap();
        let names: Vec<_> = node.as_sequence().unwrap().iter().map(Node::type_name).collect();
        assert_eq!(
            names,
            vec!["object", "array", "null", "boolean", "integer", "number", "string", "integer"]
        );
    }
}
