//! Schema evaluation backed by the `jsonschema` crate.
//!
//! Errors reported by the compiled validator are mapped onto
//! [`ValidationViolation`]s carrying document paths, the failing keyword
//! and the schema object that rejected the instance. A failed `anyOf` or
//! `oneOf` is explained by evaluating each branch on its own and nesting
//! what every branch rejected.

use std::collections::HashSet;
use std::str::FromStr;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde_json::{Map, Value};

use crate::node::Node;
use crate::pointer::{path_to_pointer, JsonPointer, PathSegment};

use super::violation::ValidationViolation;
use super::SchemaError;

/// Longest instance rendering embedded in a message.
const REPR_LIMIT: usize = 120;

/// Keywords whose subschemas apply to the same instance as their parent.
const IN_PLACE: [&str; 4] = ["not", "if", "then", "else"];
const IN_PLACE_LISTS: [&str; 3] = ["allOf", "anyOf", "oneOf"];
const IN_PLACE_MAPS: [&str; 2] = ["dependencies", "dependentSchemas"];

/// A compiled schema together with its source.
pub(crate) struct Engine {
    schema: Value,
    validator: Validator,
}

/// Where the errors of one validator run land in the final report.
struct Frame {
    /// Document path of the value the validator ran on
    path: Vec<PathSegment>,
    /// Schema path of the schema the validator was compiled from
    schema_path: Vec<PathSegment>,
    /// Leading schema tokens that belong to a branch wrapper
    skip: usize,
}

impl Engine {
    pub(crate) fn compile(schema: Value) -> Result<Self, SchemaError> {
        if let Some(pointer) = self_reference(&schema) {
            return Err(SchemaError::SelfReferential { pointer });
        }
        let validator = jsonschema::options()
            .should_validate_formats(false)
            .build(&schema)
            .map_err(|e| SchemaError::Invalid {
                message: e.to_string(),
            })?;
        Ok(Self { schema, validator })
    }

    pub(crate) fn schema(&self) -> &Value {
        &self.schema
    }

    /// Every violation in `instance`, ordered by where it sits in the
    /// document.
    pub(crate) fn check(&self, instance: &Node) -> Vec<ValidationViolation> {
        let value = Value::from(instance);
        let root = Frame {
            path: Vec::new(),
            schema_path: Vec::new(),
            skip: 0,
        };
        let mut violations = self.collect(&self.validator, &self.schema, &value, instance, &root);
        violations.sort_by_cached_key(|violation| document_order(instance, violation.path()));
        violations
    }

    fn collect(
        &self,
        validator: &Validator,
        schema: &Value,
        instance: &Value,
        node: &Node,
        frame: &Frame,
    ) -> Vec<ValidationViolation> {
        validator
            .iter_errors(instance)
            .map(|error| self.violation(&error, schema, instance, node, frame))
            .collect()
    }

    fn violation(
        &self,
        error: &ValidationError<'_>,
        schema: &Value,
        instance: &Value,
        node: &Node,
        frame: &Frame,
    ) -> ValidationViolation {
        let instance_pointer = error.instance_path.to_string();
        let instance_tokens = pointer_tokens(&instance_pointer);
        let mut path = frame.path.clone();
        path.extend(segments(node, &instance_tokens));
        let fragment = JsonPointer::from_str(&instance_pointer)
            .ok()
            .and_then(|pointer| pointer.lookup(node).cloned())
            .unwrap_or_else(|| Node::from(error.instance.as_ref()));

        let schema_tokens = pointer_tokens(&error.schema_path.to_string());
        let reported = schema_tokens.iter().skip(frame.skip);
        let mut schema_path = frame.schema_path.clone();
        schema_path.extend(reported.clone().filter(|t| *t != "$ref").map(|t| to_segment(t)));

        let keyword = match error.kind {
            ValidationErrorKind::FalseSchema { .. } => "false",
            _ => reported
                .rev()
                .find(|t| *t != "$ref" && t.parse::<usize>().is_err())
                .map_or("schema", String::as_str),
        };
        let container = match keyword {
            "false" => walk(schema, &schema_tokens),
            _ => holder(schema, &schema_tokens[..schema_tokens.len().saturating_sub(1)], keyword),
        };

        let message = error.to_string();
        let (message, nested) = match (keyword, instance.pointer(&instance_pointer)) {
            ("anyOf" | "oneOf", Some(value)) => {
                let branches = container.get(keyword).and_then(Value::as_array);
                let (passing, nested) = branches.map_or_else(Default::default, |branches| {
                    self.explain(branches, keyword, value, &fragment, &path, &schema_path)
                });
                if passing.len() > 1 {
                    let indexes: Vec<String> = passing.iter().map(usize::to_string).collect();
                    (format!("{message} (branches {})", indexes.join(", ")), Vec::new())
                } else {
                    (message, nested)
                }
            }
            _ => (message, Vec::new()),
        };

        ValidationViolation::new(message, keyword, path, schema_path, &fragment, &Node::from(container))
            .with_nested(nested)
    }

    /// Evaluate each combinator branch on its own. Returns the indexes of
    /// the passing branches and one violation per rejected branch.
    fn explain(
        &self,
        branches: &[Value],
        keyword: &str,
        instance: &Value,
        node: &Node,
        path: &[PathSegment],
        schema_path: &[PathSegment],
    ) -> (Vec<usize>, Vec<ValidationViolation>) {
        let mut passing = Vec::new();
        let mut nested = Vec::new();
        for (index, branch) in branches.iter().enumerate() {
            let wrapper = self.branch_wrapper(branch);
            let validator = match jsonschema::options().should_validate_formats(false).build(&wrapper) {
                Ok(validator) => validator,
                Err(e) => {
                    log::warn!("{keyword} branch {index} does not compile on its own: {e}");
                    continue;
                }
            };
            let mut branch_path = schema_path.to_vec();
            branch_path.push(PathSegment::Index(index));
            let frame = Frame {
                path: path.to_vec(),
                schema_path: branch_path,
                skip: 2,
            };

            let mut errors = self.collect(&validator, &wrapper, instance, node, &frame);
            match errors.len() {
                0 => passing.push(index),
                1 => nested.push(errors.remove(0)),
                _ => nested.push(
                    ValidationViolation::new(
                        format!("{} is not valid under branch {index}", repr(node)),
                        keyword,
                        frame.path,
                        frame.schema_path,
                        node,
                        &Node::from(branch),
                    )
                    .with_nested(errors),
                ),
            }
        }
        (passing, nested)
    }

    /// A standalone schema applying `branch`, able to follow the same
    /// `#/...` references the full schema can.
    fn branch_wrapper(&self, branch: &Value) -> Value {
        let mut wrapper = Map::new();
        for key in ["$schema", "definitions", "$defs"] {
            if let Some(value) = self.schema.get(key) {
                wrapper.insert(key.to_string(), value.clone());
            }
        }
        wrapper.insert("allOf".to_string(), Value::Array(vec![branch.clone()]));
        Value::Object(wrapper)
    }
}

fn pointer_tokens(pointer: &str) -> Vec<String> {
    JsonPointer::from_str(pointer)
        .map(|pointer| pointer.tokens().to_vec())
        .unwrap_or_default()
}

fn to_segment(token: &str) -> PathSegment {
    match token.parse::<usize>() {
        Ok(index) => PathSegment::Index(index),
        Err(_) => PathSegment::from(token),
    }
}

/// Turn pointer tokens into path segments, using the document to tell
/// sequence indexes from numeric mapping keys.
fn segments(node: &Node, tokens: &[String]) -> Vec<PathSegment> {
    let mut current = Some(node);
    tokens
        .iter()
        .map(|token| {
            let segment = match (current, token.parse::<usize>()) {
                (Some(Node::Sequence(_)), Ok(index)) => PathSegment::Index(index),
                _ => PathSegment::from(token.as_str()),
            };
            current = current.and_then(|node| match (node, &segment) {
                (Node::Mapping(map), PathSegment::Key(key)) => map.get(key),
                (Node::Sequence(items), PathSegment::Index(index)) => items.get(*index),
                _ => None,
            });
            segment
        })
        .collect()
}

/// Sort key placing violations in document order: mapping members by
/// declaration order, sequence items by index.
fn document_order(root: &Node, path: &[PathSegment]) -> Vec<usize> {
    let mut current = Some(root);
    path.iter()
        .map(|segment| match (current, segment) {
            (Some(Node::Mapping(map)), PathSegment::Key(key)) => match map.get_full(key) {
                Some((position, _, child)) => {
                    current = Some(child);
                    position
                }
                None => {
                    current = None;
                    usize::MAX
                }
            },
            (Some(Node::Sequence(items)), PathSegment::Index(index)) => {
                current = items.get(*index);
                *index
            }
            _ => {
                current = None;
                usize::MAX
            }
        })
        .collect()
}

/// Follow schema tokens from `root`, resolving local `$ref`s on the way.
/// Stops at the last schema reached when a token cannot be followed.
fn walk<'v>(root: &'v Value, tokens: &[String]) -> &'v Value {
    let mut current = root;
    for token in tokens {
        let next = if token == "$ref" {
            resolve(root, current)
        } else {
            child(current, token).or_else(|| resolve(root, current).and_then(|target| child(target, token)))
        };
        match next {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}

/// The schema object declaring `keyword`, reached through `tokens`.
fn holder<'v>(root: &'v Value, tokens: &[String], keyword: &str) -> &'v Value {
    let found = walk(root, tokens);
    match found.get(keyword) {
        Some(_) => found,
        None => resolve(root, found).unwrap_or(found),
    }
}

fn child<'v>(value: &'v Value, token: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(token),
        Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Target of a local `$ref` held by `schema`.
fn resolve<'v>(root: &'v Value, schema: &Value) -> Option<&'v Value> {
    let pointer = local_reference(schema)?;
    root.pointer(&pointer)
}

fn local_reference(schema: &Value) -> Option<String> {
    let fragment = schema.get("$ref")?.as_str()?.strip_prefix('#')?;
    JsonPointer::from_fragment(fragment).ok().map(|p| p.to_string())
}

/// Find a schema that, through local references and in-place applicators,
/// ends up applying itself to the same instance. Such a schema never
/// finishes evaluating. Returns the pointer where the loop closes.
fn self_reference(root: &Value) -> Option<String> {
    let mut starts = Vec::new();
    objects(root, String::new(), &mut starts);

    let mut done = HashSet::new();
    let mut stack = Vec::new();
    starts
        .into_iter()
        .find_map(|start| visit(root, start, &mut stack, &mut done))
}

fn objects(value: &Value, pointer: String, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let segment = PathSegment::from(key.as_str());
                objects(child, format!("{pointer}{}", path_to_pointer(&[segment])), out);
            }
            out.push(pointer);
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                objects(child, format!("{pointer}/{index}"), out);
            }
        }
        _ => {}
    }
}

fn visit(root: &Value, pointer: String, stack: &mut Vec<String>, done: &mut HashSet<String>) -> Option<String> {
    if stack.contains(&pointer) {
        return Some(pointer);
    }
    if done.contains(&pointer) {
        return None;
    }
    let schema = root.pointer(&pointer)?;

    let mut edges = Vec::new();
    if let Some(target) = local_reference(schema) {
        edges.push(target);
    }
    for keyword in IN_PLACE {
        if schema.get(keyword).map_or(false, Value::is_object) {
            edges.push(format!("{pointer}/{keyword}"));
        }
    }
    for keyword in IN_PLACE_LISTS {
        if let Some(items) = schema.get(keyword).and_then(Value::as_array) {
            edges.extend((0..items.len()).map(|i| format!("{pointer}/{keyword}/{i}")));
        }
    }
    for keyword in IN_PLACE_MAPS {
        if let Some(map) = schema.get(keyword).and_then(Value::as_object) {
            edges.extend(
                map.iter()
                    .filter(|(_, value)| value.is_object())
                    .map(|(key, _)| {
                        let path = [PathSegment::from(keyword), PathSegment::from(key.as_str())];
                        format!("{pointer}{}", path_to_pointer(&path))
                    }),
            );
        }
    }

    stack.push(pointer);
    for edge in edges {
        if let Some(found) = visit(root, edge, stack, done) {
            return Some(found);
        }
    }
    if let Some(pointer) = stack.pop() {
        done.insert(pointer);
    }
    None
}

/// Short rendering of a node for messages.
fn repr(node: &Node) -> String {
    let text = node.to_compact_string();
    if text.chars().count() <= REPR_LIMIT {
        return text;
    }
    let mut short: String = text.chars().take(REPR_LIMIT - 3).collect();
    short.push_str("...");
    short
}
