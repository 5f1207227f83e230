//! Rules the meta-schemas cannot express: unique operation ids and path
//! template parameters.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::node::{Mapping, Node};
use crate::pointer::PathSegment;

use super::violation::ValidationViolation;

static TEMPLATE_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}/]+)\}").unwrap());

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Run every rule over `root`, reporting in document order.
pub(crate) fn check(root: &Node) -> Vec<ValidationViolation> {
    let Some(paths) = root.get("paths").and_then(Node::as_mapping) else {
        return Vec::new();
    };

    let mut violations = Vec::new();
    let mut operation_ids: HashMap<&str, Vec<PathSegment>> = HashMap::new();

    for (template, item) in paths {
        let Some(item_map) = item.as_mapping() else { continue };
        let item_path = vec![PathSegment::from("paths"), PathSegment::from(template.as_str())];
        let shared = parameters(item, &item_path);
        required_path_parameters(&shared, &mut violations);

        for (method, operation) in operations(item_map) {
            let operation_path = child(&item_path, method);
            let own = parameters(operation, &operation_path);
            required_path_parameters(&own, &mut violations);

            if let Some(id) = operation.get("operationId").and_then(Node::as_str) {
                let id_path = child(&operation_path, "operationId");
                match operation_ids.get(id) {
                    Some(first) => violations.push(ValidationViolation::new(
                        format!(
                            "Duplicate operationId '{id}' (first used at {})",
                            join(first)
                        ),
                        "uniqueOperationId",
                        id_path,
                        Vec::new(),
                        &Node::string(id),
                        &Node::Mapping(Mapping::new()),
                    )),
                    None => {
                        operation_ids.insert(id, id_path);
                    }
                }
            }

            for name in TEMPLATE_PARAM.captures_iter(template).map(|c| c.get(1).map_or("", |m| m.as_str())) {
                let declared = own
                    .iter()
                    .chain(&shared)
                    .any(|p| p.location == Some("path") && p.name == Some(name));
                if !declared {
                    violations.push(ValidationViolation::new(
                        format!(
                            "Path parameter '{name}' of '{template}' is not declared for operation '{method}'"
                        ),
                        "pathParameter",
                        operation_path.clone(),
                        Vec::new(),
                        operation,
                        &Node::Mapping(Mapping::new()),
                    ));
                }
            }
        }
    }
    violations
}

struct Parameter<'a> {
    node: &'a Node,
    path: Vec<PathSegment>,
    name: Option<&'a str>,
    location: Option<&'a str>,
}

fn parameters<'a>(owner: &'a Node, owner_path: &[PathSegment]) -> Vec<Parameter<'a>> {
    let Some(list) = owner.get("parameters").and_then(Node::as_sequence) else {
        return Vec::new();
    };
    list.iter()
        .enumerate()
        .map(|(index, node)| Parameter {
            node,
            path: child(&child(owner_path, "parameters"), index),
            name: node.get("name").and_then(Node::as_str),
            location: node.get("in").and_then(Node::as_str),
        })
        .collect()
}

fn operations(item: &Mapping) -> impl Iterator<Item = (&str, &Node)> {
    item.iter()
        .filter(|(key, _)| METHODS.contains(&key.as_str()))
        .map(|(key, operation)| (key.as_str(), operation))
}

fn required_path_parameters(params: &[Parameter<'_>], out: &mut Vec<ValidationViolation>) {
    for param in params.iter().filter(|p| p.location == Some("path")) {
        if param.node.get("required").and_then(Node::as_bool) != Some(true) {
            out.push(ValidationViolation::new(
                format!(
                    "Path parameter '{}' must be declared with required: true",
                    param.name.unwrap_or_default()
                ),
                "requiredPathParameter",
                param.path.clone(),
                Vec::new(),
                param.node,
                &Node::Mapping(Mapping::new()),
            ));
        }
    }
}

fn child(path: &[PathSegment], segment: impl Into<PathSegment>) -> Vec<PathSegment> {
    let mut path = path.to_vec();
    path.push(segment.into());
    path
}

fn join(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::format::Format;

    fn run(yaml: &str) -> Vec<ValidationViolation> {
        check(&parser::parse(yaml, Format::Yaml).unwrap())
    }

    #[test]
    fn test_well_formed_paths_pass() {
        let found = run(r#"
paths:
  /pets/{petId}:
    parameters:
      - {name: petId, in: path, required: true}
    get:
      operationId: getPet
    delete:
      operationId: deletePet
"#);
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn test_duplicate_operation_id() {
        let found = run(r#"
paths:
  /a:
    get: {operationId: list}
  /b:
    get: {operationId: list}
"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].keyword(), "uniqueOperationId");
        assert_eq!(found[0].pointer(), "/paths/~1b/get/operationId");
        assert!(found[0].message().contains("paths -> /a -> get -> operationId"));
    }

    #[test]
    fn test_undeclared_template_parameter() {
        let found = run(r#"
paths:
  /pets/{petId}/toys/{toyId}:
    get:
      parameters:
        - {name: petId, in: path, required: true}
        - {name: toyId, in: query}
"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].keyword(), "pathParameter");
        assert!(found[0].message().contains("'toyId'"));
        assert_eq!(found[0].pointer(), "/paths/~1pets~1{petId}~1toys~1{toyId}/get");
    }

    #[test]
    fn test_path_parameter_must_be_required() {
        let found = run(r#"
paths:
  /pets/{petId}:
    get:
      parameters:
        - {name: petId, in: path}
"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].keyword(), "requiredPathParameter");
        assert_eq!(found[0].pointer(), "/paths/~1pets~1{petId}/get/parameters/0");
    }
}
