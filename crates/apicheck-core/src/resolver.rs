//! `$ref` dereferencing.
//!
//! The resolver walks the document breadth-first. A mapping whose `$ref`
//! member is a string is a reference node; it is replaced in place by the
//! subtree its target designates, and the replacement is walked again in
//! the next layer. Internal targets (`#/components/...`) are looked up in
//! the unresolved tree of the document containing the reference; external
//! targets (`pet.yaml#/Pet`, `https://...`) are fetched through a
//! [`DocumentSource`], parsed, and resolved relative to their own location.
//!
//! Every work item carries the chain of `(document, pointer)` edges that
//! led to it. Meeting an edge that is already on the chain is a cycle.
//! Because the chain belongs to the item and not to the run, two branches
//! may reference the same target (diamond sharing) without tripping it.

// Internal imports (std, crate)
use std::collections::HashMap;
use std::time::Duration;

use crate::document::{ParsedDocument, SpecVersion};
use crate::format::Format;
use crate::node::Node;
use crate::parser::{self, SyntaxError};
use crate::pointer::{path_to_pointer, JsonPointer, PathSegment};
use crate::source::{DocumentSource, FetchError, Fetched, Locator};

// External imports (alphabetized)
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

/// A document could not be fully dereferenced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind")]
pub enum ResolutionError {
    #[error("unresolved reference '{reference}' at {referenced_from}")]
    UnresolvedReference {
        reference: String,
        /// JSON pointer of the `$ref` node in the dereferenced output
        referenced_from: String,
    },

    #[error("cyclic reference '{reference}' at {referenced_from} (chain: {})", .chain.join(" -> "))]
    CyclicReference {
        reference: String,
        referenced_from: String,
        /// `document#pointer` targets from the first reference to the repeat
        chain: Vec<String>,
    },

    #[error("failed to fetch {locator}: {reason}")]
    FetchFailed { locator: String, reason: String },

    #[error("timed out after {timeout_ms}ms fetching {locator}")]
    FetchTimeout { locator: String, timeout_ms: u64 },

    #[error("invalid reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("referenced document {locator} is malformed: {error}")]
    InvalidDocument { locator: String, error: SyntaxError },
}

impl ResolutionError {
    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnresolvedReference { .. } => "UnresolvedReference",
            Self::CyclicReference { .. } => "CyclicReference",
            Self::FetchFailed { .. } => "FetchFailed",
            Self::FetchTimeout { .. } => "FetchTimeout",
            Self::InvalidReference { .. } => "InvalidReference",
            Self::InvalidDocument { .. } => "InvalidDocument",
        }
    }
}

/// Fetch `locator`, bounded by `timeout`, mapping every failure to a
/// [`ResolutionError`].
pub(crate) async fn fetch_bounded<S: DocumentSource>(
    source: &S,
    locator: &Locator,
    timeout: Duration,
) -> Result<Fetched, ResolutionError> {
    let timed_out = || ResolutionError::FetchTimeout {
        locator: locator.to_string(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    };
    match tokio::time::timeout(timeout, source.fetch(locator)).await {
        Err(_) | Ok(Err(FetchError::Timeout)) => Err(timed_out()),
        Ok(Err(e)) => Err(ResolutionError::FetchFailed {
            locator: locator.to_string(),
            reason: e.to_string(),
        }),
        Ok(Ok(fetched)) => Ok(fetched),
    }
}

/// A [`ParsedDocument`] with every reference replaced by its target.
#[derive(Debug, Clone, PartialEq)]
pub struct DereferencedDocument {
    root: Node,
    version: SpecVersion,
}

impl DereferencedDocument {
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn version(&self) -> &SpecVersion {
        &self.version
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    /// Get the title of the API
    pub fn title(&self) -> Option<&str> {
        self.root.get("info")?.get("title")?.as_str()
    }
}

/// Whether any mapping in `node` is still a reference node.
pub fn contains_references(node: &Node) -> bool {
    match node {
        Node::Mapping(map) => {
            reference_of(node).is_some() || map.values().any(contains_references)
        }
        Node::Sequence(items) => items.iter().any(contains_references),
        Node::Scalar(_) => false,
    }
}

fn reference_of(node: &Node) -> Option<&str> {
    node.get("$ref").and_then(Node::as_str)
}

/// Identity of a document taking part in one resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DocKey {
    /// The root document when it was not loaded from anywhere
    Inline,
    Located(String),
}

impl DocKey {
    fn of(locator: &Locator) -> Self {
        Self::Located(locator.to_string())
    }

    /// `document#pointer` as shown in cycle chains.
    fn describe(&self, pointer: &JsonPointer) -> String {
        match self {
            Self::Inline => format!("#{pointer}"),
            Self::Located(doc) => format!("{doc}#{pointer}"),
        }
    }
}

/// A document taking part in one resolution run.
struct Loaded {
    locator: Option<Locator>,
    root: Node,
}

/// One `$ref` edge: target document and pointer.
type Edge = (DocKey, JsonPointer);

struct WorkItem {
    path: Vec<PathSegment>,
    /// The document whose text this subtree came from
    doc: DocKey,
    chain: Vec<Edge>,
}

/// Target of a reference before its document is loaded.
struct Target {
    doc: DocKey,
    locator: Option<Locator>,
    pointer: JsonPointer,
}

/// Dereferences parsed documents.
pub struct Resolver<'s, S> {
    source: &'s S,
    timeout: Duration,
    base_dir: Option<std::path::PathBuf>,
}

impl<'s, S: DocumentSource> Resolver<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            timeout: Duration::from_secs(10),
            base_dir: None,
        }
    }

    /// Bound every external fetch by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory relative references of location-less documents resolve
    /// against.
    pub fn with_base_dir(mut self, base_dir: Option<std::path::PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    /// Replace every reference in `doc`. `origin` is where the document was
    /// loaded from, if anywhere.
    pub async fn resolve(
        &self,
        doc: ParsedDocument,
        origin: Option<&Locator>,
    ) -> Result<DereferencedDocument, ResolutionError> {
        let version = *doc.version();
        let root = doc.into_root();
        let root_key = origin.map_or(DocKey::Inline, DocKey::of);

        let mut documents = HashMap::new();
        documents.insert(
            root_key.clone(),
            Loaded {
                locator: origin.cloned(),
                root: root.clone(),
            },
        );

        let mut output = root;
        let mut layer = vec![WorkItem {
            path: Vec::new(),
            doc: root_key,
            chain: Vec::new(),
        }];
        let mut replaced = 0usize;

        while !layer.is_empty() {
            self.load_layer(&layer, &output, &mut documents).await?;

            let mut next = Vec::new();
            for item in layer {
                let node = node_at_mut(&mut output, &item.path).ok_or_else(|| {
                    ResolutionError::InvalidReference {
                        reference: path_to_pointer(&item.path),
                        reason: "location vanished during resolution".into(),
                    }
                })?;

                let Some(reference) = reference_of(node).map(str::to_string) else {
                    push_children(node, &item, &mut next);
                    continue;
                };

                let referenced_from = path_to_pointer(&item.path);
                let target = self.target(&documents[&item.doc], &item.doc, &reference)?;
                let edge = (target.doc.clone(), target.pointer.clone());

                if item.chain.contains(&edge) {
                    let chain = item
                        .chain
                        .iter()
                        .chain(std::iter::once(&edge))
                        .map(|(doc, pointer)| doc.describe(pointer))
                        .collect();
                    return Err(ResolutionError::CyclicReference {
                        reference,
                        referenced_from,
                        chain,
                    });
                }

                let replacement = documents
                    .get(&target.doc)
                    .and_then(|loaded| target.pointer.lookup(&loaded.root))
                    .cloned()
                    .ok_or_else(|| ResolutionError::UnresolvedReference {
                        reference: reference.clone(),
                        referenced_from: referenced_from.clone(),
                    })?;

                if node.as_mapping().map_or(0, |m| m.len()) > 1 {
                    log::warn!("ignoring members next to $ref '{reference}' at {referenced_from}");
                }
                log::debug!("dereferenced '{reference}' at {referenced_from}");
                *node = replacement;
                replaced += 1;

                let mut chain = item.chain;
                chain.push(edge);
                next.push(WorkItem {
                    path: item.path,
                    doc: target.doc,
                    chain,
                });
            }
            layer = next;
        }

        log::debug!(
            "resolution finished: {replaced} reference(s), {} document(s)",
            documents.len()
        );
        Ok(DereferencedDocument {
            root: output,
            version,
        })
    }

    /// Work out which document and pointer `reference` designates.
    fn target(&self, from: &Loaded, from_key: &DocKey, reference: &str) -> Result<Target, ResolutionError> {
        let (location, fragment) = match reference.split_once('#') {
            Some((location, fragment)) => (location, fragment),
            None => (reference, ""),
        };
        let invalid = |reason: String| ResolutionError::InvalidReference {
            reference: reference.to_string(),
            reason,
        };
        let pointer = JsonPointer::from_fragment(fragment).map_err(|e| invalid(e.to_string()))?;

        if location.is_empty() {
            return Ok(Target {
                doc: from_key.clone(),
                locator: from.locator.clone(),
                pointer,
            });
        }

        let locator = match &from.locator {
            Some(base) => base.join(location),
            None => Locator::join_detached(location, self.base_dir.as_deref()),
        }
        .map_err(|e| invalid(e.to_string()))?;

        Ok(Target {
            doc: DocKey::of(&locator),
            locator: Some(locator),
            pointer,
        })
    }

    /// Fetch, concurrently, every external document the references in
    /// `layer` need that is not loaded yet.
    async fn load_layer(
        &self,
        layer: &[WorkItem],
        output: &Node,
        documents: &mut HashMap<DocKey, Loaded>,
    ) -> Result<(), ResolutionError> {
        let mut wanted: Vec<Locator> = Vec::new();
        for item in layer {
            let Some(reference) = node_at(output, &item.path).and_then(reference_of) else {
                continue;
            };
            let target = self.target(&documents[&item.doc], &item.doc, reference)?;
            if let Some(locator) = target.locator {
                if !documents.contains_key(&target.doc) && !wanted.contains(&locator) {
                    wanted.push(locator);
                }
            }
        }
        if wanted.is_empty() {
            return Ok(());
        }

        let results = join_all(wanted.iter().map(|locator| self.load(locator))).await;
        for (locator, result) in wanted.into_iter().zip(results) {
            let root = result?;
            documents.insert(
                DocKey::of(&locator),
                Loaded {
                    locator: Some(locator),
                    root,
                },
            );
        }
        Ok(())
    }

    async fn load(&self, locator: &Locator) -> Result<Node, ResolutionError> {
        let fetched = fetch_bounded(self.source, locator, self.timeout).await?;
        let format = fetched
            .declared_format(locator)
            .unwrap_or_else(|| Format::detect(&fetched.text));
        log::info!("loaded external document {locator} ({format})");
        parser::parse(&fetched.text, format).map_err(|error| ResolutionError::InvalidDocument {
            locator: locator.to_string(),
            error,
        })
    }
}

fn push_children(node: &Node, item: &WorkItem, next: &mut Vec<WorkItem>) {
    let child = |segment: PathSegment| {
        let mut path = item.path.clone();
        path.push(segment);
        WorkItem {
            path,
            doc: item.doc.clone(),
            chain: item.chain.clone(),
        }
    };
    match node {
        Node::Mapping(map) => next.extend(map.keys().map(|k| child(PathSegment::Key(k.clone())))),
        Node::Sequence(items) => next.extend((0..items.len()).map(|i| child(PathSegment::Index(i)))),
        Node::Scalar(_) => {}
    }
}

fn node_at<'n>(root: &'n Node, path: &[PathSegment]) -> Option<&'n Node> {
    path.iter().try_fold(root, |node, segment| match (node, segment) {
        (Node::Mapping(map), PathSegment::Key(key)) => map.get(key),
        (Node::Sequence(items), PathSegment::Index(i)) => items.get(*i),
        _ => None,
    })
}

fn node_at_mut<'n>(root: &'n mut Node, path: &[PathSegment]) -> Option<&'n mut Node> {
    path.iter().try_fold(root, |node, segment| match (node, segment) {
        (Node::Mapping(map), PathSegment::Key(key)) => map.get_mut(key),
        (Node::Sequence(items), PathSegment::Index(i)) => items.get_mut(*i),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RawDocument;
    use crate::source::MemorySource;

    fn parsed(text: &str) -> ParsedDocument {
        RawDocument::new(text).parse().unwrap()
    }

    async fn resolve_with(
        text: &str,
        source: &MemorySource,
        origin: Option<&str>,
    ) -> Result<DereferencedDocument, ResolutionError> {
        let origin = origin.map(|o| Locator::parse(o).unwrap());
        Resolver::new(source)
            .with_timeout(Duration::from_millis(200))
            .resolve(parsed(text), origin.as_ref())
            .await
    }

    const INTERNAL: &str = r##"
openapi: 3.0.0
info: {title: t, version: "1"}
paths:
  /pets:
    get:
      parameters:
        - $ref: '#/components/parameters/Limit'
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: '#/components/schemas/Pet'
components:
  parameters:
    Limit: {name: limit, in: query, schema: {type: integer}}
  schemas:
    Pet:
      type: object
      properties:
        tag: {$ref: '#/components/schemas/Tag'}
    Tag: {type: string}
"##;

    #[tokio::test]
    async fn test_internal_references_are_substituted() {
        let doc = resolve_with(INTERNAL, &MemorySource::new(), None).await.unwrap();
        let root = doc.root();
        assert!(!contains_references(root));

        let param: JsonPointer = "/paths/~1pets/get/parameters/0/name".parse().unwrap();
        assert_eq!(param.lookup(root).and_then(Node::as_str), Some("limit"));

        let tag: JsonPointer =
            "/paths/~1pets/get/responses/200/content/application~1json/schema/items/properties/tag/type"
                .parse()
                .unwrap();
        assert_eq!(tag.lookup(root).and_then(Node::as_str), Some("string"));
    }

    #[tokio::test]
    async fn test_external_references_resolve_relative_to_their_document() {
        let mut source = MemorySource::new();
        source.insert(
            "specs/schemas/pet.yaml",
            "Pet:\n  type: object\n  properties:\n    owner: {$ref: 'owner.json#/Owner'}\n",
        );
        source.insert("specs/schemas/owner.json", r#"{"Owner": {"type": "string"}}"#);
        let text = r#"{"openapi": "3.0.0", "info": {"title": "t", "version": "1"},
            "paths": {}, "components": {"schemas": {"Pet": {"$ref": "schemas/pet.yaml#/Pet"}}}}"#;

        let doc = resolve_with(text, &source, Some("specs/openapi.json")).await.unwrap();
        let owner: JsonPointer = "/components/schemas/Pet/properties/owner/type".parse().unwrap();
        assert_eq!(owner.lookup(doc.root()).and_then(Node::as_str), Some("string"));
        assert!(!contains_references(doc.root()));
    }

    #[tokio::test]
    async fn test_two_step_cycle_is_rejected() {
        let text = r##"
openapi: 3.0.0
info: {title: t, version: "1"}
paths: {}
components:
  schemas:
    A: {$ref: '#/components/schemas/B'}
    B: {$ref: '#/components/schemas/A'}
"##;
        let err = resolve_with(text, &MemorySource::new(), None).await.unwrap_err();
        match err {
            ResolutionError::CyclicReference { chain, .. } => {
                assert_eq!(chain.first(), chain.last());
                assert_eq!(chain.len(), 3);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recursive_schema_is_a_cycle() {
        let text = r##"
openapi: 3.0.0
info: {title: t, version: "1"}
paths: {}
components:
  schemas:
    Node:
      type: object
      properties:
        children: {type: array, items: {$ref: '#/components/schemas/Node'}}
"##;
        let err = resolve_with(text, &MemorySource::new(), None).await.unwrap_err();
        assert_eq!(err.kind(), "CyclicReference");
    }

    #[tokio::test]
    async fn test_cycle_across_documents() {
        let mut source = MemorySource::new();
        source.insert("a.yaml", "A: {$ref: 'b.yaml#/B'}\n");
        source.insert("b.yaml", "B: {$ref: 'a.yaml#/A'}\n");
        let text = "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\nx-a: {$ref: 'a.yaml#/A'}\n";
        let err = resolve_with(text, &source, Some("root.yaml")).await.unwrap_err();
        assert_eq!(err.kind(), "CyclicReference");
    }

    #[tokio::test]
    async fn test_diamond_sharing_is_not_a_cycle() {
        let mut source = MemorySource::new();
        source.insert("common.yaml", "Id: {type: string, format: uuid}\n");
        let text = r##"
openapi: 3.0.0
info: {title: t, version: "1"}
paths: {}
components:
  schemas:
    A: {properties: {id: {$ref: 'common.yaml#/Id'}}}
    B: {properties: {id: {$ref: 'common.yaml#/Id'}, a: {$ref: '#/components/schemas/A'}}}
"##;
        let doc = resolve_with(text, &source, Some("root.yaml")).await.unwrap();
        let nested: JsonPointer = "/components/schemas/B/properties/a/properties/id/format"
            .parse()
            .unwrap();
        assert_eq!(nested.lookup(doc.root()).and_then(Node::as_str), Some("uuid"));
    }

    #[tokio::test]
    async fn test_unresolved_pointer() {
        let text = "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\nx-y: {$ref: '#/components/schemas/Missing'}\n";
        let err = resolve_with(text, &MemorySource::new(), None).await.unwrap_err();
        assert_eq!(
            err,
            ResolutionError::UnresolvedReference {
                reference: "#/components/schemas/Missing".into(),
                referenced_from: "/x-y".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_external_document_is_a_fetch_failure() {
        let text = "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\nx-y: {$ref: 'gone.yaml'}\n";
        let err = resolve_with(text, &MemorySource::new(), None).await.unwrap_err();
        assert_eq!(
            err,
            ResolutionError::FetchFailed {
                locator: "gone.yaml".into(),
                reason: "not found".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let mut source = MemorySource::new();
        source.insert("slow.yaml", "type: string\n");
        let source = source.with_delay(Duration::from_secs(5));
        let text = "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\nx-y: {$ref: 'slow.yaml'}\n";
        let err = resolve_with(text, &source, None).await.unwrap_err();
        assert_eq!(
            err,
            ResolutionError::FetchTimeout {
                locator: "slow.yaml".into(),
                timeout_ms: 200,
            }
        );
        assert_eq!(err.to_string(), "timed out after 200ms fetching slow.yaml");
    }

    #[tokio::test]
    async fn test_inline_root_is_distinct_from_any_file() {
        let mut source = MemorySource::new();
        source.insert("<inline>", "Pet: {type: object}\n");
        let text = "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\nx-pet: {$ref: '<inline>#/Pet'}\n";
        let doc = resolve_with(text, &source, None).await.unwrap();
        let pet: JsonPointer = "/x-pet/type".parse().unwrap();
        assert_eq!(pet.lookup(doc.root()).and_then(Node::as_str), Some("object"));
    }

    #[tokio::test]
    async fn test_malformed_external_document() {
        let mut source = MemorySource::new();
        source.insert("bad.json", "{\"type\": ");
        let text = "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\nx-y: {$ref: 'bad.json'}\n";
        let err = resolve_with(text, &source, None).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidDocument");
    }

    #[tokio::test]
    async fn test_invalid_fragment() {
        let text = "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\nx-y: {$ref: '#anchor'}\n";
        let err = resolve_with(text, &MemorySource::new(), None).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidReference");
    }

    #[tokio::test]
    async fn test_non_string_ref_is_plain_data() {
        let text = r#"{"openapi": "3.0.0", "info": {"title": "t", "version": "1"}, "paths": {},
            "components": {"schemas": {"S": {"properties": {"$ref": {"type": "string"}}}}}}"#;
        let doc = resolve_with(text, &MemorySource::new(), None).await.unwrap();
        let field: JsonPointer = "/components/schemas/S/properties/$ref/type".parse().unwrap();
        assert_eq!(field.lookup(doc.root()).and_then(Node::as_str), Some("string"));
    }
}
