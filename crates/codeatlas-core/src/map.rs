//! Code Map Schema Definitions
//!
//! This module defines the node/edge schema for the emitted code map, the
//! deterministic id scheme, and the fixed-shape statistics record produced
//! by the code quality analyzer.
//!
//! Node ids are `SHA-1("kind:key:filePath[:offset]")` hex over UTF-8 bytes
//! with forward-slash normalized paths. Synthetic nodes (database, container
//! image, table, GraphQL schema) use fixed pseudo-ids instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Map format version constant
pub const MAP_VERSION: &str = "1.0";

/// Generator tag stamped into emitted maps
pub const GENERATOR: &str = concat!("codeatlas/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Node Types
// ============================================================================

/// High-level node type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    File,
    Function,
    Class,
    Component,
    #[serde(rename = "APIRoute")]
    ApiRoute,
}

impl NodeType {
    /// Get the string representation used in serialized maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "File",
            NodeType::Function => "Function",
            NodeType::Class => "Class",
            NodeType::Component => "Component",
            NodeType::ApiRoute => "APIRoute",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Edge Types
// ============================================================================

/// Types of relationships between code entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// File-level import of a module or path
    Imports,
    /// Best-effort call from one function to another
    Calls,
    /// Frontend call site matched to a backend route
    ApiCall,
    /// Raw SQL access from a function body
    DbQuery,
    /// Heuristic cross-artifact reference (K8s, Helm, Terraform, ...)
    References,
    /// Message queue publish
    MessagePublish,
    /// Message queue consume
    MessageConsume,
    /// RPC invocation
    RpcCall,
    /// GraphQL operation
    GraphqlQuery,
    /// ORM read access to a table
    ReadsFrom,
    /// ORM write access to a table
    WritesTo,
}

impl EdgeType {
    /// Get the string representation used in serialized maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Imports => "IMPORTS",
            EdgeType::Calls => "CALLS",
            EdgeType::ApiCall => "API_CALL",
            EdgeType::DbQuery => "DB_QUERY",
            EdgeType::References => "REFERENCES",
            EdgeType::MessagePublish => "MESSAGE_PUBLISH",
            EdgeType::MessageConsume => "MESSAGE_CONSUME",
            EdgeType::RpcCall => "RPC_CALL",
            EdgeType::GraphqlQuery => "GRAPHQL_QUERY",
            EdgeType::ReadsFrom => "READS_FROM",
            EdgeType::WritesTo => "WRITES_TO",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Node Metadata
// ============================================================================

/// Semantic metadata attached to nodes.
///
/// The typed fields are the contract consumed by the interaction analyzer
/// (selector matching, Kustomize resolution, Terraform indexing). Everything
/// else goes through the flattened `extra` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Web framework that produced a route ("Express", "Flask", "Next.js", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    /// HTTP method for API routes ("GET", "POST", ...)
    #[serde(rename = "httpMethod", skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,

    /// Infrastructure platform ("Kubernetes", "Helm", "Kustomize", "OpenAPI", "Terraform")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Kubernetes resource kind ("Deployment", "Service", ...)
    #[serde(rename = "resourceKind", skip_serializing_if = "Option::is_none")]
    pub resource_kind: Option<String>,

    /// Resource name from metadata.name or a Terraform block label
    #[serde(rename = "resourceName", skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    /// Terraform resource type ("aws_instance", ...)
    #[serde(rename = "resourceType", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// Kubernetes metadata.labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Kubernetes spec.selector (flattened to key/value pairs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,

    /// Container image references found in a Kubernetes document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,

    /// Kustomize resources: list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,

    /// Helm chart root directory for charts and template documents
    #[serde(rename = "chartRoot", skip_serializing_if = "Option::is_none")]
    pub chart_root: Option<String>,

    /// Inferred SQL dialect for .sql files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,

    /// Catch-all for language-specific annotations (hooks, receivers, roles, ...)
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NodeMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if no field is set.
    pub fn is_empty(&self) -> bool {
        self.framework.is_none()
            && self.http_method.is_none()
            && self.platform.is_none()
            && self.resource_kind.is_none()
            && self.resource_name.is_none()
            && self.resource_type.is_none()
            && self.labels.is_none()
            && self.selector.is_none()
            && self.images.is_none()
            && self.resources.is_none()
            && self.chart_root.is_none()
            && self.dialect.is_none()
            && self.extra.is_empty()
    }

    /// Set a catch-all entry.
    pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Tag a route with framework and HTTP method.
    pub fn route(framework: &str, http_method: Option<&str>) -> Self {
        Self {
            framework: Some(framework.to_string()),
            http_method: http_method.map(|m| m.to_uppercase()),
            ..Self::default()
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A node in the code map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable hash id (or a fixed pseudo-id for synthetic nodes)
    pub id: String,

    /// Node type classification
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Human-readable name or path segment
    pub label: String,

    /// Absolute, forward-slash normalized path; empty for synthetic nodes
    #[serde(rename = "filePath")]
    pub file_path: String,

    /// Language tag ("TypeScript", "YAML", "Terraform", "N/A" for synthetic)
    pub language: String,

    /// Raw text of the enclosing construct
    #[serde(rename = "codeSnippet", skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,

    /// Semantic metadata
    #[serde(default, skip_serializing_if = "NodeMetadata::is_empty")]
    pub metadata: NodeMetadata,
}

impl Node {
    /// Create a node with a hashed id derived from `(kind, key, file_path)`.
    pub fn new(
        kind: &str,
        key: &str,
        node_type: NodeType,
        label: impl Into<String>,
        file_path: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            id: node_id(kind, key, &file_path, None),
            node_type,
            label: label.into(),
            file_path,
            language: language.into(),
            code_snippet: None,
            metadata: NodeMetadata::default(),
        }
    }

    /// Create a File node for a path.
    pub fn file(file_path: impl Into<String>, language: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let label = file_path
            .rsplit('/')
            .next()
            .unwrap_or(file_path.as_str())
            .to_string();
        Self {
            id: node_id("file", &label, &file_path, None),
            node_type: NodeType::File,
            label,
            file_path,
            language: language.into(),
            code_snippet: None,
            metadata: NodeMetadata::default(),
        }
    }

    /// Create a synthetic node with a fixed pseudo-id.
    ///
    /// Used for the on-demand database, table, container image, and GraphQL
    /// schema nodes, which have no backing source artifact.
    pub fn synthetic(id: impl Into<String>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            file_path: String::new(),
            language: "N/A".to_string(),
            code_snippet: None,
            metadata: NodeMetadata::default(),
        }
    }

    /// Attach a code snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.code_snippet = Some(snippet.into());
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Compute a stable node id from its identity components.
///
/// Paths must already be forward-slash normalized; the id is the SHA-1 of
/// `kind:key:filePath` (plus `:offset` for position-disambiguated nodes).
pub fn node_id(kind: &str, key: &str, file_path: &str, offset: Option<usize>) -> String {
    let raw = match offset {
        Some(off) => format!("{}:{}:{}:{}", kind, key, file_path, off),
        None => format!("{}:{}:{}", kind, key, file_path),
    };
    let mut hasher = Sha1::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a path string to forward slashes.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

// ============================================================================
// Edge
// ============================================================================

/// A directed edge in the code map.
///
/// `target_id` may temporarily hold a raw import specifier (or module source
/// string) until the resolution passes rewrite it; unresolved specifiers are
/// kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "sourceId")]
    pub source_id: String,

    #[serde(rename = "targetId")]
    pub target_id: String,

    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        edge_type: EdgeType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type,
        }
    }
}

// ============================================================================
// Call Sites
// ============================================================================

/// A best-effort call site collected during extraction.
///
/// Never emitted; consumed by the call linkage pass to produce CALLS edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Node id of the calling function (or the file node for top-level calls)
    pub caller_id: String,
    /// Called name as written (`load`, `fetchUsers`)
    pub raw: String,
    /// Qualifier for member calls (`api.load` -> `api`)
    pub qualifier: Option<String>,
    /// File the call appears in (normalized path)
    pub caller_file: String,
}

// ============================================================================
// Statistics
// ============================================================================

/// A single reported issue inside a statistics bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "filePath")]
    pub file_path: String,

    #[serde(rename = "functionName", skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    #[serde(rename = "issueType", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A statistics bucket: a total plus per-issue records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBucket {
    pub count: usize,
    pub issues: Vec<Issue>,
}

impl StatBucket {
    pub fn push(&mut self, issue: Issue) {
        self.count += 1;
        self.issues.push(issue);
    }
}

/// Dead code bucket with per-category sub-counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeadCodeStats {
    pub count: usize,
    /// Controllers with no incoming API_CALL or CALLS edges
    pub controllers: usize,
    /// Public service/controller methods with no incoming CALLS edges
    pub methods: usize,
    /// Block comments spanning more than five lines
    #[serde(rename = "commentedBlocks")]
    pub commented_blocks: usize,
    /// Files whose names match backup patterns
    #[serde(rename = "backupFiles")]
    pub backup_files: usize,
    pub issues: Vec<Issue>,
}

impl DeadCodeStats {
    pub fn push(&mut self, issue: Issue) {
        self.count += 1;
        self.issues.push(issue);
    }
}

/// Technical debt bucket with per-marker sub-counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalDebtStats {
    pub count: usize,
    pub todos: usize,
    pub fixmes: usize,
    pub hacks: usize,
    #[serde(rename = "temporaryRemovals")]
    pub temporary_removals: usize,
    pub issues: Vec<Issue>,
}

impl TechnicalDebtStats {
    pub fn push(&mut self, issue: Issue) {
        self.count += 1;
        self.issues.push(issue);
    }
}

/// Fixed-shape statistics record emitted with every map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "dbQueriesInLoops")]
    pub db_queries_in_loops: StatBucket,

    #[serde(rename = "nPlusOneQueries")]
    pub n_plus_one_queries: StatBucket,

    #[serde(rename = "deadCode")]
    pub dead_code: DeadCodeStats,

    #[serde(rename = "technicalDebt")]
    pub technical_debt: TechnicalDebtStats,

    #[serde(rename = "codeSmells")]
    pub code_smells: StatBucket,

    #[serde(rename = "repeatedCode")]
    pub repeated_code: StatBucket,

    pub anomalies: StatBucket,

    #[serde(rename = "blockingAsync")]
    pub blocking_async: StatBucket,
}

// ============================================================================
// Code Map
// ============================================================================

/// The emitted code map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMap {
    pub version: String,

    #[serde(rename = "generatedAt")]
    pub generated_at: String,

    pub generator: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    pub nodes: Vec<Node>,

    pub edges: Vec<Edge>,

    pub statistics: Statistics,
}

impl CodeMap {
    /// Sort nodes and edges into the canonical emission order.
    ///
    /// Nodes order by `(type, filePath, label)`, edges by
    /// `(type, sourceId, targetId)`, both lexicographic and stable. This is
    /// a format contract: golden comparisons are byte-exact.
    pub fn sort(&mut self) {
        self.nodes.sort_by(|a, b| {
            a.node_type
                .as_str()
                .cmp(b.node_type.as_str())
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.label.cmp(&b.label))
        });
        self.edges.sort_by(|a, b| {
            a.edge_type
                .as_str()
                .cmp(b.edge_type.as_str())
                .then_with(|| a.source_id.cmp(&b.source_id))
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Iterate nodes of a type.
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }
}
