//! Interaction Analyzer
//!
//! Single-threaded post-extraction passes over the merged map: IMPORTS
//! resolution, API call synthesis, database and ORM lineage, Kubernetes
//! selector linkage, Helm/Kustomize linkage, Terraform references, and
//! GraphQL schema references. Passes are additive except IMPORTS (and
//! Terraform module sources), which rewrite edge targets in place.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::map::{CallSite, Edge, EdgeType, Node, NodeType};

pub mod api_calls;
pub mod calls;
pub mod database;
pub mod graphql;
pub mod helm;
pub mod imports;
pub mod kubernetes;
pub mod terraform;

// ============================================================================
// Interaction Rules
// ============================================================================

/// One endpoint of an interaction rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEndpoint {
    /// Directory, absolute or relative to the project root
    pub path: String,
    /// Prefix prepended to normalized call URLs before matching
    #[serde(rename = "urlPrefix", default)]
    pub url_prefix: Option<String>,
}

/// Pairs a frontend root with a backend root for API call synthesis.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionRule {
    #[serde(rename = "type", default = "default_rule_type")]
    pub rule_type: String,
    pub frontend: RuleEndpoint,
    pub backend: RuleEndpoint,
}

fn default_rule_type() -> String {
    "API_CALL".to_string()
}

// ============================================================================
// Analysis State
// ============================================================================

/// The merged map while the post-passes run over it.
pub struct AnalysisState {
    /// Canonical project root
    pub root: PathBuf,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// File path -> exported name -> node id
    pub exports: BTreeMap<String, BTreeMap<String, String>>,
    /// Call sites merged across files
    pub calls: Vec<CallSite>,
}

impl AnalysisState {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            edges: Vec::new(),
            exports: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    /// File path -> File node id.
    pub fn file_index(&self) -> HashMap<String, String> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == NodeType::File)
            .map(|n| (n.file_path.clone(), n.id.clone()))
            .collect()
    }

    /// Node id -> index into `nodes`.
    pub fn node_index(&self) -> HashMap<String, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect()
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Add a node unless its id already exists. Returns the node id.
    ///
    /// This is how synthetic nodes stay single-instanced: their fixed
    /// pseudo-ids collide on the second request.
    pub fn add_node_once(&mut self, node: Node) -> String {
        if let Some(existing) = self.nodes.iter().find(|n| n.id == node.id) {
            return existing.id.clone();
        }
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Add an edge unless an identical one exists.
    pub fn add_edge_once(&mut self, edge: Edge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }
}

// ============================================================================
// Pass Driver
// ============================================================================

/// Run every linkage pass in the contract order.
pub fn run_passes(state: &mut AnalysisState, rules: &[InteractionRule]) {
    debug!("resolving imports");
    imports::resolve_imports(state);
    debug!("linking call sites");
    calls::link_calls(state);
    debug!("synthesizing API calls");
    api_calls::synthesize_api_calls(state, rules);
    debug!("database lineage");
    database::db_lineage(state);
    database::orm_lineage(state);
    debug!("kubernetes linkage");
    kubernetes::link_kubernetes(state);
    debug!("helm and kustomize linkage");
    helm::link_helm(state);
    helm::link_kustomize(state);
    debug!("terraform linkage");
    terraform::link_terraform(state);
    debug!("graphql linkage");
    graphql::link_graphql(state);
}

// ============================================================================
// Path Helpers
// ============================================================================

/// Lexically join and normalize a possibly-relative path against a base
/// directory, resolving `.` and `..` without touching the filesystem.
/// Returns a forward-slash string.
pub(crate) fn normalize_join(base_dir: &str, rel: &str) -> String {
    let combined = if rel.starts_with('/') {
        rel.to_string()
    } else {
        format!("{}/{}", base_dir.trim_end_matches('/'), rel)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in combined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Directory component of a normalized path.
pub(crate) fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Anchor a rule path at the project root unless it is already absolute.
pub(crate) fn anchor(root: &Path, path: &str) -> String {
    let normalized = crate::map::normalize_path(path);
    if normalized.starts_with('/') {
        normalized
    } else {
        normalize_join(
            &crate::map::normalize_path(&root.to_string_lossy()),
            &normalized,
        )
    }
}

/// True when `path` falls under `base`. Plain prefix semantics: a rule
/// path of `client` covers `client.ts` as well as `client/api.ts`.
pub(crate) fn under(path: &str, base: &str) -> bool {
    path.starts_with(base)
}

/// Resolved import targets of each file, for traversal by the call pass.
pub(crate) fn imported_files(
    edges: &[Edge],
    nodes: &[Node],
) -> HashMap<String, Vec<String>> {
    let id_to_path: HashMap<&str, &str> = nodes
        .iter()
        .filter(|n| n.node_type == NodeType::File)
        .map(|n| (n.id.as_str(), n.file_path.as_str()))
        .collect();

    let mut result: HashMap<String, Vec<String>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.edge_type == EdgeType::Imports) {
        let (Some(&source_path), Some(&target_path)) = (
            id_to_path.get(edge.source_id.as_str()),
            id_to_path.get(edge.target_id.as_str()),
        ) else {
            continue;
        };
        result
            .entry(source_path.to_string())
            .or_default()
            .push(target_path.to_string());
    }
    for targets in result.values_mut() {
        targets.sort();
        targets.dedup();
    }
    result
}
