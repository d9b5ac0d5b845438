//! CodeAtlas Core - deterministic code map generation for polyglot repos
//!
//! This crate provides the analysis pipeline:
//! - Per-language extraction strategies over tree-sitter ASTs and raw text
//! - File discovery under include/exclude/size/count budgets
//! - A parallel orchestrator with deterministic, byte-stable output
//! - Cross-file linkage (imports, API calls, databases, Kubernetes, Helm,
//!   Kustomize, Terraform, GraphQL)
//! - A code quality scanner deriving structural metrics from snippets and
//!   the edge graph

pub mod discovery;
pub mod interactions;
pub mod map;
pub mod orchestrator;
pub mod parser;
pub mod quality;
pub mod strategies;
pub mod textscan;

// Re-exports for convenience
pub use discovery::{default_excludes, DiscoveryError, DiscoveryOptions, FileDiscovery};
pub use interactions::{AnalysisState, InteractionRule, RuleEndpoint};
pub use map::{
    node_id, normalize_path, CallSite, CodeMap, Edge, EdgeType, Issue, Node, NodeMetadata,
    NodeType, StatBucket, Statistics, GENERATOR, MAP_VERSION,
};
pub use orchestrator::{AnalysisOptions, Pipeline, PipelineError, PipelineReport};
pub use parser::{Grammar, Language, ParsedFile, ParserError, ParserProvider};
pub use strategies::{StrategyContext, StrategyOutput};
