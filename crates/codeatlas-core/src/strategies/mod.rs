//! Language Strategy Set
//!
//! A strategy is a per-language extraction function over one file: it takes
//! the raw source plus an optional syntax tree and produces partial nodes,
//! edges, an exports map, and best-effort call sites. Every strategy emits a
//! File node for the analyzed path; AST-backed strategies additionally walk
//! the tree for declarations, imports, and framework routes, while
//! text-backed strategies run their extraction over the raw source.
//!
//! Strategies never fail: a malformed tree or unmatched pattern yields
//! whatever was collected up to that point.

use std::collections::BTreeMap;

use tree_sitter::Tree;

use crate::map::{CallSite, Edge, Node};
use crate::parser::Language;

pub mod common;

mod cpp;
mod csharp;
mod dart;
mod golang;
mod java;
mod json;
mod php;
mod python;
mod ruby;
mod rust_lang;
mod shell;
mod sql;
mod terraform;
mod typescript;
mod web;
mod yaml;

/// Input to one strategy invocation.
pub struct StrategyContext<'a> {
    /// Absolute, forward-slash normalized path of the analyzed file
    pub file_path: &'a str,
    /// Raw file contents
    pub source: &'a str,
    /// Language tag for the file
    pub language: Language,
    /// Syntax tree, present only when a grammar parsed the file
    pub tree: Option<&'a Tree>,
}

impl<'a> StrategyContext<'a> {
    /// Create the File node every strategy starts from.
    pub fn file_node(&self) -> Node {
        Node::file(self.file_path, self.language.as_str())
    }
}

/// Partial result of analyzing one file.
#[derive(Debug, Default)]
pub struct StrategyOutput {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Exported name -> node id, for call linkage
    pub exports: BTreeMap<String, String>,
    /// Best-effort call sites, tagged with the caller file by the orchestrator
    pub calls: Vec<CallSite>,
}

impl StrategyOutput {
    /// Start an output with the mandatory File node.
    pub fn with_file(ctx: &StrategyContext) -> Self {
        Self {
            nodes: vec![ctx.file_node()],
            ..Self::default()
        }
    }

    /// The File node id for this output (always the first node pushed).
    pub fn file_id(&self) -> &str {
        &self.nodes[0].id
    }
}

/// Run the strategy matching the context's language tag.
///
/// Languages with no extraction responsibilities (and grammarless languages
/// whose strategy needs a real tree) contribute only their File node.
pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    match ctx.language {
        Language::TypeScript | Language::JavaScript => typescript::analyze(ctx),
        Language::Python => python::analyze(ctx),
        Language::Java => java::analyze(ctx),
        Language::Go => golang::analyze(ctx),
        Language::Cpp => cpp::analyze(ctx),
        Language::CSharp => csharp::analyze(ctx),
        Language::Rust => rust_lang::analyze(ctx),
        Language::Php => php::analyze(ctx),
        Language::Ruby => ruby::analyze(ctx),
        Language::Dart => dart::analyze(ctx),
        Language::Yaml => yaml::analyze(ctx),
        Language::Json => json::analyze(ctx),
        Language::Terraform => terraform::analyze(ctx),
        Language::Sql => sql::analyze(ctx),
        Language::Bash => shell::analyze(ctx),
        Language::Css | Language::Html => web::analyze(ctx),
        // File node only: no extraction responsibilities defined.
        Language::GraphQl
        | Language::Proto
        | Language::Kotlin
        | Language::Swift
        | Language::Scala
        | Language::Lua
        | Language::Dockerfile => StrategyOutput::with_file(ctx),
    }
}
