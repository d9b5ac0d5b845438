//! PHP extraction (text-driven).
//!
//! Functions and classes become nodes, with Laravel roles inferred from
//! class suffixes and `extends` clauses. `Route::VERB(...)` registrations in
//! route files become APIRoute nodes; `use` and `require` statements become
//! IMPORTS edges.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};
use crate::textscan::{matching_brace, next_open_brace};

static FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:(?:public|protected|private|static|final|abstract)\s+)*function\s+(\w+)\s*\(").unwrap());

static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:(?:final|abstract)\s+)?class\s+(\w+)(?:\s+extends\s+([\w\\]+))?").unwrap());

static ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Route::(get|post|put|delete|patch)\(\s*['"]([^'"]+)['"]"#).unwrap()
});

static USE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*use\s+([\w\\]+)\s*;").unwrap());

static REQUIRE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:require|include)(?:_once)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap()
});

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let file_id = out.file_id().to_string();

    for caps in CLASS_RE.captures_iter(ctx.source) {
        let name = caps.get(1).unwrap().as_str();
        let parent = caps.get(2).map(|m| m.as_str());
        let mut metadata = NodeMetadata::default();
        if name.ends_with("Controller") {
            metadata = metadata.with_extra("role", "controller");
        } else if name.ends_with("Middleware") {
            metadata = metadata.with_extra("role", "middleware");
        } else if parent.is_some_and(|p| p.ends_with("Model")) {
            metadata = metadata.with_extra("role", "model");
        }
        if let Some(parent) = parent {
            metadata = metadata.with_extra("extends", parent);
        }
        let class = Node::new(
            "class",
            name,
            NodeType::Class,
            name,
            ctx.file_path,
            ctx.language.as_str(),
        )
        .with_snippet(block_snippet(ctx.source, caps.get(0).unwrap().start()))
        .with_metadata(metadata);
        out.exports.insert(name.to_string(), class.id.clone());
        out.nodes.push(class);
    }

    for caps in FUNCTION_RE.captures_iter(ctx.source) {
        let name = caps.get(1).unwrap().as_str();
        let function = Node::new(
            "function",
            name,
            NodeType::Function,
            name,
            ctx.file_path,
            ctx.language.as_str(),
        )
        .with_snippet(block_snippet(ctx.source, caps.get(0).unwrap().start()));
        out.exports.insert(name.to_string(), function.id.clone());
        out.nodes.push(function);
    }

    if is_route_file(ctx.file_path) {
        for caps in ROUTE_RE.captures_iter(ctx.source) {
            let verb = caps.get(1).unwrap().as_str();
            let path = caps.get(2).unwrap().as_str();
            out.nodes.push(Node {
                id: node_id("route", path, ctx.file_path, Some(caps.get(0).unwrap().start())),
                node_type: NodeType::ApiRoute,
                label: path.to_string(),
                file_path: ctx.file_path.to_string(),
                language: ctx.language.as_str().to_string(),
                code_snippet: None,
                metadata: NodeMetadata::route("Laravel", Some(verb)),
            });
        }
    }

    for caps in USE_RE.captures_iter(ctx.source) {
        out.edges.push(Edge::new(
            &file_id,
            caps.get(1).unwrap().as_str(),
            EdgeType::Imports,
        ));
    }
    for caps in REQUIRE_RE.captures_iter(ctx.source) {
        out.edges.push(Edge::new(
            &file_id,
            caps.get(1).unwrap().as_str(),
            EdgeType::Imports,
        ));
    }

    out
}

fn is_route_file(file_path: &str) -> bool {
    file_path.contains("/routes/")
        || file_path.ends_with("/web.php")
        || file_path.ends_with("/api.php")
}

/// Snippet from a declaration's start through its balanced brace block,
/// falling back to the rest of the line.
fn block_snippet(source: &str, start: usize) -> String {
    if let Some(open) = next_open_brace(source, start) {
        if let Some(close) = matching_brace(source, open) {
            return source[start..=close].to_string();
        }
    }
    source[start..].lines().next().unwrap_or("").to_string()
}
