//! Ruby extraction (text-driven).
//!
//! Methods and classes become nodes. Rails controllers (classes inheriting
//! `ApplicationController`) turn their conventional action methods into
//! APIRoute nodes with derived HTTP verbs; Sinatra DSL registrations become
//! APIRoute nodes directly. `require` statements become IMPORTS edges.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};

static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*class\s+(\w+)(?:\s*<\s*([\w:]+))?").unwrap());

static DEF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*def\s+(\w+[?!]?)").unwrap());

static SINATRA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(get|post|put|delete|patch)\s+['"]([^'"]+)['"]"#).unwrap()
});

static REQUIRE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*require(?:_relative)?\s+['"]([^'"]+)['"]"#).unwrap()
});

/// Rails action -> (HTTP verb, path suffix pattern).
const RAILS_ACTIONS: &[(&str, &str, &str)] = &[
    ("index", "GET", ""),
    ("show", "GET", "/:id"),
    ("create", "POST", ""),
    ("update", "PUT", "/:id"),
    ("destroy", "DELETE", "/:id"),
    ("new", "GET", "/new"),
    ("edit", "GET", "/:id/edit"),
];

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let file_id = out.file_id().to_string();

    let mut controller_resource: Option<String> = None;

    for caps in CLASS_RE.captures_iter(ctx.source) {
        let name = caps.get(1).unwrap().as_str();
        let parent = caps.get(2).map(|m| m.as_str());
        let is_controller = parent.is_some_and(|p| p.ends_with("ApplicationController"));

        let mut metadata = NodeMetadata::default();
        if let Some(parent) = parent {
            metadata = metadata.with_extra("extends", parent);
        }
        if is_controller {
            metadata = metadata.with_extra("role", "controller");
            controller_resource = Some(rails_resource(name));
        }

        let class = Node::new(
            "class",
            name,
            NodeType::Class,
            name,
            ctx.file_path,
            ctx.language.as_str(),
        )
        .with_metadata(metadata);
        out.exports.insert(name.to_string(), class.id.clone());
        out.nodes.push(class);
    }

    for caps in DEF_RE.captures_iter(ctx.source) {
        let name = caps.get(1).unwrap().as_str();
        let offset = caps.get(0).unwrap().start();
        let method = Node::new(
            "function",
            name,
            NodeType::Function,
            name,
            ctx.file_path,
            ctx.language.as_str(),
        )
        .with_snippet(def_snippet(ctx.source, offset));
        out.exports.insert(name.to_string(), method.id.clone());
        out.nodes.push(method);

        // Conventional Rails actions route by name.
        if let Some(resource) = &controller_resource {
            if let Some(&(_, verb, suffix)) =
                RAILS_ACTIONS.iter().find(|(action, _, _)| *action == name)
            {
                let label = format!("/{}{}", resource, suffix);
                out.nodes.push(Node {
                    id: node_id("route", &label, ctx.file_path, Some(offset)),
                    node_type: NodeType::ApiRoute,
                    label,
                    file_path: ctx.file_path.to_string(),
                    language: ctx.language.as_str().to_string(),
                    code_snippet: Some(def_snippet(ctx.source, offset)),
                    metadata: NodeMetadata::route("Rails", Some(verb)),
                });
            }
        }
    }

    for caps in SINATRA_RE.captures_iter(ctx.source) {
        let verb = caps.get(1).unwrap().as_str();
        let path = caps.get(2).unwrap().as_str();
        out.nodes.push(Node {
            id: node_id("route", path, ctx.file_path, Some(caps.get(0).unwrap().start())),
            node_type: NodeType::ApiRoute,
            label: path.to_string(),
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: None,
            metadata: NodeMetadata::route("Sinatra", Some(verb)),
        });
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

/// `UsersController` -> `users`.
fn rails_resource(class_name: &str) -> String {
    class_name.trim_end_matches("Controller").to_lowercase()
}

/// Snippet from a `def` line through its matching `end` at the same
/// indentation, falling back to the def line alone.
fn def_snippet(source: &str, start: usize) -> String {
    let rest = &source[start..];
    let indent = rest.chars().take_while(|c| *c == ' ').count();
    let end_marker = format!("\n{}end", " ".repeat(indent));
    match rest.find(&end_marker) {
        Some(idx) => rest[..idx + end_marker.len()].to_string(),
        None => rest.lines().next().unwrap_or("").to_string(),
    }
}
