//! C# extraction.
//!
//! Classes, interfaces, enums, structs, and methods become nodes; ASP.NET
//! attribute routing (`[HttpGet("...")]` with a class-level `[Route]` base)
//! and minimal-API `MapGet("...")` calls become APIRoute nodes; `using`
//! directives become IMPORTS edges.

use tree_sitter::Node as TsNode;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::common::{
    call_site, enclosing_snippet, for_each_node, join_route, node_text, unquote, SpanIndex,
};
use crate::strategies::{StrategyContext, StrategyOutput};

const HTTP_ATTRIBUTES: &[(&str, &str)] = &[
    ("HttpGet", "GET"),
    ("HttpPost", "POST"),
    ("HttpPut", "PUT"),
    ("HttpDelete", "DELETE"),
    ("HttpPatch", "PATCH"),
];

const MAP_CALLS: &[(&str, &str)] = &[
    ("MapGet", "GET"),
    ("MapPost", "POST"),
    ("MapPut", "PUT"),
    ("MapDelete", "DELETE"),
    ("MapPatch", "PATCH"),
];

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let Some(tree) = ctx.tree else {
        return out;
    };

    let file_id = out.file_id().to_string();
    let root = tree.root_node();
    let mut spans = SpanIndex::new();

    for_each_node(root, &mut |node| match node.kind() {
        "class_declaration" | "interface_declaration" | "enum_declaration"
        | "struct_declaration" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let class = Node::new(
                "class",
                name,
                NodeType::Class,
                name,
                ctx.file_path,
                ctx.language.as_str(),
            )
            .with_snippet(enclosing_snippet(node, ctx.source));
            spans.insert_node(node, &class);
            out.exports.insert(name.to_string(), class.id.clone());
            out.nodes.push(class);

            if node.kind() == "class_declaration" {
                extract_attribute_routes(ctx, &mut out, node, name);
            }
        }
        "method_declaration" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let method = Node::new(
                "function",
                name,
                NodeType::Function,
                name,
                ctx.file_path,
                ctx.language.as_str(),
            )
            .with_snippet(node_text(node, ctx.source));
            spans.insert_node(node, &method);
            out.exports.insert(name.to_string(), method.id.clone());
            out.nodes.push(method);
        }
        "using_directive" => {
            let text = node_text(node, ctx.source);
            let spec = text
                .trim_start_matches("using")
                .trim()
                .trim_start_matches("static")
                .trim()
                .trim_end_matches(';')
                .trim();
            if !spec.is_empty() && !spec.contains('=') {
                out.edges.push(Edge::new(&file_id, spec, EdgeType::Imports));
            }
        }
        "invocation_expression" => {
            extract_invocation(ctx, &mut out, node, &spans, &file_id);
        }
        _ => {}
    });

    out
}

/// ASP.NET attribute routing on a controller class.
fn extract_attribute_routes(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    class: TsNode<'_>,
    class_name: &str,
) {
    let controller = class_name.trim_end_matches("Controller").to_lowercase();
    let base = attribute_arg(class, ctx.source, "Route")
        .map(|b| b.replace("[controller]", &controller))
        .unwrap_or_default();

    let Some(body) = class.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        if member.kind() != "method_declaration" {
            continue;
        }
        for (attr, method) in HTTP_ATTRIBUTES {
            let Some(sub) = attribute_arg_or_empty(member, ctx.source, attr) else {
                continue;
            };
            let label = join_route(&base, &sub);
            out.nodes.push(Node {
                id: node_id("route", &label, ctx.file_path, Some(member.start_byte())),
                node_type: NodeType::ApiRoute,
                label,
                file_path: ctx.file_path.to_string(),
                language: ctx.language.as_str().to_string(),
                code_snippet: Some(node_text(member, ctx.source).to_string()),
                metadata: NodeMetadata::route("ASP.NET", Some(method)),
            });
        }
    }
}

/// String argument of a named attribute on a declaration, or `None` when
/// the attribute is absent.
fn attribute_arg(node: TsNode<'_>, source: &str, name: &str) -> Option<String> {
    find_attribute(node, source, name).and_then(|a| first_string_in(a, source))
}

/// Like [`attribute_arg`] but an argument-less attribute yields the empty
/// segment.
fn attribute_arg_or_empty(node: TsNode<'_>, source: &str, name: &str) -> Option<String> {
    let attribute = find_attribute(node, source, name)?;
    Some(first_string_in(attribute, source).unwrap_or_default())
}

fn find_attribute<'t>(node: TsNode<'t>, source: &str, name: &str) -> Option<TsNode<'t>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "attribute_list" {
            continue;
        }
        let mut inner = child.walk();
        for attribute in child.children(&mut inner) {
            if attribute.kind() != "attribute" {
                continue;
            }
            let attr_name = attribute
                .child_by_field_name("name")
                .map(|n| node_text(n, source))
                .unwrap_or("");
            if attr_name == name {
                return Some(attribute);
            }
        }
    }
    None
}

fn first_string_in(node: TsNode<'_>, source: &str) -> Option<String> {
    let mut result = None;
    for_each_node(node, &mut |n| {
        if result.is_none() && n.kind() == "string_literal" {
            result = Some(unquote(node_text(n, source)).to_string());
        }
    });
    result
}

fn extract_invocation(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    node: TsNode<'_>,
    spans: &SpanIndex,
    file_id: &str,
) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    if function.kind() != "member_access_expression" {
        if function.kind() == "identifier" {
            out.calls.push(call_site(
                spans,
                file_id,
                ctx.file_path,
                node.start_byte(),
                node_text(function, ctx.source),
                None,
            ));
        }
        return;
    }
    let Some(name_node) = function.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, ctx.source);

    // Minimal API: app.MapGet("/users", handler).
    if let Some(&(_, method)) = MAP_CALLS.iter().find(|(n, _)| *n == name) {
        if let Some(path) = first_string_in(node, ctx.source) {
            if path.starts_with('/') {
                out.nodes.push(Node {
                    id: node_id("route", &path, ctx.file_path, Some(node.start_byte())),
                    node_type: NodeType::ApiRoute,
                    label: path,
                    file_path: ctx.file_path.to_string(),
                    language: ctx.language.as_str().to_string(),
                    code_snippet: Some(enclosing_snippet(node, ctx.source).to_string()),
                    metadata: NodeMetadata::route("ASP.NET", Some(method)),
                });
                return;
            }
        }
    }

    let qualifier = function
        .child_by_field_name("expression")
        .filter(|e| e.kind() == "identifier")
        .map(|e| node_text(e, ctx.source));
    out.calls.push(call_site(
        spans,
        file_id,
        ctx.file_path,
        node.start_byte(),
        name,
        qualifier,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserProvider;
    use std::path::PathBuf;

    fn run(path: &str, source: &str) -> StrategyOutput {
        let mut provider = ParserProvider::new();
        let parsed = provider.parse(&PathBuf::from(path), source).unwrap();
        let ctx = StrategyContext {
            file_path: path,
            source,
            language: parsed.language,
            tree: parsed.tree.as_ref(),
        };
        analyze(&ctx)
    }

    #[test]
    fn test_controller_attribute_routes() {
        let out = run(
            "/srv/UsersController.cs",
            "[ApiController]\n[Route(\"api/[controller]\")]\npublic class UsersController\n{\n    [HttpGet(\"{id}\")]\n    public string Get(int id) { return \"\"; }\n    [HttpPost]\n    public string Create() { return \"\"; }\n}\n",
        );
        let mut labels: Vec<&str> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::ApiRoute)
            .map(|n| n.label.as_str())
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["/api/users", "/api/users/{id}"]);
    }

    #[test]
    fn test_minimal_api_map_calls() {
        let out = run(
            "/srv/Program.cs",
            "app.MapGet(\"/health\", () => \"ok\");\n",
        );
        let route = out
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::ApiRoute)
            .unwrap();
        assert_eq!(route.label, "/health");
        assert_eq!(route.metadata.http_method.as_deref(), Some("GET"));
    }

    #[test]
    fn test_using_imports() {
        let out = run(
            "/srv/Service.cs",
            "using System.Collections.Generic;\nusing Alias = Some.Thing;\nnamespace App { class UserService {} }\n",
        );
        let targets: Vec<&str> = out
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Imports)
            .map(|e| e.target_id.as_str())
            .collect();
        assert_eq!(targets, vec!["System.Collections.Generic"]);
    }
}
