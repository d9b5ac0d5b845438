//! Python extraction.
//!
//! Functions and classes become nodes; Flask/FastAPI decorators, Django
//! `urls.py` entries, and DRF registrations become APIRoute nodes; `import`
//! and `from ... import` statements become IMPORTS edges with the dotted
//! module as the raw specifier.

use tree_sitter::Node as TsNode;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::common::{
    call_site, enclosing_snippet, for_each_node, node_text, unquote, SpanIndex,
};
use crate::strategies::{StrategyContext, StrategyOutput};

const VERBS: &[&str] = &["get", "post", "put", "delete", "patch"];

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let Some(tree) = ctx.tree else {
        return out;
    };

    let file_id = out.file_id().to_string();
    let root = tree.root_node();
    let mut spans = SpanIndex::new();
    let is_urls_file = ctx.file_path.ends_with("/urls.py") || ctx.file_path == "urls.py";

    for_each_node(root, &mut |node| match node.kind() {
        "function_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let function = Node::new(
                "function",
                name,
                NodeType::Function,
                name,
                ctx.file_path,
                ctx.language.as_str(),
            )
            .with_snippet(enclosing_snippet(node, ctx.source));
            spans.insert_node(node, &function);
            if is_top_level(node) {
                out.exports.insert(name.to_string(), function.id.clone());
            }
            out.nodes.push(function);

            extract_route_decorators(ctx, &mut out, node);
        }
        "class_definition" => {
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
            if is_top_level(node) {
                out.exports.insert(name.to_string(), class.id.clone());
            }
            out.nodes.push(class);

            // DRF viewsets route by convention.
            if let Some(supers) = node.child_by_field_name("superclasses") {
                if node_text(supers, ctx.source).contains("ViewSet") {
                    let resource = name.trim_end_matches("ViewSet").to_lowercase();
                    let label = format!("/{}", resource);
                    out.nodes.push(route_node(
                        ctx,
                        &label,
                        node.start_byte(),
                        "Django REST Framework",
                        None,
                        Some(node_text(node, ctx.source)),
                    ));
                }
            }
        }
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => {
                        out.edges.push(Edge::new(
                            &file_id,
                            node_text(child, ctx.source),
                            EdgeType::Imports,
                        ));
                    }
                    "aliased_import" => {
                        if let Some(name) = child.child_by_field_name("name") {
                            out.edges.push(Edge::new(
                                &file_id,
                                node_text(name, ctx.source),
                                EdgeType::Imports,
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                out.edges.push(Edge::new(
                    &file_id,
                    node_text(module, ctx.source),
                    EdgeType::Imports,
                ));
            }
        }
        "call" => {
            extract_call(ctx, &mut out, node, &spans, &file_id, is_urls_file);
        }
        _ => {}
    });

    out
}

fn is_top_level(node: TsNode<'_>) -> bool {
    match node.parent() {
        None => true,
        Some(parent) => {
            parent.parent().is_none()
                || (parent.kind() == "decorated_definition"
                    && parent.parent().is_some_and(|p| p.parent().is_none()))
        }
    }
}

/// Flask `@x.route(...)` and FastAPI `@x.VERB(...)` decorators on a
/// function definition.
fn extract_route_decorators(ctx: &StrategyContext, out: &mut StrategyOutput, func: TsNode<'_>) {
    let Some(decorated) = func.parent().filter(|p| p.kind() == "decorated_definition") else {
        return;
    };
    let mut cursor = decorated.walk();
    for child in decorated.children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        let Some(call) = find_child(child, "call") else {
            continue;
        };
        let Some(function) = call.child_by_field_name("function") else {
            continue;
        };
        if function.kind() != "attribute" {
            continue;
        }
        let Some(attr) = function.child_by_field_name("attribute") else {
            continue;
        };
        let attr_name = node_text(attr, ctx.source);

        if attr_name == "route" {
            if let Some(path) = first_string_argument(call, ctx.source) {
                let method = flask_methods_kwarg(call, ctx.source).unwrap_or_else(|| "GET".into());
                out.nodes.push(route_node(
                    ctx,
                    &path,
                    func.start_byte(),
                    "Flask",
                    Some(&method),
                    Some(enclosing_snippet(func, ctx.source)),
                ));
            }
        } else if VERBS.contains(&attr_name) {
            if let Some(path) = first_string_argument(call, ctx.source) {
                out.nodes.push(route_node(
                    ctx,
                    &path,
                    func.start_byte(),
                    "FastAPI",
                    Some(attr_name),
                    Some(enclosing_snippet(func, ctx.source)),
                ));
            }
        }
    }
}

/// `methods=["POST"]` keyword argument of a Flask route decorator.
fn flask_methods_kwarg(call: TsNode<'_>, source: &str) -> Option<String> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    for arg in arguments.children(&mut cursor) {
        if arg.kind() != "keyword_argument" {
            continue;
        }
        let name = arg.child_by_field_name("name")?;
        if node_text(name, source) != "methods" {
            continue;
        }
        let value = arg.child_by_field_name("value")?;
        let mut inner = value.walk();
        for item in value.children(&mut inner) {
            if item.kind() == "string" {
                return Some(unquote(node_text(item, source)).to_uppercase());
            }
        }
    }
    None
}

fn extract_call(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    node: TsNode<'_>,
    spans: &SpanIndex,
    file_id: &str,
    is_urls_file: bool,
) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    match function.kind() {
        "identifier" => {
            let raw = node_text(function, ctx.source);
            // Django URLconf entries.
            if is_urls_file && (raw == "path" || raw == "re_path") {
                if let Some(path) = first_string_argument(node, ctx.source) {
                    let label = format!("/{}", path.trim_matches('/'));
                    out.nodes.push(route_node(
                        ctx,
                        &label,
                        node.start_byte(),
                        "Django",
                        None,
                        Some(node_text(node, ctx.source)),
                    ));
                    return;
                }
            }
            out.calls.push(call_site(
                spans,
                file_id,
                ctx.file_path,
                node.start_byte(),
                raw,
                None,
            ));
        }
        "attribute" => {
            let (Some(object), Some(attr)) = (
                function.child_by_field_name("object"),
                function.child_by_field_name("attribute"),
            ) else {
                return;
            };
            let attr_name = node_text(attr, ctx.source);
            let object_name = node_text(object, ctx.source);

            // DRF `router.register("base", ViewSetClass)`.
            if attr_name == "register" && object_name.contains("router") {
                if let Some(base) = first_string_argument(node, ctx.source) {
                    let label = format!("/{}", base.trim_matches('/'));
                    out.nodes.push(route_node(
                        ctx,
                        &label,
                        node.start_byte(),
                        "Django REST Framework",
                        None,
                        Some(node_text(node, ctx.source)),
                    ));
                    return;
                }
            }

            if object.kind() == "identifier" {
                out.calls.push(call_site(
                    spans,
                    file_id,
                    ctx.file_path,
                    node.start_byte(),
                    attr_name,
                    Some(object_name),
                ));
            }
        }
        _ => {}
    }
}

fn route_node(
    ctx: &StrategyContext,
    label: &str,
    offset: usize,
    framework: &str,
    method: Option<&str>,
    snippet: Option<&str>,
) -> Node {
    Node {
        id: node_id("route", label, ctx.file_path, Some(offset)),
        node_type: NodeType::ApiRoute,
        label: label.to_string(),
        file_path: ctx.file_path.to_string(),
        language: ctx.language.as_str().to_string(),
        code_snippet: snippet.map(|s| s.to_string()),
        metadata: NodeMetadata::route(framework, method),
    }
}

fn find_child<'t>(node: TsNode<'t>, kind: &str) -> Option<TsNode<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn first_string_argument(call: TsNode<'_>, source: &str) -> Option<String> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    for arg in arguments.children(&mut cursor) {
        if arg.kind() == "string" {
            return Some(unquote(node_text(arg, source)).to_string());
        }
    }
    None
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
    fn test_function_and_class_extraction() {
        let out = run(
            "/app/models.py",
            "def get_user_data():\n    return {}\n\nclass User:\n    def save(self):\n        pass\n",
        );
        let labels: Vec<(&str, NodeType)> = out
            .nodes
            .iter()
            .map(|n| (n.label.as_str(), n.node_type))
            .collect();
        assert!(labels.contains(&("get_user_data", NodeType::Function)));
        assert!(labels.contains(&("User", NodeType::Class)));
        assert!(labels.contains(&("save", NodeType::Function)));
    }

    #[test]
    fn test_flask_route() {
        let out = run(
            "/app/app.py",
            "@app.route(\"/api/users\", methods=[\"POST\"])\ndef create_user():\n    return {}\n",
        );
        let route = out
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::ApiRoute)
            .unwrap();
        assert_eq!(route.label, "/api/users");
        assert_eq!(route.metadata.framework.as_deref(), Some("Flask"));
        assert_eq!(route.metadata.http_method.as_deref(), Some("POST"));
    }

    #[test]
    fn test_fastapi_route() {
        let out = run(
            "/app/api.py",
            "@router.get(\"/items\")\nasync def list_items():\n    return []\n",
        );
        let route = out
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::ApiRoute)
            .unwrap();
        assert_eq!(route.label, "/items");
        assert_eq!(route.metadata.framework.as_deref(), Some("FastAPI"));
        assert_eq!(route.metadata.http_method.as_deref(), Some("GET"));
    }

    #[test]
    fn test_django_urls() {
        let out = run(
            "/proj/app/urls.py",
            "urlpatterns = [\n    path(\"users/\", views.user_list),\n]\n",
        );
        let route = out
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::ApiRoute)
            .unwrap();
        assert_eq!(route.label, "/users");
        assert_eq!(route.metadata.framework.as_deref(), Some("Django"));
    }

    #[test]
    fn test_drf_register_and_viewset() {
        let out = run(
            "/proj/app/api.py",
            "router.register(\"orders\", OrderViewSet)\n\nclass OrderViewSet(ModelViewSet):\n    pass\n",
        );
        let labels: Vec<&str> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::ApiRoute)
            .map(|n| n.label.as_str())
            .collect();
        assert!(labels.contains(&"/orders"));
        assert!(labels.contains(&"/order"));
    }

    #[test]
    fn test_imports() {
        let out = run(
            "/app/main.py",
            "import os\nimport numpy as np\nfrom flask import Flask\n",
        );
        let targets: Vec<&str> = out
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Imports)
            .map(|e| e.target_id.as_str())
            .collect();
        assert!(targets.contains(&"os"));
        assert!(targets.contains(&"numpy"));
        assert!(targets.contains(&"flask"));
    }

    #[test]
    fn test_call_sites() {
        let out = run(
            "/app/app.py",
            "def get_users():\n    return get_user_data()\n\ndef get_user_data():\n    return {}\n",
        );
        let call = out.calls.iter().find(|c| c.raw == "get_user_data").unwrap();
        let caller = out.nodes.iter().find(|n| n.id == call.caller_id).unwrap();
        assert_eq!(caller.label, "get_users");
    }
}
