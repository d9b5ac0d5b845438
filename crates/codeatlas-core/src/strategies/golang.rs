//! Go extraction.
//!
//! Functions, methods (with receivers), struct and interface types become
//! nodes; router-style `ident.VERB("/path", ...)` calls (Gin, Echo, Fiber,
//! Chi) and `http.ResponseWriter` handler signatures become APIRoute nodes;
//! quoted import paths become IMPORTS edges.

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

    for_each_node(root, &mut |node| match node.kind() {
        "function_declaration" => {
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
            out.exports.insert(name.to_string(), function.id.clone());
            out.nodes.push(function);

            // net/http handler by signature.
            if let Some(params) = node.child_by_field_name("parameters") {
                if node_text(params, ctx.source).contains("http.ResponseWriter") {
                    out.nodes.push(Node {
                        id: node_id("route", name, ctx.file_path, Some(node.start_byte())),
                        node_type: NodeType::ApiRoute,
                        label: name.to_string(),
                        file_path: ctx.file_path.to_string(),
                        language: ctx.language.as_str().to_string(),
                        code_snippet: Some(enclosing_snippet(node, ctx.source).to_string()),
                        metadata: NodeMetadata::route("net/http", None),
                    });
                }
            }
        }
        "method_declaration" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let receiver = node
                .child_by_field_name("receiver")
                .map(|r| node_text(r, ctx.source).to_string());
            let mut metadata = NodeMetadata::default();
            if let Some(receiver) = receiver {
                metadata = metadata.with_extra("receiver", receiver);
            }
            let method = Node::new(
                "function",
                name,
                NodeType::Function,
                name,
                ctx.file_path,
                ctx.language.as_str(),
            )
            .with_snippet(enclosing_snippet(node, ctx.source))
            .with_metadata(metadata);
            spans.insert_node(node, &method);
            out.exports.insert(name.to_string(), method.id.clone());
            out.nodes.push(method);
        }
        "type_spec" => {
            let (Some(name_node), Some(type_node)) = (
                node.child_by_field_name("name"),
                node.child_by_field_name("type"),
            ) else {
                return;
            };
            let kind = match type_node.kind() {
                "struct_type" => "struct",
                "interface_type" => "interface",
                _ => return,
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
            .with_snippet(enclosing_snippet(node, ctx.source))
            .with_metadata(NodeMetadata::default().with_extra("kind", kind));
            spans.insert_node(node, &class);
            out.exports.insert(name.to_string(), class.id.clone());
            out.nodes.push(class);
        }
        "import_spec" => {
            if let Some(path) = node.child_by_field_name("path") {
                let spec = unquote(node_text(path, ctx.source));
                if !spec.is_empty() {
                    out.edges.push(Edge::new(&file_id, spec, EdgeType::Imports));
                }
            }
        }
        "call_expression" => {
            extract_call(ctx, &mut out, node, &spans, &file_id);
        }
        _ => {}
    });

    out
}

fn extract_call(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    node: TsNode<'_>,
    spans: &SpanIndex,
    file_id: &str,
) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    match function.kind() {
        "identifier" => {
            out.calls.push(call_site(
                spans,
                file_id,
                ctx.file_path,
                node.start_byte(),
                node_text(function, ctx.source),
                None,
            ));
        }
        "selector_expression" => {
            let (Some(operand), Some(field)) = (
                function.child_by_field_name("operand"),
                function.child_by_field_name("field"),
            ) else {
                return;
            };
            let verb = node_text(field, ctx.source);

            // Router-style registration: r.GET("/users", handler).
            if VERBS.contains(&verb.to_lowercase().as_str()) {
                if let Some(path) = first_string_argument(node, ctx.source) {
                    if path.starts_with('/') {
                        out.nodes.push(Node {
                            id: node_id("route", &path, ctx.file_path, Some(node.start_byte())),
                            node_type: NodeType::ApiRoute,
                            label: path,
                            file_path: ctx.file_path.to_string(),
                            language: ctx.language.as_str().to_string(),
                            code_snippet: Some(
                                enclosing_snippet(node, ctx.source).to_string(),
                            ),
                            metadata: NodeMetadata::route("Go router", Some(verb)),
                        });
                        return;
                    }
                }
            }

            if operand.kind() == "identifier" {
                out.calls.push(call_site(
                    spans,
                    file_id,
                    ctx.file_path,
                    node.start_byte(),
                    verb,
                    Some(node_text(operand, ctx.source)),
                ));
            }
        }
        _ => {}
    }
}

fn first_string_argument(call: TsNode<'_>, source: &str) -> Option<String> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    for arg in arguments.children(&mut cursor) {
        if matches!(arg.kind(), "interpreted_string_literal" | "raw_string_literal") {
            return Some(unquote(node_text(arg, source)).to_string());
        }
    }
    None
}
