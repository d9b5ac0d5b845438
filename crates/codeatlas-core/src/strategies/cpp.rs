//! C / C++ extraction.
//!
//! Classes, structs, enums, namespaces, templates, and function definitions
//! become nodes; `#include` directives become IMPORTS edges with the raw
//! header path.

use tree_sitter::Node as TsNode;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType};
use crate::strategies::common::{
    call_site, enclosing_snippet, for_each_node, node_text, unquote, SpanIndex,
};
use crate::strategies::{StrategyContext, StrategyOutput};

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let Some(tree) = ctx.tree else {
        return out;
    };

    let file_id = out.file_id().to_string();
    let root = tree.root_node();
    let mut spans = SpanIndex::new();

    for_each_node(root, &mut |node| match node.kind() {
        "function_definition" => {
            let Some(name) = function_name(node, ctx.source) else {
                return;
            };
            let function = Node::new(
                "function",
                &name,
                NodeType::Function,
                &name,
                ctx.file_path,
                ctx.language.as_str(),
            )
            .with_snippet(enclosing_snippet(node, ctx.source));
            spans.insert_node(node, &function);
            out.exports.insert(name, function.id.clone());
            out.nodes.push(function);
        }
        "class_specifier" | "struct_specifier" | "enum_specifier" => {
            // Forward declarations and inline uses carry no body.
            if node.child_by_field_name("body").is_none() {
                return;
            }
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let kind = match node.kind() {
                "struct_specifier" => "struct",
                "enum_specifier" => "enum",
                _ => "class",
            };
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
        "namespace_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let ns = Node::new(
                "class",
                name,
                NodeType::Class,
                name,
                ctx.file_path,
                ctx.language.as_str(),
            )
            .with_metadata(NodeMetadata::default().with_extra("kind", "namespace"));
            out.nodes.push(ns);
        }
        "template_declaration" => {
            // The templated entity is walked separately; tag it via extra
            // metadata only when it is a class template with a name.
            if let Some(class) = child_of_kind(node, "class_specifier") {
                if let Some(name_node) = class.child_by_field_name("name") {
                    let name = node_text(name_node, ctx.source);
                    if let Some(existing) =
                        out.nodes.iter_mut().find(|n| n.label == name && n.node_type == NodeType::Class)
                    {
                        existing
                            .metadata
                            .extra
                            .insert("template".to_string(), serde_json::Value::Bool(true));
                    }
                }
            }
        }
        "preproc_include" => {
            if let Some(path) = node.child_by_field_name("path") {
                let raw = node_text(path, ctx.source);
                let spec = unquote(raw.trim_start_matches('<').trim_end_matches('>'));
                if !spec.is_empty() {
                    out.edges.push(Edge::new(&file_id, spec, EdgeType::Imports));
                }
            }
        }
        "call_expression" => {
            if let Some(function) = node.child_by_field_name("function") {
                if function.kind() == "identifier" {
                    out.calls.push(call_site(
                        &spans,
                        &file_id,
                        ctx.file_path,
                        node.start_byte(),
                        node_text(function, ctx.source),
                        None,
                    ));
                }
            }
        }
        _ => {}
    });

    out
}

/// Function name from the declarator chain of a function_definition.
fn function_name(node: TsNode<'_>, source: &str) -> Option<String> {
    let declarator = find_descendant(node, "function_declarator")?;
    let inner = declarator.child_by_field_name("declarator")?;
    let text = node_text(inner, source);
    // Strip any qualification: `Calculator::add` declares `add`.
    Some(text.rsplit("::").next().unwrap_or(text).to_string())
}

fn find_descendant<'t>(node: TsNode<'t>, kind: &str) -> Option<TsNode<'t>> {
    let mut found = None;
    for_each_node(node, &mut |n| {
        if found.is_none() && n.kind() == kind {
            found = Some(n);
        }
    });
    found
}

fn child_of_kind<'t>(node: TsNode<'t>, kind: &str) -> Option<TsNode<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
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
    fn test_class_and_methods() {
        let out = run(
            "/lib/calculator.cpp",
            "#include \"math_utils.h\"\n#include <vector>\n\nclass Calculator {\npublic:\n    int add(int a, int b) { return a + b; }\n};\n\nint Calculator_run() { return 0; }\n",
        );
        assert!(out
            .nodes
            .iter()
            .any(|n| n.label == "Calculator" && n.node_type == NodeType::Class));
        assert!(out
            .nodes
            .iter()
            .any(|n| n.label == "add" && n.node_type == NodeType::Function));

        let targets: Vec<&str> = out
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Imports)
            .map(|e| e.target_id.as_str())
            .collect();
        assert!(targets.contains(&"math_utils.h"));
        assert!(targets.contains(&"vector"));
    }

    #[test]
    fn test_qualified_method_definition() {
        let out = run(
            "/lib/calc.cpp",
            "struct Calc { int add(int, int); };\nint Calc::add(int a, int b) { return a + b; }\n",
        );
        assert!(out
            .nodes
            .iter()
            .any(|n| n.label == "add" && n.node_type == NodeType::Function));
    }

    #[test]
    fn test_namespace() {
        let out = run("/lib/ns.hpp", "namespace math {\nint x;\n}\n");
        assert!(out
            .nodes
            .iter()
            .any(|n| n.label == "math"
                && n.metadata.extra.get("kind")
                    == Some(&serde_json::Value::String("namespace".into()))));
    }
}
