//! Rust extraction.
//!
//! Functions, structs, enums, traits, modules, and macro definitions become
//! nodes; functions inside `impl` blocks record their impl target; `use`
//! declarations become IMPORTS edges with the raw path.

use tree_sitter::Node as TsNode;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType};
use crate::strategies::common::{
    call_site, enclosing_snippet, for_each_node, node_text, SpanIndex,
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
        "function_item" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let mut metadata = NodeMetadata::default();
            if let Some(target) = impl_target(node, ctx.source) {
                metadata = metadata.with_extra("implTarget", target);
            }
            let function = Node::new(
                "function",
                name,
                NodeType::Function,
                name,
                ctx.file_path,
                ctx.language.as_str(),
            )
            .with_snippet(enclosing_snippet(node, ctx.source))
            .with_metadata(metadata);
            spans.insert_node(node, &function);
            out.exports.insert(name.to_string(), function.id.clone());
            out.nodes.push(function);
        }
        "struct_item" | "enum_item" | "trait_item" | "mod_item" | "macro_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, ctx.source);
            let kind = match node.kind() {
                "struct_item" => "struct",
                "enum_item" => "enum",
                "trait_item" => "trait",
                "mod_item" => "module",
                _ => "macro",
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
        "use_declaration" => {
            if let Some(argument) = node.child_by_field_name("argument") {
                let spec = node_text(argument, ctx.source);
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

/// The implemented type for a function nested in an `impl` block.
///
/// For `impl Trait for Type`, returns `Type`.
fn impl_target(node: TsNode<'_>, source: &str) -> Option<String> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "impl_item" {
            let type_child = parent.child_by_field_name("type")?;
            if type_child.kind() == "generic_type" {
                let mut cursor = type_child.walk();
                for child in type_child.children(&mut cursor) {
                    if child.kind() == "type_identifier" {
                        return Some(node_text(child, source).to_string());
                    }
                }
            }
            return Some(node_text(type_child, source).to_string());
        }
        current = parent.parent();
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
    fn test_items() {
        let out = run(
            "/crate/src/lib.rs",
            "pub struct Store;\npub enum Mode { A, B }\npub trait Sink {}\npub fn run() {}\n",
        );
        let kinds: Vec<(&str, NodeType)> = out
            .nodes
            .iter()
            .map(|n| (n.label.as_str(), n.node_type))
            .collect();
        assert!(kinds.contains(&("Store", NodeType::Class)));
        assert!(kinds.contains(&("Mode", NodeType::Class)));
        assert!(kinds.contains(&("Sink", NodeType::Class)));
        assert!(kinds.contains(&("run", NodeType::Function)));
    }

    #[test]
    fn test_impl_target_metadata() {
        let out = run(
            "/crate/src/store.rs",
            "struct Store;\nimpl Store {\n    fn open() -> Self { Store }\n}\n",
        );
        let open = out.nodes.iter().find(|n| n.label == "open").unwrap();
        assert_eq!(
            open.metadata.extra.get("implTarget"),
            Some(&serde_json::Value::String("Store".into()))
        );
    }

    #[test]
    fn test_use_imports() {
        let out = run(
            "/crate/src/lib.rs",
            "use std::collections::HashMap;\nuse serde::{Serialize, Deserialize};\n",
        );
        let targets: Vec<&str> = out
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Imports)
            .map(|e| e.target_id.as_str())
            .collect();
        assert!(targets.contains(&"std::collections::HashMap"));
        assert!(targets.contains(&"serde::{Serialize, Deserialize}"));
    }
}
