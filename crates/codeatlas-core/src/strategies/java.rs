//! Java extraction.
//!
//! Classes, interfaces, enums, and methods become nodes; Spring REST
//! annotations with a string argument become APIRoute nodes (class-level
//! `@RequestMapping` bases join with method-level mappings); `import a.b.C`
//! becomes an IMPORTS edge with the dotted FQN.

use tree_sitter::Node as TsNode;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::common::{
    call_site, enclosing_snippet, for_each_node, join_route, node_text, unquote, SpanIndex,
};
use crate::strategies::{StrategyContext, StrategyOutput};

/// Spring mapping annotation -> HTTP method. `RequestMapping` defaults to
/// GET unless a `method =` element says otherwise.
const MAPPINGS: &[(&str, &str)] = &[
    ("GetMapping", "GET"),
    ("PostMapping", "POST"),
    ("PutMapping", "PUT"),
    ("DeleteMapping", "DELETE"),
    ("PatchMapping", "PATCH"),
    ("RequestMapping", "GET"),
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
        "class_declaration" | "interface_declaration" | "enum_declaration" => {
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
            .with_snippet(enclosing_snippet(node, ctx.source))
            .with_metadata(
                NodeMetadata::default().with_extra("kind", kind_label(node.kind())),
            );
            spans.insert_node(node, &class);
            out.exports.insert(name.to_string(), class.id.clone());
            out.nodes.push(class);

            if node.kind() == "class_declaration" {
                extract_spring_routes(ctx, &mut out, node);
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
        "import_declaration" => {
            let text = node_text(node, ctx.source);
            let spec = text
                .trim_start_matches("import")
                .trim_start()
                .trim_start_matches("static")
                .trim()
                .trim_end_matches(';')
                .trim();
            if !spec.is_empty() {
                out.edges.push(Edge::new(&file_id, spec, EdgeType::Imports));
            }
        }
        "method_invocation" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let qualifier = node
                .child_by_field_name("object")
                .filter(|o| o.kind() == "identifier")
                .map(|o| node_text(o, ctx.source));
            out.calls.push(call_site(
                &spans,
                &file_id,
                ctx.file_path,
                node.start_byte(),
                node_text(name_node, ctx.source),
                qualifier,
            ));
        }
        _ => {}
    });

    out
}

fn kind_label(ts_kind: &str) -> &'static str {
    match ts_kind {
        "interface_declaration" => "interface",
        "enum_declaration" => "enum",
        _ => "class",
    }
}

/// Spring endpoints: class-level `@RequestMapping("base")` joined with each
/// method mapping annotation carrying a string argument.
fn extract_spring_routes(ctx: &StrategyContext, out: &mut StrategyOutput, class: TsNode<'_>) {
    let base = class_annotations(class)
        .into_iter()
        .find(|a| annotation_name(*a, ctx.source) == "RequestMapping")
        .and_then(|a| annotation_string_arg(a, ctx.source))
        .unwrap_or_default();

    let Some(body) = class.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        if member.kind() != "method_declaration" {
            continue;
        }
        for annotation in class_annotations(member) {
            let name = annotation_name(annotation, ctx.source);
            let Some(&(_, default_method)) = MAPPINGS.iter().find(|(n, _)| *n == name) else {
                continue;
            };
            let Some(sub) = annotation_string_arg(annotation, ctx.source) else {
                continue;
            };
            let label = join_route(&base, &sub);
            let method = if name == "RequestMapping" {
                request_mapping_method(annotation, ctx.source).unwrap_or(default_method.into())
            } else {
                default_method.to_string()
            };
            out.nodes.push(Node {
                id: node_id("route", &label, ctx.file_path, Some(member.start_byte())),
                node_type: NodeType::ApiRoute,
                label,
                file_path: ctx.file_path.to_string(),
                language: ctx.language.as_str().to_string(),
                code_snippet: Some(node_text(member, ctx.source).to_string()),
                metadata: NodeMetadata::route("Spring", Some(&method)),
            });
        }
    }
}

/// Annotations attached to a class or method via its `modifiers` child.
fn class_annotations(node: TsNode<'_>) -> Vec<TsNode<'_>> {
    let mut annotations = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "modifiers" {
            continue;
        }
        let mut inner = child.walk();
        for modifier in child.children(&mut inner) {
            if matches!(modifier.kind(), "annotation" | "marker_annotation") {
                annotations.push(modifier);
            }
        }
    }
    annotations
}

fn annotation_name<'s>(annotation: TsNode<'_>, source: &'s str) -> &'s str {
    annotation
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or("")
}

/// First string literal inside the annotation's arguments, covering both
/// `@GetMapping("/x")` and `@RequestMapping(value = "/x")`.
fn annotation_string_arg(annotation: TsNode<'_>, source: &str) -> Option<String> {
    let mut result = None;
    for_each_node(annotation, &mut |n| {
        if result.is_none() && n.kind() == "string_literal" {
            result = Some(unquote(node_text(n, source)).to_string());
        }
    });
    result
}

/// `method = RequestMethod.POST` element of a `@RequestMapping`.
fn request_mapping_method(annotation: TsNode<'_>, source: &str) -> Option<String> {
    let text = node_text(annotation, source);
    let idx = text.find("RequestMethod.")?;
    let rest = &text[idx + "RequestMethod.".len()..];
    let end = rest
        .find(|c: char| !c.is_ascii_uppercase())
        .unwrap_or(rest.len());
    Some(rest[..end].to_string())
}
