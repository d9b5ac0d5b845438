//! TypeScript / JavaScript extraction.
//!
//! Declarations (functions, arrow functions, classes) become Function /
//! Class / Component nodes; import statements become IMPORTS edges carrying
//! the raw specifier; Express, NestJS, and Next.js route surfaces become
//! APIRoute nodes. Also emits an exports map and best-effort call sites for
//! the call linkage pass.

use tree_sitter::Node as TsNode;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::common::{
    call_site, enclosing_snippet, for_each_node, join_route, node_text, starts_uppercase, unquote,
    SpanIndex,
};
use crate::strategies::{StrategyContext, StrategyOutput};

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];
const ROUTE_VERBS: &[&str] = &["get", "post", "put", "delete", "patch"];

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let Some(tree) = ctx.tree else {
        return out;
    };

    let react_flavored = is_react_flavored(ctx);
    let file_id = out.file_id().to_string();
    let mut spans = SpanIndex::new();
    let mut declared: Vec<(String, String)> = Vec::new();

    let root = tree.root_node();

    // Declarations first so call sites and exports can refer to them.
    for_each_node(root, &mut |node| match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, ctx.source);
                let decl = push_function(ctx, &mut out, node, name, react_flavored);
                spans.insert_node(node, &decl);
                declared.push((name.to_string(), decl.id));
            }
        }
        "variable_declarator" => {
            let Some(value) = node.child_by_field_name("value") else {
                return;
            };
            if matches!(
                value.kind(),
                "arrow_function" | "function_expression" | "function"
            ) {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = node_text(name_node, ctx.source);
                    let decl = push_function(ctx, &mut out, node, name, react_flavored);
                    spans.insert_node(node, &decl);
                    declared.push((name.to_string(), decl.id));
                }
            }
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
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
                declared.push((name.to_string(), class.id.clone()));
                out.nodes.push(class);
            }
        }
        _ => {}
    });

    extract_imports(ctx, &mut out, root, &file_id);
    extract_express_routes(ctx, &mut out, root);
    extract_nest_routes(ctx, &mut out, root);
    extract_next_routes(ctx, &mut out, root);
    extract_exports(ctx, &mut out, root, &declared);
    extract_calls(ctx, &mut out, root, &spans, &file_id);

    out
}

/// React flavor: `.tsx`/`.jsx` extension, or any react-ish import.
fn is_react_flavored(ctx: &StrategyContext) -> bool {
    if ctx.file_path.ends_with(".tsx") || ctx.file_path.ends_with(".jsx") {
        return true;
    }
    for line in ctx.source.lines() {
        let trimmed = line.trim_start();
        if !(trimmed.starts_with("import ") || trimmed.starts_with("const ")) {
            continue;
        }
        for quote in ['\'', '"'] {
            let mut rest = trimmed;
            while let Some(start) = rest.find(quote) {
                let tail = &rest[start + 1..];
                if let Some(end) = tail.find(quote) {
                    let spec = &tail[..end];
                    if spec == "react" || spec.starts_with("@react") || spec.starts_with("react-") {
                        return true;
                    }
                    rest = &tail[end + 1..];
                } else {
                    break;
                }
            }
        }
    }
    false
}

fn push_function(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    decl: TsNode<'_>,
    name: &str,
    react_flavored: bool,
) -> Node {
    let snippet = enclosing_snippet(decl, ctx.source);
    let body = node_text(decl, ctx.source);

    let is_component = react_flavored
        && starts_uppercase(name)
        && (body.contains("return <") || body.contains("jsx") || body.contains("createElement"));

    let mut metadata = NodeMetadata::default();
    if is_hook_name(name) {
        metadata = metadata.with_extra("isHook", true);
    }

    let (kind, node_type) = if is_component {
        ("component", NodeType::Component)
    } else {
        ("function", NodeType::Function)
    };

    let node = Node::new(
        kind,
        name,
        node_type,
        name,
        ctx.file_path,
        ctx.language.as_str(),
    )
    .with_snippet(snippet)
    .with_metadata(metadata);
    out.nodes.push(node.clone());
    node
}

fn is_hook_name(name: &str) -> bool {
    name.strip_prefix("use")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

fn extract_imports(ctx: &StrategyContext, out: &mut StrategyOutput, root: TsNode<'_>, file_id: &str) {
    for_each_node(root, &mut |node| match node.kind() {
        "import_statement" => {
            if let Some(source) = node.child_by_field_name("source") {
                let spec = unquote(node_text(source, ctx.source));
                if !spec.is_empty() {
                    out.edges.push(Edge::new(file_id, spec, EdgeType::Imports));
                }
            }
        }
        "call_expression" => {
            // CommonJS require("x")
            let Some(function) = node.child_by_field_name("function") else {
                return;
            };
            if node_text(function, ctx.source) != "require" {
                return;
            }
            if let Some(arg) = first_string_argument(node, ctx.source) {
                out.edges.push(Edge::new(file_id, arg, EdgeType::Imports));
            }
        }
        _ => {}
    });
}

/// Express: `app.VERB(path, handler)` / `router.VERB(path, handler)`.
fn extract_express_routes(ctx: &StrategyContext, out: &mut StrategyOutput, root: TsNode<'_>) {
    for_each_node(root, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if function.kind() != "member_expression" {
            return;
        }
        let (Some(object), Some(property)) = (
            function.child_by_field_name("object"),
            function.child_by_field_name("property"),
        ) else {
            return;
        };
        let object_name = node_text(object, ctx.source);
        let verb = node_text(property, ctx.source);
        if !(object_name == "app" || object_name == "router") {
            return;
        }
        if !ROUTE_VERBS.contains(&verb) {
            return;
        }
        let Some(path) = first_string_argument(node, ctx.source) else {
            return;
        };

        let route = Node {
            id: node_id("route", &path, ctx.file_path, Some(node.start_byte())),
            node_type: NodeType::ApiRoute,
            label: path.clone(),
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: Some(enclosing_snippet(node, ctx.source).to_string()),
            metadata: NodeMetadata::route("Express", Some(verb)),
        };
        out.nodes.push(route);
    });
}

/// NestJS: `@Controller(base)` classes with `@Get(sub)`-style method
/// decorators; route labels are the joined segments.
fn extract_nest_routes(ctx: &StrategyContext, out: &mut StrategyOutput, root: TsNode<'_>) {
    for_each_node(root, &mut |node| {
        if node.kind() != "class_declaration" {
            return;
        }
        let Some(base) = decorator_argument(node, ctx.source, &["Controller"]) else {
            return;
        };
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };

        // Method decorators are siblings of the method_definition inside the
        // class body; carry them until the decorated member appears.
        let mut pending: Vec<TsNode> = Vec::new();
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "decorator" => pending.push(member),
                "comment" => {}
                "method_definition" => {
                    for verb in ["Get", "Post", "Put", "Delete", "Patch"] {
                        let sub = decorator_argument(member, ctx.source, &[verb])
                            .or_else(|| decorator_in_list(&pending, ctx.source, verb));
                        if let Some(sub) = sub {
                            let label = join_route(&base, &sub);
                            let route = Node {
                                id: node_id(
                                    "route",
                                    &label,
                                    ctx.file_path,
                                    Some(member.start_byte()),
                                ),
                                node_type: NodeType::ApiRoute,
                                label,
                                file_path: ctx.file_path.to_string(),
                                language: ctx.language.as_str().to_string(),
                                code_snippet: Some(node_text(member, ctx.source).to_string()),
                                metadata: NodeMetadata::route("NestJS", Some(verb)),
                            };
                            out.nodes.push(route);
                        }
                    }
                    pending.clear();
                }
                _ => pending.clear(),
            }
        }
    });
}

/// Scan pending sibling decorators for `@Verb(...)`.
fn decorator_in_list(decorators: &[TsNode], source: &str, name: &str) -> Option<String> {
    for decorator in decorators {
        let text = node_text(*decorator, source);
        if text.starts_with(&format!("@{}(", name)) || text == format!("@{}", name) {
            if let Some(call) = decorator.named_child(0) {
                if let Some(arg) = first_string_argument(call, source) {
                    return Some(arg);
                }
            }
            return Some(String::new());
        }
    }
    None
}

/// First string argument of a decorator call named `names`, on a class or
/// method node. Returns `None` when no such decorator exists.
fn decorator_argument(node: TsNode<'_>, source: &str, names: &[&str]) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        let text = node_text(child, source);
        for name in names {
            if text.starts_with(&format!("@{}(", name)) {
                if let Some(call) = child.named_child(0) {
                    if let Some(arg) = first_string_argument(call, source) {
                        return Some(arg);
                    }
                }
                return Some(String::new());
            }
        }
    }
    None
}

/// Next.js: `pages/api/*` files and `app/api/**/route.{ts,js,tsx,jsx}`
/// (one APIRoute per exported HTTP method handler).
fn extract_next_routes(ctx: &StrategyContext, out: &mut StrategyOutput, root: TsNode<'_>) {
    if let Some(label) = next_app_route_label(ctx.file_path) {
        for_each_node(root, &mut |node| {
            if node.kind() != "export_statement" {
                return;
            }
            let Some(decl) = node.child_by_field_name("declaration") else {
                return;
            };
            if decl.kind() != "function_declaration" {
                return;
            }
            let Some(name_node) = decl.child_by_field_name("name") else {
                return;
            };
            let method = node_text(name_node, ctx.source);
            if !HTTP_METHODS.contains(&method) {
                return;
            }
            let route = Node {
                id: node_id("route", &label, ctx.file_path, Some(decl.start_byte())),
                node_type: NodeType::ApiRoute,
                label: label.clone(),
                file_path: ctx.file_path.to_string(),
                language: ctx.language.as_str().to_string(),
                code_snippet: Some(node_text(decl, ctx.source).to_string()),
                metadata: NodeMetadata::route("Next.js", Some(method)),
            };
            out.nodes.push(route);
        });
    } else if let Some(label) = next_pages_route_label(ctx.file_path) {
        let route = Node {
            id: node_id("route", &label, ctx.file_path, Some(0)),
            node_type: NodeType::ApiRoute,
            label,
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: None,
            metadata: NodeMetadata::route("Next.js", None),
        };
        out.nodes.push(route);
    }
}

fn next_app_route_label(file_path: &str) -> Option<String> {
    let idx = file_path.find("/app/api/")?;
    let rest = &file_path[idx + "/app/api/".len()..];
    let (dir, fname) = match rest.rsplit_once('/') {
        Some((dir, fname)) => (dir, fname),
        None => ("", rest),
    };
    if !matches!(fname, "route.ts" | "route.js" | "route.tsx" | "route.jsx") {
        return None;
    }
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        Some("/".to_string())
    } else {
        Some(format!("/{}", dir))
    }
}

fn next_pages_route_label(file_path: &str) -> Option<String> {
    let idx = file_path.find("/pages/api/")?;
    let rest = &file_path[idx + "/pages/api/".len()..];
    let stem = rest.rsplit_once('.').map(|(s, _)| s).unwrap_or(rest);
    let stem = stem.strip_suffix("/index").unwrap_or(stem);
    Some(format!("/{}", stem.trim_matches('/')))
}

fn extract_exports(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    root: TsNode<'_>,
    declared: &[(String, String)],
) {
    let lookup = |name: &str| -> Option<String> {
        declared
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id.clone())
    };

    for_each_node(root, &mut |node| {
        if node.kind() != "export_statement" {
            return;
        }
        if let Some(decl) = node.child_by_field_name("declaration") {
            match decl.kind() {
                "function_declaration" | "generator_function_declaration" | "class_declaration" => {
                    if let Some(name_node) = decl.child_by_field_name("name") {
                        let name = node_text(name_node, ctx.source);
                        if let Some(id) = lookup(name) {
                            out.exports.insert(name.to_string(), id);
                        }
                    }
                }
                "lexical_declaration" | "variable_declaration" => {
                    let mut cursor = decl.walk();
                    for declarator in decl.children(&mut cursor) {
                        if declarator.kind() != "variable_declarator" {
                            continue;
                        }
                        if let Some(name_node) = declarator.child_by_field_name("name") {
                            let name = node_text(name_node, ctx.source);
                            if let Some(id) = lookup(name) {
                                out.exports.insert(name.to_string(), id);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        // export { a, b as c }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut inner = child.walk();
            for spec in child.children(&mut inner) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let Some(name_node) = spec.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, ctx.source);
                let exported = spec
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, ctx.source))
                    .unwrap_or(name);
                if let Some(id) = lookup(name) {
                    out.exports.insert(exported.to_string(), id);
                }
            }
        }
    });
}

fn extract_calls(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    root: TsNode<'_>,
    spans: &SpanIndex,
    file_id: &str,
) {
    for_each_node(root, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        match function.kind() {
            "identifier" => {
                let raw = node_text(function, ctx.source);
                if raw != "require" {
                    out.calls.push(call_site(
                        spans,
                        file_id,
                        ctx.file_path,
                        node.start_byte(),
                        raw,
                        None,
                    ));
                }
            }
            "member_expression" => {
                let (Some(object), Some(property)) = (
                    function.child_by_field_name("object"),
                    function.child_by_field_name("property"),
                ) else {
                    return;
                };
                if object.kind() != "identifier" {
                    return;
                }
                out.calls.push(call_site(
                    spans,
                    file_id,
                    ctx.file_path,
                    node.start_byte(),
                    node_text(property, ctx.source),
                    Some(node_text(object, ctx.source)),
                ));
            }
            _ => {}
        }
    });
}

/// First string or template literal among a call's arguments.
fn first_string_argument(call: TsNode<'_>, source: &str) -> Option<String> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    for arg in arguments.children(&mut cursor) {
        if matches!(arg.kind(), "string" | "template_string") {
            return Some(unquote(node_text(arg, source)).to_string());
        }
    }
    None
}
