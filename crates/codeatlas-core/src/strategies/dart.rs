//! Dart extraction (text-driven).
//!
//! Flutter widget classes (extending `StatelessWidget` / `StatefulWidget`)
//! become Component nodes, other classes become Class nodes, and the keys of
//! a `MaterialApp` `routes:` table become APIRoute nodes. `import`
//! statements become IMPORTS edges.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};
use crate::textscan::{matching_brace, next_open_brace};

static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:abstract\s+)?class\s+(\w+)(?:\s+extends\s+(\w+))?").unwrap());

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*import\s+['"]([^'"]+)['"]"#).unwrap());

static ROUTE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"](/[^'"]*)['"]\s*:"#).unwrap());

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let file_id = out.file_id().to_string();

    for caps in CLASS_RE.captures_iter(ctx.source) {
        let name = caps.get(1).unwrap().as_str();
        let parent = caps.get(2).map(|m| m.as_str());
        let is_widget =
            matches!(parent, Some("StatelessWidget") | Some("StatefulWidget"));

        let mut metadata = NodeMetadata::default();
        if is_widget {
            metadata.framework = Some("Flutter".to_string());
        }
        if let Some(parent) = parent {
            metadata = metadata.with_extra("extends", parent);
        }

        let (kind, node_type) = if is_widget {
            ("component", NodeType::Component)
        } else {
            ("class", NodeType::Class)
        };
        let class = Node::new(
            kind,
            name,
            node_type,
            name,
            ctx.file_path,
            ctx.language.as_str(),
        )
        .with_snippet(block_snippet(ctx.source, caps.get(0).unwrap().start()))
        .with_metadata(metadata);
        out.exports.insert(name.to_string(), class.id.clone());
        out.nodes.push(class);
    }

    extract_material_routes(ctx, &mut out);

    for caps in IMPORT_RE.captures_iter(ctx.source) {
        out.edges.push(Edge::new(
            &file_id,
            caps.get(1).unwrap().as_str(),
            EdgeType::Imports,
        ));
    }

    out
}

/// `MaterialApp(routes: {'/': ..., '/detail': ...})` keys.
fn extract_material_routes(ctx: &StrategyContext, out: &mut StrategyOutput) {
    let Some(app_idx) = ctx.source.find("MaterialApp(") else {
        return;
    };
    let Some(routes_idx) = ctx.source[app_idx..].find("routes:").map(|i| app_idx + i) else {
        return;
    };
    let Some(open) = next_open_brace(ctx.source, routes_idx) else {
        return;
    };
    let Some(close) = matching_brace(ctx.source, open) else {
        return;
    };
    let table = &ctx.source[open..=close];
    for caps in ROUTE_KEY_RE.captures_iter(table) {
        let path = caps.get(1).unwrap().as_str();
        out.nodes.push(Node {
            id: node_id(
                "route",
                path,
                ctx.file_path,
                Some(open + caps.get(0).unwrap().start()),
            ),
            node_type: NodeType::ApiRoute,
            label: path.to_string(),
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: None,
            metadata: NodeMetadata::route("Flutter", None),
        });
    }
}

fn block_snippet(source: &str, start: usize) -> String {
    if let Some(open) = next_open_brace(source, start) {
        if let Some(close) = matching_brace(source, open) {
            return source[start..=close].to_string();
        }
    }
    source[start..].lines().next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Language;

    fn run(path: &str, source: &str) -> StrategyOutput {
        let ctx = StrategyContext {
            file_path: path,
            source,
            language: Language::Dart,
            tree: None,
        };
        analyze(&ctx)
    }

    #[test]
    fn test_widgets_become_components() {
        let out = run(
            "/app/lib/home.dart",
            "class HomePage extends StatelessWidget {\n  Widget build(BuildContext context) { return Text('hi'); }\n}\n\nclass Helper {}\n",
        );
        let home = out.nodes.iter().find(|n| n.label == "HomePage").unwrap();
        assert_eq!(home.node_type, NodeType::Component);
        assert_eq!(home.metadata.framework.as_deref(), Some("Flutter"));

        let helper = out.nodes.iter().find(|n| n.label == "Helper").unwrap();
        assert_eq!(helper.node_type, NodeType::Class);
    }

    #[test]
    fn test_material_app_routes() {
        let out = run(
            "/app/lib/main.dart",
            "void main() {\n  runApp(MaterialApp(\n    routes: {\n      '/': (ctx) => HomePage(),\n      '/settings': (ctx) => SettingsPage(),\n    },\n  ));\n}\n",
        );
        let mut labels: Vec<&str> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::ApiRoute)
            .map(|n| n.label.as_str())
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["/", "/settings"]);
    }

    #[test]
    fn test_imports() {
        let out = run(
            "/app/lib/main.dart",
            "import 'package:flutter/material.dart';\nimport 'home.dart';\n",
        );
        let targets: Vec<&str> = out.edges.iter().map(|e| e.target_id.as_str()).collect();
        assert!(targets.contains(&"package:flutter/material.dart"));
        assert!(targets.contains(&"home.dart"));
    }
}
