//! Terraform linkage.
//!
//! Indexes resources by `type.name` and emits REFERENCES edges for
//! `depends_on` lists and inline references found in resource snippets.
//! Module-source REFERENCES edges left by the strategy are rewritten to the
//! File node of the resolved path when one exists.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::interactions::{normalize_join, parent_dir, AnalysisState};
use crate::map::{Edge, EdgeType, NodeType};

static DEPENDS_ON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"depends_on\s*=\s*\[([^\]]*)\]").unwrap());

pub fn link_terraform(state: &mut AnalysisState) {
    // type.name -> node id across every Terraform resource.
    let index: Vec<(String, String)> = state
        .nodes
        .iter()
        .filter(|n| {
            n.metadata.platform.as_deref() == Some("Terraform")
                && n.metadata.resource_type.is_some()
        })
        .map(|n| (n.label.clone(), n.id.clone()))
        .collect();

    let mut new_edges = Vec::new();
    for node in state.nodes.iter().filter(|n| {
        n.metadata.platform.as_deref() == Some("Terraform") && n.metadata.resource_type.is_some()
    }) {
        let Some(snippet) = node.code_snippet.as_deref() else {
            continue;
        };

        let depends_on: String = DEPENDS_ON_RE
            .captures_iter(snippet)
            .map(|c| c[1].to_string())
            .collect::<Vec<_>>()
            .join(",");

        for (key, target_id) in &index {
            if *target_id == node.id {
                continue;
            }
            if depends_on.contains(key) || body_references(snippet, key) {
                new_edges.push(Edge::new(&node.id, target_id, EdgeType::References));
            }
        }
    }

    debug!("terraform linkage: {} edges", new_edges.len());
    for edge in new_edges {
        state.add_edge_once(edge);
    }

    rewrite_module_sources(state);
}

/// Inline `type.name` reference anywhere outside the resource's own header.
fn body_references(snippet: &str, key: &str) -> bool {
    snippet
        .match_indices(key)
        .any(|(idx, _)| {
            // Exclude the block header line `resource "type" "name"`.
            let line_start = snippet[..idx].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let line = &snippet[line_start..];
            !line.trim_start().starts_with("resource")
        })
}

/// Rewrite raw local module sources to File node ids where the target file
/// was discovered; otherwise the raw source string stays.
fn rewrite_module_sources(state: &mut AnalysisState) {
    let file_ids = state.file_index();
    let module_files: std::collections::HashMap<String, String> = state
        .nodes
        .iter()
        .filter(|n| n.metadata.platform.as_deref() == Some("Terraform"))
        .map(|n| (n.id.clone(), n.file_path.clone()))
        .collect();

    for edge in state
        .edges
        .iter_mut()
        .filter(|e| e.edge_type == EdgeType::References)
    {
        let target = edge.target_id.clone();
        if !(target.starts_with("./") || target.starts_with("../") || target.starts_with('/')) {
            continue;
        }
        let Some(module_file) = module_files.get(&edge.source_id) else {
            continue;
        };
        let resolved = normalize_join(parent_dir(module_file), &target);
        if let Some(id) = file_ids
            .get(&resolved)
            .or_else(|| file_ids.get(&format!("{}/main.tf", resolved)))
        {
            edge.target_id = id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Node, NodeMetadata};
    use std::path::PathBuf;

    fn resource(label: &str, snippet: &str) -> Node {
        let (resource_type, name) = label.split_once('.').unwrap();
        Node {
            id: format!("tf-{}", label),
            node_type: NodeType::Component,
            label: label.to_string(),
            file_path: "/infra/main.tf".to_string(),
            language: "Terraform".to_string(),
            code_snippet: Some(snippet.to_string()),
            metadata: NodeMetadata {
                platform: Some("Terraform".to_string()),
                resource_type: Some(resource_type.to_string()),
                resource_name: Some(name.to_string()),
                ..NodeMetadata::default()
            },
        }
    }

    #[test]
    fn test_depends_on_reference() {
        let mut state = AnalysisState::new(PathBuf::from("/infra"));
        state.nodes.push(resource(
            "aws_instance.web",
            "resource \"aws_instance\" \"web\" {\n  depends_on = [aws_db_instance.main]\n}",
        ));
        state.nodes.push(resource(
            "aws_db_instance.main",
            "resource \"aws_db_instance\" \"main\" {}",
        ));

        link_terraform(&mut state);
        assert_eq!(
            state.edges,
            vec![Edge::new(
                "tf-aws_instance.web",
                "tf-aws_db_instance.main",
                EdgeType::References
            )]
        );
    }

    #[test]
    fn test_inline_reference() {
        let mut state = AnalysisState::new(PathBuf::from("/infra"));
        state.nodes.push(resource(
            "aws_instance.web",
            "resource \"aws_instance\" \"web\" {\n  subnet_id = aws_subnet.main.id\n}",
        ));
        state.nodes.push(resource(
            "aws_subnet.main",
            "resource \"aws_subnet\" \"main\" {}",
        ));

        link_terraform(&mut state);
        assert_eq!(state.edges.len(), 1);
        assert_eq!(state.edges[0].target_id, "tf-aws_subnet.main");
    }

    #[test]
    fn test_module_source_rewritten_to_file_node() {
        let mut state = AnalysisState::new(PathBuf::from("/infra"));
        let module = Node {
            id: "tf-module-mod".to_string(),
            node_type: NodeType::Component,
            label: "module:mod".to_string(),
            file_path: "/infra/main.tf".to_string(),
            language: "Terraform".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Terraform".to_string()),
                resource_name: Some("mod".to_string()),
                ..NodeMetadata::default()
            },
        };
        let target = Node::file("/infra/modules/mod/main.tf", "Terraform");
        let target_id = target.id.clone();
        state.edges.push(Edge::new(
            "tf-module-mod",
            "./modules/mod",
            EdgeType::References,
        ));
        state.nodes.extend([module, target]);

        link_terraform(&mut state);
        assert_eq!(state.edges[0].target_id, target_id);
    }

    #[test]
    fn test_unresolvable_module_source_stays_raw() {
        let mut state = AnalysisState::new(PathBuf::from("/infra"));
        let module = Node {
            id: "tf-module-mod".to_string(),
            node_type: NodeType::Component,
            label: "module:mod".to_string(),
            file_path: "/infra/main.tf".to_string(),
            language: "Terraform".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Terraform".to_string()),
                ..NodeMetadata::default()
            },
        };
        state.edges.push(Edge::new(
            "tf-module-mod",
            "./modules/mod",
            EdgeType::References,
        ));
        state.nodes.push(module);

        link_terraform(&mut state);
        assert_eq!(state.edges[0].target_id, "./modules/mod");
    }
}
