//! Helm and Kustomize linkage.
//!
//! Helm charts reference every template document sharing their chart root
//! plus every `values.yaml` File node. Kustomize nodes resolve their
//! `resources:` entries against neighbour files, preferring a Component
//! node in the resolved file (Deployment kind first), then the File node,
//! then a basename match against any YAML file.

use tracing::debug;

use crate::interactions::{normalize_join, parent_dir, AnalysisState};
use crate::map::{Edge, EdgeType, Node, NodeType};

pub fn link_helm(state: &mut AnalysisState) {
    let charts: Vec<(String, String)> = state
        .nodes
        .iter()
        .filter(|n| {
            n.metadata.platform.as_deref() == Some("Helm")
                && n.file_path.ends_with("/Chart.yaml")
        })
        .filter_map(|n| {
            n.metadata
                .chart_root
                .clone()
                .map(|root| (n.id.clone(), root))
        })
        .collect();

    let mut new_edges = Vec::new();
    for (chart_id, chart_root) in &charts {
        for node in &state.nodes {
            if node.id == *chart_id {
                continue;
            }
            let is_template = node.node_type == NodeType::Component
                && node.metadata.chart_root.as_deref() == Some(chart_root.as_str());
            let is_values = node.node_type == NodeType::File && node.label == "values.yaml";
            if is_template || is_values {
                new_edges.push(Edge::new(chart_id, &node.id, EdgeType::References));
            }
        }
    }

    debug!("helm linkage: {} edges", new_edges.len());
    for edge in new_edges {
        state.add_edge_once(edge);
    }
}

pub fn link_kustomize(state: &mut AnalysisState) {
    let kustomizations: Vec<(String, String, Vec<String>)> = state
        .nodes
        .iter()
        .filter(|n| n.metadata.platform.as_deref() == Some("Kustomize"))
        .filter_map(|n| {
            n.metadata.resources.clone().map(|resources| {
                (
                    n.id.clone(),
                    parent_dir(&n.file_path).to_string(),
                    resources,
                )
            })
        })
        .collect();

    let mut new_edges = Vec::new();
    for (kustomize_id, dir, resources) in &kustomizations {
        for resource in resources {
            if let Some(target) = resolve_resource(state, dir, resource) {
                new_edges.push(Edge::new(kustomize_id, target, EdgeType::References));
            }
        }
    }

    debug!("kustomize linkage: {} edges", new_edges.len());
    for edge in new_edges {
        state.add_edge_once(edge);
    }
}

/// Resolve one `resources:` entry to a node id.
fn resolve_resource(state: &AnalysisState, dir: &str, resource: &str) -> Option<String> {
    let candidates = [
        resource.to_string(),
        format!("{}.yaml", resource),
        format!("{}.yml", resource),
    ];

    for candidate in &candidates {
        let path = normalize_join(dir, candidate);
        if let Some(id) = best_node_in_file(state, &path) {
            return Some(id);
        }
    }

    // Fall back to a basename match against any YAML file.
    let basename = resource.rsplit('/').next().unwrap_or(resource);
    let with_exts = [
        basename.to_string(),
        format!("{}.yaml", basename),
        format!("{}.yml", basename),
    ];
    state
        .nodes
        .iter()
        .find(|n| {
            n.node_type == NodeType::File
                && n.language == "YAML"
                && with_exts
                    .iter()
                    .any(|name| n.file_path.ends_with(&format!("/{}", name)))
        })
        .map(|n| n.id.clone())
}

/// Prefer a Deployment Component, then any Component, then the File node.
fn best_node_in_file(state: &AnalysisState, path: &str) -> Option<String> {
    let in_file: Vec<&Node> = state
        .nodes
        .iter()
        .filter(|n| n.file_path == path)
        .collect();
    if in_file.is_empty() {
        return None;
    }
    in_file
        .iter()
        .find(|n| {
            n.node_type == NodeType::Component
                && n.metadata.resource_kind.as_deref() == Some("Deployment")
        })
        .or_else(|| {
            in_file
                .iter()
                .find(|n| n.node_type == NodeType::Component)
        })
        .or_else(|| in_file.iter().find(|n| n.node_type == NodeType::File))
        .map(|n| n.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::NodeMetadata;
    use std::path::PathBuf;

    #[test]
    fn test_kustomize_prefers_deployment_component() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));

        let file = Node::file("/repo/k8s/deployment.yaml", "YAML");
        let deployment = Node {
            id: "deploy-node".to_string(),
            node_type: NodeType::Component,
            label: "Deployment/web".to_string(),
            file_path: "/repo/k8s/deployment.yaml".to_string(),
            language: "YAML".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Kubernetes".to_string()),
                resource_kind: Some("Deployment".to_string()),
                ..NodeMetadata::default()
            },
        };
        let kustomize = Node {
            id: "kustomize-node".to_string(),
            node_type: NodeType::Component,
            label: "kustomization".to_string(),
            file_path: "/repo/k/kustomization.yaml".to_string(),
            language: "YAML".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Kustomize".to_string()),
                resources: Some(vec!["../k8s/deployment.yaml".to_string()]),
                ..NodeMetadata::default()
            },
        };
        state.nodes.extend([file, deployment, kustomize]);

        link_kustomize(&mut state);
        assert_eq!(
            state.edges,
            vec![Edge::new("kustomize-node", "deploy-node", EdgeType::References)]
        );
    }

    #[test]
    fn test_kustomize_extension_probing() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let file = Node::file("/repo/k/service.yaml", "YAML");
        let file_id = file.id.clone();
        let kustomize = Node {
            id: "kustomize-node".to_string(),
            node_type: NodeType::Component,
            label: "kustomization".to_string(),
            file_path: "/repo/k/kustomization.yaml".to_string(),
            language: "YAML".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Kustomize".to_string()),
                resources: Some(vec!["service".to_string()]),
                ..NodeMetadata::default()
            },
        };
        state.nodes.extend([file, kustomize]);

        link_kustomize(&mut state);
        assert_eq!(state.edges[0].target_id, file_id);
    }

    #[test]
    fn test_chart_references_templates_and_values() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let chart = Node {
            id: "chart-node".to_string(),
            node_type: NodeType::Component,
            label: "web".to_string(),
            file_path: "/repo/charts/web/Chart.yaml".to_string(),
            language: "YAML".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Helm".to_string()),
                chart_root: Some("/repo/charts/web".to_string()),
                ..NodeMetadata::default()
            },
        };
        let template = Node {
            id: "template-node".to_string(),
            node_type: NodeType::Component,
            label: "deploy.yaml".to_string(),
            file_path: "/repo/charts/web/templates/deploy.yaml".to_string(),
            language: "YAML".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Helm".to_string()),
                chart_root: Some("/repo/charts/web".to_string()),
                ..NodeMetadata::default()
            },
        };
        let values = Node::file("/repo/charts/web/values.yaml", "YAML");
        let values_id = values.id.clone();
        state.nodes.extend([chart, template, values]);

        link_helm(&mut state);
        let targets: Vec<&str> = state.edges.iter().map(|e| e.target_id.as_str()).collect();
        assert!(targets.contains(&"template-node"));
        assert!(targets.contains(&values_id.as_str()));
    }
}
