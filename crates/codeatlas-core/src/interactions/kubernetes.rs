//! Kubernetes linkage.
//!
//! Services reference the Deployments/Pods whose labels are a superset of
//! the service selector (every selector entry present with an equal value).
//! Deployment container images become `image:<ref>` Component nodes,
//! created once per reference.

use tracing::debug;

use crate::interactions::AnalysisState;
use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType};

pub fn link_kubernetes(state: &mut AnalysisState) {
    let kubernetes = |n: &Node| n.metadata.platform.as_deref() == Some("Kubernetes");

    // Service -> workload selector matches.
    let mut selector_edges = Vec::new();
    for service in state.nodes.iter().filter(|n| {
        kubernetes(n) && n.metadata.resource_kind.as_deref() == Some("Service")
    }) {
        let Some(selector) = service.metadata.selector.as_ref().filter(|s| !s.is_empty())
        else {
            continue;
        };
        for workload in state.nodes.iter().filter(|n| {
            kubernetes(n)
                && matches!(
                    n.metadata.resource_kind.as_deref(),
                    Some("Deployment") | Some("Pod")
                )
        }) {
            let Some(labels) = workload.metadata.labels.as_ref() else {
                continue;
            };
            let matches = selector
                .iter()
                .all(|(k, v)| labels.get(k).is_some_and(|label| label == v));
            if matches {
                selector_edges.push(Edge::new(&service.id, &workload.id, EdgeType::References));
            }
        }
    }

    // Deployment -> container image references.
    let mut image_refs: Vec<(String, String)> = Vec::new();
    for deployment in state.nodes.iter().filter(|n| {
        kubernetes(n) && n.metadata.resource_kind.as_deref() == Some("Deployment")
    }) {
        for image in deployment.metadata.images.iter().flatten() {
            image_refs.push((deployment.id.clone(), image.clone()));
        }
    }

    debug!(
        "kubernetes linkage: {} selector edges, {} image refs",
        selector_edges.len(),
        image_refs.len()
    );

    for edge in selector_edges {
        state.add_edge_once(edge);
    }
    for (deployment_id, image) in image_refs {
        let image_id = state.add_node_once(image_node(&image));
        state.add_edge_once(Edge::new(deployment_id, image_id, EdgeType::References));
    }
}

fn image_node(image: &str) -> Node {
    Node::synthetic(
        format!("image:{}", image),
        NodeType::Component,
        image.to_string(),
    )
    .with_metadata(NodeMetadata::default().with_extra("kind", "container-image"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn k8s_node(kind: &str, name: &str) -> Node {
        let label = format!("{}/{}", kind, name);
        Node {
            id: crate::map::node_id("k8s", &label, "/infra/stack.yaml", Some(0)),
            node_type: NodeType::Component,
            label,
            file_path: "/infra/stack.yaml".to_string(),
            language: "YAML".to_string(),
            code_snippet: None,
            metadata: NodeMetadata {
                platform: Some("Kubernetes".to_string()),
                resource_kind: Some(kind.to_string()),
                resource_name: Some(name.to_string()),
                ..NodeMetadata::default()
            },
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_selector_superset_match() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let mut service = k8s_node("Service", "web-svc");
        service.metadata.selector = Some(labels(&[("app", "web")]));
        let mut deployment = k8s_node("Deployment", "web");
        deployment.metadata.labels = Some(labels(&[("app", "web"), ("tier", "front")]));
        let (service_id, deployment_id) = (service.id.clone(), deployment.id.clone());
        state.nodes.extend([service, deployment]);

        link_kubernetes(&mut state);
        assert_eq!(
            state.edges,
            vec![Edge::new(service_id, deployment_id, EdgeType::References)]
        );
    }

    #[test]
    fn test_empty_selector_produces_no_edges() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let mut service = k8s_node("Service", "svc");
        service.metadata.selector = Some(BTreeMap::new());
        let mut deployment = k8s_node("Deployment", "web");
        deployment.metadata.labels = Some(labels(&[("app", "web")]));
        state.nodes.extend([service, deployment]);

        link_kubernetes(&mut state);
        assert!(state.edges.is_empty());
    }

    #[test]
    fn test_selector_value_mismatch() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let mut service = k8s_node("Service", "svc");
        service.metadata.selector = Some(labels(&[("app", "api")]));
        let mut deployment = k8s_node("Deployment", "web");
        deployment.metadata.labels = Some(labels(&[("app", "web")]));
        state.nodes.extend([service, deployment]);

        link_kubernetes(&mut state);
        assert!(state.edges.is_empty());
    }

    #[test]
    fn test_images_created_once() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let mut deploy_a = k8s_node("Deployment", "a");
        deploy_a.metadata.images = Some(vec!["registry/web:1.0".to_string()]);
        let mut deploy_b = k8s_node("Deployment", "b");
        deploy_b.metadata.images = Some(vec!["registry/web:1.0".to_string()]);
        state.nodes.extend([deploy_a, deploy_b]);

        link_kubernetes(&mut state);
        assert_eq!(
            state
                .nodes
                .iter()
                .filter(|n| n.id == "image:registry/web:1.0")
                .count(),
            1
        );
        assert_eq!(state.edges.len(), 2);
    }
}
