//! Graph-based dead-code detection.
//!
//! Builds a directed graph over the finalized nodes/edges and reports:
//! controllers with no incoming API_CALL or CALLS edges, public
//! service/controller methods with no incoming CALLS edges, large
//! commented-out blocks, and backup-named files.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::map::{DeadCodeStats, Edge, EdgeType, Issue, Node, NodeType};
use crate::quality::in_scope;

/// Entry-point labels never reported as dead methods.
const ENTRY_LABELS: &[&str] = &["main", "index", "entry", "constructor", "init", "startup"];

const BACKUP_SUFFIXES: &[&str] = &[".bak", ".old", ".orig", "~"];

const COMMENTED_BLOCK_MIN_LINES: usize = 5;

pub fn detect(nodes: &[Node], edges: &[Edge]) -> DeadCodeStats {
    let mut stats = DeadCodeStats::default();

    // Incoming-edge queries over the id graph.
    let mut graph: DiGraph<&str, EdgeType> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
    for node in nodes {
        indices.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
    }
    for edge in edges {
        if let (Some(&source), Some(&target)) = (
            indices.get(edge.source_id.as_str()),
            indices.get(edge.target_id.as_str()),
        ) {
            graph.add_edge(source, target, edge.edge_type);
        }
    }

    let incoming = |id: &str, kinds: &[EdgeType]| -> usize {
        indices
            .get(id)
            .map(|&idx| {
                graph
                    .edges_directed(idx, Direction::Incoming)
                    .filter(|e| kinds.contains(e.weight()))
                    .count()
            })
            .unwrap_or(0)
    };

    // Controllers with no callers.
    for node in nodes {
        let is_controller = node.node_type == NodeType::ApiRoute
            || node.label.contains("Controller")
            || node
                .metadata
                .extra
                .get("role")
                .and_then(|v| v.as_str())
                .is_some_and(|r| r == "controller");
        if !is_controller {
            continue;
        }
        if incoming(&node.id, &[EdgeType::ApiCall, EdgeType::Calls]) == 0 {
            stats.controllers += 1;
            stats.push(Issue {
                file_path: node.file_path.clone(),
                function_name: Some(node.label.clone()),
                line: None,
                issue_type: Some("unreferenced-controller".to_string()),
                detail: None,
            });
        }
    }

    // Uncalled public methods in service/controller files.
    for node in nodes {
        if node.node_type != NodeType::Function
            || !in_scope(node, &["Service", "Controller"])
            || ENTRY_LABELS.contains(&node.label.as_str())
        {
            continue;
        }
        if incoming(&node.id, &[EdgeType::Calls]) == 0 {
            stats.methods += 1;
            stats.push(Issue {
                file_path: node.file_path.clone(),
                function_name: Some(node.label.clone()),
                line: None,
                issue_type: Some("uncalled-method".to_string()),
                detail: None,
            });
        }
    }

    // Large commented-out blocks in snippets.
    for node in nodes {
        let Some(snippet) = node.code_snippet.as_deref() else {
            continue;
        };
        let mut search = 0usize;
        while let Some(open) = snippet[search..].find("/*") {
            let start = search + open;
            let Some(close) = snippet[start..].find("*/") else {
                break;
            };
            let block = &snippet[start..start + close + 2];
            search = start + close + 2;
            if block.lines().count() > COMMENTED_BLOCK_MIN_LINES {
                stats.commented_blocks += 1;
                stats.push(Issue {
                    file_path: node.file_path.clone(),
                    function_name: Some(node.label.clone()),
                    line: None,
                    issue_type: Some("commented-block".to_string()),
                    detail: Some(format!("{} lines", block.lines().count())),
                });
            }
        }
    }

    // Backup-named files.
    for node in nodes.iter().filter(|n| n.node_type == NodeType::File) {
        let name = node.label.to_lowercase();
        let is_backup = BACKUP_SUFFIXES.iter().any(|s| name.ends_with(s))
            || name.contains("_backup")
            || name.contains("copy of");
        if is_backup {
            stats.backup_files += 1;
            stats.push(Issue {
                file_path: node.file_path.clone(),
                function_name: None,
                line: None,
                issue_type: Some("backup-file".to_string()),
                detail: None,
            });
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::NodeMetadata;

    fn route(label: &str) -> Node {
        Node {
            id: crate::map::node_id("route", label, "/app/server.js", Some(0)),
            node_type: NodeType::ApiRoute,
            label: label.to_string(),
            file_path: "/app/server.js".to_string(),
            language: "JavaScript".to_string(),
            code_snippet: None,
            metadata: NodeMetadata::route("Express", Some("get")),
        }
    }

    #[test]
    fn test_unreferenced_controller() {
        let nodes = vec![route("/api/users")];
        let stats = detect(&nodes, &[]);
        assert_eq!(stats.controllers, 1);
    }

    #[test]
    fn test_called_route_is_live() {
        let caller = Node::new(
            "function",
            "load",
            NodeType::Function,
            "load",
            "/app/client.ts",
            "TypeScript",
        );
        let target = route("/api/users");
        let edges = vec![Edge::new(&caller.id, &target.id, EdgeType::ApiCall)];
        let stats = detect(&[caller, target], &edges);
        assert_eq!(stats.controllers, 0);
    }

    #[test]
    fn test_uncalled_service_method() {
        let method = Node::new(
            "function",
            "Cleanup",
            NodeType::Function,
            "Cleanup",
            "/app/OrderService.cs",
            "CSharp",
        );
        let stats = detect(&[method], &[]);
        assert_eq!(stats.methods, 1);
    }

    #[test]
    fn test_entry_labels_excluded() {
        let main = Node::new(
            "function",
            "main",
            NodeType::Function,
            "main",
            "/app/Service.cs",
            "CSharp",
        );
        let stats = detect(&[main], &[]);
        assert_eq!(stats.methods, 0);
    }

    #[test]
    fn test_commented_block() {
        let node = Node::new(
            "function",
            "load",
            NodeType::Function,
            "load",
            "/app/a.ts",
            "TypeScript",
        )
        .with_snippet("/*\nold1\nold2\nold3\nold4\nold5\n*/\nreal();\n");
        let stats = detect(&[node], &[]);
        assert_eq!(stats.commented_blocks, 1);
    }

    #[test]
    fn test_backup_files() {
        let nodes = vec![
            Node::file("/app/server.js.bak", "JavaScript"),
            Node::file("/app/db_backup.sql", "SQL"),
        ];
        let stats = detect(&nodes, &[]);
        assert_eq!(stats.backup_files, 2);
    }
}
