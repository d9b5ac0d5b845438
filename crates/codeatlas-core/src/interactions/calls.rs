//! Call-site linkage.
//!
//! Matches merged call sites against the exports map: first the caller's own
//! file, then files it imports (resolved IMPORTS edges only). First match
//! wins and emits a CALLS edge. Unmatched call sites are dropped.

use tracing::debug;

use crate::interactions::{imported_files, AnalysisState};
use crate::map::{Edge, EdgeType};

pub fn link_calls(state: &mut AnalysisState) {
    let imports = imported_files(&state.edges, &state.nodes);

    let mut new_edges = Vec::new();
    for call in &state.calls {
        let target = state
            .exports
            .get(&call.caller_file)
            .and_then(|exports| exports.get(&call.raw))
            .or_else(|| {
                imports
                    .get(&call.caller_file)
                    .into_iter()
                    .flatten()
                    .find_map(|imported| {
                        state
                            .exports
                            .get(imported)
                            .and_then(|exports| exports.get(&call.raw))
                    })
            });
        if let Some(target_id) = target {
            if *target_id != call.caller_id {
                new_edges.push(Edge::new(&call.caller_id, target_id, EdgeType::Calls));
            }
        }
    }

    debug!("linked {} call edges", new_edges.len());
    for edge in new_edges {
        state.add_edge_once(edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CallSite, Node, NodeType};
    use std::path::PathBuf;

    #[test]
    fn test_same_file_call_links() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let caller = Node::new(
            "function",
            "load",
            NodeType::Function,
            "load",
            "/repo/a.ts",
            "TypeScript",
        );
        let callee = Node::new(
            "function",
            "fetchUsers",
            NodeType::Function,
            "fetchUsers",
            "/repo/a.ts",
            "TypeScript",
        );
        state
            .exports
            .entry("/repo/a.ts".to_string())
            .or_default()
            .insert("fetchUsers".to_string(), callee.id.clone());
        state.calls.push(CallSite {
            caller_id: caller.id.clone(),
            raw: "fetchUsers".to_string(),
            qualifier: None,
            caller_file: "/repo/a.ts".to_string(),
        });
        let (caller_id, callee_id) = (caller.id.clone(), callee.id.clone());
        state.nodes.extend([caller, callee]);

        link_calls(&mut state);
        assert_eq!(
            state.edges,
            vec![Edge::new(caller_id, callee_id, EdgeType::Calls)]
        );
    }

    #[test]
    fn test_cross_file_call_requires_resolved_import() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let file_a = Node::file("/repo/a.ts", "TypeScript");
        let file_b = Node::file("/repo/b.ts", "TypeScript");
        let callee = Node::new(
            "function",
            "helper",
            NodeType::Function,
            "helper",
            "/repo/b.ts",
            "TypeScript",
        );
        state
            .exports
            .entry("/repo/b.ts".to_string())
            .or_default()
            .insert("helper".to_string(), callee.id.clone());
        state.calls.push(CallSite {
            caller_id: file_a.id.clone(),
            raw: "helper".to_string(),
            qualifier: None,
            caller_file: "/repo/a.ts".to_string(),
        });
        // Resolved import edge a -> b.
        state
            .edges
            .push(Edge::new(&file_a.id, &file_b.id, EdgeType::Imports));
        let callee_id = callee.id.clone();
        state.nodes.extend([file_a, file_b, callee]);

        link_calls(&mut state);
        assert!(state
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::Calls && e.target_id == callee_id));
    }

    #[test]
    fn test_unmatched_call_site_is_dropped() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        state.calls.push(CallSite {
            caller_id: "x".to_string(),
            raw: "nothing".to_string(),
            qualifier: None,
            caller_file: "/repo/a.ts".to_string(),
        });
        link_calls(&mut state);
        assert!(state.edges.is_empty());
    }
}
