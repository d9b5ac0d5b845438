//! GraphQL SDL linkage.
//!
//! Every `.graphql` / `.gql` file references the single synthetic
//! `graphql:schema` Component, created on first use.

use crate::interactions::AnalysisState;
use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType};

pub fn link_graphql(state: &mut AnalysisState) {
    let sdl_files: Vec<String> = state
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::File && n.language == "GraphQL")
        .map(|n| n.id.clone())
        .collect();

    if sdl_files.is_empty() {
        return;
    }

    let schema_id = state.add_node_once(
        Node::synthetic("graphql:schema", NodeType::Component, "GraphQL Schema")
            .with_metadata(NodeMetadata::default().with_extra("kind", "graphql-schema")),
    );
    for file_id in sdl_files {
        state.add_edge_once(Edge::new(file_id, &schema_id, EdgeType::References));
    }
}
