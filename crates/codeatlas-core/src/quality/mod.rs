//! Code Quality Analyzer
//!
//! Derives the fixed-shape [`Statistics`] record from the finalized map:
//! structural metrics over extracted function snippets plus graph-based
//! dead-code detection over the edge set. Read-only; runs after linkage.

use tracing::debug;

use crate::map::{Edge, Node, Statistics};

mod anomalies;
mod blocking;
mod dead_code;
mod debt;
mod loops;
mod repeated;
mod smells;

pub use loops::find_loops;

/// Compute every statistics bucket.
pub fn analyze(nodes: &[Node], edges: &[Edge]) -> Statistics {
    let statistics = Statistics {
        db_queries_in_loops: loops::db_queries_in_loops(nodes),
        n_plus_one_queries: loops::n_plus_one_queries(nodes),
        dead_code: dead_code::detect(nodes, edges),
        technical_debt: debt::detect(nodes),
        code_smells: smells::detect(nodes),
        repeated_code: repeated::detect(nodes),
        anomalies: anomalies::detect(nodes),
        blocking_async: blocking::detect(nodes),
    };
    debug!(
        "quality: {} db-in-loop, {} n+1, {} dead, {} debt, {} smells, {} repeated, {} anomalies, {} blocking",
        statistics.db_queries_in_loops.count,
        statistics.n_plus_one_queries.count,
        statistics.dead_code.count,
        statistics.technical_debt.count,
        statistics.code_smells.count,
        statistics.repeated_code.count,
        statistics.anomalies.count,
        statistics.blocking_async.count,
    );
    statistics
}

/// Path or label mentions any of the needles (exact case).
pub(crate) fn in_scope(node: &Node, needles: &[&str]) -> bool {
    needles
        .iter()
        .any(|needle| node.file_path.contains(needle) || node.label.contains(needle))
}

/// Test fixtures are excluded from the async-blocking scan.
pub(crate) fn is_test_artifact(node: &Node) -> bool {
    let path = node.file_path.to_lowercase();
    ["test", "spec", "mock", "stub"]
        .iter()
        .any(|needle| path.contains(needle))
}
