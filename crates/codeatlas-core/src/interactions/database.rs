//! Database and ORM lineage.
//!
//! Raw SQL verbs in Function snippets link to the single synthetic
//! `db:generic` Database node. ORM heuristics (Prisma, Sequelize,
//! SQLAlchemy) create `table:<name>` synthetic nodes and READS_FROM /
//! WRITES_TO / REFERENCES edges. Any pre-existing edge targeting a
//! `table:<name>` pseudo-id (SQL REFERENCES clauses) gets its table node
//! materialized here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::interactions::AnalysisState;
use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType};

static SQL_VERB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bSELECT\b|\bINSERT INTO\b|\bUPDATE\s+\w+\s+SET\b|\bDELETE FROM\b").unwrap()
});

static PRISMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"prisma\.(\w+)\.(\w+)\(").unwrap());

static SEQUELIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bdefine\(\s*['"](\w+)['"]"#).unwrap());

static SQLALCHEMY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"__tablename__\s*=\s*['"](\w+)['"]"#).unwrap());

const PRISMA_WRITES: &[&str] = &[
    "create",
    "createMany",
    "update",
    "updateMany",
    "upsert",
    "delete",
    "deleteMany",
];

/// Raw SQL access from function bodies.
pub fn db_lineage(state: &mut AnalysisState) {
    let sources: Vec<String> = state
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Function)
        .filter(|n| {
            n.code_snippet
                .as_deref()
                .is_some_and(|s| SQL_VERB_RE.is_match(s))
        })
        .map(|n| n.id.clone())
        .collect();

    if sources.is_empty() {
        return;
    }

    let db_id = state.add_node_once(database_node());
    for source in sources {
        state.add_edge_once(Edge::new(source, &db_id, EdgeType::DbQuery));
    }
}

/// ORM heuristics over every node snippet.
pub fn orm_lineage(state: &mut AnalysisState) {
    // (source node id, table, edge type) and plain table creations.
    let mut accesses: Vec<(String, String, EdgeType)> = Vec::new();
    let mut tables: Vec<String> = Vec::new();

    for node in &state.nodes {
        let Some(snippet) = node.code_snippet.as_deref() else {
            continue;
        };
        for caps in PRISMA_RE.captures_iter(snippet) {
            let table = caps[1].to_string();
            let op = &caps[2];
            let edge_type = if op.starts_with("find")
                || matches!(op, "aggregate" | "count" | "groupBy")
            {
                EdgeType::ReadsFrom
            } else if PRISMA_WRITES.contains(&op) {
                EdgeType::WritesTo
            } else {
                EdgeType::References
            };
            accesses.push((node.id.clone(), table, edge_type));
        }
        for caps in SEQUELIZE_RE.captures_iter(snippet) {
            tables.push(caps[1].to_string());
        }
        for caps in SQLALCHEMY_RE.captures_iter(snippet) {
            tables.push(caps[1].to_string());
        }
    }

    for table in tables {
        state.add_node_once(table_node(&table));
    }
    for (source, table, edge_type) in accesses {
        let table_id = state.add_node_once(table_node(&table));
        state.add_edge_once(Edge::new(source, table_id, edge_type));
    }

    materialize_referenced_tables(state);
}

/// Tables referenced by pseudo-id before any ORM created them (SQL
/// `REFERENCES <table>` edges).
fn materialize_referenced_tables(state: &mut AnalysisState) {
    let referenced: Vec<String> = state
        .edges
        .iter()
        .filter_map(|e| e.target_id.strip_prefix("table:"))
        .map(|t| t.to_string())
        .collect();
    for table in referenced {
        state.add_node_once(table_node(&table));
    }
}

fn database_node() -> Node {
    Node::synthetic("db:generic", NodeType::Component, "Database").with_metadata(
        NodeMetadata::default().with_extra("kind", "database"),
    )
}

fn table_node(table: &str) -> Node {
    Node::synthetic(
        format!("table:{}", table),
        NodeType::Component,
        format!("table:{}", table),
    )
    .with_metadata(NodeMetadata::default().with_extra("kind", "table"))
}
