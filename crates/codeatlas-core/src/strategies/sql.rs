//! SQL extraction (text-driven).
//!
//! CREATE TABLE / INDEX / FUNCTION / TRIGGER statements become Component
//! nodes; the dialect is inferred from keyword fingerprints and recorded on
//! the File node; `REFERENCES <table>` clauses emit edges to the shared
//! `table:<name>` synthetic nodes materialized by the lineage pass.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};

static CREATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?im)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:UNIQUE\s+)?(TABLE|INDEX|FUNCTION|TRIGGER)\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"\[]?([\w.]+)[`"\]]?"#,
    )
    .unwrap()
});

static REFERENCES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bREFERENCES\s+[`"\[]?(\w+)[`"\]]?"#).unwrap());

/// Dialect fingerprints, checked in order; first hit wins.
static DIALECTS: &[(&str, &[&str])] = &[
    ("MySQL", &["AUTO_INCREMENT", "ENGINE=", "UNSIGNED"]),
    ("PostgreSQL", &["SERIAL", "JSONB", "ILIKE", "BIGSERIAL"]),
    ("SQL Server", &["NVARCHAR", "IDENTITY(", "\nGO"]),
    ("SQLite", &["AUTOINCREMENT", "WITHOUT ROWID"]),
    ("Oracle", &["VARCHAR2", "NUMBER(", "NVL("]),
];

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let file_id = out.file_id().to_string();

    let dialect = infer_dialect(ctx.source);
    out.nodes[0].metadata.dialect = Some(dialect.to_string());

    for caps in CREATE_RE.captures_iter(ctx.source) {
        let object_type = caps.get(1).unwrap().as_str().to_lowercase();
        let name = caps.get(2).unwrap().as_str();
        out.nodes.push(Node {
            id: node_id("sql", &format!("{}:{}", object_type, name), ctx.file_path, None),
            node_type: NodeType::Component,
            label: name.to_string(),
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: Some(statement_text(ctx.source, caps.get(0).unwrap().start())),
            metadata: NodeMetadata::default()
                .with_extra("objectType", object_type)
                .with_extra("dialect", dialect),
        });
    }

    for caps in REFERENCES_RE.captures_iter(ctx.source) {
        let table = caps.get(1).unwrap().as_str().to_lowercase();
        out.edges.push(Edge::new(
            &file_id,
            format!("table:{}", table),
            EdgeType::References,
        ));
    }

    out
}

fn infer_dialect(source: &str) -> &'static str {
    let upper = source.to_uppercase();
    for (dialect, markers) in DIALECTS {
        if markers.iter().any(|m| upper.contains(m)) {
            return dialect;
        }
    }
    "Generic"
}

/// Statement text through the terminating semicolon (or end of file).
fn statement_text(source: &str, start: usize) -> String {
    match source[start..].find(';') {
        Some(end) => source[start..start + end + 1].to_string(),
        None => source[start..].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Language;

    fn run(source: &str) -> StrategyOutput {
        let ctx = StrategyContext {
            file_path: "/db/schema.sql",
            source,
            language: Language::Sql,
            tree: None,
        };
        analyze(&ctx)
    }

    #[test]
    fn test_create_statements() {
        let out = run(
            "CREATE TABLE users (id SERIAL PRIMARY KEY);\nCREATE INDEX idx_users ON users(id);\nCREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$ $$;\n",
        );
        let labels: Vec<&str> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Component)
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(labels, vec!["users", "idx_users", "touch"]);
    }

    #[test]
    fn test_dialect_inference() {
        let pg = run("CREATE TABLE t (id SERIAL);");
        assert_eq!(pg.nodes[0].metadata.dialect.as_deref(), Some("PostgreSQL"));

        let mysql = run("CREATE TABLE t (id INT AUTO_INCREMENT);");
        assert_eq!(mysql.nodes[0].metadata.dialect.as_deref(), Some("MySQL"));

        let generic = run("CREATE TABLE t (id INT);");
        assert_eq!(generic.nodes[0].metadata.dialect.as_deref(), Some("Generic"));
    }

    #[test]
    fn test_references_edges_target_synthetic_tables() {
        let out = run(
            "CREATE TABLE orders (id INT, user_id INT REFERENCES Users(id));",
        );
        let edge = out
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::References)
            .unwrap();
        assert_eq!(edge.target_id, "table:users");
    }
}
