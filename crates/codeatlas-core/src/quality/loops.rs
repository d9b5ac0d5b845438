//! Loop-based query metrics: database access inside loop bodies and N+1
//! query shapes.
//!
//! Loop bodies are located with the string-literal-aware brace scanner;
//! each finding counts once per `(filePath, label, loopStart)`.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Issue, Node, NodeType, StatBucket};
use crate::textscan::{line_of_offset, matching_brace, next_open_brace};

static LOOP_OPENER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfor\s*\(|\bwhile\s*\(|\bforeach\s*\(").unwrap());

static FOREACH_METHOD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.forEach\(").unwrap());

/// Database access patterns checked inside loop bodies.
const DB_PATTERNS: &[&str] = &[
    "SELECT",
    "INSERT INTO",
    "DELETE FROM",
    "prisma.",
    "_context.",
    "DB::",
    "Cache::",
    ".SaveChanges",
    "session.query",
    ".Find(",
    ".FindAsync(",
    ".First(",
    ".FirstOrDefault(",
    ".Single(",
    ".Where(",
    ".ToList(",
    ".query(",
    "findOne(",
    "findMany(",
];

/// Lookup operations that flag a loop as a potential N+1 shape.
const FIND_PATTERNS: &[&str] = &[
    ".Find(",
    ".FindAsync(",
    ".Where(",
    ".First(",
    ".FirstOrDefault(",
    ".Single(",
    ".select(",
    ".find(",
    "findOne(",
    "findMany(",
];

/// Eager-loading markers that clear the N+1 flag.
const EAGER_MARKERS: &[&str] = &[
    ".Include",
    ".ThenInclude",
    ".With",
    ".Join",
    "eager",
    "preload",
    ".Load",
];

/// A loop body located inside a snippet.
pub struct LoopSpan {
    /// Byte offset of the opener within the snippet
    pub start: usize,
    /// Body text between the matched braces
    pub body: String,
}

/// Locate loop bodies in a snippet. `include_foreach_method` adds
/// `.forEach(` callbacks to the opener set (the N+1 scan uses it).
pub fn find_loops(snippet: &str, include_foreach_method: bool) -> Vec<LoopSpan> {
    let mut openers: Vec<usize> = LOOP_OPENER_RE
        .find_iter(snippet)
        .map(|m| m.start())
        .collect();
    if include_foreach_method {
        openers.extend(FOREACH_METHOD_RE.find_iter(snippet).map(|m| m.start()));
    }
    openers.sort_unstable();

    let mut spans = Vec::new();
    for start in openers {
        let Some(open) = next_open_brace(snippet, start) else {
            continue;
        };
        let Some(close) = matching_brace(snippet, open) else {
            continue;
        };
        spans.push(LoopSpan {
            start,
            body: snippet[open + 1..close].to_string(),
        });
    }
    spans
}

pub fn db_queries_in_loops(nodes: &[Node]) -> StatBucket {
    let mut bucket = StatBucket::default();
    let mut seen: HashSet<(String, String, usize)> = HashSet::new();

    for node in callable_nodes(nodes) {
        let snippet = node.code_snippet.as_deref().unwrap_or_default();
        for span in find_loops(snippet, false) {
            if !DB_PATTERNS.iter().any(|p| span.body.contains(p)) {
                continue;
            }
            if seen.insert((node.file_path.clone(), node.label.clone(), span.start)) {
                bucket.push(Issue {
                    file_path: node.file_path.clone(),
                    function_name: Some(node.label.clone()),
                    line: Some(line_of_offset(snippet, span.start)),
                    issue_type: Some("db-query-in-loop".to_string()),
                    detail: None,
                });
            }
        }
    }
    bucket
}

pub fn n_plus_one_queries(nodes: &[Node]) -> StatBucket {
    let mut bucket = StatBucket::default();
    let mut seen: HashSet<(String, String, usize)> = HashSet::new();

    for node in callable_nodes(nodes) {
        let snippet = node.code_snippet.as_deref().unwrap_or_default();
        for span in find_loops(snippet, true) {
            let has_lookup = FIND_PATTERNS.iter().any(|p| span.body.contains(p));
            let has_eager = EAGER_MARKERS.iter().any(|m| span.body.contains(m));
            if !has_lookup || has_eager {
                continue;
            }
            if seen.insert((node.file_path.clone(), node.label.clone(), span.start)) {
                bucket.push(Issue {
                    file_path: node.file_path.clone(),
                    function_name: Some(node.label.clone()),
                    line: Some(line_of_offset(snippet, span.start)),
                    issue_type: Some("n-plus-one".to_string()),
                    detail: None,
                });
            }
        }
    }
    bucket
}

fn callable_nodes(nodes: &[Node]) -> impl Iterator<Item = &Node> {
    nodes.iter().filter(|n| {
        matches!(n.node_type, NodeType::Function | NodeType::ApiRoute)
            && n.code_snippet.is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, snippet: &str) -> Node {
        Node::new(
            "function",
            name,
            NodeType::Function,
            name,
            "/app/LoadUsersService.cs",
            "CSharp",
        )
        .with_snippet(snippet)
    }

    #[test]
    fn test_db_query_in_loop_detected_once() {
        let nodes = vec![function(
            "load",
            "void load() { for(const u of us){ db.users.Find(u.id) } }",
        )];
        let bucket = db_queries_in_loops(&nodes);
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.issues[0].function_name.as_deref(), Some("load"));
    }

    #[test]
    fn test_n_plus_one_without_include() {
        let nodes = vec![function(
            "load",
            "void load() { for(const u of us){ db.users.Find(u.id) } }",
        )];
        let bucket = n_plus_one_queries(&nodes);
        assert_eq!(bucket.count, 1);
    }

    #[test]
    fn test_eager_loading_clears_n_plus_one() {
        let nodes = vec![function(
            "load",
            "void load() { for(var u in us){ _ctx.Users.Include(x => x.Posts).Where(x => x.Id == u) } }",
        )];
        assert_eq!(n_plus_one_queries(&nodes).count, 0);
        // The loop still counts as a query in a loop.
        assert_eq!(db_queries_in_loops(&nodes).count, 1);
    }

    #[test]
    fn test_foreach_method_counts_for_n_plus_one_only() {
        let nodes = vec![function(
            "load",
            "void load() { users.forEach(u => { repo.findOne(u.id) }) }",
        )];
        assert_eq!(n_plus_one_queries(&nodes).count, 1);
        assert_eq!(db_queries_in_loops(&nodes).count, 0);
    }

    #[test]
    fn test_loop_without_db_ignored() {
        let nodes = vec![function(
            "sum",
            "int sum() { for(int i = 0; i < 10; i++){ total += i; } }",
        )];
        assert_eq!(db_queries_in_loops(&nodes).count, 0);
        assert_eq!(n_plus_one_queries(&nodes).count, 0);
    }

    #[test]
    fn test_string_braces_do_not_break_balancing() {
        let nodes = vec![function(
            "load",
            "void load() { for(var u in us){ log(\"}\"); db.Users.Find(u) } }",
        )];
        assert_eq!(db_queries_in_loops(&nodes).count, 1);
    }
}
