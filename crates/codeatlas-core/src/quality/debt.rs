//! Technical-debt markers.
//!
//! Scope: nodes whose path or label mentions `Service`. Line-by-line scan
//! of snippets for TODO / FIXME / hack / temporary-removal markers; a match
//! counts only when it appears after a comment introducer with no string
//! delimiter open before the match column.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Issue, Node, TechnicalDebtStats};
use crate::quality::in_scope;
use crate::textscan::in_string_before;

const COMMENT_INTRODUCERS: &[&str] = &["//", "#", "/*", "*", "--"];

static HACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(hacky|hack|kludge|workaround)\b").unwrap());

static TEMP_REMOVAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)temporarily removed|temp removed|temporary removal").unwrap()
});

pub fn detect(nodes: &[Node]) -> TechnicalDebtStats {
    let mut stats = TechnicalDebtStats::default();
    let mut seen: HashSet<(String, String, usize)> = HashSet::new();

    for node in nodes {
        if !in_scope(node, &["Service"]) {
            continue;
        }
        let Some(snippet) = node.code_snippet.as_deref() else {
            continue;
        };

        for (line_no, line) in snippet.lines().enumerate() {
            let Some(marker) = classify(line) else {
                continue;
            };
            if !seen.insert((node.file_path.clone(), node.label.clone(), line_no)) {
                continue;
            }
            match marker {
                Marker::Todo => stats.todos += 1,
                Marker::Fixme => stats.fixmes += 1,
                Marker::Hack => stats.hacks += 1,
                Marker::TemporaryRemoval => stats.temporary_removals += 1,
            }
            stats.push(Issue {
                file_path: node.file_path.clone(),
                function_name: Some(node.label.clone()),
                line: Some(line_no + 1),
                issue_type: Some(marker.as_str().to_string()),
                detail: Some(line.trim().to_string()),
            });
        }
    }
    stats
}

#[derive(Debug, Clone, Copy)]
enum Marker {
    Todo,
    Fixme,
    Hack,
    TemporaryRemoval,
}

impl Marker {
    fn as_str(&self) -> &'static str {
        match self {
            Marker::Todo => "todo",
            Marker::Fixme => "fixme",
            Marker::Hack => "hack",
            Marker::TemporaryRemoval => "temporary-removal",
        }
    }
}

/// Classify a line, honoring comment position and string exclusion.
fn classify(line: &str) -> Option<Marker> {
    let comment_col = COMMENT_INTRODUCERS
        .iter()
        .filter_map(|intro| {
            if *intro == "*" {
                // Continuation lines of block comments start with `*`.
                let trimmed = line.trim_start();
                if trimmed.starts_with('*') && !trimmed.starts_with("*/") {
                    return Some(line.len() - trimmed.len());
                }
                None
            } else {
                line.find(intro)
            }
        })
        .min()?;

    if in_string_before(line, comment_col) {
        return None;
    }
    let comment = &line[comment_col..];

    if let Some(idx) = comment.find("TODO") {
        if !in_string_before(line, comment_col + idx) {
            return Some(Marker::Todo);
        }
    }
    if comment.contains("FIXME") {
        return Some(Marker::Fixme);
    }
    if TEMP_REMOVAL_RE.is_match(comment) {
        return Some(Marker::TemporaryRemoval);
    }
    if HACK_RE.is_match(comment) {
        return Some(Marker::Hack);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::NodeType;

    fn service_fn(snippet: &str) -> Vec<Node> {
        vec![Node::new(
            "function",
            "Load",
            NodeType::Function,
            "Load",
            "/app/UserService.cs",
            "CSharp",
        )
        .with_snippet(snippet)]
    }

    #[test]
    fn test_todo_and_fixme_counted() {
        let stats = detect(&service_fn(
            "// TODO: paginate\nvar x = 1;\n// FIXME: races\n",
        ));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.todos, 1);
        assert_eq!(stats.fixmes, 1);
    }

    #[test]
    fn test_todo_inside_string_ignored() {
        let stats = detect(&service_fn("var s = \"TODO: not real\";\n"));
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn test_todo_without_comment_ignored() {
        let stats = detect(&service_fn("var TODO = 1;\n"));
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn test_hack_and_temporary_removal() {
        let stats = detect(&service_fn(
            "# hacky workaround for locale\n// temporarily removed until v2\n",
        ));
        assert_eq!(stats.hacks, 1);
        assert_eq!(stats.temporary_removals, 1);
    }

    #[test]
    fn test_out_of_scope_file_ignored() {
        let nodes = vec![Node::new(
            "function",
            "load",
            NodeType::Function,
            "load",
            "/app/util.cs",
            "CSharp",
        )
        .with_snippet("// TODO: thing\n")];
        assert_eq!(detect(&nodes).count, 0);
    }
}
