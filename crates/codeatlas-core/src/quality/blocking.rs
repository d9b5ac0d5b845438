//! Blocking-async detection.
//!
//! Scope: nodes whose path or label mentions `Service` or `Controller`,
//! excluding test fixtures. Patterns: `.Result` (not immediately followed
//! by an equality operator), `.Wait()`, and `.GetAwaiter().GetResult(`.
//! Deduped by `(filePath, label, method)`.

use std::collections::HashSet;

use crate::map::{Issue, Node, StatBucket};
use crate::quality::{in_scope, is_test_artifact};

pub fn detect(nodes: &[Node]) -> StatBucket {
    let mut bucket = StatBucket::default();
    let mut seen: HashSet<(String, String, &'static str)> = HashSet::new();

    for node in nodes {
        if !in_scope(node, &["Service", "Controller"]) || is_test_artifact(node) {
            continue;
        }
        let Some(snippet) = node.code_snippet.as_deref() else {
            continue;
        };

        let mut hit = |method: &'static str| {
            if seen.insert((node.file_path.clone(), node.label.clone(), method)) {
                bucket.push(Issue {
                    file_path: node.file_path.clone(),
                    function_name: Some(node.label.clone()),
                    line: None,
                    issue_type: Some(method.to_string()),
                    detail: None,
                });
            }
        };

        if has_blocking_result(snippet) {
            hit(".Result");
        }
        if snippet.contains(".Wait()") {
            hit(".Wait()");
        }
        if snippet.contains(".GetAwaiter().GetResult(") {
            hit(".GetAwaiter().GetResult(");
        }
    }
    bucket
}

/// `.Result` occurrences that are not an equality comparison
/// (`x.Result == y` is a value check, not a block).
fn has_blocking_result(snippet: &str) -> bool {
    let mut rest = snippet;
    let mut base = 0usize;
    while let Some(idx) = rest.find(".Result") {
        let after = &rest[idx + ".Result".len()..];
        let trimmed = after.trim_start();
        if !trimmed.starts_with("==") && !trimmed.starts_with("!=") {
            // Exclude identifiers like `.ResultSet`.
            if !after
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                return true;
            }
        }
        base += idx + ".Result".len();
        rest = &snippet[base..];
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::NodeType;

    fn service_fn(name: &str, path: &str, snippet: &str) -> Node {
        Node::new("function", name, NodeType::Function, name, path, "CSharp")
            .with_snippet(snippet)
    }

    #[test]
    fn test_result_blocking_detected() {
        let nodes = vec![service_fn(
            "Load",
            "/app/UserService.cs",
            "var users = GetUsersAsync().Result;",
        )];
        assert_eq!(detect(&nodes).count, 1);
    }

    #[test]
    fn test_result_equality_is_not_blocking() {
        let nodes = vec![service_fn(
            "Check",
            "/app/UserService.cs",
            "if (task.Result == expected) {}",
        )];
        assert_eq!(detect(&nodes).count, 0);
    }

    #[test]
    fn test_wait_and_getawaiter() {
        let nodes = vec![service_fn(
            "Load",
            "/app/UserService.cs",
            "task.Wait();\nother.GetAwaiter().GetResult();",
        )];
        let bucket = detect(&nodes);
        assert_eq!(bucket.count, 2);
    }

    #[test]
    fn test_test_fixtures_excluded() {
        let nodes = vec![service_fn(
            "Load",
            "/app/tests/UserServiceTests.cs",
            "var x = task.Result;",
        )];
        assert_eq!(detect(&nodes).count, 0);
    }

    #[test]
    fn test_out_of_scope_excluded() {
        let nodes = vec![service_fn(
            "Load",
            "/app/helpers.cs",
            "var x = task.Result;",
        )];
        assert_eq!(detect(&nodes).count, 0);
    }
}
