//! Code smells.
//!
//! Scope: nodes whose path or label mentions `Service` or `Controller`.
//! Four detectors: try-without-catch, magic values (numbers and strings)
//! over a count threshold, over-long methods, and heavy explicit casting.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Issue, Node, StatBucket};
use crate::quality::in_scope;
use crate::textscan::matching_brace;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").unwrap());

static STRING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"\n]*)"|'([^'\n]*)'"#).unwrap());

static SCREAMING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z_]{8,}\b").unwrap());

static CAST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*[A-Z]\w*\s*\)\s*\w|\bas\s+[A-Z]\w*").unwrap());

/// Status codes and years are not magic.
const ALLOWED_NUMBERS: &[u64] = &[200, 201, 400, 404, 500];

/// Web content-type tokens are not magic strings.
const ALLOWED_STRING_MARKERS: &[&str] = &[
    "application/json",
    "application/xml",
    "text/html",
    "text/plain",
    "multipart/form-data",
    "application/x-www-form-urlencoded",
];

const MAGIC_COUNT_THRESHOLD: usize = 5;
const LONG_METHOD_LINES: usize = 80;
const CAST_COUNT_THRESHOLD: usize = 10;

pub fn detect(nodes: &[Node]) -> StatBucket {
    let mut bucket = StatBucket::default();

    for node in nodes {
        if !in_scope(node, &["Service", "Controller"]) {
            continue;
        }
        let Some(snippet) = node.code_snippet.as_deref() else {
            continue;
        };

        let mut issue = |issue_type: &str, detail: String| {
            bucket.push(Issue {
                file_path: node.file_path.clone(),
                function_name: Some(node.label.clone()),
                line: None,
                issue_type: Some(issue_type.to_string()),
                detail: Some(detail),
            });
        };

        let naked_tries = try_without_catch(snippet);
        if naked_tries > 0 {
            issue("try-without-catch", format!("{} occurrences", naked_tries));
        }

        let magic = magic_value_count(snippet);
        if magic > MAGIC_COUNT_THRESHOLD {
            issue("magic-values", format!("{} magic values", magic));
        }

        let lines = snippet.lines().count();
        if lines > LONG_METHOD_LINES {
            issue("long-method", format!("{} lines", lines));
        }

        let casts = CAST_RE.find_iter(snippet).count();
        if casts > CAST_COUNT_THRESHOLD {
            issue("explicit-casts", format!("{} casts", casts));
        }
    }
    bucket
}

/// `try {` blocks not followed by `catch` or `finally`.
fn try_without_catch(snippet: &str) -> usize {
    let mut count = 0usize;
    let mut search = 0usize;
    while let Some(idx) = snippet[search..].find("try") {
        let at = search + idx;
        search = at + 3;
        // Keyword, not a suffix of an identifier like `entry`.
        if at > 0
            && snippet[..at]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            continue;
        }
        let after_kw = snippet[at + 3..].trim_start();
        if !after_kw.starts_with('{') {
            continue;
        }
        let open = at + 3 + (snippet[at + 3..].len() - after_kw.len());
        let Some(close) = matching_brace(snippet, open) else {
            continue;
        };
        let tail = snippet[close + 1..].trim_start();
        if !tail.starts_with("catch") && !tail.starts_with("finally") {
            count += 1;
        }
    }
    count
}

fn magic_value_count(snippet: &str) -> usize {
    let mut count = 0usize;

    for caps in NUMBER_RE.captures_iter(snippet) {
        let Ok(value) = caps[1].parse::<u64>() else {
            continue;
        };
        let digits = caps[1].len();
        if value < 400 && digits < 4 {
            continue;
        }
        if ALLOWED_NUMBERS.contains(&value) || (1900..=2100).contains(&value) {
            continue;
        }
        count += 1;
    }

    for caps in STRING_RE.captures_iter(snippet) {
        let content = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        if content.len() < 15 {
            continue;
        }
        if ALLOWED_STRING_MARKERS
            .iter()
            .any(|marker| content.contains(marker))
        {
            continue;
        }
        count += 1;
    }

    count += SCREAMING_RE.find_iter(snippet).count();
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::NodeType;

    fn service_fn(snippet: &str) -> Vec<Node> {
        vec![Node::new(
            "function",
            "Process",
            NodeType::Function,
            "Process",
            "/app/OrderService.cs",
            "CSharp",
        )
        .with_snippet(snippet)]
    }

    #[test]
    fn test_try_without_catch() {
        let bucket = detect(&service_fn("try { risky(); }\nlog();\n"));
        assert!(bucket
            .issues
            .iter()
            .any(|i| i.issue_type.as_deref() == Some("try-without-catch")));
    }

    #[test]
    fn test_try_with_catch_is_clean() {
        let bucket = detect(&service_fn("try { risky(); } catch (Exception e) {}\n"));
        assert!(bucket
            .issues
            .iter()
            .all(|i| i.issue_type.as_deref() != Some("try-without-catch")));
    }

    #[test]
    fn test_magic_numbers_over_threshold() {
        let snippet = "a(9999); b(8888); c(7777); d(6666); e(5555); f(4444);";
        let bucket = detect(&service_fn(snippet));
        assert!(bucket
            .issues
            .iter()
            .any(|i| i.issue_type.as_deref() == Some("magic-values")));
    }

    #[test]
    fn test_status_codes_and_years_allowed() {
        let snippet = "a(200); b(404); c(500); d(1999); e(2026); f(400); g(201);";
        let bucket = detect(&service_fn(snippet));
        assert!(bucket
            .issues
            .iter()
            .all(|i| i.issue_type.as_deref() != Some("magic-values")));
    }

    #[test]
    fn test_long_method() {
        let snippet = "void Process() {\n".to_string() + &"    work();\n".repeat(85) + "}";
        let bucket = detect(&service_fn(&snippet));
        assert!(bucket
            .issues
            .iter()
            .any(|i| i.issue_type.as_deref() == Some("long-method")));
    }

    #[test]
    fn test_cast_threshold() {
        let casts = "(User)entity; ".repeat(11);
        let bucket = detect(&service_fn(&casts));
        assert!(bucket
            .issues
            .iter()
            .any(|i| i.issue_type.as_deref() == Some("explicit-casts")));
    }
}
