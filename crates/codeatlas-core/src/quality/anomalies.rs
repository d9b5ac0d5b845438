//! Async/database anomalies.
//!
//! Scope: nodes whose path or label mentions `Service` or `Controller`,
//! deduped by issue type per function: unawaited `SaveChangesAsync`,
//! `await ... .Result` inside async bodies, commented-out eager includes
//! next to active queries, low database timeout literals, and
//! fire-and-forget `Task.Run`.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Issue, Node, StatBucket};
use crate::quality::in_scope;

static AWAIT_RESULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"await\s+[^;\n]*\.Result\b").unwrap());

static COMMENTED_INCLUDE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"//.*\.Include\(").unwrap());

static TIMEOUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:CommandTimeout|timeout)\s*[=:]\s*(\d+)").unwrap());

const ACTIVE_QUERY_MARKERS: &[&str] = &[".Where(", ".ToList(", ".First(", ".Find("];

const LOW_TIMEOUT_SECONDS: u64 = 5;

pub fn detect(nodes: &[Node]) -> StatBucket {
    let mut bucket = StatBucket::default();
    let mut seen: HashSet<(String, String, &'static str)> = HashSet::new();

    for node in nodes {
        if !in_scope(node, &["Service", "Controller"]) {
            continue;
        }
        let Some(snippet) = node.code_snippet.as_deref() else {
            continue;
        };

        let mut hit = |issue_type: &'static str, detail: Option<String>| {
            if seen.insert((node.file_path.clone(), node.label.clone(), issue_type)) {
                bucket.push(Issue {
                    file_path: node.file_path.clone(),
                    function_name: Some(node.label.clone()),
                    line: None,
                    issue_type: Some(issue_type.to_string()),
                    detail,
                });
            }
        };

        for line in snippet.lines() {
            if line.contains("SaveChangesAsync") && !line.contains("await") {
                hit("unawaited-save-changes", Some(line.trim().to_string()));
            }
            if line.contains("Task.Run(") && !line.contains("await") {
                hit("fire-and-forget-task", Some(line.trim().to_string()));
            }
        }

        if snippet.contains("async") && AWAIT_RESULT_RE.is_match(snippet) {
            hit("await-dot-result", None);
        }

        if COMMENTED_INCLUDE_RE.is_match(snippet)
            && ACTIVE_QUERY_MARKERS.iter().any(|m| snippet.contains(m))
        {
            hit("commented-include", None);
        }

        for caps in TIMEOUT_RE.captures_iter(snippet) {
            if let Ok(value) = caps[1].parse::<u64>() {
                if value <= LOW_TIMEOUT_SECONDS {
                    hit("low-db-timeout", Some(format!("timeout {}", value)));
                }
            }
        }
    }
    bucket
}
