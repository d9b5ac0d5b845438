//! Repeated-code detection.
//!
//! Counts normalized (lowercased, whitespace-collapsed) fragments across
//! all snippets in four categories: validation calls, address-field
//! clusters, SQL table DDL, and ORM include chains. One issue per category
//! when a fragment repeats (address fields use a higher threshold).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Issue, Node, StatBucket};

static VALIDATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"validate\w*\([^)]*\)").unwrap());

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(address1|address2|city|state|zip|postal)\b").unwrap());

static DDL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:create|alter)\s+table\s+(\w+)").unwrap());

static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.include\([^)]*\)").unwrap());

const ADDRESS_THRESHOLD: usize = 3;

pub fn detect(nodes: &[Node]) -> StatBucket {
    let mut bucket = StatBucket::default();

    // Normalized corpus, one entry per snippet-bearing node.
    let corpus: Vec<(&Node, String)> = nodes
        .iter()
        .filter_map(|n| {
            n.code_snippet
                .as_deref()
                .map(|s| (n, normalize(s)))
        })
        .collect();

    report_fragment_counts(&mut bucket, &corpus, &VALIDATION_RE, "repeated-validation", 1);
    report_address_fields(&mut bucket, &corpus);
    report_ddl(&mut bucket, &corpus);
    report_fragment_counts(&mut bucket, &corpus, &INCLUDE_RE, "repeated-include", 1);

    bucket
}

fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count whole-match fragments; emit one issue per fragment repeating more
/// than `threshold` times.
fn report_fragment_counts(
    bucket: &mut StatBucket,
    corpus: &[(&Node, String)],
    pattern: &Regex,
    issue_type: &str,
    threshold: usize,
) {
    let mut counts: BTreeMap<String, (usize, String)> = BTreeMap::new();
    for (node, text) in corpus {
        for m in pattern.find_iter(text) {
            let entry = counts
                .entry(m.as_str().to_string())
                .or_insert((0, node.file_path.clone()));
            entry.0 += 1;
        }
    }
    for (fragment, (count, file_path)) in counts {
        if count > threshold {
            bucket.push(Issue {
                file_path,
                function_name: None,
                line: None,
                issue_type: Some(issue_type.to_string()),
                detail: Some(format!("'{}' appears {} times", fragment, count)),
            });
        }
    }
}

fn report_address_fields(bucket: &mut StatBucket, corpus: &[(&Node, String)]) {
    let mut total = 0usize;
    let mut first_file: Option<String> = None;
    for (node, text) in corpus {
        let count = ADDRESS_RE.find_iter(text).count();
        if count > 0 && first_file.is_none() {
            first_file = Some(node.file_path.clone());
        }
        total += count;
    }
    if total > ADDRESS_THRESHOLD {
        bucket.push(Issue {
            file_path: first_file.unwrap_or_default(),
            function_name: None,
            line: None,
            issue_type: Some("repeated-address-fields".to_string()),
            detail: Some(format!("{} address-field tokens", total)),
        });
    }
}

fn report_ddl(bucket: &mut StatBucket, corpus: &[(&Node, String)]) {
    let mut counts: BTreeMap<String, (usize, String)> = BTreeMap::new();
    for (node, text) in corpus {
        for caps in DDL_RE.captures_iter(text) {
            let entry = counts
                .entry(caps[1].to_string())
                .or_insert((0, node.file_path.clone()));
            entry.0 += 1;
        }
    }
    for (table, (count, file_path)) in counts {
        if count > 1 {
            bucket.push(Issue {
                file_path,
                function_name: None,
                line: None,
                issue_type: Some("repeated-table-ddl".to_string()),
                detail: Some(format!("table '{}' defined or altered {} times", table, count)),
            });
        }
    }
}
