//! CSS / HTML extraction (text-driven).
//!
//! CSS files record their classes, ids, custom properties, keyframes, and
//! media queries as deduplicated File-node metadata, plus IMPORTS edges for
//! `@import` targets. HTML files contribute only their File node.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Edge, EdgeType};
use crate::parser::Language;
use crate::strategies::{StrategyContext, StrategyOutput};
use crate::textscan::{matching_brace, next_open_brace};

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?['"]?([^'")\s;]+)"#).unwrap()
});

static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Za-z_][-\w]*)").unwrap());
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([A-Za-z_][-\w]*)").unwrap());
static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(--[A-Za-z_][-\w]*)\s*:").unwrap());
static KEYFRAMES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@keyframes\s+([A-Za-z_][-\w]*)").unwrap());
static MEDIA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@media\s+([^{]+)").unwrap());
static STRING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).unwrap());

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    if ctx.language != Language::Css {
        return out;
    }

    let file_id = out.file_id().to_string();

    for caps in IMPORT_RE.captures_iter(ctx.source) {
        out.edges.push(Edge::new(
            &file_id,
            caps.get(1).unwrap().as_str(),
            EdgeType::Imports,
        ));
    }

    // Selector tokens are read outside declaration blocks only; variables
    // are declarations, so those are read inside blocks.
    let selector_text = selector_regions(ctx.source);
    let classes: BTreeSet<String> = CLASS_RE
        .captures_iter(&selector_text)
        .map(|c| c[1].to_string())
        .collect();
    let ids: BTreeSet<String> = ID_RE
        .captures_iter(&selector_text)
        .map(|c| c[1].to_string())
        .collect();
    let variables: BTreeSet<String> = VARIABLE_RE
        .captures_iter(ctx.source)
        .map(|c| c[1].to_string())
        .collect();
    let keyframes: BTreeSet<String> = KEYFRAMES_RE
        .captures_iter(ctx.source)
        .map(|c| c[1].to_string())
        .collect();
    let media: BTreeSet<String> = MEDIA_RE
        .captures_iter(ctx.source)
        .map(|c| c[1].trim().to_string())
        .collect();

    let file = &mut out.nodes[0];
    for (key, values) in [
        ("cssClasses", classes),
        ("cssIds", ids),
        ("cssVariables", variables),
        ("cssKeyframes", keyframes),
        ("cssMediaQueries", media),
    ] {
        if !values.is_empty() {
            file.metadata.extra.insert(
                key.to_string(),
                serde_json::Value::Array(
                    values.into_iter().map(serde_json::Value::String).collect(),
                ),
            );
        }
    }

    out
}

/// Source text with declaration-block bodies blanked out, leaving only
/// selector positions for class/id token scans.
fn selector_regions(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut cursor = 0usize;
    while let Some(open) = next_open_brace(source, cursor) {
        if open < cursor {
            break;
        }
        result.push_str(&source[cursor..open]);
        match matching_brace(source, open) {
            Some(close) => {
                result.push(' ');
                cursor = close + 1;
            }
            None => {
                cursor = source.len();
                break;
            }
        }
    }
    result.push_str(&source[cursor..]);
    // Quoted spans (e.g. @import targets) are not selectors.
    STRING_RE.replace_all(&result, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(path: &str, language: Language, source: &str) -> StrategyOutput {
        let ctx = StrategyContext {
            file_path: path,
            source,
            language,
            tree: None,
        };
        analyze(&ctx)
    }

    #[test]
    fn test_css_extraction() {
        let out = run(
            "/web/app.css",
            Language::Css,
            "@import url('reset.css');\n:root { --brand: #fff; }\n.card, .card-header { color: red; }\n#main { margin: 0; }\n@keyframes spin { from {} to {} }\n@media (max-width: 600px) { .card { display: none; } }\n",
        );
        let file = &out.nodes[0];
        let classes = file.metadata.extra.get("cssClasses").unwrap();
        assert_eq!(
            classes,
            &serde_json::json!(["card", "card-header"])
        );
        assert!(file.metadata.extra.contains_key("cssIds"));
        assert!(file.metadata.extra.contains_key("cssVariables"));
        assert!(file.metadata.extra.contains_key("cssKeyframes"));

        assert!(out
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::Imports && e.target_id == "reset.css"));
    }

    #[test]
    fn test_duplicate_selectors_dedup() {
        let out = run(
            "/web/dup.css",
            Language::Css,
            ".card { color: red; }\n.card { color: blue; }\n",
        );
        let classes = out.nodes[0].metadata.extra.get("cssClasses").unwrap();
        assert_eq!(classes, &serde_json::json!(["card"]));
    }

    #[test]
    fn test_html_is_file_only() {
        let out = run("/web/index.html", Language::Html, "<html></html>");
        assert_eq!(out.nodes.len(), 1);
        assert!(out.edges.is_empty());
    }
}
