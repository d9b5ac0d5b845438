//! API call synthesis.
//!
//! For each configured frontend/backend rule, scans frontend Function
//! snippets for `fetch` / `axios` call sites, extracts and normalizes the
//! URL (with `.env` substitution for `process.env` references), and matches
//! the path against backend APIRoute labels. Path parameters (`:id`,
//! `{id}`) match any single segment; the first matching route wins.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::interactions::{anchor, under, AnalysisState, InteractionRule};
use crate::map::{Edge, EdgeType, NodeType};

static FETCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"fetch\(\s*([^,)\n]+)").unwrap());

static AXIOS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"axios\.(?:get|post|put|delete|patch)\(\s*([^,)\n]+)").unwrap());

static AXIOS_CREATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+)\s*=\s*axios\.create\(\s*\{[^}]*baseURL\s*:\s*([^,}\n]+)").unwrap()
});

static CONST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:const|let|var)\s+(apiUrl|baseURL|BASE_URL)\s*=\s*([^;\n]+)"#).unwrap()
});

static ENV_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{process\.env\.(\w+)\}|process\.env\.(\w+)").unwrap());

pub fn synthesize_api_calls(state: &mut AnalysisState, rules: &[InteractionRule]) {
    let env = load_env(&state.root);

    let mut new_edges = Vec::new();
    for rule in rules.iter().filter(|r| r.rule_type == "API_CALL") {
        let frontend_root = anchor(&state.root, &rule.frontend.path);
        let backend_root = anchor(&state.root, &rule.backend.path);
        let url_prefix = rule.frontend.url_prefix.as_deref().unwrap_or("");

        // Routes under the backend root, in encounter order.
        let routes: Vec<(String, Regex)> = state
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::ApiRoute && under(&n.file_path, &backend_root))
            .filter_map(|n| route_regex(&n.label).map(|re| (n.id.clone(), re)))
            .collect();
        if routes.is_empty() {
            continue;
        }

        for node in state.nodes.iter().filter(|n| {
            n.node_type == NodeType::Function && under(&n.file_path, &frontend_root)
        }) {
            let Some(snippet) = node.code_snippet.as_deref() else {
                continue;
            };
            for url in extract_urls(snippet, &env) {
                let Some(path) = normalize_url(&url) else {
                    continue;
                };
                let full = format!("{}{}", url_prefix.trim_end_matches('/'), path);
                if let Some((route_id, _)) = routes.iter().find(|(_, re)| re.is_match(&full)) {
                    new_edges.push(Edge::new(&node.id, route_id, EdgeType::ApiCall));
                }
            }
        }
    }

    debug!("synthesized {} API call edges", new_edges.len());
    for edge in new_edges {
        state.add_edge_once(edge);
    }
}

/// `.env` at the repository root, KEY=VALUE lines.
fn load_env(root: &Path) -> HashMap<String, String> {
    let mut env = HashMap::new();
    let Ok(text) = std::fs::read_to_string(root.join(".env")) else {
        return env;
    };
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            env.insert(
                key.trim().to_string(),
                value.trim().trim_matches('"').trim_matches('\'').to_string(),
            );
        }
    }
    env
}

/// URL strings extracted from one snippet.
fn extract_urls(snippet: &str, env: &HashMap<String, String>) -> Vec<String> {
    // Known local constants: apiUrl / baseURL / BASE_URL.
    let mut consts: HashMap<String, String> = HashMap::new();
    for caps in CONST_RE.captures_iter(snippet) {
        if let Some(value) = resolve_expr(&caps[2], &consts, env) {
            consts.insert(caps[1].to_string(), value);
        }
    }

    let mut urls = Vec::new();
    for caps in FETCH_RE.captures_iter(snippet) {
        if let Some(url) = resolve_expr(&caps[1], &consts, env) {
            urls.push(url);
        }
    }
    for caps in AXIOS_RE.captures_iter(snippet) {
        if let Some(url) = resolve_expr(&caps[1], &consts, env) {
            urls.push(url);
        }
    }

    // axios.create({baseURL}) instances prefix their subsequent calls.
    for caps in AXIOS_CREATE_RE.captures_iter(snippet) {
        let instance = &caps[1];
        let Some(base) = resolve_expr(&caps[2], &consts, env) else {
            continue;
        };
        let instance_call =
            Regex::new(&format!(r"\b{}\.(?:get|post|put|delete|patch)\(\s*([^,)\n]+)", regex::escape(instance)))
                .expect("instance call pattern");
        for call in instance_call.captures_iter(snippet) {
            if let Some(suffix) = resolve_expr(&call[1], &consts, env) {
                urls.push(format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    suffix.trim_start_matches('/')
                ));
            }
        }
    }

    urls
}

/// Resolve a call-argument expression to a string: a literal, a known
/// identifier, or an `ident + 'literal'` concatenation, with `process.env`
/// substitution throughout.
fn resolve_expr(
    expr: &str,
    consts: &HashMap<String, String>,
    env: &HashMap<String, String>,
) -> Option<String> {
    let expr = expr.trim();

    if expr.contains('+') {
        let mut combined = String::new();
        for part in expr.split('+') {
            combined.push_str(&resolve_expr(part, consts, env)?);
        }
        return Some(combined);
    }

    if expr.starts_with('\'') || expr.starts_with('"') || expr.starts_with('`') {
        let inner = expr.trim_matches(|c| c == '\'' || c == '"' || c == '`');
        return Some(substitute_env(inner, env));
    }

    if let Some(value) = consts.get(expr) {
        return Some(value.clone());
    }

    // Bare process.env.NAME reference.
    if let Some(stripped) = expr.strip_prefix("process.env.") {
        return env.get(stripped).cloned();
    }

    None
}

fn substitute_env(text: &str, env: &HashMap<String, String>) -> String {
    ENV_REF_RE
        .replace_all(text, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            env.get(name).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Reduce a URL to its path component: strip scheme and host, query and
/// fragment, and trailing slashes.
fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let path = if let Some(idx) = url.find("://") {
        let after_scheme = &url[idx + 3..];
        match after_scheme.find('/') {
            Some(slash) => &after_scheme[slash..],
            None => "/",
        }
    } else if url.starts_with('/') {
        url
    } else {
        return Some(format!("/{}", trim_url_tail(url)));
    };
    let path = trim_url_tail(path);
    let trimmed = path.trim_end_matches('/');
    Some(if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    })
}

fn trim_url_tail(path: &str) -> &str {
    let end = path
        .find(|c| c == '?' || c == '#')
        .unwrap_or(path.len());
    &path[..end]
}

/// Compile a route label into a matcher: `:name` and `{name}` segments
/// match any single path segment; everything else is literal. Anchored at
/// both ends.
fn route_regex(label: &str) -> Option<Regex> {
    let pattern: String = label
        .split('/')
        .map(|segment| {
            if segment.starts_with(':')
                || (segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2)
            {
                "[^/]+".to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    Regex::new(&format!("^{}$", pattern)).ok()
}
