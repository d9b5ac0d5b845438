//! IMPORTS resolution.
//!
//! Rewrites the raw specifier on IMPORTS edges to the canonical File node id
//! when the import resolves to a discovered file. Unresolved specifiers are
//! kept as-is.
//!
//! Resolution is language-specific: TypeScript/JavaScript apply `tsconfig`
//! path aliases then relative resolution; Python probes dotted-module
//! candidates under the root, the source directory, and any virtualenv
//! `site-packages`; Java probes source roots; Go consults `go.mod`.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::interactions::{normalize_join, parent_dir, AnalysisState};
use crate::map::{normalize_path, EdgeType, NodeType};

const TS_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];

pub fn resolve_imports(state: &mut AnalysisState) {
    let file_ids = state.file_index();
    let id_meta: HashMap<String, (String, String)> = state
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::File)
        .map(|n| (n.id.clone(), (n.file_path.clone(), n.language.clone())))
        .collect();

    let root = normalize_path(&state.root.to_string_lossy());
    let aliases = load_tsconfig_aliases(&state.root);
    let go_module = load_go_module(&state.root);
    let java_roots = java_source_roots(&state.root, &root);
    let site_packages = find_site_packages(&state.root);

    let mut resolved = 0usize;
    for edge in state
        .edges
        .iter_mut()
        .filter(|e| e.edge_type == EdgeType::Imports)
    {
        let Some((source_path, language)) = id_meta.get(&edge.source_id) else {
            continue;
        };
        // Already points at a node.
        if file_ids.values().any(|id| *id == edge.target_id) {
            continue;
        }
        let spec = edge.target_id.clone();
        let target = match language.as_str() {
            "TypeScript" | "JavaScript" => {
                resolve_ts(&spec, source_path, &root, &aliases, &file_ids)
            }
            "Python" => resolve_python(&spec, source_path, &root, &site_packages, &file_ids),
            "Java" => resolve_java(&spec, &java_roots, &file_ids),
            "Go" => go_module
                .as_ref()
                .and_then(|m| resolve_go(&spec, m, &root, &file_ids)),
            _ => None,
        };
        if let Some(node_id) = target {
            edge.target_id = node_id;
            resolved += 1;
        }
    }
    debug!("resolved {} import edges", resolved);
}

// ============================================================================
// TypeScript / JavaScript
// ============================================================================

/// `paths` aliases from tsconfig.json / tsconfig.base.json at the root.
/// Only the first target of each alias is considered.
fn load_tsconfig_aliases(root: &Path) -> Vec<(String, String)> {
    let mut aliases = Vec::new();
    for name in ["tsconfig.json", "tsconfig.base.json"] {
        let Ok(text) = std::fs::read_to_string(root.join(name)) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(&strip_jsonc_comments(&text)) else {
            continue;
        };
        let Some(paths) = value
            .get("compilerOptions")
            .and_then(|c| c.get("paths"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        for (pattern, targets) in paths {
            let first = targets
                .as_array()
                .and_then(|a| a.first())
                .and_then(Value::as_str);
            if let Some(target) = first {
                aliases.push((pattern.clone(), target.to_string()));
            }
        }
        break;
    }
    aliases
}

/// tsconfig files routinely carry comments; strip them before parsing.
fn strip_jsonc_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                result.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => result.push(c),
        }
    }
    result
}

fn resolve_ts(
    spec: &str,
    source_path: &str,
    root: &str,
    aliases: &[(String, String)],
    file_ids: &HashMap<String, String>,
) -> Option<String> {
    // Alias substitution first: `@app/*` -> `src/app/*`.
    for (pattern, target) in aliases {
        let substituted = match pattern.strip_suffix('*') {
            Some(prefix) => spec
                .strip_prefix(prefix)
                .map(|rest| target.replace('*', rest)),
            None if pattern == spec => Some(target.clone()),
            None => None,
        };
        if let Some(candidate) = substituted {
            let base = normalize_join(root, &candidate);
            if let Some(id) = probe_ts(&base, file_ids) {
                return Some(id);
            }
        }
    }

    if spec.starts_with('.') {
        let base = normalize_join(parent_dir(source_path), spec);
        return probe_ts(&base, file_ids);
    }
    None
}

fn probe_ts(base: &str, file_ids: &HashMap<String, String>) -> Option<String> {
    if let Some(id) = file_ids.get(base) {
        return Some(id.clone());
    }
    for ext in TS_EXTENSIONS {
        if let Some(id) = file_ids.get(&format!("{}{}", base, ext)) {
            return Some(id.clone());
        }
    }
    for ext in TS_EXTENSIONS {
        if let Some(id) = file_ids.get(&format!("{}/index{}", base, ext)) {
            return Some(id.clone());
        }
    }
    None
}

// ============================================================================
// Python
// ============================================================================

fn resolve_python(
    spec: &str,
    source_path: &str,
    root: &str,
    site_packages: &[String],
    file_ids: &HashMap<String, String>,
) -> Option<String> {
    // Relative imports: one leading dot anchors at the source directory,
    // each further dot walks one directory up.
    if let Some(stripped) = spec.strip_prefix('.') {
        let mut dir = parent_dir(source_path).to_string();
        let mut rest = stripped;
        while let Some(more) = rest.strip_prefix('.') {
            dir = parent_dir(&dir).to_string();
            rest = more;
        }
        return probe_python(&dir, rest, file_ids);
    }

    let source_dir = parent_dir(source_path).to_string();
    for base in [root, source_dir.as_str()] {
        if let Some(id) = probe_python(base, spec, file_ids) {
            return Some(id);
        }
    }
    for packages_dir in site_packages {
        if let Some(id) = probe_python(packages_dir, spec, file_ids) {
            return Some(id);
        }
    }
    None
}

fn probe_python(
    base: &str,
    dotted: &str,
    file_ids: &HashMap<String, String>,
) -> Option<String> {
    let rel = dotted.replace('.', "/");
    if rel.is_empty() {
        return None;
    }
    let module = normalize_join(base, &format!("{}.py", rel));
    if let Some(id) = file_ids.get(&module) {
        return Some(id.clone());
    }
    let package = normalize_join(base, &format!("{}/__init__.py", rel));
    file_ids.get(&package).cloned()
}

/// `site-packages` directories under the conventional virtualenv roots (or
/// `$VIRTUAL_ENV`).
fn find_site_packages(root: &Path) -> Vec<String> {
    let mut candidates: Vec<std::path::PathBuf> = [".venv", "venv", "env"]
        .iter()
        .map(|name| root.join(name))
        .collect();
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        candidates.push(venv.into());
    }

    let mut found = Vec::new();
    for candidate in candidates {
        if !candidate.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&candidate)
            .max_depth(4)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_dir() && entry.file_name() == "site-packages" {
                found.push(normalize_path(&entry.path().to_string_lossy()));
            }
        }
    }
    found.sort();
    found
}

// ============================================================================
// Java
// ============================================================================

/// Discovered Java source roots: the Maven conventions plus any
/// `.../src/**/java` directory.
fn java_source_roots(root: &Path, root_str: &str) -> Vec<String> {
    let mut roots = vec![
        format!("{}/src/main/java", root_str),
        format!("{}/src/test/java", root_str),
    ];
    for entry in WalkDir::new(root)
        .max_depth(6)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_dir() || entry.file_name() != "java" {
            continue;
        }
        let path = normalize_path(&entry.path().to_string_lossy());
        if path.contains("/src/") && !roots.contains(&path) {
            roots.push(path);
        }
    }
    roots.sort();
    roots.dedup();
    roots
}

fn resolve_java(
    spec: &str,
    source_roots: &[String],
    file_ids: &HashMap<String, String>,
) -> Option<String> {
    let fqn = spec.trim_end_matches(".*");
    let rel = format!("{}.java", fqn.replace('.', "/"));
    for source_root in source_roots {
        let candidate = normalize_join(source_root, &rel);
        if let Some(id) = file_ids.get(&candidate) {
            return Some(id.clone());
        }
    }
    None
}

// ============================================================================
// Go
// ============================================================================

#[derive(Debug)]
struct GoModule {
    module: String,
    replaces: Vec<(String, String)>,
}

fn load_go_module(root: &Path) -> Option<GoModule> {
    let text = std::fs::read_to_string(root.join("go.mod")).ok()?;
    let mut module = None;
    let mut replaces = Vec::new();
    let mut in_replace_block = false;

    for line in text.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("module ") {
            module = Some(rest.trim().to_string());
        } else if line.starts_with("replace (") {
            in_replace_block = true;
        } else if in_replace_block && line == ")" {
            in_replace_block = false;
        } else if in_replace_block || line.starts_with("replace ") {
            let clause = line.strip_prefix("replace ").unwrap_or(line);
            if let Some((old, new)) = clause.split_once("=>") {
                let old = old.split_whitespace().next().unwrap_or("").to_string();
                let new = new.split_whitespace().next().unwrap_or("").to_string();
                if !old.is_empty() && !new.is_empty() {
                    replaces.push((old, new));
                }
            }
        }
    }

    module.map(|module| GoModule { module, replaces })
}

fn resolve_go(
    spec: &str,
    go_module: &GoModule,
    root: &str,
    file_ids: &HashMap<String, String>,
) -> Option<String> {
    // Replaced modules that point at local paths.
    for (old, new) in &go_module.replaces {
        if !new.starts_with('.') && !new.starts_with('/') {
            continue;
        }
        if let Some(rest) = strip_module_prefix(spec, old) {
            let dir = normalize_join(root, &format!("{}/{}", new, rest));
            if let Some(id) = first_go_file(&dir, file_ids) {
                return Some(id);
            }
        }
    }

    let rest = strip_module_prefix(spec, &go_module.module)?;
    let dir = normalize_join(root, rest);
    first_go_file(&dir, file_ids)
}

fn strip_module_prefix<'s>(spec: &'s str, module: &str) -> Option<&'s str> {
    if spec == module {
        return Some("");
    }
    spec.strip_prefix(&format!("{}/", module))
}

/// Alphabetically first `.go` file directly inside a directory.
fn first_go_file(dir: &str, file_ids: &HashMap<String, String>) -> Option<String> {
    let prefix = format!("{}/", dir.trim_end_matches('/'));
    file_ids
        .iter()
        .filter(|(path, _)| {
            path.ends_with(".go")
                && path.starts_with(&prefix)
                && !path[prefix.len()..].contains('/')
        })
        .min_by(|a, b| a.0.cmp(b.0))
        .map(|(_, id)| id.clone())
}
