//! Shared extraction helpers for AST and text strategies.

use tree_sitter::Node as TsNode;

use crate::map::{CallSite, Node};

/// Visit every node of a tree in preorder.
///
/// Iterative so deeply nested sources cannot overflow the stack.
pub fn for_each_node<'t, F: FnMut(TsNode<'t>)>(root: TsNode<'t>, f: &mut F) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        f(node);
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
}

/// Get a node's source text.
pub fn node_text<'s>(node: TsNode<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Find the top-level declaration ancestor of a node: the ancestor whose
/// parent is the tree root. Snippets for named declarations are taken from
/// this ancestor so decorators and export wrappers stay attached.
pub fn top_level_ancestor<'t>(node: TsNode<'t>) -> TsNode<'t> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent.parent().is_none() {
            return current;
        }
        current = parent;
    }
    current
}

/// Snippet text of the top-level declaration enclosing `node`.
pub fn enclosing_snippet<'s>(node: TsNode<'_>, source: &'s str) -> &'s str {
    node_text(top_level_ancestor(node), source)
}

/// Strip matched string delimiters (single, double, backtick) from a
/// literal's text. Template interpolation is left in place.
pub fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    if raw.len() >= 2 {
        let bytes = raw.as_bytes();
        let (first, last) = (bytes[0], bytes[raw.len() - 1]);
        if first == last && (first == b'"' || first == b'\'' || first == b'`') {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// True if the name starts with an ASCII uppercase letter.
pub fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Join two route segments into a normalized path with a single leading
/// slash and no trailing slash (the root route stays `/`).
pub fn join_route(base: &str, sub: &str) -> String {
    let base = base.trim().trim_matches('/');
    let sub = sub.trim().trim_matches('/');
    let mut path = String::from("/");
    if !base.is_empty() {
        path.push_str(base);
    }
    if !sub.is_empty() {
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(sub);
    }
    path
}

/// Tracks declaration spans so call sites can be attributed to their
/// innermost enclosing declaration.
#[derive(Debug, Default)]
pub struct SpanIndex {
    spans: Vec<(usize, usize, String)>,
}

impl SpanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration node's byte range and map node id.
    pub fn insert(&mut self, start: usize, end: usize, node_id: &str) {
        self.spans.push((start, end, node_id.to_string()));
    }

    pub fn insert_node(&mut self, ts_node: TsNode<'_>, node: &Node) {
        self.insert(ts_node.start_byte(), ts_node.end_byte(), &node.id);
    }

    /// Innermost declaration containing the byte offset, if any.
    pub fn enclosing(&self, offset: usize) -> Option<&str> {
        self.spans
            .iter()
            .filter(|(start, end, _)| *start <= offset && offset < *end)
            .min_by_key(|(start, end, _)| end - start)
            .map(|(_, _, id)| id.as_str())
    }
}

/// Build a call site attributed to the innermost declaration, falling back
/// to the file node.
pub fn call_site(
    spans: &SpanIndex,
    file_id: &str,
    file_path: &str,
    offset: usize,
    raw: &str,
    qualifier: Option<&str>,
) -> CallSite {
    CallSite {
        caller_id: spans.enclosing(offset).unwrap_or(file_id).to_string(),
        raw: raw.to_string(),
        qualifier: qualifier.map(|q| q.to_string()),
        caller_file: file_path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'/api/users'"), "/api/users");
        assert_eq!(unquote("\"/x\""), "/x");
        assert_eq!(unquote("`/tpl`"), "/tpl");
        assert_eq!(unquote("bare"), "bare");
        assert_eq!(unquote("'unbalanced\""), "'unbalanced\"");
    }

    #[test]
    fn test_join_route() {
        assert_eq!(join_route("/api", "users"), "/api/users");
        assert_eq!(join_route("api/", "/users/"), "/api/users");
        assert_eq!(join_route("", "users"), "/users");
        assert_eq!(join_route("api", ""), "/api");
        assert_eq!(join_route("", ""), "/");
    }

    #[test]
    fn test_span_index_innermost_wins() {
        let mut spans = SpanIndex::new();
        spans.insert(0, 100, "outer");
        spans.insert(10, 50, "inner");
        assert_eq!(spans.enclosing(20), Some("inner"));
        assert_eq!(spans.enclosing(60), Some("outer"));
        assert_eq!(spans.enclosing(200), None);
    }

    #[test]
    fn test_starts_uppercase() {
        assert!(starts_uppercase("UserCard"));
        assert!(!starts_uppercase("useUsers"));
        assert!(!starts_uppercase(""));
    }
}
