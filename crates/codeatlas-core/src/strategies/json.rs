//! JSON extraction.
//!
//! Detects OpenAPI / Swagger documents (an `openapi` or `swagger` key next
//! to a `paths` object) and emits one APIRoute node per method under each
//! path. Other JSON files contribute only their File node.

use serde_json::Value;

use crate::map::{Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};

const OPENAPI_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);

    let Ok(value) = serde_json::from_str::<Value>(ctx.source) else {
        return out;
    };
    let is_openapi = value.get("openapi").is_some() || value.get("swagger").is_some();
    let Some(paths) = value.get("paths").and_then(Value::as_object) else {
        return out;
    };
    if !is_openapi {
        return out;
    }

    for (path, operations) in paths {
        let Some(operations) = operations.as_object() else {
            continue;
        };
        for (method, operation) in operations {
            if !OPENAPI_METHODS.contains(&method.as_str()) {
                continue;
            }
            let mut metadata = NodeMetadata::route("OpenAPI", Some(method));
            if let Some(op_id) = operation.get("operationId").and_then(Value::as_str) {
                metadata = metadata.with_extra("operationId", op_id);
            }
            if let Some(summary) = operation.get("summary").and_then(Value::as_str) {
                metadata = metadata.with_extra("summary", summary);
            }
            out.nodes.push(Node {
                id: node_id(
                    "route",
                    &format!("{}:{}", method, path),
                    ctx.file_path,
                    None,
                ),
                node_type: NodeType::ApiRoute,
                label: path.clone(),
                file_path: ctx.file_path.to_string(),
                language: ctx.language.as_str().to_string(),
                code_snippet: None,
                metadata,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Language;

    fn run(path: &str, source: &str) -> StrategyOutput {
        let ctx = StrategyContext {
            file_path: path,
            source,
            language: Language::Json,
            tree: None,
        };
        analyze(&ctx)
    }

    #[test]
    fn test_openapi_routes() {
        let out = run(
            "/api/spec.json",
            r#"{"openapi": "3.0.0", "paths": {"/users/{id}": {"get": {"operationId": "getUser"}, "delete": {}}}}"#,
        );
        let routes: Vec<&Node> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::ApiRoute)
            .collect();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.label == "/users/{id}"));
        let get = routes
            .iter()
            .find(|r| r.metadata.http_method.as_deref() == Some("GET"))
            .unwrap();
        assert_eq!(
            get.metadata.extra.get("operationId"),
            Some(&serde_json::Value::String("getUser".into()))
        );
    }

    #[test]
    fn test_plain_json_is_file_only() {
        let out = run("/app/package.json", r#"{"name": "app", "version": "1.0.0"}"#);
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].node_type, NodeType::File);
    }

    #[test]
    fn test_paths_without_openapi_marker_ignored() {
        let out = run("/app/data.json", r#"{"paths": {"/x": {"get": {}}}}"#);
        assert_eq!(out.nodes.len(), 1);
    }
}
