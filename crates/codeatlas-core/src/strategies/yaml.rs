//! YAML extraction.
//!
//! Splits multi-document files on `---`, then classifies each document:
//! Kubernetes resources (apiVersion + kind) become Component nodes carrying
//! labels, selectors, and image references; Helm charts and template
//! documents become Component nodes tagged with their chart root; Kustomize
//! files capture their `resources:` list; OpenAPI documents emit APIRoute
//! nodes per path and method.
//!
//! Helm template documents frequently fail YAML parsing because of `{{ }}`
//! actions; they still get a Component node from the path alone.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use crate::map::{Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};

static DOC_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^---\s*$").unwrap());

const OPENAPI_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);

    if is_chart_file(ctx.file_path) {
        extract_chart(ctx, &mut out);
        return out;
    }

    for (offset, doc_text) in split_documents(ctx.source) {
        if doc_text.trim().is_empty() {
            continue;
        }
        let parsed: Option<Value> = serde_yaml::from_str(doc_text).ok();

        if is_kustomization(ctx.file_path, parsed.as_ref()) {
            extract_kustomization(ctx, &mut out, parsed.as_ref(), doc_text, offset);
        } else if let Some(value) = parsed.as_ref().filter(|v| is_openapi(v)) {
            extract_openapi_routes(ctx, &mut out, value, offset);
        } else if let Some(value) = parsed.as_ref().filter(|v| is_kubernetes(v)) {
            extract_kubernetes(ctx, &mut out, value, doc_text, offset);
        } else if helm_chart_root(ctx.file_path).is_some() {
            // Unparseable or non-resource template doc under templates/.
            extract_template_doc(ctx, &mut out, doc_text, offset);
        }
    }

    out
}

/// Document segments with their byte offsets.
fn split_documents(source: &str) -> Vec<(usize, &str)> {
    let mut docs = Vec::new();
    let mut start = 0usize;
    for sep in DOC_SEPARATOR.find_iter(source) {
        if sep.start() > start {
            docs.push((start, &source[start..sep.start()]));
        }
        start = sep.end();
    }
    if start < source.len() {
        docs.push((start, &source[start..]));
    }
    docs
}

fn is_chart_file(file_path: &str) -> bool {
    file_path.ends_with("/Chart.yaml") || file_path == "Chart.yaml"
}

fn is_kustomization(file_path: &str, value: Option<&Value>) -> bool {
    let basename = file_path.rsplit('/').next().unwrap_or(file_path);
    if basename == "kustomization.yaml" || basename == "kustomization.yml" {
        return true;
    }
    value
        .and_then(|v| v.get("kustomization"))
        .is_some()
}

fn is_openapi(value: &Value) -> bool {
    value.get("openapi").is_some()
}

fn is_kubernetes(value: &Value) -> bool {
    value.get("apiVersion").is_some() && value.get("kind").is_some()
}

/// Chart root for files under a Helm `templates/` directory.
fn helm_chart_root(file_path: &str) -> Option<String> {
    file_path
        .find("/templates/")
        .map(|idx| file_path[..idx].to_string())
}

fn extract_chart(ctx: &StrategyContext, out: &mut StrategyOutput) {
    let parsed: Option<Value> = serde_yaml::from_str(ctx.source).ok();
    let name = parsed
        .as_ref()
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("chart")
        .to_string();
    let chart_root = ctx
        .file_path
        .rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default();

    let metadata = NodeMetadata {
        platform: Some("Helm".to_string()),
        chart_root: Some(chart_root),
        ..NodeMetadata::default()
    };
    out.nodes.push(
        Node::new(
            "chart",
            &name,
            NodeType::Component,
            &name,
            ctx.file_path,
            ctx.language.as_str(),
        )
        .with_snippet(ctx.source)
        .with_metadata(metadata),
    );
}

fn extract_kubernetes(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    value: &Value,
    doc_text: &str,
    offset: usize,
) {
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let name = value
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unnamed")
        .to_string();
    let label = format!("{}/{}", kind, name);

    let labels = value
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .map(string_map);
    let selector = value.get("spec").and_then(|s| s.get("selector")).map(|sel| {
        // Deployments nest under matchLabels; Services select directly.
        match sel.get("matchLabels") {
            Some(nested) => string_map(nested),
            None => string_map(sel),
        }
    });

    let mut images = Vec::new();
    collect_images(value, &mut images);
    images.sort();
    images.dedup();

    let metadata = NodeMetadata {
        platform: Some(platform_for(ctx.file_path)),
        resource_kind: Some(kind),
        resource_name: Some(name),
        labels: labels.filter(|m| !m.is_empty()),
        selector: selector.filter(|m| !m.is_empty()),
        images: if images.is_empty() { None } else { Some(images) },
        chart_root: helm_chart_root(ctx.file_path),
        ..NodeMetadata::default()
    };

    out.nodes.push(Node {
        id: node_id("k8s", &label, ctx.file_path, Some(offset)),
        node_type: NodeType::Component,
        label,
        file_path: ctx.file_path.to_string(),
        language: ctx.language.as_str().to_string(),
        code_snippet: Some(doc_text.trim().to_string()),
        metadata,
    });
}

/// Template docs under a chart keep Helm as their platform.
fn platform_for(file_path: &str) -> String {
    if helm_chart_root(file_path).is_some() {
        "Helm".to_string()
    } else {
        "Kubernetes".to_string()
    }
}

fn extract_template_doc(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    doc_text: &str,
    offset: usize,
) {
    let basename = ctx.file_path.rsplit('/').next().unwrap_or(ctx.file_path);
    let metadata = NodeMetadata {
        platform: Some("Helm".to_string()),
        chart_root: helm_chart_root(ctx.file_path),
        ..NodeMetadata::default()
    };
    out.nodes.push(Node {
        id: node_id("helm-template", basename, ctx.file_path, Some(offset)),
        node_type: NodeType::Component,
        label: basename.to_string(),
        file_path: ctx.file_path.to_string(),
        language: ctx.language.as_str().to_string(),
        code_snippet: Some(doc_text.trim().to_string()),
        metadata,
    });
}

fn extract_kustomization(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    value: Option<&Value>,
    doc_text: &str,
    offset: usize,
) {
    let resources = value
        .and_then(|v| {
            // `kustomization:` wrapper or top-level `resources:`.
            v.get("kustomization")
                .and_then(|k| k.get("resources"))
                .or_else(|| v.get("resources"))
        })
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let metadata = NodeMetadata {
        platform: Some("Kustomize".to_string()),
        resources: if resources.is_empty() {
            None
        } else {
            Some(resources)
        },
        ..NodeMetadata::default()
    };

    out.nodes.push(Node {
        id: node_id("kustomization", "kustomization", ctx.file_path, Some(offset)),
        node_type: NodeType::Component,
        label: "kustomization".to_string(),
        file_path: ctx.file_path.to_string(),
        language: ctx.language.as_str().to_string(),
        code_snippet: Some(doc_text.trim().to_string()),
        metadata,
    });
}

fn extract_openapi_routes(
    ctx: &StrategyContext,
    out: &mut StrategyOutput,
    value: &Value,
    offset: usize,
) {
    let Some(paths) = value.get("paths").and_then(Value::as_mapping) else {
        return;
    };
    for (path_key, operations) in paths {
        let Some(path) = path_key.as_str() else {
            continue;
        };
        let Some(operations) = operations.as_mapping() else {
            continue;
        };
        for (method_key, operation) in operations {
            let Some(method) = method_key.as_str() else {
                continue;
            };
            if !OPENAPI_METHODS.contains(&method) {
                continue;
            }
            let mut metadata = NodeMetadata::route("OpenAPI", Some(method));
            if let Some(op_id) = operation.get("operationId").and_then(Value::as_str) {
                metadata = metadata.with_extra("operationId", op_id);
            }
            out.nodes.push(Node {
                id: node_id(
                    "route",
                    &format!("{}:{}", method, path),
                    ctx.file_path,
                    Some(offset),
                ),
                node_type: NodeType::ApiRoute,
                label: path.to_string(),
                file_path: ctx.file_path.to_string(),
                language: ctx.language.as_str().to_string(),
                code_snippet: None,
                metadata,
            });
        }
    }
}

fn string_map(value: &Value) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(mapping) = value.as_mapping() {
        for (k, v) in mapping {
            let Some(key) = k.as_str() else { continue };
            let rendered = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            map.insert(key.to_string(), rendered);
        }
    }
    map
}

fn collect_images(value: &Value, images: &mut Vec<String>) {
    match value {
        Value::Mapping(mapping) => {
            for (k, v) in mapping {
                if k.as_str() == Some("image") {
                    if let Some(image) = v.as_str() {
                        images.push(image.to_string());
                    }
                }
                collect_images(v, images);
            }
        }
        Value::Sequence(seq) => {
            for item in seq {
                collect_images(item, images);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Language;

    fn run(path: &str, source: &str) -> StrategyOutput {
        let ctx = StrategyContext {
            file_path: path,
            source,
            language: Language::Yaml,
            tree: None,
        };
        analyze(&ctx)
    }

    #[test]
    fn test_multi_doc_service_and_deployment() {
        let out = run(
            "/infra/stack.yaml",
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  labels:\n    app: web\nspec:\n  template:\n    spec:\n      containers:\n        - name: web\n          image: registry/web:1.0\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web-svc\nspec:\n  selector:\n    app: web\n",
        );
        let components: Vec<&Node> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Component)
            .collect();
        assert_eq!(components.len(), 2);

        let deployment = components
            .iter()
            .find(|n| n.metadata.resource_kind.as_deref() == Some("Deployment"))
            .unwrap();
        assert_eq!(deployment.metadata.platform.as_deref(), Some("Kubernetes"));
        assert_eq!(
            deployment.metadata.labels.as_ref().unwrap().get("app"),
            Some(&"web".to_string())
        );
        assert_eq!(
            deployment.metadata.images.as_ref().unwrap(),
            &vec!["registry/web:1.0".to_string()]
        );

        let service = components
            .iter()
            .find(|n| n.metadata.resource_kind.as_deref() == Some("Service"))
            .unwrap();
        assert_eq!(
            service.metadata.selector.as_ref().unwrap().get("app"),
            Some(&"web".to_string())
        );
    }

    #[test]
    fn test_deployment_match_labels_selector() {
        let out = run(
            "/infra/deploy.yaml",
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: api\nspec:\n  selector:\n    matchLabels:\n      app: api\n",
        );
        let deployment = &out.nodes[1];
        assert_eq!(
            deployment.metadata.selector.as_ref().unwrap().get("app"),
            Some(&"api".to_string())
        );
    }

    #[test]
    fn test_chart_yaml() {
        let out = run(
            "/charts/web/Chart.yaml",
            "apiVersion: v2\nname: web\nversion: 1.0.0\n",
        );
        let chart = &out.nodes[1];
        assert_eq!(chart.label, "web");
        assert_eq!(chart.metadata.platform.as_deref(), Some("Helm"));
        assert_eq!(chart.metadata.chart_root.as_deref(), Some("/charts/web"));
    }

    #[test]
    fn test_helm_template_with_actions_still_gets_node() {
        let out = run(
            "/charts/web/templates/deploy.yaml",
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {{ .Release.Name }}\n",
        );
        // Template actions break YAML parsing; the doc still registers.
        let component = out
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::Component)
            .unwrap();
        assert_eq!(component.metadata.platform.as_deref(), Some("Helm"));
        assert_eq!(
            component.metadata.chart_root.as_deref(),
            Some("/charts/web")
        );
    }

    #[test]
    fn test_kustomization_resources() {
        let out = run(
            "/k/kustomization.yaml",
            "resources:\n  - ../k8s/deployment.yaml\n  - service\n",
        );
        let kustomize = &out.nodes[1];
        assert_eq!(kustomize.metadata.platform.as_deref(), Some("Kustomize"));
        assert_eq!(
            kustomize.metadata.resources.as_ref().unwrap(),
            &vec!["../k8s/deployment.yaml".to_string(), "service".to_string()]
        );
    }

    #[test]
    fn test_openapi_yaml_routes() {
        let out = run(
            "/api/openapi.yaml",
            "openapi: 3.0.0\npaths:\n  /users:\n    get:\n      operationId: listUsers\n    post:\n      operationId: createUser\n",
        );
        let routes: Vec<&Node> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::ApiRoute)
            .collect();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.label == "/users"));
    }
}
