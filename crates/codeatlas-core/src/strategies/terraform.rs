//! Terraform extraction (text-driven).
//!
//! `provider`, `resource`, and `module` blocks become Component nodes.
//! Module blocks whose `source` is a local path emit a REFERENCES edge
//! carrying the raw source string; the Terraform linkage pass later rewrites
//! it when a matching File node exists.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};
use crate::textscan::{matching_brace, next_open_brace};

static PROVIDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*provider\s+"([^"]+)"\s*\{"#).unwrap());

static RESOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*resource\s+"([^"]+)"\s+"([^"]+)"\s*\{"#).unwrap());

static MODULE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*module\s+"([^"]+)"\s*\{"#).unwrap());

static SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"source\s*=\s*"([^"]+)""#).unwrap());

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);

    for caps in PROVIDER_RE.captures_iter(ctx.source) {
        let name = caps.get(1).unwrap().as_str();
        let label = format!("provider:{}", name);
        out.nodes.push(Node {
            id: node_id("tf-provider", name, ctx.file_path, None),
            node_type: NodeType::Component,
            label,
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: block_text(ctx.source, caps.get(0).unwrap().start()),
            metadata: NodeMetadata {
                platform: Some("Terraform".to_string()),
                ..NodeMetadata::default()
            },
        });
    }

    for caps in RESOURCE_RE.captures_iter(ctx.source) {
        let resource_type = caps.get(1).unwrap().as_str();
        let name = caps.get(2).unwrap().as_str();
        let label = format!("{}.{}", resource_type, name);
        out.nodes.push(Node {
            id: node_id("tf-resource", &label, ctx.file_path, None),
            node_type: NodeType::Component,
            label,
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: block_text(ctx.source, caps.get(0).unwrap().start()),
            metadata: NodeMetadata {
                platform: Some("Terraform".to_string()),
                resource_type: Some(resource_type.to_string()),
                resource_name: Some(name.to_string()),
                ..NodeMetadata::default()
            },
        });
    }

    for caps in MODULE_RE.captures_iter(ctx.source) {
        let name = caps.get(1).unwrap().as_str();
        let label = format!("module:{}", name);
        let block = block_text(ctx.source, caps.get(0).unwrap().start());
        let source = block
            .as_deref()
            .and_then(|b| SOURCE_RE.captures(b))
            .map(|c| c.get(1).unwrap().as_str().to_string());

        let node = Node {
            id: node_id("tf-module", name, ctx.file_path, None),
            node_type: NodeType::Component,
            label,
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: block,
            metadata: NodeMetadata {
                platform: Some("Terraform".to_string()),
                resource_name: Some(name.to_string()),
                ..NodeMetadata::default()
            },
        };

        // Local module sources resolve against neighbour files later.
        if let Some(source) = source {
            if source.starts_with('.') || source.starts_with('/') {
                out.edges
                    .push(Edge::new(&node.id, &source, EdgeType::References));
            }
        }
        out.nodes.push(node);
    }

    out
}

/// Full block text from the keyword through the balanced closing brace.
fn block_text(source: &str, start: usize) -> Option<String> {
    let open = next_open_brace(source, start)?;
    let close = matching_brace(source, open)?;
    Some(source[start..=close].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Language;

    fn run(path: &str, source: &str) -> StrategyOutput {
        let ctx = StrategyContext {
            file_path: path,
            source,
            language: Language::Terraform,
            tree: None,
        };
        analyze(&ctx)
    }

    #[test]
    fn test_provider_resource_module() {
        let out = run(
            "/infra/main.tf",
            "provider \"aws\" {\n  region = \"us-east-1\"\n}\n\nresource \"aws_instance\" \"web\" {\n  ami = \"ami-123\"\n}\n\nmodule \"vpc\" {\n  source = \"./modules/vpc\"\n}\n",
        );
        let labels: Vec<&str> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Component)
            .map(|n| n.label.as_str())
            .collect();
        assert!(labels.contains(&"provider:aws"));
        assert!(labels.contains(&"aws_instance.web"));
        assert!(labels.contains(&"module:vpc"));
    }

    #[test]
    fn test_local_module_source_edge() {
        let out = run(
            "/infra/main.tf",
            "module \"mod\" {\n  source = \"./modules/mod\"\n}\n",
        );
        let edge = out
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::References)
            .unwrap();
        assert_eq!(edge.target_id, "./modules/mod");
    }

    #[test]
    fn test_registry_module_source_is_not_referenced() {
        let out = run(
            "/infra/main.tf",
            "module \"vpc\" {\n  source = \"terraform-aws-modules/vpc/aws\"\n}\n",
        );
        assert!(out.edges.is_empty());
    }

    #[test]
    fn test_resource_metadata() {
        let out = run(
            "/infra/db.tf",
            "resource \"aws_db_instance\" \"main\" {\n  engine = \"postgres\"\n}\n",
        );
        let resource = &out.nodes[1];
        assert_eq!(
            resource.metadata.resource_type.as_deref(),
            Some("aws_db_instance")
        );
        assert_eq!(resource.metadata.resource_name.as_deref(), Some("main"));
    }
}
