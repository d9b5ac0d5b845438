//! Bash / shell extraction (text-driven).
//!
//! Function definitions become Function nodes; invocations of the known
//! CLI tools (curl, wget, kubectl, docker, aws, gcloud) become Component
//! nodes referenced by the file.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::map::{Edge, EdgeType, Node, NodeMetadata, NodeType, node_id};
use crate::strategies::{StrategyContext, StrategyOutput};

static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:function\s+(\w+)\s*(?:\(\))?|(\w+)\s*\(\))\s*\{").unwrap()
});

static COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|[|&;(\s])(curl|wget|kubectl|docker|aws|gcloud)\s").unwrap());

pub fn analyze(ctx: &StrategyContext) -> StrategyOutput {
    let mut out = StrategyOutput::with_file(ctx);
    let file_id = out.file_id().to_string();

    for caps in FUNCTION_RE.captures_iter(ctx.source) {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let function = Node::new(
            "function",
            name,
            NodeType::Function,
            name,
            ctx.file_path,
            ctx.language.as_str(),
        );
        out.exports.insert(name.to_string(), function.id.clone());
        out.nodes.push(function);
    }

    let mut seen = Vec::new();
    for caps in COMMAND_RE.captures_iter(ctx.source) {
        let command = caps.get(1).unwrap().as_str();
        if seen.contains(&command) {
            continue;
        }
        seen.push(command);
        let node = Node {
            id: node_id("command", command, ctx.file_path, None),
            node_type: NodeType::Component,
            label: command.to_string(),
            file_path: ctx.file_path.to_string(),
            language: ctx.language.as_str().to_string(),
            code_snippet: None,
            metadata: NodeMetadata::default().with_extra("cliTool", true),
        };
        out.edges
            .push(Edge::new(&file_id, &node.id, EdgeType::References));
        out.nodes.push(node);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Language;

    fn run(source: &str) -> StrategyOutput {
        let ctx = StrategyContext {
            file_path: "/ops/deploy.sh",
            source,
            language: Language::Bash,
            tree: None,
        };
        analyze(&ctx)
    }

    #[test]
    fn test_function_forms() {
        let out = run("deploy() {\n  echo hi\n}\n\nfunction rollback {\n  echo bye\n}\n");
        let labels: Vec<&str> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Function)
            .map(|n| n.label.as_str())
            .collect();
        assert!(labels.contains(&"deploy"));
        assert!(labels.contains(&"rollback"));
    }

    #[test]
    fn test_cli_commands_deduped() {
        let out = run("kubectl apply -f a.yaml\nkubectl get pods\ncurl -s http://x\n");
        let commands: Vec<&str> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Component)
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(commands, vec!["kubectl", "curl"]);
        assert_eq!(
            out.edges
                .iter()
                .filter(|e| e.edge_type == EdgeType::References)
                .count(),
            2
        );
    }
}
