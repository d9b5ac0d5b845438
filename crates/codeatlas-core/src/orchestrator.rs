//! Pipeline Orchestrator
//!
//! Drives the full analysis: discovery, parallel per-file extraction,
//! merge, linkage passes, APIRoute dedup, code quality, deterministic
//! sorting, and metadata stamping.
//!
//! Extraction runs on a worker pool sized from the configuration (default
//! 4, clamped to [1, 32]); each worker owns its parser provider. The merge
//! and every post-pass run single-threaded so output is independent of
//! worker interleaving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::discovery::{DiscoveryError, DiscoveryOptions, FileDiscovery};
use crate::interactions::{run_passes, AnalysisState, InteractionRule};
use crate::map::{normalize_path, CodeMap, Node, NodeType, GENERATOR, MAP_VERSION};
use crate::parser::{Language, ParserProvider};
use crate::quality;
use crate::strategies::{self, StrategyContext, StrategyOutput};

const DEFAULT_CONCURRENCY: usize = 4;
const MAX_CONCURRENCY: usize = 32;

// ============================================================================
// Options
// ============================================================================

/// Analysis configuration consumed by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub discovery: DiscoveryOptions,
    /// Worker count (default 4, clamped to [1, 32])
    pub concurrency: Option<usize>,
    /// Frontend/backend pairing rules for API call synthesis
    pub interaction_rules: Vec<InteractionRule>,
    /// Promote parse errors to a failed run (after the pipeline completes)
    pub strict: bool,
    /// Log discovery limits and per-language counts
    pub diagnostics: bool,
    /// Pinned generation timestamp; `None` stamps the current time
    pub generated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Report
// ============================================================================

/// The finished map plus run bookkeeping.
pub struct PipelineReport {
    pub map: CodeMap,
    pub files_analyzed: usize,
    /// Per-file parse failures (strict mode turns these into a failed exit)
    pub parse_errors: Vec<String>,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    options: AnalysisOptions,
}

/// One file's extraction result, produced on a worker.
struct FileResult {
    output: StrategyOutput,
    file_path: String,
    parse_error: Option<String>,
}

impl Pipeline {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    /// Run the full pipeline over a project root.
    pub fn run(&self, root: &Path) -> Result<PipelineReport, PipelineError> {
        let canonical_root = root.canonicalize()?;

        // Discover.
        let discovery = FileDiscovery::new(self.options.discovery.clone());
        let files = discovery.discover(&canonical_root)?;
        info!("discovered {} files under {}", files.len(), root.display());

        if self.options.diagnostics {
            self.log_diagnostics(&files);
        }

        // Parallel extract. Worker results come back in file order, so the
        // merge is deterministic regardless of scheduling.
        let concurrency = self
            .options
            .concurrency
            .unwrap_or(DEFAULT_CONCURRENCY)
            .clamp(1, MAX_CONCURRENCY);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .build()
            .expect("worker pool");

        let results: Vec<Option<FileResult>> = pool.install(|| {
            files
                .par_iter()
                .map_init(ParserProvider::new, |provider, path| {
                    process_file(provider, path)
                })
                .collect()
        });

        // Merge.
        let mut state = AnalysisState::new(canonical_root.clone());
        let mut parse_errors = Vec::new();
        let mut files_analyzed = 0usize;
        for result in results.into_iter().flatten() {
            files_analyzed += 1;
            if files_analyzed % 100 == 0 {
                debug!("merged {} files", files_analyzed);
            }
            if let Some(error) = result.parse_error {
                parse_errors.push(error);
            }
            state.nodes.extend(result.output.nodes);
            state.edges.extend(result.output.edges);
            if !result.output.exports.is_empty() {
                state
                    .exports
                    .entry(result.file_path.clone())
                    .or_default()
                    .extend(result.output.exports);
            }
            state.calls.extend(result.output.calls);
        }
        info!(
            "merged {} files: {} nodes, {} edges",
            files_analyzed,
            state.nodes.len(),
            state.edges.len()
        );

        // Linkage passes, in contract order.
        run_passes(&mut state, &self.options.interaction_rules);

        // Collapse duplicate APIRoute nodes.
        dedupe_api_routes(&mut state);

        // Statistics over the finalized map.
        let statistics = quality::analyze(&state.nodes, &state.edges);

        // Deterministic emission order.
        dedupe_edges(&mut state);
        let mut map = CodeMap {
            version: MAP_VERSION.to_string(),
            generated_at: self
                .options
                .generated_at
                .unwrap_or_else(Utc::now)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            generator: GENERATOR.to_string(),
            commit: head_commit(&canonical_root),
            nodes: state.nodes,
            edges: state.edges,
            statistics,
        };
        map.sort();

        info!(
            "map complete: {} nodes, {} edges, {} parse errors",
            map.nodes.len(),
            map.edges.len(),
            parse_errors.len()
        );

        Ok(PipelineReport {
            map,
            files_analyzed,
            parse_errors,
        })
    }

    fn log_diagnostics(&self, files: &[PathBuf]) {
        info!(
            "limits: maxFiles={:?} maxFileSizeKB={:?} concurrency={:?}",
            self.options.discovery.max_files,
            self.options.discovery.max_file_size_kb,
            self.options.concurrency,
        );
        let mut by_language: HashMap<&'static str, usize> = HashMap::new();
        for file in files {
            let tag = Language::from_path(file).map(|l| l.as_str()).unwrap_or("Unknown");
            *by_language.entry(tag).or_insert(0) += 1;
        }
        let mut counts: Vec<_> = by_language.into_iter().collect();
        counts.sort();
        for (language, count) in counts {
            info!("  {}: {} files", language, count);
        }
    }
}

/// Read, parse, and run the matching strategy for one file. Returns `None`
/// only when the file cannot be read (skip policy).
fn process_file(provider: &mut ParserProvider, path: &Path) -> Option<FileResult> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            warn!("skipping unreadable file {}: {}", path.display(), error);
            return None;
        }
    };
    let file_path = normalize_path(&path.to_string_lossy());

    let Some(language) = Language::from_path(path) else {
        // Unknown language (possible via onlyFiles): File node only.
        let mut output = StrategyOutput::default();
        output.nodes.push(Node::file(&file_path, "Unknown"));
        return Some(FileResult {
            output,
            file_path,
            parse_error: None,
        });
    };

    let parsed = provider.parse(path, &source);
    let tree = parsed.as_ref().and_then(|p| p.tree.as_ref());
    let parse_error = if language.grammar().is_some() && tree.is_none() {
        Some(format!("{}: parse failed", file_path))
    } else {
        None
    };

    let ctx = StrategyContext {
        file_path: &file_path,
        source: &source,
        language,
        tree,
    };
    let mut output = strategies::analyze(&ctx);

    // Call sites carry the caller file for the linkage pass.
    for call in &mut output.calls {
        call.caller_file = file_path.clone();
    }

    Some(FileResult {
        output,
        file_path,
        parse_error,
    })
}

/// Collapse APIRoute duplicates keyed by `(filePath, label, httpMethod)`.
/// The first node by encounter order survives; edges touching dropped
/// duplicates are rewritten to the survivor.
fn dedupe_api_routes(state: &mut AnalysisState) {
    let mut survivors: HashMap<(String, String, String), String> = HashMap::new();
    let mut rewrites: HashMap<String, String> = HashMap::new();

    state.nodes.retain(|node| {
        if node.node_type != NodeType::ApiRoute {
            return true;
        }
        let key = (
            node.file_path.clone(),
            node.label.clone(),
            node.metadata.http_method.clone().unwrap_or_default(),
        );
        match survivors.get(&key) {
            Some(survivor) => {
                rewrites.insert(node.id.clone(), survivor.clone());
                false
            }
            None => {
                survivors.insert(key, node.id.clone());
                true
            }
        }
    });

    if rewrites.is_empty() {
        return;
    }
    debug!("collapsed {} duplicate API routes", rewrites.len());
    for edge in &mut state.edges {
        if let Some(survivor) = rewrites.get(&edge.source_id) {
            edge.source_id = survivor.clone();
        }
        if let Some(survivor) = rewrites.get(&edge.target_id) {
            edge.target_id = survivor.clone();
        }
    }
}

/// Drop exact duplicate edges, keeping first occurrences.
fn dedupe_edges(state: &mut AnalysisState) {
    let mut seen = std::collections::HashSet::new();
    state
        .edges
        .retain(|edge| seen.insert((edge.source_id.clone(), edge.target_id.clone(), edge.edge_type)));
}

/// Best-effort HEAD commit; silently omitted when unavailable.
fn head_commit(root: &Path) -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(root)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Edge, EdgeType, NodeMetadata};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn run(root: &Path) -> PipelineReport {
        Pipeline::new(AnalysisOptions::default()).run(root).unwrap()
    }

    #[test]
    fn test_every_file_contributes_a_file_node() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.py", "def f():\n    pass\n");
        write(tmp.path(), "b.sql", "CREATE TABLE t (id int);");
        write(tmp.path(), "c.yaml", "key: value\n");

        let report = run(tmp.path());
        let file_count = report
            .map
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::File)
            .count();
        assert_eq!(file_count, 3);
        assert_eq!(report.files_analyzed, 3);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "x.ts", "export function a() { b(); }\nexport function b() {}\n");
        write(tmp.path(), "y.py", "import os\n\ndef main():\n    pass\n");
        write(
            tmp.path(),
            "k8s.yaml",
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: s\nspec:\n  selector:\n    app: web\n",
        );

        let pinned = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let options = AnalysisOptions {
            generated_at: Some(pinned),
            ..AnalysisOptions::default()
        };
        let first = Pipeline::new(options.clone()).run(tmp.path()).unwrap();
        let second = Pipeline::new(options).run(tmp.path()).unwrap();

        let a = serde_json::to_string(&first.map).unwrap();
        let b = serde_json::to_string(&second.map).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_routes_collapse_and_rewrite_edges() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let route_a = Node {
            id: "route-a".to_string(),
            node_type: NodeType::ApiRoute,
            label: "/users".to_string(),
            file_path: "/repo/s.js".to_string(),
            language: "JavaScript".to_string(),
            code_snippet: None,
            metadata: NodeMetadata::route("Express", Some("get")),
        };
        let mut route_b = route_a.clone();
        route_b.id = "route-b".to_string();
        state.nodes.extend([route_a, route_b]);
        state
            .edges
            .push(Edge::new("caller", "route-b", EdgeType::ApiCall));

        dedupe_api_routes(&mut state);
        assert_eq!(state.nodes.len(), 1);
        assert_eq!(state.edges[0].target_id, "route-a");
    }

    #[test]
    fn test_distinct_methods_survive_dedup() {
        let mut state = AnalysisState::new(PathBuf::from("/repo"));
        let get = Node {
            id: "route-get".to_string(),
            node_type: NodeType::ApiRoute,
            label: "/users".to_string(),
            file_path: "/repo/route.ts".to_string(),
            language: "TypeScript".to_string(),
            code_snippet: None,
            metadata: NodeMetadata::route("Next.js", Some("GET")),
        };
        let mut post = get.clone();
        post.id = "route-post".to_string();
        post.metadata.http_method = Some("POST".to_string());
        state.nodes.extend([get, post]);

        dedupe_api_routes(&mut state);
        assert_eq!(state.nodes.len(), 2);
    }

    #[test]
    fn test_strict_reportable_parse_errors_default_empty() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ok.py", "x = 1\n");
        let report = run(tmp.path());
        assert!(report.parse_errors.is_empty());
    }
}
