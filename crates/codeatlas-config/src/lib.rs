//! CodeAtlas configuration: the analysis record plus TOML loading with
//! global -> local -> CLI override merging.

use std::path::PathBuf;

use serde::Deserialize;

use codeatlas_core::{AnalysisOptions, DiscoveryOptions, InteractionRule};

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

/// The analysis configuration record.
///
/// Field names match the serialized form consumed by the pipeline's
/// callers; unknown keys are rejected so typos fail loudly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtlasConfig {
    /// Include glob patterns (default `["**/*"]`)
    #[serde(default)]
    pub include: Option<Vec<String>>,

    /// Exclude glob patterns (defaults exclude node_modules, dist, build,
    /// .git, target, bin, obj)
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// Cap on analyzed files after filtering
    #[serde(rename = "maxFiles", default)]
    pub max_files: Option<usize>,

    /// Per-file size cap in kilobytes
    #[serde(rename = "maxFileSizeKB", default)]
    pub max_file_size_kb: Option<u64>,

    /// Worker count (default 4, clamped to [1, 32])
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Explicit file list; bypasses glob discovery
    #[serde(rename = "onlyFiles", default)]
    pub only_files: Option<Vec<PathBuf>>,

    /// Frontend/backend pairing rules for API call synthesis
    #[serde(rename = "interactionRules", default)]
    pub interaction_rules: Vec<InteractionRule>,

    /// Fail the run on parse errors (after the pipeline completes)
    #[serde(default)]
    pub strict: Option<bool>,

    /// Log discovery limits and per-language counts
    #[serde(default)]
    pub diagnostics: Option<bool>,
}

/// CLI-level overrides applied on top of file configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub max_files: Option<usize>,
    pub max_file_size_kb: Option<u64>,
    pub concurrency: Option<usize>,
    pub only_files: Option<Vec<PathBuf>>,
    pub strict: Option<bool>,
    pub diagnostics: Option<bool>,
}

impl AtlasConfig {
    /// Merge another config over this one; set fields win.
    pub fn merged_with(mut self, other: AtlasConfig) -> AtlasConfig {
        if other.include.is_some() {
            self.include = other.include;
        }
        if other.exclude.is_some() {
            self.exclude = other.exclude;
        }
        if other.max_files.is_some() {
            self.max_files = other.max_files;
        }
        if other.max_file_size_kb.is_some() {
            self.max_file_size_kb = other.max_file_size_kb;
        }
        if other.concurrency.is_some() {
            self.concurrency = other.concurrency;
        }
        if other.only_files.is_some() {
            self.only_files = other.only_files;
        }
        if !other.interaction_rules.is_empty() {
            self.interaction_rules = other.interaction_rules;
        }
        if other.strict.is_some() {
            self.strict = other.strict;
        }
        if other.diagnostics.is_some() {
            self.diagnostics = other.diagnostics;
        }
        self
    }

    /// Apply CLI overrides in place.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(include) = &overrides.include {
            self.include = Some(include.clone());
        }
        if let Some(exclude) = &overrides.exclude {
            self.exclude = Some(exclude.clone());
        }
        if overrides.max_files.is_some() {
            self.max_files = overrides.max_files;
        }
        if overrides.max_file_size_kb.is_some() {
            self.max_file_size_kb = overrides.max_file_size_kb;
        }
        if overrides.concurrency.is_some() {
            self.concurrency = overrides.concurrency;
        }
        if let Some(only_files) = &overrides.only_files {
            self.only_files = Some(only_files.clone());
        }
        if overrides.strict.is_some() {
            self.strict = overrides.strict;
        }
        if overrides.diagnostics.is_some() {
            self.diagnostics = overrides.diagnostics;
        }
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::invalid_value(
                "concurrency",
                "must be at least 1",
            ));
        }
        if self.max_file_size_kb == Some(0) {
            return Err(ConfigError::invalid_value(
                "maxFileSizeKB",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Convert into the options record the pipeline consumes.
    pub fn to_analysis_options(&self) -> AnalysisOptions {
        let defaults = DiscoveryOptions::default();
        AnalysisOptions {
            discovery: DiscoveryOptions {
                include: self.include.clone().unwrap_or(defaults.include),
                exclude: self.exclude.clone().unwrap_or(defaults.exclude),
                max_files: self.max_files,
                max_file_size_kb: self.max_file_size_kb,
                only_files: self.only_files.clone(),
            },
            concurrency: self.concurrency,
            interaction_rules: self.interaction_rules.clone(),
            strict: self.strict.unwrap_or(false),
            diagnostics: self.diagnostics.unwrap_or(false),
            generated_at: None,
        }
    }
}
