//! File Discovery
//!
//! Enumerates analyzable files under a project root, honoring include and
//! exclude glob patterns plus per-file size and total count budgets. The
//! extension whitelist is the closed language table from [`crate::parser`];
//! files whose basename begins with `Dockerfile` are always candidates.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::parser::Language;

/// Errors during file discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("project root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default exclude patterns applied when the caller supplies none.
pub fn default_excludes() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/dist/**",
        "**/build/**",
        "**/.git/**",
        "**/target/**",
        "**/bin/**",
        "**/obj/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Discovery budgets and filters.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Include glob patterns (default `["**/*"]`)
    pub include: Vec<String>,
    /// Exclude glob patterns
    pub exclude: Vec<String>,
    /// Cap on analyzed files after filtering
    pub max_files: Option<usize>,
    /// Per-file size cap in kilobytes
    pub max_file_size_kb: Option<u64>,
    /// Explicit file list; bypasses glob discovery entirely
    pub only_files: Option<Vec<PathBuf>>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            include: vec!["**/*".to_string()],
            exclude: default_excludes(),
            max_files: None,
            max_file_size_kb: None,
            only_files: None,
        }
    }
}

/// File discovery service.
pub struct FileDiscovery {
    options: DiscoveryOptions,
}

impl FileDiscovery {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self { options }
    }

    /// Enumerate files to analyze, absolute and sorted.
    ///
    /// With `only_files` set, entries are used verbatim (root-relative paths
    /// are anchored at the root) and only existence-checked. Otherwise the
    /// walk applies include globs, the language whitelist, exclude globs,
    /// and the size/count budgets, in that order.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
        let root = root
            .canonicalize()
            .map_err(|_| DiscoveryError::RootNotFound(root.to_path_buf()))?;

        if let Some(only) = &self.options.only_files {
            let mut files = Vec::new();
            for entry in only {
                let path = if entry.is_absolute() {
                    entry.clone()
                } else {
                    root.join(entry)
                };
                if path.is_file() {
                    files.push(path);
                } else {
                    warn!("listed file not found, skipping: {}", path.display());
                }
            }
            files.sort();
            return Ok(files);
        }

        let include = build_glob_set(&self.options.include);
        let exclude = build_glob_set(&self.options.exclude);

        let mut files = Vec::new();
        let mut oversized = 0usize;

        let walker = WalkBuilder::new(&root)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("walk error: {}", e);
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();

            // Only files in the closed language table (plus Dockerfile*).
            if Language::from_path(path).is_none() {
                continue;
            }

            let rel = path.strip_prefix(&root).unwrap_or(path);
            if !include.is_match(rel) && !include.is_match(path) {
                continue;
            }
            if exclude.is_match(rel) || exclude.is_match(path) {
                continue;
            }

            if let Some(max_kb) = self.options.max_file_size_kb {
                match entry.metadata() {
                    Ok(meta) if meta.len() > max_kb * 1024 => {
                        oversized += 1;
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("metadata error for {}: {}", path.display(), e);
                        continue;
                    }
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();

        if oversized > 0 {
            info!("skipped {} files over the size budget", oversized);
        }

        if let Some(max) = self.options.max_files {
            if files.len() > max {
                info!("capping discovery at {} of {} files", max, files.len());
                files.truncate(max);
            }
        }

        Ok(files)
    }
}

fn build_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("invalid glob pattern '{}': {}", pattern, e),
        }
    }
    builder
        .build()
        .unwrap_or_else(|_| GlobSetBuilder::new().build().expect("empty glob set"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_discovers_supported_extensions_only() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/app.ts", "export {}");
        touch(tmp.path(), "notes.txt", "ignored");
        touch(tmp.path(), "Dockerfile", "FROM scratch");

        let discovery = FileDiscovery::new(DiscoveryOptions::default());
        let files = discovery.discover(tmp.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert!(names.contains(&"app.ts".to_string()));
        assert!(names.contains(&"Dockerfile".to_string()));
        assert!(!names.contains(&"notes.txt".to_string()));
    }

    #[test]
    fn test_exclude_patterns() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/app.ts", "export {}");
        touch(tmp.path(), "node_modules/lib/index.js", "module.exports = {}");

        let discovery = FileDiscovery::new(DiscoveryOptions::default());
        let files = discovery.discover(tmp.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/app.ts"));
    }

    #[test]
    fn test_max_file_size_budget() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "big.py", &"# pad\n".repeat(4096));
        touch(tmp.path(), "small.py", "x = 1\n");

        let discovery = FileDiscovery::new(DiscoveryOptions {
            max_file_size_kb: Some(1),
            ..DiscoveryOptions::default()
        });
        let files = discovery.discover(tmp.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.py"));
    }

    #[test]
    fn test_max_files_cap() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            touch(tmp.path(), &format!("f{}.py", i), "x = 1\n");
        }

        let discovery = FileDiscovery::new(DiscoveryOptions {
            max_files: Some(2),
            ..DiscoveryOptions::default()
        });
        let files = discovery.discover(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_only_files_bypasses_globs() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.py", "x = 1\n");
        touch(tmp.path(), "b.py", "y = 2\n");

        let discovery = FileDiscovery::new(DiscoveryOptions {
            only_files: Some(vec![PathBuf::from("a.py")]),
            ..DiscoveryOptions::default()
        });
        let files = discovery.discover(tmp.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.py"));
    }

    #[test]
    fn test_missing_root_errors() {
        let discovery = FileDiscovery::new(DiscoveryOptions::default());
        let result = discovery.discover(Path::new("/definitely/not/a/real/root"));
        assert!(matches!(result, Err(DiscoveryError::RootNotFound(_))));
    }
}
