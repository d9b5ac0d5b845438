//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.codeatlas/config.toml`
//! 2. Local config: `.codeatlas/config.toml` (in the project)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::{AtlasConfig, ConfigError, ConfigOverrides};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, global and local.
const CONFIG_DIR: &str = ".codeatlas";

/// Configuration loader with inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.codeatlas`)
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.codeatlas`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a project root.
    pub fn local_config_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a project with optional CLI overrides.
    ///
    /// Merges config in order: defaults -> global -> local -> overrides.
    pub fn load(
        &self,
        project_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<AtlasConfig, ConfigError> {
        let mut config = AtlasConfig::default();

        if let Some(global) = self.load_optional(self.global_config_path().as_deref())? {
            config = config.merged_with(global);
        }
        if let Some(local) =
            self.load_optional(Some(&self.local_config_path(project_root)))?
        {
            config = config.merged_with(local);
        }
        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }

        config.validate()?;
        Ok(config)
    }

    fn load_optional(&self, path: Option<&Path>) -> Result<Option<AtlasConfig>, ConfigError> {
        let Some(path) = path else {
            debug!("no home directory found, skipping global config");
            return Ok(None);
        };
        if !path.exists() {
            trace!("config not found at {:?}", path);
            return Ok(None);
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config =
            toml::from_str(&text).map_err(|e| ConfigError::parse_toml(path, e))?;
        debug!("loaded config from {:?}", path);
        Ok(Some(config))
    }
}
