use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lint::LintSettings;

pub const CONFIG_FILE: &str = "tfsema.toml";

/// Global settings for tfsema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Provider schema files (`terraform providers schema -json` output),
    /// relative to the root module directory
    #[serde(default)]
    pub schemas: Vec<PathBuf>,
    /// Qualified block names under which every selected property resolves,
    /// e.g. `resource.aws_instance.tags`
    #[serde(default)]
    pub ignored_references: Vec<String>,
    /// Recursion limit for type inference
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    crate::infer::EngineOptions::default().max_depth
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schemas: Vec::new(),
            ignored_references: Vec::new(),
            max_depth: default_max_depth(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub lint: LintSettings,
}

impl Config {
    /// Schema paths resolved against the directory holding the config file.
    pub fn schema_paths(&self, base: &Path) -> Vec<PathBuf> {
        self.settings.schemas.iter().map(|s| base.join(s)).collect()
    }
}

/// Load `tfsema.toml` from `dir`, if present
pub fn load_config(dir: &Path) -> Result<Option<Config>> {
    load_config_from_path(&dir.join(CONFIG_FILE))
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(config))
}
