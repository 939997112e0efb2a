//! Engine configuration.
//!
//! Operators configure the engine through a TOML file; every section and
//! field is optional:
//!
//! ```toml
//! [selection]
//! clear_on_filter_change = true
//!
//! [batch]
//! chunk_size = 25
//!
//! [[actions]]
//! id = "node_delete"
//! confirmation_required = true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::action::ActionPreset;
use crate::error::ConfigError;

/// Runtime configuration of the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Operator-curated action subset.
    #[serde(default)]
    pub actions: Vec<ActionPreset>,
}

/// Selection synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Reset the selection when exposed filter values change.
    pub clear_on_filter_change: bool,

    /// Filter keys that never count as a filter change (pager, sorting).
    pub ignored_filter_keys: Vec<String>,

    /// Materialize exclude-mode selections at render time when the result
    /// set has at most this many items, for an exact count. 0 disables it.
    pub eager_resolve_limit: usize,

    /// Maximum number of item labels listed in selection summaries.
    pub summary_label_limit: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            clear_on_filter_change: true,
            ignored_filter_keys: ["page", "items_per_page", "order", "sort"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            eager_resolve_limit: 0,
            summary_label_limit: 10,
        }
    }
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Always execute in chunks, whatever the selection size.
    pub force: bool,

    /// Items processed per batch step.
    pub chunk_size: usize,

    /// Resolved selections larger than this always run as a batch.
    pub threshold: usize,

    /// Page window used while materializing exclude-mode selections.
    pub resolve_page_size: usize,

    /// Maximum retained failure details per run.
    pub failure_detail_cap: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            force: false,
            chunk_size: 10,
            threshold: 50,
            resolve_page_size: 100,
            failure_detail_cap: 100,
        }
    }
}

/// Selection store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the file-backed store. Defaults to [`default_store_dir`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check values serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.chunk_size == 0 {
            return Err(ConfigError::Invalid("batch.chunk_size must be positive".to_string()));
        }
        if self.batch.resolve_page_size == 0 {
            return Err(ConfigError::Invalid(
                "batch.resolve_page_size must be positive".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for preset in &self.actions {
            if !seen.insert(preset.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "action '{}' configured twice",
                    preset.id
                )));
            }
        }
        Ok(())
    }

    /// Store directory, falling back to the platform data directory.
    pub fn store_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.dir {
            Some(dir) => Ok(dir.clone()),
            None => default_store_dir().ok_or(ConfigError::NoConfigDir),
        }
    }
}

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sweep"))
}

/// Get the path to the default config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("sweep.toml"))
}

/// Default directory of the file-backed selection store.
pub fn default_store_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sweep").join("selections"))
}
