//! Configuration primitives for thesisbase workspaces.
//!
//! Stored as TOML at `<workspace root>/config/config.toml`, where the root is
//! `THESISBASE_HOME` when set and the OS data directory otherwise.
//!
//! Every field carries a serde default so older or hand-trimmed config files
//! keep loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::citations::CitationStyle;

/// Standard file name of the config inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Slug of the project that was active last.
    #[serde(default)]
    pub last_active_project: Option<String>,
    /// Citation defaults for newly created projects.
    #[serde(default)]
    pub citations: CitationSettings,
    /// Knobs for document assembly and export.
    #[serde(default)]
    pub export: ExportSettings,
}

/// What happens to references a regenerated chapter no longer lists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaleReferencePolicy {
    /// Keep them; another chapter may still rely on the entry.
    #[default]
    Retain,
    /// Withdraw the chapter's usage and drop references nobody uses anymore.
    Prune,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitationSettings {
    #[serde(default)]
    pub default_style: CitationStyle,
    #[serde(default)]
    pub stale_references: StaleReferencePolicy,
}

impl Default for CitationSettings {
    fn default() -> Self {
        Self {
            default_style: CitationStyle::Apa,
            stale_references: StaleReferencePolicy::Retain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportSettings {
    /// Upper bound (ms) on a single figure payload fetch.
    #[serde(default = "default_image_fetch_timeout_ms")]
    pub image_fetch_timeout_ms: u64,
    /// Worker threads used to fetch figure payloads.
    #[serde(default = "default_max_parallel_image_fetches")]
    pub max_parallel_image_fetches: u32,
    /// Paragraph rendered for chapters without content.
    #[serde(default = "default_missing_content_text")]
    pub missing_content_text: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            image_fetch_timeout_ms: default_image_fetch_timeout_ms(),
            max_parallel_image_fetches: default_max_parallel_image_fetches(),
            missing_content_text: default_missing_content_text(),
        }
    }
}

const fn default_image_fetch_timeout_ms() -> u64 {
    10_000
}

const fn default_max_parallel_image_fetches() -> u32 {
    4
}

fn default_missing_content_text() -> String {
    "Content not available".to_string()
}

/// Returns the root directory where thesisbase stores data.
///
/// Order of precedence:
/// 1. `THESISBASE_HOME` environment variable.
/// 2. OS-specific data directory via `directories::BaseDirs`.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(path) = env::var("THESISBASE_HOME") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS data directory")?;
    Ok(base_dirs.data_dir().join("thesisbase"))
}

pub fn config_file_path_in(root: &Path) -> PathBuf {
    root.join("config").join(CONFIG_FILE_NAME)
}

/// Loads the configuration from `path` or returns defaults when it is absent.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&data)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(cfg)
}

/// Persists the configuration to `path`.
pub fn save_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
    }
    let data = toml::to_string_pretty(config)?;
    fs::write(path, data)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}
