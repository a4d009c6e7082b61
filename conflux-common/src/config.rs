//! Configuration loading and config-file resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `CONFLUX_CONFIG` environment variable
//! 3. Per-user config file (`<config dir>/conflux/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! An explicitly named file (1 or 2) that does not exist is an error. A missing
//! per-user file silently falls back to the compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CONFLUX_CONFIG";

/// Complete TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Identity-matching thresholds used by the reconciliation engine
    pub matching: MatchingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Identity-matching thresholds
///
/// Defaults reproduce the reference heuristics: fuzzy matching only applies to
/// strings longer than 8 characters, and both the length-difference ratio and
/// the normalized edit distance must stay below 0.15.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Strings whose shorter side has this many characters or fewer never fuzzy-match
    pub fuzzy_min_length: usize,
    /// Upper bound (exclusive) for `|len(a) - len(b)| / min(len)`
    pub max_length_ratio: f64,
    /// Upper bound (exclusive) for `levenshtein(a, b) / max(len)`
    pub max_edit_ratio: f64,
    /// Prefer the newly imported side when two records disagree on a field
    pub prefer_new: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_length: 8,
            max_length_ratio: 0.15,
            max_edit_ratio: 0.15,
            prefer_new: true,
        }
    }
}

impl MatchingConfig {
    /// Reject thresholds outside `(0.0, 1.0]`
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_length_ratio", self.max_length_ratio),
            ("max_edit_ratio", self.max_edit_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!(
                    "matching.{} must be in (0.0, 1.0], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Optional log file path (stderr when absent)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Where a resolved config file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// Resolve the config file path following the documented priority order
///
/// Returns `None` when no file is named and the per-user file does not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigSource::CommandLine));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), ConfigSource::Environment));
        }
    }

    // Priority 3: Per-user config file
    default_config_path()
        .filter(|path| path.exists())
        .map(|path| (path, ConfigSource::UserConfigDir))
}

/// Per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("conflux").join("config.toml"))
}

/// Load configuration following the documented priority order
///
/// Falls back to compiled defaults when no config file is available.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some((path, source)) => {
            if !path.exists() {
                return Err(Error::NotFound(format!(
                    "Config file {} (from {:?}) does not exist",
                    path.display(),
                    source
                )));
            }
            let config = load_toml_config(&path)?;
            info!(path = %path.display(), source = ?source, "Configuration loaded");
            Ok(config)
        }
        None => {
            debug!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Read and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.matching.validate()?;
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        warn!(path = %path.display(), error = %e, "Atomic rename failed, removing temp file");
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }
    Ok(())
}
