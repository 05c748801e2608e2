//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$DIGESTNORM_CONFIG` (environment variable)
//! 2. `~/.config/digestnorm/config.toml` (Linux/macOS)
//!    `%APPDATA%\digestnorm\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! This file only holds run settings. The alias table, artifact denylist and
//! spam signal set are separate, strictly validated tables (see
//! [`TablesConfig`]).

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default digest delimiter written by the MHonArc export of the archive.
pub const DEFAULT_DELIMITER: &str =
    r"^From cypherpunks@MHonArc\.venona\s+Wed Dec 17 23:17:14 2003$";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Input discovery and parsing settings.
    pub pipeline: PipelineConfig,
    /// Overrides for the static tables embedded in the binary.
    pub tables: TablesConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Input discovery and parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the yearly archive files.
    pub input_dir: PathBuf,
    /// Directory receiving the `parsed/`, `cleaned/` and `filtered/` snapshots.
    pub output_dir: PathBuf,
    /// Archive file name prefix (e.g. `cyp-` for `cyp-1994.txt`).
    pub file_prefix: String,
    /// Archive file extension without the dot.
    pub file_extension: String,
    /// Regex matching a whole delimiter line.
    pub delimiter: String,
    /// Encoding label used when a file is not valid UTF-8.
    pub fallback_encoding: String,
    /// Bodies shorter than this many characters get the `empty-body` flag.
    pub empty_body_threshold: usize,
}

/// Optional paths replacing the embedded static tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Sender alias table (TOML).
    pub aliases: Option<PathBuf>,
    /// Artifact denylist (TOML).
    pub denylist: Option<PathBuf>,
    /// Spam signal set (TOML).
    pub spam_signals: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("archive"),
            output_dir: PathBuf::from("out"),
            file_prefix: "cyp-".to_string(),
            file_extension: "txt".to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            fallback_encoding: "windows-1252".to_string(),
            empty_body_threshold: 10,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load the app configuration from its standard location.
///
/// A missing file means defaults. An unreadable or invalid file is logged
/// and also means defaults; only the static tables are strict.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load the app configuration from `path`, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|contents| toml::from_str::<Config>(&contents).map_err(|e| e.to_string()));
    match parsed {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                %error,
                "Unusable config file, running with defaults"
            );
            Config::default()
        }
    }
}

/// Write `config` to the standard location and return the path written.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path().context("no config directory on this platform")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&path, toml::to_string_pretty(config)?)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("DIGESTNORM_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("digestnorm").join("config.toml"))
}

/// Return the cache directory used for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("digestnorm")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("digestnorm.log")
}
