//! Configuration loading for the audio merger
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are handled by the binary's clap parser. This module owns
//! tiers 3 and 4.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config directory
pub const CONFIG_DIR_NAME: &str = "amrg";

/// Config file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; an absent field falls through to the compiled
/// default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind, e.g. "127.0.0.1"
    pub bind_address: Option<String>,

    /// HTTP server port
    pub port: Option<u16>,

    /// Upper bound on a merge request body in MiB (unbounded when absent)
    pub max_upload_mb: Option<u64>,

    /// Download name used when no title is supplied
    pub default_file_name: Option<String>,

    /// Number of progress events buffered per SSE subscriber
    pub event_capacity: Option<usize>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: CompiledDefaults::LOG_LEVEL.to_string(),
        }
    }
}

/// Compiled fallback values used when neither CLI, ENV nor TOML set a value
#[derive(Debug, Clone, Copy)]
pub struct CompiledDefaults;

impl CompiledDefaults {
    pub const BIND_ADDRESS: &'static str = "127.0.0.1";
    pub const PORT: u16 = 5780;
    pub const DEFAULT_FILE_NAME: &'static str = "merged_audio.mp3";
    pub const EVENT_CAPACITY: usize = 100;
    pub const LOG_LEVEL: &'static str = "info";
}

/// Locate the TOML config file for this platform
///
/// Checks the user config directory first (`~/.config/amrg/config.toml` on
/// Linux), then `/etc/amrg/config.toml` on Linux. Returns `None` when neither
/// exists.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. A file that exists but cannot be read is [`Error::Io`]; one
/// that does not parse is [`Error::Config`].
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        warn!("Read TOML failed ({}): {}", path.display(), e);
        Error::Io(e)
    })?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load configuration from an explicit path or the platform search locations
///
/// With no explicit path and no file on disk, compiled defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match explicit {
        Some(path) => load_toml_config(path),
        None => match find_config_file() {
            Some(path) => load_toml_config(&path),
            None => {
                info!("No config file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        },
    }
}
