//! Bootstrap configuration loading and config file resolution
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config dir>/rk/listener.toml`)
//! 4. Built-in defaults (no file)
//!
//! A missing file is not an error; the built-in defaults apply. A file that
//! exists but cannot be parsed is reported.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RK_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup. The process must restart to pick up changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Real-time channel URL
    pub ws_url: String,
    /// Base URL of the REST control API
    pub api_base_url: String,
    /// HTTP audio stream endpoint
    pub stream_url: String,
    pub reconnect: ReconnectToml,
    pub playback: PlaybackToml,
    pub display: DisplayToml,
    pub logging: LoggingConfig,
}

/// Reconnect backoff settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectToml {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub growth_factor: f64,
    pub jitter_max_ms: u64,
}

/// Local playback settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackToml {
    /// Volume used until the first server state arrives (0.0-1.0)
    pub initial_volume: f32,
    /// Local position sampling interval
    pub position_sample_ms: u64,
    /// Whether the output may start without a user gesture
    pub autoplay: bool,
}

/// Display timing settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayToml {
    /// How long a donation preview stays visible
    pub donation_preview_ms: u64,
    /// How long transient notices stay visible
    pub notice_ttl_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080/ws".to_string(),
            api_base_url: "http://localhost:8080".to_string(),
            stream_url: "http://localhost:8080/stream".to_string(),
            reconnect: ReconnectToml::default(),
            playback: PlaybackToml::default(),
            display: DisplayToml::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ReconnectToml {
    fn default() -> Self {
        Self {
            min_delay_ms: 600,
            max_delay_ms: 6000,
            growth_factor: 1.6,
            jitter_max_ms: 250,
        }
    }
}

impl Default for PlaybackToml {
    fn default() -> Self {
        Self {
            initial_volume: 0.8,
            position_sample_ms: 250,
            autoplay: true,
        }
    }
}

impl Default for DisplayToml {
    fn default() -> Self {
        Self {
            donation_preview_ms: 6000,
            notice_ttl_ms: 4500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse config text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the config file and load it, falling back to defaults
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            Some(path) if cli_arg.is_some() => Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            ))),
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Config file resolution
///
/// Returns the first candidate by priority. The returned path is not
/// guaranteed to exist.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path()
}

/// Default config file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rk").join("listener.toml"))
}
