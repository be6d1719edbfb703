//! Configuration loading and config file resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`FOCUS_ARBITER_CONFIG`)
//! 3. User config directory (`<config_dir>/focus-arbiter/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A file named explicitly (1 or 2) must exist. A missing file at 3 falls
//! through to compiled defaults with a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FOCUS_ARBITER_CONFIG";

/// Directory name under the platform config directory
const CONFIG_DIR_NAME: &str = "focus-arbiter";

/// Focus arbitration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Multiplier applied to both channels when a session is ducked
    #[serde(default = "default_duck_factor")]
    pub duck_factor: f32,

    /// Capacity of the focus event bus
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_duck_factor() -> f32 {
    0.5
}

fn default_event_bus_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            duck_factor: default_duck_factor(),
            event_bus_capacity: default_event_bus_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FocusConfig {
    /// Parse and validate a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FocusConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.duck_factor > 0.0 && self.duck_factor <= 1.0) {
            return Err(Error::Config(format!(
                "duck_factor must be in (0.0, 1.0], got {}",
                self.duck_factor
            )));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config(
                "event_bus_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserConfigDir(PathBuf),
    CompiledDefaults,
}

/// Resolves the active configuration following the documented priority order
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
    user_config_dir: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create a resolver using the platform config directory
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self {
            cli_path,
            user_config_dir: dirs::config_dir(),
        }
    }

    /// Override the platform config directory (used by tests)
    pub fn with_user_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_config_dir = dir;
        self
    }

    /// Locate the config file to use, if any
    pub fn locate(&self) -> ConfigSource {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return ConfigSource::CommandLine(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }

        // Priority 3: User config directory
        if let Some(dir) = &self.user_config_dir {
            let path = dir.join(CONFIG_DIR_NAME).join("config.toml");
            if path.exists() {
                return ConfigSource::UserConfigDir(path);
            }
        }

        // Priority 4: Compiled defaults
        ConfigSource::CompiledDefaults
    }

    /// Resolve and load the configuration
    pub fn resolve(&self) -> Result<(FocusConfig, ConfigSource)> {
        let source = self.locate();
        let config = match &source {
            ConfigSource::CommandLine(path) | ConfigSource::Environment(path) => {
                FocusConfig::load(path)?
            }
            ConfigSource::UserConfigDir(path) => match FocusConfig::load(path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring unreadable user config {}: {}", path.display(), e);
                    FocusConfig::default()
                }
            },
            ConfigSource::CompiledDefaults => {
                warn!("No config file found, using compiled defaults");
                FocusConfig::default()
            }
        };

        info!("Configuration resolved from {:?}", source);
        Ok((config, source))
    }
}

/// Write a configuration as TOML, creating parent directories as needed
pub fn write_config(config: &FocusConfig, path: &Path) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
