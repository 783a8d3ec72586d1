//! Configuration management
//!
//! This module handles loading, validation, and management of the SysGestion
//! configuration. Configuration is stored in TOML format at
//! ~/.sysgestion/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level and data directory
//! - **modules**: Upload limits and archive retention
//! - **session**: Role used when `--role` is not given (optional)
//!
//! # Path Expansion
//!
//! The configuration system automatically:
//! - Expands ~ to the user's home directory
//! - Creates the data directory if it doesn't exist
//!
//! # Examples
//!
//! ```no_run
//! use sysgestion_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Upload limit: {} bytes", config.modules.max_archive_size);
//! # Ok(())
//! # }
//! ```

use sdk::errors::ModuleError;
use sdk::manifest::Role;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use sysgestion_modules::installer::{InstallPolicy, DEFAULT_MAX_ARCHIVE_SIZE};

/// Valid values for `core.log_level`
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Module upload and retention settings
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Default session (optional)
    #[serde(default)]
    pub session: SessionConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Module upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Maximum archive size in bytes
    #[serde(default = "default_max_archive_size")]
    pub max_archive_size: u64,

    /// Accepted archive extensions, without the dot
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Keep a copy of each installed archive under `<data_dir>/modules`
    #[serde(default = "default_true")]
    pub keep_archives: bool,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            max_archive_size: default_max_archive_size(),
            allowed_extensions: default_allowed_extensions(),
            keep_archives: true,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Role to act as when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.sysgestion")
}

fn default_max_archive_size() -> u64 {
    DEFAULT_MAX_ARCHIVE_SIZE
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["zip".to_string(), "rar".to_string()]
}

impl Config {
    /// Load configuration from the default location (~/.sysgestion/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, ModuleError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ModuleError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ModuleError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ModuleError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, ModuleError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ModuleError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let default = Self::default_config();

        // Written before processing so the file keeps the portable ~ path
        let toml_string = toml::to_string_pretty(&default)
            .map_err(|e| ModuleError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, toml_string)
            .map_err(|e| ModuleError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = default;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.sysgestion/config.toml)
    pub fn default_config_path() -> Result<PathBuf, ModuleError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ModuleError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".sysgestion").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            modules: ModulesConfig::default(),
            session: SessionConfig::default(),
        }
    }

    /// Upload policy derived from the `[modules]` section
    pub fn install_policy(&self) -> InstallPolicy {
        InstallPolicy {
            max_archive_size: self.modules.max_archive_size,
            allowed_extensions: self.modules.allowed_extensions.clone(),
        }
    }

    /// Directory retained archives are written to
    pub fn archive_dir(&self) -> PathBuf {
        self.core.data_dir.join("modules")
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level and module limits
    /// - Expands ~ in the data directory
    /// - Creates the data directory if it doesn't exist
    pub fn validate_and_process(&mut self) -> Result<(), ModuleError> {
        if !LOG_LEVELS.contains(&self.core.log_level.as_str()) {
            return Err(ModuleError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.modules.max_archive_size == 0 {
            return Err(ModuleError::Config(
                "max_archive_size must be greater than 0".to_string(),
            ));
        }

        if self.modules.allowed_extensions.is_empty() {
            return Err(ModuleError::Config(
                "allowed_extensions must list at least one extension".to_string(),
            ));
        }
        for ext in &mut self.modules.allowed_extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                ModuleError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, ModuleError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ModuleError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ModuleError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| ModuleError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
