//! TOML configuration file I/O
//!
//! Handles loading and saving supervisor configuration to/from TOML files
//! in the user's configuration directory.

use crate::config::VpnConfig;
use crate::error::{ConfigError, VpnShellError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Complete TOML configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// VPN process settings
    #[serde(rename = "vpn", default)]
    pub vpn_config: VpnConfig,
}

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "VPNSHELL_CONFIG_DIR";

/// Get the default configuration directory
///
/// Returns ~/.config/vpnshell, or VPNSHELL_CONFIG_DIR if set
pub fn get_config_dir() -> Result<PathBuf, VpnShellError> {
    if let Ok(config_dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        VpnShellError::Config(ConfigError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;

    Ok(PathBuf::from(home).join(".config").join("vpnshell"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, VpnShellError> {
    let config_dir = get_config_dir()?;
    Ok(config_dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the default TOML file
///
/// A missing file is not an error: defaults rooted in the configuration
/// directory are returned instead.
pub fn load_config() -> Result<VpnConfig, VpnShellError> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        debug!("No configuration at {:?}, using defaults", config_path);
        return Ok(VpnConfig::with_base_dir(&get_config_dir()?));
    }
    load_config_from_path(&config_path)
}

/// Load configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<VpnConfig, VpnShellError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => VpnShellError::Config(ConfigError::LoadFailed {
            path: path.to_string_lossy().to_string(),
        }),
        _ => VpnShellError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let toml_config: TomlConfig = toml::from_str(&contents).map_err(|e| {
        VpnShellError::Config(ConfigError::IoError {
            message: format!("Failed to parse TOML: {}", e),
        })
    })?;

    let mut config = toml_config.vpn_config;
    if let Some(dir) = path.parent() {
        config.resolve_relative_to(dir);
    }

    config
        .validate()
        .map_err(|e| VpnShellError::Config(ConfigError::ValidationError { message: e }))?;

    Ok(config)
}

/// Save configuration to the default TOML file
pub fn save_config(config: &VpnConfig) -> Result<PathBuf, VpnShellError> {
    let config_path = get_config_path()?;
    save_config_to_path(config, &config_path)?;
    Ok(config_path)
}

/// Save configuration to a specific TOML file
pub fn save_config_to_path<P: AsRef<Path>>(config: &VpnConfig, path: P) -> Result<(), VpnShellError> {
    config
        .validate()
        .map_err(|e| VpnShellError::Config(ConfigError::ValidationError { message: e }))?;

    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            VpnShellError::Config(ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })
        })?;
    }

    let toml_config = TomlConfig {
        vpn_config: config.clone(),
    };
    let toml_string = toml::to_string_pretty(&toml_config)?;

    std::fs::write(&path, toml_string).map_err(|_e| {
        VpnShellError::Config(ConfigError::SaveFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        })
    })?;

    info!("Saved configuration to {:?}", path.as_ref());
    Ok(())
}

/// Check if a configuration file exists
pub fn config_exists() -> Result<bool, VpnShellError> {
    let config_path = get_config_path()?;
    Ok(config_path.exists())
}
