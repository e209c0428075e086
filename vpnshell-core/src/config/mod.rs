//! Configuration module
//!
//! Handles loading and saving supervisor configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod toml_config;

/// Highest `--verb` level accepted by OpenVPN
pub const MAX_VERBOSITY: u8 = 11;

/// Supervisor configuration
///
/// Describes how the external VPN binary is launched and where its
/// artifacts live. Relative paths are resolved against the directory of
/// the configuration file when loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnConfig {
    /// OpenVPN executable, either a bare name looked up in PATH or a path
    pub openvpn_binary: PathBuf,

    /// Connection profile passed with `--config`
    pub profile: PathBuf,

    /// Credential artifact passed with `--auth-user-pass`
    pub credentials_file: PathBuf,

    /// Status artifact passed with `--status`
    pub status_file: PathBuf,

    /// Log verbosity passed with `--verb`
    pub verbosity: u8,

    /// Refresh interval the VPN binary uses for the status artifact
    pub status_interval_secs: u32,

    /// How often the status artifact is sampled
    pub poll_interval_ms: u64,

    /// Keep the credential artifact on disk after the session ends
    pub retain_credentials: bool,

    /// Additional arguments appended after the managed ones
    pub extra_args: Vec<String>,
}

impl VpnConfig {
    /// Create a configuration whose artifacts all live in `dir`
    pub fn with_base_dir(dir: &Path) -> Self {
        let mut config = Self::default();
        config.resolve_relative_to(dir);
        config
    }

    /// Make every relative artifact path absolute against `dir`
    ///
    /// The binary is left alone when it is a bare command name so that it is
    /// still looked up in PATH.
    pub fn resolve_relative_to(&mut self, dir: &Path) {
        for path in [
            &mut self.profile,
            &mut self.credentials_file,
            &mut self.status_file,
        ] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }

        if self.openvpn_binary.is_relative() && self.openvpn_binary.components().count() > 1 {
            self.openvpn_binary = dir.join(&self.openvpn_binary);
        }
    }

    /// Arguments passed to the VPN binary, in order
    pub fn command_args(&self) -> Vec<String> {
        let mut args = vec![
            "--config".to_string(),
            self.profile.to_string_lossy().to_string(),
            "--auth-user-pass".to_string(),
            self.credentials_file.to_string_lossy().to_string(),
            "--verb".to_string(),
            self.verbosity.to_string(),
            "--status".to_string(),
            self.status_file.to_string_lossy().to_string(),
            self.status_interval_secs.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.openvpn_binary.as_os_str().is_empty() {
            return Err("OpenVPN binary cannot be empty".to_string());
        }

        if self.profile.as_os_str().is_empty() {
            return Err("Profile path cannot be empty".to_string());
        }

        if self.credentials_file.as_os_str().is_empty() {
            return Err("Credentials file path cannot be empty".to_string());
        }

        if self.status_file.as_os_str().is_empty() {
            return Err("Status file path cannot be empty".to_string());
        }

        if self.credentials_file == self.profile || self.status_file == self.profile {
            return Err("Artifact paths must not overwrite the profile".to_string());
        }

        if self.verbosity > MAX_VERBOSITY {
            return Err(format!(
                "Verbosity must be between 0 and {}, got {}",
                MAX_VERBOSITY, self.verbosity
            ));
        }

        if self.status_interval_secs == 0 {
            return Err("Status interval cannot be zero".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("Poll interval cannot be zero".to_string());
        }

        Ok(())
    }
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            openvpn_binary: PathBuf::from("openvpn"),
            profile: PathBuf::from("default.ovpn"),
            credentials_file: PathBuf::from("auth.txt"),
            status_file: PathBuf::from("status.log"),
            verbosity: 3,
            status_interval_secs: 1,
            poll_interval_ms: 1000,
            retain_credentials: false,
            extra_args: Vec::new(),
        }
    }
}
