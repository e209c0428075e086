//! Error types for the vpnshell supervisor
//!
//! This module defines all error types used throughout the application,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the vpnshell application
#[derive(Error, Debug)]
pub enum VpnShellError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors raised while starting the supervised VPN process
    #[error("Start error: {0}")]
    Start(#[from] StartError),

    /// Errors raised while sampling the status artifact
    #[error("Status poll error: {0}")]
    Poll(#[from] PollError),

    /// A session ended because of an authentication or runtime failure
    #[error("VPN session failed: {0}")]
    SessionFailed(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Reasons a connect request is rejected before or while spawning
///
/// None of these are fatal to the supervisor; the connect attempt is
/// dropped and the connection stays disconnected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("VPN is already running. Please disconnect first.")]
    AlreadyRunning,

    #[error("VPN configuration file not found: {path}. Please import a profile first.")]
    ConfigMissing { path: String },

    #[error("Failed to write credentials file {path}: {reason}")]
    CredentialWrite { path: String, reason: String },

    #[error("Failed to spawn VPN process: {reason}")]
    SpawnFailed { reason: String },
}

/// Status artifact sampling errors
///
/// Poll errors are logged and the sample skipped; they never reach the
/// connection state.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Status file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read status file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VpnShellError>;
