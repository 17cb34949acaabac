//! Plugin system error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur during plugin operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A plugin with this name is already bound.
    #[error("Plugin '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Candidate commands collide with commands already on the command surface.
    #[error("Command conflict: {} already exist(s)", names.join(", "))]
    CommandConflict { names: Vec<String> },

    /// Plugin directory, manifest, or entry file not found.
    #[error("Plugin not found: {0}")]
    NotFound(PathBuf),

    /// No installation exists for this plugin name.
    #[error("Plugin '{0}' is not installed")]
    NotInstalled(String),

    /// Malformed manifest, entry module, or remote bundle.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No stored or accepted credential.
    #[error("Not authenticated: {0}")]
    Auth(String),

    /// Registry unreachable or returned a non-success response.
    #[error("Network error: {0}")]
    Network(String),

    /// The plugin does not declare the requested command.
    #[error("Command '{0}' not found in plugin")]
    CommandNotFound(String),

    /// A flag token matched none of the command's options.
    #[error("Invalid option '{option}' for command '{command}'")]
    InvalidOption { option: String, command: String },

    /// A value-taking option was not followed by a value.
    #[error("Option '{0}' requires a value")]
    MissingOptionValue(String),

    /// The command action failed.
    #[error("Command execution failed: {0}")]
    CommandExecutionFailed(String),

    /// A spawned script (init, install, build, action) failed.
    #[error("Plugin execution failed: {0}")]
    ExecutionError(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRegistered(_) | Self::CommandConflict { .. } => ErrorKind::Conflict,
            Self::NotFound(_) | Self::NotInstalled(_) | Self::CommandNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Validation(_) | Self::InvalidOption { .. } | Self::MissingOptionValue(_) => {
                ErrorKind::Validation
            }
            Self::Auth(_) => ErrorKind::Auth,
            Self::Network(_) => ErrorKind::Network,
            Self::CommandExecutionFailed(_) | Self::ExecutionError(_) => ErrorKind::Execution,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<reqwest::Error> for PluginError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
