//! Hook subsystem error types.

use thiserror::Error;

use crate::error::ErrorKind;

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;

/// Errors that can occur while loading or running a hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook file exists but does not describe a valid hook.
    #[error("Invalid hook format in '{hook}': {reason}")]
    InvalidHookFormat { hook: String, reason: String },

    /// Name is not one of the known lifecycle points.
    #[error("Unknown hook point '{0}'")]
    UnknownHookPoint(String),

    /// A hook command failed and the hook does not tolerate failures.
    #[error("Hook '{hook}' failed: command `{command}` {reason}")]
    CommandFailed { hook: String, command: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HookError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHookFormat { .. } | Self::UnknownHookPoint(_) => ErrorKind::Validation,
            Self::CommandFailed { .. } => ErrorKind::Execution,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}
