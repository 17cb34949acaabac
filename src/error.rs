//! Error taxonomy shared by the plugin and hook subsystems.
//!
//! Each subsystem keeps its own `thiserror` enum with precise variants; all of
//! them classify into an [`ErrorKind`] so callers can react to the category
//! (conflict, auth, network, ...) without matching on every variant.

use std::fmt;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed hook, manifest, or plugin shape.
    Validation,
    /// Command-name or plugin-name collision.
    Conflict,
    /// Missing plugin, hook, command, or file.
    NotFound,
    /// Missing or rejected credential.
    Auth,
    /// Non-zero exit or timeout of a spawned command.
    Execution,
    /// Unreachable registry or non-2xx response.
    Network,
    /// Local filesystem failure.
    Io,
}

impl ErrorKind {
    /// Short lowercase label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not-found",
            Self::Auth => "auth",
            Self::Execution => "execution",
            Self::Network => "network",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
