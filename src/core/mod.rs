//! Core types and functionality for Snap.
//!
//! Configuration, stored credentials, and the shell runner shared by the
//! plugin and hook subsystems.

mod config;
mod credentials;
mod shell;

pub use config::{
    Config, ConfigError, HooksConfig, Paths, PluginsConfig, RegistryConfig, DEFAULT_REGISTRY_URL,
    HOME_ENV, LOCAL_CONFIG_FILE, REGISTRY_URL_ENV,
};
pub use credentials::Credentials;
pub use shell::{get_shell, ShellCommand, ShellRun, ShellStatus};
