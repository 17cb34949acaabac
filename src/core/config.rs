//! Configuration management for Snap.
//!
//! Handles loading configuration from TOML files and resolving the
//! on-disk locations used by the plugin and hook subsystems.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

/// Default plugin registry endpoint.
pub const DEFAULT_REGISTRY_URL: &str = "https://snap.choco.rip/api";

/// Environment variable overriding the configuration root.
pub const HOME_ENV: &str = "SNAP_HOME";

/// Environment variable overriding the registry URL.
pub const REGISTRY_URL_ENV: &str = "SNAP_REGISTRY_URL";

/// Project-local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = ".snap.toml";

/// Errors raised while resolving or reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory could be determined.
    #[error("Could not determine the home directory")]
    NoHomeDir,

    /// Config file exists but is not valid TOML for this schema.
    #[error("Invalid configuration in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoHomeDir => ErrorKind::NotFound,
            Self::Parse { .. } => ErrorKind::Validation,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote plugin registry settings
    pub registry: RegistryConfig,

    /// Hook automation settings
    pub hooks: HooksConfig,

    /// Plugin storage settings
    pub plugins: PluginsConfig,
}

/// Remote plugin registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the registry API
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Hook automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Hook directory, relative to the project root
    pub dir: PathBuf,

    /// Timeout applied to hook commands that do not declare one
    pub default_timeout_ms: u64,
}

/// Plugin storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Override for the plugin storage directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { url: DEFAULT_REGISTRY_URL.to_string(), timeout_secs: 30 }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from(".snap").join("hooks"), default_timeout_ms: 30_000 }
    }
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// Looks for config in:
    /// 1. `.snap.toml` in the current directory
    /// 2. `<config root>/config.toml`
    /// 3. Falls back to defaults
    ///
    /// `SNAP_REGISTRY_URL` overrides the registry URL in every case.
    pub fn load() -> Result<Self, ConfigError> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        let mut config = if local.exists() {
            Self::load_from_file(&local)?
        } else {
            let global = Paths::resolve()?.config_file();
            if global.exists() {
                Self::load_from_file(&global)?
            } else {
                Self::default()
            }
        };

        if let Ok(url) = std::env::var(REGISTRY_URL_ENV) {
            if !url.trim().is_empty() {
                config.registry.url = url;
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
    }
}

/// Resolved on-disk locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
    plugins_override: Option<PathBuf>,
}

impl Paths {
    /// Use an explicit configuration root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), plugins_override: None }
    }

    /// Resolve the configuration root for this platform.
    ///
    /// `$SNAP_HOME` wins; otherwise `%APPDATA%\snap` on Windows and
    /// `~/.snap` elsewhere.
    pub fn resolve() -> Result<Self, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(home));
        }

        let root = if cfg!(target_os = "windows") {
            dirs::config_dir().ok_or(ConfigError::NoHomeDir)?.join("snap")
        } else {
            dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join(".snap")
        };

        Ok(Self::new(root))
    }

    /// Apply the `[plugins] dir` override from configuration.
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.plugins_override.clone_from(&config.plugins.dir);
        self
    }

    /// The configuration root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One directory per installed plugin lives here.
    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_override.clone().unwrap_or_else(|| self.root.join("plugins"))
    }

    /// Scratch space for install staging.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Global configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Stored registry credential.
    pub fn credentials_file(&self) -> PathBuf {
        self.root.join("auth.json")
    }

    /// Create the plugin and staging directories if missing.
    pub fn ensure(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.plugins_dir())?;
        std::fs::create_dir_all(self.staging_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry.url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.hooks.default_timeout_ms, 30_000);
        assert_eq!(config.hooks.dir, PathBuf::from(".snap/hooks"));
        assert!(config.plugins.dir.is_none());
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [registry]
            url = "http://localhost:3000/api"

            [hooks]
            default_timeout_ms = 500
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.registry.url, "http://localhost:3000/api");
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.hooks.default_timeout_ms, 500);
    }

    #[test]
    fn test_load_from_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[registry]\nurl = 42\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_paths_layout() {
        let paths = Paths::new("/tmp/snap-root");
        assert_eq!(paths.plugins_dir(), PathBuf::from("/tmp/snap-root/plugins"));
        assert_eq!(paths.staging_dir(), PathBuf::from("/tmp/snap-root/temp"));
        assert_eq!(paths.credentials_file(), PathBuf::from("/tmp/snap-root/auth.json"));
    }

    #[test]
    fn test_plugins_dir_override() {
        let mut config = Config::default();
        config.plugins.dir = Some(PathBuf::from("/opt/snap-plugins"));

        let paths = Paths::new("/tmp/snap-root").with_config(&config);
        assert_eq!(paths.plugins_dir(), PathBuf::from("/opt/snap-plugins"));
    }

    #[test]
    #[serial]
    fn test_resolve_honours_snap_home() {
        std::env::set_var(HOME_ENV, "/tmp/custom-snap");
        let paths = Paths::resolve().unwrap();
        std::env::remove_var(HOME_ENV);

        assert_eq!(paths.root(), Path::new("/tmp/custom-snap"));
    }
}
