//! Discovery of installed plugins.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::binder::CommandBinder;
use super::manifest::load_plugin_dir;
use super::PluginResult;

/// Outcome of a load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Plugins bound, in load order
    pub loaded: Vec<String>,
    /// Directories that failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Loads every plugin directory under the storage root.
#[derive(Debug, Clone)]
pub struct PluginLoader {
    plugins_dir: PathBuf,
}

impl PluginLoader {
    /// Create a loader for `plugins_dir`.
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self { plugins_dir: plugins_dir.into() }
    }

    /// The storage root.
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Plugin directories in load order (sorted by directory name).
    pub fn discover(&self) -> PluginResult<Vec<PathBuf>> {
        if !self.plugins_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.plugins_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    /// Load and bind every plugin, one at a time.
    ///
    /// Manifests and entry modules are re-read from disk on every call. A
    /// plugin that fails to load is logged and skipped.
    pub async fn load(&self, binder: &mut CommandBinder<'_>) -> PluginResult<LoadSummary> {
        let mut summary = LoadSummary::default();

        for dir in self.discover()? {
            let dir_name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.display().to_string());

            let result = match load_plugin_dir(&dir) {
                Ok(plugin) => {
                    let name = plugin.name.clone();
                    binder.register_plugin(plugin).await.map(|()| name)
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(name) => {
                    debug!(plugin = %name, "Loaded plugin");
                    summary.loaded.push(name);
                }
                Err(e) => {
                    warn!(plugin = %dir_name, error = %e, "Failed to load plugin");
                    summary.failed.push((dir_name, e.to_string()));
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::binder::CommandSurface;
    use crate::plugin::registry::PluginRegistry;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, dir: &str, name: &str, command: &str) {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(
            path.join("plugin.toml"),
            format!("[plugin]\nname = \"{name}\"\nversion = \"1.0.0\"\nmain = \"index.toml\"\n"),
        )
        .unwrap();
        std::fs::write(
            path.join("index.toml"),
            format!(
                "name = \"{name}\"\n\n[[commands]]\nname = \"{command}\"\ndescription = \"d\"\nrun = \"true\"\n"
            ),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_bad_plugin_does_not_abort_load() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "a-first", "first", "one");
        std::fs::create_dir_all(temp.path().join("b-broken")).unwrap();
        write_plugin(temp.path(), "c-third", "third", "three");

        let mut surface = CommandSurface::new(clap::Command::new("snap"));
        let mut registry = PluginRegistry::new();
        let summary = PluginLoader::new(temp.path())
            .load(&mut CommandBinder::new(&mut surface, &mut registry))
            .await
            .unwrap();

        assert_eq!(summary.loaded, vec!["first", "third"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "b-broken");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_conflicting_plugin_reported() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "a", "first", "same");
        write_plugin(temp.path(), "b", "second", "same");

        let mut surface = CommandSurface::new(clap::Command::new("snap"));
        let mut registry = PluginRegistry::new();
        let summary = PluginLoader::new(temp.path())
            .load(&mut CommandBinder::new(&mut surface, &mut registry))
            .await
            .unwrap();

        assert_eq!(summary.loaded, vec!["first"]);
        assert!(summary.failed[0].1.contains("same"));
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let loader = PluginLoader::new(temp.path().join("nope"));
        assert!(loader.discover().unwrap().is_empty());
    }
}
