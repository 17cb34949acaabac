//! Remote plugin installation.
//!
//! Bundles are fetched from the registry, checked against the live command
//! surface, written to a staging directory and only then swapped into the
//! plugin storage root. Nothing under the storage root changes before the
//! swap.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::binder::CommandSurface;
use super::manifest::PluginManifest;
use super::remote::{RegistryApi, RemotePlugin};
use super::types::MANIFEST_FILE;
use super::{PluginError, PluginResult};
use crate::core::{Paths, ShellCommand};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Installed plugin name
    pub name: String,
    /// Installed version
    pub version: String,
    /// Installation directory
    pub path: PathBuf,
    /// Whether a previous installation was replaced
    pub replaced: bool,
}

/// Installs and removes plugins under the storage root.
pub struct PluginInstaller {
    api: Arc<dyn RegistryApi>,
    paths: Paths,
}

impl PluginInstaller {
    /// Create an installer talking to `api`.
    pub fn new(api: Arc<dyn RegistryApi>, paths: Paths) -> Self {
        Self { api, paths }
    }

    /// Install the plugin `id` from the registry.
    ///
    /// Commands already bound by a plugin of the same name do not count as
    /// conflicts, so reinstalling over an existing installation works.
    pub async fn install(&self, id: &str, surface: &CommandSurface) -> PluginResult<InstallReport> {
        let remote = self.api.fetch_plugin(id).await?;
        debug!(plugin = %remote.name, version = %remote.version, "Fetched plugin bundle");

        validate_plugin_name(&remote.name)?;
        for file in &remote.files {
            validate_bundle_path(&file.path)?;
        }
        check_remote_conflicts(&remote, surface)?;

        let staging = self.stage(&remote)?;
        let target = self.paths.plugins_dir().join(&remote.name);
        let replaced = target.exists();

        if replaced {
            std::fs::remove_dir_all(&target)?;
        }
        std::fs::create_dir_all(self.paths.plugins_dir())?;
        move_into_place(staging.path(), &target)?;
        info!(plugin = %remote.name, path = %target.display(), "Plugin installed");

        run_scripts(&remote.name, &target).await?;

        if let Err(e) = self.api.record_download(&remote.name).await {
            warn!(plugin = %remote.name, error = %e, "Failed to record download");
        }

        // Staging is removed here; after a rename it no longer exists.
        drop(staging);

        Ok(InstallReport { name: remote.name, version: remote.version, path: target, replaced })
    }

    /// Delete an installed plugin.
    pub fn remove(&self, name: &str) -> PluginResult<()> {
        validate_plugin_name(name)?;
        let target = self.paths.plugins_dir().join(name);
        if !target.is_dir() {
            return Err(PluginError::NotInstalled(name.to_string()));
        }

        std::fs::remove_dir_all(&target)?;
        info!(plugin = name, "Plugin removed");
        Ok(())
    }

    fn stage(&self, remote: &RemotePlugin) -> PluginResult<tempfile::TempDir> {
        let staging_root = self.paths.staging_dir();
        std::fs::create_dir_all(&staging_root)?;

        let staging = tempfile::Builder::new()
            .prefix(&format!("{}-", remote.name))
            .tempdir_in(&staging_root)?;

        for file in &remote.files {
            let dest = staging.path().join(&file.path);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, &file.content)?;
        }

        debug!(plugin = %remote.name, files = remote.files.len(), "Staged plugin files");
        Ok(staging)
    }
}

fn check_remote_conflicts(remote: &RemotePlugin, surface: &CommandSurface) -> PluginResult<()> {
    let names: Vec<String> = surface
        .conflicts(remote.declared_identifiers())
        .into_iter()
        .filter(|id| surface.resolve(id).map_or(true, |bound| bound.plugin != remote.name))
        .collect();

    if names.is_empty() {
        Ok(())
    } else {
        Err(PluginError::CommandConflict { names })
    }
}

/// Plugin names become directory names under the storage root.
fn validate_plugin_name(name: &str) -> PluginResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.starts_with('.') => Ok(()),
        _ => Err(PluginError::Validation(format!("invalid plugin name '{name}'"))),
    }
}

/// Bundle paths must stay inside the plugin directory.
fn validate_bundle_path(path: &str) -> PluginResult<()> {
    let p = Path::new(path);
    let safe = !path.is_empty()
        && p.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(())
    } else {
        Err(PluginError::Validation(format!("unsafe path in plugin bundle: '{path}'")))
    }
}

fn move_into_place(staging: &Path, target: &Path) -> PluginResult<()> {
    if std::fs::rename(staging, target).is_ok() {
        return Ok(());
    }

    for entry in WalkDir::new(staging) {
        let entry = entry.map_err(|e| PluginError::Io(e.into()))?;
        let relative = entry.path().strip_prefix(staging).unwrap_or(entry.path());
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

async fn run_scripts(name: &str, dir: &Path) -> PluginResult<()> {
    if !dir.join(MANIFEST_FILE).is_file() {
        return Ok(());
    }
    let manifest = PluginManifest::from_dir(dir)?;

    let steps = [("install", manifest.scripts.install), ("build", manifest.scripts.build)];
    for (step, line) in steps {
        let Some(line) = line.filter(|l| !l.trim().is_empty()) else {
            continue;
        };

        debug!(plugin = name, step, "Running plugin script");
        let run = ShellCommand::new(line).working_dir(dir).run().await?;
        if !run.status.success() {
            return Err(PluginError::ExecutionError(format!(
                "{step} script of plugin '{name}' {}",
                run.status.describe()
            )));
        }
    }
    Ok(())
}
