//! `.git/hooks` shims.
//!
//! Git itself only knows about its own hook scripts. A shim is a tiny script
//! installed under `.git/hooks/<point>` that hands the lifecycle point to
//! `snap hooks run <point>`, so plain `git commit` fires Snap hooks too.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::HOOKS_ACTIVE_ENV;
use crate::hooks::HookPoint;

/// Marker line identifying scripts written by Snap.
const SHIM_MARKER: &str = "# Managed by Snap";

/// Git's own name for the hook serving a lifecycle point, if git has one.
pub fn git_hook_name(point: HookPoint) -> Option<&'static str> {
    match point {
        HookPoint::PreCommit => Some("pre-commit"),
        HookPoint::PostCommit => Some("post-commit"),
        HookPoint::PostPush | HookPoint::PostClone => None,
    }
}

/// State of one git hook slot.
#[derive(Debug, Clone)]
pub struct ShimInfo {
    /// Lifecycle point
    pub point: HookPoint,

    /// Path to the hook file
    pub path: PathBuf,

    /// Whether a file exists at `path`
    pub exists: bool,

    /// Whether the file is a Snap shim
    pub is_snap: bool,

    /// Whether the file is executable
    pub is_executable: bool,
}

/// Installs and removes shims in a repository's hooks directory.
pub struct ShimManager {
    hooks_dir: PathBuf,
}

impl ShimManager {
    /// Manage shims in `hooks_dir` (normally `.git/hooks`).
    pub fn new(hooks_dir: impl Into<PathBuf>) -> Self {
        Self { hooks_dir: hooks_dir.into() }
    }

    /// Manager for the repository containing `dir`.
    pub fn discover(dir: &Path) -> Option<Self> {
        super::GitRepository::discover(dir).map(|repo| Self::new(repo.hooks_dir()))
    }

    /// The hooks directory.
    pub fn hooks_dir(&self) -> &Path {
        &self.hooks_dir
    }

    fn slot(point: HookPoint) -> Result<&'static str> {
        match git_hook_name(point) {
            Some(name) => Ok(name),
            None => bail!("git has no hook for '{point}'; Snap fires it from `snap` commands only"),
        }
    }

    /// State of every shim-able point.
    pub fn list(&self) -> Vec<ShimInfo> {
        HookPoint::ALL
            .into_iter()
            .filter_map(|point| {
                let path = self.hooks_dir.join(git_hook_name(point)?);
                let exists = path.exists();
                Some(ShimInfo {
                    point,
                    is_snap: exists && is_snap_script(&path),
                    is_executable: exists && is_executable(&path),
                    exists,
                    path,
                })
            })
            .collect()
    }

    /// Write the shim for `point`.
    ///
    /// A foreign script in the slot is only replaced with `force`.
    pub fn install(&self, point: HookPoint, force: bool) -> Result<PathBuf> {
        let path = self.hooks_dir.join(Self::slot(point)?);

        if path.exists() && !force && !is_snap_script(&path) {
            bail!(
                "Hook '{}' already exists and is not managed by Snap. Use --force to overwrite.",
                path.display()
            );
        }

        fs::create_dir_all(&self.hooks_dir).context("Failed to create hooks directory")?;
        fs::write(&path, shim_script(point)).context("Failed to write hook file")?;
        make_executable(&path)?;

        Ok(path)
    }

    /// Remove the shim for `point`.
    ///
    /// A foreign script is only removed with `force`.
    pub fn uninstall(&self, point: HookPoint, force: bool) -> Result<()> {
        let path = self.hooks_dir.join(Self::slot(point)?);

        if !path.exists() {
            bail!("Hook '{}' does not exist", path.display());
        }
        if !force && !is_snap_script(&path) {
            bail!(
                "Hook '{}' is not managed by Snap. Use --force to remove anyway.",
                path.display()
            );
        }

        fs::remove_file(&path).context("Failed to remove hook file")?;
        Ok(())
    }
}

fn shim_script(point: HookPoint) -> String {
    format!(
        r#"#!/bin/sh
{SHIM_MARKER} - Do not edit manually
# Hook: {point}

# Snap already ran this hook if it started git itself.
[ -n "${HOOKS_ACTIVE_ENV}" ] && exit 0

exec {app} hooks run {point}
"#,
        app = crate::APP_NAME,
    )
}

fn is_snap_script(path: &Path) -> bool {
    fs::read_to_string(path).is_ok_and(|content| content.contains(SHIM_MARKER))
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
