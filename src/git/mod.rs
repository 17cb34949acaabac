//! Git integration module.
//!
//! Branch discovery for hook gates (via git2) and the thin wrappers that
//! shell out to the `git` binary for commit, push and clone.

pub mod shims;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use git2::{ErrorCode, Repository};
use tokio::process::Command;
use tracing::debug;

pub use shims::{ShimInfo, ShimManager};

/// Set in the environment of every `git` process Snap spawns, so installed
/// shims do not fire hooks a second time.
pub const HOOKS_ACTIVE_ENV: &str = "SNAP_HOOKS_ACTIVE";

/// Git repository wrapper.
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open the repository containing `path`, searching upwards.
    #[must_use]
    pub fn discover(path: impl AsRef<Path>) -> Option<Self> {
        Repository::discover(path.as_ref()).ok().map(|repo| Self { repo })
    }

    /// Working tree root (`None` for bare repositories).
    #[must_use]
    pub fn root(&self) -> Option<PathBuf> {
        self.repo.workdir().map(Path::to_path_buf)
    }

    /// The `.git/hooks` directory.
    #[must_use]
    pub fn hooks_dir(&self) -> PathBuf {
        self.repo.path().join("hooks")
    }

    /// Current branch name; `None` when HEAD is detached.
    ///
    /// A branch with no commits yet is still reported by name.
    #[must_use]
    pub fn current_branch(&self) -> Option<String> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().map(String::from),
            Ok(_) => None,
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let head = self.repo.find_reference("HEAD").ok()?;
                head.symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(String::from)
            }
            Err(_) => None,
        }
    }
}

/// Current branch of the repository containing `dir`.
#[must_use]
pub fn current_branch(dir: &Path) -> Option<String> {
    GitRepository::discover(dir).and_then(|repo| repo.current_branch())
}

/// Run `git` with `args` in `cwd`, inheriting stdio.
pub async fn run_git(args: &[String], cwd: &Path) -> Result<()> {
    debug!(?args, cwd = %cwd.display(), "Running git");

    let status = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env(HOOKS_ACTIVE_ENV, "1")
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .context("Failed to run git")?;

    if !status.success() {
        let subcommand = args.first().map_or("", String::as_str);
        match status.code() {
            Some(code) => bail!("git {subcommand} exited with code {code}"),
            None => bail!("git {subcommand} was terminated by a signal"),
        }
    }
    Ok(())
}

/// `git commit -m <message> [extra...]`.
pub async fn commit(message: &str, extra: &[String], cwd: &Path) -> Result<()> {
    let mut args = vec!["commit".to_string(), "-m".to_string(), message.to_string()];
    args.extend_from_slice(extra);
    run_git(&args, cwd).await
}

/// `git push [remote [branch]] [extra...]`.
pub async fn push(
    remote: Option<&str>,
    branch: Option<&str>,
    extra: &[String],
    cwd: &Path,
) -> Result<()> {
    let mut args = vec!["push".to_string()];
    args.extend(remote.into_iter().chain(branch).map(String::from));
    args.extend_from_slice(extra);
    run_git(&args, cwd).await
}

/// `git clone <url> [dir]`; returns the directory cloned into.
pub async fn clone(url: &str, dir: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let target = match dir {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from(clone_dir_name(url)),
    };

    let args =
        vec!["clone".to_string(), url.to_string(), target.to_string_lossy().into_owned()];
    run_git(&args, cwd).await?;

    Ok(if target.is_absolute() { target } else { cwd.join(target) })
}

/// Directory name `git clone` would pick for `url`.
pub fn clone_dir_name(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit(['/', ':']).next().unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unborn_branch_reported() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        repo.set_head("refs/heads/trunk").unwrap();

        assert_eq!(current_branch(temp.path()).as_deref(), Some("trunk"));
    }

    #[test]
    fn test_branch_with_commit() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let commit = repo.commit(None, &sig, &sig, "init", &tree, &[]).unwrap();
        repo.branch("feature", &repo.find_commit(commit).unwrap(), false).unwrap();
        repo.set_head("refs/heads/feature").unwrap();

        assert_eq!(current_branch(temp.path()).as_deref(), Some("feature"));

        repo.set_head_detached(commit).unwrap();
        assert_eq!(current_branch(temp.path()), None);
    }

    #[test]
    fn test_not_a_repository() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("plain");
        std::fs::create_dir_all(&nested).unwrap();
        // The temp dir may itself sit inside a repository; only assert when it does not.
        if GitRepository::discover(&nested).is_none() {
            assert_eq!(current_branch(&nested), None);
        }
    }

    #[test]
    fn test_clone_dir_name() {
        assert_eq!(clone_dir_name("https://github.com/acme/widget.git"), "widget");
        assert_eq!(clone_dir_name("git@github.com:acme/widget.git"), "widget");
        assert_eq!(clone_dir_name("https://example.com/repo/"), "repo");
    }
}
