//! `onlyIf` gate evaluation.
//!
//! Gates are checked in a fixed order (branches, files, env, commands) and the
//! first one that fails decides the skip reason. A failing gate is a skip,
//! never an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::config::HookConditions;
use crate::core::ShellCommand;

/// Where the current branch name comes from.
pub trait BranchSource: Send + Sync {
    /// Name of the checked-out branch, if any.
    fn current_branch(&self) -> Option<String>;
}

impl<F> BranchSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_branch(&self) -> Option<String> {
        self()
    }
}

/// Reads the branch of the repository containing a directory.
#[derive(Debug, Clone)]
pub struct GitBranch {
    dir: PathBuf,
}

impl GitBranch {
    /// Branch source for the repository containing `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BranchSource for GitBranch {
    fn current_branch(&self) -> Option<String> {
        crate::git::current_branch(&self.dir)
    }
}

/// Result of evaluating a hook's gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Every gate passed (or there were none).
    Passed,
    /// A gate failed; the reason names the unmet condition.
    Skipped(String),
}

impl GateOutcome {
    /// Whether the hook should run.
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Evaluates `onlyIf` blocks.
pub struct ConditionEvaluator<B> {
    branch: B,
    cwd: PathBuf,
    command_timeout: Duration,
}

impl<B: BranchSource> ConditionEvaluator<B> {
    /// Create an evaluator resolving globs and running commands in `cwd`.
    pub fn new(branch: B, cwd: impl Into<PathBuf>) -> Self {
        Self {
            branch,
            cwd: cwd.into(),
            command_timeout: Duration::from_millis(super::DEFAULT_TIMEOUT_MS),
        }
    }

    /// Bound for each `commands` gate.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Evaluate the gates; no block means pass.
    pub async fn evaluate(&self, conditions: Option<&HookConditions>) -> GateOutcome {
        let Some(conditions) = conditions else {
            return GateOutcome::Passed;
        };

        if let Some(ref branches) = conditions.branches {
            let current = self.branch.current_branch();
            if !current.as_ref().is_some_and(|b| branches.contains(b)) {
                let current = current.as_deref().unwrap_or("(none)");
                return GateOutcome::Skipped(format!(
                    "current branch '{current}' is not one of: {}",
                    branches.join(", ")
                ));
            }
        }

        if let Some(ref patterns) = conditions.files {
            if !any_file_matches(&self.cwd, patterns) {
                return GateOutcome::Skipped(format!("no files match: {}", patterns.join(", ")));
            }
        }

        if let Some(ref vars) = conditions.env {
            let missing: Vec<&str> = vars
                .iter()
                .filter(|var| std::env::var_os(var).map_or(true, |v| v.is_empty()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return GateOutcome::Skipped(format!(
                    "missing environment variables: {}",
                    missing.join(", ")
                ));
            }
        }

        if let Some(ref commands) = conditions.commands {
            for command in commands {
                let ok = ShellCommand::new(command.clone())
                    .working_dir(&self.cwd)
                    .timeout(self.command_timeout)
                    .quiet(true)
                    .run()
                    .await
                    .is_ok_and(|run| run.status.success());
                if !ok {
                    return GateOutcome::Skipped(format!("command failed: `{command}`"));
                }
            }
        }

        GateOutcome::Passed
    }
}

fn any_file_matches(cwd: &Path, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            cwd.join(pattern).to_string_lossy().into_owned()
        };

        match glob::glob(&full) {
            Ok(mut paths) => paths.any(|p| p.is_ok()),
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "Invalid file pattern");
                false
            }
        }
    })
}
