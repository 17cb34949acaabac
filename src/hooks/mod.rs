//! Declarative automation hooks.
//!
//! A hook is a YAML file under `.snap/hooks/` named after the lifecycle point
//! it serves. Each invocation reads the file, checks its `onlyIf` gates and
//! runs its commands.
//!
//! # Example
//!
//! ```yaml
//! # .snap/hooks/pre-commit
//! name: Lint
//! run:
//!   - cargo fmt --check
//!   - cargo clippy -- -D warnings
//! failOnError: true
//! onlyIf:
//!   branches: [main]
//!   files: ["src/**/*.rs"]
//! ```

mod conditions;
mod config;
mod error;
mod executor;

use std::fmt;
use std::str::FromStr;

use tracing::info;

pub use conditions::{BranchSource, ConditionEvaluator, GateOutcome, GitBranch};
pub use config::{
    parse_hook, HookConditions, HookConfigLoader, HookDefinition, HookSummary, DEFAULT_TIMEOUT_MS,
};
pub use error::{HookError, HookResult};
pub use executor::{CommandReport, HookExecutor, HookReport, HOOK_NAME_ENV, HOOK_VERSION_ENV};

/// Lifecycle points fired by the version-control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Before `snap commit` creates a commit
    PreCommit,
    /// After a commit was created
    PostCommit,
    /// After a successful push
    PostPush,
    /// After a successful clone
    PostClone,
}

impl HookPoint {
    /// Every lifecycle point.
    pub const ALL: [Self; 4] = [Self::PreCommit, Self::PostCommit, Self::PostPush, Self::PostClone];

    /// Hook file name for this point.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreCommit => "pre-commit",
            Self::PostCommit => "post-commit",
            Self::PostPush => "post-push",
            Self::PostClone => "post-clone",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookPoint {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| HookError::UnknownHookPoint(s.to_string()))
    }
}

/// How a hook invocation ended, short of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// No hook file for this name.
    NotFound,
    /// The hook has `enabled: false`.
    Disabled,
    /// A gate failed.
    Skipped(String),
    /// Commands ran.
    Completed(HookReport),
}

/// Load, gate, execute.
pub struct HookRunner<B> {
    loader: HookConfigLoader,
    evaluator: ConditionEvaluator<B>,
    executor: HookExecutor,
}

impl<B: BranchSource> HookRunner<B> {
    /// Assemble a runner.
    pub fn new(
        loader: HookConfigLoader,
        evaluator: ConditionEvaluator<B>,
        executor: HookExecutor,
    ) -> Self {
        Self { loader, evaluator, executor }
    }

    /// The hook file loader.
    pub fn loader(&self) -> &HookConfigLoader {
        &self.loader
    }

    /// Run the hook `name`.
    pub async fn run(&self, name: &str) -> HookResult<HookOutcome> {
        let Some(hook) = self.loader.load(name)? else {
            return Ok(HookOutcome::NotFound);
        };

        if !hook.enabled {
            info!(hook = name, "Hook is disabled");
            return Ok(HookOutcome::Disabled);
        }

        if let GateOutcome::Skipped(reason) = self.evaluator.evaluate(hook.only_if.as_ref()).await {
            info!(hook = name, %reason, "Skipping hook");
            return Ok(HookOutcome::Skipped(reason));
        }

        self.executor.execute(&hook).await.map(HookOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn runner(dir: &Path, branch: &'static str) -> HookRunner<impl BranchSource> {
        HookRunner::new(
            HookConfigLoader::new(dir.join(".snap/hooks")),
            ConditionEvaluator::new(move || Some(branch.to_string()), dir),
            HookExecutor::new(dir),
        )
    }

    fn write_hook(dir: &Path, name: &str, yaml: &str) {
        let hooks = dir.join(".snap/hooks");
        std::fs::create_dir_all(&hooks).unwrap();
        std::fs::write(hooks.join(name), yaml).unwrap();
    }

    #[test]
    fn test_hook_point_names() {
        assert_eq!("post-push".parse::<HookPoint>().unwrap(), HookPoint::PostPush);
        assert_eq!(HookPoint::PreCommit.to_string(), "pre-commit");
        assert!(matches!("pre-rebase".parse::<HookPoint>(), Err(HookError::UnknownHookPoint(_))));
    }

    #[tokio::test]
    async fn test_missing_hook_is_not_found() {
        let temp = TempDir::new().unwrap();
        let outcome = runner(temp.path(), "main").run("pre-commit").await.unwrap();
        assert_eq!(outcome, HookOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_disabled_hook_never_runs() {
        let temp = TempDir::new().unwrap();
        write_hook(
            temp.path(),
            "pre-commit",
            "name: Off\nenabled: false\nrun: [\"touch marker\"]\n",
        );

        let outcome = runner(temp.path(), "main").run("pre-commit").await.unwrap();

        assert_eq!(outcome, HookOutcome::Disabled);
        assert!(!temp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_branch_gate_skips() {
        let temp = TempDir::new().unwrap();
        write_hook(
            temp.path(),
            "post-commit",
            "name: Main only\nrun: [\"touch marker\"]\nonlyIf:\n  branches: [main]\n",
        );

        let outcome = runner(temp.path(), "feature").run("post-commit").await.unwrap();

        assert!(matches!(outcome, HookOutcome::Skipped(ref reason) if reason.contains("main")));
        assert!(!temp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_completed_hook_reports_commands() {
        let temp = TempDir::new().unwrap();
        write_hook(temp.path(), "post-push", "name: Notify\nrun: [\"touch marker\", \"true\"]\n");

        let outcome = runner(temp.path(), "main").run("post-push").await.unwrap();

        match outcome {
            HookOutcome::Completed(report) => {
                assert_eq!(report.hook, "Notify");
                assert_eq!(report.commands.len(), 2);
                assert_eq!(report.failures(), 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(temp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_invalid_hook_is_an_error() {
        let temp = TempDir::new().unwrap();
        write_hook(temp.path(), "pre-commit", "description: no name\n");

        let err = runner(temp.path(), "main").run("pre-commit").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
