//! Running a hook's command list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use super::config::HookDefinition;
use super::{HookError, HookResult};
use crate::core::{ShellCommand, ShellStatus};

/// Environment variable carrying the hook's declared name.
pub const HOOK_NAME_ENV: &str = "SNAP_HOOK_NAME";

/// Environment variable carrying the running Snap version.
pub const HOOK_VERSION_ENV: &str = "SNAP_HOOK_VERSION";

/// Outcome of one command of a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    /// The command line
    pub command: String,
    /// How it ended; `None` if it could not be started
    pub status: Option<ShellStatus>,
    /// Wall-clock time spent
    pub duration: Duration,
}

impl CommandReport {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.status.as_ref().is_some_and(ShellStatus::success)
    }
}

/// Outcome of a hook run that did not fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookReport {
    /// Declared hook name
    pub hook: String,
    /// Every command that was started, in declaration order
    pub commands: Vec<CommandReport>,
}

impl HookReport {
    /// Number of commands that failed (tolerated when `failOnError` is off).
    pub fn failures(&self) -> usize {
        self.commands.iter().filter(|c| !c.success()).count()
    }
}

/// Runs hook commands through the platform shell.
#[derive(Debug, Clone)]
pub struct HookExecutor {
    cwd: PathBuf,
    default_timeout: Duration,
}

impl HookExecutor {
    /// Create an executor whose default working directory is `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            default_timeout: Duration::from_millis(super::DEFAULT_TIMEOUT_MS),
        }
    }

    /// Timeout for hooks that do not declare one.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run every command of `hook`.
    ///
    /// Sequential hooks stop at the first failure when `failOnError` is set.
    /// Parallel hooks always wait for every command and then report the first
    /// failure in declaration order.
    pub async fn execute(&self, hook: &HookDefinition) -> HookResult<HookReport> {
        let dir = self.working_dir(hook);
        let timeout = hook.timeout.map_or(self.default_timeout, Duration::from_millis);
        let template = ShellCommand::new("")
            .working_dir(&dir)
            .timeout(timeout)
            .env(HOOK_NAME_ENV, &hook.name)
            .env(HOOK_VERSION_ENV, crate::VERSION)
            .envs(hook.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        debug!(
            hook = %hook.name,
            commands = hook.run.len(),
            parallel = hook.parallel,
            dir = %dir.display(),
            "Running hook"
        );

        let mut report = HookReport { hook: hook.name.clone(), commands: Vec::new() };

        if hook.parallel {
            let runs = join_all(hook.run.iter().map(|line| run_one(&template, line))).await;
            report.commands = runs;
            for command in &report.commands {
                check(hook, command)?;
            }
        } else {
            for line in &hook.run {
                let command = run_one(&template, line).await;
                let outcome = check(hook, &command);
                report.commands.push(command);
                outcome?;
            }
        }

        Ok(report)
    }

    fn working_dir(&self, hook: &HookDefinition) -> PathBuf {
        match hook.working_dir.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(dir) => {
                let expanded = PathBuf::from(shellexpand::tilde(dir).as_ref());
                if expanded.is_absolute() {
                    expanded
                } else {
                    self.cwd.join(expanded)
                }
            }
            None => self.cwd.clone(),
        }
    }

    /// The directory hooks without `workingDir` run in.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

async fn run_one(template: &ShellCommand, line: &str) -> CommandReport {
    let command = template.clone().with_line(line);
    match command.run().await {
        Ok(run) => CommandReport {
            command: line.to_string(),
            status: Some(run.status),
            duration: run.duration,
        },
        Err(e) => {
            warn!(command = line, error = %e, "Could not start hook command");
            CommandReport { command: line.to_string(), status: None, duration: Duration::ZERO }
        }
    }
}

/// Apply the fail policy to one finished command.
fn check(hook: &HookDefinition, command: &CommandReport) -> HookResult<()> {
    if command.success() {
        return Ok(());
    }

    let reason = command
        .status
        .as_ref()
        .map_or_else(|| "could not be started".to_string(), ShellStatus::describe);

    if hook.fail_on_error {
        return Err(HookError::CommandFailed {
            hook: hook.name.clone(),
            command: command.command.clone(),
            reason,
        });
    }

    warn!(hook = %hook.name, command = %command.command, %reason, "Hook command failed");
    Ok(())
}
