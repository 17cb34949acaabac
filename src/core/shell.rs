//! Shell command execution.
//!
//! Every user-supplied command line (plugin actions, plugin init and build
//! scripts, hook commands, hook command gates) is run through the platform
//! shell by this module.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command as ProcessCommand;

/// Outcome of running a shell command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellStatus {
    /// Exited with status zero.
    Success,
    /// Exited non-zero (or was killed by a signal, in which case the code is `None`).
    Failed(Option<i32>),
    /// Did not finish within the timeout and was killed.
    TimedOut(Duration),
}

impl ShellStatus {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Human-readable description of a non-success outcome.
    pub fn describe(&self) -> String {
        match self {
            Self::Success => "succeeded".to_string(),
            Self::Failed(Some(code)) => format!("exited with code {code}"),
            Self::Failed(None) => "terminated by signal".to_string(),
            Self::TimedOut(limit) => format!("timed out after {}ms", limit.as_millis()),
        }
    }
}

/// Result of a finished shell command.
#[derive(Debug, Clone)]
pub struct ShellRun {
    /// How the command ended
    pub status: ShellStatus,
    /// Wall-clock time spent
    pub duration: Duration,
}

/// A command line to run through the platform shell.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    line: String,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    args: Vec<String>,
    timeout: Option<Duration>,
    quiet: bool,
}

impl ShellCommand {
    /// Create a command for a single shell line.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            working_dir: None,
            env: Vec::new(),
            args: Vec::new(),
            timeout: None,
            quiet: false,
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add an environment variable; later entries win.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Add several environment variables in order.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Positional parameters (`$1..$n` on Unix shells).
    #[must_use]
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Kill the command if it runs longer than `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Discard stdout/stderr instead of passing them to the terminal.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Same settings, different command line.
    #[must_use]
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.line = line.into();
        self
    }

    /// The command line as written.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Spawn the command and wait for it to finish.
    ///
    /// Only spawn/wait failures are errors; a non-zero exit or a timeout is
    /// reported through [`ShellStatus`].
    pub async fn run(&self) -> std::io::Result<ShellRun> {
        let start = Instant::now();
        let (shell, shell_arg) = get_shell();

        let mut cmd = ProcessCommand::new(shell);
        cmd.arg(shell_arg).arg(&self.line);

        if cfg!(not(target_os = "windows")) && !self.args.is_empty() {
            cmd.arg(crate::APP_NAME).args(&self.args);
        }

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        if self.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Ok(ShellRun {
                        status: ShellStatus::TimedOut(limit),
                        duration: start.elapsed(),
                    });
                }
            },
            None => child.wait().await?,
        };

        let status = if status.success() {
            ShellStatus::Success
        } else {
            ShellStatus::Failed(status.code())
        };

        Ok(ShellRun { status, duration: start.elapsed() })
    }
}

/// Get the shell and argument for the current platform.
pub fn get_shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}
