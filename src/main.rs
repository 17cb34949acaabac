//! Snap - version control with plugins and automation hooks.
//!
//! Built-in commands are declared with clap derive. Installed plugins are
//! bound onto the same command tree at startup, so the tree is parsed as a
//! whole and plugin subcommands are dispatched before the derive layer sees
//! the matches.

#![allow(clippy::single_match_else)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use snapvc::core::{Config, Credentials, Paths};
use snapvc::git::{self, GitRepository, ShimManager};
use snapvc::hooks::{
    ConditionEvaluator, GitBranch, HookConfigLoader, HookExecutor, HookOutcome, HookPoint,
    HookRunner,
};
use snapvc::plugin::{
    HarnessOutcome, HttpRegistry, PluginInstaller, PluginManager, PluginPublisher,
    PluginTestHarness, RegistryApi,
};

/// Version control with plugins and automation hooks
#[derive(Parser)]
#[command(name = "snap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage plugins
    Plugins(PluginsArgs),

    /// Manage automation hooks
    Hooks {
        #[command(subcommand)]
        operation: HooksOperation,
    },

    /// Store a registry token for publishing
    Login {
        /// Registry token
        #[arg(long)]
        token: String,

        /// Registry user the token belongs to
        #[arg(long)]
        user: Option<String>,
    },

    /// Forget the stored registry token
    Logout,

    /// Record changes (fires pre-commit and post-commit)
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Skip the pre-commit hook
        #[arg(long)]
        no_verify: bool,

        /// Extra arguments passed to `git commit`
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Push commits (fires post-push)
    Push {
        /// Remote name
        remote: Option<String>,

        /// Branch name
        branch: Option<String>,

        /// Extra arguments passed to `git push`
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Clone a repository (fires post-clone)
    Clone {
        /// Repository URL
        url: String,

        /// Target directory
        dir: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Args)]
struct PluginsArgs {
    /// List installed plugins (default)
    #[arg(long, conflicts_with_all = ["install", "remove", "publish", "test"])]
    list: bool,

    /// Install a plugin from the registry
    #[arg(long, value_name = "ID", conflicts_with_all = ["remove", "publish", "test"])]
    install: Option<String>,

    /// Remove an installed plugin
    #[arg(long, value_name = "NAME", conflicts_with_all = ["publish", "test"])]
    remove: Option<String>,

    /// Publish the plugin in the current directory
    #[arg(long, conflicts_with = "test")]
    publish: bool,

    /// With --publish, update an already published plugin
    #[arg(long, requires = "publish")]
    update: bool,

    /// Run a command of the plugin in the current directory
    #[arg(long, value_name = "COMMAND", num_args = 0.., allow_hyphen_values = true)]
    test: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum HooksOperation {
    /// List hooks and installed git shims
    List,

    /// Run a hook by name
    Run {
        /// Hook name (e.g. pre-commit)
        name: String,
    },

    /// Install git shims so plain `git commit` fires Snap hooks
    Install {
        /// Overwrite hooks not managed by Snap
        #[arg(short, long)]
        force: bool,
    },

    /// Remove the git shims
    Uninstall {
        /// Remove hooks not managed by Snap too
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Plugins are loaded before argv is parsed, so look for the flag directly.
    let verbose = std::env::args().skip(1).any(|a| a == "-v" || a == "--verbose");

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run())
}

async fn run() -> Result<()> {
    let config = Config::load()?;
    let paths = Paths::resolve()?.with_config(&config);

    let mut manager = PluginManager::new(paths, Cli::command());
    let summary = manager.load().await?;
    debug!(loaded = summary.loaded.len(), failed = summary.failed.len(), "Plugins loaded");

    let matches = manager.surface().command().clone().get_matches();

    if let Some((name, sub)) = matches.subcommand() {
        if manager.is_plugin_command(name) {
            manager.dispatch(name, sub).await?;
            return Ok(());
        }
    }

    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    debug!(verbose = cli.verbose, "Parsed command line");

    match cli.command {
        None => {
            manager.surface().command().clone().print_help()?;
        }
        Some(Commands::Plugins(args)) => {
            cmd_plugins(&mut manager, &config, args).await?;
        }
        Some(Commands::Hooks { operation }) => {
            cmd_hooks(&manager, &config, operation).await?;
        }
        Some(Commands::Login { token, user }) => {
            let path = manager.paths().credentials_file();
            Credentials { auth_token: Some(token), user_id: user }.save(&path)?;
            println!("Credential saved to {}", path.display());
        }
        Some(Commands::Logout) => {
            Credentials::clear(&manager.paths().credentials_file())?;
            println!("Logged out");
        }
        Some(Commands::Commit { message, no_verify, extra }) => {
            let cwd = std::env::current_dir()?;
            let root = project_root(&cwd);
            if !no_verify {
                fire(&manager, &config, &root, HookPoint::PreCommit).await?;
            }
            git::commit(&message, &extra, &cwd).await?;
            fire(&manager, &config, &root, HookPoint::PostCommit).await?;
        }
        Some(Commands::Push { remote, branch, extra }) => {
            let cwd = std::env::current_dir()?;
            git::push(remote.as_deref(), branch.as_deref(), &extra, &cwd).await?;
            fire(&manager, &config, &project_root(&cwd), HookPoint::PostPush).await?;
        }
        Some(Commands::Clone { url, dir }) => {
            let cwd = std::env::current_dir()?;
            let target = git::clone(&url, dir.as_deref(), &cwd).await?;
            fire(&manager, &config, &target, HookPoint::PostClone).await?;
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = manager.surface().command().clone();
            generate(shell, &mut cmd, snapvc::APP_NAME, &mut io::stdout());
        }
    }

    Ok(())
}

/// Working tree root of the repository containing `cwd`, else `cwd`.
fn project_root(cwd: &Path) -> PathBuf {
    GitRepository::discover(cwd).and_then(|repo| repo.root()).unwrap_or_else(|| cwd.to_path_buf())
}

fn registry_client(config: &Config) -> Result<Arc<dyn RegistryApi>> {
    let timeout = Duration::from_secs(config.registry.timeout_secs);
    Ok(Arc::new(HttpRegistry::new(&config.registry.url, timeout)?))
}

/// Run the declarative hook for `name`, then every plugin hook bound to it.
async fn fire(
    manager: &PluginManager,
    config: &Config,
    root: &Path,
    name: impl std::fmt::Display,
) -> Result<()> {
    let name = name.to_string();
    let timeout = Duration::from_millis(config.hooks.default_timeout_ms);
    let runner = HookRunner::new(
        HookConfigLoader::for_project(root, &config.hooks),
        ConditionEvaluator::new(GitBranch::new(root), root).command_timeout(timeout),
        HookExecutor::new(root).default_timeout(timeout),
    );

    match runner.run(&name).await? {
        HookOutcome::NotFound => debug!(hook = %name, "No hook file"),
        HookOutcome::Disabled => {}
        HookOutcome::Skipped(reason) => println!("Skipped {name} hook: {reason}"),
        HookOutcome::Completed(report) => {
            let failures = report.failures();
            if failures > 0 {
                println!("Hook '{}' finished with {failures} tolerated failure(s)", report.hook);
            }
        }
    }

    manager.run_plugin_hooks(&name).await;
    Ok(())
}

/// Handle plugin commands.
async fn cmd_plugins(
    manager: &mut PluginManager,
    config: &Config,
    args: PluginsArgs,
) -> Result<()> {
    let cwd = std::env::current_dir()?;

    if let Some(id) = args.install {
        let installer = PluginInstaller::new(registry_client(config)?, manager.paths().clone());
        let report = installer.install(&id, manager.surface()).await?;
        let verb = if report.replaced { "Reinstalled" } else { "Installed" };
        println!("{verb} {} v{}", report.name, report.version);
        println!("Location: {}", report.path.display());

        let summary = manager.reload().await?;
        if let Some((_, error)) = summary.failed.iter().find(|(name, _)| *name == report.name) {
            println!("Warning: the plugin was installed but failed to load: {error}");
        }
    } else if let Some(name) = args.remove {
        let installer = PluginInstaller::new(registry_client(config)?, manager.paths().clone());
        installer.remove(&name)?;
        println!("Removed plugin: {name}");
    } else if args.publish {
        let publisher =
            PluginPublisher::new(registry_client(config)?, manager.paths().credentials_file());
        let published = publisher.publish(&cwd, args.update).await?;
        let verb = if args.update { "Updated" } else { "Published" };
        println!(
            "{verb} {} v{} ({} file(s))",
            published.name,
            published.version,
            published.files.len()
        );
    } else if let Some(command) = args.test {
        let mut harness = PluginTestHarness::new(io::stdout());
        if let HarnessOutcome::Executed(invocation) = harness.test(&cwd, &command).await? {
            debug!(command = %invocation.command, "Plugin command finished");
        }
    } else {
        list_plugins(manager);
    }

    Ok(())
}

fn list_plugins(manager: &PluginManager) {
    let plugins = manager.registry().list();

    if plugins.is_empty() {
        println!("No plugins installed.");
        println!("\nInstall plugins with:");
        println!("  snap plugins --install <id>");
        return;
    }

    println!("Installed plugins:\n");
    for plugin in plugins {
        println!("  {} v{}", plugin.name, plugin.version);
        if let Some(ref desc) = plugin.description {
            println!("      {desc}");
        }
        for command in &plugin.commands {
            match command.alias {
                Some(ref alias) => println!("      {} ({alias})", command.name),
                None => println!("      {}", command.name),
            }
        }
    }
    println!("\nTotal: {} plugin(s)", plugins.len());
}

/// Handle hook commands.
async fn cmd_hooks(
    manager: &PluginManager,
    config: &Config,
    operation: HooksOperation,
) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let root = project_root(&cwd);

    match operation {
        HooksOperation::List => {
            let loader = HookConfigLoader::for_project(&root, &config.hooks);
            let hooks = loader.list()?;

            if hooks.is_empty() {
                println!("No hooks in {}", loader.dir().display());
            } else {
                println!("Hooks in {}:\n", loader.dir().display());
                for hook in &hooks {
                    let state = if hook.enabled { "" } else { " [disabled]" };
                    println!("  {}: {}{state}", hook.hook_type, hook.name);
                    if let Some(ref desc) = hook.description {
                        println!("      {desc}");
                    }
                }
            }

            if let Some(shims) = ShimManager::discover(&cwd) {
                println!("\nGit shims:");
                for shim in shims.list() {
                    let state = match (shim.exists, shim.is_snap) {
                        (false, _) => "not installed",
                        (true, true) if shim.is_executable => "installed",
                        (true, true) => "installed [not executable]",
                        (true, false) => "external hook",
                    };
                    println!("  {}: {state}", shim.point);
                }
            }
        }

        HooksOperation::Run { name } => {
            fire(manager, config, &root, name).await?;
        }

        HooksOperation::Install { force } => {
            let shims = ShimManager::discover(&cwd)
                .ok_or_else(|| anyhow::anyhow!("Not in a Git repository"))?;
            for shim in shims.list() {
                let path = shims.install(shim.point, force)?;
                println!("Installed shim: {}", path.display());
            }
        }

        HooksOperation::Uninstall { force } => {
            let shims = ShimManager::discover(&cwd)
                .ok_or_else(|| anyhow::anyhow!("Not in a Git repository"))?;
            let mut removed = 0;
            for shim in shims.list() {
                if shim.exists && (shim.is_snap || force) {
                    shims.uninstall(shim.point, force)?;
                    removed += 1;
                }
            }
            println!("Removed {removed} shim(s)");
        }
    }

    Ok(())
}
