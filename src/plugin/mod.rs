//! Plugin system for Snap.
//!
//! Plugins extend the command line with new subcommands and lifecycle hooks.
//! Each installed plugin lives in its own directory under the plugin storage
//! root and is bound onto the live command tree at startup.
//!
//! # Layout
//!
//! ```text
//! ~/.snap/plugins/
//!   greeter/
//!     plugin.toml     # package manifest
//!     index.toml      # entry module: commands, hooks, init
//! ```
//!
//! # Entry module
//!
//! ```toml
//! name = "greeter"
//! description = "Says hello"
//!
//! [[commands]]
//! name = "greet"
//! alias = "gr"
//! description = "Greet someone"
//! run = "echo \"hello $SNAP_OPT_NAME\""
//!
//! [[commands.options]]
//! flags = "-n, --name <name>"
//! description = "Who to greet"
//! default = "world"
//!
//! [[hooks]]
//! event = "post-commit"
//! run = "echo committed"
//! ```

mod binder;
mod error;
mod harness;
mod installer;
mod loader;
mod manager;
mod manifest;
mod publisher;
mod registry;
mod remote;
mod types;

pub use binder::{invocation_from_matches, BoundCommand, CommandBinder, CommandSurface};
pub use error::{PluginError, PluginResult};
pub use harness::{load_isolated, parse_invocation, HarnessOutcome, PluginTestHarness};
pub use installer::{InstallReport, PluginInstaller};
pub use loader::{LoadSummary, PluginLoader};
pub use manager::PluginManager;
pub use manifest::{load_plugin_dir, EntryModule, PackageMetadata, PluginManifest, PluginScripts};
pub use publisher::{bundle, PluginPublisher, EXCLUDED_DIRS};
pub use registry::PluginRegistry;
pub use remote::{
    HttpRegistry, PublishManifest, RegistryApi, RemoteCommand, RemoteFile, RemotePlugin,
};
pub use types::{
    option_env_name, ActionRef, ArgumentDescriptor, ArgumentKind, CommandDescriptor, FlagSpec,
    Invocation, OptionDescriptor, OptionKind, OptionValue, PluginAction, PluginDescriptor,
    PluginHook, ShellAction, DEFAULT_ENTRY, MANIFEST_FILE,
};
