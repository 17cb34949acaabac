#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # Snap
//!
//! Version control with plugins and declarative automation hooks.
//!
//! Snap wraps `git` for the everyday lifecycle (commit, push, clone) and
//! adds two extension points on top of it.
//!
//! ## Features
//!
//! - **Plugins**: installable bundles that add subcommands to the CLI and
//!   react to lifecycle events
//! - **Plugin registry**: install, publish and update plugins from a remote
//!   registry
//! - **Hooks**: YAML files under `.snap/hooks/` gated on branch, files,
//!   environment and commands
//! - **Cross-Platform**: Works on Linux, macOS, and Windows
//!
//! ## Quick Start
//!
//! ```bash
//! # Install a plugin from the registry
//! snap plugins --install greeter
//!
//! # Commit, firing pre-commit and post-commit hooks
//! snap commit -m "Initial commit"
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unnecessary_literal_bound)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::unnecessary_map_or)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unnecessary_debug_formatting)]
#![allow(clippy::use_self)]

pub mod core;
pub mod error;
pub mod git;
pub mod hooks;
pub mod plugin;

pub use core::{Config, Paths};
pub use error::ErrorKind;
pub use git::{GitRepository, ShimManager};
pub use hooks::{
    HookConfigLoader, HookDefinition, HookError, HookExecutor, HookOutcome, HookPoint, HookRunner,
};
pub use plugin::{
    CommandBinder, CommandSurface, PluginDescriptor, PluginError, PluginInstaller, PluginLoader,
    PluginManager, PluginPublisher, PluginRegistry, PluginResult, PluginTestHarness,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "snap";

/// Short alias
pub const APP_ALIAS: &str = "sn";
