//! Plugin manager: the context object owning the registry and command surface.
//!
//! One instance is created in `main` and passed to whatever needs plugin
//! state. There is no global.

use clap::{ArgMatches, Command};
use tracing::{debug, warn};

use super::binder::{invocation_from_matches, CommandBinder, CommandSurface};
use super::loader::{LoadSummary, PluginLoader};
use super::registry::PluginRegistry;
use super::types::{Invocation, PluginDescriptor};
use super::{PluginError, PluginResult};
use crate::core::Paths;

/// Owns the plugin registry and the live command tree.
pub struct PluginManager {
    paths: Paths,
    registry: PluginRegistry,
    surface: CommandSurface,
}

impl PluginManager {
    /// Create a manager over the built-in command tree.
    pub fn new(paths: Paths, builtins: Command) -> Self {
        Self { paths, registry: PluginRegistry::new(), surface: CommandSurface::new(builtins) }
    }

    /// Resolved on-disk locations.
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Bound plugins.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// The live command tree.
    pub fn surface(&self) -> &CommandSurface {
        &self.surface
    }

    /// Load every installed plugin.
    pub async fn load(&mut self) -> PluginResult<LoadSummary> {
        let loader = PluginLoader::new(self.paths.plugins_dir());
        let mut binder = CommandBinder::new(&mut self.surface, &mut self.registry);
        loader.load(&mut binder).await
    }

    /// Drop every bound plugin and load again from disk.
    pub async fn reload(&mut self) -> PluginResult<LoadSummary> {
        debug!("Reloading plugins");
        self.registry.clear();
        self.surface.clear_plugins();
        self.load().await
    }

    /// Bind an in-process plugin.
    pub async fn register_plugin(&mut self, plugin: PluginDescriptor) -> PluginResult<()> {
        CommandBinder::new(&mut self.surface, &mut self.registry).register_plugin(plugin).await
    }

    /// Fail if any candidate name or alias is already on the command tree.
    pub fn check_conflicts<'a, I>(&self, candidates: I) -> PluginResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.surface.check_conflicts(candidates)
    }

    /// Whether `name` is a plugin command (or alias).
    pub fn is_plugin_command(&self, name: &str) -> bool {
        self.surface.resolve(name).is_some()
    }

    /// Run the plugin command matched as `name`.
    pub async fn dispatch(&self, name: &str, matches: &ArgMatches) -> PluginResult<()> {
        let bound = self
            .surface
            .resolve(name)
            .ok_or_else(|| PluginError::CommandNotFound(name.to_string()))?;
        let invocation = invocation_from_matches(&bound.descriptor, matches);

        debug!(plugin = %bound.plugin, command = %invocation.command, "Dispatching plugin command");
        bound
            .descriptor
            .action
            .invoke(&invocation)
            .await
            .map_err(|e| PluginError::CommandExecutionFailed(format!("{e:#}")))
    }

    /// Run every plugin handler bound to `event`, in registration order.
    ///
    /// A failing handler is logged and does not stop the others. Returns the
    /// number of handlers that succeeded.
    pub async fn run_plugin_hooks(&self, event: &str) -> usize {
        let invocation = Invocation::new(event);
        let mut succeeded = 0;

        for (plugin, hook) in self.registry.hooks_for(event) {
            match hook.handler.invoke(&invocation).await {
                Ok(()) => succeeded += 1,
                Err(e) => warn!(plugin, event, error = %format!("{e:#}"), "Plugin hook failed"),
            }
        }

        succeeded
    }
}
