//! Registry of bound plugins.
//!
//! Process-scoped table mapping plugin name to descriptor. It is owned by the
//! [`super::PluginManager`] context and rebuilt from disk on every start (or
//! reload); nothing here is persisted.

use std::collections::HashMap;

use super::types::{PluginDescriptor, PluginHook};
use super::{PluginError, PluginResult};

/// Table of currently bound plugins, in registration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginDescriptor>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin.
    ///
    /// Fails with [`PluginError::AlreadyRegistered`] if the name is taken; the
    /// registry is unchanged in that case.
    pub fn register(&mut self, plugin: PluginDescriptor) -> PluginResult<()> {
        if self.index.contains_key(&plugin.name) {
            return Err(PluginError::AlreadyRegistered(plugin.name));
        }

        self.index.insert(plugin.name.clone(), self.plugins.len());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Look up a plugin by name.
    pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
        self.index.get(name).map(|&i| &self.plugins[i])
    }

    /// Whether a plugin with this name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All plugins in registration order.
    pub fn list(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    /// Number of bound plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is bound.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Drop every plugin.
    pub fn clear(&mut self) {
        self.plugins.clear();
        self.index.clear();
    }

    /// Handlers for a lifecycle event, paired with their plugin name.
    pub fn hooks_for<'a>(
        &'a self,
        event: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a PluginHook)> + 'a {
        self.plugins.iter().flat_map(move |plugin| {
            plugin
                .hooks
                .iter()
                .filter(move |hook| hook.event == event)
                .map(move |hook| (plugin.name.as_str(), hook))
        })
    }
}
