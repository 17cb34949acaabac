//! Plugin manifest and entry-module parsing.
//!
//! A plugin directory holds a `plugin.toml` manifest describing the package
//! (name, version, entry point, scripts) and an entry module describing the
//! plugin itself (commands, hooks, init). Both are TOML. Raw shapes are
//! deserialized here and converted into validated descriptors before anything
//! is registered.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::{
    ActionRef, ArgumentDescriptor, CommandDescriptor, OptionDescriptor, OptionValue,
    PluginDescriptor, ShellAction, DEFAULT_ENTRY, MANIFEST_FILE,
};
use super::{PluginError, PluginResult};

/// Package manifest (`plugin.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Package metadata.
    pub plugin: PackageMetadata,
    /// Lifecycle scripts.
    #[serde(default)]
    pub scripts: PluginScripts,
}

/// Package metadata section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Plugin name.
    #[serde(default)]
    pub name: Option<String>,
    /// Plugin version.
    #[serde(default)]
    pub version: Option<String>,
    /// Entry module, relative to the plugin directory.
    #[serde(default)]
    pub main: Option<String>,
    /// Plugin description.
    #[serde(default)]
    pub description: Option<String>,
    /// Keywords, published as registry tags.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Scripts run after installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginScripts {
    /// Dependency installation step.
    #[serde(default)]
    pub install: Option<String>,
    /// Build step.
    #[serde(default)]
    pub build: Option<String>,
}

impl PluginManifest {
    /// Parse a manifest from TOML string.
    pub fn from_toml(content: &str) -> PluginResult<Self> {
        toml::from_str(content)
            .map_err(|e| PluginError::Validation(format!("{MANIFEST_FILE}: {e}")))
    }

    /// Read the manifest inside a plugin directory.
    pub fn from_dir(dir: &Path) -> PluginResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(PluginError::NotFound(path));
        }
        Self::from_toml(&std::fs::read_to_string(&path)?)
    }

    /// Names of required fields (`name`, `version`, `main`) that are absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let mut missing = Vec::new();
        if !present(&self.plugin.name) {
            missing.push("name");
        }
        if !present(&self.plugin.version) {
            missing.push("version");
        }
        if !present(&self.plugin.main) {
            missing.push("main");
        }
        missing
    }

    /// Path of the entry module, defaulting to `index.toml`.
    pub fn entry_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.plugin.main.as_deref().unwrap_or(DEFAULT_ENTRY))
    }
}

/// Entry module as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryModule {
    name: toml::Value,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    init: Option<String>,
    #[serde(default)]
    commands: Vec<RawCommand>,
    #[serde(default)]
    hooks: Vec<RawHook>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCommand {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    alias: Option<String>,
    run: String,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    arguments: Vec<RawArgument>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawOption {
    flags: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    default: Option<OptionValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawArgument {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawHook {
    event: String,
    run: String,
}

impl EntryModule {
    /// Parse an entry module from TOML string.
    pub fn from_toml(content: &str) -> PluginResult<Self> {
        toml::from_str(content).map_err(|e| PluginError::Validation(format!("entry module: {e}")))
    }

    /// Read an entry module file.
    pub fn from_file(path: &Path) -> PluginResult<Self> {
        if !path.is_file() {
            return Err(PluginError::NotFound(path.to_path_buf()));
        }
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Convert into a validated descriptor.
    ///
    /// `fallback_version` is used when the entry module does not declare one
    /// (the manifest version). Shell actions export `plugin_dir` as
    /// `SNAP_PLUGIN_DIR`; `init` runs inside it.
    pub fn into_descriptor(
        self,
        plugin_dir: &Path,
        fallback_version: Option<&str>,
    ) -> PluginResult<PluginDescriptor> {
        let name = match self.name {
            toml::Value::String(s) if !s.trim().is_empty() => s,
            _ => return Err(PluginError::Validation("plugin name must be a string".to_string())),
        };

        let version = self
            .version
            .or_else(|| fallback_version.map(str::to_string))
            .ok_or_else(|| PluginError::Validation(format!("plugin '{name}' has no version")))?;

        let shell = |run: &str| -> ActionRef {
            Arc::new(ShellAction::new(name.clone(), run).plugin_dir(plugin_dir))
        };

        let mut plugin = PluginDescriptor::new(name.clone(), version);
        plugin.description = self.description;
        plugin.source = Some(plugin_dir.to_path_buf());

        if let Some(ref init) = self.init {
            plugin.init = Some(Arc::new(
                ShellAction::new(name.clone(), init).plugin_dir(plugin_dir).working_dir(plugin_dir),
            ));
        }

        for raw in self.commands {
            let mut command = CommandDescriptor::new(raw.name, raw.description, shell(&raw.run));
            command.alias = raw.alias.filter(|a| !a.trim().is_empty());

            for opt in raw.options {
                let mut option = OptionDescriptor::new(opt.flags, opt.description)?;
                option.default_value = opt.default;
                command.options.push(option);
            }

            for arg in raw.arguments {
                command.arguments.push(if arg.required {
                    ArgumentDescriptor::required(arg.name, arg.description)
                } else {
                    ArgumentDescriptor::optional(arg.name, arg.description, arg.default)
                });
            }

            plugin.commands.push(command);
        }

        for hook in self.hooks {
            plugin = plugin.with_hook(hook.event, shell(&hook.run));
        }

        plugin.validate()?;
        Ok(plugin)
    }
}

/// Load the plugin in `dir`: manifest, entry module, descriptor.
pub fn load_plugin_dir(dir: &Path) -> PluginResult<PluginDescriptor> {
    let manifest = PluginManifest::from_dir(dir)?;
    let entry = manifest.entry_path(dir);
    EntryModule::from_file(&entry)?.into_descriptor(dir, manifest.plugin.version.as_deref())
}
