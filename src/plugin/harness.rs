//! Running a plugin's commands in isolation.
//!
//! The harness loads a plugin straight from its directory and never touches
//! the live command surface or the registry, so a broken plugin under
//! development cannot disturb installed ones.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::manifest::{EntryModule, PluginManifest};
use super::types::{
    ArgumentKind, CommandDescriptor, Invocation, OptionKind, OptionValue, PluginDescriptor,
};
use super::{PluginError, PluginResult};

/// What a harness run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarnessOutcome {
    /// No command was named; this many commands were listed.
    Listed(usize),
    /// The named command ran with this invocation.
    Executed(Invocation),
}

/// Loads a plugin from disk and exercises one command.
pub struct PluginTestHarness<W: Write> {
    out: W,
}

impl<W: Write> PluginTestHarness<W> {
    /// Create a harness writing listings to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the harness, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Test the plugin in `plugin_dir`.
    ///
    /// With no `args` the declared commands are listed. Otherwise `args[0]`
    /// names the command and the rest are parsed against its options.
    pub async fn test(
        &mut self,
        plugin_dir: &Path,
        args: &[String],
    ) -> PluginResult<HarnessOutcome> {
        let plugin = load_isolated(plugin_dir)?;

        let Some((name, rest)) = args.split_first() else {
            return self.list(&plugin);
        };

        let command = plugin
            .commands
            .iter()
            .find(|c| c.identifiers().any(|id| id == name.as_str()))
            .ok_or_else(|| PluginError::CommandNotFound(name.clone()))?;

        let invocation = parse_invocation(command, rest)?;
        debug!(plugin = %plugin.name, command = %command.name, ?invocation, "Invoking command");

        command
            .action
            .invoke(&invocation)
            .await
            .map_err(|e| PluginError::CommandExecutionFailed(format!("{e:#}")))?;

        Ok(HarnessOutcome::Executed(invocation))
    }

    fn list(&mut self, plugin: &PluginDescriptor) -> PluginResult<HarnessOutcome> {
        if plugin.commands.is_empty() {
            writeln!(self.out, "Plugin '{}' declares no commands", plugin.name)?;
            return Ok(HarnessOutcome::Listed(0));
        }

        writeln!(self.out, "Available commands:")?;
        for command in &plugin.commands {
            writeln!(self.out, "  {} - {}", command.name, command.description)?;
            for option in &command.options {
                writeln!(self.out, "      {}  {}", option.flags, option.description)?;
            }
        }
        Ok(HarnessOutcome::Listed(plugin.commands.len()))
    }
}

/// Load and validate a plugin directly from its directory.
pub fn load_isolated(plugin_dir: &Path) -> PluginResult<PluginDescriptor> {
    let manifest = PluginManifest::from_dir(plugin_dir)?;
    let missing = manifest.missing_fields();
    if !missing.is_empty() {
        return Err(PluginError::Validation(format!(
            "plugin.toml is missing required field(s): {}",
            missing.join(", ")
        )));
    }

    let entry = manifest.entry_path(plugin_dir);
    EntryModule::from_file(&entry)?.into_descriptor(plugin_dir, manifest.plugin.version.as_deref())
}

fn looks_like_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

/// Parse command-line tokens against a command's declared options.
pub fn parse_invocation(
    command: &CommandDescriptor,
    tokens: &[String],
) -> PluginResult<Invocation> {
    let mut invocation = Invocation::new(command.name.clone());
    let mut tokens = tokens.iter().peekable();

    while let Some(token) = tokens.next() {
        if !looks_like_flag(token) {
            invocation.args.push(token.clone());
            continue;
        }

        let option = command.find_option(token).ok_or_else(|| PluginError::InvalidOption {
            option: token.clone(),
            command: command.name.clone(),
        })?;

        let next_is_value = tokens.peek().is_some_and(|next| !looks_like_flag(next));
        let value = match option.spec.kind {
            OptionKind::Switch => OptionValue::Flag(true),
            OptionKind::RequiredValue(_) if next_is_value => {
                OptionValue::Text(tokens.next().cloned().unwrap_or_default())
            }
            OptionKind::RequiredValue(_) => {
                return Err(PluginError::MissingOptionValue(token.clone()));
            }
            OptionKind::OptionalValue(_) if next_is_value => {
                OptionValue::Text(tokens.next().cloned().unwrap_or_default())
            }
            OptionKind::OptionalValue(_) => OptionValue::Flag(true),
        };
        invocation.options.insert(option.spec.key(), value);
    }

    for option in &command.options {
        if let Some(ref default) = option.default_value {
            invocation.options.entry(option.spec.key()).or_insert_with(|| default.clone());
        }
    }

    for argument in command.arguments.iter().skip(invocation.args.len()) {
        match argument.kind {
            ArgumentKind::Optional { default: Some(ref value) } => {
                invocation.args.push(value.clone());
            }
            _ => break,
        }
    }

    Ok(invocation)
}
