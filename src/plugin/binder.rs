//! Command surface and plugin binding.
//!
//! The live command tree is a [`clap::Command`]. Built-in subcommands are
//! declared by the binary; plugin commands are added at runtime as extra
//! subcommands whose invocation target is the plugin's action.

use std::collections::{BTreeSet, HashMap};

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

use super::registry::PluginRegistry;
use super::types::{
    ArgumentDescriptor, ArgumentKind, CommandDescriptor, FlagSpec, Invocation, OptionDescriptor,
    OptionKind, OptionValue, PluginDescriptor,
};
use super::{PluginError, PluginResult};

/// A plugin command bound onto the surface.
#[derive(Debug, Clone)]
pub struct BoundCommand {
    /// Owning plugin
    pub plugin: String,
    /// The command as declared
    pub descriptor: CommandDescriptor,
}

/// The live command tree: built-in commands plus every bound plugin command.
#[derive(Debug, Clone)]
pub struct CommandSurface {
    base: Command,
    root: Command,
    bound: HashMap<String, BoundCommand>,
}

impl CommandSurface {
    /// Wrap the built-in command tree.
    pub fn new(base: Command) -> Self {
        Self { root: base.clone(), base, bound: HashMap::new() }
    }

    /// The current command tree.
    pub fn command(&self) -> &Command {
        &self.root
    }

    /// Every command name and alias currently on the tree.
    ///
    /// Includes the `help` subcommand clap adds when the tree is built.
    pub fn identifiers(&self) -> BTreeSet<String> {
        let help = (!self.root.is_disable_help_subcommand_set()).then(|| "help".to_string());
        self.root
            .get_subcommands()
            .flat_map(|sub| {
                std::iter::once(sub.get_name().to_string())
                    .chain(sub.get_all_aliases().map(str::to_string))
            })
            .chain(help)
            .collect()
    }

    /// Identifiers from `candidates` already taken on the tree, in candidate order.
    pub fn conflicts<'a, I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let taken = self.identifiers();
        let mut seen = BTreeSet::new();
        candidates
            .into_iter()
            .filter(|id| taken.contains(*id) && seen.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// Fail with [`PluginError::CommandConflict`] if any candidate is taken.
    pub fn check_conflicts<'a, I>(&self, candidates: I) -> PluginResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names = self.conflicts(candidates);
        if names.is_empty() {
            Ok(())
        } else {
            Err(PluginError::CommandConflict { names })
        }
    }

    /// Plugin command bound under `name` (command name or alias).
    pub fn resolve(&self, name: &str) -> Option<&BoundCommand> {
        self.bound.get(name).or_else(|| {
            self.bound.values().find(|b| b.descriptor.alias.as_deref() == Some(name))
        })
    }

    /// Number of bound plugin commands.
    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Remove every plugin command, restoring the built-in tree.
    pub fn clear_plugins(&mut self) {
        self.root = self.base.clone();
        self.bound.clear();
    }

    /// Add a plugin command node.
    ///
    /// The caller is responsible for conflict checking; this only builds the node.
    fn bind(&mut self, plugin: &str, command: &CommandDescriptor) -> PluginResult<()> {
        let node = self.build_node(plugin, command)?;
        let root = std::mem::replace(&mut self.root, Command::new(""));
        self.root = root.subcommand(node);
        self.bound.insert(
            command.name.clone(),
            BoundCommand { plugin: plugin.to_string(), descriptor: command.clone() },
        );
        debug!(plugin, command = %command.name, "Bound plugin command");
        Ok(())
    }

    /// Build the clap node for a plugin command without adding it.
    fn build_node(&self, plugin: &str, command: &CommandDescriptor) -> PluginResult<Command> {
        let reserved = ReservedFlags::of(&self.base);
        let mut node = Command::new(command.name.clone())
            .about(format!("[{plugin}] {}", command.description));

        if let Some(ref alias) = command.alias {
            node = node.visible_alias(alias.clone());
        }

        for option in &command.options {
            node = node.arg(build_option(command, option, &reserved)?);
        }

        for argument in &command.arguments {
            let mut arg = Arg::new(argument_id(argument))
                .value_name(argument.name.clone())
                .help(argument.description.clone())
                .action(ArgAction::Set);
            arg = match argument.kind {
                ArgumentKind::Required => arg.required(true),
                ArgumentKind::Optional { default: Some(ref value) } => {
                    arg.required(false).default_value(value.clone())
                }
                ArgumentKind::Optional { default: None } => arg.required(false),
            };
            node = node.arg(arg);
        }

        Ok(node)
    }
}

/// Flags every subcommand inherits from the root: help, global args, and
/// `--version` when it is propagated.
struct ReservedFlags {
    shorts: Vec<char>,
    longs: Vec<String>,
}

impl ReservedFlags {
    fn of(root: &Command) -> Self {
        let mut shorts = vec!['h'];
        let mut longs = vec!["help".to_string()];

        if root.is_propagate_version_set() {
            shorts.push('V');
            longs.push("version".to_string());
        }

        for arg in root.get_arguments().filter(|a| a.is_global_set()) {
            shorts.extend(arg.get_short());
            longs.extend(arg.get_long().map(str::to_string));
        }

        Self { shorts, longs }
    }

    fn contains(&self, spec: &FlagSpec) -> bool {
        spec.short.is_some_and(|c| self.shorts.contains(&c))
            || spec.long.as_ref().is_some_and(|l| self.longs.contains(l))
    }
}

fn option_id(option: &OptionDescriptor) -> String {
    format!("opt.{}", option.spec.key())
}

fn argument_id(argument: &ArgumentDescriptor) -> String {
    format!("arg.{}", argument.name)
}

fn build_option(
    command: &CommandDescriptor,
    option: &OptionDescriptor,
    reserved: &ReservedFlags,
) -> PluginResult<Arg> {
    let spec = &option.spec;
    if reserved.contains(spec) {
        return Err(PluginError::Validation(format!(
            "option '{}' of command '{}' is reserved by snap",
            option.flags, command.name
        )));
    }

    let mut arg = Arg::new(option_id(option)).help(option.description.clone());
    if let Some(short) = spec.short {
        arg = arg.short(short);
    }
    if let Some(ref long) = spec.long {
        arg = arg.long(long.clone());
    }

    arg = match spec.kind {
        OptionKind::Switch => arg.action(ArgAction::SetTrue),
        OptionKind::RequiredValue(ref value) => {
            arg.action(ArgAction::Set).value_name(value.clone())
        }
        OptionKind::OptionalValue(ref value) => {
            arg.action(ArgAction::Set).value_name(value.clone()).num_args(0..=1)
        }
    };

    match (&spec.kind, &option.default_value) {
        (OptionKind::Switch, Some(OptionValue::Text(_))) => {
            return Err(PluginError::Validation(format!(
                "switch '{}' of command '{}' cannot default to text",
                option.flags, command.name
            )));
        }
        (_, Some(default)) => arg = arg.default_value(default.to_env_value()),
        (_, None) => {}
    }

    Ok(arg)
}

/// Build the [`Invocation`] for a matched plugin command.
pub fn invocation_from_matches(command: &CommandDescriptor, matches: &ArgMatches) -> Invocation {
    let mut invocation = Invocation::new(command.name.clone());

    for option in &command.options {
        let id = option_id(option);
        let key = option.spec.key();
        let value = match option.spec.kind {
            OptionKind::Switch => {
                let set = matches.get_flag(&id);
                (set || option.default_value.is_some()).then_some(OptionValue::Flag(set))
            }
            OptionKind::RequiredValue(_) => {
                matches.get_one::<String>(&id).map(|v| OptionValue::Text(v.clone()))
            }
            OptionKind::OptionalValue(_) => match matches.get_one::<String>(&id) {
                Some(v) => Some(OptionValue::Text(v.clone())),
                None if matches.value_source(&id) == Some(ValueSource::CommandLine) => {
                    Some(OptionValue::Flag(true))
                }
                None => None,
            },
        };
        if let Some(value) = value {
            invocation.options.insert(key, value);
        }
    }

    for argument in &command.arguments {
        if let Some(value) = matches.get_one::<String>(&argument_id(argument)) {
            invocation.args.push(value.clone());
        }
    }

    invocation
}

/// Binds plugins onto a command surface and records them in a registry.
pub struct CommandBinder<'a> {
    surface: &'a mut CommandSurface,
    registry: &'a mut PluginRegistry,
}

impl<'a> CommandBinder<'a> {
    /// Create a binder over a surface and its registry.
    pub fn new(surface: &'a mut CommandSurface, registry: &'a mut PluginRegistry) -> Self {
        Self { surface, registry }
    }

    /// Register a plugin.
    ///
    /// Order: duplicate-name check, shape validation, conflict check, `init`,
    /// command nodes, registry insert. Any failure before the nodes are added
    /// leaves both the surface and the registry unchanged.
    pub async fn register_plugin(&mut self, plugin: PluginDescriptor) -> PluginResult<()> {
        if self.registry.contains(&plugin.name) {
            return Err(PluginError::AlreadyRegistered(plugin.name));
        }

        plugin.validate()?;
        self.surface.check_conflicts(plugin.commands.iter().flat_map(|c| c.identifiers()))?;

        for command in &plugin.commands {
            self.surface.build_node(&plugin.name, command)?;
        }

        if let Some(ref init) = plugin.init {
            debug!(plugin = %plugin.name, "Running plugin init");
            init.invoke(&Invocation::new("init")).await.map_err(|e| {
                let name = &plugin.name;
                PluginError::ExecutionError(format!("init of plugin '{name}' failed: {e:#}"))
            })?;
        }

        for command in &plugin.commands {
            self.surface.bind(&plugin.name, command)?;
        }

        self.registry.register(plugin)
    }

    /// Conflict check for a candidate set of command names and aliases.
    pub fn check_conflicts<'b, I>(&self, candidates: I) -> PluginResult<()>
    where
        I: IntoIterator<Item = &'b str>,
    {
        self.surface.check_conflicts(candidates)
    }
}
