//! Core plugin types.
//!
//! Descriptors are the validated, strongly typed form of a plugin. They are
//! produced from on-disk entry modules by [`super::manifest`] or built in
//! process, and are owned by the [`super::PluginRegistry`] once bound.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginResult};
use crate::core::ShellCommand;

/// Plugin manifest file name.
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Entry module used when the manifest does not name one.
pub const DEFAULT_ENTRY: &str = "index.toml";

/// Something a plugin can run: a command action, an init step, or a hook handler.
#[async_trait]
pub trait PluginAction: Send + Sync {
    /// Run the action with parsed options and positional arguments.
    async fn invoke(&self, invocation: &Invocation) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> PluginAction for F
where
    F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync,
{
    async fn invoke(&self, invocation: &Invocation) -> anyhow::Result<()> {
        self(invocation)
    }
}

/// Shared handle to an action.
pub type ActionRef = Arc<dyn PluginAction>;

/// A parsed option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Switch state.
    Flag(bool),
    /// Option argument.
    Text(String),
}

impl OptionValue {
    /// String form used for environment variables.
    pub fn to_env_value(&self) -> String {
        match self {
            Self::Flag(b) => b.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_env_value())
    }
}

/// What a command action receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Command name as invoked
    pub command: String,
    /// Options keyed by their long name (or short letter if there is none)
    pub options: BTreeMap<String, OptionValue>,
    /// Positional arguments in order
    pub args: Vec<String>,
}

impl Invocation {
    /// Create an empty invocation for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), ..Self::default() }
    }

    /// Whether a switch option was set.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.options.get(key), Some(OptionValue::Flag(true)))
    }

    /// Value of a value-taking option.
    pub fn value(&self, key: &str) -> Option<&str> {
        match self.options.get(key) {
            Some(OptionValue::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// Whether and how an option takes a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    /// `--verbose`
    Switch,
    /// `--name <value>`
    RequiredValue(String),
    /// `--name [value]`
    OptionalValue(String),
}

impl OptionKind {
    /// Whether the option consumes a value token.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::Switch)
    }
}

/// Parsed flag-spec such as `-n, --name <value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    /// Single-letter form
    pub short: Option<char>,
    /// Long form without dashes
    pub long: Option<String>,
    /// Value behaviour
    pub kind: OptionKind,
}

impl FlagSpec {
    /// Parse a flag-spec string.
    ///
    /// Forms may be separated by commas, spaces, or `|`. Short forms must be a
    /// single character.
    pub fn parse(flags: &str) -> PluginResult<Self> {
        let mut short = None;
        let mut long = None;
        let mut kind = OptionKind::Switch;

        for token in flags.split(|c: char| c == ',' || c == '|' || c.is_whitespace()) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            if let Some(name) = token.strip_prefix("--") {
                if name.is_empty() || long.is_some() {
                    return Err(invalid_flags(flags));
                }
                long = Some(name.to_string());
            } else if let Some(name) = token.strip_prefix('-') {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if short.is_none() && c != '-' => short = Some(c),
                    _ => return Err(invalid_flags(flags)),
                }
            } else if token.starts_with('<') && token.ends_with('>') {
                kind = OptionKind::RequiredValue(token[1..token.len() - 1].to_string());
            } else if token.starts_with('[') && token.ends_with(']') {
                kind = OptionKind::OptionalValue(token[1..token.len() - 1].to_string());
            } else {
                return Err(invalid_flags(flags));
            }
        }

        if short.is_none() && long.is_none() {
            return Err(invalid_flags(flags));
        }

        Ok(Self { short, long, kind })
    }

    /// Key under which the parsed value is recorded.
    pub fn key(&self) -> String {
        match (&self.long, self.short) {
            (Some(long), _) => long.clone(),
            (None, Some(short)) => short.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Whether a command-line token names this option.
    pub fn matches(&self, token: &str) -> bool {
        if let Some(long) = token.strip_prefix("--") {
            return self.long.as_deref() == Some(long);
        }
        if let Some(short) = token.strip_prefix('-') {
            let mut chars = short.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return self.short == Some(c);
            }
        }
        false
    }
}

fn invalid_flags(flags: &str) -> PluginError {
    PluginError::Validation(format!("invalid option flags '{flags}'"))
}

/// An option declared by a plugin command.
#[derive(Debug, Clone)]
pub struct OptionDescriptor {
    /// Flag-spec as written
    pub flags: String,
    /// Parsed flag-spec
    pub spec: FlagSpec,
    /// Help text
    pub description: String,
    /// Value used when the option is not given
    pub default_value: Option<OptionValue>,
}

impl OptionDescriptor {
    /// Validate and build an option.
    pub fn new(flags: impl Into<String>, description: impl Into<String>) -> PluginResult<Self> {
        let flags = flags.into();
        let spec = FlagSpec::parse(&flags)?;
        Ok(Self { flags, spec, description: description.into(), default_value: None })
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, value: OptionValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Whether a positional argument must be given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentKind {
    /// `<name>`
    Required,
    /// `[name]`, optionally with a default
    Optional { default: Option<String> },
}

/// A positional argument declared by a plugin command.
#[derive(Debug, Clone)]
pub struct ArgumentDescriptor {
    /// Argument name
    pub name: String,
    /// Help text
    pub description: String,
    /// Required or defaulted
    pub kind: ArgumentKind,
}

impl ArgumentDescriptor {
    /// A mandatory argument.
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), kind: ArgumentKind::Required }
    }

    /// An optional argument.
    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        default: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: ArgumentKind::Optional { default },
        }
    }

    /// Usage form: `<name>` or `[name]`.
    pub fn usage(&self) -> String {
        match self.kind {
            ArgumentKind::Required => format!("<{}>", self.name),
            ArgumentKind::Optional { .. } => format!("[{}]", self.name),
        }
    }
}

/// A command contributed by a plugin.
#[derive(Clone)]
pub struct CommandDescriptor {
    /// Command name (unique across the command surface)
    pub name: String,
    /// Help text
    pub description: String,
    /// Alternative name (unique across the command surface)
    pub alias: Option<String>,
    /// Declared options
    pub options: Vec<OptionDescriptor>,
    /// Declared positional arguments
    pub arguments: Vec<ArgumentDescriptor>,
    /// Invocation target
    pub action: ActionRef,
}

impl CommandDescriptor {
    /// Create a command with no options or arguments.
    pub fn new(name: impl Into<String>, description: impl Into<String>, action: ActionRef) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            alias: None,
            options: Vec::new(),
            arguments: Vec::new(),
            action,
        }
    }

    /// Set the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add an option.
    #[must_use]
    pub fn with_option(mut self, option: OptionDescriptor) -> Self {
        self.options.push(option);
        self
    }

    /// Add a positional argument.
    #[must_use]
    pub fn with_argument(mut self, argument: ArgumentDescriptor) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Name and alias, the identifiers this command occupies.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.alias.as_deref())
    }

    /// Find the option a flag token refers to.
    pub fn find_option(&self, token: &str) -> Option<&OptionDescriptor> {
        self.options.iter().find(|o| o.spec.matches(token))
    }

    /// Reject option and argument layouts that cannot be bound.
    fn validate_shape(&self) -> PluginResult<()> {
        let duplicate = |what: &str, id: String| {
            PluginError::Validation(format!(
                "command '{}' declares {what} '{id}' more than once",
                self.name
            ))
        };

        let mut keys = std::collections::HashSet::new();
        let mut shorts = std::collections::HashSet::new();
        let mut longs = std::collections::HashSet::new();
        for option in &self.options {
            let spec = &option.spec;
            if !keys.insert(spec.key()) {
                return Err(duplicate("option", spec.key()));
            }
            if let Some(short) = spec.short {
                if !shorts.insert(short) {
                    return Err(duplicate("flag", format!("-{short}")));
                }
            }
            if let Some(long) = &spec.long {
                if !longs.insert(long.as_str()) {
                    return Err(duplicate("flag", format!("--{long}")));
                }
            }
        }

        let mut names = std::collections::HashSet::new();
        let mut optional_seen: Option<&str> = None;
        for argument in &self.arguments {
            if !names.insert(argument.name.as_str()) {
                return Err(duplicate("argument", argument.name.clone()));
            }
            match (&argument.kind, optional_seen) {
                (ArgumentKind::Required, Some(optional)) => {
                    return Err(PluginError::Validation(format!(
                        "command '{}' declares required argument '{}' after optional '{optional}'",
                        self.name, argument.name
                    )));
                }
                (ArgumentKind::Optional { .. }, None) => {
                    optional_seen = Some(argument.name.as_str());
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("alias", &self.alias)
            .field("options", &self.options)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// A lifecycle handler contributed by a plugin.
#[derive(Clone)]
pub struct PluginHook {
    /// Lifecycle point name, e.g. `post-commit`
    pub event: String,
    /// Handler to run
    pub handler: ActionRef,
}

impl fmt::Debug for PluginHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHook").field("event", &self.event).finish_non_exhaustive()
    }
}

/// A plugin as bound onto the command surface.
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Registry key
    pub name: String,
    /// Plugin version
    pub version: String,
    /// Optional description
    pub description: Option<String>,
    /// Commands to bind
    pub commands: Vec<CommandDescriptor>,
    /// Lifecycle handlers
    pub hooks: Vec<PluginHook>,
    /// Awaited before any command is bound
    pub init: Option<ActionRef>,
    /// Directory the plugin was loaded from, if any
    pub source: Option<PathBuf>,
}

impl PluginDescriptor {
    /// Create an empty plugin.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            commands: Vec::new(),
            hooks: Vec::new(),
            init: None,
            source: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a command.
    #[must_use]
    pub fn with_command(mut self, command: CommandDescriptor) -> Self {
        self.commands.push(command);
        self
    }

    /// Add a lifecycle handler.
    #[must_use]
    pub fn with_hook(mut self, event: impl Into<String>, handler: ActionRef) -> Self {
        self.hooks.push(PluginHook { event: event.into(), handler });
        self
    }

    /// Set the init step.
    #[must_use]
    pub fn with_init(mut self, init: ActionRef) -> Self {
        self.init = Some(init);
        self
    }

    /// Find a declared command by name.
    pub fn command(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Check invariants that do not depend on other plugins.
    pub fn validate(&self) -> PluginResult<()> {
        if self.name.trim().is_empty() {
            return Err(PluginError::Validation("plugin name is required".to_string()));
        }
        if self.version.trim().is_empty() {
            return Err(PluginError::Validation(format!("plugin '{}' has no version", self.name)));
        }

        let mut seen = std::collections::HashSet::new();
        for command in &self.commands {
            if command.name.trim().is_empty() {
                return Err(PluginError::Validation(format!(
                    "plugin '{}' declares a command without a name",
                    self.name
                )));
            }
            for id in command.identifiers() {
                if !seen.insert(id) {
                    return Err(PluginError::Validation(format!(
                        "plugin '{}' declares '{id}' more than once",
                        self.name
                    )));
                }
            }
            command.validate_shape()?;
        }

        Ok(())
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("description", &self.description)
            .field("commands", &self.commands)
            .field("hooks", &self.hooks)
            .field("init", &self.init.is_some())
            .field("source", &self.source)
            .finish()
    }
}

/// Action that runs a shell line, used by plugins loaded from disk.
///
/// Options are exported as `SNAP_OPT_<KEY>`, positional arguments as
/// `SNAP_ARGS` and (on Unix) `$1..$n`.
#[derive(Debug, Clone)]
pub struct ShellAction {
    plugin: String,
    run: String,
    plugin_dir: Option<PathBuf>,
    working_dir: Option<PathBuf>,
}

impl ShellAction {
    /// Create an action for `plugin` running `run`.
    pub fn new(plugin: impl Into<String>, run: impl Into<String>) -> Self {
        Self { plugin: plugin.into(), run: run.into(), plugin_dir: None, working_dir: None }
    }

    /// Record the plugin directory (exported as `SNAP_PLUGIN_DIR`).
    #[must_use]
    pub fn plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = Some(dir.into());
        self
    }

    /// Run in a specific directory instead of the current one.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl PluginAction for ShellAction {
    async fn invoke(&self, invocation: &Invocation) -> anyhow::Result<()> {
        let mut cmd = ShellCommand::new(&self.run)
            .env("SNAP_PLUGIN", &self.plugin)
            .env("SNAP_COMMAND", &invocation.command)
            .env("SNAP_ARGS", invocation.args.join(" "))
            .envs(
                invocation
                    .options
                    .iter()
                    .map(|(key, value)| (option_env_name(key), value.to_env_value())),
            )
            .args(invocation.args.clone());

        if let Some(ref dir) = self.plugin_dir {
            cmd = cmd.env("SNAP_PLUGIN_DIR", dir.display().to_string());
        }
        if let Some(ref dir) = self.working_dir {
            cmd = cmd.working_dir(dir);
        }

        let run = cmd.run().await?;
        if !run.status.success() {
            anyhow::bail!("`{}` {}", self.run, run.status.describe());
        }
        Ok(())
    }
}

/// Environment variable name for an option key.
pub fn option_env_name(key: &str) -> String {
    let normalized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("SNAP_OPT_{normalized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ActionRef {
        Arc::new(|_: &Invocation| -> anyhow::Result<()> { Ok(()) })
    }

    #[test]
    fn test_parse_short_and_long_with_value() {
        let spec = FlagSpec::parse("-n, --name <value>").unwrap();
        assert_eq!(spec.short, Some('n'));
        assert_eq!(spec.long.as_deref(), Some("name"));
        assert_eq!(spec.kind, OptionKind::RequiredValue("value".to_string()));
        assert_eq!(spec.key(), "name");
    }

    #[test]
    fn test_parse_switch_and_optional() {
        let switch = FlagSpec::parse("--dry-run").unwrap();
        assert_eq!(switch.kind, OptionKind::Switch);
        assert_eq!(switch.short, None);

        let optional = FlagSpec::parse("-t [tag]").unwrap();
        assert_eq!(optional.kind, OptionKind::OptionalValue("tag".to_string()));
        assert!(optional.kind.takes_value());
        assert_eq!(optional.key(), "t");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FlagSpec::parse("").is_err());
        assert!(FlagSpec::parse("name").is_err());
        assert!(FlagSpec::parse("-in, --install <id>").is_err());
        assert!(FlagSpec::parse("--a --b").is_err());
    }

    #[test]
    fn test_matches_tokens() {
        let spec = FlagSpec::parse("-n, --name <value>").unwrap();
        assert!(spec.matches("-n"));
        assert!(spec.matches("--name"));
        assert!(!spec.matches("--n"));
        assert!(!spec.matches("-name"));
        assert!(!spec.matches("name"));
    }

    #[test]
    fn test_invocation_accessors() {
        let mut inv = Invocation::new("greet");
        inv.options.insert("loud".into(), OptionValue::Flag(true));
        inv.options.insert("name".into(), OptionValue::Text("ada".into()));

        assert!(inv.flag("loud"));
        assert!(!inv.flag("name"));
        assert_eq!(inv.value("name"), Some("ada"));
        assert_eq!(inv.value("missing"), None);
    }

    #[test]
    fn test_option_value_untagged_serde() {
        let v: OptionValue = toml::Value::Boolean(true).try_into().unwrap();
        assert_eq!(v, OptionValue::Flag(true));
        let v: OptionValue = toml::Value::String("x".into()).try_into().unwrap();
        assert_eq!(v, OptionValue::Text("x".into()));
    }

    #[test]
    fn test_validate_duplicate_identifiers() {
        let plugin = PluginDescriptor::new("dup", "1.0.0")
            .with_command(CommandDescriptor::new("a", "first", noop()).with_alias("b"))
            .with_command(CommandDescriptor::new("b", "second", noop()));

        let err = plugin.validate().unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_validate_duplicate_short_flag() {
        let plugin = PluginDescriptor::new("dup", "1.0.0").with_command(
            CommandDescriptor::new("make", "Make", noop())
                .with_option(OptionDescriptor::new("-n, --name <name>", "Name").unwrap())
                .with_option(OptionDescriptor::new("-n, --new", "New").unwrap()),
        );

        let err = plugin.validate().unwrap_err();
        assert!(matches!(err, PluginError::Validation(_)));
        assert!(err.to_string().contains("'-n'"));
    }

    #[test]
    fn test_validate_duplicate_long_flag() {
        let plugin = PluginDescriptor::new("dup", "1.0.0").with_command(
            CommandDescriptor::new("make", "Make", noop())
                .with_option(OptionDescriptor::new("-a, --all", "All").unwrap())
                .with_option(OptionDescriptor::new("-b, --all", "Also all").unwrap()),
        );

        assert!(matches!(plugin.validate(), Err(PluginError::Validation(_))));
    }

    #[test]
    fn test_validate_duplicate_argument() {
        let plugin = PluginDescriptor::new("dup", "1.0.0").with_command(
            CommandDescriptor::new("copy", "Copy", noop())
                .with_argument(ArgumentDescriptor::required("path", "Source"))
                .with_argument(ArgumentDescriptor::required("path", "Target")),
        );

        let err = plugin.validate().unwrap_err();
        assert!(matches!(err, PluginError::Validation(_)));
        assert!(err.to_string().contains("'path'"));
    }

    #[test]
    fn test_validate_required_after_optional() {
        let plugin = PluginDescriptor::new("order", "1.0.0").with_command(
            CommandDescriptor::new("copy", "Copy", noop())
                .with_argument(ArgumentDescriptor::optional("from", "Source", None))
                .with_argument(ArgumentDescriptor::required("to", "Target")),
        );
        let err = plugin.validate().unwrap_err();
        assert!(err.to_string().contains("after optional 'from'"));

        let defaulted = PluginDescriptor::new("order", "1.0.0").with_command(
            CommandDescriptor::new("copy", "Copy", noop())
                .with_argument(ArgumentDescriptor::optional("from", "Source", Some(".".into())))
                .with_argument(ArgumentDescriptor::required("to", "Target")),
        );
        assert!(defaulted.validate().is_err());

        let ordered = PluginDescriptor::new("order", "1.0.0").with_command(
            CommandDescriptor::new("copy", "Copy", noop())
                .with_argument(ArgumentDescriptor::required("to", "Target"))
                .with_argument(ArgumentDescriptor::optional("from", "Source", None))
                .with_argument(ArgumentDescriptor::optional("mode", "Mode", None)),
        );
        assert!(ordered.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_name() {
        assert!(PluginDescriptor::new(" ", "1.0.0").validate().is_err());
        assert!(PluginDescriptor::new("ok", "").validate().is_err());
        assert!(PluginDescriptor::new("ok", "1.0.0").validate().is_ok());
    }

    #[test]
    fn test_option_env_name() {
        assert_eq!(option_env_name("dry-run"), "SNAP_OPT_DRY_RUN");
        assert_eq!(option_env_name("n"), "SNAP_OPT_N");
    }

    #[tokio::test]
    async fn test_shell_action_exports_options() {
        let temp = tempfile::TempDir::new().unwrap();
        let out = temp.path().join("out.txt");
        let action = ShellAction::new(
            "greeter",
            format!("printf '%s:%s:%s' \"$SNAP_OPT_NAME\" \"$1\" \"$SNAP_PLUGIN\" > '{}'", out.display()),
        );

        let mut inv = Invocation::new("greet");
        inv.options.insert("name".into(), OptionValue::Text("ada".into()));
        inv.args.push("world".into());

        action.invoke(&inv).await.unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "ada:world:greeter");
    }

    #[tokio::test]
    async fn test_shell_action_failure() {
        let action = ShellAction::new("p", "exit 2");
        let err = action.invoke(&Invocation::new("x")).await.unwrap_err();
        assert!(err.to_string().contains("exited with code 2"));
    }
}
