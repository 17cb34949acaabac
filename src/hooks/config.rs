//! Declarative hook definitions.
//!
//! One YAML file per hook under the project's hook directory
//! (`.snap/hooks/<name>` by default). Files are read fresh on every
//! invocation; nothing is cached.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::{HookError, HookResult};
use crate::core::HooksConfig;

/// Timeout used when neither the hook nor the configuration sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_true() -> bool {
    true
}

/// A hook as written on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDefinition {
    /// Display name, exported as `SNAP_HOOK_NAME`
    pub name: String,

    /// What the hook does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Shell command lines, in order
    pub run: Vec<String>,

    /// Disabled hooks are found but never run
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether a failing command fails the hook
    #[serde(default = "default_true")]
    pub fail_on_error: bool,

    /// Per-command timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Environment overrides
    #[serde(default, deserialize_with = "scalar_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Directory the commands run in (`~` is expanded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Launch all commands at once instead of in order
    #[serde(default)]
    pub parallel: bool,

    /// Gates that must all pass for the hook to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if: Option<HookConditions>,
}

/// The `onlyIf` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConditions {
    /// Current branch must be one of these
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<String>>,

    /// At least one path must match one of these globs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,

    /// Every variable must be set and non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,

    /// Every command must exit with status zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
}

/// YAML scalars of any type become strings (`RETRIES: 3` is `"3"`).
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => {
                    return Err(D::Error::custom(format!(
                        "env value for '{key}' must be a scalar"
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

/// One row of a hook listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookSummary {
    /// File name, which is the hook point it serves
    #[serde(rename = "type")]
    pub hook_type: String,
    /// Declared name
    pub name: String,
    /// Declared description
    pub description: Option<String>,
    /// Whether it would run
    pub enabled: bool,
}

/// Reads hook files from a hook directory.
#[derive(Debug, Clone)]
pub struct HookConfigLoader {
    dir: PathBuf,
}

impl HookConfigLoader {
    /// Create a loader for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Loader for the hook directory of the project at `root`.
    pub fn for_project(root: &Path, config: &HooksConfig) -> Self {
        Self::new(root.join(&config.dir))
    }

    /// The hook directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the hook `name` lives.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load the hook `name`; `Ok(None)` if no such file exists.
    pub fn load(&self, name: &str) -> HookResult<Option<HookDefinition>> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        parse_hook(name, &content).map(Some)
    }

    /// Every hook in the directory, sorted by file name.
    ///
    /// Unreadable or malformed files are logged and left out.
    pub fn list(&self) -> HookResult<Vec<HookSummary>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();

        let mut hooks = Vec::new();
        for hook_type in names {
            match self.load(&hook_type) {
                Ok(Some(def)) => hooks.push(HookSummary {
                    hook_type,
                    name: def.name,
                    description: def.description,
                    enabled: def.enabled,
                }),
                Ok(None) => {}
                Err(e) => warn!(hook = %hook_type, error = %e, "Skipping invalid hook file"),
            }
        }
        Ok(hooks)
    }
}

fn invalid(hook: &str, reason: impl Into<String>) -> HookError {
    HookError::InvalidHookFormat { hook: hook.to_string(), reason: reason.into() }
}

/// Parse and validate a hook file.
pub fn parse_hook(hook: &str, content: &str) -> HookResult<HookDefinition> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| invalid(hook, e.to_string()))?;

    let has_name = value
        .get("name")
        .and_then(serde_yaml::Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    if !has_name {
        return Err(invalid(hook, "`name` must be a non-empty string"));
    }
    if !value.get("run").is_some_and(serde_yaml::Value::is_sequence) {
        return Err(invalid(hook, "`run` must be a list of commands"));
    }

    let definition: HookDefinition =
        serde_yaml::from_value(value).map_err(|e| invalid(hook, e.to_string()))?;

    if let Some(patterns) = definition.only_if.as_ref().and_then(|c| c.files.as_ref()) {
        for pattern in patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| invalid(hook, format!("bad file pattern '{pattern}': {e}")))?;
        }
    }

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
name: Lint
description: Run linters before committing
run:
  - cargo fmt --check
  - cargo clippy
enabled: true
failOnError: false
timeout: 5000
env:
  RUST_LOG: debug
  RETRIES: 3
workingDir: ~/project
parallel: true
onlyIf:
  branches: [main, develop]
  files: ["src/**/*.rs"]
  env: [CI]
  commands: ["which cargo"]
"#;

    #[test]
    fn test_parse_full_definition() {
        let hook = parse_hook("pre-commit", FULL).unwrap();
        assert_eq!(hook.name, "Lint");
        assert_eq!(hook.run.len(), 2);
        assert!(!hook.fail_on_error);
        assert_eq!(hook.timeout, Some(5000));
        assert_eq!(hook.env.get("RETRIES").map(String::as_str), Some("3"));
        assert_eq!(hook.working_dir.as_deref(), Some("~/project"));
        assert!(hook.parallel);

        let only_if = hook.only_if.unwrap();
        assert_eq!(only_if.branches, Some(vec!["main".to_string(), "develop".to_string()]));
        assert_eq!(only_if.commands, Some(vec!["which cargo".to_string()]));
    }

    #[test]
    fn test_defaults() {
        let hook = parse_hook("post-commit", "name: Notify\nrun: [\"echo hi\"]\n").unwrap();
        assert!(hook.enabled);
        assert!(hook.fail_on_error);
        assert!(!hook.parallel);
        assert!(hook.timeout.is_none());
        assert!(hook.only_if.is_none());
    }

    #[test]
    fn test_missing_name_or_run() {
        let err = parse_hook("pre-commit", "run: [\"true\"]\n").unwrap_err();
        assert!(matches!(
            err,
            HookError::InvalidHookFormat { ref hook, .. } if hook == "pre-commit"
        ));

        let err = parse_hook("pre-commit", "name: X\nrun: true\n").unwrap_err();
        assert!(err.to_string().contains("`run`"));

        let err = parse_hook("pre-commit", "name: 12\nrun: []\n").unwrap_err();
        assert!(err.to_string().contains("`name`"));
    }

    #[test]
    fn test_bad_glob_rejected() {
        let content = "name: X\nrun: []\nonlyIf:\n  files: [\"[\"]\n";
        assert!(parse_hook("x", content).is_err());
    }

    #[test]
    fn test_absent_file_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let loader = HookConfigLoader::new(temp.path());
        assert!(loader.load("pre-commit").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_and_skips_invalid() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("post-push"), "name: Deploy\nrun: []\nenabled: false\n")
            .unwrap();
        std::fs::write(temp.path().join("pre-commit"), "name: Lint\ndescription: d\nrun: []\n")
            .unwrap();
        std::fs::write(temp.path().join("broken"), "run: 5\n").unwrap();

        let hooks = HookConfigLoader::new(temp.path()).list().unwrap();

        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].hook_type, "post-push");
        assert!(!hooks[0].enabled);
        assert_eq!(hooks[1].name, "Lint");
        assert_eq!(hooks[1].description.as_deref(), Some("d"));
    }

    #[test]
    fn test_for_project() {
        let loader = HookConfigLoader::for_project(Path::new("/repo"), &HooksConfig::default());
        assert_eq!(loader.path_for("pre-commit"), PathBuf::from("/repo/.snap/hooks/pre-commit"));
    }
}
