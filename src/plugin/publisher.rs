//! Publishing a local plugin project to the registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use super::manifest::PluginManifest;
use super::remote::{PublishManifest, RegistryApi, RemoteFile};
use super::{PluginError, PluginResult};
use crate::core::Credentials;

/// Directories never included in a bundle.
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "dist", "target"];

/// Bundles a plugin project and uploads it.
pub struct PluginPublisher {
    api: Arc<dyn RegistryApi>,
    credentials_file: PathBuf,
}

impl PluginPublisher {
    /// Create a publisher reading its credential from `credentials_file`.
    pub fn new(api: Arc<dyn RegistryApi>, credentials_file: impl Into<PathBuf>) -> Self {
        Self { api, credentials_file: credentials_file.into() }
    }

    /// Publish (`update == false`) or update the plugin in `project_dir`.
    pub async fn publish(&self, project_dir: &Path, update: bool) -> PluginResult<PublishManifest> {
        let credentials = Credentials::load(&self.credentials_file);
        let token = credentials.token().ok_or_else(|| {
            PluginError::Auth("no stored credential, run `snap login` first".to_string())
        })?;

        let manifest = bundle(project_dir)?;
        debug!(plugin = %manifest.name, files = manifest.files.len(), update, "Uploading bundle");

        self.api.publish(&manifest, token, update).await?;
        info!(plugin = %manifest.name, version = %manifest.version, "Plugin published");
        Ok(manifest)
    }
}

/// Collect a project into a publishable manifest.
pub fn bundle(project_dir: &Path) -> PluginResult<PublishManifest> {
    let package = PluginManifest::from_dir(project_dir)?.plugin;
    let name = package
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| PluginError::Validation("plugin.toml has no name".to_string()))?;
    let version = package
        .version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PluginError::Validation("plugin.toml has no version".to_string()))?;

    let files = collect_files(project_dir)?;
    let readme = files
        .iter()
        .find(|f| f.path.eq_ignore_ascii_case("README.md"))
        .map(|f| f.content.clone());

    Ok(PublishManifest {
        name,
        version,
        description: package.description,
        tags: (!package.keywords.is_empty()).then_some(package.keywords),
        files,
        readme,
    })
}

fn collect_files(root: &Path) -> PluginResult<Vec<RemoteFile>> {
    let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_type().is_dir()
                && EXCLUDED_DIRS.iter().any(|d| entry.file_name() == *d))
    });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| PluginError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let bytes = std::fs::read(entry.path())?;
        let content = String::from_utf8(bytes)
            .map_err(|_| PluginError::Validation(format!("'{path}' is not valid UTF-8")))?;

        files.push(RemoteFile { path, content });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::remote::RemotePlugin;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRegistry {
        published: Mutex<Vec<(String, String, bool)>>,
        reject_with: Option<String>,
    }

    #[async_trait]
    impl RegistryApi for FakeRegistry {
        async fn fetch_plugin(&self, id: &str) -> PluginResult<RemotePlugin> {
            Err(PluginError::Network(format!("no plugin '{id}'")))
        }

        async fn record_download(&self, _: &str) -> PluginResult<()> {
            Ok(())
        }

        async fn publish(
            &self,
            manifest: &PublishManifest,
            token: &str,
            update: bool,
        ) -> PluginResult<()> {
            if let Some(ref message) = self.reject_with {
                return Err(PluginError::Network(message.clone()));
            }
            self.published.lock().unwrap().push((manifest.name.clone(), token.to_string(), update));
            Ok(())
        }
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::write(
            root.join("plugin.toml"),
            "[plugin]\nname = \"greeter\"\nversion = \"1.0.0\"\nmain = \"index.toml\"\nkeywords = [\"demo\"]\n",
        )
        .unwrap();
        std::fs::write(root.join("index.toml"), "name = \"greeter\"\n").unwrap();
        std::fs::write(root.join("README.md"), "# Greeter\n").unwrap();
        for dir in ["node_modules/dep", ".git", "target/debug", "lib"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
        std::fs::write(root.join("node_modules/dep/index.js"), "x").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::write(root.join("target/debug/out"), "bin").unwrap();
        std::fs::write(root.join("lib/util.sh"), "echo util").unwrap();
        temp
    }

    fn logged_in(dir: &Path) -> PathBuf {
        let path = dir.join("auth.json");
        Credentials { auth_token: Some("secret".into()), user_id: None }.save(&path).unwrap();
        path
    }

    #[test]
    fn test_bundle_excludes_build_and_vcs_dirs() {
        let project = project();
        let manifest = bundle(project.path()).unwrap();

        let paths: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "index.toml", "lib/util.sh", "plugin.toml"]);
        assert_eq!(manifest.readme.as_deref(), Some("# Greeter\n"));
        assert_eq!(manifest.tags, Some(vec!["demo".to_string()]));
    }

    #[tokio::test]
    async fn test_publish_requires_credential() {
        let project = project();
        let home = TempDir::new().unwrap();
        let api = Arc::new(FakeRegistry::default());

        let err = PluginPublisher::new(api.clone(), home.path().join("auth.json"))
            .publish(project.path(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::Auth(_)));
        assert!(api.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_and_update_send_token() {
        let project = project();
        let home = TempDir::new().unwrap();
        let api = Arc::new(FakeRegistry::default());
        let publisher = PluginPublisher::new(api.clone(), logged_in(home.path()));

        publisher.publish(project.path(), false).await.unwrap();
        publisher.publish(project.path(), true).await.unwrap();

        let published = api.published.lock().unwrap();
        assert_eq!(published[0], ("greeter".to_string(), "secret".to_string(), false));
        assert!(published[1].2);
    }

    #[tokio::test]
    async fn test_server_message_surfaces_verbatim() {
        let project = project();
        let home = TempDir::new().unwrap();
        let api = Arc::new(FakeRegistry {
            reject_with: Some("Version 1.0.0 already exists".into()),
            ..FakeRegistry::default()
        });

        let err = PluginPublisher::new(api, logged_in(home.path()))
            .publish(project.path(), false)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Version 1.0.0 already exists"));
    }

    #[test]
    fn test_non_utf8_file_rejected() {
        let project = project();
        std::fs::write(project.path().join("logo.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let err = bundle(project.path()).unwrap_err();
        assert!(matches!(err, PluginError::Validation(ref m) if m.contains("logo.bin")));
    }
}
