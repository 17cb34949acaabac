//! Remote plugin registry client.
//!
//! The registry is an HTTP/JSON service: plugins are fetched as bundles of
//! files, downloads are counted, and authenticated users publish bundles.
//! [`RegistryApi`] is the seam the installer and publisher talk to;
//! [`HttpRegistry`] is the real implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginResult};

/// A file inside a plugin bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Path relative to the plugin root, `/`-separated
    pub path: String,
    /// File contents
    pub content: String,
}

/// A command declared by a remote plugin, used for conflict detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommand {
    /// Command name
    pub name: String,
    /// Command alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response of `GET /plugins/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePlugin {
    /// Plugin name, also the installation directory name
    pub name: String,
    /// Plugin version
    pub version: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Bundle contents
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    /// Declared commands
    #[serde(default)]
    pub commands: Vec<RemoteCommand>,
}

impl RemotePlugin {
    /// Every command name and alias the bundle would occupy.
    pub fn declared_identifiers(&self) -> Vec<&str> {
        self.commands
            .iter()
            .flat_map(|c| std::iter::once(c.name.as_str()).chain(c.alias.as_deref()))
            .collect()
    }
}

/// Body of a publish (`POST /plugins`) or update (`PUT /plugins`) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishManifest {
    /// Plugin name
    pub name: String,
    /// Plugin version
    pub version: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Search tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Bundle contents
    pub files: Vec<RemoteFile>,
    /// README contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
}

/// Error payload returned by the registry.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
}

/// Operations the plugin subsystem needs from a registry.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Fetch a plugin bundle by id.
    async fn fetch_plugin(&self, id: &str) -> PluginResult<RemotePlugin>;

    /// Increment the download counter for a plugin.
    async fn record_download(&self, name: &str) -> PluginResult<()>;

    /// Create (`update == false`) or update a published plugin.
    async fn publish(&self, manifest: &PublishManifest, token: &str, update: bool)
        -> PluginResult<()>;
}

/// HTTP registry client.
pub struct HttpRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRegistry {
    /// Create a client for the registry at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> PluginResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("snap/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PluginError::Network(e.to_string()))?;

        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    /// The registry base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn plugin_url(&self, id: &str) -> String {
        format!("{}/plugins/{}", self.base_url, urlencoding::encode(id))
    }

    fn plugins_url(&self) -> String {
        format!("{}/plugins", self.base_url)
    }
}

#[async_trait]
impl RegistryApi for HttpRegistry {
    async fn fetch_plugin(&self, id: &str) -> PluginResult<RemotePlugin> {
        let response = self.client.get(self.plugin_url(id)).send().await?;

        if !response.status().is_success() {
            return Err(fetch_error(id, response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| PluginError::Validation(format!("Invalid plugin bundle: {e}")))
    }

    async fn record_download(&self, name: &str) -> PluginResult<()> {
        let response = self
            .client
            .post(format!("{}/download", self.plugin_url(name)))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PluginError::Network(format!(
                "Failed to update download count: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn publish(
        &self,
        manifest: &PublishManifest,
        token: &str,
        update: bool,
    ) -> PluginResult<()> {
        let request = if update {
            self.client.put(self.plugins_url())
        } else {
            self.client.post(self.plugins_url())
        };

        let response = request.bearer_auth(token).json(manifest).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(publish_error(status, &body, update))
    }
}

fn fetch_error(id: &str, status: StatusCode) -> PluginError {
    PluginError::Network(format!("Failed to fetch plugin '{id}': HTTP {status}"))
}

/// Map a rejected publish or update onto a [`PluginError`].
///
/// The server's `error` field is surfaced verbatim when present.
fn publish_error(status: StatusCode, body: &[u8], update: bool) -> PluginError {
    let reported = serde_json::from_slice::<ErrorPayload>(body).ok().and_then(|p| p.error);
    let message = reported.unwrap_or_else(|| {
        if update { "Failed to update plugin" } else { "Failed to publish plugin" }.to_string()
    });

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        PluginError::Auth(message)
    } else {
        PluginError::Network(message)
    }
}
