use crate::api::client_config::ClientConfig;
use crate::api::constants::DEFAULT_CONTENT;
use crate::api::error::{Error, Result};
use crate::config::ConfigClient;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Declared content type of a config item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConfigType {
    #[default]
    Json,
    Yaml,
    /// Any other kind, understood only by a custom [`ConfigParser`](crate::api::ConfigParser).
    Other(String),
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigType::Json => f.write_str("json"),
            ConfigType::Yaml => f.write_str("yaml"),
            ConfigType::Other(kind) => f.write_str(kind),
        }
    }
}

impl From<&str> for ConfigType {
    fn from(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "json" => ConfigType::Json,
            "yaml" | "yml" => ConfigType::Yaml,
            _ => ConfigType::Other(kind.to_string()),
        }
    }
}

/// What a registration does when the key has no value in the current snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingKeyPolicy {
    /// Invoke the callback with [`DEFAULT_CONTENT`] so the subscriber starts from defaults.
    #[default]
    NotifyEmpty,
    /// Log and wait for the first change event.
    Skip,
}

/// Identifies one remotely managed config item.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub namespace: String,
    pub cluster: String,
    pub key: String,
}

impl ConfigKey {
    pub fn new(
        namespace: impl Into<String>,
        cluster: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        ConfigKey {
            namespace: namespace.into(),
            cluster: cluster.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.cluster, self.key)
    }
}

/// Rendered parameters of one subscription.
///
/// Produced by [`ConfigClient::client_config_param`] or
/// [`ConfigClient::server_config_param`], then adjusted by custom functions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigParam {
    pub key: String,
    pub namespace: String,
    pub cluster: String,
    /// Payload notified while the key is missing from the config center.
    pub content: String,
    pub config_type: ConfigType,
    pub missing_key: MissingKeyPolicy,
}

impl ConfigParam {
    pub fn new(
        namespace: impl Into<String>,
        cluster: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        ConfigParam {
            key: key.into(),
            namespace: namespace.into(),
            cluster: cluster.into(),
            content: DEFAULT_CONTENT.to_string(),
            config_type: ConfigType::default(),
            missing_key: MissingKeyPolicy::default(),
        }
    }

    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::new(&self.namespace, &self.cluster, &self.key)
    }
}

/// Values the name templates may reference.
#[derive(Clone, Debug, Default)]
pub struct ConfigParamConfig {
    pub category: String,
    pub client_service_name: String,
    pub server_service_name: String,
}

/// New full value set of a namespace, pushed by the config center.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    pub namespace: String,
    pub new_values: HashMap<String, String>,
}

/// Unrecoverable error reported by the config center.
#[derive(Clone, Debug, thiserror::Error)]
#[error("namespace {namespace}: {message}")]
pub struct SourceError {
    pub namespace: String,
    pub message: String,
}

/// The remote config center, seen from the registry.
///
/// Implementations own the connection, long polling and backoff. Methods are
/// called while the registry holds its lock, so they must not call back into
/// the [`ConfigClient`].
pub trait ConfigSource: Send + Sync + 'static {
    /// Current values of the namespace holding `key`, `None` when the namespace is unknown.
    fn snapshot(&self, key: &ConfigKey) -> Option<HashMap<String, String>>;

    /// Stream of unrecoverable errors.
    fn start(&self) -> BoxStream<'static, SourceError>;

    /// Change events for `namespace`, until `stop` is cancelled.
    fn watch_namespace(
        &self,
        namespace: &str,
        stop: CancellationToken,
    ) -> BoxStream<'static, ChangeEvent>;

    fn stop(&self);
}

pub struct ConfigClientBuilder {
    client_config: ClientConfig,
    source: Option<Arc<dyn ConfigSource>>,
    runtime: Option<tokio::runtime::Handle>,
}

impl Default for ConfigClientBuilder {
    fn default() -> Self {
        ConfigClientBuilder::new(ClientConfig::new())
    }
}

impl ConfigClientBuilder {
    pub fn new(client_config: ClientConfig) -> Self {
        ConfigClientBuilder {
            client_config,
            source: None,
            runtime: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Runtime the watch tasks are spawned on, the current one by default.
    pub fn runtime(mut self, handle: tokio::runtime::Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds a new [`ConfigClient`].
    pub fn build(self) -> Result<ConfigClient> {
        let source = self.source.ok_or_else(|| Error::Validation {
            subject: "config client".to_string(),
            reason: "a config source is required".to_string(),
        })?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?,
        };
        ConfigClient::new(self.client_config, source, runtime)
    }
}
