use crate::api::config::{ConfigType, MissingKeyPolicy};
use crate::api::constants::*;
use crate::api::parser::ConfigParser;
use std::fmt;
use std::sync::Arc;

/// Settings shared by every subscription of one [`ConfigClient`](crate::ConfigClient).
///
/// The namespace, cluster and key formats are templates over
/// `{{.Category}}`, `{{.ClientServiceName}}` and `{{.ServerServiceName}}`.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) namespace: String,
    pub(crate) cluster: String,
    pub(crate) server_key_format: String,
    pub(crate) client_key_format: String,
    pub(crate) config_type: ConfigType,
    pub(crate) missing_key: MissingKeyPolicy,
    pub(crate) parser: Option<Arc<dyn ConfigParser>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("namespace", &self.namespace)
            .field("cluster", &self.cluster)
            .field("server_key_format", &self.server_key_format)
            .field("client_key_format", &self.client_key_format)
            .field("config_type", &self.config_type)
            .field("missing_key", &self.missing_key)
            .field("custom_parser", &self.parser.is_some())
            .finish()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        ClientConfig {
            namespace: DEFAULT_NAMESPACE_TEMPLATE.to_string(),
            cluster: DEFAULT_CLUSTER.to_string(),
            server_key_format: DEFAULT_SERVER_KEY_FORMAT.to_string(),
            client_key_format: DEFAULT_CLIENT_KEY_FORMAT.to_string(),
            config_type: ConfigType::Json,
            missing_key: MissingKeyPolicy::NotifyEmpty,
            parser: None,
        }
    }

    /// Sets the namespace template.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the cluster template.
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    pub fn server_key_format(mut self, format: impl Into<String>) -> Self {
        self.server_key_format = format.into();
        self
    }

    pub fn client_key_format(mut self, format: impl Into<String>) -> Self {
        self.client_key_format = format.into();
        self
    }

    /// Sets the content type new params are rendered with.
    pub fn config_type(mut self, config_type: ConfigType) -> Self {
        self.config_type = config_type;
        self
    }

    pub fn missing_key(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key = policy;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ConfigParser>) -> Self {
        self.parser = Some(parser);
        self
    }
}
