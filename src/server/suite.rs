use crate::api::error::Result;
use crate::config::ConfigClient;
use crate::server::{with_limiter, ServerOption};
use crate::utils::{CustomFunction, Options};

/// Server config suite, configures the limiter dynamically from the config center.
pub struct ServerSuite {
    config_client: ConfigClient,
    service: String,
    opts: Options,
}

impl ServerSuite {
    /// `service` is the destination service.
    pub fn new(service: impl Into<String>, config_client: ConfigClient) -> Self {
        ServerSuite {
            config_client,
            service: service.into(),
            opts: Options::new(),
        }
    }

    pub fn with_config_client(mut self, config_client: ConfigClient) -> Self {
        self.config_client = config_client;
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_custom_functions(mut self, cfs: impl IntoIterator<Item = CustomFunction>) -> Self {
        self.opts.custom_functions.extend(cfs);
        self
    }

    pub fn options(&self) -> Result<Vec<ServerOption>> {
        with_limiter(&self.service, &self.config_client, &self.opts)
    }
}
