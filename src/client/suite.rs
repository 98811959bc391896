use crate::api::error::Result;
use crate::client::{with_circuit_breaker, with_retry_policy, with_rpc_timeout, ClientOption};
use crate::config::ConfigClient;
use crate::utils::Options;

/// All client side policies of one destination service.
pub struct ClientSuite {
    config_client: ConfigClient,
    service: String,
    client: String,
    opts: Options,
}

impl ClientSuite {
    /// `service` is the destination, `client` the calling service.
    pub fn new(service: impl Into<String>, client: impl Into<String>, config_client: ConfigClient) -> Self {
        ClientSuite {
            config_client,
            service: service.into(),
            client: client.into(),
            opts: Options::new(),
        }
    }

    pub fn with_options(mut self, opts: Options) -> Self {
        self.opts = opts;
        self
    }

    /// Retry, RPC timeout and circuit breaker options, each followed by its close callback.
    ///
    /// On error the subscriptions made so far are released again.
    pub fn options(&self) -> Result<Vec<ClientOption>> {
        let builders: [fn(&str, &str, &ConfigClient, &Options) -> Result<Vec<ClientOption>>; 3] =
            [with_retry_policy, with_rpc_timeout, with_circuit_breaker];

        let mut opts = Vec::with_capacity(6);
        for build in builders {
            match build(&self.service, &self.client, &self.config_client, &self.opts) {
                Ok(built) => opts.extend(built),
                Err(err) => {
                    release(opts);
                    return Err(err);
                }
            }
        }
        Ok(opts)
    }
}

fn release(opts: Vec<ClientOption>) {
    for opt in opts {
        if let ClientOption::CloseCallback(close) = opt {
            if let Err(err) = close() {
                tracing::warn!("release client option failed: {}", err);
            }
        }
    }
}
