use crate::api::config::{ConfigParam, ConfigParamConfig};
use crate::api::constants::CIRCUIT_BREAKER_CONFIG_NAME;
use crate::api::error::Result;
use crate::api::parser::decode_or_default;
use crate::client::ClientOption;
use crate::config::{ConfigClient, SubscriberId};
use crate::policy::{service_cb_key, CbConfig, CbSuite, CircuitBreakerSink};
use crate::utils::{Options, Set, ThreadSafeSet};
use std::collections::HashMap;
use std::sync::Arc;

/// Sets the circuit breaker policy from the config center.
pub fn with_circuit_breaker(
    dest: &str,
    src: &str,
    client: &ConfigClient,
    opts: &Options,
) -> Result<Vec<ClientOption>> {
    let param = client.client_config_param(
        &ConfigParamConfig {
            category: CIRCUIT_BREAKER_CONFIG_NAME.to_string(),
            server_service_name: dest.to_string(),
            client_service_name: src.to_string(),
        },
        &opts.custom_functions,
    );

    let suite = Arc::new(CbSuite::new());
    let id = watch_circuit_breaker(&param, dest, client, suite.clone())?;
    Ok(vec![
        ClientOption::CircuitBreaker(suite),
        ClientOption::CloseCallback(client.close_callback(param.config_key(), id)),
    ])
}

/// Keeps `sink` in sync with the breaker payload of `param`, methods gone
/// from the payload fall back to [`CbConfig::default`].
pub fn watch_circuit_breaker(
    param: &ConfigParam,
    dest: &str,
    client: &ConfigClient,
    sink: Arc<dyn CircuitBreakerSink>,
) -> Result<SubscriberId> {
    let applied = ThreadSafeSet::new();
    let dest = dest.to_string();
    let kind = param.config_type.clone();

    client.register_config_callback(param, move |data, parser| {
        let configs: HashMap<String, CbConfig> = match decode_or_default(parser, &kind, data) {
            Ok(configs) => configs,
            Err(err) => {
                tracing::warn!(
                    "{} client circuit breaker: decode data {} failed: {}, skip...",
                    dest,
                    data,
                    err
                );
                return;
            }
        };

        let mut set = Set::new();
        for (method, config) in configs {
            sink.update_service_cb_config(&service_cb_key(&dest, &method), config);
            set.insert(method);
        }

        for method in applied.diff_and_emplace(set) {
            sink.update_service_cb_config(&service_cb_key(&dest, &method), CbConfig::default());
        }
    })
}
