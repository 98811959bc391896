use crate::api::config::{ConfigParam, ConfigParamConfig};
use crate::api::constants::RETRY_CONFIG_NAME;
use crate::api::error::Result;
use crate::api::parser::decode_or_default;
use crate::client::ClientOption;
use crate::config::{ConfigClient, SubscriberId};
use crate::policy::{RetryContainer, RetryPolicy, RetryPolicySink};
use crate::utils::{Options, Set, ThreadSafeSet};
use std::collections::HashMap;
use std::sync::Arc;

/// Retry policies of `dest` as called by `src`, kept in sync with the config center.
pub fn with_retry_policy(
    dest: &str,
    src: &str,
    client: &ConfigClient,
    opts: &Options,
) -> Result<Vec<ClientOption>> {
    let param = client.client_config_param(
        &ConfigParamConfig {
            category: RETRY_CONFIG_NAME.to_string(),
            server_service_name: dest.to_string(),
            client_service_name: src.to_string(),
        },
        &opts.custom_functions,
    );

    let container = Arc::new(RetryContainer::new());
    let id = watch_retry_policy(&param, dest, client, container.clone())?;
    Ok(vec![
        ClientOption::RetryContainer(container),
        ClientOption::CloseCallback(client.close_callback(param.config_key(), id)),
    ])
}

/// Keeps `sink` in sync with the retry payload of `param`.
///
/// Invalid entries are skipped and leave the method's previous policy in
/// place; methods gone from the payload are deleted from `sink`.
pub fn watch_retry_policy(
    param: &ConfigParam,
    dest: &str,
    client: &ConfigClient,
    sink: Arc<dyn RetryPolicySink>,
) -> Result<SubscriberId> {
    let applied = ThreadSafeSet::new();
    let dest = dest.to_string();
    let kind = param.config_type.clone();

    client.register_config_callback(param, move |data, parser| {
        // the key is method name, wildcard "*" can match anything.
        let policies: HashMap<String, RetryPolicy> = match decode_or_default(parser, &kind, data) {
            Ok(policies) => policies,
            Err(err) => {
                tracing::warn!("{} client retry: decode data {} failed: {}, skip...", dest, data, err);
                return;
            }
        };

        let mut set = Set::new();
        for (method, policy) in policies {
            set.insert(method.clone());
            if let Err(err) = policy.validate() {
                tracing::warn!("{} client policy for method {}: {}, skip...", dest, method, err);
                continue;
            }
            sink.notify_policy_change(&method, policy);
        }

        for method in applied.diff_and_emplace(set) {
            sink.delete_policy(&method);
        }
    })
}
