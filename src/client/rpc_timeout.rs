use crate::api::config::{ConfigParam, ConfigParamConfig};
use crate::api::constants::RPC_TIMEOUT_CONFIG_NAME;
use crate::api::error::Result;
use crate::api::parser::decode_or_default;
use crate::client::ClientOption;
use crate::config::{ConfigClient, SubscriberId};
use crate::policy::{RpcTimeout, TimeoutContainer, TimeoutSink};
use crate::utils::Options;
use std::collections::HashMap;
use std::sync::Arc;

/// Sets the RPC timeout policy from the config center.
pub fn with_rpc_timeout(
    dest: &str,
    src: &str,
    client: &ConfigClient,
    opts: &Options,
) -> Result<Vec<ClientOption>> {
    let param = client.client_config_param(
        &ConfigParamConfig {
            category: RPC_TIMEOUT_CONFIG_NAME.to_string(),
            server_service_name: dest.to_string(),
            client_service_name: src.to_string(),
        },
        &opts.custom_functions,
    );

    let container = Arc::new(TimeoutContainer::new());
    let id = watch_rpc_timeout(&param, dest, client, container.clone())?;
    Ok(vec![
        ClientOption::TimeoutProvider(container),
        ClientOption::CloseCallback(client.close_callback(param.config_key(), id)),
    ])
}

/// The whole timeout map is handed to `sink` on every change.
pub fn watch_rpc_timeout(
    param: &ConfigParam,
    dest: &str,
    client: &ConfigClient,
    sink: Arc<dyn TimeoutSink>,
) -> Result<SubscriberId> {
    let dest = dest.to_string();
    let kind = param.config_type.clone();

    client.register_config_callback(param, move |data, parser| {
        let configs: HashMap<String, RpcTimeout> = match decode_or_default(parser, &kind, data) {
            Ok(configs) => configs,
            Err(err) => {
                tracing::warn!("{} client rpc timeout: decode data {} failed: {}, skip...", dest, data, err);
                return;
            }
        };
        sink.notify_policy_change(configs);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{client, eventually};
    use crate::InMemorySource;

    #[tokio::test]
    async fn test_timeouts_follow_config() {
        let source = Arc::new(InMemorySource::new());
        source.put(
            "rpc_timeout",
            "caller.echo",
            r#"{"*": {"rpc_timeout_ms": 100}, "Echo": {"rpc_timeout_ms": 500, "conn_timeout_ms": 20}}"#,
        );
        let cli = client(source.clone());
        let opts = with_rpc_timeout("echo", "caller", &cli, &Options::new()).unwrap();
        let container = match &opts[0] {
            ClientOption::TimeoutProvider(c) => c.clone(),
            other => panic!("unexpected option {other:?}"),
        };
        assert_eq!(container.timeouts("Echo").unwrap().rpc_timeout_ms, 500);
        assert_eq!(container.timeouts("Other").unwrap().rpc_timeout_ms, 100);

        source.put("rpc_timeout", "caller.echo", "[1, 2]");
        source.put("rpc_timeout", "caller.echo", r#"{"Echo": {"rpc_timeout_ms": 700}}"#);
        eventually(|| container.timeouts("Echo").map(|t| t.rpc_timeout_ms) == Some(700)).await;
        assert_eq!(container.timeouts("Other"), None);
    }
}
