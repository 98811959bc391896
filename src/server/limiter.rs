use crate::api::config::{ConfigParam, ConfigParamConfig};
use crate::api::constants::LIMITER_CONFIG_NAME;
use crate::api::error::Result;
use crate::api::parser::decode_or_default;
use crate::config::{ConfigClient, SubscriberId};
use crate::policy::{LimitOption, LimitSettings, LimiterConfig};
use crate::server::ServerOption;
use crate::utils::Options;
use std::sync::Arc;

/// Sets the limiter config of `dest` from the config center.
pub fn with_limiter(dest: &str, client: &ConfigClient, opts: &Options) -> Result<Vec<ServerOption>> {
    let param = client.server_config_param(
        &ConfigParamConfig {
            category: LIMITER_CONFIG_NAME.to_string(),
            server_service_name: dest.to_string(),
            ..Default::default()
        },
        &opts.custom_functions,
    );

    let limit = Arc::new(LimitOption::new());
    let id = watch_limiter(&param, dest, client, limit.clone())?;
    Ok(vec![
        ServerOption::Limit(limit),
        ServerOption::CloseCallback(client.close_callback(param.config_key(), id)),
    ])
}

/// Keeps `opt` in sync with the limiter payload of `param`.
///
/// Values arriving before the server bound its updater are kept in `opt` and
/// pushed by [`LimitOption::update_control`].
pub fn watch_limiter(
    param: &ConfigParam,
    dest: &str,
    client: &ConfigClient,
    opt: Arc<LimitOption>,
) -> Result<SubscriberId> {
    let dest = dest.to_string();
    let kind = param.config_type.clone();

    client.register_config_callback(param, move |data, parser| {
        let config: LimiterConfig = match decode_or_default(parser, &kind, data) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("{} server limiter config: decode data {} failed: {}, skip...", dest, data, err);
                return;
            }
        };
        let settings = LimitSettings::from(config);
        opt.set_settings(settings);

        let Some(updater) = opt.updater() else {
            tracing::warn!("{} server limiter config failed as the updater is empty", dest);
            return;
        };
        if !updater.update_limit(&settings) {
            tracing::warn!("{} server limiter config: data {} may not take effect", dest, data);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client_config::ClientConfig;
    use crate::api::config::ConfigClientBuilder;
    use crate::policy::LimitUpdater;
    use crate::InMemorySource;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LimitSettings>>);

    impl LimitUpdater for Recorder {
        fn update_limit(&self, settings: &LimitSettings) -> bool {
            self.0.lock().push(*settings);
            true
        }
    }

    fn limit(opts: &[ServerOption]) -> Arc<LimitOption> {
        match &opts[0] {
            ServerOption::Limit(opt) => opt.clone(),
            other => panic!("unexpected option {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_limiter_before_and_after_updater() {
        let source = Arc::new(InMemorySource::new());
        source.put("limit", "echo", r#"{"connection_limit": 100, "qps_limit": 2000}"#);
        let cli = ConfigClientBuilder::new(ClientConfig::new())
            .source(source.clone())
            .build()
            .unwrap();

        let opts = with_limiter("echo", &cli, &Options::new()).unwrap();
        let opt = limit(&opts);
        let expected = LimitSettings {
            max_connections: 100,
            max_qps: 2000,
        };
        assert_eq!(opt.settings(), expected);

        let recorder = Arc::new(Recorder::default());
        opt.update_control(recorder.clone());
        assert_eq!(*recorder.0.lock(), vec![expected]);

        source.put("limit", "echo", r#"{"connection_limit": 10}"#);
        let updated = LimitSettings {
            max_connections: 10,
            max_qps: 0,
        };
        for _ in 0..200 {
            if recorder.0.lock().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*recorder.0.lock(), vec![expected, updated]);
        assert_eq!(opt.settings(), updated);
    }
}
