pub(crate) mod memory;
pub(crate) mod worker;

use crate::api::client_config::ClientConfig;
use crate::api::config::{ConfigKey, ConfigParam, ConfigParamConfig, ConfigSource, MissingKeyPolicy};
use crate::api::error::{Error, Result};
use crate::api::parser::{ConfigParser, DefaultParser};
use crate::api::template::NameTemplate;
use crate::config::worker::*;
use crate::utils::CustomFunction;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Identifies one registration, unique within a [`ConfigClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receives the raw payload of a key and the parser to decode it with.
pub type ConfigCallback = Arc<dyn Fn(&str, &dyn ConfigParser) + Send + Sync>;

/// Teardown hook run when the owning RPC client or server closes.
pub type CloseCallback = Box<dyn FnOnce() -> Result<()> + Send>;

/// Registry entry of one key.
struct KeyWatch {
    handlers: Handlers,
    stop: CancellationToken,
    /// `None` until the first watch task is spawned.
    status: Option<WatchStatus>,
}

struct Templates {
    namespace: NameTemplate,
    cluster: NameTemplate,
    server_key: NameTemplate,
    client_key: NameTemplate,
}

struct Inner {
    source: Arc<dyn ConfigSource>,
    runtime: Handle,
    parser: ParserSlot,
    templates: Templates,
    client_config: ClientConfig,
    next_id: AtomicU64,
    watchers: Mutex<HashMap<ConfigKey, KeyWatch>>,
    root: CancellationToken,
    shut_down: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Subscription registry over one config center.
///
/// Cloning is cheap, all clones share the same registry.
#[derive(Clone)]
pub struct ConfigClient {
    inner: Arc<Inner>,
}

impl ConfigClient {
    pub(crate) fn new(
        client_config: ClientConfig,
        source: Arc<dyn ConfigSource>,
        runtime: Handle,
    ) -> Result<Self> {
        let templates = Templates {
            namespace: NameTemplate::parse(&client_config.namespace)?,
            cluster: NameTemplate::parse(&client_config.cluster)?,
            server_key: NameTemplate::parse(&client_config.server_key_format)?,
            client_key: NameTemplate::parse(&client_config.client_key_format)?,
        };
        let parser: Arc<dyn ConfigParser> = match &client_config.parser {
            Some(parser) => parser.clone(),
            None => Arc::new(DefaultParser),
        };
        Ok(ConfigClient {
            inner: Arc::new(Inner {
                source,
                runtime,
                parser: Arc::new(RwLock::new(parser)),
                templates,
                client_config,
                next_id: AtomicU64::new(0),
                watchers: Mutex::new(HashMap::new()),
                root: CancellationToken::new(),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Replaces the parser handed to callbacks from now on.
    pub fn set_parser(&self, parser: Arc<dyn ConfigParser>) {
        *self.inner.parser.write() = parser;
    }

    pub fn parser(&self) -> Arc<dyn ConfigParser> {
        self.inner.parser.read().clone()
    }

    /// Renders the params of a server side policy, key from the server key format.
    pub fn server_config_param(
        &self,
        cpc: &ConfigParamConfig,
        cfs: &[CustomFunction],
    ) -> ConfigParam {
        self.config_param(cpc, &self.inner.templates.server_key, cfs)
    }

    /// Renders the params of a client side policy, key from the client key format.
    pub fn client_config_param(
        &self,
        cpc: &ConfigParamConfig,
        cfs: &[CustomFunction],
    ) -> ConfigParam {
        self.config_param(cpc, &self.inner.templates.client_key, cfs)
    }

    fn config_param(
        &self,
        cpc: &ConfigParamConfig,
        key: &NameTemplate,
        cfs: &[CustomFunction],
    ) -> ConfigParam {
        let templates = &self.inner.templates;
        let mut param = ConfigParam::new(
            templates.namespace.render(cpc),
            templates.cluster.render(cpc),
            key.render(cpc),
        );
        param.config_type = self.inner.client_config.config_type.clone();
        param.missing_key = self.inner.client_config.missing_key;
        for f in cfs {
            f(&mut param);
        }
        param
    }

    /// Registers `callback` for the key of `param`.
    ///
    /// The callback is invoked once with the current value before this returns,
    /// then on every change until [`ConfigClient::deregister_config`] is called
    /// with the returned id.
    pub fn register_config_callback<F>(&self, param: &ConfigParam, callback: F) -> Result<SubscriberId>
    where
        F: Fn(&str, &dyn ConfigParser) + Send + Sync + 'static,
    {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let callback: ConfigCallback = Arc::new(callback);
        let key = param.config_key();

        if let Some(data) = self.current_value(&key, param) {
            invoke_callback(&key, id, &callback, &data, self.parser().as_ref());
        }

        let mut watchers = self.inner.watchers.lock();
        // shutdown drains the registry under this lock
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        let root = &self.inner.root;
        let watch = watchers.entry(key.clone()).or_insert_with(|| KeyWatch {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            stop: root.child_token(),
            status: None,
        });
        watch.handlers.write().insert(id, callback);

        let mut resync = None;
        if watch.status.as_ref().map_or(true, |s| !s.is_running()) {
            if watch.status.is_some() {
                tracing::warn!("watch task for {} had stopped on error, restarting it", key);
                watch.stop.cancel();
                watch.stop = root.child_token();
                resync = Some(watch.handlers.clone());
            }
            let status = WatchStatus::running();
            let source = &self.inner.source;
            WatchTask {
                key: key.clone(),
                handlers: watch.handlers.clone(),
                parser: self.inner.parser.clone(),
                default_content: param.content.clone(),
                changes: source.watch_namespace(&key.namespace, watch.stop.clone()),
                errors: source.start(),
                stop: watch.stop.clone(),
                status: status.clone(),
            }
            .spawn(&self.inner.runtime);
            watch.status = Some(status);
            tracing::info!("start watching {}", key);
        }
        drop(watchers);

        // changes made while the old task was down reach the earlier subscribers
        if let Some(handlers) = resync {
            if let Some(data) = self.current_value(&key, param) {
                dispatch(&key, &handlers, Some(id), &self.inner.parser, &data);
            }
        }
        tracing::debug!("subscriber {} registered on {}", id, key);
        Ok(id)
    }

    /// Value of `key` in the config center, or the param's content when the key
    /// is missing and the param asks to be notified anyway.
    fn current_value(&self, key: &ConfigKey, param: &ConfigParam) -> Option<String> {
        let current = self
            .inner
            .source
            .snapshot(key)
            .and_then(|mut values| values.remove(&key.key));
        if current.is_some() {
            return current;
        }
        let err = Error::NotFound {
            namespace: key.namespace.clone(),
            cluster: key.cluster.clone(),
            key: key.key.clone(),
        };
        match param.missing_key {
            MissingKeyPolicy::NotifyEmpty => {
                tracing::info!("{}, notifying default content", err);
                Some(param.content.clone())
            }
            MissingKeyPolicy::Skip => {
                tracing::info!("{}, waiting for the first change", err);
                None
            }
        }
    }

    /// Removes one registration. Unknown ids are ignored.
    ///
    /// When the last subscriber of a key leaves, the key's watch task is told
    /// to stop and the key is forgotten. The task may finish after this returns,
    /// but it no longer reaches any callback.
    pub fn deregister_config(&self, key: &ConfigKey, id: SubscriberId) {
        let mut watchers = self.inner.watchers.lock();
        let Some(watch) = watchers.get_mut(key) else {
            tracing::debug!("deregister {} of {}: key is not watched", id, key);
            return;
        };
        let remaining = {
            let mut handlers = watch.handlers.write();
            if handlers.remove(&id).is_none() {
                tracing::debug!("deregister {} of {}: unknown subscriber", id, key);
                return;
            }
            handlers.len()
        };
        tracing::debug!("subscriber {} deregistered from {}", id, key);
        if remaining == 0 {
            if let Some(watch) = watchers.remove(key) {
                watch.stop.cancel();
            }
            tracing::info!("stop watching {}", key);
        }
    }

    /// Hook deregistering exactly `id`, leaving other subscribers of `key` alone.
    pub fn close_callback(&self, key: ConfigKey, id: SubscriberId) -> CloseCallback {
        let client = self.clone();
        Box::new(move || {
            // cancel the configuration listener when the owner is closed
            client.deregister_config(&key, id);
            Ok(())
        })
    }

    /// Stops every watch task and the config center. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            tracing::debug!("config client already shut down");
            return;
        }
        self.inner.root.cancel();
        let drained = {
            let mut watchers = self.inner.watchers.lock();
            let count = watchers.len();
            watchers.clear();
            count
        };
        self.inner.source.stop();
        tracing::info!("config client shut down, {} watched keys released", drained);
    }

    pub fn subscriber_count(&self, key: &ConfigKey) -> usize {
        self.inner
            .watchers
            .lock()
            .get(key)
            .map_or(0, |watch| watch.handlers.read().len())
    }

    /// State of the key's watch task, `None` when nobody watches the key.
    pub fn watch_state(&self, key: &ConfigKey) -> Option<WatchState> {
        self.inner
            .watchers
            .lock()
            .get(key)
            .and_then(|watch| watch.status.as_ref().map(WatchStatus::get))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::{ConfigClientBuilder, ConfigType};
    use crate::api::constants::DEFAULT_CONTENT;
    use crate::config::memory::InMemorySource;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn param() -> ConfigParam {
        ConfigParam::new("n1", "c1", "k1")
    }

    fn client(source: Arc<InMemorySource>) -> ConfigClient {
        ConfigClientBuilder::new(ClientConfig::new())
            .source(source)
            .build()
            .unwrap()
    }

    fn recorder() -> (
        impl Fn(&str, &dyn ConfigParser) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = move |data: &str, _: &dyn ConfigParser| {
            let _ = tx.send(data.to_string());
        };
        (callback, rx)
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("dispatch timed out")
            .expect("recorder closed")
    }

    async fn wait_for_state(cli: &ConfigClient, key: &ConfigKey, state: WatchState) {
        for _ in 0..100 {
            if cli.watch_state(key) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("watch task of {key} never reached {state:?}");
    }

    #[tokio::test]
    async fn test_register_delivers_snapshot_synchronously() {
        let source = Arc::new(InMemorySource::new());
        source.put("n1", "k1", "v1");
        let cli = client(source);

        let (callback, mut rx) = recorder();
        let id = cli.register_config_callback(&param(), callback).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "v1");
        assert_eq!(id.get(), 1);
        assert_eq!(cli.subscriber_count(&param().config_key()), 1);
        assert_eq!(cli.watch_state(&param().config_key()), Some(WatchState::Running));
    }

    #[tokio::test]
    async fn test_missing_key_policies() {
        let cli = client(Arc::new(InMemorySource::new()));

        let (callback, mut rx) = recorder();
        cli.register_config_callback(&param(), callback).unwrap();
        assert_eq!(rx.try_recv().unwrap(), DEFAULT_CONTENT);

        let mut skip = param();
        skip.missing_key = MissingKeyPolicy::Skip;
        let (callback, mut rx) = recorder();
        cli.register_config_callback(&skip, callback).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_ids_are_unique() {
        let cli = client(Arc::new(InMemorySource::new()));
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(cli.register_config_callback(&param(), |_: &str, _: &dyn ConfigParser| {}).unwrap());
        }
        let other = ConfigParam::new("n2", "c1", "k1");
        ids.push(cli.register_config_callback(&other, |_: &str, _: &dyn ConfigParser| {}).unwrap());
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let cli = client(Arc::new(InMemorySource::new()));
        let key = param().config_key();
        let id = cli.register_config_callback(&param(), |_: &str, _: &dyn ConfigParser| {}).unwrap();

        cli.deregister_config(&key, SubscriberId(999));
        assert_eq!(cli.subscriber_count(&key), 1);
        cli.deregister_config(&key, id);
        cli.deregister_config(&key, id);
        cli.deregister_config(&ConfigKey::new("x", "y", "z"), id);
        assert_eq!(cli.subscriber_count(&key), 0);
        assert_eq!(cli.watch_state(&key), None);
    }

    #[tokio::test]
    async fn test_error_stopped_task_is_restarted() {
        let source = Arc::new(InMemorySource::new());
        source.put("n1", "k1", "v1");
        let cli = client(source.clone());
        let key = param().config_key();

        let (callback, mut rx) = recorder();
        cli.register_config_callback(&param(), callback).unwrap();
        assert_eq!(recv(&mut rx).await, "v1");

        source.fail("n1", "long poll failed");
        wait_for_state(&cli, &key, WatchState::StoppedByError).await;

        source.put("n1", "k1", "missed");
        let (late, mut late_rx) = recorder();
        cli.register_config_callback(&param(), late).unwrap();
        assert_eq!(cli.watch_state(&key), Some(WatchState::Running));
        assert_eq!(rx.try_recv().unwrap(), "missed");
        assert_eq!(late_rx.try_recv().unwrap(), "missed");
        assert!(late_rx.try_recv().is_err());

        source.put("n1", "k1", "v2");
        assert_eq!(recv(&mut rx).await, "v2");
        assert_eq!(recv(&mut late_rx).await, "v2");
    }

    #[tokio::test]
    async fn test_param_content_is_the_missing_key_payload() {
        let source = Arc::new(InMemorySource::new());
        source.put("n1", "other", "x");
        let cli = client(source.clone());
        let mut with_content = param();
        with_content.content = "{}".to_string();

        let (callback, mut rx) = recorder();
        cli.register_config_callback(&with_content, callback).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "{}");

        source.put("n1", "k1", "v1");
        assert_eq!(recv(&mut rx).await, "v1");
        source.remove("n1", "k1");
        assert_eq!(recv(&mut rx).await, "{}");
    }

    #[tokio::test]
    async fn test_close_callback_deregisters_own_subscription() {
        let cli = client(Arc::new(InMemorySource::new()));
        let key = param().config_key();
        let first = cli.register_config_callback(&param(), |_: &str, _: &dyn ConfigParser| {}).unwrap();
        cli.register_config_callback(&param(), |_: &str, _: &dyn ConfigParser| {}).unwrap();

        let close = cli.close_callback(key.clone(), first);
        close().unwrap();
        assert_eq!(cli.subscriber_count(&key), 1);
        assert_eq!(cli.watch_state(&key), Some(WatchState::Running));
    }

    #[tokio::test]
    async fn test_shutdown_twice() {
        let source = Arc::new(InMemorySource::new());
        let cli = client(source.clone());
        cli.register_config_callback(&param(), |_: &str, _: &dyn ConfigParser| {}).unwrap();

        cli.shutdown();
        cli.shutdown();
        assert!(source.is_stopped());
        assert_eq!(cli.subscriber_count(&param().config_key()), 0);
        assert!(matches!(
            cli.register_config_callback(&param(), |_: &str, _: &dyn ConfigParser| {}),
            Err(Error::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_set_parser_reaches_callbacks() {
        struct Upper;
        impl ConfigParser for Upper {
            fn decode(&self, _: &ConfigType, data: &str) -> Result<serde_json::Value> {
                Ok(serde_json::Value::String(data.to_uppercase()))
            }
        }

        let source = Arc::new(InMemorySource::new());
        source.put("n1", "k1", "v1");
        let cli = client(source);
        cli.set_parser(Arc::new(Upper));

        let (tx, mut rx) = mpsc::unbounded_channel();
        cli.register_config_callback(&param(), move |data: &str, parser: &dyn ConfigParser| {
            let _ = tx.send(parser.decode(&ConfigType::Json, data).unwrap());
        })
        .unwrap();
        assert_eq!(rx.try_recv().unwrap(), serde_json::json!("V1"));
    }

    #[tokio::test]
    async fn test_config_params_render_templates() {
        let config = ClientConfig::new()
            .namespace("governance-{{.Category}}")
            .cluster("prod")
            .config_type(ConfigType::Yaml);
        let cli = ConfigClientBuilder::new(config)
            .source(Arc::new(InMemorySource::new()))
            .build()
            .unwrap();
        let cpc = ConfigParamConfig {
            category: "retry".to_string(),
            client_service_name: "caller".to_string(),
            server_service_name: "echo".to_string(),
        };

        let param = cli.client_config_param(&cpc, &[]);
        assert_eq!(param.config_key(), ConfigKey::new("governance-retry", "prod", "caller.echo"));
        assert_eq!(param.config_type, ConfigType::Yaml);

        let custom: CustomFunction = Arc::new(|p: &mut ConfigParam| p.key.push_str(".v2"));
        let param = cli.server_config_param(&cpc, &[custom]);
        assert_eq!(param.key, "echo.v2");
    }

    #[tokio::test]
    async fn test_bad_template_fails_fast() {
        let result = ConfigClientBuilder::new(ClientConfig::new().client_key_format("{{.Nope}}"))
            .source(Arc::new(InMemorySource::new()))
            .build();
        assert!(matches!(result, Err(Error::Template { .. })));
    }
}
