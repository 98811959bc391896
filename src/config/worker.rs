use crate::api::config::{ChangeEvent, ConfigKey, SourceError};
use crate::api::error::{Error, Result};
use crate::api::parser::ConfigParser;
use crate::config::{ConfigCallback, SubscriberId};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Subscribers of one key, shared by the registry and the key's watch task.
pub(crate) type Handlers = Arc<RwLock<HashMap<SubscriberId, ConfigCallback>>>;

/// The parser currently handed to callbacks, swappable at runtime.
pub(crate) type ParserSlot = Arc<RwLock<Arc<dyn ConfigParser>>>;

/// Lifecycle of the watch task of one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WatchState {
    Running = 0,
    /// The config center failed or closed the change stream. The next
    /// registration on the key starts a new task.
    StoppedByError = 1,
    /// The last subscriber left, or the client was shut down.
    StoppedBySignal = 2,
}

impl WatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WatchState::Running,
            1 => WatchState::StoppedByError,
            _ => WatchState::StoppedBySignal,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct WatchStatus(Arc<AtomicU8>);

impl WatchStatus {
    pub(crate) fn running() -> Self {
        WatchStatus(Arc::new(AtomicU8::new(WatchState::Running as u8)))
    }

    pub(crate) fn get(&self) -> WatchState {
        WatchState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: WatchState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.get() == WatchState::Running
    }
}

/// Bridges the change stream of one key to its subscribers.
pub(crate) struct WatchTask {
    pub(crate) key: ConfigKey,
    pub(crate) handlers: Handlers,
    pub(crate) parser: ParserSlot,
    /// Payload dispatched when a change event no longer carries the key.
    pub(crate) default_content: String,
    pub(crate) changes: BoxStream<'static, ChangeEvent>,
    pub(crate) errors: BoxStream<'static, SourceError>,
    pub(crate) stop: CancellationToken,
    pub(crate) status: WatchStatus,
}

impl WatchTask {
    pub(crate) fn spawn(self, runtime: &Handle) -> JoinHandle<()> {
        runtime.spawn(self.supervise())
    }

    async fn supervise(self) {
        let status = self.status.clone();
        let key = self.key.clone();
        match self.run().await {
            Ok(()) => {
                status.set(WatchState::StoppedBySignal);
                tracing::debug!("watch task for {} stopped", key);
            }
            Err(err) => {
                status.set(WatchState::StoppedByError);
                tracing::error!(
                    namespace = %key.namespace,
                    cluster = %key.cluster,
                    key = %key.key,
                    "watch task failed: {}, updates are paused until the key is registered again",
                    err
                );
            }
        }
    }

    async fn run(self) -> Result<()> {
        let WatchTask {
            key,
            handlers,
            parser,
            default_content,
            mut changes,
            mut errors,
            stop,
            ..
        } = self;

        loop {
            tokio::select! { biased;
                _ = stop.cancelled() => return Ok(()),
                Some(err) = errors.next() => {
                    if err.namespace == key.namespace {
                        return Err(Error::Transport(err.to_string()));
                    }
                    tracing::debug!("watch task for {} ignores error of other {}", key, err);
                }
                event = changes.next() => match event {
                    Some(event) => on_change(&key, &handlers, &parser, &default_content, event),
                    None if stop.is_cancelled() => return Ok(()),
                    None => return Err(Error::Transport("change stream closed".to_string())),
                },
            }
        }
    }
}

fn on_change(
    key: &ConfigKey,
    handlers: &Handlers,
    parser: &ParserSlot,
    default_content: &str,
    event: ChangeEvent,
) {
    let data = match event.new_values.get(&key.key) {
        Some(data) => {
            tracing::info!("config {} updated", key);
            data.as_str()
        }
        None => {
            tracing::warn!(
                namespace = %key.namespace,
                cluster = %key.cluster,
                key = %key.key,
                "key not found in change event, notifying default content"
            );
            default_content
        }
    };

    dispatch(key, handlers, None, parser, data);
}

/// Invokes every subscriber of `key` but `skip` with `data`.
pub(crate) fn dispatch(
    key: &ConfigKey,
    handlers: &Handlers,
    skip: Option<SubscriberId>,
    parser: &ParserSlot,
    data: &str,
) {
    // dispatch outside the lock so subscribers may (de)register from a callback
    let callbacks: Vec<(SubscriberId, ConfigCallback)> = handlers
        .read()
        .iter()
        .filter(|(id, _)| Some(**id) != skip)
        .map(|(id, callback)| (*id, callback.clone()))
        .collect();
    let parser = parser.read().clone();
    for (id, callback) in callbacks {
        invoke_callback(key, id, &callback, data, parser.as_ref());
    }
}

/// Runs one callback, a panic is logged and does not reach the caller.
pub(crate) fn invoke_callback(
    key: &ConfigKey,
    id: SubscriberId,
    callback: &ConfigCallback,
    data: &str,
    parser: &dyn ConfigParser,
) {
    tracing::debug!("notify subscriber {} of {}, data {}", id, key, data);
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(data, parser))) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let err = Error::CallbackPanicked(message);
        tracing::error!("subscriber {} of {}: {}", id, key, err);
    }
}
