use crate::api::config::{ChangeEvent, ConfigKey, ConfigSource, SourceError};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 64;

/// A config center held in process memory.
///
/// Every write publishes the full value set of its namespace, like a long
/// polling client does after a namespace changed remotely.
pub struct InMemorySource {
    namespaces: RwLock<HashMap<String, HashMap<String, String>>>,
    changes: broadcast::Sender<ChangeEvent>,
    errors: broadcast::Sender<SourceError>,
    stopped: AtomicBool,
}

impl Default for InMemorySource {
    fn default() -> Self {
        InMemorySource::new()
    }
}

impl InMemorySource {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(CHANNEL_CAPACITY);
        InMemorySource {
            namespaces: RwLock::new(HashMap::new()),
            changes,
            errors,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn put(&self, namespace: &str, key: &str, value: &str) {
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.publish(namespace);
    }

    pub fn remove(&self, namespace: &str, key: &str) -> Option<String> {
        let removed = self
            .namespaces
            .write()
            .get_mut(namespace)
            .and_then(|values| values.remove(key));
        if removed.is_some() {
            self.publish(namespace);
        }
        removed
    }

    /// Reports an unrecoverable error to every running watch.
    pub fn fail(&self, namespace: &str, message: &str) {
        let err = SourceError {
            namespace: namespace.to_string(),
            message: message.to_string(),
        };
        if self.errors.send(err).is_err() {
            tracing::debug!("no watcher to report the error of namespace {} to", namespace);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn publish(&self, namespace: &str) {
        let new_values = self
            .namespaces
            .read()
            .get(namespace)
            .cloned()
            .unwrap_or_default();
        let event = ChangeEvent {
            namespace: namespace.to_string(),
            new_values,
        };
        if self.changes.send(event).is_err() {
            tracing::debug!("namespace {} changed, nobody is watching", namespace);
        }
    }
}

impl ConfigSource for InMemorySource {
    fn snapshot(&self, key: &ConfigKey) -> Option<HashMap<String, String>> {
        self.namespaces.read().get(&key.namespace).cloned()
    }

    fn start(&self) -> BoxStream<'static, SourceError> {
        BroadcastStream::new(self.errors.subscribe())
            .filter_map(|item| futures::future::ready(item.ok()))
            .boxed()
    }

    fn watch_namespace(
        &self,
        namespace: &str,
        stop: CancellationToken,
    ) -> BoxStream<'static, ChangeEvent> {
        let namespace = namespace.to_string();
        BroadcastStream::new(self.changes.subscribe())
            .filter_map(move |item| {
                let event = match item {
                    Ok(event) if event.namespace == namespace => Some(event),
                    Ok(_) => None,
                    Err(err) => {
                        tracing::warn!("watch of namespace {} fell behind: {}", namespace, err);
                        None
                    }
                };
                futures::future::ready(event)
            })
            .take_until(stop.cancelled_owned())
            .boxed()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watch_namespace_filters_and_stops() {
        let source = InMemorySource::new();
        let stop = CancellationToken::new();
        let mut changes = source.watch_namespace("n1", stop.clone());

        source.put("n2", "k", "ignored");
        source.put("n1", "k1", "v1");
        let event = changes.next().await.unwrap();
        assert_eq!(event.namespace, "n1");
        assert_eq!(event.new_values.get("k1").map(String::as_str), Some("v1"));

        assert_eq!(source.remove("n1", "k1").as_deref(), Some("v1"));
        let event = changes.next().await.unwrap();
        assert!(event.new_values.is_empty());

        stop.cancel();
        assert!(changes.next().await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_and_errors() {
        let source = InMemorySource::new();
        assert!(source.snapshot(&ConfigKey::new("n1", "c", "k1")).is_none());
        source.put("n1", "k1", "v1");
        let values = source.snapshot(&ConfigKey::new("n1", "c", "k1")).unwrap();
        assert_eq!(values.get("k1").map(String::as_str), Some("v1"));

        let mut errors = source.start();
        source.fail("n1", "boom");
        let err = errors.next().await.unwrap();
        assert_eq!(err.to_string(), "namespace n1: boom");

        assert!(!source.is_stopped());
        source.stop();
        assert!(source.is_stopped());
    }
}
