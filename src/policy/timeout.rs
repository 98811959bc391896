use crate::api::constants::WILDCARD_METHOD;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcTimeout {
    pub rpc_timeout_ms: u64,
    pub conn_timeout_ms: u64,
}

impl RpcTimeout {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn conn_timeout(&self) -> Duration {
        Duration::from_millis(self.conn_timeout_ms)
    }
}

pub trait TimeoutSink: Send + Sync {
    /// Replaces every timeout with `configs`, keyed by method name.
    fn notify_policy_change(&self, configs: HashMap<String, RpcTimeout>);
}

/// Timeout provider with `*` as the fallback method.
#[derive(Debug, Default)]
pub struct TimeoutContainer {
    configs: RwLock<HashMap<String, RpcTimeout>>,
}

impl TimeoutContainer {
    pub fn new() -> Self {
        TimeoutContainer::default()
    }

    pub fn timeouts(&self, method: &str) -> Option<RpcTimeout> {
        let configs = self.configs.read();
        configs
            .get(method)
            .or_else(|| configs.get(WILDCARD_METHOD))
            .copied()
    }
}

impl TimeoutSink for TimeoutContainer {
    fn notify_policy_change(&self, configs: HashMap<String, RpcTimeout>) {
        *self.configs.write() = configs;
    }
}
