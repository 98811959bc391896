use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CbConfig {
    pub enable: bool,
    pub err_rate: f64,
    pub min_sample: i64,
}

impl Default for CbConfig {
    fn default() -> Self {
        CbConfig {
            enable: true,
            err_rate: 0.5,
            min_sample: 200,
        }
    }
}

/// Breaker key of a method, shared by the breaker lookup and config updates.
pub fn service_cb_key(to_service: &str, method: &str) -> String {
    let mut key = String::with_capacity(to_service.len() + method.len() + 1);
    key.push_str(to_service);
    key.push('/');
    key.push_str(method);
    key
}

pub trait CircuitBreakerSink: Send + Sync {
    fn update_service_cb_config(&self, key: &str, config: CbConfig);
}

/// Service level breaker configs by [`service_cb_key`].
#[derive(Debug, Default)]
pub struct CbSuite {
    configs: RwLock<HashMap<String, CbConfig>>,
}

impl CbSuite {
    pub fn new() -> Self {
        CbSuite::default()
    }

    /// Config of `key`, the default one when it was never set.
    pub fn config(&self, key: &str) -> CbConfig {
        self.configs.read().get(key).cloned().unwrap_or_default()
    }
}

impl CircuitBreakerSink for CbSuite {
    fn update_service_cb_config(&self, key: &str, config: CbConfig) {
        self.configs.write().insert(key.to_string(), config);
    }
}
