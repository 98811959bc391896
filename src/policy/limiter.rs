use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Limiter payload. Zero or negative limits mean unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub connection_limit: i64,
    pub qps_limit: i64,
}

/// Limits as the server applies them, zero meaning unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LimitSettings {
    pub max_connections: usize,
    pub max_qps: usize,
}

impl From<LimiterConfig> for LimitSettings {
    fn from(config: LimiterConfig) -> Self {
        LimitSettings {
            max_connections: usize::try_from(config.connection_limit).unwrap_or(0),
            max_qps: usize::try_from(config.qps_limit).unwrap_or(0),
        }
    }
}

/// The server's handle to its running limiters.
pub trait LimitUpdater: Send + Sync {
    /// Returns false when the new limits could not take effect.
    fn update_limit(&self, settings: &LimitSettings) -> bool;
}

/// Limit option handed to the server.
///
/// The server binds its [`LimitUpdater`] through
/// [`LimitOption::update_control`] once its limiters exist, which may be after
/// the first config value arrived.
#[derive(Default)]
pub struct LimitOption {
    settings: RwLock<LimitSettings>,
    updater: RwLock<Option<Arc<dyn LimitUpdater>>>,
}

impl fmt::Debug for LimitOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitOption")
            .field("settings", &*self.settings.read())
            .field("updater_bound", &self.updater.read().is_some())
            .finish()
    }
}

impl LimitOption {
    pub fn new() -> Self {
        LimitOption::default()
    }

    pub fn settings(&self) -> LimitSettings {
        *self.settings.read()
    }

    /// Binds the server's updater and pushes the current limits into it.
    pub fn update_control(&self, updater: Arc<dyn LimitUpdater>) {
        let settings = self.settings();
        tracing::debug!("limiter updater bound, settings {:?}", settings);
        updater.update_limit(&settings);
        *self.updater.write() = Some(updater);
    }

    pub(crate) fn set_settings(&self, settings: LimitSettings) {
        *self.settings.write() = settings;
    }

    pub(crate) fn updater(&self) -> Option<Arc<dyn LimitUpdater>> {
        self.updater.read().clone()
    }
}
