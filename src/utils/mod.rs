mod set;

pub(crate) use set::{Set, ThreadSafeSet};

use crate::api::config::ConfigParam;
use std::sync::Arc;

/// Adjusts a rendered [`ConfigParam`] before it is registered.
pub type CustomFunction = Arc<dyn Fn(&mut ConfigParam) + Send + Sync>;

/// Per-adapter options.
#[derive(Clone, Default)]
pub struct Options {
    pub custom_functions: Vec<CustomFunction>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    pub fn custom_function(mut self, f: impl Fn(&mut ConfigParam) + Send + Sync + 'static) -> Self {
        self.custom_functions.push(Arc::new(f));
        self
    }

    pub(crate) fn apply(&self, param: &mut ConfigParam) {
        for f in &self.custom_functions {
            f(param);
        }
    }
}

impl From<Vec<CustomFunction>> for Options {
    fn from(custom_functions: Vec<CustomFunction>) -> Self {
        Options { custom_functions }
    }
}
