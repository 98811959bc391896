//! Server side policies.

mod limiter;
mod suite;

pub use limiter::{watch_limiter, with_limiter};
pub use suite::ServerSuite;

use crate::config::CloseCallback;
use crate::policy::LimitOption;
use std::fmt;
use std::sync::Arc;

/// Option handed to the RPC server under construction.
pub enum ServerOption {
    Limit(Arc<LimitOption>),
    /// Runs when the RPC server is stopped.
    CloseCallback(CloseCallback),
}

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerOption::Limit(opt) => f.debug_tuple("Limit").field(opt).finish(),
            ServerOption::CloseCallback(_) => f.write_str("CloseCallback"),
        }
    }
}
