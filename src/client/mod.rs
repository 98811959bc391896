//! Client side policies: retry, RPC timeout and circuit breaker.

mod circuit_breaker;
mod retry;
mod rpc_timeout;
mod suite;

pub use circuit_breaker::{watch_circuit_breaker, with_circuit_breaker};
pub use retry::{watch_retry_policy, with_retry_policy};
pub use rpc_timeout::{watch_rpc_timeout, with_rpc_timeout};
pub use suite::ClientSuite;

use crate::config::CloseCallback;
use crate::policy::{CbSuite, RetryContainer, TimeoutContainer};
use std::fmt;
use std::sync::Arc;

/// Option handed to the RPC client under construction.
pub enum ClientOption {
    RetryContainer(Arc<RetryContainer>),
    TimeoutProvider(Arc<TimeoutContainer>),
    CircuitBreaker(Arc<CbSuite>),
    /// Runs when the RPC client is closed.
    CloseCallback(CloseCallback),
}

impl fmt::Debug for ClientOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientOption::RetryContainer(c) => f.debug_tuple("RetryContainer").field(c).finish(),
            ClientOption::TimeoutProvider(c) => f.debug_tuple("TimeoutProvider").field(c).finish(),
            ClientOption::CircuitBreaker(c) => f.debug_tuple("CircuitBreaker").field(c).finish(),
            ClientOption::CloseCallback(_) => f.write_str("CloseCallback"),
        }
    }
}
