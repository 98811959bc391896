//! Governance policies as served by the config center, and the sinks the
//! adapters push them into.
//!
//! Sinks are owned by the RPC framework and must be safe to update from the
//! watch tasks while requests read them. The containers in this module are
//! ready-made sinks for frameworks without their own.

pub mod circuit_breaker;
pub mod limiter;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{service_cb_key, CbConfig, CbSuite, CircuitBreakerSink};
pub use limiter::{LimitOption, LimitSettings, LimitUpdater, LimiterConfig};
pub use retry::{
    BackOffPolicy, BackOffType, BackupPolicy, CbPolicy, FailurePolicy, RetryContainer,
    RetryPolicy, RetryPolicySink, RetryType, StopPolicy,
};
pub use timeout::{RpcTimeout, TimeoutContainer, TimeoutSink};
