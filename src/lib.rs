//! Dynamic RPC governance policies backed by a remote config center.
//!
//! A [`ConfigClient`] keeps a registry of subscriber callbacks per
//! [`ConfigKey`](api::config::ConfigKey). Each subscriber gets the current
//! value synchronously when it registers, then every later change pushed by
//! the config center until it deregisters. On top of the registry the
//! `client` and `server` modules wire retry, timeout, circuit-breaker and
//! limiter policies into live, thread-safe policy sinks.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rpc_config_watch::api::client_config::ClientConfig;
//! use rpc_config_watch::api::config::ConfigClientBuilder;
//! use rpc_config_watch::InMemorySource;
//!
//! # async fn run() -> rpc_config_watch::api::error::Result<()> {
//! let source = Arc::new(InMemorySource::new());
//! let client = ConfigClientBuilder::new(ClientConfig::new())
//!     .source(source)
//!     .build()?;
//! let suite = rpc_config_watch::client::ClientSuite::new("echo", "caller", client.clone());
//! let _options = suite.options()?;
//! client.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod api;
#[cfg(feature = "client")]
pub mod client;
mod config;
pub mod policy;
#[cfg(feature = "server")]
pub mod server;
mod utils;

pub use config::memory::InMemorySource;
pub use config::worker::WatchState;
pub use config::{CloseCallback, ConfigCallback, ConfigClient, SubscriberId};
pub use utils::{CustomFunction, Options};
