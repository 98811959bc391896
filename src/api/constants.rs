pub const RETRY_CONFIG_NAME: &str = "retry";
pub const RPC_TIMEOUT_CONFIG_NAME: &str = "rpc_timeout";
pub const CIRCUIT_BREAKER_CONFIG_NAME: &str = "circuit_break";
pub const LIMITER_CONFIG_NAME: &str = "limit";

pub const DEFAULT_CLUSTER: &str = "default";
pub const DEFAULT_NAMESPACE_TEMPLATE: &str = "{{.Category}}";
pub const DEFAULT_CLIENT_KEY_FORMAT: &str = "{{.ClientServiceName}}.{{.ServerServiceName}}";
pub const DEFAULT_SERVER_KEY_FORMAT: &str = "{{.ServerServiceName}}";

/// Payload handed to subscribers when a key is missing or was deleted remotely.
pub const DEFAULT_CONTENT: &str = "";

/// Method name matching every method without an explicit policy.
pub const WILDCARD_METHOD: &str = "*";
