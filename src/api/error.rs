/// Result of every fallible operation of this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The config center reported an unrecoverable error, or its change stream ended.
    #[error("config center transport error: {0}")]
    Transport(String),

    #[error("decode {kind} payload failed: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config data type {0}")]
    UnsupportedType(String),

    /// Decodable but not acceptable for its policy domain.
    #[error("invalid {subject}: {reason}")]
    Validation { subject: String, reason: String },

    #[error("key {key} not found in namespace {namespace}, cluster {cluster}")]
    NotFound {
        namespace: String,
        cluster: String,
        key: String,
    },

    #[error("invalid name template {template:?}: {reason}")]
    Template { template: String, reason: String },

    #[error("no tokio runtime available to run watch tasks")]
    NoRuntime,

    #[error("config client has been shut down")]
    Shutdown,

    #[error("config callback panicked: {0}")]
    CallbackPanicked(String),
}
