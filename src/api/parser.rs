use crate::api::config::ConfigType;
use crate::api::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Decodes raw config payloads.
pub trait ConfigParser: Send + Sync {
    fn decode(&self, kind: &ConfigType, data: &str) -> Result<serde_json::Value>;
}

/// Decodes `data` with `parser` into a concrete shape.
pub fn decode<T: DeserializeOwned>(
    parser: &dyn ConfigParser,
    kind: &ConfigType,
    data: &str,
) -> Result<T> {
    let value = parser.decode(kind, data)?;
    serde_json::from_value(value).map_err(|source| Error::Decode {
        kind: kind.to_string(),
        source,
    })
}

/// Like [`decode`], but the deletion sentinel decodes to `T::default()`.
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(
    parser: &dyn ConfigParser,
    kind: &ConfigType,
    data: &str,
) -> Result<T> {
    if data.trim().is_empty() {
        return Ok(T::default());
    }
    decode(parser, kind, data)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultParser;

impl ConfigParser for DefaultParser {
    fn decode(&self, kind: &ConfigType, data: &str) -> Result<serde_json::Value> {
        match kind {
            // the yaml payloads served to this client are plain JSON documents
            ConfigType::Json | ConfigType::Yaml => {
                serde_json::from_str(data).map_err(|source| Error::Decode {
                    kind: kind.to_string(),
                    source,
                })
            }
            ConfigType::Other(other) => Err(Error::UnsupportedType(other.clone())),
        }
    }
}
