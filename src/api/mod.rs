pub mod client_config;
pub mod config;
pub mod constants;
pub mod error;
pub mod parser;
pub(crate) mod template;

pub use config::{
    ChangeEvent, ConfigClientBuilder, ConfigKey, ConfigParam, ConfigParamConfig, ConfigSource,
    ConfigType, MissingKeyPolicy, SourceError,
};
pub use parser::{decode, ConfigParser, DefaultParser};
