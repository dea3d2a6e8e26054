mod loader;
mod types;
mod validate;

pub use loader::{
    load_config, load_config_from_str, load_config_with_env, ConfigKey, ValueKind, CONFIG_KEYS,
};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Missing configuration: set the {env_key} environment variable or `{path}` in the config file")]
    MissingConfiguration {
        env_key: &'static str,
        path: &'static str,
    },

    #[error("Invalid value for environment variable {env_key}: {message}")]
    InvalidEnvironmentValue {
        env_key: &'static str,
        message: String,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
