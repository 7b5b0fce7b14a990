//! Errors raised while loading, merging, or validating configuration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {key} has an invalid value {value:?}: {reason}")]
    InvalidEnvValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("include/exclude pattern failed to compile: {0}")]
    PatternCompile(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
