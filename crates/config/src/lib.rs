//! Configuration for the ragkit workspace
//!
//! Exposes the shared tuning constants and the layered [`Settings`] loader.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, ChunkingConfig, ProviderConfig, RefineConfig, RerankConfig, RetrievalConfig,
    SelectionConfig, Settings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for ragkit_core::Error {
    fn from(err: ConfigError) -> Self {
        ragkit_core::Error::Config(err.to_string())
    }
}
