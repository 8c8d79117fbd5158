//! Configuration system for promptvc.
//!
//! Configuration is layered from defaults, an optional file and `PROMPTVC_`
//! environment variables, then validated before any repository is opened.

mod builder;
mod loader;
mod models;
#[cfg(test)]
mod tests;
mod validation;

pub use builder::ConfigBuilder;
pub use loader::ConfigLoader;
pub use models::*;
pub use validation::validate_config;

/// Configuration file names looked up in the working directory, in order
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "promptvc.toml",
    "promptvc.yaml",
    "promptvc.yml",
    "promptvc.json",
    ".promptvc/config.toml",
    ".promptvc/config.yaml",
    ".promptvc/config.yml",
    ".promptvc/config.json",
];

/// Environment variable prefix for promptvc configuration
pub const ENV_PREFIX: &str = "PROMPTVC_";

/// Separator between nested keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error occurred during file loading
    #[error("Failed to load configuration file: {0}")]
    FileLoadError(String),

    /// Error occurred during validation
    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    /// Error occurred during parsing
    #[error("Configuration parsing error: {0}")]
    ParseError(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
