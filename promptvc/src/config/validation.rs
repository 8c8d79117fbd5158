//! Configuration validation.

use super::ConfigError;
use super::models::*;

/// Largest number of context lines a diff may request
pub const MAX_DIFF_CONTEXT_LINES: usize = 100;

/// Validate the entire configuration.
pub fn validate_config(config: &PromptVcConfig) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_versioning_config(&config.versioning)?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    match config.engine {
        StorageEngine::Memory => {}
        StorageEngine::SurrealMemory | StorageEngine::SurrealRocksDb => {
            if config.namespace.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "SurrealDB namespace cannot be empty".to_string(),
                ));
            }
            if config.database.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "SurrealDB database cannot be empty".to_string(),
                ));
            }
        }
    }

    if config.engine == StorageEngine::SurrealRocksDb && config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "Data directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_versioning_config(config: &VersioningConfig) -> Result<(), ConfigError> {
    if config.default_branch.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Default branch name cannot be empty".to_string(),
        ));
    }

    if config.diff_context_lines > MAX_DIFF_CONTEXT_LINES {
        return Err(ConfigError::ValidationError(format!(
            "Diff context of {} lines exceeds the maximum of {}",
            config.diff_context_lines, MAX_DIFF_CONTEXT_LINES
        )));
    }

    config
        .retention
        .validate()
        .map_err(ConfigError::ValidationError)
}
