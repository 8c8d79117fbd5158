//! Configuration builder.

use super::{Result, models::*, validation};
use crate::models::RetentionPolicy;
use std::path::Path;

/// Builder for creating [`PromptVcConfig`] instances.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: PromptVcConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self {
            config: PromptVcConfig::default(),
        }
    }

    /// Set the base data directory.
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.storage.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Select the storage engine.
    pub fn with_storage_engine(mut self, engine: StorageEngine) -> Self {
        self.config.storage.engine = engine;
        self
    }

    /// Use the process-local in-memory repository (good for testing)
    pub fn with_memory_storage(self) -> Self {
        self.with_storage_engine(StorageEngine::Memory)
    }

    /// Use SurrealDB on disk under the data directory
    pub fn with_embedded_storage(self) -> Self {
        self.with_storage_engine(StorageEngine::SurrealRocksDb)
    }

    /// Set the SurrealDB namespace and database.
    pub fn with_surreal_namespace(
        mut self,
        namespace: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        self.config.storage.namespace = namespace.into();
        self.config.storage.database = database.into();
        self
    }

    /// Set the branch used when callers do not name one.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.config.versioning.default_branch = branch.into();
        self
    }

    /// Set the number of context lines around diff changes.
    pub fn with_diff_context_lines(mut self, lines: usize) -> Self {
        self.config.versioning.diff_context_lines = lines;
        self
    }

    /// Set the initial retention policy.
    pub fn with_retention(mut self, policy: RetentionPolicy) -> Self {
        self.config.versioning.retention = policy;
        self
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set the log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    /// Configure logging to a file instead of stdout.
    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.logging.file = Some(path.as_ref().to_path_buf());
        self.config.logging.stdout = false;
        self
    }

    /// Configuration for development: in-memory storage, debug logging.
    pub fn development() -> Self {
        Self::new()
            .with_memory_storage()
            .with_log_level(LogLevel::Debug)
            .with_log_format(LogFormat::Pretty)
    }

    /// Configuration for automated tests: in-memory storage, no retention limits.
    pub fn testing() -> Self {
        Self::development().with_retention(RetentionPolicy::keep_all())
    }

    /// Configuration for production: embedded SurrealDB, JSON logs.
    pub fn production() -> Self {
        Self::new()
            .with_embedded_storage()
            .with_log_level(LogLevel::Info)
            .with_log_format(LogFormat::Json)
    }

    /// Build the configuration, validating it in the process.
    pub fn build(self) -> Result<PromptVcConfig> {
        validation::validate_config(&self.config)?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
