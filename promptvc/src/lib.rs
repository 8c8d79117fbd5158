//! # promptvc
//!
//! Version control for prompt text. Every save appends an immutable,
//! numbered snapshot to a `(prompt, branch)` sequence; older content is
//! restored by appending it again, never by rewriting history.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use promptvc::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConfigBuilder::testing().build()?;
//!     let service = promptvc::init(config).await?;
//!
//!     service.save_version("greeting", "Hello", serde_json::json!({}), None, SaveOptions::default()).await?;
//!     service.save_version("greeting", "Hello there", serde_json::json!({}), Some("friendlier"), SaveOptions::default()).await?;
//!
//!     let diff = service.diff("greeting", 1, 2, DiffOptions::default()).await?;
//!     println!("{}", diff.to_unified());
//!
//!     service.rollback("greeting", 1, RollbackOptions::default().with_backup()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Storage**: the [`storage::VersionRepository`] contract, with an in-memory
//!   implementation and a SurrealDB one (feature `surrealdb-embedded`)
//! - **Diff**: pure minimal line diffs grouped into hunks
//! - **Versioning**: append serialization, rollback, retention cleanup and the
//!   [`versioning::VersionService`] façade

pub mod config;
pub mod diff;
pub mod logging;
pub mod models;
pub mod storage;
pub mod versioning;

use std::sync::Arc;

use crate::models::VersionNumber;
use crate::storage::{StorageError, VersionRepository};
use crate::versioning::VersionService;

/// The prelude re-exports commonly used types for convenience
pub mod prelude {
    pub use crate::{init, init_with_defaults};

    pub use crate::config::{ConfigBuilder, LogLevel, PromptVcConfig, StorageEngine};

    pub use crate::diff::{DiffHunk, DiffLine, DiffResult, DiffStats, apply_patch, compute_diff};

    pub use crate::models::{
        Branch, MAIN_BRANCH, PINNED_TAG, PromptVersion, RetentionPolicy, VersionNumber,
    };

    pub use crate::storage::{InMemoryRepository, StorageError, VersionRepository};

    pub use crate::versioning::{
        BranchOptions, CancelFlag, CleanupOptions, CleanupSummary, CreateBranchOptions,
        DiffOptions, ListOptions, RollbackOptions, SaveOptions, VersionService, VersioningStats,
    };

    pub use crate::{Result, VersionError};
}

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error type for versioning operations
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// No prompt with this id has any recorded history
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// The version number is not present for the prompt/branch
    #[error("Version {version} not found for prompt '{prompt_id}' on branch '{branch}'")]
    VersionNotFound {
        prompt_id: String,
        branch: String,
        version: VersionNumber,
    },

    /// Zero version numbers, or equal endpoints where a no-op diff was refused
    #[error("Invalid version range: {0}")]
    InvalidVersionRange(String),

    /// Two writers raced for the same version number and the retry lost too
    #[error("Concurrent append conflict on prompt '{prompt_id}' branch '{branch}'")]
    ConcurrentAppendConflict { prompt_id: String, branch: String },

    /// Something asked to delete HEAD or a pinned version. Never recovered from.
    #[error("Refusing to delete protected version v{version} of '{prompt_id}' on '{branch}': {reason}")]
    ProtectedVersionDeletion {
        prompt_id: String,
        branch: String,
        version: VersionNumber,
        reason: String,
    },

    /// The branch is not registered for the prompt
    #[error("Branch '{branch}' not found for prompt '{prompt_id}'")]
    BranchNotFound { prompt_id: String, branch: String },

    /// The branch name is already taken for the prompt
    #[error("Branch '{branch}' already exists for prompt '{prompt_id}'")]
    BranchAlreadyExists { prompt_id: String, branch: String },

    /// Tag labels must be non-empty and free of whitespace
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// A retention policy with meaningless limits
    #[error("Invalid retention policy: {0}")]
    InvalidRetentionPolicy(String),

    /// The repository's underlying medium errored
    #[error("Storage failure: {0}")]
    StorageFailure(StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] crate::config::ConfigError),

    /// Logging error
    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LogError),
}

impl From<StorageError> for VersionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SequenceConflict {
                prompt_id, branch, ..
            } => VersionError::ConcurrentAppendConflict { prompt_id, branch },
            StorageError::ProtectedVersion {
                prompt_id,
                branch,
                version,
                reason,
            } => VersionError::ProtectedVersionDeletion {
                prompt_id,
                branch,
                version,
                reason,
            },
            other => VersionError::StorageFailure(other),
        }
    }
}

/// Result type for versioning operations
pub type Result<T> = std::result::Result<T, VersionError>;

/// Initialize promptvc with the default configuration
///
/// Loads `promptvc.toml` (or YAML/JSON) from the usual locations and
/// `PROMPTVC_*` environment variables on top of the built-in defaults.
pub async fn init_with_defaults() -> Result<VersionService> {
    let config = config::ConfigLoader::new()
        .load_default_files()
        .load_env()
        .extract()?;
    init(config).await
}

/// Initialize promptvc with the provided configuration
///
/// Installs logging (an already-installed subscriber is left alone), opens
/// the configured repository and returns a service over it.
pub async fn init(config: config::PromptVcConfig) -> Result<VersionService> {
    config::validate_config(&config)?;

    let logging = logging::init(&config.logging)?;

    let repository: Arc<dyn VersionRepository> =
        storage::create_repository(&config.storage).await?;

    tracing::info!(
        engine = %config.storage.engine,
        default_branch = %config.versioning.default_branch,
        "promptvc initialized"
    );

    Ok(VersionService::new(repository, config.versioning).with_logging_guard(logging))
}
