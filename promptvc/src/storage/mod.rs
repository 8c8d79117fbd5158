//! Storage abstractions and implementations
//!
//! The versioning core talks to storage only through [`VersionRepository`].
//!
//! ## Implementations
//!
//! - **InMemoryRepository**: process-local maps, used in tests and previews
//! - **SurrealRepository**: SurrealDB, in memory or embedded on disk with RocksDB

pub mod errors;
pub mod memory;
#[cfg(feature = "surrealdb-embedded")]
pub mod surreal;
pub mod traits;

use std::sync::Arc;

pub use errors::{StorageError, StorageResult};
pub use memory::InMemoryRepository;
pub use traits::{VersionRepository, check_protected};

use crate::config::{StorageConfig, StorageEngine};

/// Open the repository selected by the storage configuration
pub async fn create_repository(
    config: &StorageConfig,
) -> Result<Arc<dyn VersionRepository>, StorageError> {
    tracing::debug!(engine = %config.engine, "Opening version repository");

    match config.engine {
        StorageEngine::Memory => Ok(Arc::new(InMemoryRepository::new())),
        #[cfg(feature = "surrealdb-embedded")]
        StorageEngine::SurrealMemory => {
            let repository = surreal::create_memory_repository(surreal_config(config)).await?;
            Ok(Arc::new(repository))
        }
        #[cfg(feature = "surrealdb-embedded")]
        StorageEngine::SurrealRocksDb => {
            let path = config.rocksdb_path();
            std::fs::create_dir_all(&path)?;
            let repository =
                surreal::create_embedded_repository(&path.to_string_lossy(), surreal_config(config))
                    .await?;
            Ok(Arc::new(repository))
        }
        #[cfg(not(feature = "surrealdb-embedded"))]
        engine => Err(StorageError::Configuration(format!(
            "Storage engine '{}' requires the surrealdb-embedded feature",
            engine
        ))),
    }
}

#[cfg(feature = "surrealdb-embedded")]
fn surreal_config(config: &StorageConfig) -> surreal::SurrealRepositoryConfig {
    surreal::SurrealRepositoryConfig {
        namespace: config.namespace.clone(),
        database: config.database.clone(),
    }
}
