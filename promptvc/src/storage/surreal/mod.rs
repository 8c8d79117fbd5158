//! SurrealDB repository
//!
//! Stores prompt versions, branches and settings in SurrealDB, either fully
//! in memory (tests, previews) or embedded on disk through RocksDB.

use surrealdb::Surreal;

use crate::storage::errors::StorageError;

pub mod base;
pub mod schema;
pub mod version;

pub use base::{SurrealRepository, SurrealRepositoryConfig};

/// Type alias for the embedded repository
pub type EmbeddedSurrealRepository = SurrealRepository<surrealdb::engine::local::Db>;

/// Open a repository on an in-memory SurrealDB instance
pub async fn create_memory_repository(
    config: SurrealRepositoryConfig,
) -> Result<EmbeddedSurrealRepository, StorageError> {
    let client = Surreal::new::<surrealdb::engine::local::Mem>(())
        .await
        .map_err(|e| StorageError::Connection(format!("Failed to create memory client: {}", e)))?;

    SurrealRepository::new(client, config).await
}

/// Open a repository on an embedded RocksDB-backed SurrealDB instance
pub async fn create_embedded_repository(
    path: &str,
    config: SurrealRepositoryConfig,
) -> Result<EmbeddedSurrealRepository, StorageError> {
    use surrealdb::engine::local::RocksDb;

    let client = Surreal::new::<RocksDb>(path).await.map_err(|e| {
        StorageError::Connection(format!("Failed to create embedded database: {}", e))
    })?;

    SurrealRepository::new(client, config).await
}
