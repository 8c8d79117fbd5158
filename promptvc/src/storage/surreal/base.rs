//! SurrealDB-backed repository handle

use surrealdb::{Connection, Surreal};

use super::schema;
use crate::storage::errors::StorageError;

/// Namespace/database selection for a [`SurrealRepository`]
#[derive(Debug, Clone)]
pub struct SurrealRepositoryConfig {
    pub namespace: String,
    pub database: String,
}

impl Default for SurrealRepositoryConfig {
    fn default() -> Self {
        Self {
            namespace: "promptvc".to_string(),
            database: "main".to_string(),
        }
    }
}

/// Prompt version repository stored in SurrealDB
#[derive(Debug)]
pub struct SurrealRepository<C>
where
    C: Connection + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    pub(crate) client: Surreal<C>,
    pub(crate) config: SurrealRepositoryConfig,
}

impl<C> SurrealRepository<C>
where
    C: Connection + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    /// Select the namespace/database and make sure the schema exists
    pub async fn new(
        client: Surreal<C>,
        config: SurrealRepositoryConfig,
    ) -> Result<Self, StorageError> {
        client
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StorageError::Connection(format!("Failed to set namespace/database: {}", e))
            })?;

        schema::initialize_schema(&client).await?;

        tracing::debug!(
            namespace = %config.namespace,
            database = %config.database,
            "SurrealDB version repository ready"
        );

        Ok(Self { client, config })
    }

    /// The configuration this repository was opened with
    pub fn config(&self) -> &SurrealRepositoryConfig {
        &self.config
    }

    /// The underlying SurrealDB client
    pub fn client(&self) -> &Surreal<C> {
        &self.client
    }
}

/// Whether a SurrealDB error came from a unique index rejecting a duplicate key
pub(crate) fn is_unique_violation(err: &surrealdb::Error) -> bool {
    let message = err.to_string();
    message.contains("already contains") || message.contains("already exists")
}
