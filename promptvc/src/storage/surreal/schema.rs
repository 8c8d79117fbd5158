//! Schema initialization for the SurrealDB repository

use crate::storage::errors::StorageError;
use surrealdb::{Connection, Surreal};

/// Table holding singleton settings records
pub(crate) const SETTINGS_TABLE: &str = "versioning_settings";

/// Initialize tables and indexes.
///
/// The unique index on `(prompt_id, branch, version)` is what turns two
/// racing inserts of the same number into a conflict.
pub async fn initialize_schema<C>(client: &Surreal<C>) -> Result<(), StorageError>
where
    C: Connection,
{
    let version_table_query = r#"
        DEFINE TABLE IF NOT EXISTS prompt_version SCHEMALESS
        COMMENT "Immutable prompt version snapshots";

        DEFINE INDEX IF NOT EXISTS prompt_version_key ON prompt_version
            FIELDS prompt_id, branch, version UNIQUE;
        DEFINE INDEX IF NOT EXISTS prompt_version_prompt_idx ON prompt_version FIELDS prompt_id;
        DEFINE INDEX IF NOT EXISTS prompt_version_created_at_idx ON prompt_version FIELDS created_at;
    "#;

    let branch_table_query = r#"
        DEFINE TABLE IF NOT EXISTS prompt_branch SCHEMALESS
        COMMENT "Named version sequences of a prompt";

        DEFINE INDEX IF NOT EXISTS prompt_branch_key ON prompt_branch
            FIELDS prompt_id, name UNIQUE;
    "#;

    let settings_table_query = r#"
        DEFINE TABLE IF NOT EXISTS versioning_settings SCHEMALESS
        COMMENT "Persisted versioning settings such as the retention policy";
    "#;

    execute_schema_query(client, version_table_query, "version table").await?;
    execute_schema_query(client, branch_table_query, "branch table").await?;
    execute_schema_query(client, settings_table_query, "settings table").await?;

    tracing::info!("Prompt versioning schema initialized");
    Ok(())
}

/// Execute a schema query and handle errors
async fn execute_schema_query<C>(
    client: &Surreal<C>,
    query: &str,
    description: &str,
) -> Result<(), StorageError>
where
    C: Connection,
{
    client
        .query(query)
        .await
        .and_then(|response| response.check())
        .map_err(|e| StorageError::Query(format!("Failed to create {}: {}", description, e)))?;

    tracing::debug!("Created {} successfully", description);
    Ok(())
}
