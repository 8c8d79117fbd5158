//! Repository contract implementation for SurrealRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use surrealdb::{Connection, RecordId};

use super::base::{SurrealRepository, is_unique_violation};
use super::schema::SETTINGS_TABLE;
use crate::models::{Branch, ForkPoint, PINNED_TAG, PromptVersion, RetentionPolicy, VersionNumber};
use crate::storage::errors::StorageError;
use crate::storage::traits::{VersionRepository, check_protected};

/// Row layout of the `prompt_version` table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SurrealPromptVersion {
    prompt_id: String,
    branch: String,
    version: i64,
    content: String,
    #[serde(default)]
    frontmatter: Value,
    created_at: DateTime<Utc>,
    #[serde(default)]
    change_reason: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<SurrealPromptVersion> for PromptVersion {
    fn from(row: SurrealPromptVersion) -> Self {
        PromptVersion {
            prompt_id: row.prompt_id,
            branch: row.branch,
            version: row.version.max(0) as VersionNumber,
            content: row.content,
            frontmatter: row.frontmatter,
            created_at: row.created_at,
            change_reason: row.change_reason,
            tags: row.tags.into_iter().collect(),
        }
    }
}

/// Row layout of the `prompt_branch` table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SurrealBranch {
    prompt_id: String,
    name: String,
    is_active: bool,
    #[serde(default)]
    forked_from_branch: Option<String>,
    #[serde(default)]
    forked_from_version: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<SurrealBranch> for Branch {
    fn from(row: SurrealBranch) -> Self {
        let forked_from = match (row.forked_from_branch, row.forked_from_version) {
            (Some(branch), Some(version)) => Some(ForkPoint {
                branch,
                version: version.max(0) as VersionNumber,
            }),
            _ => None,
        };

        Branch {
            prompt_id: row.prompt_id,
            name: row.name,
            is_active: row.is_active,
            forked_from,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionNumberRow {
    version: i64,
}

#[derive(Debug, Deserialize)]
struct PromptIdRow {
    prompt_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct SurrealRetention {
    #[serde(default)]
    max_versions: Option<i64>,
    #[serde(default)]
    max_age_days: Option<i64>,
}

fn to_db_number(version: VersionNumber) -> Result<i64, StorageError> {
    i64::try_from(version)
        .map_err(|_| StorageError::Conversion(format!("Version number {} out of range", version)))
}

fn limit_clause(limit: Option<usize>) -> String {
    limit.map(|n| format!("LIMIT {}", n)).unwrap_or_default()
}

fn retention_record_id() -> RecordId {
    RecordId::from((SETTINGS_TABLE, "retention"))
}

impl<C> SurrealRepository<C>
where
    C: Connection + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    async fn update_tags(
        &self,
        query: &str,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        tag: &str,
    ) -> Result<Option<PromptVersion>, StorageError> {
        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .bind(("branch", branch.to_string()))
            .bind(("version", to_db_number(version)?))
            .bind(("tag", tag.to_string()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to update tags: {}", e)))?;

        let updated: Vec<SurrealPromptVersion> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract updated version: {}", e)))?;

        Ok(updated.into_iter().next().map(PromptVersion::from))
    }
}

#[async_trait]
impl<C> VersionRepository for SurrealRepository<C>
where
    C: Connection + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    async fn head_number(
        &self,
        prompt_id: &str,
        branch: &str,
    ) -> Result<Option<VersionNumber>, StorageError> {
        let query = r#"
            SELECT version FROM prompt_version
            WHERE prompt_id = $prompt_id AND branch = $branch
            ORDER BY version DESC
            LIMIT 1
        "#;

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .bind(("branch", branch.to_string()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to read head: {}", e)))?;

        let rows: Vec<VersionNumberRow> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract head: {}", e)))?;

        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.version.max(0) as VersionNumber))
    }

    async fn insert_version(&self, version: PromptVersion) -> Result<PromptVersion, StorageError> {
        let expected = self
            .head_number(&version.prompt_id, &version.branch)
            .await?
            .unwrap_or(0)
            + 1;

        if version.version != expected {
            return Err(StorageError::SequenceConflict {
                prompt_id: version.prompt_id.clone(),
                branch: version.branch.clone(),
                expected,
                attempted: version.version,
            });
        }

        let query = r#"
            CREATE prompt_version CONTENT {
                prompt_id: $prompt_id,
                branch: $branch,
                version: $version,
                content: $content,
                frontmatter: $frontmatter,
                created_at: type::datetime($created_at),
                change_reason: $change_reason,
                tags: $tags
            }
        "#;

        let tags: Vec<String> = version.tags.iter().cloned().collect();
        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", version.prompt_id.clone()))
            .bind(("branch", version.branch.clone()))
            .bind(("version", to_db_number(version.version)?))
            .bind(("content", version.content.clone()))
            .bind(("frontmatter", version.frontmatter.clone()))
            .bind(("created_at", version.created_at.to_rfc3339()))
            .bind(("change_reason", version.change_reason.clone()))
            .bind(("tags", tags))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to create version: {}", e)))?;

        // The unique index rejects a number another writer claimed in between
        let created: Vec<SurrealPromptVersion> = match result.take(0) {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                return Err(StorageError::SequenceConflict {
                    prompt_id: version.prompt_id.clone(),
                    branch: version.branch.clone(),
                    expected: version.version + 1,
                    attempted: version.version,
                });
            }
            Err(e) => {
                return Err(StorageError::Query(format!(
                    "Failed to extract created version: {}",
                    e
                )));
            }
        };

        created
            .into_iter()
            .next()
            .map(PromptVersion::from)
            .ok_or_else(|| StorageError::NotFound("Created version not returned".to_string()))
    }

    async fn list_versions(
        &self,
        prompt_id: &str,
        branch: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PromptVersion>, StorageError> {
        let query = format!(
            r#"
            SELECT * FROM prompt_version
            WHERE prompt_id = $prompt_id AND branch = $branch
            ORDER BY version DESC
            {}
        "#,
            limit_clause(limit)
        );

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .bind(("branch", branch.to_string()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to list versions: {}", e)))?;

        let rows: Vec<SurrealPromptVersion> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract versions: {}", e)))?;

        Ok(rows.into_iter().map(PromptVersion::from).collect())
    }

    async fn list_all_versions(
        &self,
        prompt_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PromptVersion>, StorageError> {
        let query = format!(
            r#"
            SELECT * FROM prompt_version
            WHERE prompt_id = $prompt_id
            ORDER BY created_at DESC, version DESC, branch ASC
            {}
        "#,
            limit_clause(limit)
        );

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to list versions: {}", e)))?;

        let rows: Vec<SurrealPromptVersion> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract versions: {}", e)))?;

        Ok(rows.into_iter().map(PromptVersion::from).collect())
    }

    async fn get_version(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
    ) -> Result<Option<PromptVersion>, StorageError> {
        let query = r#"
            SELECT * FROM prompt_version
            WHERE prompt_id = $prompt_id AND branch = $branch AND version = $version
            LIMIT 1
        "#;

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .bind(("branch", branch.to_string()))
            .bind(("version", to_db_number(version)?))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to get version: {}", e)))?;

        let rows: Vec<SurrealPromptVersion> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract version: {}", e)))?;

        Ok(rows.into_iter().next().map(PromptVersion::from))
    }

    async fn add_tag(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        tag: &str,
    ) -> Result<Option<PromptVersion>, StorageError> {
        let query = r#"
            UPDATE prompt_version SET tags = array::union(tags ?? [], [$tag])
            WHERE prompt_id = $prompt_id AND branch = $branch AND version = $version
        "#;
        self.update_tags(query, prompt_id, branch, version, tag).await
    }

    async fn remove_tag(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        tag: &str,
    ) -> Result<Option<PromptVersion>, StorageError> {
        let query = r#"
            UPDATE prompt_version SET tags = array::complement(tags ?? [], [$tag])
            WHERE prompt_id = $prompt_id AND branch = $branch AND version = $version
        "#;
        self.update_tags(query, prompt_id, branch, version, tag).await
    }

    async fn delete_versions(
        &self,
        prompt_id: &str,
        branch: &str,
        versions: &BTreeSet<VersionNumber>,
    ) -> Result<usize, StorageError> {
        if versions.is_empty() {
            return Ok(0);
        }

        let stored = self.list_versions(prompt_id, branch, None).await?;
        let Some(head) = stored.iter().map(|v| v.version).max() else {
            return Ok(0);
        };
        let stored_refs: Vec<&PromptVersion> = stored.iter().collect();
        check_protected(prompt_id, branch, &stored_refs, versions)?;

        // Repeat the guard in the statement so a version pinned or superseded
        // after the read above is still never removed
        let query = r#"
            DELETE prompt_version
            WHERE prompt_id = $prompt_id
                AND branch = $branch
                AND version IN $versions
                AND version < $head
                AND tags CONTAINSNOT $pinned
            RETURN BEFORE
        "#;

        let numbers = versions
            .iter()
            .map(|v| to_db_number(*v))
            .collect::<Result<Vec<i64>, StorageError>>()?;

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .bind(("branch", branch.to_string()))
            .bind(("versions", numbers))
            .bind(("head", to_db_number(head)?))
            .bind(("pinned", PINNED_TAG.to_string()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to delete versions: {}", e)))?;

        let deleted: Vec<SurrealPromptVersion> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract deleted versions: {}", e)))?;

        Ok(deleted.len())
    }

    async fn create_branch(&self, branch: Branch) -> Result<Branch, StorageError> {
        if branch.is_active {
            let mut result = self
                .client
                .query("UPDATE prompt_branch SET is_active = false WHERE prompt_id = $prompt_id")
                .bind(("prompt_id", branch.prompt_id.clone()))
                .await
                .map_err(|e| StorageError::Query(format!("Failed to deactivate branches: {}", e)))?;

            let _: Vec<SurrealBranch> = result.take(0).map_err(|e| {
                StorageError::Query(format!("Failed to deactivate branches: {}", e))
            })?;
        }

        let query = r#"
            CREATE prompt_branch CONTENT {
                prompt_id: $prompt_id,
                name: $name,
                is_active: $is_active,
                forked_from_branch: $forked_from_branch,
                forked_from_version: $forked_from_version,
                created_at: type::datetime($created_at)
            }
        "#;

        let forked_from_version = branch
            .forked_from
            .as_ref()
            .map(|fork| to_db_number(fork.version))
            .transpose()?;

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", branch.prompt_id.clone()))
            .bind(("name", branch.name.clone()))
            .bind(("is_active", branch.is_active))
            .bind((
                "forked_from_branch",
                branch.forked_from.as_ref().map(|fork| fork.branch.clone()),
            ))
            .bind(("forked_from_version", forked_from_version))
            .bind(("created_at", branch.created_at.to_rfc3339()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to create branch: {}", e)))?;

        let created: Vec<SurrealBranch> = match result.take(0) {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                return Err(StorageError::AlreadyExists(format!(
                    "Branch {} already exists for prompt {}",
                    branch.name, branch.prompt_id
                )));
            }
            Err(e) => {
                return Err(StorageError::Query(format!(
                    "Failed to extract created branch: {}",
                    e
                )));
            }
        };

        created
            .into_iter()
            .next()
            .map(Branch::from)
            .ok_or_else(|| StorageError::NotFound("Created branch not returned".to_string()))
    }

    async fn list_branches(&self, prompt_id: &str) -> Result<Vec<Branch>, StorageError> {
        let query = r#"
            SELECT * FROM prompt_branch
            WHERE prompt_id = $prompt_id
            ORDER BY created_at ASC
        "#;

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to list branches: {}", e)))?;

        let rows: Vec<SurrealBranch> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract branches: {}", e)))?;

        Ok(rows.into_iter().map(Branch::from).collect())
    }

    async fn set_active_branch(&self, prompt_id: &str, name: &str) -> Result<(), StorageError> {
        let branches = self.list_branches(prompt_id).await?;
        if !branches.iter().any(|b| b.name == name) {
            return Err(StorageError::NotFound(format!(
                "Branch {} not found for prompt {}",
                name, prompt_id
            )));
        }

        let query = r#"
            UPDATE prompt_branch SET is_active = false WHERE prompt_id = $prompt_id AND name != $name;
            UPDATE prompt_branch SET is_active = true WHERE prompt_id = $prompt_id AND name = $name;
        "#;

        let mut result = self
            .client
            .query(query)
            .bind(("prompt_id", prompt_id.to_string()))
            .bind(("name", name.to_string()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to switch branch: {}", e)))?;

        for statement in 0..2 {
            let _: Vec<SurrealBranch> = result
                .take(statement)
                .map_err(|e| StorageError::Query(format!("Failed to switch branch: {}", e)))?;
        }

        Ok(())
    }

    async fn list_prompt_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut result = self
            .client
            .query("SELECT prompt_id FROM prompt_branch")
            .await
            .map_err(|e| StorageError::Query(format!("Failed to list prompts: {}", e)))?;

        let rows: Vec<PromptIdRow> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract prompts: {}", e)))?;

        let mut seen = HashSet::new();
        let mut ids: Vec<String> = rows
            .into_iter()
            .map(|row| row.prompt_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn load_retention_policy(&self) -> Result<Option<RetentionPolicy>, StorageError> {
        let mut result = self
            .client
            .query("SELECT max_versions, max_age_days FROM $id")
            .bind(("id", retention_record_id()))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to load retention policy: {}", e)))?;

        let rows: Vec<SurrealRetention> = result
            .take(0)
            .map_err(|e| StorageError::Query(format!("Failed to extract retention policy: {}", e)))?;

        Ok(rows.into_iter().next().map(|row| RetentionPolicy {
            max_versions: row.max_versions.map(|n| n.max(0) as usize),
            max_age_days: row.max_age_days.map(|n| n.max(0) as u64),
        }))
    }

    async fn save_retention_policy(&self, policy: &RetentionPolicy) -> Result<(), StorageError> {
        let max_versions = policy
            .max_versions
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        let max_age_days = policy
            .max_age_days
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX));

        let mut result = self
            .client
            .query("UPSERT $id CONTENT { max_versions: $max_versions, max_age_days: $max_age_days }")
            .bind(("id", retention_record_id()))
            .bind(("max_versions", max_versions))
            .bind(("max_age_days", max_age_days))
            .await
            .map_err(|e| StorageError::Query(format!("Failed to save retention policy: {}", e)))?;

        let _: Vec<SurrealRetention> = result.take(0).map_err(|e| {
            StorageError::Query(format!("Failed to save retention policy: {}", e))
        })?;

        Ok(())
    }
}
