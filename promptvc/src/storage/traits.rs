//! Repository contract the versioning core requires from a durable store

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::models::{Branch, PromptVersion, RetentionPolicy, VersionNumber};
use crate::storage::errors::StorageError;

/// Durable, ordered storage of prompt versions keyed by
/// `(prompt_id, branch, version)`.
///
/// Implementations must uphold two guards on their own, independent of the
/// callers above them:
///
/// - [`insert_version`](Self::insert_version) accepts a record only when its
///   number is exactly `max + 1` for its sequence, and rejects anything else
///   with [`StorageError::SequenceConflict`]. Two racing inserts of the same
///   number must never both succeed.
/// - [`delete_versions`](Self::delete_versions) refuses the whole batch with
///   [`StorageError::ProtectedVersion`] if any requested number is the branch
///   HEAD or carries the `pinned` tag.
#[async_trait]
pub trait VersionRepository: Send + Sync + Debug + 'static {
    /// Highest version number recorded on the branch, if any
    async fn head_number(
        &self,
        prompt_id: &str,
        branch: &str,
    ) -> Result<Option<VersionNumber>, StorageError>;

    /// Insert a fully numbered version
    async fn insert_version(&self, version: PromptVersion) -> Result<PromptVersion, StorageError>;

    /// Versions of one branch, highest number first
    async fn list_versions(
        &self,
        prompt_id: &str,
        branch: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PromptVersion>, StorageError>;

    /// Versions of every branch of a prompt, newest `created_at` first with
    /// ties broken by version number
    async fn list_all_versions(
        &self,
        prompt_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PromptVersion>, StorageError>;

    /// Get a single version
    async fn get_version(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
    ) -> Result<Option<PromptVersion>, StorageError>;

    /// Add a tag, returning the updated version (`None` if it does not exist)
    async fn add_tag(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        tag: &str,
    ) -> Result<Option<PromptVersion>, StorageError>;

    /// Remove a tag, returning the updated version (`None` if it does not exist)
    async fn remove_tag(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        tag: &str,
    ) -> Result<Option<PromptVersion>, StorageError>;

    /// Delete a batch of versions from one branch, returning how many were removed.
    ///
    /// The batch is all-or-nothing with respect to the protection guard.
    async fn delete_versions(
        &self,
        prompt_id: &str,
        branch: &str,
        versions: &BTreeSet<VersionNumber>,
    ) -> Result<usize, StorageError>;

    /// Register a branch; fails with `AlreadyExists` if the name is taken
    async fn create_branch(&self, branch: Branch) -> Result<Branch, StorageError>;

    /// All branches registered for a prompt
    async fn list_branches(&self, prompt_id: &str) -> Result<Vec<Branch>, StorageError>;

    /// Mark one branch active and every other branch of the prompt inactive
    async fn set_active_branch(&self, prompt_id: &str, name: &str) -> Result<(), StorageError>;

    /// Ids of every prompt with at least one registered branch
    async fn list_prompt_ids(&self) -> Result<Vec<String>, StorageError>;

    /// Persisted retention policy, if one was saved
    async fn load_retention_policy(&self) -> Result<Option<RetentionPolicy>, StorageError>;

    /// Persist the retention policy
    async fn save_retention_policy(&self, policy: &RetentionPolicy) -> Result<(), StorageError>;
}

/// Check a delete batch against the protection rules shared by every backend.
///
/// `stored` is the full branch as currently stored.
pub fn check_protected(
    prompt_id: &str,
    branch: &str,
    stored: &[&PromptVersion],
    requested: &BTreeSet<VersionNumber>,
) -> Result<(), StorageError> {
    let head = stored.iter().map(|v| v.version).max();

    for version in stored.iter().filter(|v| requested.contains(&v.version)) {
        if Some(version.version) == head {
            return Err(StorageError::ProtectedVersion {
                prompt_id: prompt_id.to_string(),
                branch: branch.to_string(),
                version: version.version,
                reason: "version is the branch HEAD".to_string(),
            });
        }
        if version.is_pinned() {
            return Err(StorageError::ProtectedVersion {
                prompt_id: prompt_id.to_string(),
                branch: branch.to_string(),
                version: version.version,
                reason: "version is pinned".to_string(),
            });
        }
    }

    Ok(())
}
