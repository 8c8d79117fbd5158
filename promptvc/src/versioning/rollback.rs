//! Restoring earlier content by appending it again

use std::sync::Arc;

use super::sequence::{SequenceLocks, append_next};
use crate::models::{PromptVersion, VersionDraft, VersionNumber};
use crate::storage::VersionRepository;
use crate::{Result, VersionError};

/// Change reason recorded on the backup taken before a rollback
pub fn backup_reason(target: VersionNumber) -> String {
    format!("backup before rollback to v{}", target)
}

/// Change reason recorded on the restoring version
pub fn restore_reason(target: VersionNumber) -> String {
    format!("Restored to version {}", target)
}

/// Performs rollbacks; never modifies or removes an existing version.
#[derive(Debug)]
pub struct RollbackCoordinator<R: VersionRepository + ?Sized> {
    repository: Arc<R>,
    locks: SequenceLocks,
}

impl<R: VersionRepository + ?Sized> Clone for RollbackCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<R: VersionRepository + ?Sized> RollbackCoordinator<R> {
    pub fn new(repository: Arc<R>, locks: SequenceLocks) -> Self {
        Self { repository, locks }
    }

    /// Append `target`'s content as the new HEAD of the branch.
    ///
    /// With `create_backup`, the current HEAD's content is appended first so
    /// the pre-rollback state has its own version number. Both appends happen
    /// under one hold of the sequence lock.
    pub async fn rollback(
        &self,
        prompt_id: &str,
        branch: &str,
        target: VersionNumber,
        create_backup: bool,
    ) -> Result<PromptVersion> {
        let guard = self.locks.acquire(prompt_id, branch).await;

        let source = self
            .repository
            .get_version(prompt_id, branch, target)
            .await?
            .ok_or_else(|| VersionError::VersionNotFound {
                prompt_id: prompt_id.to_string(),
                branch: branch.to_string(),
                version: target,
            })?;

        if create_backup {
            let head = self.current_head(prompt_id, branch).await?;
            let backup = VersionDraft::new(prompt_id, head.content)
                .branch(branch)
                .frontmatter(head.frontmatter)
                .change_reason(backup_reason(target));
            let backup = append_next(self.repository.as_ref(), &guard, backup).await?;
            tracing::debug!(
                prompt_id = %prompt_id,
                branch = %branch,
                backup = backup.version,
                "Backed up HEAD before rollback"
            );
        }

        let restore = VersionDraft::new(prompt_id, source.content)
            .branch(branch)
            .frontmatter(source.frontmatter)
            .change_reason(restore_reason(target));
        let restored = append_next(self.repository.as_ref(), &guard, restore).await?;

        tracing::info!(
            prompt_id = %prompt_id,
            branch = %branch,
            target,
            new_version = restored.version,
            backup = create_backup,
            "Rolled back prompt"
        );

        Ok(restored)
    }

    async fn current_head(&self, prompt_id: &str, branch: &str) -> Result<PromptVersion> {
        let not_found = |version| VersionError::VersionNotFound {
            prompt_id: prompt_id.to_string(),
            branch: branch.to_string(),
            version,
        };

        let head = self
            .repository
            .head_number(prompt_id, branch)
            .await?
            .ok_or_else(|| not_found(0))?;

        self.repository
            .get_version(prompt_id, branch, head)
            .await?
            .ok_or_else(|| not_found(head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRepository;

    async fn seeded(contents: &[&str]) -> (Arc<InMemoryRepository>, SequenceLocks) {
        let repository = Arc::new(InMemoryRepository::new());
        let locks = SequenceLocks::new();
        for content in contents {
            let guard = locks.acquire("p1", "main").await;
            append_next(repository.as_ref(), &guard, VersionDraft::new("p1", *content))
                .await
                .unwrap();
        }
        (repository, locks)
    }

    #[tokio::test]
    async fn test_rollback_without_backup_appends_one_version() {
        let (repository, locks) = seeded(&["A", "B", "C"]).await;
        let coordinator = RollbackCoordinator::new(repository.clone(), locks);

        let restored = coordinator.rollback("p1", "main", 1, false).await.unwrap();

        assert_eq!(restored.version, 4);
        assert_eq!(restored.content, "A");
        assert_eq!(restored.change_reason.as_deref(), Some("Restored to version 1"));

        let target = repository.get_version("p1", "main", 1).await.unwrap().unwrap();
        assert_eq!(target.content, "A");
        assert_eq!(target.change_reason, None);
    }

    #[tokio::test]
    async fn test_rollback_with_backup_appends_two_versions() {
        let (repository, locks) = seeded(&["A", "B", "C"]).await;
        let coordinator = RollbackCoordinator::new(repository.clone(), locks);

        let restored = coordinator.rollback("p1", "main", 2, true).await.unwrap();
        assert_eq!(restored.version, 5);
        assert_eq!(restored.content, "B");

        let backup = repository.get_version("p1", "main", 4).await.unwrap().unwrap();
        assert_eq!(backup.content, "C");
        assert_eq!(
            backup.change_reason.as_deref(),
            Some("backup before rollback to v2")
        );
    }

    #[tokio::test]
    async fn test_rollback_to_missing_version_changes_nothing() {
        let (repository, locks) = seeded(&["A"]).await;
        let coordinator = RollbackCoordinator::new(repository.clone(), locks);

        let err = coordinator.rollback("p1", "main", 7, true).await.unwrap_err();
        assert!(matches!(err, VersionError::VersionNotFound { version: 7, .. }));
        assert_eq!(repository.head_number("p1", "main").await.unwrap(), Some(1));
    }
}
