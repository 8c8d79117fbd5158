//! The versioning façade used by prompt writers, CLIs and UIs
//!
//! Every operation takes an explicit branch (through its options) and falls
//! back to the configured default branch only here, at the API boundary.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::retention::{CleanupOptions, CleanupSummary, RetentionManager};
use super::rollback::RollbackCoordinator;
use super::sequence::{SequenceLocks, append_next};
use crate::config::VersioningConfig;
use crate::diff::{DiffResult, VersionRef};
use crate::logging::LoggingGuard;
use crate::models::{Branch, PromptVersion, RetentionPolicy, VersionDraft, VersionNumber};
use crate::storage::{StorageError, VersionRepository};
use crate::{Result, VersionError};

/// Longest accepted tag label
pub const MAX_TAG_LENGTH: usize = 64;

/// Branch selection shared by most operations
#[derive(Debug, Clone, Default)]
pub struct BranchOptions {
    pub branch: Option<String>,
}

impl BranchOptions {
    pub fn on(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
        }
    }
}

/// Options for [`VersionService::save_version`]
pub type SaveOptions = BranchOptions;

/// Options for [`VersionService::list_versions`]
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub branch: Option<String>,
    /// Merge every branch, newest first by creation time
    pub all_branches: bool,
}

/// Options for [`VersionService::diff`]
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub branch: Option<String>,
    /// Overrides the configured number of context lines
    pub context_lines: Option<usize>,
    /// Fail with `InvalidVersionRange` instead of returning an empty diff
    /// when both version numbers are equal
    pub reject_same_version: bool,
}

/// Options for [`VersionService::rollback`]
#[derive(Debug, Clone, Default)]
pub struct RollbackOptions {
    pub branch: Option<String>,
    pub create_backup: bool,
}

impl RollbackOptions {
    pub fn with_backup(mut self) -> Self {
        self.create_backup = true;
        self
    }

    pub fn on(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// Options for [`VersionService::create_branch`]
#[derive(Debug, Clone, Default)]
pub struct CreateBranchOptions {
    /// Fork from this `(branch, version)`; the new branch's v1 copies it
    pub from: Option<(String, VersionNumber)>,
    /// Make the new branch the prompt's active branch
    pub activate: bool,
}

/// Aggregate counters over one prompt or the whole repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersioningStats {
    pub total_versions: usize,
    pub pinned_versions: usize,
    pub branch_count: usize,
    pub prompt_count: usize,
    /// Sum of content lengths in bytes
    pub content_bytes: usize,
    pub average_versions_per_prompt: f64,
}

/// Version history operations over a [`VersionRepository`]
#[derive(Debug)]
pub struct VersionService<R: VersionRepository + ?Sized = dyn VersionRepository> {
    repository: Arc<R>,
    locks: SequenceLocks,
    rollback: RollbackCoordinator<R>,
    retention: RetentionManager<R>,
    config: VersioningConfig,
    _logging: Option<LoggingGuard>,
}

impl<R: VersionRepository + ?Sized> VersionService<R> {
    pub fn new(repository: Arc<R>, config: VersioningConfig) -> Self {
        let locks = SequenceLocks::new();
        Self {
            rollback: RollbackCoordinator::new(repository.clone(), locks.clone()),
            retention: RetentionManager::new(repository.clone(), locks.clone()),
            repository,
            locks,
            config,
            _logging: None,
        }
    }

    /// Keep a file logger alive for as long as the service
    pub fn with_logging_guard(mut self, guard: LoggingGuard) -> Self {
        self._logging = Some(guard);
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    fn branch_or_default<'a>(&'a self, branch: Option<&'a str>) -> &'a str {
        branch.unwrap_or(&self.config.default_branch)
    }

    /// Append a new version of a prompt.
    ///
    /// The first save to a branch registers it; the first branch of a prompt
    /// becomes its active branch.
    pub async fn save_version(
        &self,
        prompt_id: &str,
        content: &str,
        frontmatter: serde_json::Value,
        change_reason: Option<&str>,
        options: SaveOptions,
    ) -> Result<PromptVersion> {
        let branch = self.branch_or_default(options.branch.as_deref()).to_string();
        if prompt_id.trim().is_empty() {
            return Err(VersionError::PromptNotFound(prompt_id.to_string()));
        }
        validate_branch_name(prompt_id, &branch)?;

        let guard = self.locks.acquire(prompt_id, &branch).await;
        self.ensure_branch(prompt_id, &branch).await?;

        let mut draft = VersionDraft::new(prompt_id, content)
            .branch(branch)
            .frontmatter(frontmatter);
        if let Some(reason) = change_reason {
            draft = draft.change_reason(reason);
        }

        append_next(self.repository.as_ref(), &guard, draft).await
    }

    async fn ensure_branch(&self, prompt_id: &str, branch: &str) -> Result<()> {
        let branches = self.repository.list_branches(prompt_id).await?;
        if branches.iter().any(|b| b.name == branch) {
            return Ok(());
        }

        let record = Branch::new(prompt_id, branch).active(branches.is_empty());
        match self.repository.create_branch(record).await {
            Ok(_) | Err(StorageError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Versions of a prompt, newest first
    pub async fn list_versions(
        &self,
        prompt_id: &str,
        options: ListOptions,
    ) -> Result<Vec<PromptVersion>> {
        let branches = self.require_prompt(prompt_id).await?;

        if options.all_branches {
            return Ok(self
                .repository
                .list_all_versions(prompt_id, options.limit)
                .await?);
        }

        let branch = self.branch_or_default(options.branch.as_deref());
        require_branch(prompt_id, branch, &branches)?;

        Ok(self
            .repository
            .list_versions(prompt_id, branch, options.limit)
            .await?)
    }

    /// A single version by number
    pub async fn get_version(
        &self,
        prompt_id: &str,
        version: VersionNumber,
        options: BranchOptions,
    ) -> Result<PromptVersion> {
        require_version_number(version)?;

        let branches = self.require_prompt(prompt_id).await?;
        let branch = self.branch_or_default(options.branch.as_deref());
        require_branch(prompt_id, branch, &branches)?;

        self.fetch(prompt_id, branch, version).await
    }

    async fn fetch(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
    ) -> Result<PromptVersion> {
        self.repository
            .get_version(prompt_id, branch, version)
            .await?
            .ok_or_else(|| VersionError::VersionNotFound {
                prompt_id: prompt_id.to_string(),
                branch: branch.to_string(),
                version,
            })
    }

    /// Highest-numbered version on a branch
    pub async fn head(&self, prompt_id: &str, options: BranchOptions) -> Result<PromptVersion> {
        let branches = self.require_prompt(prompt_id).await?;
        let branch = self.branch_or_default(options.branch.as_deref());
        require_branch(prompt_id, branch, &branches)?;

        let Some(head) = self.repository.head_number(prompt_id, branch).await? else {
            return Err(VersionError::VersionNotFound {
                prompt_id: prompt_id.to_string(),
                branch: branch.to_string(),
                version: 1,
            });
        };
        self.fetch(prompt_id, branch, head).await
    }

    /// HEAD of the prompt's active branch
    pub async fn current(&self, prompt_id: &str) -> Result<PromptVersion> {
        let branches = self.require_prompt(prompt_id).await?;
        let active = branches
            .iter()
            .find(|b| b.is_active)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| self.config.default_branch.clone());

        self.head(prompt_id, BranchOptions::on(active)).await
    }

    /// Diff two versions of a branch.
    ///
    /// The hunks always transform `from_version` into `to_version` as given,
    /// so `(5, 3)` is the reverse of `(3, 5)`.
    pub async fn diff(
        &self,
        prompt_id: &str,
        from_version: VersionNumber,
        to_version: VersionNumber,
        options: DiffOptions,
    ) -> Result<DiffResult> {
        if from_version == 0 || to_version == 0 {
            return Err(VersionError::InvalidVersionRange(format!(
                "version numbers start at 1 (got {} and {})",
                from_version, to_version
            )));
        }
        if options.reject_same_version && from_version == to_version {
            return Err(VersionError::InvalidVersionRange(format!(
                "cannot diff version {} against itself",
                from_version
            )));
        }

        let branches = self.require_prompt(prompt_id).await?;
        let branch = self.branch_or_default(options.branch.as_deref());
        require_branch(prompt_id, branch, &branches)?;

        let from = self.fetch(prompt_id, branch, from_version).await?;
        let to = self.fetch(prompt_id, branch, to_version).await?;
        let context = options
            .context_lines
            .unwrap_or(self.config.diff_context_lines);

        let result = DiffResult::between(
            VersionRef {
                version: from.version,
                content: from.content,
            },
            VersionRef {
                version: to.version,
                content: to.content,
            },
            context,
        );

        tracing::debug!(
            prompt_id = %prompt_id,
            branch = %branch,
            from = from_version,
            to = to_version,
            hunks = result.hunks.len(),
            added = result.stats.added,
            removed = result.stats.removed,
            "Computed version diff"
        );

        Ok(result)
    }

    /// Restore `target_version` by appending its content as a new version
    pub async fn rollback(
        &self,
        prompt_id: &str,
        target_version: VersionNumber,
        options: RollbackOptions,
    ) -> Result<PromptVersion> {
        require_version_number(target_version)?;

        let branches = self.require_prompt(prompt_id).await?;
        let branch = self.branch_or_default(options.branch.as_deref());
        require_branch(prompt_id, branch, &branches)?;

        self.rollback
            .rollback(prompt_id, branch, target_version, options.create_backup)
            .await
    }

    /// Add a label to a version. Only the tag set changes.
    pub async fn tag(
        &self,
        prompt_id: &str,
        version: VersionNumber,
        label: &str,
        options: BranchOptions,
    ) -> Result<PromptVersion> {
        require_version_number(version)?;
        let label = validate_tag(label)?;
        let branch = self.resolve_tag_target(prompt_id, &options).await?;

        // Tags decide what cleanup may delete, so they change under the same
        // lock a cleanup batch holds.
        let _guard = self.locks.acquire(prompt_id, branch).await;
        self.repository
            .add_tag(prompt_id, branch, version, label)
            .await?
            .ok_or_else(|| VersionError::VersionNotFound {
                prompt_id: prompt_id.to_string(),
                branch: branch.to_string(),
                version,
            })
    }

    /// Remove a label from a version; removing an absent label is a no-op
    pub async fn untag(
        &self,
        prompt_id: &str,
        version: VersionNumber,
        label: &str,
        options: BranchOptions,
    ) -> Result<PromptVersion> {
        require_version_number(version)?;
        let label = validate_tag(label)?;
        let branch = self.resolve_tag_target(prompt_id, &options).await?;

        let _guard = self.locks.acquire(prompt_id, branch).await;
        self.repository
            .remove_tag(prompt_id, branch, version, label)
            .await?
            .ok_or_else(|| VersionError::VersionNotFound {
                prompt_id: prompt_id.to_string(),
                branch: branch.to_string(),
                version,
            })
    }

    async fn resolve_tag_target<'a>(
        &'a self,
        prompt_id: &str,
        options: &'a BranchOptions,
    ) -> Result<&'a str> {
        let branches = self.require_prompt(prompt_id).await?;
        let branch = self.branch_or_default(options.branch.as_deref());
        require_branch(prompt_id, branch, &branches)?;
        Ok(branch)
    }

    /// Apply a retention policy to every prompt and branch
    pub async fn cleanup(
        &self,
        policy: &RetentionPolicy,
        options: CleanupOptions,
    ) -> Result<CleanupSummary> {
        self.retention.cleanup(policy, &options).await
    }

    /// Apply the stored (or configured) retention policy
    pub async fn cleanup_with_saved_policy(&self, options: CleanupOptions) -> Result<CleanupSummary> {
        let policy = self.retention_config().await?;
        self.cleanup(&policy, options).await
    }

    /// The persisted retention policy, or the configured default
    pub async fn retention_config(&self) -> Result<RetentionPolicy> {
        Ok(self
            .repository
            .load_retention_policy()
            .await?
            .unwrap_or_else(|| self.config.retention.clone()))
    }

    /// Persist a retention policy
    pub async fn set_retention_config(&self, policy: RetentionPolicy) -> Result<()> {
        policy
            .validate()
            .map_err(VersionError::InvalidRetentionPolicy)?;
        self.repository.save_retention_policy(&policy).await?;
        tracing::info!(
            max_versions = ?policy.max_versions,
            max_age_days = ?policy.max_age_days,
            "Updated retention policy"
        );
        Ok(())
    }

    /// Register a new branch, optionally forked from an existing version
    pub async fn create_branch(
        &self,
        prompt_id: &str,
        name: &str,
        options: CreateBranchOptions,
    ) -> Result<Branch> {
        validate_branch_name(prompt_id, name)?;
        let branches = self.require_prompt(prompt_id).await?;

        if branches.iter().any(|b| b.name == name) {
            return Err(VersionError::BranchAlreadyExists {
                prompt_id: prompt_id.to_string(),
                branch: name.to_string(),
            });
        }

        let mut record = Branch::new(prompt_id, name);
        let source = match &options.from {
            Some((from_branch, from_version)) => {
                require_branch(prompt_id, from_branch, &branches)?;
                let source = self.fetch(prompt_id, from_branch, *from_version).await?;
                record = record.forked_from(from_branch.clone(), *from_version);
                Some(source)
            }
            None => None,
        };

        let guard = self.locks.acquire(prompt_id, name).await;
        let created = self
            .repository
            .create_branch(record)
            .await
            .map_err(|e| match e {
                StorageError::AlreadyExists(_) => VersionError::BranchAlreadyExists {
                    prompt_id: prompt_id.to_string(),
                    branch: name.to_string(),
                },
                other => other.into(),
            })?;

        if let Some(source) = source {
            let draft = VersionDraft::new(prompt_id, source.content)
                .branch(name)
                .frontmatter(source.frontmatter)
                .change_reason(format!(
                    "Forked from {} v{}",
                    source.branch, source.version
                ));
            append_next(self.repository.as_ref(), &guard, draft).await?;
        }
        drop(guard);

        if options.activate {
            self.repository.set_active_branch(prompt_id, name).await?;
        }

        tracing::info!(
            prompt_id = %prompt_id,
            branch = %name,
            forked_from = ?options.from,
            "Created branch"
        );

        Ok(Branch {
            is_active: options.activate,
            ..created
        })
    }

    /// Branches of a prompt
    pub async fn list_branches(&self, prompt_id: &str) -> Result<Vec<Branch>> {
        self.require_prompt(prompt_id).await
    }

    /// Make `name` the prompt's only active branch
    pub async fn switch_branch(&self, prompt_id: &str, name: &str) -> Result<()> {
        let branches = self.require_prompt(prompt_id).await?;
        require_branch(prompt_id, name, &branches)?;
        self.repository.set_active_branch(prompt_id, name).await?;
        tracing::info!(prompt_id = %prompt_id, branch = %name, "Switched active branch");
        Ok(())
    }

    /// Counters for one prompt, or for every prompt when `prompt_id` is `None`
    pub async fn stats(&self, prompt_id: Option<&str>) -> Result<VersioningStats> {
        let prompt_ids = match prompt_id {
            Some(id) => {
                self.require_prompt(id).await?;
                vec![id.to_string()]
            }
            None => self.repository.list_prompt_ids().await?,
        };

        let mut stats = VersioningStats {
            prompt_count: prompt_ids.len(),
            ..VersioningStats::default()
        };

        for id in &prompt_ids {
            stats.branch_count += self.repository.list_branches(id).await?.len();
            for version in self.repository.list_all_versions(id, None).await? {
                stats.total_versions += 1;
                stats.content_bytes += version.content.len();
                if version.is_pinned() {
                    stats.pinned_versions += 1;
                }
            }
        }

        if stats.prompt_count > 0 {
            stats.average_versions_per_prompt =
                stats.total_versions as f64 / stats.prompt_count as f64;
        }

        Ok(stats)
    }

    async fn require_prompt(&self, prompt_id: &str) -> Result<Vec<Branch>> {
        let branches = self.repository.list_branches(prompt_id).await?;
        if branches.is_empty() {
            return Err(VersionError::PromptNotFound(prompt_id.to_string()));
        }
        Ok(branches)
    }
}

fn require_branch(prompt_id: &str, branch: &str, branches: &[Branch]) -> Result<()> {
    if branches.iter().any(|b| b.name == branch) {
        Ok(())
    } else {
        Err(VersionError::BranchNotFound {
            prompt_id: prompt_id.to_string(),
            branch: branch.to_string(),
        })
    }
}

fn require_version_number(version: VersionNumber) -> Result<()> {
    if version == 0 {
        return Err(VersionError::InvalidVersionRange(
            "version numbers start at 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_branch_name(prompt_id: &str, branch: &str) -> Result<()> {
    if branch.trim().is_empty() {
        return Err(VersionError::BranchNotFound {
            prompt_id: prompt_id.to_string(),
            branch: branch.to_string(),
        });
    }
    Ok(())
}

fn validate_tag(label: &str) -> Result<&str> {
    let label = label.trim();
    if label.is_empty() {
        return Err(VersionError::InvalidTag("tag cannot be empty".to_string()));
    }
    if label.len() > MAX_TAG_LENGTH {
        return Err(VersionError::InvalidTag(format!(
            "tag longer than {} bytes",
            MAX_TAG_LENGTH
        )));
    }
    if label.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(VersionError::InvalidTag(format!(
            "tag '{}' contains whitespace",
            label
        )));
    }
    Ok(label)
}
