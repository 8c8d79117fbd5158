//! Retention cleanup
//!
//! Cleanup walks every `(prompt, branch)` sequence independently. HEAD and
//! `pinned` versions are never deleted. `max_versions` keeps a window of the
//! newest unpinned versions (HEAD counts toward it), `max_age_days` selects
//! unpinned versions older than the cutoff, and the two selections are
//! unioned.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::sequence::SequenceLocks;
use crate::models::{PromptVersion, RetentionPolicy, VersionNumber};
use crate::storage::{StorageError, VersionRepository, check_protected};
use crate::{Result, VersionError};

/// Times a branch batch is decided again after the store refused it because
/// the branch changed underneath
const CHANGED_BRANCH_RETRIES: usize = 1;

/// Cooperative cancellation for a cleanup sweep.
///
/// Checked between `(prompt, branch)` batches; a batch that has started
/// always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for [`RetentionManager::cleanup`]
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    /// Compute the decision set without deleting anything
    pub preview_only: bool,
    pub cancel: Option<CancelFlag>,
}

impl CleanupOptions {
    pub fn preview() -> Self {
        Self {
            preview_only: true,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Versions selected for deletion on one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupDecision {
    pub prompt_id: String,
    pub branch: String,
    /// Number of versions on the branch when the decision was made
    pub examined: usize,
    pub versions: BTreeSet<VersionNumber>,
}

/// A branch whose batch failed; the rest of the sweep carried on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupFailure {
    pub prompt_id: String,
    /// `None` when the prompt's branches could not be listed at all
    pub branch: Option<String>,
    pub error: String,
}

/// Outcome of a cleanup sweep.
///
/// In preview mode `deleted` and `per_prompt` count what *would* be deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSummary {
    pub deleted: usize,
    pub preserved: usize,
    pub per_prompt: BTreeMap<String, usize>,
    pub decisions: Vec<CleanupDecision>,
    pub failures: Vec<CleanupFailure>,
    pub preview: bool,
    pub cancelled: bool,
}

/// Select the versions of one branch that `policy` deletes.
///
/// `versions` must all belong to the same `(prompt, branch)`; order does not
/// matter. HEAD and pinned versions are never returned.
pub fn select_for_deletion(
    versions: &[PromptVersion],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> BTreeSet<VersionNumber> {
    let Some(head) = versions.iter().map(|v| v.version).max() else {
        return BTreeSet::new();
    };

    let mut unpinned: Vec<&PromptVersion> = versions
        .iter()
        .filter(|v| !(policy.keeps_pinned() && v.is_pinned()))
        .collect();
    unpinned.sort_by(|a, b| b.version.cmp(&a.version));

    let mut selected = BTreeSet::new();

    // HEAD occupies the first slot of the window whenever it is unpinned.
    if let Some(max_versions) = policy.max_versions {
        selected.extend(unpinned.iter().skip(max_versions).map(|v| v.version));
    }

    if let Some(max_age_days) = policy.max_age_days {
        let cutoff = i64::try_from(max_age_days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|age| now.checked_sub_signed(age));

        // A cutoff before the representable range cannot match anything.
        if let Some(cutoff) = cutoff {
            selected.extend(
                unpinned
                    .iter()
                    .filter(|v| v.created_at < cutoff)
                    .map(|v| v.version),
            );
        }
    }

    selected.remove(&head);
    selected
}

/// Applies a retention policy across every stored prompt
#[derive(Debug)]
pub struct RetentionManager<R: VersionRepository + ?Sized> {
    repository: Arc<R>,
    locks: SequenceLocks,
}

impl<R: VersionRepository + ?Sized> Clone for RetentionManager<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<R: VersionRepository + ?Sized> RetentionManager<R> {
    pub fn new(repository: Arc<R>, locks: SequenceLocks) -> Self {
        Self { repository, locks }
    }

    /// Run one sweep.
    ///
    /// A storage failure on one branch is recorded in the summary and the
    /// sweep continues, as is a batch the store keeps refusing because a
    /// concurrent writer pinned a version or moved HEAD. A selection that
    /// itself names HEAD or a pinned version aborts the sweep.
    pub async fn cleanup(
        &self,
        policy: &RetentionPolicy,
        options: &CleanupOptions,
    ) -> Result<CleanupSummary> {
        policy
            .validate()
            .map_err(VersionError::InvalidRetentionPolicy)?;

        let mut summary = CleanupSummary {
            preview: options.preview_only,
            ..CleanupSummary::default()
        };

        let prompt_ids = self.repository.list_prompt_ids().await?;

        'prompts: for prompt_id in prompt_ids {
            let branches = match self.repository.list_branches(&prompt_id).await {
                Ok(branches) => branches,
                Err(e) => {
                    tracing::warn!(prompt_id = %prompt_id, error = %e, "Skipping prompt during cleanup");
                    summary.failures.push(CleanupFailure {
                        prompt_id,
                        branch: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for branch in branches {
                if options.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                    summary.cancelled = true;
                    break 'prompts;
                }

                match self
                    .sweep_branch(&prompt_id, &branch.name, policy, options.preview_only)
                    .await
                {
                    Ok((decision, deleted)) => {
                        summary.deleted += deleted;
                        summary.preserved += decision.examined - deleted;
                        *summary.per_prompt.entry(prompt_id.clone()).or_default() += deleted;
                        if !decision.versions.is_empty() {
                            summary.decisions.push(decision);
                        }
                    }
                    Err(e @ VersionError::ProtectedVersionDeletion { .. }) => {
                        tracing::error!(
                            prompt_id = %prompt_id,
                            branch = %branch.name,
                            error = %e,
                            "Cleanup attempted to delete a protected version; aborting sweep"
                        );
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::warn!(
                            prompt_id = %prompt_id,
                            branch = %branch.name,
                            error = %e,
                            "Cleanup batch failed"
                        );
                        summary.per_prompt.entry(prompt_id.clone()).or_default();
                        summary.failures.push(CleanupFailure {
                            prompt_id: prompt_id.clone(),
                            branch: Some(branch.name.clone()),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            deleted = summary.deleted,
            preserved = summary.preserved,
            failures = summary.failures.len(),
            preview = summary.preview,
            cancelled = summary.cancelled,
            "Retention cleanup finished"
        );

        Ok(summary)
    }

    /// Decide, and unless previewing delete, for one branch.
    ///
    /// Returns the decision and how many versions were removed (or would be).
    async fn sweep_branch(
        &self,
        prompt_id: &str,
        branch: &str,
        policy: &RetentionPolicy,
        preview_only: bool,
    ) -> Result<(CleanupDecision, usize)> {
        if preview_only {
            let decision = self.decide(prompt_id, branch, policy).await?.0;
            let count = decision.versions.len();
            return Ok((decision, count));
        }

        // Hold the sequence so no append or tag lands between decision and delete.
        let _guard = self.locks.acquire(prompt_id, branch).await;

        let mut attempt = 0;
        loop {
            let (decision, versions) = self.decide(prompt_id, branch, policy).await?;

            if decision.versions.is_empty() {
                return Ok((decision, 0));
            }

            // Our own selection naming HEAD or a pinned version is a bug: fatal.
            let stored: Vec<&PromptVersion> = versions.iter().collect();
            check_protected(prompt_id, branch, &stored, &decision.versions)?;

            match self
                .repository
                .delete_versions(prompt_id, branch, &decision.versions)
                .await
            {
                Ok(deleted) => {
                    tracing::debug!(
                        prompt_id = %prompt_id,
                        branch = %branch,
                        versions = ?decision.versions,
                        deleted,
                        "Deleted versions by retention policy"
                    );
                    return Ok((decision, deleted));
                }
                // The store saw a pin or a new HEAD the fresh read did not, so
                // another writer changed the branch. Decide again once, then
                // report the batch as failed without aborting the sweep.
                Err(e @ StorageError::ProtectedVersion { .. }) => {
                    if attempt < CHANGED_BRANCH_RETRIES {
                        attempt += 1;
                        tracing::warn!(
                            prompt_id = %prompt_id,
                            branch = %branch,
                            error = %e,
                            "Branch changed during cleanup, deciding again"
                        );
                        continue;
                    }
                    return Err(VersionError::StorageFailure(e));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn decide(
        &self,
        prompt_id: &str,
        branch: &str,
        policy: &RetentionPolicy,
    ) -> Result<(CleanupDecision, Vec<PromptVersion>)> {
        let versions = self
            .repository
            .list_versions(prompt_id, branch, None)
            .await?;
        let selected = select_for_deletion(&versions, policy, Utc::now());

        let decision = CleanupDecision {
            prompt_id: prompt_id.to_string(),
            branch: branch.to_string(),
            examined: versions.len(),
            versions: selected,
        };
        Ok((decision, versions))
    }
}
