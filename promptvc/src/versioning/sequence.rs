//! Serialization of appends per `(prompt, branch)` sequence

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{PromptVersion, VersionDraft};
use crate::storage::{StorageError, VersionRepository};
use crate::{Result, VersionError};

/// Number of times an append is retried after losing a numbering race
pub const APPEND_RETRIES: usize = 1;

/// Idle locks are dropped once the table grows past this many entries
const PRUNE_THRESHOLD: usize = 1024;

type SequenceKey = (String, String);

/// Per-sequence async mutexes shared by every writer of a service.
///
/// Cloning is cheap and clones share the same lock table.
#[derive(Debug, Clone, Default)]
pub struct SequenceLocks {
    table: Arc<Mutex<HashMap<SequenceKey, Arc<Mutex<()>>>>>,
}

/// Proof that the holder is the only writer of one sequence.
///
/// The sequence is released when the guard is dropped.
#[derive(Debug)]
pub struct SequenceGuard {
    prompt_id: String,
    branch: String,
    _lock: OwnedMutexGuard<()>,
}

impl SequenceGuard {
    pub fn prompt_id(&self) -> &str {
        &self.prompt_id
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Whether this guard serializes the given sequence
    pub fn covers(&self, prompt_id: &str, branch: &str) -> bool {
        self.prompt_id == prompt_id && self.branch == branch
    }
}

impl SequenceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other writer holds the sequence, then take it
    pub async fn acquire(&self, prompt_id: &str, branch: &str) -> SequenceGuard {
        let lock = {
            let mut table = self.table.lock().await;
            if table.len() > PRUNE_THRESHOLD {
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            table
                .entry((prompt_id.to_string(), branch.to_string()))
                .or_default()
                .clone()
        };

        SequenceGuard {
            prompt_id: prompt_id.to_string(),
            branch: branch.to_string(),
            _lock: lock.lock_owned().await,
        }
    }
}

/// Append `draft` as the next version of its sequence.
///
/// The caller must hold the sequence's guard. The next number is read fresh
/// for every attempt; a [`StorageError::SequenceConflict`] is retried
/// [`APPEND_RETRIES`] time(s) before surfacing as
/// [`VersionError::ConcurrentAppendConflict`].
pub async fn append_next<R>(
    repository: &R,
    guard: &SequenceGuard,
    draft: VersionDraft,
) -> Result<PromptVersion>
where
    R: VersionRepository + ?Sized,
{
    debug_assert!(guard.covers(&draft.prompt_id, &draft.branch));

    let mut attempt = 0;
    loop {
        let head = repository
            .head_number(&draft.prompt_id, &draft.branch)
            .await?;
        let next = head.unwrap_or(0) + 1;
        let version = draft.clone().into_version(next, Utc::now());

        match repository.insert_version(version).await {
            Ok(stored) => {
                tracing::info!(
                    prompt_id = %stored.prompt_id,
                    branch = %stored.branch,
                    version = stored.version,
                    "Appended prompt version"
                );
                return Ok(stored);
            }
            Err(StorageError::SequenceConflict {
                expected,
                attempted,
                ..
            }) if attempt < APPEND_RETRIES => {
                attempt += 1;
                tracing::warn!(
                    prompt_id = %draft.prompt_id,
                    branch = %draft.branch,
                    expected,
                    attempted,
                    "Version number taken by another writer, retrying append"
                );
            }
            Err(StorageError::SequenceConflict { .. }) => {
                return Err(VersionError::ConcurrentAppendConflict {
                    prompt_id: draft.prompt_id,
                    branch: draft.branch,
                });
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_sequence_is_exclusive() {
        let locks = SequenceLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("p1", "main").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_sequences_do_not_block() {
        let locks = SequenceLocks::new();
        let main = locks.acquire("p1", "main").await;
        let other = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("p1", "experiment"),
        )
        .await
        .expect("other branch should not wait");

        assert!(main.covers("p1", "main"));
        assert!(other.covers("p1", "experiment"));
        assert!(!other.covers("p1", "main"));
    }

    #[tokio::test]
    async fn test_lock_is_released_on_drop() {
        let locks = SequenceLocks::new();
        drop(locks.acquire("p1", "main").await);
        let guard = tokio::time::timeout(Duration::from_millis(100), locks.acquire("p1", "main"))
            .await
            .expect("lock should be free");
        assert_eq!(guard.prompt_id(), "p1");
        assert_eq!(guard.branch(), "main");
    }
}
