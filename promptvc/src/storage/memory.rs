//! In-process repository for tests, previews and embedded use

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{Branch, PromptVersion, RetentionPolicy, VersionNumber};
use crate::storage::errors::StorageError;
use crate::storage::traits::{VersionRepository, check_protected};

type SequenceKey = (String, String);

#[derive(Debug, Default)]
struct State {
    sequences: HashMap<SequenceKey, BTreeMap<VersionNumber, PromptVersion>>,
    branches: BTreeMap<String, Vec<Branch>>,
    retention: Option<RetentionPolicy>,
}

/// Repository backed by process memory.
///
/// Every mutation runs under a single write lock, so the insert and delete
/// guards are checked and applied atomically.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::Internal("in-memory repository lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::Internal("in-memory repository lock poisoned".to_string()))
    }

    fn key(prompt_id: &str, branch: &str) -> SequenceKey {
        (prompt_id.to_string(), branch.to_string())
    }

    fn update_tags<F>(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        apply: F,
    ) -> Result<Option<PromptVersion>, StorageError>
    where
        F: FnOnce(&mut BTreeSet<String>),
    {
        let mut state = self.write()?;
        let record = state
            .sequences
            .get_mut(&Self::key(prompt_id, branch))
            .and_then(|sequence| sequence.get_mut(&version));

        Ok(record.map(|record| {
            apply(&mut record.tags);
            record.clone()
        }))
    }
}

#[async_trait]
impl VersionRepository for InMemoryRepository {
    async fn head_number(
        &self,
        prompt_id: &str,
        branch: &str,
    ) -> Result<Option<VersionNumber>, StorageError> {
        let state = self.read()?;
        Ok(state
            .sequences
            .get(&Self::key(prompt_id, branch))
            .and_then(|sequence| sequence.keys().next_back().copied()))
    }

    async fn insert_version(&self, version: PromptVersion) -> Result<PromptVersion, StorageError> {
        let mut state = self.write()?;
        let sequence = state
            .sequences
            .entry(Self::key(&version.prompt_id, &version.branch))
            .or_default();

        let expected = sequence.keys().next_back().copied().unwrap_or(0) + 1;
        if version.version != expected {
            return Err(StorageError::SequenceConflict {
                prompt_id: version.prompt_id.clone(),
                branch: version.branch.clone(),
                expected,
                attempted: version.version,
            });
        }

        sequence.insert(version.version, version.clone());
        Ok(version)
    }

    async fn list_versions(
        &self,
        prompt_id: &str,
        branch: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PromptVersion>, StorageError> {
        let state = self.read()?;
        Ok(state
            .sequences
            .get(&Self::key(prompt_id, branch))
            .map(|sequence| {
                sequence
                    .values()
                    .rev()
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_all_versions(
        &self,
        prompt_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PromptVersion>, StorageError> {
        let state = self.read()?;
        let mut all: Vec<PromptVersion> = state
            .sequences
            .iter()
            .filter(|((owner, _), _)| owner == prompt_id)
            .flat_map(|(_, sequence)| sequence.values().cloned())
            .collect();

        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.version.cmp(&a.version))
                .then_with(|| a.branch.cmp(&b.branch))
        });

        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    async fn get_version(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
    ) -> Result<Option<PromptVersion>, StorageError> {
        let state = self.read()?;
        Ok(state
            .sequences
            .get(&Self::key(prompt_id, branch))
            .and_then(|sequence| sequence.get(&version))
            .cloned())
    }

    async fn add_tag(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        tag: &str,
    ) -> Result<Option<PromptVersion>, StorageError> {
        self.update_tags(prompt_id, branch, version, |tags| {
            tags.insert(tag.to_string());
        })
    }

    async fn remove_tag(
        &self,
        prompt_id: &str,
        branch: &str,
        version: VersionNumber,
        tag: &str,
    ) -> Result<Option<PromptVersion>, StorageError> {
        self.update_tags(prompt_id, branch, version, |tags| {
            tags.remove(tag);
        })
    }

    async fn delete_versions(
        &self,
        prompt_id: &str,
        branch: &str,
        versions: &BTreeSet<VersionNumber>,
    ) -> Result<usize, StorageError> {
        let mut state = self.write()?;
        let Some(sequence) = state.sequences.get_mut(&Self::key(prompt_id, branch)) else {
            return Ok(0);
        };

        let stored: Vec<&PromptVersion> = sequence.values().collect();
        check_protected(prompt_id, branch, &stored, versions)?;

        let deleted = versions
            .iter()
            .filter(|number| sequence.remove(number).is_some())
            .count();
        Ok(deleted)
    }

    async fn create_branch(&self, branch: Branch) -> Result<Branch, StorageError> {
        let mut state = self.write()?;
        let branches = state.branches.entry(branch.prompt_id.clone()).or_default();

        if branches.iter().any(|existing| existing.name == branch.name) {
            return Err(StorageError::AlreadyExists(format!(
                "Branch {} already exists for prompt {}",
                branch.name, branch.prompt_id
            )));
        }

        if branch.is_active {
            for existing in branches.iter_mut() {
                existing.is_active = false;
            }
        }
        branches.push(branch.clone());
        Ok(branch)
    }

    async fn list_branches(&self, prompt_id: &str) -> Result<Vec<Branch>, StorageError> {
        let state = self.read()?;
        Ok(state.branches.get(prompt_id).cloned().unwrap_or_default())
    }

    async fn set_active_branch(&self, prompt_id: &str, name: &str) -> Result<(), StorageError> {
        let mut state = self.write()?;
        let branches = state
            .branches
            .get_mut(prompt_id)
            .filter(|branches| branches.iter().any(|b| b.name == name))
            .ok_or_else(|| {
                StorageError::NotFound(format!("Branch {} not found for prompt {}", name, prompt_id))
            })?;

        for branch in branches.iter_mut() {
            branch.is_active = branch.name == name;
        }
        Ok(())
    }

    async fn list_prompt_ids(&self) -> Result<Vec<String>, StorageError> {
        let state = self.read()?;
        Ok(state.branches.keys().cloned().collect())
    }

    async fn load_retention_policy(&self) -> Result<Option<RetentionPolicy>, StorageError> {
        Ok(self.read()?.retention.clone())
    }

    async fn save_retention_policy(&self, policy: &RetentionPolicy) -> Result<(), StorageError> {
        self.write()?.retention = Some(policy.clone());
        Ok(())
    }
}
