//! Integration tests for the SurrealDB version repository

#![cfg(feature = "surrealdb-embedded")]

use chrono::Utc;
use promptvc::config::VersioningConfig;
use promptvc::models::VersionDraft;
use promptvc::prelude::*;
use promptvc::storage::surreal::{
    EmbeddedSurrealRepository, SurrealRepositoryConfig, create_memory_repository,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Creates a repository on a fresh in-memory SurrealDB instance
async fn create_test_repository() -> EmbeddedSurrealRepository {
    let config = SurrealRepositoryConfig {
        namespace: "test_promptvc".to_string(),
        database: "test_versions".to_string(),
    };

    create_memory_repository(config)
        .await
        .expect("Failed to create SurrealDB repository")
}

fn create_test_version(prompt_id: &str, version: VersionNumber, content: &str) -> PromptVersion {
    VersionDraft::new(prompt_id, content)
        .frontmatter(json!({"model": "test"}))
        .change_reason(format!("edit {}", version))
        .into_version(version, Utc::now())
}

async fn seed(repository: &EmbeddedSurrealRepository, prompt_id: &str, count: VersionNumber) {
    repository
        .create_branch(Branch::new(prompt_id, MAIN_BRANCH).active(true))
        .await
        .unwrap();
    for n in 1..=count {
        repository
            .insert_version(create_test_version(prompt_id, n, &format!("content {}", n)))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_insert_and_get_version() {
    let repository = create_test_repository().await;
    seed(&repository, "p1", 2).await;

    let fetched = repository
        .get_version("p1", MAIN_BRANCH, 2)
        .await
        .unwrap()
        .expect("version 2 should exist");

    assert_eq!(fetched.version, 2);
    assert_eq!(fetched.content, "content 2");
    assert_eq!(fetched.frontmatter["model"], "test");
    assert_eq!(fetched.change_reason.as_deref(), Some("edit 2"));
    assert_eq!(repository.head_number("p1", MAIN_BRANCH).await.unwrap(), Some(2));

    let missing = repository.get_version("p1", MAIN_BRANCH, 9).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_insert_requires_next_number() {
    let repository = create_test_repository().await;
    seed(&repository, "p1", 1).await;

    let skipped = repository
        .insert_version(create_test_version("p1", 3, "gap"))
        .await;
    assert!(matches!(
        skipped,
        Err(StorageError::SequenceConflict {
            expected: 2,
            attempted: 3,
            ..
        })
    ));

    let duplicate = repository
        .insert_version(create_test_version("p1", 1, "again"))
        .await;
    assert!(matches!(
        duplicate,
        Err(StorageError::SequenceConflict { attempted: 1, .. })
    ));
}

#[tokio::test]
async fn test_list_versions_newest_first() {
    let repository = create_test_repository().await;
    seed(&repository, "p1", 4).await;

    let all = repository
        .list_versions("p1", MAIN_BRANCH, None)
        .await
        .unwrap();
    let numbers: Vec<VersionNumber> = all.iter().map(|v| v.version).collect();
    assert_eq!(numbers, vec![4, 3, 2, 1]);

    let limited = repository
        .list_versions("p1", MAIN_BRANCH, Some(2))
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].version, 4);

    let across = repository.list_all_versions("p1", Some(3)).await.unwrap();
    assert_eq!(across.len(), 3);
}

#[tokio::test]
async fn test_tags_round_trip() {
    let repository = create_test_repository().await;
    seed(&repository, "p1", 2).await;

    let tagged = repository
        .add_tag("p1", MAIN_BRANCH, 1, PINNED_TAG)
        .await
        .unwrap()
        .expect("tagged version returned");
    assert!(tagged.is_pinned());

    // Adding the same tag twice keeps a single copy
    let again = repository
        .add_tag("p1", MAIN_BRANCH, 1, PINNED_TAG)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.tags.len(), 1);

    let untagged = repository
        .remove_tag("p1", MAIN_BRANCH, 1, PINNED_TAG)
        .await
        .unwrap()
        .unwrap();
    assert!(!untagged.is_pinned());

    let missing = repository
        .add_tag("p1", MAIN_BRANCH, 7, "stable")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_delete_refuses_protected_versions() {
    let repository = create_test_repository().await;
    seed(&repository, "p1", 4).await;
    repository
        .add_tag("p1", MAIN_BRANCH, 2, PINNED_TAG)
        .await
        .unwrap();

    let head_batch: BTreeSet<VersionNumber> = [1, 4].into_iter().collect();
    let result = repository
        .delete_versions("p1", MAIN_BRANCH, &head_batch)
        .await;
    assert!(matches!(
        result,
        Err(StorageError::ProtectedVersion { version: 4, .. })
    ));

    let pinned_batch: BTreeSet<VersionNumber> = [2].into_iter().collect();
    let result = repository
        .delete_versions("p1", MAIN_BRANCH, &pinned_batch)
        .await;
    assert!(matches!(
        result,
        Err(StorageError::ProtectedVersion { version: 2, .. })
    ));

    // Nothing was removed by the refused batches
    assert_eq!(
        repository
            .list_versions("p1", MAIN_BRANCH, None)
            .await
            .unwrap()
            .len(),
        4
    );

    let allowed: BTreeSet<VersionNumber> = [1, 3].into_iter().collect();
    let deleted = repository
        .delete_versions("p1", MAIN_BRANCH, &allowed)
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let remaining: Vec<VersionNumber> = repository
        .list_versions("p1", MAIN_BRANCH, None)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(remaining, vec![4, 2]);
}

#[tokio::test]
async fn test_branches() {
    let repository = create_test_repository().await;
    seed(&repository, "p1", 2).await;

    repository
        .create_branch(Branch::new("p1", "experiment").forked_from(MAIN_BRANCH, 2))
        .await
        .unwrap();

    let duplicate = repository
        .create_branch(Branch::new("p1", "experiment"))
        .await;
    assert!(matches!(duplicate, Err(StorageError::AlreadyExists(_))));

    repository
        .set_active_branch("p1", "experiment")
        .await
        .unwrap();

    let branches = repository.list_branches("p1").await.unwrap();
    assert_eq!(branches.len(), 2);
    let experiment = branches.iter().find(|b| b.name == "experiment").unwrap();
    assert!(experiment.is_active);
    assert_eq!(experiment.forked_from.as_ref().map(|f| f.version), Some(2));
    assert!(!branches.iter().find(|b| b.name == MAIN_BRANCH).unwrap().is_active);

    let missing = repository.set_active_branch("p1", "nope").await;
    assert!(matches!(missing, Err(StorageError::NotFound(_))));

    assert_eq!(repository.list_prompt_ids().await.unwrap(), vec!["p1"]);
}

#[tokio::test]
async fn test_retention_policy_persistence() {
    let repository = create_test_repository().await;
    assert!(repository.load_retention_policy().await.unwrap().is_none());

    let policy = RetentionPolicy::keep_all()
        .with_max_versions(5)
        .with_max_age_days(30);
    repository.save_retention_policy(&policy).await.unwrap();
    assert_eq!(
        repository.load_retention_policy().await.unwrap(),
        Some(policy)
    );

    let replaced = RetentionPolicy::keep_all().with_max_versions(2);
    repository.save_retention_policy(&replaced).await.unwrap();
    assert_eq!(
        repository.load_retention_policy().await.unwrap(),
        Some(replaced)
    );
}

/// Define a field assertion so later writes fail inside the database
async fn restrict_field(repository: &EmbeddedSurrealRepository, definition: &str) {
    repository
        .client()
        .query(definition)
        .await
        .unwrap()
        .check()
        .expect("field definition should apply");
}

#[tokio::test]
async fn test_rejected_retention_write_is_reported() {
    let repository = create_test_repository().await;
    restrict_field(
        &repository,
        "DEFINE FIELD max_versions ON TABLE versioning_settings ASSERT $value < 3;",
    )
    .await;

    let rejected = repository
        .save_retention_policy(&RetentionPolicy::keep_all().with_max_versions(5))
        .await;
    assert!(matches!(rejected, Err(StorageError::Query(_))));
    assert!(repository.load_retention_policy().await.unwrap().is_none());

    let accepted = RetentionPolicy::keep_all().with_max_versions(2);
    repository.save_retention_policy(&accepted).await.unwrap();
    assert_eq!(
        repository.load_retention_policy().await.unwrap(),
        Some(accepted)
    );
}

#[tokio::test]
async fn test_rejected_branch_deactivation_is_reported() {
    let repository = create_test_repository().await;
    seed(&repository, "p1", 1).await;
    restrict_field(
        &repository,
        "DEFINE FIELD is_active ON TABLE prompt_branch ASSERT $value = true;",
    )
    .await;

    let result = repository
        .create_branch(Branch::new("p1", "experiment").active(true))
        .await;
    assert!(matches!(result, Err(StorageError::Query(_))));

    let branches = repository.list_branches("p1").await.unwrap();
    assert_eq!(branches.len(), 1);
    assert!(branches[0].is_active);
}

#[tokio::test]
async fn test_service_over_surreal() {
    let repository = Arc::new(create_test_repository().await);
    let service = VersionService::new(repository, VersioningConfig::default());

    for content in ["A", "B", "C"] {
        service
            .save_version("p1", content, json!({}), None, SaveOptions::default())
            .await
            .unwrap();
    }
    service
        .tag("p1", 1, PINNED_TAG, BranchOptions::default())
        .await
        .unwrap();

    let restored = service
        .rollback("p1", 1, RollbackOptions::default().with_backup())
        .await
        .unwrap();
    assert_eq!(restored.version, 5);
    assert_eq!(restored.content, "A");

    let policy = RetentionPolicy::keep_all().with_max_versions(2);
    let summary = service
        .cleanup(&policy, CleanupOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.deleted, 2);

    let remaining: Vec<VersionNumber> = service
        .list_versions("p1", ListOptions::default())
        .await
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(remaining, vec![5, 4, 1]);
}
