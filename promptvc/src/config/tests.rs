use crate::config::{
    ConfigBuilder, ConfigLoader, LogFormat, LogLevel, PromptVcConfig, StorageEngine,
    validate_config,
};
use crate::models::{MAIN_BRANCH, RetentionPolicy};
use figment::providers::{Format, Toml};
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_default_config() {
    let config = PromptVcConfig::default();
    assert_eq!(config.versioning.default_branch, MAIN_BRANCH);
    assert_eq!(config.versioning.diff_context_lines, 3);
    assert_eq!(config.versioning.retention.max_versions, Some(50));
    assert_eq!(config.versioning.retention.max_age_days, None);
    assert_eq!(config.logging.level, LogLevel::Info);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_builder_with_memory_storage() {
    let config = ConfigBuilder::new()
        .with_memory_storage()
        .with_default_branch("drafts")
        .with_diff_context_lines(5)
        .with_log_level(LogLevel::Debug)
        .build()
        .unwrap();

    assert_eq!(config.storage.engine, StorageEngine::Memory);
    assert_eq!(config.versioning.default_branch, "drafts");
    assert_eq!(config.versioning.diff_context_lines, 5);
    assert_eq!(config.logging.level, LogLevel::Debug);
}

#[test]
fn test_validation_rejects_bad_values() {
    assert!(ConfigBuilder::new().with_default_branch("  ").build().is_err());
    assert!(
        ConfigBuilder::new()
            .with_diff_context_lines(101)
            .build()
            .is_err()
    );
    assert!(
        ConfigBuilder::new()
            .with_retention(RetentionPolicy::keep_all().with_max_versions(0))
            .build()
            .is_err()
    );
    assert!(
        ConfigBuilder::new()
            .with_retention(RetentionPolicy::keep_all().with_max_age_days(0))
            .build()
            .is_err()
    );
    assert!(
        ConfigBuilder::new()
            .with_storage_engine(StorageEngine::SurrealMemory)
            .with_surreal_namespace("", "main")
            .build()
            .is_err()
    );
}

#[test]
fn test_predefined_configs() {
    let dev = ConfigBuilder::development().build().unwrap();
    assert_eq!(dev.storage.engine, StorageEngine::Memory);
    assert_eq!(dev.logging.format, LogFormat::Pretty);

    let test = ConfigBuilder::testing().build().unwrap();
    assert!(test.versioning.retention.is_unbounded());

    let prod = ConfigBuilder::production()
        .with_data_dir(PathBuf::from("/tmp/promptvc"))
        .build()
        .unwrap();
    assert_eq!(prod.storage.engine, StorageEngine::SurrealRocksDb);
    assert_eq!(prod.logging.format, LogFormat::Json);
}

#[test]
fn test_load_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("promptvc.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
[storage]
engine = "surreal-memory"

[versioning]
default_branch = "trunk"

[versioning.retention]
max_versions = 10
max_age_days = 30
"#
    )
    .unwrap();

    let config = ConfigLoader::new().load_file(&path).unwrap().extract().unwrap();

    assert_eq!(config.storage.engine, StorageEngine::SurrealMemory);
    assert_eq!(config.versioning.default_branch, "trunk");
    assert_eq!(config.versioning.diff_context_lines, 3);
    assert_eq!(config.versioning.retention.max_versions, Some(10));
    assert_eq!(config.versioning.retention.max_age_days, Some(30));
}

#[test]
fn test_load_missing_or_unsupported_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(
        ConfigLoader::new()
            .load_file(dir.path().join("absent.toml"))
            .is_err()
    );

    let path = dir.path().join("promptvc.ini");
    std::fs::write(&path, "engine = memory").unwrap();
    assert!(ConfigLoader::new().load_file(&path).is_err());
}

#[test]
fn test_later_sources_override_and_are_validated() {
    let mut loader = ConfigLoader::new();
    loader.merge(Toml::string("[versioning]\ndiff_context_lines = 7"));
    assert_eq!(loader.extract().unwrap().versioning.diff_context_lines, 7);

    loader.merge(Toml::string("[versioning]\ndiff_context_lines = 500"));
    assert!(loader.extract().is_err());
}

#[test]
fn test_config_serialization() {
    let config = ConfigBuilder::testing().build().unwrap();
    let json = serde_json::to_string(&config).unwrap();
    let deserialized: PromptVcConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, deserialized);
}
