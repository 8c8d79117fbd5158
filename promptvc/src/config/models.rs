//! Configuration model definitions.

use crate::models::{MAIN_BRANCH, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PromptVcConfig {
    /// Where versions are stored
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Diff, branch and retention defaults
    pub versioning: VersioningConfig,
}

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Which repository implementation to open
    pub engine: StorageEngine,

    /// Base directory for on-disk engines
    pub data_dir: PathBuf,

    /// SurrealDB namespace
    pub namespace: String,

    /// SurrealDB database
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("org", "promptvc", "promptvc")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"));

        let engine = if cfg!(feature = "surrealdb-embedded") {
            StorageEngine::SurrealRocksDb
        } else {
            StorageEngine::Memory
        };

        Self {
            engine,
            data_dir,
            namespace: "promptvc".to_string(),
            database: "main".to_string(),
        }
    }
}

impl StorageConfig {
    /// Path of the RocksDB directory for the embedded engine
    pub fn rocksdb_path(&self) -> PathBuf {
        self.data_dir.join("versions")
    }
}

/// Repository implementation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageEngine {
    /// Process-local maps; nothing survives a restart
    Memory,

    /// SurrealDB with its in-memory key-value engine
    SurrealMemory,

    /// SurrealDB embedded on disk through RocksDB
    #[serde(rename = "surreal-rocksdb")]
    SurrealRocksDb,
}

impl fmt::Display for StorageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageEngine::Memory => write!(f, "memory"),
            StorageEngine::SurrealMemory => write!(f, "surreal-memory"),
            StorageEngine::SurrealRocksDb => write!(f, "surreal-rocksdb"),
        }
    }
}

/// Versioning defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VersioningConfig {
    /// Branch used when a call does not name one
    pub default_branch: String,

    /// Unchanged lines shown around each change in a diff hunk
    pub diff_context_lines: usize,

    /// Retention policy used until one is saved to the repository
    pub retention: RetentionPolicy,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            default_branch: MAIN_BRANCH.to_string(),
            diff_context_lines: 3,
            retention: RetentionPolicy::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,

    /// Log format
    pub format: LogFormat,

    /// Extra `EnvFilter` directives, e.g. `promptvc::versioning=debug`
    pub filter: Option<String>,

    /// File to log to (if any)
    pub file: Option<PathBuf>,

    /// Whether to log to stdout
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Default,
            filter: None,
            file: None,
            stdout: true,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase directive name understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default full format
    Default,

    /// JSON lines
    Json,

    /// Compact single-line format
    Compact,

    /// Multi-line pretty format
    Pretty,
}
