//! Branch model: a named, independently numbered version sequence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::version::VersionNumber;

/// Where a branch was forked from.
///
/// Stored as plain attributes; branches never hold references to each other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForkPoint {
    pub branch: String,
    pub version: VersionNumber,
}

/// A branch of a prompt's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    /// Owning prompt
    pub prompt_id: String,

    /// Branch name, unique per prompt
    pub name: String,

    /// Whether this branch's HEAD is the prompt's current content
    pub is_active: bool,

    /// Origin of the branch, if it was forked from another one
    pub forked_from: Option<ForkPoint>,

    /// When the branch was registered
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(prompt_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            name: name.into(),
            is_active: false,
            forked_from: None,
            created_at: Utc::now(),
        }
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn forked_from(mut self, branch: impl Into<String>, version: VersionNumber) -> Self {
        self.forked_from = Some(ForkPoint {
            branch: branch.into(),
            version,
        });
        self
    }
}
