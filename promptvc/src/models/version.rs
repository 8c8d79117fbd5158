//! Prompt version model: one immutable snapshot of a prompt's content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Branch used when a caller does not name one
pub const MAIN_BRANCH: &str = "main";

/// Reserved tag that exempts a version from retention cleanup
pub const PINNED_TAG: &str = "pinned";

/// Version numbers are positive and scoped to a `(prompt_id, branch)` pair
pub type VersionNumber = u64;

/// A single recorded version of a prompt on a branch.
///
/// Everything except `tags` is write-once. The content is a full snapshot,
/// never a delta against a parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptVersion {
    /// Owning prompt
    pub prompt_id: String,

    /// Branch whose sequence this version belongs to
    pub branch: String,

    /// Position in the branch sequence, starting at 1
    pub version: VersionNumber,

    /// Full text of the prompt at this version
    pub content: String,

    /// Opaque metadata snapshot taken alongside the content
    pub frontmatter: serde_json::Value,

    /// When the version was appended
    pub created_at: DateTime<Utc>,

    /// Free-form note explaining the change
    pub change_reason: Option<String>,

    /// Labels attached to the version
    pub tags: BTreeSet<String>,
}

impl PromptVersion {
    /// Whether the version carries the reserved `pinned` tag
    pub fn is_pinned(&self) -> bool {
        self.tags.contains(PINNED_TAG)
    }

    /// Whether the version has the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Short single-line preview of the content
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.content.lines().next().unwrap_or_default();
        if first_line.chars().count() > max_chars {
            let cut: String = first_line.chars().take(max_chars).collect();
            format!("{}…", cut)
        } else {
            first_line.to_string()
        }
    }
}

/// Content for a version that has not been numbered yet.
///
/// Drafts are turned into [`PromptVersion`]s by the append path, which is the
/// only place a version number is allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionDraft {
    pub prompt_id: String,
    pub branch: String,
    pub content: String,
    pub frontmatter: serde_json::Value,
    pub change_reason: Option<String>,
}

impl VersionDraft {
    /// Start a draft for the `main` branch with empty frontmatter
    pub fn new(prompt_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            branch: MAIN_BRANCH.to_string(),
            content: content.into(),
            frontmatter: serde_json::Value::Object(serde_json::Map::new()),
            change_reason: None,
        }
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn frontmatter(mut self, frontmatter: serde_json::Value) -> Self {
        self.frontmatter = frontmatter;
        self
    }

    pub fn change_reason(mut self, reason: impl Into<String>) -> Self {
        self.change_reason = Some(reason.into());
        self
    }

    /// Stamp the draft with its allocated number and creation time
    pub fn into_version(self, version: VersionNumber, created_at: DateTime<Utc>) -> PromptVersion {
        PromptVersion {
            prompt_id: self.prompt_id,
            branch: self.branch,
            version,
            content: self.content,
            frontmatter: self.frontmatter,
            created_at,
            change_reason: self.change_reason,
            tags: BTreeSet::new(),
        }
    }
}
