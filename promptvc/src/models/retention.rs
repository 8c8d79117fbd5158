//! Retention policy configuration

use serde::{Deserialize, Serialize};

/// Governs which non-HEAD, non-pinned versions cleanup may delete.
///
/// The two limits are independent filters. A version violating either one is
/// deleted. Pinned versions are always kept and there is no switch to change
/// that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Keep at most this many of the newest unpinned versions per branch,
    /// HEAD included
    pub max_versions: Option<usize>,

    /// Delete eligible versions older than this many days
    pub max_age_days: Option<u64>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_versions: Some(50),
            max_age_days: None,
        }
    }
}

impl RetentionPolicy {
    /// A policy that never selects anything
    pub fn keep_all() -> Self {
        Self {
            max_versions: None,
            max_age_days: None,
        }
    }

    pub fn with_max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = Some(max_versions);
        self
    }

    pub fn with_max_age_days(mut self, max_age_days: u64) -> Self {
        self.max_age_days = Some(max_age_days);
        self
    }

    /// Pinned versions are exempt under every policy
    pub const fn keeps_pinned(&self) -> bool {
        true
    }

    /// Whether the policy can select anything at all
    pub fn is_unbounded(&self) -> bool {
        self.max_versions.is_none() && self.max_age_days.is_none()
    }

    /// Check the policy's limits are meaningful
    pub fn validate(&self) -> Result<(), String> {
        if self.max_versions == Some(0) {
            return Err("max_versions must be greater than 0".to_string());
        }
        if self.max_age_days == Some(0) {
            return Err("max_age_days must be greater than 0".to_string());
        }
        Ok(())
    }
}
