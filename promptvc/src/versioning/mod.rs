//! Version history operations
//!
//! - [`sequence`]: per-`(prompt, branch)` append serialization
//! - [`rollback`]: restore by appending
//! - [`retention`]: policy-driven cleanup
//! - [`service`]: the [`VersionService`] façade

pub mod retention;
pub mod rollback;
pub mod sequence;
pub mod service;

pub use retention::{
    CancelFlag, CleanupDecision, CleanupFailure, CleanupOptions, CleanupSummary,
    RetentionManager, select_for_deletion,
};
pub use rollback::RollbackCoordinator;
pub use sequence::{SequenceGuard, SequenceLocks, append_next};
pub use service::{
    BranchOptions, CreateBranchOptions, DiffOptions, ListOptions, RollbackOptions, SaveOptions,
    VersionService, VersioningStats,
};
