//! Domain models for prompt versions, branches and retention

pub mod branch;
pub mod retention;
pub mod version;

pub use branch::{Branch, ForkPoint};
pub use retention::RetentionPolicy;
pub use version::{MAIN_BRANCH, PINNED_TAG, PromptVersion, VersionDraft, VersionNumber};
