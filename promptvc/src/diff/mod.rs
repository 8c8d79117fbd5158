//! Line diffs between prompt versions
//!
//! [`compute_diff`] is a pure function of two strings. Content is
//! newline-normalized and split into lines that keep their `\n` terminator,
//! so a missing final newline is represented exactly and applying the hunks
//! with [`apply_patch`] reproduces the target text byte for byte.

mod patch;
mod render;

pub use patch::{PatchError, apply_patch};

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp, DiffTag, TextDiff};
use std::borrow::Cow;

use crate::models::VersionNumber;

/// Context lines shown around each change when nothing else is configured
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// One line of a hunk, including its line terminator when it has one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum DiffLine {
    /// Present in both versions
    Context(String),
    /// Only in the target version
    Added(String),
    /// Only in the source version
    Removed(String),
}

impl DiffLine {
    /// The line text, terminator included
    pub fn text(&self) -> &str {
        match self {
            DiffLine::Context(text) | DiffLine::Added(text) | DiffLine::Removed(text) => text,
        }
    }

    /// Unified diff marker for this line
    pub fn marker(&self) -> char {
        match self {
            DiffLine::Context(_) => ' ',
            DiffLine::Added(_) => '+',
            DiffLine::Removed(_) => '-',
        }
    }
}

/// A contiguous block of changes plus surrounding context.
///
/// Start lines are 1-based. A range with a zero count follows the unified
/// diff convention: its start is the line *after which* the change applies,
/// so an insertion at the very top has `old_start_line == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start_line: usize,
    pub old_line_count: usize,
    pub new_start_line: usize,
    pub new_line_count: usize,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Zero-based index of the first source line this hunk consumes.
    ///
    /// `None` when the hunk consumes lines but claims to start at line 0.
    pub(crate) fn old_offset(&self) -> Option<usize> {
        if self.old_line_count == 0 {
            Some(self.old_start_line)
        } else {
            self.old_start_line.checked_sub(1)
        }
    }
}

/// Line counts over the whole edit script, not just the displayed hunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Diff of two texts with no version information attached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDiff {
    pub hunks: Vec<DiffHunk>,
    pub stats: DiffStats,
}

impl ContentDiff {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}

/// A version number together with the content that was diffed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub version: VersionNumber,
    pub content: String,
}

/// Diff between two stored versions, always transforming `from` into `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub from: VersionRef,
    pub to: VersionRef,
    pub hunks: Vec<DiffHunk>,
    pub stats: DiffStats,
}

impl DiffResult {
    /// Diff two versions' content
    pub fn between(from: VersionRef, to: VersionRef, context_lines: usize) -> Self {
        let ContentDiff { hunks, stats } = compute_diff(&from.content, &to.content, context_lines);
        Self {
            from,
            to,
            hunks,
            stats,
        }
    }

    /// Whether the two versions have identical (normalized) content
    pub fn is_identical(&self) -> bool {
        self.hunks.is_empty()
    }
}

/// Convert CRLF and lone CR line endings to LF
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Number of lines in `text`; a trailing newline does not start a new line
pub fn line_count(text: &str) -> usize {
    normalize_newlines(text).split_inclusive('\n').count()
}

/// Compute the minimal line edit script from `from` to `to`, grouped into
/// hunks with up to `context_lines` unchanged lines around each change.
pub fn compute_diff(from: &str, to: &str, context_lines: usize) -> ContentDiff {
    let old = normalize_newlines(from);
    let new = normalize_newlines(to);

    if old == new {
        return ContentDiff {
            hunks: Vec::new(),
            stats: DiffStats {
                unchanged: line_count(&old),
                ..DiffStats::default()
            },
        };
    }

    // Myers without a deadline never falls back to an approximate script.
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old.as_ref(), new.as_ref());

    let mut stats = DiffStats::default();
    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => stats.unchanged += old_range.len(),
            DiffTag::Delete => stats.removed += old_range.len(),
            DiffTag::Insert => stats.added += new_range.len(),
            DiffTag::Replace => {
                stats.removed += old_range.len();
                stats.added += new_range.len();
            }
        }
    }

    let hunks = diff
        .grouped_ops(context_lines)
        .into_iter()
        .filter_map(|group| build_hunk(&diff, &group))
        .collect();

    ContentDiff { hunks, stats }
}

fn build_hunk(diff: &TextDiff<'_, '_, '_, str>, group: &[DiffOp]) -> Option<DiffHunk> {
    let ops: Vec<&DiffOp> = group
        .iter()
        .filter(|op| !op.old_range().is_empty() || !op.new_range().is_empty())
        .collect();

    if ops.iter().all(|op| op.tag() == DiffTag::Equal) {
        return None;
    }

    let first = ops.first()?;
    let last = ops.last()?;
    let old_begin = first.old_range().start;
    let new_begin = first.new_range().start;
    let old_line_count = last.old_range().end - old_begin;
    let new_line_count = last.new_range().end - new_begin;

    let lines = ops
        .iter()
        .flat_map(|op| diff.iter_changes(op))
        .map(|change| {
            let text = change.value().to_string();
            match change.tag() {
                similar::ChangeTag::Equal => DiffLine::Context(text),
                similar::ChangeTag::Insert => DiffLine::Added(text),
                similar::ChangeTag::Delete => DiffLine::Removed(text),
            }
        })
        .collect();

    Some(DiffHunk {
        old_start_line: unified_start(old_begin, old_line_count),
        old_line_count,
        new_start_line: unified_start(new_begin, new_line_count),
        new_line_count,
        lines,
    })
}

fn unified_start(begin: usize, count: usize) -> usize {
    if count == 0 { begin } else { begin + 1 }
}
