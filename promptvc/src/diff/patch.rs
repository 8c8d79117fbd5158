//! Applying hunks back onto source content

use super::{DiffHunk, DiffLine, normalize_newlines};

/// Hunks did not match the content they were applied to
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Hunk {hunk} does not apply at line {line}: {reason}")]
pub struct PatchError {
    /// Zero-based index of the failing hunk
    pub hunk: usize,
    /// One-based source line where the mismatch was found, 0 when the hunk
    /// header itself is impossible
    pub line: usize,
    pub reason: String,
}

/// Apply `hunks` to `from`, returning the patched content.
///
/// Context and removed lines are checked against the source; any mismatch
/// rejects the whole patch.
pub fn apply_patch(from: &str, hunks: &[DiffHunk]) -> Result<String, PatchError> {
    let source = normalize_newlines(from);
    let lines: Vec<&str> = source.split_inclusive('\n').collect();

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;

    for (index, hunk) in hunks.iter().enumerate() {
        let Some(offset) = hunk.old_offset() else {
            return Err(PatchError {
                hunk: index,
                line: 0,
                reason: format!(
                    "hunk consumes {} source lines but starts at line 0",
                    hunk.old_line_count
                ),
            });
        };
        if offset < cursor || offset > lines.len() {
            return Err(PatchError {
                hunk: index,
                line: offset + 1,
                reason: format!(
                    "hunk starts outside the remaining source ({} of {} lines consumed)",
                    cursor,
                    lines.len()
                ),
            });
        }

        for line in &lines[cursor..offset] {
            output.push_str(line);
        }
        cursor = offset;

        for diff_line in &hunk.lines {
            match diff_line {
                DiffLine::Added(text) => output.push_str(text),
                DiffLine::Context(text) | DiffLine::Removed(text) => {
                    match lines.get(cursor) {
                        Some(actual) if *actual == text.as_str() => {}
                        Some(actual) => {
                            return Err(PatchError {
                                hunk: index,
                                line: cursor + 1,
                                reason: format!("expected {:?}, found {:?}", text, actual),
                            });
                        }
                        None => {
                            return Err(PatchError {
                                hunk: index,
                                line: cursor + 1,
                                reason: "source ended early".to_string(),
                            });
                        }
                    }
                    if let DiffLine::Context(text) = diff_line {
                        output.push_str(text);
                    }
                    cursor += 1;
                }
            }
        }
    }

    for line in &lines[cursor..] {
        output.push_str(line);
    }

    Ok(output)
}
