//! Unified diff rendering

use std::fmt::Write;

use super::{DiffHunk, DiffResult};

impl DiffResult {
    /// Render as unified diff text with `v<N>` file labels
    pub fn to_unified(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- v{}", self.from.version);
        let _ = writeln!(out, "+++ v{}", self.to.version);
        for hunk in &self.hunks {
            render_hunk(&mut out, hunk);
        }
        out
    }
}

fn render_hunk(out: &mut String, hunk: &DiffHunk) {
    let _ = writeln!(
        out,
        "@@ -{},{} +{},{} @@",
        hunk.old_start_line, hunk.old_line_count, hunk.new_start_line, hunk.new_line_count
    );

    for line in &hunk.lines {
        out.push(line.marker());
        out.push_str(line.text());
        if !line.text().ends_with('\n') {
            out.push_str("\n\\ No newline at end of file\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::diff::{DiffResult, VersionRef};

    #[test]
    fn test_unified_output() {
        let result = DiffResult::between(
            VersionRef {
                version: 1,
                content: "A\nB\n".to_string(),
            },
            VersionRef {
                version: 3,
                content: "A\nC".to_string(),
            },
            3,
        );

        assert_eq!(
            result.to_unified(),
            "--- v1\n+++ v3\n@@ -1,2 +1,2 @@\n A\n-B\n+C\n\\ No newline at end of file\n"
        );
    }
}
