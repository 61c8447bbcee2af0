use similar::{ChangeTag, TextDiff};
use std::fmt;
use std::path::Path;

use crate::driver::FileOutcome;

/// Line counts over one or more diffs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffStats {
    pub fn add(&mut self, other: &DiffStats) {
        self.files_changed += other.files_changed;
        self.lines_added += other.lines_added;
        self.lines_removed += other.lines_removed;
    }
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "Files changed: {}", self.files_changed)?;
        writeln!(f, "Lines added: {}", self.lines_added)?;
        write!(f, "Lines removed: {}", self.lines_removed)
    }
}

/// Unified diff of `original` → `modified` with `a/` and `b/` headers, plus
/// its stats. No hunks and zeroed stats when the texts are equal.
pub fn generate_unified_diff(
    path: &Path,
    original: &str,
    modified: &str,
    context_lines: usize,
) -> (String, DiffStats) {
    let diff = TextDiff::from_lines(original, modified);

    let mut stats = DiffStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.lines_added += 1,
            ChangeTag::Delete => stats.lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }
    if stats.lines_added > 0 || stats.lines_removed > 0 {
        stats.files_changed = 1;
    }

    let path = path.display().to_string();
    let output = diff
        .unified_diff()
        .context_radius(context_lines)
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string();

    (output, stats)
}

/// Diff of a file outcome, ready to print.
pub fn outcome_diff(outcome: &FileOutcome) -> (String, DiffStats) {
    generate_unified_diff(&outcome.path, &outcome.original, &outcome.updated, 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_generate_unified_diff() {
        let original = "from fastapi import FastAPI\n\napp = FastAPI()\n";
        let modified = "from fastapi import FastAPI\n\napp = FastAPI()\napp.include_router(widget_router)\n";
        let path = PathBuf::from("src/api/app.py");

        let (diff, stats) = generate_unified_diff(&path, original, modified, 3);

        assert!(diff.contains("--- a/src/api/app.py"));
        assert!(diff.contains("+++ b/src/api/app.py"));
        assert!(diff.contains("+app.include_router(widget_router)"));

        assert_eq!(stats.files_changed, 1);
        assert_eq!(stats.lines_added, 1);
        assert_eq!(stats.lines_removed, 0);
    }

    #[test]
    fn test_generate_unified_diff_no_changes() {
        let content = "app = FastAPI()\n";
        let (diff, stats) = generate_unified_diff(&PathBuf::from("app.py"), content, content, 3);

        assert!(!diff.contains("@@"));
        assert_eq!(stats, DiffStats::default());
    }

    #[test]
    fn test_rewritten_manifest_counts_both_sides() {
        let original = "__all__ = ['Base']\n";
        let modified = "__all__ = [\n    \"Base\",\n    \"Invoice\",\n]\n";
        let (_, stats) = generate_unified_diff(&PathBuf::from("__init__.py"), original, modified, 3);

        assert_eq!(stats.lines_removed, 1);
        assert_eq!(stats.lines_added, 4);
    }

    #[test]
    fn test_diff_stats_add_and_display() {
        let mut total = DiffStats {
            files_changed: 1,
            lines_added: 5,
            lines_removed: 2,
        };
        total.add(&DiffStats {
            files_changed: 2,
            lines_added: 3,
            lines_removed: 1,
        });

        assert_eq!(total.files_changed, 3);
        assert_eq!(total.lines_added, 8);
        assert_eq!(total.lines_removed, 3);
        assert!(total.to_string().ends_with("Lines removed: 3"));
    }
}
