//! Diff provider port
//!
//! Supplies the reviewers with the current workspace diff and the set of
//! changed files. The shipped adapter shells out to git.

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("Failed to run diff command: {0}")]
    Command(String),

    #[error("Workspace is not under version control: {0}")]
    NotRepository(String),
}

#[async_trait]
pub trait DiffProvider: Send + Sync {
    /// Unified diff of the workspace against its base.
    async fn diff(&self) -> Result<String, DiffError>;

    /// Workspace-relative paths of every changed or new file.
    async fn changed_files(&self) -> Result<BTreeSet<String>, DiffError>;
}

/// Provider for workspaces without version control: always empty.
pub struct NoDiffProvider;

#[async_trait]
impl DiffProvider for NoDiffProvider {
    async fn diff(&self) -> Result<String, DiffError> {
        Ok(String::new())
    }

    async fn changed_files(&self) -> Result<BTreeSet<String>, DiffError> {
        Ok(BTreeSet::new())
    }
}

/// Paths named by the `+++ b/<path>` headers of a unified diff.
///
/// Deleted files (`+++ /dev/null`) are skipped.
pub fn files_in_diff(diff: &str) -> BTreeSet<String> {
    diff.lines()
        .filter_map(|line| line.strip_prefix("+++ "))
        .filter_map(|target| target.strip_prefix("b/"))
        .map(|path| path.trim_end().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_in_diff() {
        let diff = "\
diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1 +1 @@
-old
+new
diff --git a/gone.rs b/gone.rs
--- a/gone.rs
+++ /dev/null
diff --git a/ui/app.tsx b/ui/app.tsx
--- /dev/null
+++ b/ui/app.tsx
";
        let files = files_in_diff(diff);
        assert_eq!(
            files.into_iter().collect::<Vec<_>>(),
            vec!["src/lib.rs".to_string(), "ui/app.tsx".to_string()]
        );
    }

    #[test]
    fn test_files_in_empty_diff() {
        assert!(files_in_diff("").is_empty());
    }
}
