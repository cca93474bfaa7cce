//! Git diff provider using the `git` CLI.
//!
//! `diff()` runs `git diff`; `changed_files()` merges `git diff --name-only`
//! with the untracked files from `git ls-files --others --exclude-standard`.

use async_trait::async_trait;
use conductor_application::{DiffError, DiffProvider};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Run state written into the workspace; never reported as a change.
const STATE_DIR_PREFIX: &str = ".conductor/";

/// Diff provider backed by the `git` CLI.
///
/// Created via `try_new()` which validates that `git` is installed and the
/// workspace is inside a work tree. If either check fails, `try_new()`
/// returns `None` and the caller falls back to `NoDiffProvider`.
pub struct GitDiffProvider {
    workspace_root: PathBuf,
}

impl GitDiffProvider {
    pub async fn try_new(workspace_root: impl Into<PathBuf>) -> Option<Self> {
        let workspace_root = workspace_root.into();

        if which::which("git").is_err() {
            debug!("git not found, workspace diffs disabled");
            return None;
        }

        let inside = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&workspace_root)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;
        match inside {
            Ok(status) if status.success() => {
                info!("Git diff provider initialized for {}", workspace_root.display());
                Some(Self { workspace_root })
            }
            _ => {
                debug!(
                    "{} is not a git work tree, workspace diffs disabled",
                    workspace_root.display()
                );
                None
            }
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Run `git <args>` in the workspace and return stdout.
    async fn git(&self, args: &[&str]) -> Result<String, DiffError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workspace_root)
            .output()
            .await
            .map_err(|e| DiffError::Command(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!("git {} failed: {}", args.join(" "), stderr.trim());
            return Err(if stderr.contains("not a git repository") {
                DiffError::NotRepository(message)
            } else {
                DiffError::Command(message)
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn path_lines(output: &str) -> impl Iterator<Item = String> + '_ {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(STATE_DIR_PREFIX))
        .map(str::to_string)
}

#[async_trait]
impl DiffProvider for GitDiffProvider {
    async fn diff(&self) -> Result<String, DiffError> {
        self.git(&["diff"]).await
    }

    async fn changed_files(&self) -> Result<BTreeSet<String>, DiffError> {
        let tracked = self.git(&["diff", "--name-only"]).await?;
        let untracked = self
            .git(&["ls-files", "--others", "--exclude-standard"])
            .await?;

        let files: BTreeSet<String> = path_lines(&tracked).chain(path_lines(&untracked)).collect();
        debug!("{} changed file(s) in workspace", files.len());
        Ok(files)
    }
}
