//! Run artifacts: the per-run output directory.
//!
//! ```text
//! <workspace>/.conductor/runs/<YYYYMMDDTHHMMSSZ>/
//! ├── plan.md            # compiled plan (feature runs)
//! ├── review.json        # final review
//! ├── run-log.json       # workflow, prompt hash, models, status, usage
//! ├── final-summary.md   # changed files and review outcome
//! ├── changes.patch      # workspace diff at the end of the run
//! ├── branch-note.txt    # output mode `branch` only
//! ├── events.jsonl       # written by JsonlEventSink
//! └── conductor.log      # tracing file layer
//! ```

use crate::logging::EVENTS_FILE;
use chrono::{DateTime, Utc};
use conductor_application::{RunReport, UsageSnapshot, Workflow};
use conductor_domain::{OutputMode, RoleModels, Severity};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default location of run directories, relative to the workspace.
pub const DEFAULT_RUNS_DIR: &str = ".conductor/runs";

const LOG_FILE: &str = "conductor.log";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize {0}: {1}")]
    Serialize(&'static str, #[source] serde_json::Error),
}

/// Terminal status recorded in `run-log.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contents of `run-log.json`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLog {
    pub run_id: String,
    pub workflow: &'static str,
    /// SHA-256 of the task text, hex encoded.
    pub prompt_hash: String,
    pub models: RoleModels,
    pub output_mode: OutputMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub iterations: u32,
    pub review_status: Option<&'static str>,
    pub usage: BTreeMap<String, UsageSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunLog {
    /// A log for a run that has not finished yet (status `failed` until
    /// one of the completion methods is called).
    pub fn start(
        run_id: impl Into<String>,
        workflow: Workflow,
        task: &str,
        models: RoleModels,
        output_mode: OutputMode,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            workflow: workflow.as_str(),
            prompt_hash: prompt_hash(task),
            models,
            output_mode,
            status: RunStatus::Failed,
            started_at: Utc::now(),
            finished_at: None,
            iterations: 0,
            review_status: None,
            usage: BTreeMap::new(),
            error: None,
        }
    }

    pub fn completed(mut self, report: &RunReport) -> Self {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.iterations = report.iterations;
        self.review_status = Some(report.review.status().as_str());
        self.usage = report.usage.clone();
        self
    }

    pub fn cancelled(mut self, usage: BTreeMap<String, UsageSnapshot>) -> Self {
        self.status = RunStatus::Cancelled;
        self.finished_at = Some(Utc::now());
        self.usage = usage;
        self
    }

    pub fn failed(mut self, error: impl Into<String>, usage: BTreeMap<String, UsageSnapshot>) -> Self {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.into());
        self.usage = usage;
        self
    }
}

/// Hex SHA-256 of the task text.
pub fn prompt_hash(task: &str) -> String {
    Sha256::digest(task.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        })
}

/// Writer for one run directory.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    run_id: String,
    run_dir: PathBuf,
}

impl RunArtifacts {
    /// Create a fresh run directory.
    ///
    /// `runs_dir` defaults to `<workspace>/.conductor/runs`; a relative
    /// `runs_dir` is resolved against the workspace.
    pub fn create(workspace_root: &Path, runs_dir: Option<&Path>) -> Result<Self, ArtifactError> {
        let base = match runs_dir {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => workspace_root.join(dir),
            None => workspace_root.join(DEFAULT_RUNS_DIR),
        };
        Self::create_at(&base, Utc::now())
    }

    /// Create `<base>/<stamp>`, suffixing `-2`, `-3`, ... when a run with the
    /// same stamp already exists.
    pub fn create_at(base: &Path, now: DateTime<Utc>) -> Result<Self, ArtifactError> {
        std::fs::create_dir_all(base).map_err(|source| ArtifactError::Io {
            path: base.to_path_buf(),
            source,
        })?;

        let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let mut run_id = stamp.clone();
        let mut suffix = 1;
        loop {
            let run_dir = base.join(&run_id);
            match std::fs::create_dir(&run_dir) {
                Ok(()) => {
                    debug!("Created run directory {}", run_dir.display());
                    return Ok(Self { run_id, run_dir });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                    run_id = format!("{}-{}", stamp, suffix);
                }
                Err(source) => {
                    return Err(ArtifactError::Io {
                        path: run_dir,
                        source,
                    });
                }
            }
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn events_path(&self) -> PathBuf {
        self.run_dir.join(EVENTS_FILE)
    }

    pub fn log_file_name(&self) -> &'static str {
        LOG_FILE
    }

    fn write(&self, name: &str, contents: &str) -> Result<PathBuf, ArtifactError> {
        let path = self.run_dir.join(name);
        std::fs::write(&path, contents).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, name: &'static str, value: &T) -> Result<PathBuf, ArtifactError> {
        let json =
            serde_json::to_string_pretty(value).map_err(|e| ArtifactError::Serialize(name, e))?;
        self.write(name, &json)
    }

    // ==================== Artifacts ====================

    pub fn write_run_log(&self, log: &RunLog) -> Result<PathBuf, ArtifactError> {
        self.write_json("run-log.json", log)
    }

    /// Write every report-derived artifact.
    pub fn write_report(
        &self,
        task: &str,
        report: &RunReport,
        mode: OutputMode,
    ) -> Result<(), ArtifactError> {
        if let Some(plan) = &report.plan {
            self.write("plan.md", &plan.to_markdown(task))?;
        }
        self.write_json("review.json", &report.review)?;
        self.write("final-summary.md", &final_summary(task, report))?;
        if let Some(diff) = report.diff.as_deref().filter(|d| !d.trim().is_empty()) {
            self.write("changes.patch", diff)?;
        }
        if mode == OutputMode::Branch {
            self.write("branch-note.txt", &branch_note(&self.run_id, report))?;
        }
        Ok(())
    }
}

/// Markdown summary of a finished run.
pub fn final_summary(task: &str, report: &RunReport) -> String {
    let mut out = String::from("# Run Summary\n\n");
    let _ = writeln!(out, "- Run: {}", report.run_id);
    let _ = writeln!(out, "- Workflow: {}", report.workflow);
    let _ = writeln!(out, "- Task: {}", task.trim());
    let _ = writeln!(out, "- Review status: {}", report.review.status());
    let _ = writeln!(out, "- Iterations: {}", report.iterations);
    let _ = writeln!(
        out,
        "- Unresolved high-severity findings: {}",
        report.review.count(Severity::High)
    );
    if !report.forced_steps.is_empty() {
        let forced: Vec<String> = report.forced_steps.iter().map(|s| s.to_string()).collect();
        let _ = writeln!(out, "- Forced past unmet dependencies: {}", forced.join(", "));
    }

    out.push_str("\n## Changed files\n\n");
    if report.touched_files.is_empty() {
        out.push_str("(none)\n");
    }
    for file in &report.touched_files {
        let _ = writeln!(out, "- {}", file);
    }

    if !report.review.findings().is_empty() {
        out.push_str("\n## Open findings\n\n");
        for finding in report.review.findings() {
            let location = finding
                .location()
                .map(|l| format!(" ({})", l))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- [{}] {}{}: {}",
                finding.severity, finding.rule, location, finding.rationale
            );
        }
    }

    if !report.review.required_actions().is_empty() {
        out.push_str("\n## Required actions\n\n");
        for action in report.review.required_actions() {
            let _ = writeln!(out, "- {}", action);
        }
    }
    out
}

fn branch_note(run_id: &str, report: &RunReport) -> String {
    let branch = format!("conductor/{}", run_id.to_lowercase());
    let mut out = String::new();
    let _ = writeln!(out, "Suggested branch: {}", branch);
    let _ = writeln!(out, "Review status: {}", report.review.status());
    out.push('\n');
    let _ = writeln!(out, "git switch -c {}", branch);
    if !report.touched_files.is_empty() {
        let files: Vec<&str> = report.touched_files.iter().map(String::as_str).collect();
        let _ = writeln!(out, "git add -- {}", files.join(" "));
    }
    let _ = writeln!(out, "git commit -m \"conductor run {}\"", run_id);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use conductor_domain::{Finding, Review};
    use std::collections::BTreeSet;

    fn report(review: Review) -> RunReport {
        RunReport {
            run_id: "20260101T120000Z".to_string(),
            workflow: Workflow::ReviewOnly,
            plan: None,
            review,
            touched_files: BTreeSet::from(["src/lib.rs".to_string()]),
            iterations: 2,
            forced_steps: Vec::new(),
            usage: BTreeMap::from([(
                "gpt-5.3-codex".to_string(),
                UsageSnapshot {
                    calls: 3,
                    prompt_chars: 100,
                    response_chars: 40,
                },
            )]),
            diff: Some("+++ b/src/lib.rs\n+fn new() {}\n".to_string()),
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_prompt_hash() {
        assert_eq!(
            prompt_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_run_dir_named_by_stamp_with_collision_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunArtifacts::create_at(dir.path(), stamp()).unwrap();
        let second = RunArtifacts::create_at(dir.path(), stamp()).unwrap();

        assert_eq!(first.run_id(), "20260101T120000Z");
        assert_eq!(second.run_id(), "20260101T120000Z-2");
        assert!(second.run_dir().is_dir());
        assert_eq!(first.events_path(), first.run_dir().join("events.jsonl"));
    }

    #[test]
    fn test_relative_runs_dir_resolves_against_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = RunArtifacts::create(dir.path(), Some(Path::new("out"))).unwrap();
        assert!(artifacts.run_dir().starts_with(dir.path().join("out")));

        let default = RunArtifacts::create(dir.path(), None).unwrap();
        assert!(default.run_dir().starts_with(dir.path().join(".conductor/runs")));
    }

    #[test]
    fn test_write_report_in_branch_mode() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = RunArtifacts::create_at(dir.path(), stamp()).unwrap();
        let review = Review::new(
            vec![Finding::new(Severity::High, "layering", "UI calls the database").with_file("ui/app.tsx")],
            vec!["Move queries behind a service".to_string()],
        );

        artifacts
            .write_report("Add a parser", &report(review), OutputMode::Branch)
            .unwrap();

        let run_dir = artifacts.run_dir();
        assert!(!run_dir.join("plan.md").exists());
        let review_json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("review.json")).unwrap())
                .unwrap();
        assert_eq!(review_json["requiredActions"][0], "Move queries behind a service");

        let summary = std::fs::read_to_string(run_dir.join("final-summary.md")).unwrap();
        assert!(summary.contains("- src/lib.rs"));
        assert!(summary.contains("Unresolved high-severity findings: 1"));
        assert!(summary.contains("ui/app.tsx"));

        assert!(run_dir.join("changes.patch").exists());
        let note = std::fs::read_to_string(run_dir.join("branch-note.txt")).unwrap();
        assert!(note.contains("git switch -c conductor/20260101t120000z"));
    }

    #[test]
    fn test_patch_mode_skips_branch_note_and_empty_diff() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = RunArtifacts::create_at(dir.path(), stamp()).unwrap();
        let mut run = report(Review::default());
        run.diff = Some(String::new());

        artifacts.write_report("task", &run, OutputMode::Patch).unwrap();

        assert!(!artifacts.run_dir().join("branch-note.txt").exists());
        assert!(!artifacts.run_dir().join("changes.patch").exists());
    }

    #[test]
    fn test_run_log_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = RunArtifacts::create_at(dir.path(), stamp()).unwrap();
        let start = || {
            RunLog::start(
                artifacts.run_id(),
                Workflow::Feature,
                "abc",
                RoleModels::default(),
                OutputMode::Patch,
            )
        };

        let completed = start().completed(&report(Review::default()));
        artifacts.write_run_log(&completed).unwrap();
        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(artifacts.run_dir().join("run-log.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["workflow"], "feature");
        assert_eq!(json["iterations"], 2);
        assert_eq!(json["usage"]["gpt-5.3-codex"]["calls"], 3);
        assert_eq!(json["promptHash"], prompt_hash("abc"));
        assert!(json.get("error").is_none());

        let cancelled = start().cancelled(BTreeMap::new());
        assert_eq!(cancelled.status, RunStatus::Cancelled);

        let failed = start().failed("boom", BTreeMap::new());
        assert_eq!(failed.status.as_str(), "failed");
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
