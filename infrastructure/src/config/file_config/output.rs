//! Output configuration from TOML (`[output]` and `[logging]` sections)

use conductor_domain::{ConfigIssue, ConfigIssueCode, OutputMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw output configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// `patch` or `branch`
    pub mode: String,
    /// Where run directories are created; relative paths are resolved
    /// against the workspace. Defaults to `<workspace>/.conductor/runs`.
    pub runs_dir: Option<PathBuf>,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default().as_str().to_string(),
            runs_dir: None,
        }
    }
}

impl FileOutputConfig {
    pub fn parse_mode(&self) -> (OutputMode, Vec<ConfigIssue>) {
        match self.mode.parse::<OutputMode>() {
            Ok(mode) => (mode, Vec::new()),
            Err(_) => (
                OutputMode::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "output.mode".to_string(),
                        value: self.mode.clone(),
                        valid_values: vec!["patch".to_string(), "branch".to_string()],
                    },
                    format!(
                        "output.mode: unknown value '{}', falling back to 'patch'",
                        self.mode
                    ),
                )],
            ),
        }
    }
}

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// `tracing` filter directive (e.g. `info`, `conductor=debug`).
    /// Ignored when `RUST_LOG` is set or `-v` is given.
    pub level: Option<String>,
}
