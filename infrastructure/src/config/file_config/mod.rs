//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! String-typed enum fields are parsed (with issues collected) by the
//! `parse_*` / `to_*` methods instead of failing deserialization.

mod execution;
mod models;
mod orchestration;
mod output;

pub use execution::{FileRequestConfig, FileSessionConfig};
pub use models::FileModelsConfig;
pub use orchestration::FileOrchestrationConfig;
pub use output::{FileLoggingConfig, FileOutputConfig};

use conductor_domain::ConfigIssue;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Role-based model selection
    pub models: FileModelsConfig,
    /// Workflow and convergence-loop settings
    pub orchestration: FileOrchestrationConfig,
    /// Size bounds and retry policy
    pub request: FileRequestConfig,
    /// Session timeouts and Copilot CLI settings
    pub session: FileSessionConfig,
    /// Run artifact settings
    pub output: FileOutputConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks empty model names, unknown enum values, out-of-range
    /// iteration overrides and request bounds.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.models.to_role_models().1);

        issues.extend(self.orchestration.parse_workflow().1);
        issues.extend(self.orchestration.parse_max_iterations().1);
        issues.extend(self.orchestration.to_loop_params().1);

        issues.extend(self.request.validate());
        issues.extend(self.output.parse_mode().1);

        issues
    }
}
