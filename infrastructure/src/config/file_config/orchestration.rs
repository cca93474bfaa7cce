//! Orchestration configuration from TOML (`[orchestration]` section)

use conductor_application::{LoopParams, SnapshotMode, Workflow};
use conductor_domain::{ConfigIssue, ConfigIssueCode, MAX_ITERATIONS, MIN_ITERATIONS, StepRole};
use serde::{Deserialize, Serialize};

/// Raw orchestration configuration from TOML
///
/// # Example
///
/// ```toml
/// [orchestration]
/// workflow = "feature"        # or "review-only"
/// max_iterations = 3          # overrides the planner's value
/// review_required = true
/// style_pass = true
/// remediation = "builder"     # "frontend", or "none" to only re-review
/// snapshot_mode = "diff"      # or "full"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOrchestrationConfig {
    pub workflow: String,
    pub max_iterations: Option<u32>,
    pub review_required: Option<bool>,
    pub style_pass: bool,
    pub remediation: String,
    pub snapshot_mode: String,
}

impl Default for FileOrchestrationConfig {
    fn default() -> Self {
        Self {
            workflow: Workflow::default().as_str().to_string(),
            max_iterations: None,
            review_required: None,
            style_pass: true,
            remediation: StepRole::Builder.as_str().to_string(),
            snapshot_mode: "diff".to_string(),
        }
    }
}

fn invalid_value(field: &str, value: &str, valid: &[&str], fallback: &str) -> ConfigIssue {
    ConfigIssue::warning(
        ConfigIssueCode::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
            valid_values: valid.iter().map(|v| v.to_string()).collect(),
        },
        format!(
            "{}: unknown value '{}', falling back to '{}'",
            field, value, fallback
        ),
    )
}

impl FileOrchestrationConfig {
    pub fn parse_workflow(&self) -> (Workflow, Vec<ConfigIssue>) {
        match self.workflow.parse::<Workflow>() {
            Ok(workflow) => (workflow, Vec::new()),
            Err(_) => (
                Workflow::default(),
                vec![invalid_value(
                    "orchestration.workflow",
                    &self.workflow,
                    &["feature", "review-only"],
                    "feature",
                )],
            ),
        }
    }

    /// The remediation role: a mutating role, or `None` for `"none"`.
    pub fn parse_remediation(&self) -> (Option<StepRole>, Vec<ConfigIssue>) {
        let value = self.remediation.trim();
        if value.eq_ignore_ascii_case("none") || value.is_empty() {
            return (None, Vec::new());
        }
        match StepRole::from_synonym(value) {
            Some(role) if role.is_mutating() => (Some(role), Vec::new()),
            _ => (
                Some(StepRole::Builder),
                vec![invalid_value(
                    "orchestration.remediation",
                    value,
                    &["builder", "frontend", "none"],
                    "builder",
                )],
            ),
        }
    }

    pub fn parse_snapshot_mode(&self) -> (SnapshotMode, Vec<ConfigIssue>) {
        match self.snapshot_mode.parse::<SnapshotMode>() {
            Ok(mode) => (mode, Vec::new()),
            Err(_) => (
                SnapshotMode::default(),
                vec![invalid_value(
                    "orchestration.snapshot_mode",
                    &self.snapshot_mode,
                    &["diff", "full"],
                    "diff",
                )],
            ),
        }
    }

    /// The iteration override, clamped into the supported range.
    pub fn parse_max_iterations(&self) -> (Option<u32>, Vec<ConfigIssue>) {
        let Some(value) = self.max_iterations else {
            return (None, Vec::new());
        };
        let applied = value.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
        let mut issues = Vec::new();
        if applied != value {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "orchestration.max_iterations".to_string(),
                    value: i64::from(value),
                    applied: i64::from(applied),
                },
                format!(
                    "orchestration.max_iterations: {} is outside {}..={}, using {}",
                    value, MIN_ITERATIONS, MAX_ITERATIONS, applied
                ),
            ));
        }
        (Some(applied), issues)
    }

    pub fn to_loop_params(&self) -> (LoopParams, Vec<ConfigIssue>) {
        let (remediation, mut issues) = self.parse_remediation();
        let (snapshot_mode, found) = self.parse_snapshot_mode();
        issues.extend(found);

        let params = LoopParams::default()
            .with_remediation_role(remediation)
            .with_style_pass(self.style_pass)
            .with_snapshot_mode(snapshot_mode);
        (params, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_loop_defaults() {
        let config = FileOrchestrationConfig::default();
        let (params, issues) = config.to_loop_params();
        assert_eq!(params, LoopParams::default());
        assert!(issues.is_empty());
        assert_eq!(config.parse_workflow().0, Workflow::Feature);
    }

    #[test]
    fn test_remediation_none_and_synonyms() {
        let mut config = FileOrchestrationConfig {
            remediation: "None".into(),
            ..Default::default()
        };
        assert_eq!(config.parse_remediation().0, None);

        config.remediation = "frontend agent".into();
        assert_eq!(config.parse_remediation().0, Some(StepRole::Frontend));

        // Review roles cannot remediate.
        config.remediation = "architect".into();
        let (role, issues) = config.parse_remediation();
        assert_eq!(role, Some(StepRole::Builder));
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_max_iterations_is_clamped_with_warning() {
        let config = FileOrchestrationConfig {
            max_iterations: Some(20),
            ..Default::default()
        };
        let (value, issues) = config.parse_max_iterations();
        assert_eq!(value, Some(MAX_ITERATIONS));
        assert!(matches!(
            issues[0].code,
            ConfigIssueCode::OutOfRange { applied: 8, .. }
        ));

        let zero = FileOrchestrationConfig {
            max_iterations: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.parse_max_iterations().0, Some(MIN_ITERATIONS));
    }

    #[test]
    fn test_review_only_workflow() {
        let config = FileOrchestrationConfig {
            workflow: "review_only".into(),
            ..Default::default()
        };
        assert_eq!(config.parse_workflow(), (Workflow::ReviewOnly, Vec::new()));

        let bad = FileOrchestrationConfig {
            workflow: "hotfix".into(),
            ..Default::default()
        };
        let (workflow, issues) = bad.parse_workflow();
        assert_eq!(workflow, Workflow::Feature);
        assert_eq!(issues.len(), 1);
    }
}
