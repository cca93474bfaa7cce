//! Role-based model configuration from TOML (`[models]` section)

use conductor_domain::{ConfigIssue, ConfigIssueCode, Model, RoleModels};
use serde::{Deserialize, Serialize};

/// Role-based model configuration from TOML
///
/// Unset fields keep the [`RoleModels`] defaults.
///
/// # Example
///
/// ```toml
/// [models]
/// planner = "claude-sonnet-4.6"
/// frontend = "claude-sonnet-4.6"
/// builder = "gpt-5.3-codex"
/// style = "claude-sonnet-4.6"
/// architecture = "claude-opus-4.6"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    /// Model that drafts the plan
    pub planner: Option<String>,
    /// Model for frontend steps
    pub frontend: Option<String>,
    /// Model for builder steps and remediation
    pub builder: Option<String>,
    /// Model for the style review
    pub style: Option<String>,
    /// Model for the final (architecture) review
    pub architecture: Option<String>,
}

impl FileModelsConfig {
    /// Parse a single model string, collecting issues for empty names.
    fn parse_single_model(field: &str, value: Option<&String>) -> (Option<Model>, Vec<ConfigIssue>) {
        match value {
            None => (None, Vec::new()),
            Some(s) if s.trim().is_empty() => (
                None,
                vec![ConfigIssue::error(
                    ConfigIssueCode::EmptyModelName {
                        field: field.to_string(),
                    },
                    format!("models.{}: model name cannot be empty", field),
                )],
            ),
            Some(s) => {
                // Unknown names become Model::Custom
                let Ok(model) = s.parse::<Model>();
                (Some(model), Vec::new())
            }
        }
    }

    /// Overlay the configured models on the defaults.
    pub fn to_role_models(&self) -> (RoleModels, Vec<ConfigIssue>) {
        let mut models = RoleModels::default();
        let mut issues = Vec::new();

        let fields: [(&str, Option<&String>, &mut Model); 5] = [
            ("planner", self.planner.as_ref(), &mut models.planner),
            ("frontend", self.frontend.as_ref(), &mut models.frontend),
            ("builder", self.builder.as_ref(), &mut models.builder),
            ("style", self.style.as_ref(), &mut models.style),
            ("architecture", self.architecture.as_ref(), &mut models.architecture),
        ];
        for (field, value, slot) in fields {
            let (parsed, found) = Self::parse_single_model(field, value);
            if let Some(model) = parsed {
                *slot = model;
            }
            issues.extend(found);
        }

        (models, issues)
    }
}
