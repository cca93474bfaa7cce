//! Role-based model selection.
//!
//! [`RoleModels`] decides which generation-service model serves each step
//! role, plus the planner that drafts the plan. It is a static value object;
//! per-run overrides build a new value with the `with_*` methods.

use super::role::StepRole;
use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Model per role.
///
/// ## Defaults
/// - **Planner / Frontend / Style review**: Claude Sonnet 4.6
/// - **Builder**: GPT-5.3 Codex
/// - **Final (architecture) review**: Claude Opus 4.6
///
/// # Example
///
/// ```
/// use conductor_domain::plan::RoleModels;
/// use conductor_domain::{Model, StepRole};
///
/// let models = RoleModels::default().with_builder(Model::Gpt52Codex);
/// assert_eq!(models.for_role(StepRole::Builder), &Model::Gpt52Codex);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleModels {
    pub planner: Model,
    pub frontend: Model,
    pub builder: Model,
    pub style: Model,
    pub architecture: Model,
}

impl Default for RoleModels {
    fn default() -> Self {
        Self {
            planner: Model::ClaudeSonnet46,
            frontend: Model::ClaudeSonnet46,
            builder: Model::Gpt53Codex,
            style: Model::ClaudeSonnet46,
            architecture: Model::ClaudeOpus46,
        }
    }
}

impl RoleModels {
    // ==================== Builder Methods ====================

    pub fn with_planner(mut self, model: Model) -> Self {
        self.planner = model;
        self
    }

    pub fn with_frontend(mut self, model: Model) -> Self {
        self.frontend = model;
        self
    }

    pub fn with_builder(mut self, model: Model) -> Self {
        self.builder = model;
        self
    }

    pub fn with_style(mut self, model: Model) -> Self {
        self.style = model;
        self
    }

    pub fn with_architecture(mut self, model: Model) -> Self {
        self.architecture = model;
        self
    }

    // ==================== Lookup ====================

    pub fn for_role(&self, role: StepRole) -> &Model {
        match role {
            StepRole::Frontend => &self.frontend,
            StepRole::Builder => &self.builder,
            StepRole::StyleReview => &self.style,
            StepRole::FinalReview => &self.architecture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_role_strengths() {
        let models = RoleModels::default();
        assert_eq!(models.for_role(StepRole::Frontend), &Model::ClaudeSonnet46);
        assert_eq!(models.for_role(StepRole::Builder), &Model::Gpt53Codex);
        assert_eq!(models.for_role(StepRole::FinalReview), &Model::ClaudeOpus46);
        assert_eq!(models.planner, Model::ClaudeSonnet46);
    }

    #[test]
    fn overrides_replace_single_role() {
        let models = RoleModels::default()
            .with_architecture(Model::Gpt5Mini)
            .with_style(Model::ClaudeHaiku45);
        assert_eq!(models.for_role(StepRole::FinalReview), &Model::Gpt5Mini);
        assert_eq!(models.for_role(StepRole::StyleReview), &Model::ClaudeHaiku45);
        assert_eq!(models.for_role(StepRole::Builder), &Model::Gpt53Codex);
    }
}
