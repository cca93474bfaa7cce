//! Plan entities: steps, iteration strategy and the execution plan.
//!
//! All values here are immutable once built. Normalization in
//! [`compiler`](super::compiler) produces new values instead of editing
//! existing ones.

use super::role::StepRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Language-scope tag meaning "the whole workspace".
pub const WORKSPACE_SCOPE: &str = "*";

/// Lower bound for [`IterationStrategy::max_iterations`].
pub const MIN_ITERATIONS: u32 = 1;
/// Upper bound for [`IterationStrategy::max_iterations`].
pub const MAX_ITERATIONS: u32 = 8;

/// Identifier of a step within one plan (positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u32);

impl StepId {
    /// Returns `None` for zero.
    pub fn new(id: u32) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of delegated work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    id: StepId,
    role: StepRole,
    objective: String,
    depends_on: BTreeSet<StepId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_scope: Option<BTreeSet<String>>,
}

impl PlanStep {
    pub fn new(
        id: StepId,
        role: StepRole,
        objective: impl Into<String>,
        depends_on: BTreeSet<StepId>,
        language_scope: Option<BTreeSet<String>>,
    ) -> Self {
        Self {
            id,
            role,
            objective: objective.into(),
            depends_on,
            language_scope,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn role(&self) -> StepRole {
        self.role
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn depends_on(&self) -> &BTreeSet<StepId> {
        &self.depends_on
    }

    pub fn language_scope(&self) -> Option<&BTreeSet<String>> {
        self.language_scope.as_ref()
    }

    /// Whether the step covers the whole workspace.
    pub fn is_workspace_wide(&self) -> bool {
        self.language_scope
            .as_ref()
            .is_none_or(|scope| scope.contains(WORKSPACE_SCOPE))
    }
}

/// How the convergence loop may iterate after the first review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StrategyRecord")]
pub struct IterationStrategy {
    max_iterations: u32,
    review_required: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrategyRecord {
    max_iterations: u32,
    review_required: bool,
}

impl From<StrategyRecord> for IterationStrategy {
    fn from(record: StrategyRecord) -> Self {
        IterationStrategy::new(record.max_iterations, record.review_required)
    }
}

impl IterationStrategy {
    /// `max_iterations` is clamped to `MIN_ITERATIONS..=MAX_ITERATIONS`.
    pub fn new(max_iterations: u32, review_required: bool) -> Self {
        Self {
            max_iterations: max_iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS),
            review_required,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn review_required(&self) -> bool {
        self.review_required
    }
}

impl Default for IterationStrategy {
    fn default() -> Self {
        Self::new(2, true)
    }
}

/// A validated, normalized graph of steps for one run.
///
/// Only [`compile_plan`](crate::compile_plan) normalizes. A deserialized plan
/// is taken as-is and may carry cycles or duplicate reviews; the scheduler
/// breaks such deadlocks by forcing the lowest pending step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
    iteration_strategy: IterationStrategy,
    completion_criteria: Vec<String>,
}

impl ExecutionPlan {
    pub(crate) fn new(
        steps: Vec<PlanStep>,
        iteration_strategy: IterationStrategy,
        completion_criteria: Vec<String>,
    ) -> Self {
        Self {
            steps,
            iteration_strategy,
            completion_criteria,
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn iteration_strategy(&self) -> &IterationStrategy {
        &self.iteration_strategy
    }

    pub fn completion_criteria(&self) -> &[String] {
        &self.completion_criteria
    }

    pub fn step(&self, id: StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// The final-review step (always last in a normalized plan).
    pub fn final_review(&self) -> Option<&PlanStep> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.role == StepRole::FinalReview)
    }

    pub fn style_review(&self) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.role == StepRole::StyleReview)
    }

    /// Render the plan as Markdown (used for run artifacts and previews).
    pub fn to_markdown(&self, task: &str) -> String {
        let mut out = String::from("# Execution Plan\n\n");
        out.push_str(&format!("- Task: {}\n", task));
        out.push_str(&format!(
            "- Iterations: up to {} (review required: {})\n\n",
            self.iteration_strategy.max_iterations,
            if self.iteration_strategy.review_required {
                "yes"
            } else {
                "no"
            }
        ));

        out.push_str("## Steps\n\n");
        for step in &self.steps {
            let deps = if step.depends_on.is_empty() {
                "none".to_string()
            } else {
                step.depends_on
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            out.push_str(&format!(
                "{}. **{}**: {} (depends on: {})\n",
                step.id, step.role, step.objective, deps
            ));
        }

        out.push_str("\n## Completion criteria\n\n");
        for criterion in &self.completion_criteria {
            out.push_str(&format!("- {}\n", criterion));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> StepId {
        StepId::new(n).unwrap()
    }

    #[test]
    fn step_id_rejects_zero() {
        assert!(StepId::new(0).is_none());
        assert_eq!(id(3).get(), 3);
    }

    #[test]
    fn iteration_strategy_is_clamped() {
        assert_eq!(IterationStrategy::new(0, true).max_iterations(), 1);
        assert_eq!(IterationStrategy::new(50, true).max_iterations(), 8);
        assert_eq!(IterationStrategy::new(4, false).max_iterations(), 4);
        assert!(!IterationStrategy::new(4, false).review_required());
    }

    #[test]
    fn deserialized_iteration_strategy_is_clamped() {
        let strategy: IterationStrategy =
            serde_json::from_str(r#"{"maxIterations": 40, "reviewRequired": false}"#).unwrap();
        assert_eq!(strategy, IterationStrategy::new(8, false));
    }

    #[test]
    fn workspace_wide_scope() {
        let wide = PlanStep::new(id(1), StepRole::Builder, "x", BTreeSet::new(), None);
        assert!(wide.is_workspace_wide());

        let scoped = PlanStep::new(
            id(2),
            StepRole::Builder,
            "x",
            BTreeSet::new(),
            Some(["rust".to_string()].into()),
        );
        assert!(!scoped.is_workspace_wide());
    }

    #[test]
    fn markdown_lists_steps_and_criteria() {
        let plan = ExecutionPlan::new(
            vec![
                PlanStep::new(id(1), StepRole::Builder, "Add form", BTreeSet::new(), None),
                PlanStep::new(id(2), StepRole::FinalReview, "Review", [id(1)].into(), None),
            ],
            IterationStrategy::default(),
            vec!["Build passes".to_string()],
        );
        let md = plan.to_markdown("Login page");
        assert!(md.contains("- Task: Login page"));
        assert!(md.contains("1. **builder**: Add form (depends on: none)"));
        assert!(md.contains("2. **final_review**: Review (depends on: 1)"));
        assert!(md.contains("- Build passes"));
    }
}
