//! Type definitions for the RunOrchestration use case.

use crate::config::LoopParams;
use crate::services::request_client::UsageSnapshot;
use conductor_domain::{ExecutionPlan, IterationStrategy, Review, RoleModels, StepId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Which pipeline a run follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Workflow {
    /// Plan, execute every step, then converge on the final review.
    #[default]
    Feature,
    /// One final review of the current diff; no planning, no loop.
    ReviewOnly,
}

impl Workflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Workflow::Feature => "feature",
            Workflow::ReviewOnly => "review-only",
        }
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "feature" => Ok(Workflow::Feature),
            "review-only" | "review" => Ok(Workflow::ReviewOnly),
            other => Err(format!("unknown workflow: {other}")),
        }
    }
}

/// Input for the RunOrchestration use case
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub task: String,
    pub workspace_root: PathBuf,
    pub workflow: Workflow,
    pub models: RoleModels,
    pub loop_params: LoopParams,
    /// Replaces the planner's `maxIterations` when set.
    pub max_iterations: Option<u32>,
    /// Replaces the planner's `reviewRequired` when set.
    pub review_required: Option<bool>,
}

impl RunRequest {
    pub fn new(task: impl Into<String>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            task: task.into(),
            workspace_root: workspace_root.into(),
            workflow: Workflow::default(),
            models: RoleModels::default(),
            loop_params: LoopParams::default(),
            max_iterations: None,
            review_required: None,
        }
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn with_models(mut self, models: RoleModels) -> Self {
        self.models = models;
        self
    }

    pub fn with_loop_params(mut self, params: LoopParams) -> Self {
        self.loop_params = params;
        self
    }

    pub fn with_max_iterations(mut self, max: Option<u32>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_review_required(mut self, required: Option<bool>) -> Self {
        self.review_required = required;
        self
    }

    /// The plan's strategy with this request's overrides applied.
    pub fn iteration_strategy(&self, planned: &IterationStrategy) -> IterationStrategy {
        IterationStrategy::new(
            self.max_iterations.unwrap_or(planned.max_iterations()),
            self.review_required.unwrap_or(planned.review_required()),
        )
    }
}

/// Output from the RunOrchestration use case
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub workflow: Workflow,
    /// `None` for review-only runs.
    pub plan: Option<ExecutionPlan>,
    pub review: Review,
    pub touched_files: BTreeSet<String>,
    pub iterations: u32,
    pub forced_steps: Vec<StepId>,
    pub usage: BTreeMap<String, UsageSnapshot>,
    /// Workspace diff at the end of the run.
    pub diff: Option<String>,
}
