//! Run Orchestration use case
//!
//! Drives one run from task text to final review.
//!
//! | Phase                 | Feature | ReviewOnly |
//! |-----------------------|---------|------------|
//! | 1. Planning           | yes     | skip       |
//! | 2. Step execution     | yes     | skip       |
//! | 3. Final review       | (plan)  | yes        |
//! | 4. Convergence loop   | yes     | skip       |

mod types;

pub use crate::services::dispatch::OrchestrationError;
pub use types::{RunReport, RunRequest, Workflow};

use crate::ports::diff_provider::{DiffProvider, NoDiffProvider};
use crate::ports::event_sink::{EventSink, NoEventSink};
use crate::ports::progress::{NoProgress, OrchestrationProgress};
use crate::ports::prompt_builder::{PromptBuilder, TemplatePromptBuilder};
use crate::ports::role_handler::RoleHandlers;
use crate::services::convergence::ConvergenceLoop;
use crate::services::dispatch::DispatchContext;
use crate::services::request_client::RequestClient;
use crate::services::scheduler::StepScheduler;
use crate::use_cases::planning::PlanningUseCase;
use conductor_domain::core::string::{single_line, truncate};
use conductor_domain::plan::DEFAULT_FINAL_OBJECTIVE;
use conductor_domain::{DomainError, StepRole};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SOURCE: &str = "orchestrator";

/// Process-scoped collaborators, shared by every run.
#[derive(Clone)]
pub struct OrchestratorContext {
    pub client: Arc<RequestClient>,
    pub handlers: RoleHandlers,
    pub diff: Arc<dyn DiffProvider>,
    pub events: Arc<dyn EventSink>,
    pub prompts: Arc<dyn PromptBuilder>,
}

impl OrchestratorContext {
    pub fn new(client: Arc<RequestClient>, handlers: RoleHandlers) -> Self {
        Self {
            client,
            handlers,
            diff: Arc::new(NoDiffProvider),
            events: Arc::new(NoEventSink),
            prompts: Arc::new(TemplatePromptBuilder),
        }
    }

    pub fn with_diff_provider(mut self, diff: Arc<dyn DiffProvider>) -> Self {
        self.diff = diff;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }
}

/// Use case for running one orchestration
pub struct RunOrchestrationUseCase {
    orchestrator: OrchestratorContext,
    progress: Arc<dyn OrchestrationProgress>,
    cancellation_token: CancellationToken,
}

impl RunOrchestrationUseCase {
    pub fn new(orchestrator: OrchestratorContext) -> Self {
        Self {
            orchestrator,
            progress: Arc::new(NoProgress),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn OrchestrationProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub async fn execute(
        &self,
        request: RunRequest,
        run_id: impl Into<String>,
    ) -> Result<RunReport, OrchestrationError> {
        let run_id = run_id.into();
        if !request.workspace_root.is_dir() {
            return Err(DomainError::InvalidWorkspace(
                request.workspace_root.display().to_string(),
            )
            .into());
        }

        let ctx = DispatchContext {
            run_id: run_id.clone(),
            workspace_root: request.workspace_root.clone(),
            models: request.models.clone(),
            handlers: self.orchestrator.handlers.clone(),
            diff: self.orchestrator.diff.clone(),
            events: self.orchestrator.events.clone(),
            progress: self.progress.clone(),
            prompts: self.orchestrator.prompts.clone(),
            loop_params: request.loop_params.clone(),
            cancellation: self.cancellation_token.clone(),
        };

        info!("Run {} started ({} workflow)", run_id, request.workflow);
        self.progress.on_run_start(&request.task);
        ctx.record(
            SOURCE,
            "run_start",
            truncate(&single_line(&request.task), 200),
            json!({
                "workflow": request.workflow.as_str(),
                "workspaceRoot": request.workspace_root.display().to_string(),
            }),
        );

        let mut report = match request.workflow {
            Workflow::Feature => self.run_feature(&request, &ctx).await?,
            Workflow::ReviewOnly => self.run_review_only(&request, &ctx).await?,
        };
        report.usage = self.orchestrator.client.usage().snapshot();
        report.diff = ctx.current_diff().await;

        info!("Run {} finished: {}", run_id, report.review.summary_line());
        ctx.record(
            SOURCE,
            "run_complete",
            report.review.summary_line(),
            json!({
                "status": report.review.status().as_str(),
                "iterations": report.iterations,
                "touchedFiles": report.touched_files.len(),
            }),
        );
        self.progress.on_run_complete(&report.review);
        Ok(report)
    }

    async fn run_feature(
        &self,
        request: &RunRequest,
        ctx: &DispatchContext,
    ) -> Result<RunReport, OrchestrationError> {
        let plan = PlanningUseCase::new(self.orchestrator.client.clone())
            .execute(&request.task, ctx)
            .await?;
        let strategy = request.iteration_strategy(plan.iteration_strategy());
        self.progress.on_plan_ready(&plan);

        let outcome = StepScheduler::new().execute(&plan, ctx).await?;
        let converged = ConvergenceLoop::for_plan(&plan)
            .run(
                &strategy,
                plan.completion_criteria(),
                outcome.review,
                outcome.touched_files,
                ctx,
            )
            .await?;

        Ok(RunReport {
            run_id: ctx.run_id.clone(),
            workflow: Workflow::Feature,
            plan: Some(plan),
            review: converged.review,
            touched_files: converged.touched_files,
            iterations: converged.iterations,
            forced_steps: outcome.forced_steps,
            usage: Default::default(),
            diff: None,
        })
    }

    async fn run_review_only(
        &self,
        request: &RunRequest,
        ctx: &DispatchContext,
    ) -> Result<RunReport, OrchestrationError> {
        ctx.check_cancelled()?;

        let touched_files = match ctx.diff.changed_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not enumerate changed files: {}", e);
                Default::default()
            }
        };
        let objective = if request.task.trim().is_empty() {
            DEFAULT_FINAL_OBJECTIVE.to_string()
        } else {
            format!("{}\n\nFocus: {}", DEFAULT_FINAL_OBJECTIVE, request.task.trim())
        };

        let invocation = ctx
            .invocation(StepRole::FinalReview, objective)
            .with_touched_files(touched_files.clone())
            .with_diff(ctx.current_diff().await);
        let review = ctx.dispatch_review(SOURCE, &invocation).await?;

        Ok(RunReport {
            run_id: ctx.run_id.clone(),
            workflow: Workflow::ReviewOnly,
            plan: None,
            review,
            touched_files,
            iterations: 0,
            forced_steps: Vec::new(),
            usage: Default::default(),
            diff: None,
        })
    }
}
