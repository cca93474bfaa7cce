//! Planning use case: ask the planner for a plan and compile it.
//!
//! A rejected plan is sent back to the planner together with the validation
//! message, up to [`MAX_PLAN_ATTEMPTS`] times in total.

use crate::services::dispatch::{DispatchContext, OrchestrationError};
use crate::services::request_client::RequestClient;
use conductor_domain::core::string::{single_line, truncate};
use conductor_domain::{
    ExecutionPlan, OrchestrationPrompt, SessionConfiguration, SystemMessageMode, compile_plan,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub const MAX_PLAN_ATTEMPTS: usize = 3;

const PREVIEW_CHARS: usize = 240;
const SOURCE: &str = "planning";

pub struct PlanningUseCase {
    client: Arc<RequestClient>,
}

impl PlanningUseCase {
    pub fn new(client: Arc<RequestClient>) -> Self {
        Self { client }
    }

    pub async fn execute(
        &self,
        task: &str,
        ctx: &DispatchContext,
    ) -> Result<ExecutionPlan, OrchestrationError> {
        let configuration = SessionConfiguration::new(ctx.models.planner.clone())
            .with_system_message(OrchestrationPrompt::planning_system(), SystemMessageMode::Replace);
        let root = ctx.workspace_root.display().to_string();

        let mut last_error: Option<String> = None;
        let mut last_preview = String::new();

        for attempt in 1..=MAX_PLAN_ATTEMPTS {
            ctx.check_cancelled()?;
            info!("Requesting plan (attempt {}/{})", attempt, MAX_PLAN_ATTEMPTS);

            let prompt = OrchestrationPrompt::planning(task, &root, last_error.as_deref());
            let reply = self
                .client
                .complete_with(&configuration, &prompt, &ctx.cancellation)
                .await?;

            match compile_plan(&reply, &ctx.workspace_root) {
                Ok(plan) => {
                    info!("Plan accepted with {} step(s)", plan.steps().len());
                    ctx.record(
                        SOURCE,
                        "plan_accepted",
                        format!("Plan accepted on attempt {attempt}"),
                        json!({ "attempt": attempt, "steps": plan.steps().len() }),
                    );
                    return Ok(plan);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("Plan attempt {} rejected: {}", attempt, message);
                    last_preview = truncate(&single_line(&reply), PREVIEW_CHARS);
                    ctx.record(
                        SOURCE,
                        "plan_rejected",
                        message.clone(),
                        json!({ "attempt": attempt, "preview": last_preview }),
                    );
                    ctx.progress.on_plan_rejected(attempt, &message);
                    last_error = Some(message);
                }
            }
        }

        Err(OrchestrationError::PlanningFailed {
            preview: last_preview,
            message: last_error.unwrap_or_default(),
        })
    }
}
