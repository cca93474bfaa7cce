//! Run-scoped dispatch context.
//!
//! Everything a single orchestration run needs to dispatch steps: the
//! role→handler table, collaborators behind ports, loop parameters and the
//! run's cancellation token. Built once per run by the use case and borrowed
//! by the scheduler and the convergence loop.

use crate::config::LoopParams;
use crate::ports::diff_provider::DiffProvider;
use crate::ports::event_sink::{EventSink, RunEvent};
use crate::ports::progress::OrchestrationProgress;
use crate::ports::prompt_builder::PromptBuilder;
use crate::ports::role_handler::{RoleHandlers, RoleInvocation, RoleOutput, StageError};
use crate::services::request_client::RequestError;
use conductor_domain::{DomainError, OutputParseError, Review, RoleModels, StepId, StepRole};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Errors that end an orchestration run
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Planning failed: {message} (last response: \"{preview}\")")]
    PlanningFailed { preview: String, message: String },

    #[error("{role} step {} returned unparseable output: {source}", step_label(.step_id))]
    StageParse {
        role: StepRole,
        step_id: Option<StepId>,
        source: OutputParseError,
    },

    #[error("{role} step {} failed: {source}", step_label(.step_id))]
    StageFailed {
        role: StepRole,
        step_id: Option<StepId>,
        source: StageError,
    },

    #[error("No handler registered for role {0}")]
    UnhandledRole(StepRole),

    #[error("Generation request failed: {0}")]
    Request(#[source] RequestError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl OrchestrationError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestrationError::Cancelled)
    }
}

impl From<RequestError> for OrchestrationError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Cancelled => OrchestrationError::Cancelled,
            other => OrchestrationError::Request(other),
        }
    }
}

fn step_label(step_id: &Option<StepId>) -> String {
    step_id.map_or_else(|| "(loop)".to_string(), |id| format!("#{id}"))
}

/// Run-scoped collaborators shared by the scheduler and the convergence loop.
pub struct DispatchContext {
    pub run_id: String,
    pub workspace_root: PathBuf,
    pub models: RoleModels,
    pub handlers: RoleHandlers,
    pub diff: Arc<dyn DiffProvider>,
    pub events: Arc<dyn EventSink>,
    pub progress: Arc<dyn OrchestrationProgress>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub loop_params: LoopParams,
    pub cancellation: CancellationToken,
}

impl DispatchContext {
    /// A fresh invocation for `role` rooted at the run's workspace.
    pub fn invocation(&self, role: StepRole, objective: impl Into<String>) -> RoleInvocation {
        RoleInvocation::new(role, objective, self.workspace_root.clone(), self.models.clone())
    }

    pub fn has_handler(&self, role: StepRole) -> bool {
        self.handlers.get(role).is_some()
    }

    pub fn check_cancelled(&self) -> Result<(), OrchestrationError> {
        if self.cancellation.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        Ok(())
    }

    pub fn record(
        &self,
        source: &'static str,
        event_type: &'static str,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) {
        self.events.record(
            RunEvent::new(self.run_id.clone(), source, event_type, message).with_payload(payload),
        );
    }

    /// Current workspace diff, or `None` when empty or unavailable.
    pub async fn current_diff(&self) -> Option<String> {
        match self.diff.diff().await {
            Ok(diff) if !diff.trim().is_empty() => Some(diff),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not read workspace diff: {}", e);
                None
            }
        }
    }

    /// Run `invocation` through the handler registered for its role.
    ///
    /// Failures are recorded as `stage_failure` events before being returned.
    pub async fn dispatch(
        &self,
        source: &'static str,
        invocation: &RoleInvocation,
    ) -> Result<RoleOutput, OrchestrationError> {
        let role = invocation.role;
        let handler = self.handlers.get(role);
        debug_assert!(handler.is_some(), "no handler registered for role {role}");
        let Some(handler) = handler else {
            return Err(OrchestrationError::UnhandledRole(role));
        };

        debug!(
            "Dispatching {} step {}",
            role,
            step_label(&invocation.step_id)
        );

        match handler.handle(invocation, &self.cancellation).await {
            Ok(output) => Ok(output),
            Err(e) if e.is_cancelled() => Err(OrchestrationError::Cancelled),
            Err(e) => {
                error!("{} step {} failed: {}", role, step_label(&invocation.step_id), e);
                self.record(
                    source,
                    "stage_failure",
                    e.to_string(),
                    json!({
                        "role": role.as_str(),
                        "stepId": invocation.step_id.map(StepId::get),
                        "objective": invocation.objective,
                        "message": e.to_string(),
                    }),
                );
                Err(match e {
                    StageError::Parse(source) => OrchestrationError::StageParse {
                        role,
                        step_id: invocation.step_id,
                        source,
                    },
                    other => OrchestrationError::StageFailed {
                        role,
                        step_id: invocation.step_id,
                        source: other,
                    },
                })
            }
        }
    }

    /// Dispatch a review role and insist on a [`Review`] back.
    pub async fn dispatch_review(
        &self,
        source: &'static str,
        invocation: &RoleInvocation,
    ) -> Result<Review, OrchestrationError> {
        match self.dispatch(source, invocation).await? {
            RoleOutput::Review(review) => Ok(review),
            RoleOutput::Touched(_) => Err(OrchestrationError::StageFailed {
                role: invocation.role,
                step_id: invocation.step_id,
                source: StageError::Other("review role returned no review".to_string()),
            }),
        }
    }
}
