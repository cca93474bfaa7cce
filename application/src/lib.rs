//! Application layer for conductor
//!
//! This crate contains the orchestration services, use cases, port
//! definitions and application configuration. It depends only on the domain
//! layer; adapters for the ports live in the infrastructure and presentation
//! crates.

pub mod config;
pub mod ports;
pub mod services;
pub mod use_cases;

// Re-export commonly used types
pub use config::{LoopParams, RequestParams, SessionParams, SnapshotMode};
pub use ports::{
    diff_provider::{DiffError, DiffProvider, NoDiffProvider},
    event_sink::{EventSink, NoEventSink, RunEvent},
    generation::{
        FailureKind, GatewayError, GenerationService, GenerationSession, SessionTimeout,
        TimeoutBound,
    },
    progress::{NoProgress, OrchestrationProgress},
    prompt_builder::{PromptBuilder, TemplatePromptBuilder},
    role_handler::{RoleHandler, RoleHandlers, RoleInvocation, RoleOutput, StageError},
};
pub use services::{
    convergence::{ConvergenceLoop, ConvergenceOutcome},
    dispatch::DispatchContext,
    generation_role_handler::GenerationRoleHandler,
    request_client::{RequestClient, RequestError, UsageMeter, UsageSnapshot},
    scheduler::{StepOutcome, StepScheduler},
    session_manager::{SessionHandle, SessionManager},
};
pub use use_cases::planning::{MAX_PLAN_ATTEMPTS, PlanningUseCase};
pub use use_cases::run_orchestration::{
    OrchestrationError, OrchestratorContext, RunOrchestrationUseCase, RunReport, RunRequest,
    Workflow,
};
