//! Progress notification port
//!
//! Defines the interface for reporting progress during an orchestration run.
//! Every callback has a no-op default so reporters only implement what they
//! display.

use conductor_domain::{ExecutionPlan, PlanStep, Review, StepId};

/// Callback for progress updates during a run
///
/// Implementations live in the presentation layer.
pub trait OrchestrationProgress: Send + Sync {
    /// Called once the run directory and context exist.
    fn on_run_start(&self, _task: &str) {}

    /// Called when a planning attempt is rejected and re-prompted.
    fn on_plan_rejected(&self, _attempt: usize, _message: &str) {}

    /// Called after the plan is compiled.
    fn on_plan_ready(&self, _plan: &ExecutionPlan) {}

    fn on_step_start(&self, _step: &PlanStep) {}

    fn on_step_complete(&self, _step: &PlanStep, _success: bool) {}

    /// Called when no step is ready and `forced` is run anyway.
    fn on_dependency_deadlock(&self, _forced: StepId, _pending: &[StepId]) {}

    // ==================== Convergence Callbacks ====================

    fn on_iteration_start(&self, _iteration: u32, _max_iterations: u32) {}

    fn on_iteration_end(&self, _iteration: u32, _review: &Review) {}

    /// Called with the final review when the run ends.
    fn on_run_complete(&self, _review: &Review) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl OrchestrationProgress for NoProgress {}
