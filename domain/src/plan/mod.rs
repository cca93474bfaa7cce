//! Execution plans: roles, steps, the plan compiler and role models.
//!
//! A plan is compiled once from the planner's response
//! ([`compile_plan`]) and never edited afterwards.

pub mod compiler;
pub mod entities;
pub mod paths;
pub mod role;
pub mod role_models;

pub use compiler::{
    DEFAULT_FINAL_OBJECTIVE, DEFAULT_STYLE_OBJECTIVE, MAX_STEPS, PlanValidationError, RawPlan,
    RawStep, compile_plan, normalize, renormalize,
    validate_plan_json,
};
pub use entities::{
    ExecutionPlan, IterationStrategy, MAX_ITERATIONS, MIN_ITERATIONS, PlanStep, StepId,
    WORKSPACE_SCOPE,
};
pub use role::StepRole;
pub use role_models::RoleModels;
