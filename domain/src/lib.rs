//! Domain layer for conductor
//!
//! This crate contains the core orchestration logic, entities, and value
//! objects. It has no dependencies on infrastructure or presentation
//! concerns and performs no I/O.
//!
//! # Core Concepts
//!
//! ## Plan
//!
//! An [`ExecutionPlan`] is compiled from a planner's free-form reply by
//! [`compile_plan`]: JSON extraction, schema validation, then a deterministic
//! and idempotent normalization pass. A normalized plan always ends with one
//! style review followed by one final review that depends on every
//! preceding step.
//!
//! ## Review
//!
//! A [`Review`] is the structured output of a review role. Its
//! [`fingerprint`](Review::fingerprint) identifies the finding set
//! independently of order, which is how stagnation is detected.
//!
//! ## Session
//!
//! A [`SessionConfiguration`] is the value-equality key under which
//! generation sessions are cached and reused.

pub mod config;
pub mod core;
pub mod plan;
pub mod prompt;
pub mod review;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, IssueSeverity, OutputMode};
pub use core::{error::DomainError, model::Model};
pub use plan::{
    ExecutionPlan, IterationStrategy, MAX_ITERATIONS, MIN_ITERATIONS, PlanStep, PlanValidationError,
    RoleModels, StepId, StepRole, compile_plan,
};
pub use prompt::OrchestrationPrompt;
pub use review::{
    Finding, NO_PROGRESS_SENTINEL, OutputParseError, Review, ReviewStatus, Severity,
    parse_review_response, parse_touched_files,
};
pub use session::{
    configuration::{SessionConfiguration, SystemMessageMode},
    stream::SessionEvent,
};
pub use util::extract_json_object;
