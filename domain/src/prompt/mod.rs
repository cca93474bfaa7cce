//! Prompt domain
//!
//! Templates for each orchestration stage: planning, role steps and
//! remediation.

pub mod orchestration;

pub use orchestration::OrchestrationPrompt;
