//! Prompt builder port
//!
//! Lets callers swap the remediation wording without touching the loop.

use conductor_domain::{OrchestrationPrompt, Review};

pub trait PromptBuilder: Send + Sync {
    /// Instruction handed to the remediation and re-review passes.
    fn remediation_instruction(&self, review: &Review, completion_criteria: &[String]) -> String;
}

/// Default builder backed by [`OrchestrationPrompt`].
pub struct TemplatePromptBuilder;

impl PromptBuilder for TemplatePromptBuilder {
    fn remediation_instruction(&self, review: &Review, completion_criteria: &[String]) -> String {
        OrchestrationPrompt::remediation(review, completion_criteria)
    }
}
