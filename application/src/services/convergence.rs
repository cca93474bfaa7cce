//! Convergence loop
//!
//! Re-runs remediation and review while the latest review still carries a
//! high-severity finding. The loop stops when the findings clear, when the
//! iteration budget is spent, or when two consecutive reviews produce the
//! same finding set (stagnation). The outcome is always a review with a
//! terminal status, never an error of its own.

use crate::config::SnapshotMode;
use crate::ports::diff_provider::files_in_diff;
use crate::ports::role_handler::RoleOutput;
use crate::services::dispatch::{DispatchContext, OrchestrationError};
use conductor_domain::plan::{DEFAULT_FINAL_OBJECTIVE, DEFAULT_STYLE_OBJECTIVE};
use conductor_domain::{ExecutionPlan, IterationStrategy, Review, ReviewStatus, StepRole};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const SOURCE: &str = "convergence";

const REMEDIATION_OBJECTIVE: &str =
    "Apply the remediation below to the workspace. Change only what the review requires.";

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceOutcome {
    /// Final review with its terminal status.
    pub review: Review,
    pub touched_files: BTreeSet<String>,
    /// Iterations actually run.
    pub iterations: u32,
}

/// Review objectives reused on every iteration.
#[derive(Debug, Clone)]
pub struct ConvergenceLoop {
    style_objective: String,
    final_objective: String,
}

impl Default for ConvergenceLoop {
    fn default() -> Self {
        Self {
            style_objective: DEFAULT_STYLE_OBJECTIVE.to_string(),
            final_objective: DEFAULT_FINAL_OBJECTIVE.to_string(),
        }
    }
}

impl ConvergenceLoop {
    /// Reuse the plan's own review objectives.
    pub fn for_plan(plan: &ExecutionPlan) -> Self {
        let defaults = Self::default();
        Self {
            style_objective: plan
                .style_review()
                .map(|s| s.objective().to_string())
                .unwrap_or(defaults.style_objective),
            final_objective: plan
                .final_review()
                .map(|s| s.objective().to_string())
                .unwrap_or(defaults.final_objective),
        }
    }

    pub async fn run(
        &self,
        strategy: &IterationStrategy,
        completion_criteria: &[String],
        review: Review,
        touched_files: BTreeSet<String>,
        ctx: &DispatchContext,
    ) -> Result<ConvergenceOutcome, OrchestrationError> {
        if !strategy.review_required() {
            return Ok(ConvergenceOutcome {
                review: review.with_status(ReviewStatus::Open),
                touched_files,
                iterations: 0,
            });
        }

        let max_iterations = strategy.max_iterations();
        let mut review = review;
        let mut touched = touched_files;
        let mut previous = review.fingerprint();
        let mut iterations = 0;

        while review.has_high() && iterations < max_iterations {
            ctx.check_cancelled()?;
            iterations += 1;
            info!("Convergence iteration {}/{}", iterations, max_iterations);
            ctx.progress.on_iteration_start(iterations, max_iterations);

            let instruction = ctx
                .prompts
                .remediation_instruction(&review, completion_criteria);

            if let Some(role) = ctx.loop_params.remediation_role
                && role.is_mutating()
                && ctx.has_handler(role)
            {
                let invocation = ctx
                    .invocation(role, REMEDIATION_OBJECTIVE)
                    .with_touched_files(touched.clone())
                    .with_remediation(Some(instruction.clone()));
                match ctx.dispatch(SOURCE, &invocation).await? {
                    RoleOutput::Touched(files) => touched.extend(files),
                    RoleOutput::Review(_) => {
                        debug!("Remediation role {} returned a review; ignored", role)
                    }
                }
            }

            let diff = ctx.current_diff().await;

            if ctx.loop_params.style_pass && ctx.has_handler(StepRole::StyleReview) {
                let invocation = ctx
                    .invocation(StepRole::StyleReview, self.style_objective.clone())
                    .with_touched_files(touched.clone())
                    .with_diff(diff.clone())
                    .with_remediation(Some(instruction.clone()));
                let style = ctx.dispatch_review(SOURCE, &invocation).await?;
                debug!("Style pass: {}", style.summary_line());
            }

            let invocation = ctx
                .invocation(StepRole::FinalReview, self.final_objective.clone())
                .with_touched_files(touched.clone())
                .with_diff(diff.clone())
                .with_remediation(Some(instruction));
            let next = ctx.dispatch_review(SOURCE, &invocation).await?;

            let fingerprint = next.fingerprint();
            ctx.progress.on_iteration_end(iterations, &next);

            if fingerprint == previous {
                warn!(
                    "Review unchanged after iteration {}; stopping",
                    iterations
                );
                ctx.record(
                    SOURCE,
                    "stagnation",
                    "Two consecutive reviews produced the same findings",
                    json!({ "iteration": iterations, "findings": next.findings().len() }),
                );
                return Ok(ConvergenceOutcome {
                    review: next.blocked(),
                    touched_files: touched,
                    iterations,
                });
            }

            previous = fingerprint;
            review = next;
            self.refresh_snapshot(&mut touched, diff.as_deref(), ctx).await;

            ctx.record(
                SOURCE,
                "iteration_complete",
                review.summary_line(),
                json!({ "iteration": iterations, "high": review.has_high() }),
            );
        }

        let status = if review.has_high() {
            ReviewStatus::Exhausted
        } else {
            ReviewStatus::Converged
        };
        info!("Convergence finished after {} iteration(s): {}", iterations, status);

        Ok(ConvergenceOutcome {
            review: review.with_status(status),
            touched_files: touched,
            iterations,
        })
    }

    async fn refresh_snapshot(
        &self,
        touched: &mut BTreeSet<String>,
        diff: Option<&str>,
        ctx: &DispatchContext,
    ) {
        match ctx.loop_params.snapshot_mode {
            SnapshotMode::Diff => {
                if let Some(diff) = diff {
                    touched.extend(files_in_diff(diff));
                }
            }
            SnapshotMode::Full => match ctx.diff.changed_files().await {
                Ok(files) => *touched = files,
                Err(e) => warn!("Could not enumerate changed files: {}", e),
            },
        }
    }
}
