//! Step scheduler
//!
//! Executes a validated plan in dependency order. At every turn the lowest
//! ready step id runs next; a step is ready when all of its dependencies
//! have completed. When nothing is ready but steps remain, the lowest pending
//! id is forced and a `dependency_deadlock` event is recorded.
//!
//! A step counts as completed only after its handler succeeds. The first
//! failure ends the run; completed steps are never rolled back.

use crate::ports::role_handler::RoleOutput;
use crate::services::dispatch::{DispatchContext, OrchestrationError};
use conductor_domain::{ExecutionPlan, PlanStep, Review, StepId};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

const SOURCE: &str = "scheduler";

/// What a full pass over the plan produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Union of every file reported by the mutating steps.
    pub touched_files: BTreeSet<String>,
    /// Output of the last review step that ran.
    pub review: Review,
    /// Steps that were run with unmet dependencies.
    pub forced_steps: Vec<StepId>,
}

#[derive(Debug, Default)]
pub struct StepScheduler;

impl StepScheduler {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: &DispatchContext,
    ) -> Result<StepOutcome, OrchestrationError> {
        let mut pending: BTreeMap<StepId, &PlanStep> =
            plan.steps().iter().map(|s| (s.id(), s)).collect();
        let mut completed: BTreeSet<StepId> = BTreeSet::new();
        let mut outcome = StepOutcome::default();

        while !pending.is_empty() {
            ctx.check_cancelled()?;

            let ready = pending
                .values()
                .find(|s| s.depends_on().iter().all(|d| completed.contains(d)))
                .map(|s| s.id());

            let id = match ready {
                Some(id) => id,
                None => {
                    let Some(&forced) = pending.keys().next() else {
                        break;
                    };
                    self.report_deadlock(forced, &pending, &completed, ctx);
                    outcome.forced_steps.push(forced);
                    forced
                }
            };

            let Some(step) = pending.remove(&id) else {
                break;
            };
            self.run_step(step, ctx, &mut outcome).await?;
            completed.insert(id);
        }

        info!(
            "Plan executed: {} file(s) touched, review {}",
            outcome.touched_files.len(),
            outcome.review.summary_line()
        );
        Ok(outcome)
    }

    async fn run_step(
        &self,
        step: &PlanStep,
        ctx: &DispatchContext,
        outcome: &mut StepOutcome,
    ) -> Result<(), OrchestrationError> {
        info!("Step {} ({}): {}", step.id(), step.role(), step.objective());
        ctx.progress.on_step_start(step);

        let diff = if step.role().is_review() {
            ctx.current_diff().await
        } else {
            None
        };
        let invocation = ctx
            .invocation(step.role(), step.objective())
            .with_step_id(step.id())
            .with_language_scope(step.language_scope().cloned())
            .with_touched_files(outcome.touched_files.clone())
            .with_diff(diff);

        let output = match ctx.dispatch(SOURCE, &invocation).await {
            Ok(output) => output,
            Err(e) => {
                ctx.progress.on_step_complete(step, false);
                return Err(e);
            }
        };

        match output {
            RoleOutput::Touched(files) => outcome.touched_files.extend(files),
            RoleOutput::Review(review) => outcome.review = review,
        }
        ctx.progress.on_step_complete(step, true);
        Ok(())
    }

    fn report_deadlock(
        &self,
        forced: StepId,
        pending: &BTreeMap<StepId, &PlanStep>,
        completed: &BTreeSet<StepId>,
        ctx: &DispatchContext,
    ) {
        let pending_ids: Vec<StepId> = pending.keys().copied().collect();
        let unmet: Vec<u32> = pending
            .get(&forced)
            .map(|s| {
                s.depends_on()
                    .iter()
                    .filter(|d| !completed.contains(d))
                    .map(|d| d.get())
                    .collect()
            })
            .unwrap_or_default();

        warn!(
            "No step is ready; forcing step {} (unmet dependencies: {:?})",
            forced, unmet
        );
        ctx.record(
            SOURCE,
            "dependency_deadlock",
            format!("Forced step {forced} with unmet dependencies"),
            json!({
                "forcedStep": forced.get(),
                "unmetDependencies": unmet,
                "pending": pending_ids.iter().map(|id| id.get()).collect::<Vec<_>>(),
            }),
        );
        ctx.progress.on_dependency_deadlock(forced, &pending_ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::role_handler::{RoleHandlers, StageError};
    use crate::services::test_support::*;
    use conductor_domain::{OutputParseError, StepRole, compile_plan};
    use std::path::Path;
    use std::sync::Arc;

    /// Compile `steps` with a default strategy and one completion criterion.
    fn plan(steps: &str) -> ExecutionPlan {
        let mut value: serde_json::Value = serde_json::from_str(steps).unwrap();
        value["iterationStrategy"] = json!({});
        value["completionCriteria"] = json!(["done"]);
        compile_plan(&value.to_string(), Path::new("/work")).unwrap()
    }

    fn ids(handler: &ScriptedHandler) -> Vec<u32> {
        handler
            .invocations()
            .iter()
            .filter_map(|i| i.step_id.map(|id| id.get()))
            .collect()
    }

    #[tokio::test]
    async fn test_runs_steps_in_dependency_order() {
        let plan = plan(
            r#"{"steps": [
                {"id": 1, "agent": "frontend", "objective": "shell"},
                {"id": 2, "agent": "builder", "objective": "core", "dependsOn": [1]},
                {"id": 3, "agent": "architecture", "objective": "review"}
            ]}"#,
        );
        let mutator = ScriptedHandler::scripted(
            vec![Ok(touched(&["ui/app.tsx"])), Ok(touched(&["src/core.rs"]))],
            touched(&[]),
        );
        let reviewer = ScriptedHandler::repeating(RoleOutput::Review(clean_review()));
        let handlers = RoleHandlers::new()
            .with(StepRole::Frontend, mutator.clone())
            .with(StepRole::Builder, mutator.clone())
            .with(StepRole::StyleReview, reviewer.clone())
            .with(StepRole::FinalReview, reviewer.clone());
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(handlers, sink.clone());

        let outcome = StepScheduler::new().execute(&plan, &ctx).await.unwrap();

        // frontend before its dependent builder, then style, then final
        let mutating: Vec<StepRole> = mutator.invocations().iter().map(|i| i.role).collect();
        assert_eq!(mutating, vec![StepRole::Frontend, StepRole::Builder]);
        assert_eq!(reviewer.call_count(), 2);
        assert_eq!(
            outcome.touched_files.into_iter().collect::<Vec<_>>(),
            vec!["src/core.rs".to_string(), "ui/app.tsx".to_string()]
        );
        assert!(outcome.forced_steps.is_empty());
        assert!(sink.types().is_empty());
    }

    #[tokio::test]
    async fn test_reviewers_see_touched_files_so_far() {
        let plan = plan(
            r#"{"steps": [
                {"id": 1, "agent": "builder", "objective": "core"},
                {"id": 2, "agent": "architecture", "objective": "review"}
            ]}"#,
        );
        let builder = ScriptedHandler::repeating(touched(&["src/core.rs"]));
        let reviewer = ScriptedHandler::repeating(RoleOutput::Review(high_review("layering")));
        let handlers = RoleHandlers::uniform(reviewer.clone()).with(StepRole::Builder, builder);
        let ctx = context(handlers, Arc::new(RecordingSink::default()));

        let outcome = StepScheduler::new().execute(&plan, &ctx).await.unwrap();

        let last = reviewer.invocations().pop().unwrap();
        assert_eq!(last.role, StepRole::FinalReview);
        assert!(last.touched_files.contains("src/core.rs"));
        assert!(outcome.review.has_high());
    }

    #[tokio::test]
    async fn test_deadlock_forces_lowest_pending_step() {
        // Normalization never emits a cycle; a deserialized plan can.
        let plan: ExecutionPlan = serde_json::from_value(json!({
            "steps": [
                {"id": 1, "role": "builder", "objective": "a", "dependsOn": [2]},
                {"id": 2, "role": "frontend", "objective": "b", "dependsOn": [1]},
                {"id": 3, "role": "final_review", "objective": "r", "dependsOn": [1, 2]}
            ],
            "iterationStrategy": {"maxIterations": 2, "reviewRequired": true},
            "completionCriteria": ["done"]
        }))
        .unwrap();
        let handler = ScriptedHandler::repeating(touched(&[]));
        let reviewer = ScriptedHandler::repeating(RoleOutput::Review(clean_review()));
        let handlers = RoleHandlers::uniform(reviewer.clone())
            .with(StepRole::Builder, handler.clone())
            .with(StepRole::Frontend, handler.clone());
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(handlers, sink.clone());

        let outcome = StepScheduler::new().execute(&plan, &ctx).await.unwrap();

        assert_eq!(ids(&handler), vec![1, 2]);
        assert_eq!(ids(&reviewer), vec![3]);
        assert_eq!(outcome.forced_steps, vec![StepId::new(1).unwrap()]);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "dependency_deadlock");
        assert_eq!(events[0].payload["forcedStep"], 1);
        assert_eq!(events[0].payload["unmetDependencies"], json!([2]));
    }

    #[tokio::test]
    async fn test_parse_failure_is_fatal_and_recorded() {
        let plan = plan(
            r#"{"steps": [
                {"id": 1, "agent": "builder", "objective": "core"},
                {"id": 2, "agent": "builder", "objective": "more"}
            ]}"#,
        );
        let builder = ScriptedHandler::scripted(
            vec![Err(StageError::Parse(OutputParseError::MissingJson))],
            touched(&[]),
        );
        let reviewer = ScriptedHandler::repeating(RoleOutput::Review(clean_review()));
        let handlers = RoleHandlers::uniform(reviewer.clone()).with(StepRole::Builder, builder.clone());
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(handlers, sink.clone());

        let err = StepScheduler::new().execute(&plan, &ctx).await.unwrap_err();

        assert!(matches!(
            err,
            OrchestrationError::StageParse {
                role: StepRole::Builder,
                ..
            }
        ));
        assert_eq!(builder.call_count(), 1);
        assert_eq!(reviewer.call_count(), 0);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "stage_failure");
        assert_eq!(events[0].payload["stepId"], 1);
        assert_eq!(events[0].payload["role"], "builder");
        assert_eq!(events[0].payload["objective"], "core");
    }

    #[tokio::test]
    async fn test_other_failures_are_stage_failed() {
        let plan = plan(r#"{"steps": [{"id": 1, "agent": "builder", "objective": "core"}]}"#);
        let builder = ScriptedHandler::scripted(
            vec![Err(StageError::Other("disk full".into()))],
            touched(&[]),
        );
        let handlers = RoleHandlers::uniform(ScriptedHandler::repeating(RoleOutput::Review(
            clean_review(),
        )))
        .with(StepRole::Builder, builder);
        let ctx = context(handlers, Arc::new(RecordingSink::default()));

        let err = StepScheduler::new().execute(&plan, &ctx).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::StageFailed { .. }));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let plan = plan(r#"{"steps": [{"id": 1, "agent": "builder", "objective": "core"}]}"#);
        let handler = ScriptedHandler::repeating(touched(&[]));
        let ctx = context(RoleHandlers::uniform(handler.clone()), Arc::new(RecordingSink::default()));
        ctx.cancellation.cancel();

        let err = StepScheduler::new().execute(&plan, &ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(handler.call_count(), 0);
    }
}
