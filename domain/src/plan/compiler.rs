//! Plan compiler: raw planning response → validated, normalized [`ExecutionPlan`].
//!
//! Three stages, each usable on its own:
//!
//! 1. **Extraction**: [`extract_json_object`] pulls the JSON object out of
//!    free-form text (fenced block first, brace span second).
//! 2. **Validation**: [`validate_plan_json`] checks the schema and returns a
//!    [`RawPlan`] or a [`PlanValidationError`] with a human-readable message.
//! 3. **Normalization**: [`normalize`] canonicalizes roles, guards paths,
//!    reorders review steps to the end, remaps ids and forces the review
//!    dependencies. [`renormalize`] runs the same pass over an existing plan
//!    and is a no-op on normalized input.
//!
//! [`compile_plan`] chains all three.

use super::entities::{ExecutionPlan, IterationStrategy, PlanStep, StepId, WORKSPACE_SCOPE};
use super::paths::sanitize_objective;
use super::role::StepRole;
use crate::util::extract_json_object;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Maximum number of steps accepted from the generation service.
pub const MAX_STEPS: usize = 10;

/// Objective used when the plan omits a style review.
pub const DEFAULT_STYLE_OBJECTIVE: &str = "Review every change for style, naming and project convention \
     compliance and report findings with the actions required to fix them.";

/// Objective used when the plan omits a final review.
pub const DEFAULT_FINAL_OBJECTIVE: &str = "Perform the final architecture review of the complete change set \
     and report findings by severity with the actions required to resolve them.";

/// Why a planning response was rejected.
///
/// The `Display` text is fed back to the generation service when the caller
/// re-prompts, so every message names the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("No JSON object found in the planning response")]
    MissingJson,

    #[error("Planning response contains invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Plan JSON must be an object")]
    NotAnObject,

    #[error("`steps` must be a non-empty array")]
    MissingSteps,

    #[error("`steps` must contain at most {max} entries, found {count}")]
    TooManySteps { count: usize, max: usize },

    #[error("Step {index} must be an object")]
    StepNotObject { index: usize },

    #[error("Step {index} is missing a non-empty `agent`")]
    MissingAgent { index: usize },

    #[error("Step {index} is missing a non-empty `objective`")]
    MissingObjective { index: usize },

    #[error("Step {index} has an invalid `id`: expected a positive integer")]
    InvalidId { index: usize },

    #[error("Step id {id} is used by more than one step")]
    DuplicateId { id: u32 },

    #[error("Step {index} has an invalid `dependsOn`: expected an array of positive integers")]
    InvalidDependsOn { index: usize },

    #[error("Step {index} has an invalid `languageScope`: expected an array of strings")]
    InvalidLanguageScope { index: usize },

    #[error("`iterationStrategy` is invalid: {0}")]
    InvalidIterationStrategy(String),

    #[error("`completionCriteria` must be a non-empty array of non-empty strings")]
    InvalidCompletionCriteria,

    #[error("Plan has no {0} step after normalization")]
    MissingMandatoryRole(&'static str),
}

impl PlanValidationError {
    /// Whether the response failed before any schema check (no usable JSON).
    pub fn is_json_error(&self) -> bool {
        matches!(self, Self::MissingJson | Self::InvalidJson(_))
    }
}

/// A schema-valid step whose role has not been canonicalized yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStep {
    pub id: u32,
    pub agent: String,
    pub objective: String,
    pub depends_on: Vec<u32>,
    pub language_scope: Option<BTreeSet<String>>,
}

/// A schema-valid plan, prior to normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlan {
    pub steps: Vec<RawStep>,
    pub iteration_strategy: IterationStrategy,
    pub completion_criteria: Vec<String>,
}

/// Extract, validate and normalize a planning response.
pub fn compile_plan(raw: &str, workspace_root: &Path) -> Result<ExecutionPlan, PlanValidationError> {
    let json = extract_json_object(raw).ok_or(PlanValidationError::MissingJson)?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| PlanValidationError::InvalidJson(e.to_string()))?;
    let plan = validate_plan_json(&value)?;
    normalize(plan, workspace_root)
}

/// Check the plan schema, collecting the fields into a [`RawPlan`].
pub fn validate_plan_json(value: &Value) -> Result<RawPlan, PlanValidationError> {
    let object = value.as_object().ok_or(PlanValidationError::NotAnObject)?;

    let steps_json = object
        .get("steps")
        .and_then(Value::as_array)
        .filter(|steps| !steps.is_empty())
        .ok_or(PlanValidationError::MissingSteps)?;
    if steps_json.len() > MAX_STEPS {
        return Err(PlanValidationError::TooManySteps {
            count: steps_json.len(),
            max: MAX_STEPS,
        });
    }

    let mut steps = Vec::with_capacity(steps_json.len());
    let mut seen_ids = BTreeSet::new();
    for (position, step_json) in steps_json.iter().enumerate() {
        let index = position + 1;
        let step = validate_step(step_json, index)?;
        if !seen_ids.insert(step.id) {
            return Err(PlanValidationError::DuplicateId { id: step.id });
        }
        steps.push(step);
    }

    let iteration_strategy = validate_iteration_strategy(field(object, "iterationStrategy", "iteration_strategy"))?;
    let completion_criteria =
        validate_completion_criteria(field(object, "completionCriteria", "completion_criteria"))?;

    Ok(RawPlan {
        steps,
        iteration_strategy,
        completion_criteria,
    })
}

fn field<'a>(object: &'a Map<String, Value>, name: &str, alias: &str) -> Option<&'a Value> {
    object.get(name).or_else(|| object.get(alias))
}

fn positive_id(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn validate_step(value: &Value, index: usize) -> Result<RawStep, PlanValidationError> {
    let object = value
        .as_object()
        .ok_or(PlanValidationError::StepNotObject { index })?;

    let agent = non_empty_str(field(object, "agent", "role"))
        .ok_or(PlanValidationError::MissingAgent { index })?;
    let objective = non_empty_str(object.get("objective"))
        .ok_or(PlanValidationError::MissingObjective { index })?;

    let id = match object.get("id") {
        None | Some(Value::Null) => {
            u32::try_from(index).map_err(|_| PlanValidationError::InvalidId { index })?
        }
        Some(v) => positive_id(v).ok_or(PlanValidationError::InvalidId { index })?,
    };

    let depends_on = match field(object, "dependsOn", "depends_on") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(positive_id)
            .collect::<Option<Vec<_>>>()
            .ok_or(PlanValidationError::InvalidDependsOn { index })?,
        Some(_) => return Err(PlanValidationError::InvalidDependsOn { index }),
    };

    let language_scope = match field(object, "languageScope", "language_scope") {
        None | Some(Value::Null) => None,
        Some(Value::Array(entries)) => {
            let tags = entries
                .iter()
                .map(|e| e.as_str().map(|s| s.trim().to_lowercase()))
                .collect::<Option<BTreeSet<_>>>()
                .ok_or(PlanValidationError::InvalidLanguageScope { index })?;
            let tags: BTreeSet<String> = tags.into_iter().filter(|t| !t.is_empty()).collect();
            (!tags.is_empty()).then_some(tags)
        }
        Some(_) => return Err(PlanValidationError::InvalidLanguageScope { index }),
    };

    Ok(RawStep {
        id,
        agent,
        objective,
        depends_on,
        language_scope,
    })
}

fn validate_iteration_strategy(value: Option<&Value>) -> Result<IterationStrategy, PlanValidationError> {
    let object = value
        .and_then(Value::as_object)
        .ok_or_else(|| PlanValidationError::InvalidIterationStrategy("expected an object".into()))?;

    let max_iterations = match field(object, "maxIterations", "max_iterations") {
        None | Some(Value::Null) => IterationStrategy::default().max_iterations(),
        Some(v) => {
            let n = v.as_i64().ok_or_else(|| {
                PlanValidationError::InvalidIterationStrategy("`maxIterations` must be an integer".into())
            })?;
            u32::try_from(n.max(0)).unwrap_or(u32::MAX)
        }
    };

    let review_required = match field(object, "reviewRequired", "review_required") {
        None | Some(Value::Null) => IterationStrategy::default().review_required(),
        Some(v) => v.as_bool().ok_or_else(|| {
            PlanValidationError::InvalidIterationStrategy("`reviewRequired` must be a boolean".into())
        })?,
    };

    Ok(IterationStrategy::new(max_iterations, review_required))
}

fn validate_completion_criteria(value: Option<&Value>) -> Result<Vec<String>, PlanValidationError> {
    let entries = value
        .and_then(Value::as_array)
        .filter(|entries| !entries.is_empty())
        .ok_or(PlanValidationError::InvalidCompletionCriteria)?;

    entries
        .iter()
        .map(|e| non_empty_str(Some(e)))
        .collect::<Option<Vec<_>>>()
        .ok_or(PlanValidationError::InvalidCompletionCriteria)
}

/// A step between role canonicalization and id remapping.
struct Candidate {
    old_id: Option<u32>,
    role: StepRole,
    objective: String,
    depends_on: Vec<u32>,
    language_scope: Option<BTreeSet<String>>,
}

/// Normalize a schema-valid plan.
pub fn normalize(plan: RawPlan, workspace_root: &Path) -> Result<ExecutionPlan, PlanValidationError> {
    let candidates = plan
        .steps
        .into_iter()
        .filter_map(|step| match StepRole::from_synonym(&step.agent) {
            Some(role) => Some(Candidate {
                old_id: Some(step.id),
                role,
                objective: step.objective,
                depends_on: step.depends_on,
                language_scope: step.language_scope,
            }),
            None => {
                warn!(step_id = step.id, agent = %step.agent, "Dropping plan step with unrecognized role");
                None
            }
        })
        .collect();

    build(
        candidates,
        plan.iteration_strategy,
        plan.completion_criteria,
        workspace_root,
    )
}

/// Run normalization over an already-built plan.
///
/// On a plan produced by [`normalize`] this returns an equal plan.
pub fn renormalize(plan: &ExecutionPlan, workspace_root: &Path) -> Result<ExecutionPlan, PlanValidationError> {
    let candidates = plan
        .steps()
        .iter()
        .map(|step| Candidate {
            old_id: Some(step.id().get()),
            role: step.role(),
            objective: step.objective().to_string(),
            depends_on: step.depends_on().iter().map(|d| d.get()).collect(),
            language_scope: step.language_scope().cloned(),
        })
        .collect();

    build(
        candidates,
        *plan.iteration_strategy(),
        plan.completion_criteria().to_vec(),
        workspace_root,
    )
}

fn injected(role: StepRole, objective: &str) -> Candidate {
    Candidate {
        old_id: None,
        role,
        objective: objective.to_string(),
        depends_on: Vec::new(),
        language_scope: Some([WORKSPACE_SCOPE.to_string()].into()),
    }
}

fn build(
    candidates: Vec<Candidate>,
    iteration_strategy: IterationStrategy,
    completion_criteria: Vec<String>,
    workspace_root: &Path,
) -> Result<ExecutionPlan, PlanValidationError> {
    let mut mutators = Vec::new();
    let mut style = None;
    let mut final_review = None;

    for mut candidate in candidates {
        candidate.objective = sanitize_objective(&candidate.objective, workspace_root);
        let slot = match candidate.role {
            StepRole::Frontend | StepRole::Builder => {
                mutators.push(candidate);
                continue;
            }
            StepRole::StyleReview => &mut style,
            StepRole::FinalReview => &mut final_review,
        };
        if slot.is_some() {
            warn!(
                step_id = candidate.old_id,
                role = %candidate.role,
                "Dropping duplicate review step"
            );
        } else {
            *slot = Some(candidate);
        }
    }

    if mutators.is_empty() {
        return Err(PlanValidationError::MissingMandatoryRole("mutating"));
    }

    let style = style.unwrap_or_else(|| injected(StepRole::StyleReview, DEFAULT_STYLE_OBJECTIVE));
    let final_review =
        final_review.unwrap_or_else(|| injected(StepRole::FinalReview, DEFAULT_FINAL_OBJECTIVE));

    let ordered: Vec<Candidate> = mutators
        .into_iter()
        .chain([style, final_review])
        .collect();

    // old id → new sequential id
    let remap: BTreeMap<u32, u32> = ordered
        .iter()
        .zip(1u32..)
        .filter_map(|(c, new_id)| c.old_id.map(|old| (old, new_id)))
        .collect();

    let mut steps = Vec::with_capacity(ordered.len());
    for (candidate, new_id) in ordered.into_iter().zip(1u32..) {
        let depends_on: BTreeSet<u32> = if candidate.role.is_review() {
            (1..new_id).collect()
        } else {
            candidate
                .depends_on
                .iter()
                .filter_map(|old| remap.get(old).copied())
                .filter(|&dep| dep < new_id)
                .collect()
        };

        steps.push(PlanStep::new(
            to_step_id(new_id),
            candidate.role,
            candidate.objective,
            depends_on.into_iter().map(to_step_id).collect(),
            candidate.language_scope,
        ));
    }

    Ok(ExecutionPlan::new(steps, iteration_strategy, completion_criteria))
}

fn to_step_id(id: u32) -> StepId {
    // Sequential ids start at 1.
    StepId::new(id).unwrap_or_else(|| unreachable!("sequential step ids start at 1"))
}
