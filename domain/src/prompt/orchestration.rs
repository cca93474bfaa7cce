//! Prompt templates for planning, role steps and remediation.

use crate::plan::{MAX_STEPS, StepRole};
use crate::review::Review;
use std::collections::BTreeSet;

/// Templates for orchestration prompts
pub struct OrchestrationPrompt;

impl OrchestrationPrompt {
    /// System message for the planner session
    pub fn planning_system() -> &'static str {
        r#"You are the planning lead of a small team of coding agents.
You never edit files yourself. You break a task into steps and assign each
step to one agent:

- "frontend": UI and feature-shell work
- "builder": implementation work
- "style_review": style and convention review (read-only)
- "architecture": final architecture review (read-only)

Reply with a single JSON object and nothing else."#
    }

    /// Prompt asking for an execution plan.
    ///
    /// `previous_error` carries the validation message of the last rejected
    /// attempt so the planner can correct it.
    pub fn planning(task: &str, workspace_root: &str, previous_error: Option<&str>) -> String {
        let feedback = previous_error
            .map(|e| {
                format!(
                    "\n## Previous Attempt Rejected\n\nYour last plan was rejected: {e}\nFix this and reply with the complete corrected plan.\n"
                )
            })
            .unwrap_or_default();

        format!(
            r#"## Task

{task}

## Workspace

{workspace_root}
{feedback}
## Output Format

Reply with one JSON object (a ```json fenced block is fine):

```json
{{
  "steps": [
    {{"id": 1, "agent": "builder", "objective": "...", "dependsOn": [], "languageScope": ["rust"]}},
    {{"id": 2, "agent": "architecture", "objective": "...", "dependsOn": [1]}}
  ],
  "iterationStrategy": {{"maxIterations": 2, "reviewRequired": true}},
  "completionCriteria": ["..."]
}}
```

## Rules

1. At most {MAX_STEPS} steps, each with a non-empty "agent" and "objective"
2. "dependsOn" lists ids of earlier steps only
3. Include at least one "frontend" or "builder" step
4. End with one "style_review" step and one "architecture" step
5. Refer to files with paths relative to the workspace"#
        )
    }

    /// System message for a role session
    pub fn role_system(role: StepRole) -> &'static str {
        match role {
            StepRole::Frontend => {
                "You are the frontend agent. You implement UI and feature-shell changes directly in \
                 the workspace, keep components accessible and handle empty and error states."
            }
            StepRole::Builder => {
                "You are the builder agent. You implement the requested changes directly in the \
                 workspace, following the existing structure and conventions of the codebase."
            }
            StepRole::StyleReview => {
                "You are the style reviewer. You read the changed code and report style, naming \
                 and convention problems. You never edit files."
            }
            StepRole::FinalReview => {
                "You are the architecture reviewer. You read the changed code and report \
                 structural, layering and correctness problems by severity. You never edit files."
            }
        }
    }

    /// Prompt for a mutating step (frontend / builder)
    pub fn mutating_step(
        role: StepRole,
        objective: &str,
        workspace_root: &str,
        language_scope: Option<&BTreeSet<String>>,
        remediation: Option<&str>,
    ) -> String {
        let scope = scope_line(language_scope);
        let remediation = remediation
            .map(|r| format!("\n## Required Remediation\n\n{r}\n"))
            .unwrap_or_default();

        format!(
            r#"## Objective ({role})

{objective}

## Workspace

{workspace_root}
{scope}{remediation}
## Output Format

Make the changes in the workspace, then reply with one JSON object listing
every file you created or modified, relative to the workspace:

```json
{{"filesTouched": ["src/example.rs"]}}
```"#
        )
    }

    /// Prompt for a review step (style / final)
    pub fn review_step(
        role: StepRole,
        objective: &str,
        workspace_root: &str,
        touched_files: &BTreeSet<String>,
        diff: Option<&str>,
        remediation: Option<&str>,
    ) -> String {
        let files = if touched_files.is_empty() {
            "- (none reported)".to_string()
        } else {
            touched_files
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let diff = diff
            .filter(|d| !d.trim().is_empty())
            .map(|d| format!("\n## Current Diff\n\n```diff\n{d}\n```\n"))
            .unwrap_or_default();
        let remediation = remediation
            .map(|r| format!("\n## Remediation Since Last Review\n\n{r}\n"))
            .unwrap_or_default();

        format!(
            r#"## Objective ({role})

{objective}

## Workspace

{workspace_root}

## Touched Files

{files}
{diff}{remediation}
## Output Format

Reply with one JSON object:

```json
{{
  "findings": [
    {{"severity": "high|medium|low", "rule": "...", "file": "...", "line": 1, "symbol": "...", "rationale": "..."}}
  ],
  "requiredActions": ["..."]
}}
```

Use "high" only for problems that must be fixed before the change can ship.
An empty "findings" array means the change is acceptable."#
        )
    }

    /// Remediation instruction summarizing a review's required actions
    pub fn remediation(review: &Review, completion_criteria: &[String]) -> String {
        let mut out = String::from("Address the following review results.\n\n");

        if review.required_actions().is_empty() {
            out.push_str("Required actions: resolve every high-severity finding below.\n");
        } else {
            out.push_str("Required actions:\n");
            for (i, action) in review.required_actions().iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, action));
            }
        }

        let mut findings: Vec<_> = review.findings().iter().collect();
        findings.sort_by_key(|f| f.severity);
        if !findings.is_empty() {
            out.push_str("\nFindings:\n");
            for f in findings {
                let location = f.location().map(|l| format!(" ({l})")).unwrap_or_default();
                out.push_str(&format!("- [{}] {}{}: {}\n", f.severity, f.rule, location, f.rationale));
            }
        }

        if !completion_criteria.is_empty() {
            out.push_str("\nThe work is complete when:\n");
            for criterion in completion_criteria {
                out.push_str(&format!("- {criterion}\n"));
            }
        }
        out
    }
}

fn scope_line(language_scope: Option<&BTreeSet<String>>) -> String {
    match language_scope {
        Some(scope) if !scope.contains(crate::plan::WORKSPACE_SCOPE) && !scope.is_empty() => format!(
            "\n## Language Scope\n\nLimit changes to: {}\n",
            scope.iter().cloned().collect::<Vec<_>>().join(", ")
        ),
        _ => String::new(),
    }
}
