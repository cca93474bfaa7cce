//! Step roles and the synonym table used to canonicalize them.

use serde::{Deserialize, Serialize};

/// The category of work a plan step performs.
///
/// A closed set: every role is matched exhaustively by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// Mutator: UI / feature-shell work.
    Frontend,
    /// Mutator: implementation work.
    Builder,
    /// Style-enforcement review pass.
    StyleReview,
    /// Final (architecture) review pass.
    FinalReview,
}

impl StepRole {
    pub const ALL: [StepRole; 4] = [
        StepRole::Frontend,
        StepRole::Builder,
        StepRole::StyleReview,
        StepRole::FinalReview,
    ];

    /// Map a free-form role name onto its canonical role.
    ///
    /// Case, surrounding whitespace, separators (`-`, `_`, space) and a
    /// trailing `agent` suffix are ignored, so `"Builder"`, `"builder agent"`
    /// and `"BUILDER_AGENT"` all resolve to [`StepRole::Builder`].
    pub fn from_synonym(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' ' | '\t'))
            .flat_map(char::to_lowercase)
            .collect();
        let key = key.strip_suffix("agent").unwrap_or(&key);

        match key {
            "frontend" | "ui" | "designer" | "feature" => Some(StepRole::Frontend),
            "builder" | "build" | "implementer" | "implementation" | "developer" | "coder"
            | "engineer" | "codex" => Some(StepRole::Builder),
            "style" | "stylereview" | "stylereviewer" | "stylist" | "lint" | "linter"
            | "formatter" => Some(StepRole::StyleReview),
            "architecture" | "architect" | "review" | "reviewer" | "finalreview"
            | "finalreviewer" | "architecturereview" => Some(StepRole::FinalReview),
            _ => None,
        }
    }

    /// Whether this role mutates the workspace.
    pub fn is_mutating(self) -> bool {
        matches!(self, StepRole::Frontend | StepRole::Builder)
    }

    /// Whether this role produces a [`Review`](crate::review::Review).
    pub fn is_review(self) -> bool {
        !self.is_mutating()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepRole::Frontend => "frontend",
            StepRole::Builder => "builder",
            StepRole::StyleReview => "style_review",
            StepRole::FinalReview => "final_review",
        }
    }
}

impl std::fmt::Display for StepRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
