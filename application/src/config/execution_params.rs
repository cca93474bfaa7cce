//! Execution parameters: request, session and convergence-loop control.
//!
//! These are application-layer concerns, not domain policy. The binary
//! builds them from the loaded configuration file and CLI overrides.
//!
//! | Params | Used by |
//! |--------|---------|
//! | [`RequestParams`] | [`RequestClient`](crate::services::request_client::RequestClient) |
//! | [`SessionParams`] | [`SessionManager`](crate::services::session_manager::SessionManager) |
//! | [`LoopParams`] | [`ConvergenceLoop`](crate::services::convergence::ConvergenceLoop) |

use conductor_domain::StepRole;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Size bounds and retry policy for single generation calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Prompts longer than this (in characters) are truncated.
    pub max_prompt_chars: usize,
    /// Replies longer than this (in characters) are truncated.
    pub max_response_chars: usize,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Backoff before retry `n` is `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            max_prompt_chars: 120_000,
            max_response_chars: 200_000,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RequestParams {
    // ==================== Builder Methods ====================

    pub fn with_max_prompt_chars(mut self, max: usize) -> Self {
        self.max_prompt_chars = max;
        self
    }

    pub fn with_max_response_chars(mut self, max: usize) -> Self {
        self.max_response_chars = max;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay before the retry following failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Timeouts for one completion on a cached session.
///
/// `None` disables a bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Maximum silence between two events.
    pub inactivity_timeout: Option<Duration>,
    /// Maximum total time for one completion.
    pub absolute_timeout: Option<Duration>,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            inactivity_timeout: Some(Duration::from_secs(120)),
            absolute_timeout: Some(Duration::from_secs(900)),
        }
    }
}

impl SessionParams {
    /// Build from second counts where `0` means disabled.
    pub fn from_secs(inactivity_secs: u64, absolute_secs: u64) -> Self {
        let bound = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        Self {
            inactivity_timeout: bound(inactivity_secs),
            absolute_timeout: bound(absolute_secs),
        }
    }

    pub fn with_inactivity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_absolute_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.absolute_timeout = timeout;
        self
    }
}

/// How the touched-file snapshot is refreshed between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// Union in the files named by the latest diff.
    #[default]
    Diff,
    /// Replace the set with a full re-enumeration of changed files.
    Full,
}

impl std::str::FromStr for SnapshotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "diff" => Ok(SnapshotMode::Diff),
            "full" => Ok(SnapshotMode::Full),
            other => Err(format!("unknown snapshot mode: {other}")),
        }
    }
}

/// Convergence-loop control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopParams {
    /// Mutating role that applies the remediation before re-review.
    /// `None` re-runs only the review passes.
    pub remediation_role: Option<StepRole>,
    /// Run the style review before each re-review.
    pub style_pass: bool,
    pub snapshot_mode: SnapshotMode,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            remediation_role: Some(StepRole::Builder),
            style_pass: true,
            snapshot_mode: SnapshotMode::Diff,
        }
    }
}

impl LoopParams {
    pub fn with_remediation_role(mut self, role: Option<StepRole>) -> Self {
        self.remediation_role = role;
        self
    }

    pub fn with_style_pass(mut self, enabled: bool) -> Self {
        self.style_pass = enabled;
        self
    }

    pub fn with_snapshot_mode(mut self, mode: SnapshotMode) -> Self {
        self.snapshot_mode = mode;
        self
    }
}
