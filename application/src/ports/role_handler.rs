//! Role handler port
//!
//! The scheduler and the convergence loop never talk to the generation
//! service directly; they dispatch every step to the [`RoleHandler`]
//! registered for the step's role.

use crate::services::request_client::RequestError;
use async_trait::async_trait;
use conductor_domain::{OutputParseError, Review, RoleModels, StepId, StepRole};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Everything a handler needs to carry out one step.
#[derive(Debug, Clone)]
pub struct RoleInvocation {
    /// `None` for convergence-loop passes, which have no plan step.
    pub step_id: Option<StepId>,
    pub role: StepRole,
    pub objective: String,
    pub workspace_root: PathBuf,
    pub language_scope: Option<BTreeSet<String>>,
    pub models: RoleModels,
    /// Files touched so far in the run.
    pub touched_files: BTreeSet<String>,
    pub diff: Option<String>,
    /// Remediation instruction from the previous review, if any.
    pub remediation: Option<String>,
}

impl RoleInvocation {
    pub fn new(
        role: StepRole,
        objective: impl Into<String>,
        workspace_root: impl Into<PathBuf>,
        models: RoleModels,
    ) -> Self {
        Self {
            step_id: None,
            role,
            objective: objective.into(),
            workspace_root: workspace_root.into(),
            language_scope: None,
            models,
            touched_files: BTreeSet::new(),
            diff: None,
            remediation: None,
        }
    }

    pub fn with_step_id(mut self, id: StepId) -> Self {
        self.step_id = Some(id);
        self
    }

    pub fn with_language_scope(mut self, scope: Option<BTreeSet<String>>) -> Self {
        self.language_scope = scope;
        self
    }

    pub fn with_touched_files(mut self, files: BTreeSet<String>) -> Self {
        self.touched_files = files;
        self
    }

    pub fn with_diff(mut self, diff: Option<String>) -> Self {
        self.diff = diff;
        self
    }

    pub fn with_remediation(mut self, remediation: Option<String>) -> Self {
        self.remediation = remediation;
        self
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleOutput {
    /// Files the mutating step created or modified.
    Touched(BTreeSet<String>),
    /// Structured review from a review step.
    Review(Review),
}

/// Errors raised by role handlers
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Structured output parse failed: {0}")]
    Parse(#[from] OutputParseError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{0}")]
    Other(String),
}

impl StageError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StageError::Request(RequestError::Cancelled))
    }
}

#[async_trait]
pub trait RoleHandler: Send + Sync {
    async fn handle(
        &self,
        invocation: &RoleInvocation,
        cancellation: &CancellationToken,
    ) -> Result<RoleOutput, StageError>;
}

/// Role → handler table.
#[derive(Clone, Default)]
pub struct RoleHandlers {
    handlers: HashMap<StepRole, Arc<dyn RoleHandler>>,
}

impl RoleHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The same handler for every role.
    pub fn uniform(handler: Arc<dyn RoleHandler>) -> Self {
        let mut handlers = Self::new();
        for role in StepRole::ALL {
            handlers.register(role, handler.clone());
        }
        handlers
    }

    pub fn with(mut self, role: StepRole, handler: Arc<dyn RoleHandler>) -> Self {
        self.register(role, handler);
        self
    }

    pub fn register(&mut self, role: StepRole, handler: Arc<dyn RoleHandler>) {
        self.handlers.insert(role, handler);
    }

    pub fn get(&self, role: StepRole) -> Option<&Arc<dyn RoleHandler>> {
        self.handlers.get(&role)
    }

    pub fn covers_all_roles(&self) -> bool {
        StepRole::ALL.iter().all(|r| self.handlers.contains_key(r))
    }
}

impl std::fmt::Debug for RoleHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<_> = self.handlers.keys().collect();
        roles.sort();
        f.debug_struct("RoleHandlers").field("roles", &roles).finish()
    }
}
