//! Scripted collaborators shared by the service and use-case tests.

use crate::config::LoopParams;
use crate::ports::diff_provider::{DiffError, DiffProvider};
use crate::ports::event_sink::{EventSink, RunEvent};
use crate::ports::progress::NoProgress;
use crate::ports::prompt_builder::TemplatePromptBuilder;
use crate::ports::role_handler::{RoleHandler, RoleHandlers, RoleInvocation, RoleOutput, StageError};
use crate::services::dispatch::DispatchContext;
use async_trait::async_trait;
use conductor_domain::{Finding, Review, RoleModels, Severity};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Replays scripted outputs in order, then repeats `fallback` forever.
pub(crate) struct ScriptedHandler {
    outputs: Mutex<VecDeque<Result<RoleOutput, StageError>>>,
    fallback: RoleOutput,
    pub calls: Mutex<Vec<RoleInvocation>>,
}

impl ScriptedHandler {
    pub fn repeating(fallback: RoleOutput) -> Arc<Self> {
        Self::scripted(vec![], fallback)
    }

    pub fn scripted(outputs: Vec<Result<RoleOutput, StageError>>, fallback: RoleOutput) -> Arc<Self> {
        Arc::new(Self {
            outputs: Mutex::new(outputs.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn invocations(&self) -> Vec<RoleInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoleHandler for ScriptedHandler {
    async fn handle(
        &self,
        invocation: &RoleInvocation,
        _cancellation: &CancellationToken,
    ) -> Result<RoleOutput, StageError> {
        self.calls.lock().unwrap().push(invocation.clone());
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.event_type).collect()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub(crate) struct StaticDiff {
    pub diff: String,
    pub changed: BTreeSet<String>,
}

impl StaticDiff {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            diff: String::new(),
            changed: BTreeSet::new(),
        })
    }
}

#[async_trait]
impl DiffProvider for StaticDiff {
    async fn diff(&self) -> Result<String, DiffError> {
        Ok(self.diff.clone())
    }

    async fn changed_files(&self) -> Result<BTreeSet<String>, DiffError> {
        Ok(self.changed.clone())
    }
}

pub(crate) fn touched(files: &[&str]) -> RoleOutput {
    RoleOutput::Touched(files.iter().map(|f| f.to_string()).collect())
}

pub(crate) fn high_review(rule: &str) -> Review {
    Review::new(
        vec![Finding::new(Severity::High, rule, "layering violated").with_file("src/lib.rs")],
        vec!["Fix the layering".to_string()],
    )
}

pub(crate) fn clean_review() -> Review {
    Review::new(vec![], vec![])
}

pub(crate) fn context(handlers: RoleHandlers, sink: Arc<RecordingSink>) -> DispatchContext {
    DispatchContext {
        run_id: "test-run".to_string(),
        workspace_root: "/work".into(),
        models: RoleModels::default(),
        handlers,
        diff: StaticDiff::empty(),
        events: sink,
        progress: Arc::new(NoProgress),
        prompts: Arc::new(TemplatePromptBuilder),
        loop_params: LoopParams::default(),
        cancellation: CancellationToken::new(),
    }
}
