//! Role handler backed by the generation service.
//!
//! Mutating roles are asked to carry out their objective in the workspace
//! and report the files they touched; review roles reply with structured
//! findings. Each role talks to its own model through a session whose
//! system message describes the role.

use crate::ports::role_handler::{RoleHandler, RoleInvocation, RoleOutput, StageError};
use crate::services::request_client::RequestClient;
use async_trait::async_trait;
use conductor_domain::{
    OrchestrationPrompt, RoleModels, SessionConfiguration, StepRole, SystemMessageMode,
    parse_review_response, parse_touched_files,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct GenerationRoleHandler {
    client: Arc<RequestClient>,
    available_tools: Vec<String>,
    excluded_tools: Vec<String>,
}

impl GenerationRoleHandler {
    pub fn new(client: Arc<RequestClient>) -> Self {
        Self {
            client,
            available_tools: Vec::new(),
            excluded_tools: Vec::new(),
        }
    }

    pub fn with_available_tools(mut self, tools: Vec<String>) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_excluded_tools(mut self, tools: Vec<String>) -> Self {
        self.excluded_tools = tools;
        self
    }

    /// Session configuration used for `role`.
    pub fn configuration(&self, role: StepRole, models: &RoleModels) -> SessionConfiguration {
        SessionConfiguration::new(models.for_role(role).clone())
            .with_system_message(OrchestrationPrompt::role_system(role), SystemMessageMode::Append)
            .with_available_tools(self.available_tools.iter().cloned())
            .with_excluded_tools(self.excluded_tools.iter().cloned())
    }

    /// Configurations for every role, for session warm-up.
    pub fn configurations(&self, models: &RoleModels) -> Vec<SessionConfiguration> {
        let mut configurations: Vec<SessionConfiguration> = Vec::new();
        for role in StepRole::ALL {
            let configuration = self.configuration(role, models);
            if !configurations.contains(&configuration) {
                configurations.push(configuration);
            }
        }
        configurations
    }
}

#[async_trait]
impl RoleHandler for GenerationRoleHandler {
    async fn handle(
        &self,
        invocation: &RoleInvocation,
        cancellation: &CancellationToken,
    ) -> Result<RoleOutput, StageError> {
        let role = invocation.role;
        let configuration = self.configuration(role, &invocation.models);
        let root = invocation.workspace_root.display().to_string();

        let prompt = if role.is_mutating() {
            OrchestrationPrompt::mutating_step(
                role,
                &invocation.objective,
                &root,
                invocation.language_scope.as_ref(),
                invocation.remediation.as_deref(),
            )
        } else {
            OrchestrationPrompt::review_step(
                role,
                &invocation.objective,
                &root,
                &invocation.touched_files,
                invocation.diff.as_deref(),
                invocation.remediation.as_deref(),
            )
        };

        let reply = self
            .client
            .complete_with(&configuration, &prompt, cancellation)
            .await?;
        debug!("{} replied with {} chars", role, reply.len());

        if role.is_mutating() {
            Ok(RoleOutput::Touched(parse_touched_files(&reply)?))
        } else {
            Ok(RoleOutput::Review(parse_review_response(&reply)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RequestParams, SessionParams};
    use crate::ports::generation::{GatewayError, GenerationService, GenerationSession};
    use crate::services::session_manager::SessionManager;
    use conductor_domain::{Model, SessionEvent, Severity};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies to every prompt with the next canned text and records the
    /// configuration each session was opened with.
    #[derive(Default)]
    struct CannedService {
        replies: Arc<Mutex<VecDeque<String>>>,
        opened: Mutex<Vec<SessionConfiguration>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    struct CannedSession {
        replies: Arc<Mutex<VecDeque<String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
        pending: Option<String>,
    }

    #[async_trait]
    impl GenerationSession for CannedSession {
        fn session_id(&self) -> &str {
            "canned"
        }

        async fn send(&mut self, prompt: &str) -> Result<(), GatewayError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.pending = self.replies.lock().unwrap().pop_front();
            Ok(())
        }

        async fn next_event(&mut self) -> Option<SessionEvent> {
            self.pending.take().map(SessionEvent::Message)
        }

        async fn abort(&mut self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    #[async_trait]
    impl GenerationService for CannedService {
        async fn open_session(
            &self,
            configuration: &SessionConfiguration,
        ) -> Result<Box<dyn GenerationSession>, GatewayError> {
            self.opened.lock().unwrap().push(configuration.clone());
            Ok(Box::new(CannedSession {
                replies: self.replies.clone(),
                prompts: self.prompts.clone(),
                pending: None,
            }))
        }
    }

    fn handler(service: Arc<CannedService>, replies: &[&str]) -> GenerationRoleHandler {
        service
            .replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| r.to_string()));
        let sessions = Arc::new(SessionManager::new(service, SessionParams::default()));
        let client = Arc::new(RequestClient::new(sessions, RequestParams::default()));
        GenerationRoleHandler::new(client).with_excluded_tools(vec!["Shell".into()])
    }

    #[tokio::test]
    async fn test_mutating_role_reports_touched_files() {
        let service = Arc::new(CannedService::default());
        let handler = handler(
            service.clone(),
            &[r#"Done. ```json
{"filesTouched": ["./src/lib.rs", "src/new.rs"]}
```"#],
        );
        let invocation =
            RoleInvocation::new(StepRole::Builder, "Add parser", "/work", RoleModels::default());

        let output = handler
            .handle(&invocation, &CancellationToken::new())
            .await
            .unwrap();

        let RoleOutput::Touched(files) = output else {
            panic!("expected touched files");
        };
        assert!(files.contains("src/lib.rs"));
        assert!(files.contains("src/new.rs"));

        let opened = service.opened.lock().unwrap();
        assert_eq!(opened[0].model(), &Model::Gpt53Codex);
        assert!(opened[0].excluded_tools().contains("shell"));
        assert!(service.prompts.lock().unwrap()[0].contains("Add parser"));
    }

    #[tokio::test]
    async fn test_review_role_returns_review() {
        let service = Arc::new(CannedService::default());
        let handler = handler(
            service.clone(),
            &[r#"{"findings": [{"severity": "high", "rule": "layering", "rationale": "domain imports tokio"}], "requiredActions": ["Move I/O out"]}"#],
        );
        let invocation = RoleInvocation::new(
            StepRole::FinalReview,
            "Final review",
            "/work",
            RoleModels::default(),
        )
        .with_diff(Some("+++ b/src/lib.rs".into()));

        let output = handler
            .handle(&invocation, &CancellationToken::new())
            .await
            .unwrap();

        let RoleOutput::Review(review) = output else {
            panic!("expected review");
        };
        assert_eq!(review.count(Severity::High), 1);
        assert_eq!(service.opened.lock().unwrap()[0].model(), &Model::ClaudeOpus46);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_parse_error() {
        let service = Arc::new(CannedService::default());
        let handler = handler(service, &["I could not finish the task."]);
        let invocation =
            RoleInvocation::new(StepRole::StyleReview, "Style", "/work", RoleModels::default());

        let err = handler
            .handle(&invocation, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Parse(_)));
    }

    #[test]
    fn test_configurations_are_deduplicated() {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(CannedService::default()),
            SessionParams::default(),
        ));
        let client = Arc::new(RequestClient::new(sessions, RequestParams::default()));
        let handler = GenerationRoleHandler::new(client);

        // Every role has its own system message, so no two collapse.
        assert_eq!(handler.configurations(&RoleModels::default()).len(), 4);
    }
}
