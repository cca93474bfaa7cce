//! Copilot generation service implementation

use crate::copilot::error::CopilotError;
use crate::copilot::protocol::CreateSessionParams;
use crate::copilot::router::MessageRouter;
use crate::copilot::session::CopilotSession;
use async_trait::async_trait;
use conductor_application::ports::generation::{
    GatewayError, GenerationService, GenerationSession,
};
use conductor_domain::SessionConfiguration;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Default executable name of the Copilot CLI.
pub const DEFAULT_COPILOT_COMMAND: &str = "copilot";

/// Generation service backed by a GitHub Copilot CLI server process.
///
/// One CLI process serves every session; sessions are created in
/// `working_directory` so that file edits land in the run's workspace.
pub struct CopilotGenerationService {
    router: Arc<MessageRouter>,
    working_directory: Option<PathBuf>,
}

impl CopilotGenerationService {
    /// Spawn `copilot --server` and connect to it.
    pub async fn new() -> Result<Self, GatewayError> {
        Self::with_command(DEFAULT_COPILOT_COMMAND).await
    }

    /// Spawn a custom CLI executable.
    pub async fn with_command(command: &str) -> Result<Self, GatewayError> {
        let router = MessageRouter::spawn(command)
            .await
            .map_err(|e| GatewayError::Connection(format!("{command}: {e}")))?;

        info!("CopilotGenerationService initialized ({})", command);
        Ok(Self::with_router(router))
    }

    /// Use an existing router.
    pub fn with_router(router: Arc<MessageRouter>) -> Self {
        Self {
            router,
            working_directory: None,
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }
}

#[async_trait]
impl GenerationService for CopilotGenerationService {
    async fn open_session(
        &self,
        configuration: &SessionConfiguration,
    ) -> Result<Box<dyn GenerationSession>, GatewayError> {
        let params = CreateSessionParams::from_configuration(
            configuration,
            self.working_directory.as_deref(),
        );
        let model = params.model.clone();

        let channel = self
            .router
            .create_session(params)
            .await
            .map_err(|e| match e {
                CopilotError::RpcError { .. } => GatewayError::from(e),
                other => GatewayError::Session(format!("session.create failed: {other}")),
            })?;

        info!("Opened session {} ({})", channel.session_id(), model);
        Ok(Box::new(CopilotSession::new(channel, model)))
    }
}
