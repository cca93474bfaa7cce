//! Copilot session
//!
//! [`CopilotSession`] implements the [`GenerationSession`] port on top of a
//! routed [`SessionChannel`]. Turning the event stream into one reply is the
//! session manager's job; this type only sends requests and translates events.

use crate::copilot::error::Result;
use crate::copilot::protocol::{JsonRpcRequest, SendParams, SessionRef};
use crate::copilot::router::{MessageRouter, RoutedMessage, SessionChannel};
use crate::copilot::transport::to_session_event;
use async_trait::async_trait;
use conductor_application::ports::generation::{GatewayError, GenerationSession};
use conductor_domain::SessionEvent;
use std::sync::Arc;
use tracing::{debug, warn};

/// An open Copilot CLI session bound to one session configuration.
pub struct CopilotSession {
    channel: SessionChannel,
    model: String,
    /// Id of an unanswered user-input request, rejected on abort.
    pending_input: Option<u64>,
}

impl CopilotSession {
    pub fn new(channel: SessionChannel, model: impl Into<String>) -> Self {
        Self {
            channel,
            model: model.into(),
            pending_input: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn router(&self) -> &Arc<MessageRouter> {
        self.channel.router()
    }

    async fn session_request(&self, method: &str) -> Result<()> {
        let params = SessionRef {
            session_id: self.channel.session_id().to_string(),
        };
        let request = JsonRpcRequest::new(method, Some(serde_json::to_value(&params)?));
        self.router().request(&request).await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationSession for CopilotSession {
    fn session_id(&self) -> &str {
        self.channel.session_id()
    }

    async fn send(&mut self, prompt: &str) -> std::result::Result<(), GatewayError> {
        let stale = self.channel.drain();
        if stale > 0 {
            debug!(
                "Session {}: discarded {} stale event(s) before send",
                self.channel.session_id(),
                stale
            );
        }
        self.pending_input = None;

        let params = SendParams {
            session_id: self.channel.session_id().to_string(),
            prompt: prompt.to_string(),
        };
        let value = serde_json::to_value(&params)
            .map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;
        let request = JsonRpcRequest::new("session.send", Some(value));

        debug!(
            "session.send to {} ({}, {} chars)",
            self.channel.session_id(),
            self.model,
            prompt.len()
        );
        self.router().request(&request).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.channel.recv().await? {
            RoutedMessage::SessionEvent { event_type, event } => {
                Some(to_session_event(&event_type, &event))
            }
            RoutedMessage::InputRequested {
                request_id,
                question,
            } => {
                self.pending_input = Some(request_id);
                Some(SessionEvent::AwaitingInput(question))
            }
        }
    }

    async fn abort(&mut self) -> std::result::Result<(), GatewayError> {
        if let Some(request_id) = self.pending_input.take()
            && let Err(e) = self
                .router()
                .reject_request(request_id, "No user is available to answer")
                .await
        {
            warn!("Failed to reject input request {}: {}", request_id, e);
        }
        self.session_request("session.abort").await?;
        Ok(())
    }

    async fn close(&mut self) -> std::result::Result<(), GatewayError> {
        self.session_request("session.destroy").await?;
        debug!("Session {} destroyed", self.channel.session_id());
        Ok(())
    }
}
