//! Generation service port
//!
//! Defines the interface for talking to the external text-generation
//! service, and the error type every adapter maps its failures onto.
//!
//! Failures are classified once, at the boundary, into a [`FailureKind`];
//! the request client drives its retry loop from that kind instead of
//! inspecting error text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_domain::{SessionConfiguration, SessionEvent};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// HTTP status codes that carry a classification, as standalone numbers only.
static STATUS_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(400|401|403|429)\b").expect("status code pattern is valid"));

/// How a failed call should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retrying cannot help (bad credentials, unknown model, bad request).
    Permanent,
    /// Likely to succeed on a later attempt.
    Transient,
    /// Not recognized; retried like a transient failure.
    Unclassified,
}

/// Which timeout bound ended a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutBound {
    Inactivity,
    Absolute,
}

impl std::fmt::Display for TimeoutBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutBound::Inactivity => f.write_str("inactivity"),
            TimeoutBound::Absolute => f.write_str("absolute"),
        }
    }
}

/// Diagnostics captured when a completion times out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimeout {
    pub bound: TimeoutBound,
    pub limit: Duration,
    pub last_event_type: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    /// The remote side had asked for clarification and was waiting.
    pub awaiting_clarification: bool,
    /// At most 140 characters of the prompt.
    pub prompt_preview: String,
}

impl std::fmt::Display for SessionTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last_event = match (&self.last_event_type, &self.last_event_at) {
            (Some(kind), Some(at)) => format!("{} at {}", kind, at.to_rfc3339()),
            _ => "none".to_string(),
        };
        write!(
            f,
            "Session {} timeout after {:?} (last event: {}, awaiting clarification: {}, prompt: \"{}\")",
            self.bound, self.limit, last_event, self.awaiting_clarification, self.prompt_preview
        )
    }
}

/// Errors that can occur during generation service operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Model not available: {0}")]
    InvalidModel(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Remote timeout: {0}")]
    RemoteTimeout(String),

    #[error("Remote cancelled the request: {0}")]
    RemoteCancelled(String),

    #[error("{0}")]
    Timeout(Box<SessionTimeout>),

    #[error("Transport closed")]
    TransportClosed,

    #[error("Session error: {0}")]
    Session(String),

    /// Cancelled by our own cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Classify free-form error text coming from the remote side.
    ///
    /// Used for session `error` events and JSON-RPC error objects. Text that
    /// matches nothing becomes [`GatewayError::Session`] (unclassified).
    pub fn from_remote_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        let codes: Vec<&str> = STATUS_CODE.find_iter(&lower).map(|m| m.as_str()).collect();
        let status = |wanted: &[&str]| codes.iter().any(|c| wanted.contains(c));
        let message = message.to_string();

        if status(&["429"]) || has(&["rate limit", "rate-limit", "too many requests"]) {
            GatewayError::RateLimited(message)
        } else if status(&["401", "403"])
            || has(&["unauthorized", "forbidden", "authentication", "not authenticated"])
        {
            GatewayError::Authentication(message)
        } else if lower.contains("model")
            && has(&["not found", "unsupported", "invalid", "not available", "unknown"])
        {
            GatewayError::InvalidModel(message)
        } else if status(&["400"]) || has(&["malformed", "invalid request", "bad request"]) {
            GatewayError::MalformedRequest(message)
        } else if has(&["timeout", "timed out"]) {
            GatewayError::RemoteTimeout(message)
        } else if has(&["cancel"]) {
            GatewayError::RemoteCancelled(message)
        } else if has(&["connection reset", "connection refused", "econnreset", "econnrefused", "network", "broken pipe"]) {
            GatewayError::Connection(message)
        } else {
            GatewayError::Session(message)
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::Authentication(_)
            | GatewayError::InvalidModel(_)
            | GatewayError::MalformedRequest(_)
            | GatewayError::Cancelled => FailureKind::Permanent,
            GatewayError::RateLimited(_)
            | GatewayError::Connection(_)
            | GatewayError::RemoteTimeout(_)
            | GatewayError::RemoteCancelled(_)
            | GatewayError::Timeout(_)
            | GatewayError::TransportClosed => FailureKind::Transient,
            GatewayError::Session(_) => FailureKind::Unclassified,
        }
    }

    /// Check if this error represents a local cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }

    /// Whether the cached session is unusable after this error.
    ///
    /// A timed-out turn was aborted, but its late events could still reach
    /// the session, so it is replaced as well.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            GatewayError::TransportClosed
                | GatewayError::Connection(_)
                | GatewayError::Session(_)
                | GatewayError::Timeout(_)
        )
    }

    pub fn timeout(&self) -> Option<&SessionTimeout> {
        match self {
            GatewayError::Timeout(t) => Some(t),
            _ => None,
        }
    }
}

/// Gateway to the generation service
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Open a new stateful session shaped by `configuration`.
    async fn open_session(
        &self,
        configuration: &SessionConfiguration,
    ) -> Result<Box<dyn GenerationSession>, GatewayError>;
}

/// An open multi-turn session.
///
/// Callers hold exclusive access (`&mut self`) for a whole completion, which
/// keeps turn order intact.
#[async_trait]
pub trait GenerationSession: Send {
    /// Identifier assigned by the service, for logs.
    fn session_id(&self) -> &str;

    /// Submit a prompt; the reply arrives through [`next_event`](Self::next_event).
    async fn send(&mut self, prompt: &str) -> Result<(), GatewayError>;

    /// Next event of the current reply, or `None` once the stream is closed.
    ///
    /// Must be cancel-safe: dropping the future loses no event.
    async fn next_event(&mut self) -> Option<SessionEvent>;

    /// Abort the in-flight reply.
    async fn abort(&mut self) -> Result<(), GatewayError>;

    /// Release the session on the service side.
    async fn close(&mut self) -> Result<(), GatewayError>;
}
