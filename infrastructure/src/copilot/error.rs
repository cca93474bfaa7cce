//! Error types for the Copilot adapter

use conductor_application::ports::generation::GatewayError;
use thiserror::Error;

/// Result type alias for Copilot operations
pub type Result<T> = std::result::Result<T, CopilotError>;

/// Errors that can occur when communicating with Copilot CLI
#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("Failed to spawn Copilot process: {0}")]
    SpawnError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("JSON-RPC error (code {code}): {message}")]
    RpcError { code: i64, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Transport closed")]
    TransportClosed,

    /// The background reader task has ended; no further messages will arrive.
    #[error("Message router stopped")]
    RouterStopped,

    #[error("Request timeout: {0}")]
    Timeout(String),
}

impl From<CopilotError> for GatewayError {
    fn from(err: CopilotError) -> Self {
        match err {
            CopilotError::SpawnError(e) => GatewayError::Connection(e.to_string()),
            CopilotError::SerializationError(e) => GatewayError::MalformedRequest(e.to_string()),
            CopilotError::RpcError { message, .. } => GatewayError::from_remote_message(&message),
            CopilotError::UnexpectedResponse(message) => GatewayError::Session(message),
            CopilotError::TransportClosed | CopilotError::RouterStopped => {
                GatewayError::TransportClosed
            }
            CopilotError::Timeout(message) => GatewayError::RemoteTimeout(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_application::ports::generation::FailureKind;

    #[test]
    fn rpc_errors_are_classified_by_text() {
        let err: GatewayError = CopilotError::RpcError {
            code: -32000,
            message: "429 Too Many Requests".into(),
        }
        .into();
        assert!(matches!(err, GatewayError::RateLimited(_)));

        let err: GatewayError = CopilotError::RpcError {
            code: -32000,
            message: "Unauthorized: token expired".into(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::Permanent);
    }

    #[test]
    fn stopped_router_invalidates_the_session() {
        let err: GatewayError = CopilotError::RouterStopped.into();
        assert!(matches!(err, GatewayError::TransportClosed));
        assert!(err.invalidates_session());
    }

    #[test]
    fn spawn_failure_is_a_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "copilot: not found");
        let err: GatewayError = CopilotError::from(io).into();
        assert!(matches!(err, GatewayError::Connection(_)));
        assert_eq!(err.kind(), FailureKind::Transient);
    }
}
