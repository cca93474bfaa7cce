//! JSON-RPC protocol types for Copilot CLI communication.
//!
//! This module defines the message structures used in the JSON-RPC 2.0 protocol
//! for communicating with the Copilot CLI process.
//!
//! # Protocol Overview
//!
//! - **Requests**: Client → Copilot CLI (`session.create`, `session.send`,
//!   `session.abort`, `session.destroy`)
//! - **Responses**: Copilot CLI → Client (result or error)
//! - **Notifications**: Copilot CLI → Client (`session.event` carrying
//!   `assistant.message.delta`, `session.idle`, ...)
//! - **Incoming requests**: Copilot CLI → Client, answered with
//!   [`JsonRpcErrorOut`] since this adapter exposes no client-side tools

use conductor_domain::SessionConfiguration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for JSON-RPC requests.
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC request with an auto-generated ID.
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: next_id(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Notification from server (`session.event`, etc.)
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// Error reply to an incoming request from the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorOut {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub error: RpcError,
}

impl JsonRpcErrorOut {
    /// JSON-RPC "method not found".
    pub const METHOD_NOT_FOUND: i64 = -32601;

    pub fn new(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: RpcError {
                code,
                message: message.into(),
                data: None,
            },
        }
    }
}

/// System message attached to a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemMessage {
    pub mode: &'static str,
    pub content: String,
}

/// Session creation parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<SystemMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_tools: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    pub streaming: bool,
}

impl CreateSessionParams {
    /// Build the `session.create` payload for a session configuration.
    pub fn from_configuration(
        configuration: &SessionConfiguration,
        working_directory: Option<&Path>,
    ) -> Self {
        let system_message = configuration.system_message().map(|content| SystemMessage {
            mode: configuration.system_message_mode().as_str(),
            content: content.to_string(),
        });

        Self {
            model: configuration.model().to_string(),
            system_message,
            available_tools: configuration.available_tools().iter().cloned().collect(),
            excluded_tools: configuration.excluded_tools().iter().cloned().collect(),
            working_directory: working_directory.map(|p| p.display().to_string()),
            streaming: true,
        }
    }
}

/// Parameters for requests that only name a session
/// (`session.abort`, `session.destroy`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

/// Send parameters (for session.send)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    pub session_id: String,
    pub prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{Model, SystemMessageMode};

    #[test]
    fn create_session_params_carry_the_configuration() {
        let configuration = SessionConfiguration::new(Model::ClaudeSonnet46)
            .with_system_message("You review code.", SystemMessageMode::Replace)
            .with_available_tools(["Read", "grep"])
            .with_excluded_tools(["shell"]);

        let params =
            CreateSessionParams::from_configuration(&configuration, Some(Path::new("/work")));
        let json = serde_json::to_value(&params).unwrap();

        assert_eq!(json["model"], Model::ClaudeSonnet46.as_str());
        assert_eq!(json["systemMessage"]["mode"], "replace");
        assert_eq!(json["systemMessage"]["content"], "You review code.");
        assert_eq!(json["availableTools"], serde_json::json!(["grep", "read"]));
        assert_eq!(json["excludedTools"], serde_json::json!(["shell"]));
        assert_eq!(json["workingDirectory"], "/work");
        assert_eq!(json["streaming"], true);
    }

    #[test]
    fn empty_fields_are_omitted() {
        let configuration = SessionConfiguration::new(Model::Gpt53Codex);
        let json =
            serde_json::to_value(CreateSessionParams::from_configuration(&configuration, None))
                .unwrap();

        assert!(json.get("systemMessage").is_none());
        assert!(json.get("availableTools").is_none());
        assert!(json.get("excludedTools").is_none());
        assert!(json.get("workingDirectory").is_none());
    }

    #[test]
    fn request_ids_increase() {
        let a = JsonRpcRequest::new("session.send", None);
        let b = JsonRpcRequest::new("session.send", None);
        assert!(b.id > a.id);
        let json = serde_json::to_value(&a).unwrap();
        assert!(json.get("params").is_none());
        assert_eq!(json["jsonrpc"], "2.0");
    }

    #[test]
    fn error_reply_serializes() {
        let reply = JsonRpcErrorOut::new(7, JsonRpcErrorOut::METHOD_NOT_FOUND, "no tools here");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["error"]["code"], -32601);
        assert_eq!(json["error"]["message"], "no tools here");
        assert!(json["error"].get("data").is_none());
    }
}
