//! Transport layer helpers for Copilot CLI communication.
//!
//! Pure functions used by the [`MessageRouter`](super::router::MessageRouter)'s
//! background reader task and by [`CopilotSession`](super::session::CopilotSession):
//!
//! - [`classify_message`] inspects `id` / `method` to decide how a frame is
//!   dispatched (response correlation, session routing, incoming request).
//! - [`to_session_event`] maps a raw `session.event` payload onto the
//!   adapter-neutral [`SessionEvent`].

use conductor_domain::SessionEvent;

/// Classification of an incoming JSON-RPC message.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// A response to a request we sent (has `id`, no `method`).
    Response,
    /// A request from the CLI (has `id` + `method`).
    IncomingRequest { id: u64 },
    /// A notification (has `method`, no `id`), e.g. `session.event`.
    Notification,
}

/// Classify a JSON-RPC message by inspecting `id` and `method` fields.
pub fn classify_message(json: &serde_json::Value) -> MessageKind {
    let has_id = json.get("id").and_then(|v| v.as_u64());
    let has_method = json.get("method").and_then(|v| v.as_str());

    match (has_id, has_method) {
        (Some(id), Some(_)) => MessageKind::IncomingRequest { id },
        (Some(_), None) => MessageKind::Response,
        _ => MessageKind::Notification,
    }
}

/// Whether an incoming request (or event type) asks the user a question.
pub fn is_user_input_request(method: &str) -> bool {
    let lower = method.to_ascii_lowercase();
    lower.contains("user_input") || lower.contains("userinput") || lower.contains("ask_user")
}

/// Try to extract text content from a session event's data payload.
///
/// Handles the shapes the CLI uses:
///
/// - `{ "data": { "content": "text" } }`
/// - `{ "data": { "content": [{ "type": "text", "text": "..." }] } }`
/// - `{ "data": { "message": { "content": "text" } } }`
/// - `{ "data": { "text": "..." } }`
pub fn extract_event_text(event: &serde_json::Value) -> Option<String> {
    let data = event.get("data")?;

    if let Some(s) = data.get("content").and_then(|c| c.as_str())
        && !s.is_empty()
    {
        return Some(s.to_string());
    }

    if let Some(arr) = data.get("content").and_then(|c| c.as_array()) {
        let text = arr
            .iter()
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n");
        if !text.is_empty() {
            return Some(text);
        }
    }

    if let Some(s) = data
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        && !s.is_empty()
    {
        return Some(s.to_string());
    }

    if let Some(s) = data.get("text").and_then(|t| t.as_str())
        && !s.is_empty()
    {
        return Some(s.to_string());
    }

    None
}

/// Map a `session.event` payload onto a [`SessionEvent`].
pub fn to_session_event(event_type: &str, event: &serde_json::Value) -> SessionEvent {
    match event_type {
        "assistant.message.delta" => {
            let chunk = event
                .get("data")
                .and_then(|d| d.get("deltaContent").or_else(|| d.get("content")))
                .and_then(|c| c.as_str())
                .unwrap_or_default();
            SessionEvent::Delta(chunk.to_string())
        }
        "assistant.message" | "assistant.message.completed" => {
            SessionEvent::Message(extract_event_text(event).unwrap_or_default())
        }
        "session.idle" => SessionEvent::Idle,
        "session.error" => {
            let message = event
                .get("data")
                .and_then(|d| d.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown session error");
            SessionEvent::Error(message.to_string())
        }
        other if is_user_input_request(other) => {
            let question = event
                .get("data")
                .and_then(|d| d.get("question").or_else(|| d.get("prompt")))
                .and_then(|q| q.as_str())
                .unwrap_or_default();
            SessionEvent::AwaitingInput(question.to_string())
        }
        other => SessionEvent::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_response() {
        let json = json!({"id": 1, "result": {}});
        assert_eq!(classify_message(&json), MessageKind::Response);
    }

    #[test]
    fn classify_incoming_request() {
        let json = json!({"id": 1, "method": "tool.call", "params": {}});
        assert_eq!(
            classify_message(&json),
            MessageKind::IncomingRequest { id: 1 }
        );
    }

    #[test]
    fn classify_notification() {
        let json = json!({"method": "session.event", "params": {}});
        assert_eq!(classify_message(&json), MessageKind::Notification);
    }

    #[test]
    fn classify_no_id_no_method() {
        let json = json!({"data": "something"});
        assert_eq!(classify_message(&json), MessageKind::Notification);
    }

    #[test]
    fn extract_text_from_content_blocks_array() {
        let event = json!({
            "type": "assistant.message",
            "data": {
                "content": [
                    { "type": "tool_use", "name": "view", "input": {} },
                    { "type": "text", "text": "First block" },
                    { "type": "text", "text": "Second block" }
                ]
            }
        });
        assert_eq!(
            extract_event_text(&event).as_deref(),
            Some("First block\nSecond block")
        );
    }

    #[test]
    fn extract_text_from_message_content() {
        let event = json!({
            "data": { "message": { "role": "assistant", "content": "Nested content" } }
        });
        assert_eq!(extract_event_text(&event).as_deref(), Some("Nested content"));
    }

    #[test]
    fn extract_text_returns_none_for_empty() {
        assert!(extract_event_text(&json!({"data": {"content": ""}})).is_none());
        assert!(extract_event_text(&json!({"type": "assistant.message"})).is_none());
    }

    #[test]
    fn maps_reply_events() {
        let delta = json!({"type": "assistant.message.delta", "data": {"deltaContent": "Hel"}});
        assert_eq!(
            to_session_event("assistant.message.delta", &delta),
            SessionEvent::Delta("Hel".into())
        );

        let legacy = json!({"data": {"content": "lo"}});
        assert_eq!(
            to_session_event("assistant.message.delta", &legacy),
            SessionEvent::Delta("lo".into())
        );

        let message = json!({"data": {"content": "Hello"}});
        assert_eq!(
            to_session_event("assistant.message", &message),
            SessionEvent::Message("Hello".into())
        );
        assert_eq!(to_session_event("session.idle", &json!({})), SessionEvent::Idle);
    }

    #[test]
    fn maps_error_and_clarification_events() {
        let error = json!({"data": {"message": "429 rate limit"}});
        assert_eq!(
            to_session_event("session.error", &error),
            SessionEvent::Error("429 rate limit".into())
        );
        assert_eq!(
            to_session_event("session.error", &json!({})),
            SessionEvent::Error("Unknown session error".into())
        );

        let ask = json!({"data": {"question": "Which crate?"}});
        assert_eq!(
            to_session_event("user_input.requested", &ask),
            SessionEvent::AwaitingInput("Which crate?".into())
        );
    }

    #[test]
    fn unknown_events_are_opaque() {
        assert_eq!(
            to_session_event("tool.execution_start", &json!({})),
            SessionEvent::Other("tool.execution_start".into())
        );
    }
}
