//! Events emitted by a generation session while it answers a prompt.
//!
//! [`SessionEvent`] bridges the transport-level stream (e.g. Copilot CLI
//! `session.event` notifications) to the session manager, which turns a
//! sequence of events into one completed reply.

/// An event in a generation session's reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A text chunk (`assistant.message.delta`).
    Delta(String),
    /// The complete reply text (`assistant.message`).
    Message(String),
    /// The session finished its turn (`session.idle`).
    Idle,
    /// The session failed (`session.error`).
    Error(String),
    /// The remote side is waiting for user clarification.
    AwaitingInput(String),
    /// Any other event kind, kept only for diagnostics.
    Other(String),
}

impl SessionEvent {
    /// Stable name of the event kind, used in timeout diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            SessionEvent::Delta(_) => "assistant.message.delta",
            SessionEvent::Message(_) => "assistant.message",
            SessionEvent::Idle => "session.idle",
            SessionEvent::Error(_) => "session.error",
            SessionEvent::AwaitingInput(_) => "user_input.requested",
            SessionEvent::Other(kind) => kind,
        }
    }

    /// Returns true if this event ends the reply.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Message(_) | SessionEvent::Idle | SessionEvent::Error(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events() {
        assert!(SessionEvent::Message("done".into()).is_terminal());
        assert!(SessionEvent::Idle.is_terminal());
        assert!(SessionEvent::Error("boom".into()).is_terminal());
        assert!(!SessionEvent::Delta("par".into()).is_terminal());
        assert!(!SessionEvent::AwaitingInput("which file?".into()).is_terminal());
    }

    #[test]
    fn other_events_keep_their_kind() {
        assert_eq!(SessionEvent::Other("tool.execution_start".into()).kind(), "tool.execution_start");
        assert_eq!(SessionEvent::Idle.kind(), "session.idle");
    }
}
