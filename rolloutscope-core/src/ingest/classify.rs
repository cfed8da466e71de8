//! Message classification
//!
//! Assigns every validated entry a semantic role. The chunk builder uses it
//! to detect user turns, the session parser to count them, and hosts use the
//! [`ClassifiedEntry`] text for full-text search.

use crate::ingest::entry::{EventPayload, LogEntry, MessageRole, ResponseItemPayload};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Semantic role of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    Developer,
    FunctionCall,
    FunctionOutput,
    Reasoning,
    Event,
    Other,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
            MessageKind::Developer => "developer",
            MessageKind::FunctionCall => "function_call",
            MessageKind::FunctionOutput => "function_output",
            MessageKind::Reasoning => "reasoning",
            MessageKind::Event => "event",
            MessageKind::Other => "other",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify an entry. First match wins:
///
/// | Check | Kind |
/// |-------|------|
/// | user-role message, `user_message` event | user |
/// | assistant-role message, `agent_message` / `agent_reasoning` event | assistant |
/// | `function_call` | function_call |
/// | `function_call_output` | function_output |
/// | `reasoning` item, `agent_reasoning` event | reasoning |
/// | developer-role message | developer |
/// | any other `event_msg` | event |
/// | anything else | other |
///
/// The assistant check runs before the reasoning check, so an
/// `agent_reasoning` event is always classified assistant.
pub fn classify(entry: &LogEntry) -> MessageKind {
    if is_user(entry) {
        MessageKind::User
    } else if is_assistant(entry) {
        MessageKind::Assistant
    } else if matches!(
        entry.response_payload(),
        Some(ResponseItemPayload::FunctionCall { .. })
    ) {
        MessageKind::FunctionCall
    } else if matches!(
        entry.response_payload(),
        Some(ResponseItemPayload::FunctionCallOutput { .. })
    ) {
        MessageKind::FunctionOutput
    } else if is_reasoning(entry) {
        MessageKind::Reasoning
    } else if message_role(entry) == Some(MessageRole::Developer) {
        MessageKind::Developer
    } else if matches!(entry, LogEntry::EventMsg(_)) {
        MessageKind::Event
    } else {
        MessageKind::Other
    }
}

fn message_role(entry: &LogEntry) -> Option<MessageRole> {
    match entry.response_payload() {
        Some(ResponseItemPayload::Message(msg)) => Some(msg.role),
        _ => None,
    }
}

fn is_user(entry: &LogEntry) -> bool {
    message_role(entry) == Some(MessageRole::User)
        || matches!(entry.event_payload(), Some(EventPayload::UserMessage { .. }))
}

fn is_assistant(entry: &LogEntry) -> bool {
    message_role(entry) == Some(MessageRole::Assistant)
        || matches!(
            entry.event_payload(),
            Some(EventPayload::AgentMessage { .. } | EventPayload::AgentReasoning { .. })
        )
}

fn is_reasoning(entry: &LogEntry) -> bool {
    matches!(
        entry.response_payload(),
        Some(ResponseItemPayload::Reasoning { .. })
    ) || matches!(
        entry.event_payload(),
        Some(EventPayload::AgentReasoning { .. })
    )
}

/// Searchable text of an entry; empty for entries without prose.
pub fn searchable_text(entry: &LogEntry) -> String {
    match entry {
        LogEntry::ResponseItem(item) => match &item.payload {
            ResponseItemPayload::Message(msg) => msg.text(),
            ResponseItemPayload::FunctionCall {
                name, arguments, ..
            } => format!("{} {}", name, arguments),
            ResponseItemPayload::FunctionCallOutput { output, .. } => output.clone(),
            ResponseItemPayload::Reasoning { summary, .. } => summary.join("\n"),
        },
        LogEntry::EventMsg(event) => match &event.payload {
            EventPayload::AgentReasoning { text } => text.clone(),
            EventPayload::AgentMessage { message } | EventPayload::UserMessage { message, .. } => {
                message.clone()
            }
            EventPayload::TokenCount { .. } | EventPayload::ContextCompacted => String::new(),
        },
        LogEntry::Compacted(c) => c.message.clone().unwrap_or_default(),
        LogEntry::SessionMeta(_) | LogEntry::TurnContext(_) => String::new(),
    }
}

/// An entry's classification, as handed to search indexing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEntry {
    /// Position of the entry in [`ParsedSession::entries`](crate::ingest::ParsedSession)
    pub index: usize,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl ClassifiedEntry {
    pub fn new(index: usize, entry: &LogEntry) -> Self {
        Self {
            index,
            kind: classify(entry),
            timestamp: entry.timestamp(),
            text: searchable_text(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::entry::validate;
    use serde_json::{json, Value};

    fn entry(kind: &str, payload: Value) -> LogEntry {
        validate(&json!({
            "timestamp": "2025-11-24T19:33:35Z",
            "type": kind,
            "payload": payload
        }))
        .expect("fixture entry should validate")
    }

    fn message(role: &str) -> LogEntry {
        entry(
            "response_item",
            json!({
                "type": "message",
                "role": role,
                "content": [{ "type": "input_text", "text": "hi" }]
            }),
        )
    }

    #[test]
    fn test_message_roles() {
        assert_eq!(classify(&message("user")), MessageKind::User);
        assert_eq!(classify(&message("assistant")), MessageKind::Assistant);
        assert_eq!(classify(&message("developer")), MessageKind::Developer);
    }

    #[test]
    fn test_events() {
        let user = entry(
            "event_msg",
            json!({ "type": "user_message", "message": "hi" }),
        );
        assert_eq!(classify(&user), MessageKind::User);

        let agent = entry(
            "event_msg",
            json!({ "type": "agent_message", "message": "ok" }),
        );
        assert_eq!(classify(&agent), MessageKind::Assistant);

        let tokens = entry("event_msg", json!({ "type": "token_count", "info": null }));
        assert_eq!(classify(&tokens), MessageKind::Event);

        let compacted = entry("event_msg", json!({ "type": "context_compacted" }));
        assert_eq!(classify(&compacted), MessageKind::Event);
    }

    #[test]
    fn test_agent_reasoning_is_assistant() {
        let reasoning = entry(
            "event_msg",
            json!({ "type": "agent_reasoning", "text": "hmm" }),
        );
        assert_eq!(classify(&reasoning), MessageKind::Assistant);
    }

    #[test]
    fn test_tools_and_reasoning_items() {
        let call = entry(
            "response_item",
            json!({ "type": "function_call", "name": "shell", "arguments": "{}", "call_id": "c1" }),
        );
        assert_eq!(classify(&call), MessageKind::FunctionCall);

        let output = entry(
            "response_item",
            json!({ "type": "function_call_output", "call_id": "c1", "output": "ok" }),
        );
        assert_eq!(classify(&output), MessageKind::FunctionOutput);

        let reasoning = entry(
            "response_item",
            json!({ "type": "reasoning", "summary": [] }),
        );
        assert_eq!(classify(&reasoning), MessageKind::Reasoning);
    }

    #[test]
    fn test_metadata_is_other() {
        let meta = entry("session_meta", json!({ "id": "s1" }));
        assert_eq!(classify(&meta), MessageKind::Other);

        let ctx = entry("turn_context", json!({ "model": "gpt-5" }));
        assert_eq!(classify(&ctx), MessageKind::Other);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let call = entry(
            "response_item",
            json!({ "type": "function_call", "name": "shell", "arguments": "{}", "call_id": "c1" }),
        );
        assert_eq!(classify(&call), classify(&call));
    }

    #[test]
    fn test_classified_entry_text() {
        let user = entry(
            "event_msg",
            json!({ "type": "user_message", "message": "find the bug" }),
        );
        let classified = ClassifiedEntry::new(3, &user);
        assert_eq!(classified.index, 3);
        assert_eq!(classified.kind, MessageKind::User);
        assert_eq!(classified.text, "find the bug");
    }
}
