//! Rollout entry model and structural validator
//!
//! Each rollout line is a JSON object of the form
//! `{"timestamp": "...", "type": "<kind>", "payload": {...}}`.
//! [`validate`] turns such a value into a [`LogEntry`] or rejects it.
//!
//! # Validation rules
//!
//! - `timestamp` must be an RFC 3339 string on every entry.
//! - Every entry kind and every payload variant has its own predicate.
//!   A field of the wrong JSON type rejects the entry rather than being
//!   coerced.
//! - `session_meta` needs `id` or `cwd`; `turn_context` needs `cwd` or
//!   `model`. Entries missing both are noise and are dropped.
//! - Unknown `type` values (top-level, `response_item` or `event_msg`) are
//!   rejected.

use crate::types::{GitInfo, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================
// Entry model
// ============================================

/// A validated rollout line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    SessionMeta(SessionMeta),
    ResponseItem(ResponseItem),
    TurnContext(TurnContext),
    EventMsg(EventMsg),
    /// Top-level `compacted` record written when history was compacted
    Compacted(Compacted),
}

impl LogEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LogEntry::SessionMeta(e) => e.timestamp,
            LogEntry::ResponseItem(e) => e.timestamp,
            LogEntry::TurnContext(e) => e.timestamp,
            LogEntry::EventMsg(e) => e.timestamp,
            LogEntry::Compacted(e) => e.timestamp,
        }
    }

    /// Rollout `type` string of this entry.
    pub fn kind_name(&self) -> &'static str {
        match self {
            LogEntry::SessionMeta(_) => "session_meta",
            LogEntry::ResponseItem(_) => "response_item",
            LogEntry::TurnContext(_) => "turn_context",
            LogEntry::EventMsg(_) => "event_msg",
            LogEntry::Compacted(_) => "compacted",
        }
    }

    /// True for any entry that marks a context compaction boundary.
    pub fn is_compaction(&self) -> bool {
        matches!(
            self,
            LogEntry::Compacted(_)
                | LogEntry::EventMsg(EventMsg {
                    payload: EventPayload::ContextCompacted,
                    ..
                })
        )
    }

    pub fn response_payload(&self) -> Option<&ResponseItemPayload> {
        match self {
            LogEntry::ResponseItem(item) => Some(&item.payload),
            _ => None,
        }
    }

    pub fn event_payload(&self) -> Option<&EventPayload> {
        match self {
            LogEntry::EventMsg(event) => Some(&event.payload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub timestamp: DateTime<Utc>,
    pub id: Option<String>,
    pub cwd: Option<String>,
    pub originator: Option<String>,
    pub cli_version: Option<String>,
    pub model_provider: Option<String>,
    pub model: Option<String>,
    pub base_instructions: Option<String>,
    pub git: Option<GitInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseItem {
    pub timestamp: DateTime<Utc>,
    pub payload: ResponseItemPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItemPayload {
    Message(MessagePayload),
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        name: String,
        arguments: String,
        call_id: String,
        /// Recorded as `custom_tool_call` (`input` instead of `arguments`)
        custom: bool,
    },
    #[serde(rename_all = "camelCase")]
    FunctionCallOutput {
        call_id: String,
        output: String,
        custom: bool,
    },
    #[serde(rename_all = "camelCase")]
    Reasoning {
        summary: Vec<String>,
        encrypted_content: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Developer,
    User,
    Assistant,
}

impl MessageRole {
    fn parse(role: &str) -> Option<Self> {
        match role {
            "developer" => Some(MessageRole::Developer),
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl MessagePayload {
    /// Text of all text blocks, joined by newlines. Empty blocks are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(ContentBlock::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text of each text-bearing block, in order.
    pub fn text_blocks(&self) -> impl Iterator<Item = &str> {
        self.content
            .iter()
            .map(ContentBlock::text)
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    InputText {
        text: String,
    },
    OutputText {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InputImage {
        image_url: String,
    },
    /// A well-formed block of a type this crate does not interpret
    #[serde(rename_all = "camelCase")]
    Unknown {
        block_type: String,
    },
}

impl ContentBlock {
    pub fn text(&self) -> &str {
        match self {
            ContentBlock::InputText { text } | ContentBlock::OutputText { text } => text,
            ContentBlock::InputImage { .. } | ContentBlock::Unknown { .. } => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnContext {
    pub timestamp: DateTime<Utc>,
    pub turn_id: Option<String>,
    pub cwd: Option<String>,
    pub model: Option<String>,
    pub effort: Option<String>,
    pub collaboration_mode: Option<String>,
    pub approval_policy: Option<String>,
    pub sandbox_policy: Option<Value>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMsg {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    TokenCount {
        info: Option<TokenCountInfo>,
    },
    AgentReasoning {
        text: String,
    },
    AgentMessage {
        message: String,
    },
    UserMessage {
        message: String,
        /// Data URLs of images attached to the prompt
        images: Vec<String>,
    },
    ContextCompacted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCountInfo {
    #[serde(alias = "total_token_usage")]
    pub total_usage: TokenUsage,
    #[serde(alias = "last_token_usage")]
    pub last_usage: TokenUsage,
    #[serde(default, alias = "model_context_window")]
    pub context_window: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compacted {
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// Top-level envelope of every rollout line.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    timestamp: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSessionMeta {
    id: Option<String>,
    cwd: Option<String>,
    originator: Option<String>,
    cli_version: Option<String>,
    model_provider: Option<String>,
    model: Option<String>,
    base_instructions: Option<Value>,
    instructions: Option<String>,
    git: Option<GitInfo>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    role: String,
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawFunctionCall {
    name: String,
    arguments: Value,
    call_id: String,
}

#[derive(Debug, Deserialize)]
struct RawCustomToolCall {
    name: String,
    input: Value,
    call_id: String,
}

#[derive(Debug, Deserialize)]
struct RawFunctionCallOutput {
    call_id: String,
    output: Value,
}

#[derive(Debug, Deserialize)]
struct RawReasoning {
    summary: Vec<Value>,
    #[serde(default)]
    encrypted_content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawTurnContext {
    turn_id: Option<String>,
    cwd: Option<String>,
    model: Option<String>,
    #[serde(alias = "reasoning_effort")]
    effort: Option<String>,
    collaboration_mode: Option<Value>,
    approval_policy: Option<String>,
    sandbox_policy: Option<Value>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTokenCount {
    #[serde(default)]
    info: Option<TokenCountInfo>,
}

#[derive(Debug, Deserialize)]
struct RawAgentReasoning {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawAgentMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawUserMessage {
    message: String,
    #[serde(default)]
    images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawCompacted {
    message: Option<String>,
}

// ============================================
// Validation
// ============================================

/// Validate one raw rollout value.
///
/// Returns `None` for anything that is not a structurally valid entry.
/// Never panics.
pub fn validate(raw: &Value) -> Option<LogEntry> {
    let envelope: RawEnvelope = serde_json::from_value(raw.clone()).ok()?;
    let timestamp = parse_timestamp(&envelope.timestamp)?;
    let payload = &envelope.payload;

    match envelope.kind.as_str() {
        "session_meta" => validate_session_meta(timestamp, payload).map(LogEntry::SessionMeta),
        "response_item" => validate_response_item(payload)
            .map(|payload| LogEntry::ResponseItem(ResponseItem { timestamp, payload })),
        "turn_context" => validate_turn_context(timestamp, payload).map(LogEntry::TurnContext),
        "event_msg" => validate_event_payload(payload)
            .map(|payload| LogEntry::EventMsg(EventMsg { timestamp, payload })),
        "compacted" => validate_compacted(timestamp, payload).map(LogEntry::Compacted),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Treat empty or whitespace-only strings as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn payload_type(payload: &Value) -> Option<&str> {
    payload.get("type").and_then(Value::as_str)
}

/// A string, or any other non-null JSON value rendered as compact JSON.
fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Accepts `"text"` or `{"text": "..."}`.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("text").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn validate_session_meta(timestamp: DateTime<Utc>, payload: &Value) -> Option<SessionMeta> {
    let raw: RawSessionMeta = serde_json::from_value(payload.clone()).ok()?;
    let id = non_empty(raw.id);
    let cwd = non_empty(raw.cwd);
    if id.is_none() && cwd.is_none() {
        return None;
    }

    let base_instructions = raw
        .base_instructions
        .as_ref()
        .and_then(text_of)
        .or(raw.instructions);

    Some(SessionMeta {
        timestamp,
        id,
        cwd,
        originator: raw.originator,
        cli_version: raw.cli_version,
        model_provider: raw.model_provider,
        model: non_empty(raw.model),
        base_instructions,
        git: raw.git,
    })
}

fn validate_response_item(payload: &Value) -> Option<ResponseItemPayload> {
    match payload_type(payload)? {
        "message" => validate_message(payload).map(ResponseItemPayload::Message),
        "function_call" => {
            let raw: RawFunctionCall = serde_json::from_value(payload.clone()).ok()?;
            Some(ResponseItemPayload::FunctionCall {
                name: raw.name,
                arguments: stringify(&raw.arguments)?,
                call_id: raw.call_id,
                custom: false,
            })
        }
        "custom_tool_call" => {
            let raw: RawCustomToolCall = serde_json::from_value(payload.clone()).ok()?;
            Some(ResponseItemPayload::FunctionCall {
                name: raw.name,
                arguments: stringify(&raw.input)?,
                call_id: raw.call_id,
                custom: true,
            })
        }
        kind @ ("function_call_output" | "custom_tool_call_output") => {
            let raw: RawFunctionCallOutput = serde_json::from_value(payload.clone()).ok()?;
            Some(ResponseItemPayload::FunctionCallOutput {
                call_id: raw.call_id,
                output: stringify(&raw.output)?,
                custom: kind == "custom_tool_call_output",
            })
        }
        "reasoning" => {
            let raw: RawReasoning = serde_json::from_value(payload.clone()).ok()?;
            let summary = raw
                .summary
                .iter()
                .map(text_of)
                .collect::<Option<Vec<_>>>()?;
            Some(ResponseItemPayload::Reasoning {
                summary,
                encrypted_content: raw.encrypted_content,
            })
        }
        _ => None,
    }
}

fn validate_message(payload: &Value) -> Option<MessagePayload> {
    let raw: RawMessage = serde_json::from_value(payload.clone()).ok()?;
    let role = MessageRole::parse(&raw.role)?;
    let content = raw
        .content
        .iter()
        .map(validate_content_block)
        .collect::<Option<Vec<_>>>()?;
    Some(MessagePayload { role, content })
}

fn validate_content_block(block: &Value) -> Option<ContentBlock> {
    let block_type = payload_type(block)?;
    let string_field = |key: &str| block.get(key).and_then(Value::as_str).map(str::to_string);

    match block_type {
        "input_text" => Some(ContentBlock::InputText {
            text: string_field("text")?,
        }),
        "output_text" => Some(ContentBlock::OutputText {
            text: string_field("text")?,
        }),
        "input_image" => Some(ContentBlock::InputImage {
            image_url: string_field("image_url")?,
        }),
        other => Some(ContentBlock::Unknown {
            block_type: other.to_string(),
        }),
    }
}

fn validate_turn_context(timestamp: DateTime<Utc>, payload: &Value) -> Option<TurnContext> {
    let raw: RawTurnContext = serde_json::from_value(payload.clone()).ok()?;
    let cwd = non_empty(raw.cwd);
    let model = non_empty(raw.model);
    if cwd.is_none() && model.is_none() {
        return None;
    }

    // Either a bare string or an object naming the mode
    let collaboration_mode = raw.collaboration_mode.as_ref().and_then(|mode| match mode {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["mode", "name", "kind"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    });

    Some(TurnContext {
        timestamp,
        turn_id: raw.turn_id,
        cwd,
        model,
        effort: non_empty(raw.effort),
        collaboration_mode: non_empty(collaboration_mode),
        approval_policy: raw.approval_policy,
        sandbox_policy: raw.sandbox_policy,
        summary: raw.summary,
    })
}

fn validate_event_payload(payload: &Value) -> Option<EventPayload> {
    match payload_type(payload)? {
        "token_count" => {
            let raw: RawTokenCount = serde_json::from_value(payload.clone()).ok()?;
            Some(EventPayload::TokenCount { info: raw.info })
        }
        "agent_reasoning" => {
            let raw: RawAgentReasoning = serde_json::from_value(payload.clone()).ok()?;
            Some(EventPayload::AgentReasoning { text: raw.text })
        }
        "agent_message" => {
            let raw: RawAgentMessage = serde_json::from_value(payload.clone()).ok()?;
            Some(EventPayload::AgentMessage {
                message: raw.message,
            })
        }
        "user_message" => {
            let raw: RawUserMessage = serde_json::from_value(payload.clone()).ok()?;
            Some(EventPayload::UserMessage {
                message: raw.message,
                images: raw.images.unwrap_or_default(),
            })
        }
        "context_compacted" => Some(EventPayload::ContextCompacted),
        _ => None,
    }
}

fn validate_compacted(timestamp: DateTime<Utc>, payload: &Value) -> Option<Compacted> {
    if !payload.is_object() {
        return None;
    }
    let raw: RawCompacted = serde_json::from_value(payload.clone()).ok()?;
    Some(Compacted {
        timestamp,
        message: raw.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: &str = "2025-11-24T19:33:35.000Z";

    fn line(kind: &str, payload: Value) -> Value {
        json!({ "timestamp": TS, "type": kind, "payload": payload })
    }

    #[test]
    fn test_session_meta_requires_id_or_cwd() {
        let ok = validate(&line("session_meta", json!({ "cwd": "/repo" })));
        assert!(matches!(ok, Some(LogEntry::SessionMeta(_))));

        let noise = line("session_meta", json!({ "originator": "codex_cli_rs" }));
        assert!(validate(&noise).is_none());
    }

    #[test]
    fn test_session_meta_fields() {
        let entry = validate(&line(
            "session_meta",
            json!({
                "id": "019ab86e-1e83-75b0-b2d7-d335492e7026",
                "cwd": "/repo",
                "cli_version": "0.63.0",
                "base_instructions": { "text": "be helpful" },
                "git": { "branch": "main", "commit_hash": "abc123" }
            }),
        ))
        .unwrap();

        let LogEntry::SessionMeta(meta) = entry else {
            panic!("expected session_meta");
        };
        assert_eq!(meta.cli_version.as_deref(), Some("0.63.0"));
        assert_eq!(meta.base_instructions.as_deref(), Some("be helpful"));
        let git = meta.git.unwrap();
        assert_eq!(git.branch.as_deref(), Some("main"));
        assert_eq!(git.commit_hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_turn_context_requires_cwd_or_model() {
        let with_model = line("turn_context", json!({ "model": "gpt-5" }));
        assert!(validate(&with_model).is_some());

        let effort_only = line("turn_context", json!({ "effort": "high" }));
        assert!(validate(&effort_only).is_none());
    }

    #[test]
    fn test_turn_context_collaboration_mode_object() {
        let entry = validate(&line(
            "turn_context",
            json!({ "cwd": "/repo", "collaboration_mode": { "mode": "plan" } }),
        ))
        .unwrap();
        let LogEntry::TurnContext(ctx) = entry else {
            panic!("expected turn_context");
        };
        assert_eq!(ctx.collaboration_mode.as_deref(), Some("plan"));
    }

    #[test]
    fn test_message_content_blocks() {
        let entry = validate(&line(
            "response_item",
            json!({
                "type": "message",
                "role": "user",
                "content": [
                    { "type": "input_text", "text": "hello" },
                    { "type": "input_image", "image_url": "data:image/png;base64,AAAA" },
                    { "type": "refusal", "refusal": "no" }
                ]
            }),
        ))
        .unwrap();

        let Some(ResponseItemPayload::Message(msg)) = entry.response_payload() else {
            panic!("expected message");
        };
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content.len(), 3);
        assert!(matches!(msg.content[2], ContentBlock::Unknown { .. }));
        assert_eq!(msg.text(), "hello");
    }

    #[test]
    fn test_message_rejects_unknown_role_and_bad_blocks() {
        let bad_role = line(
            "response_item",
            json!({ "type": "message", "role": "tool", "content": [] }),
        );
        assert!(validate(&bad_role).is_none());

        let bad_block = line(
            "response_item",
            json!({ "type": "message", "role": "user", "content": [{ "type": "input_text" }] }),
        );
        assert!(validate(&bad_block).is_none());
    }

    #[test]
    fn test_function_call_and_custom_tool_call() {
        let call = validate(&line(
            "response_item",
            json!({
                "type": "function_call",
                "name": "shell",
                "arguments": "{}",
                "call_id": "c1"
            }),
        ))
        .unwrap();
        assert!(matches!(
            call.response_payload(),
            Some(ResponseItemPayload::FunctionCall { custom: false, .. })
        ));

        let patch = validate(&line(
            "response_item",
            json!({
                "type": "custom_tool_call",
                "name": "apply_patch",
                "input": "*** Begin Patch",
                "call_id": "c2"
            }),
        ))
        .unwrap();
        assert!(matches!(
            patch.response_payload(),
            Some(ResponseItemPayload::FunctionCall { custom: true, .. })
        ));
        let Some(ResponseItemPayload::FunctionCall { arguments, .. }) = patch.response_payload()
        else {
            panic!("expected function call");
        };
        assert_eq!(arguments, "*** Begin Patch");

        let missing_id = line(
            "response_item",
            json!({ "type": "function_call", "name": "shell", "arguments": "{}" }),
        );
        assert!(validate(&missing_id).is_none());
    }

    #[test]
    fn test_function_call_output_object_is_stringified() {
        let entry = validate(&line(
            "response_item",
            json!({
                "type": "function_call_output",
                "call_id": "c1",
                "output": { "exit_code": 1 }
            }),
        ))
        .unwrap();
        let Some(ResponseItemPayload::FunctionCallOutput { output, .. }) = entry.response_payload()
        else {
            panic!("expected output");
        };
        assert_eq!(output, r#"{"exit_code":1}"#);
    }

    #[test]
    fn test_reasoning_summary_shapes() {
        let entry = validate(&line(
            "response_item",
            json!({
                "type": "reasoning",
                "summary": ["plain", { "type": "summary_text", "text": "object" }],
                "encrypted_content": "gAAAA"
            }),
        ))
        .unwrap();
        let Some(ResponseItemPayload::Reasoning { summary, .. }) = entry.response_payload() else {
            panic!("expected reasoning");
        };
        assert_eq!(summary, &vec!["plain".to_string(), "object".to_string()]);
        assert!(matches!(
            entry.response_payload(),
            Some(ResponseItemPayload::Reasoning {
                encrypted_content: Some(_),
                ..
            })
        ));

        let bad = line(
            "response_item",
            json!({ "type": "reasoning", "summary": [42] }),
        );
        assert!(validate(&bad).is_none());
    }

    #[test]
    fn test_token_count_info_null_and_present() {
        let null_info = line("event_msg", json!({ "type": "token_count", "info": null }));
        assert!(matches!(
            validate(&null_info).and_then(|e| e.event_payload().cloned()),
            Some(EventPayload::TokenCount { info: None })
        ));

        let entry = validate(&line(
            "event_msg",
            json!({
                "type": "token_count",
                "info": {
                    "total_token_usage": {
                        "input_tokens": 10,
                        "cached_input_tokens": 2,
                        "output_tokens": 6,
                        "reasoning_output_tokens": 1,
                        "total_tokens": 16
                    },
                    "last_token_usage": {
                        "input_tokens": 10,
                        "output_tokens": 6,
                        "total_tokens": 16
                    },
                    "model_context_window": 272000
                }
            }),
        ))
        .unwrap();
        let Some(EventPayload::TokenCount { info: Some(info) }) = entry.event_payload() else {
            panic!("expected token count");
        };
        assert_eq!(info.total_usage.total_tokens, 16);
        assert_eq!(info.last_usage.cached_input_tokens, 0);
        assert_eq!(info.context_window, Some(272000));
    }

    #[test]
    fn test_token_count_rejects_negative_counters() {
        let entry = validate(&line(
            "event_msg",
            json!({
                "type": "token_count",
                "info": {
                    "total_token_usage": { "total_tokens": -1 },
                    "last_token_usage": { "total_tokens": 1 }
                }
            }),
        ));
        assert!(entry.is_none());
    }

    #[test]
    fn test_unknown_kinds_rejected() {
        let task = line("event_msg", json!({ "type": "task_started" }));
        assert!(validate(&task).is_none());

        let snapshot = line("response_item", json!({ "type": "ghost_snapshot" }));
        assert!(validate(&snapshot).is_none());
        assert!(validate(&line("mystery", json!({}))).is_none());
        assert!(validate(&json!("not an object")).is_none());
    }

    #[test]
    fn test_timestamp_required() {
        let raw = json!({ "type": "turn_context", "payload": { "model": "gpt-5" } });
        assert!(validate(&raw).is_none());

        let bad = json!({
            "timestamp": "yesterday",
            "type": "turn_context",
            "payload": { "model": "gpt-5" }
        });
        assert!(validate(&bad).is_none());
    }

    #[test]
    fn test_compaction_entries() {
        let compacted = validate(&line("compacted", json!({ "message": "summary" }))).unwrap();
        assert!(compacted.is_compaction());

        let event = validate(&line("event_msg", json!({ "type": "context_compacted" }))).unwrap();
        assert!(event.is_compaction());
        assert_eq!(compacted.kind_name(), "compacted");
        assert_eq!(event.kind_name(), "event_msg");
    }

    #[test]
    fn test_user_message_event_images() {
        let entry = validate(&line(
            "event_msg",
            json!({
                "type": "user_message",
                "message": "look",
                "images": ["data:image/png;base64,AAAA"]
            }),
        ))
        .unwrap();
        let Some(EventPayload::UserMessage { images, .. }) = entry.event_payload() else {
            panic!("expected user message");
        };
        assert_eq!(images.len(), 1);
    }
}
