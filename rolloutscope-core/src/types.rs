//! Core output types for rolloutscope
//!
//! Everything in this module is plain serializable data. Field names are
//! camelCase on the wire and stay stable so that a transport layer can hand
//! these values to a UI as-is.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Rollout** | One append-only JSONL log recording a single agent session |
//! | **Entry** | One validated line of a rollout (see [`crate::ingest::LogEntry`]) |
//! | **Chunk** | One reconstructed unit of conversation (user turn, AI turn, marker) |
//! | **Section** | An ordered slice of an AI chunk: message text, reasoning, or tool calls |
//! | **Compaction** | A provider-side context-window compression boundary |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use std::path::PathBuf;

// ============================================
// Token usage
// ============================================

/// Five token counters as reported by the provider.
///
/// Raw rollout lines use snake_case keys (`input_tokens`); serialized output
/// uses camelCase. Missing counters default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenUsage {
    #[serde(alias = "input_tokens")]
    pub input_tokens: u64,
    #[serde(alias = "cached_input_tokens")]
    pub cached_input_tokens: u64,
    #[serde(alias = "output_tokens")]
    pub output_tokens: u64,
    #[serde(alias = "reasoning_output_tokens")]
    pub reasoning_output_tokens: u64,
    #[serde(alias = "total_tokens")]
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Per-field `self - previous`, each field clamped at zero on its own.
    pub fn clamped_diff(&self, previous: &TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.saturating_sub(previous.input_tokens),
            cached_input_tokens: self
                .cached_input_tokens
                .saturating_sub(previous.cached_input_tokens),
            output_tokens: self.output_tokens.saturating_sub(previous.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_sub(previous.reasoning_output_tokens),
            total_tokens: self.total_tokens.saturating_sub(previous.total_tokens),
        }
    }

    /// True if any counter is non-zero.
    pub fn any_positive(&self) -> bool {
        self.input_tokens > 0
            || self.cached_input_tokens > 0
            || self.output_tokens > 0
            || self.reasoning_output_tokens > 0
            || self.total_tokens > 0
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            cached_input_tokens: self
                .cached_input_tokens
                .saturating_add(rhs.cached_input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_add(rhs.reasoning_output_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

// ============================================
// Attachments
// ============================================

/// What an attachment's mime type says about its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Text,
    Markdown,
    Code,
    Binary,
    Unknown,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Text => "text",
            AttachmentKind::Markdown => "markdown",
            AttachmentKind::Code => "code",
            AttachmentKind::Binary => "binary",
            AttachmentKind::Unknown => "unknown",
        }
    }

    /// Kinds whose decoded bytes are shown as text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            AttachmentKind::Text | AttachmentKind::Markdown | AttachmentKind::Code
        )
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an attachment cannot be previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewReason {
    TooLarge,
    DecodeError,
    Binary,
    UnsupportedMime,
}

/// An attachment recovered from a base64 data URL in a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttachment {
    pub kind: AttachmentKind,
    pub mime_type: String,
    /// Decoded size, estimated from the base64 length
    pub size_bytes: u64,
    pub previewable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_reason: Option<PreviewReason>,
    /// Decoded text for text/markdown/code kinds (possibly truncated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    #[serde(default)]
    pub truncated: bool,
    /// Original data URL, retained for previewable images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

// ============================================
// Chunks
// ============================================

/// Which channel a piece of content arrived through.
///
/// Rollouts often record the same content twice: once as a `response_item`
/// and once as an `event_msg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Response,
    Event,
}

/// A reconstructed unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    User(UserChunk),
    Ai(AiChunk),
    System(SystemChunk),
    ModelChange(ModelChangeChunk),
    CollaborationModeChange(CollaborationModeChangeChunk),
    Compaction(CompactionChunk),
}

impl Chunk {
    /// Wire name of the chunk type.
    pub fn kind(&self) -> &'static str {
        match self {
            Chunk::User(_) => "user",
            Chunk::Ai(_) => "ai",
            Chunk::System(_) => "system",
            Chunk::ModelChange(_) => "model_change",
            Chunk::CollaborationModeChange(_) => "collaboration_mode_change",
            Chunk::Compaction(_) => "compaction",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Chunk::User(c) => c.timestamp,
            Chunk::Ai(c) => c.timestamp,
            Chunk::System(c) => c.timestamp,
            Chunk::ModelChange(c) => c.timestamp,
            Chunk::CollaborationModeChange(c) => c.timestamp,
            Chunk::Compaction(c) => c.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChunk {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<UserAttachment>,
}

/// One agent turn: everything between two user/system boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiChunk {
    pub text_blocks: Vec<String>,
    pub tool_executions: Vec<CodexToolExecution>,
    pub reasoning: Vec<String>,
    pub sections: Vec<AiSection>,
    pub metrics: AiMetrics,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
}

/// Ordered building blocks of an [`AiChunk`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AiSection {
    #[serde(rename_all = "camelCase")]
    Message {
        source: ContentSource,
        text_blocks: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Reasoning {
        source: ContentSource,
        summaries: Vec<String>,
    },
    /// Indices into [`AiChunk::tool_executions`]
    #[serde(rename_all = "camelCase")]
    ToolCalls { execution_indices: Vec<usize> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMetrics {
    #[serde(flatten)]
    pub usage: TokenUsage,
    pub tool_call_count: usize,
}

/// A function call paired with its output by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexToolExecution {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    /// Recorded as `custom_tool_call` rather than `function_call`
    pub custom: bool,
    pub output: Option<String>,
    pub is_error: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "duration")]
    pub duration_ms: Option<i64>,
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemChunk {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChangeChunk {
    pub previous_model: Option<String>,
    pub previous_effort: Option<String>,
    pub model: String,
    pub effort: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationModeChangeChunk {
    pub previous_mode: Option<String>,
    pub mode: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionChunk {
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Sessions
// ============================================

/// Git state recorded at session start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitInfo {
    #[serde(alias = "commit_hash")]
    pub commit_hash: Option<String>,
    pub branch: Option<String>,
    #[serde(alias = "repository_url")]
    pub repository_url: Option<String>,
}

/// Identity and configuration of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub id: String,
    pub file_path: PathBuf,
    pub cwd: Option<String>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub model_provider: Option<String>,
    pub originator: Option<String>,
    pub cli_version: Option<String>,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
    pub git_repository_url: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Aggregate counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    #[serde(flatten)]
    pub usage: TokenUsage,
    pub turn_count: usize,
    pub tool_call_count: usize,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    /// Context window reported by the most recent token count
    pub context_window: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_diff_never_negative() {
        let prev = TokenUsage {
            input_tokens: 10,
            cached_input_tokens: 8,
            output_tokens: 6,
            reasoning_output_tokens: 1,
            total_tokens: 16,
        };
        let cur = TokenUsage {
            input_tokens: 15,
            cached_input_tokens: 4,
            output_tokens: 9,
            reasoning_output_tokens: 1,
            total_tokens: 24,
        };

        let diff = cur.clamped_diff(&prev);
        assert_eq!(diff.input_tokens, 5);
        assert_eq!(diff.cached_input_tokens, 0);
        assert_eq!(diff.output_tokens, 3);
        assert_eq!(diff.reasoning_output_tokens, 0);
        assert_eq!(diff.total_tokens, 8);
    }

    #[test]
    fn test_textual_attachment_kinds() {
        assert!(AttachmentKind::Markdown.is_textual());
        assert!(AttachmentKind::Code.is_textual());
        assert!(!AttachmentKind::Image.is_textual());
        assert!(!AttachmentKind::Binary.is_textual());
    }

    #[test]
    fn test_token_usage_deserializes_snake_case() {
        let usage: TokenUsage = serde_json::from_value(serde_json::json!({
            "input_tokens": 3,
            "output_tokens": 4,
            "total_tokens": 7
        }))
        .unwrap();
        assert_eq!(usage.input_tokens, 3);
        assert_eq!(usage.cached_input_tokens, 0);
        assert_eq!(usage.total_tokens, 7);
    }

    #[test]
    fn test_chunk_serializes_with_type_tag() {
        let chunk = Chunk::Compaction(CompactionChunk {
            timestamp: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        });
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "compaction");
        assert_eq!(chunk.kind(), "compaction");
    }

    #[test]
    fn test_ai_metrics_flatten_total_tokens() {
        let metrics = AiMetrics {
            usage: TokenUsage {
                total_tokens: 42,
                ..Default::default()
            },
            tool_call_count: 1,
        };
        let json = serde_json::to_value(metrics).unwrap();
        assert_eq!(json["totalTokens"], 42);
        assert_eq!(json["toolCallCount"], 1);
    }
}
