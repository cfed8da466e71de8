//! Conversation chunk reconstruction
//!
//! Turns the flat entry stream of a rollout into the units a UI renders:
//! user turns, AI turns, system messages, and markers for model changes,
//! collaboration mode changes, and context compaction.
//!
//! ## Scan
//!
//! Entries are stable-sorted by timestamp and folded through a scan state
//! that holds at most one pending user turn and at most one open AI turn.
//!
//! | Entry | Effect |
//! |-------|--------|
//! | compaction | flush both, emit a compaction marker |
//! | `turn_context` | emit model / mode change markers when they differ |
//! | user message (either channel) | flush AI, merge into the pending user turn |
//! | developer message | flush both, emit a system chunk |
//! | assistant text, reasoning, tool call/output, token count | flush user, fold into AI |
//!
//! Token counts run through one [`UsageReconciler`] for the whole session.

pub mod ai;
pub mod attachments;
pub mod user;

pub use ai::AiAccumulator;
pub use attachments::{attachment_from_data_url, classify_mime};
pub use user::{are_equivalent, is_system_injected_context, PendingUser, UserCandidate};

use crate::config::AttachmentLimits;
use crate::error::Result;
use crate::ingest::classify::{classify, MessageKind};
use crate::ingest::entry::{EventPayload, LogEntry, MessageRole, ResponseItemPayload, TurnContext};
use crate::ingest::reader::read_entries;
use crate::ingest::usage::UsageReconciler;
use crate::types::{
    Chunk, CollaborationModeChangeChunk, CompactionChunk, ContentSource, ModelChangeChunk,
    SystemChunk,
};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Compaction markers closer together than this collapse into one.
const COMPACTION_DEDUP_WINDOW_MS: i64 = 1000;

/// Builds [`Chunk`]s from validated entries.
#[derive(Debug, Clone, Default)]
pub struct ChunkBuilder {
    limits: AttachmentLimits,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: AttachmentLimits) -> Self {
        Self { limits }
    }

    /// Reconstruct the chunk sequence of one session.
    ///
    /// Input order does not matter beyond ties: entries are stable-sorted by
    /// timestamp first.
    pub fn build(&self, entries: &[LogEntry]) -> Vec<Chunk> {
        let mut sorted: Vec<&LogEntry> = entries.iter().collect();
        sorted.sort_by_key(|entry| entry.timestamp());

        let state = sorted
            .into_iter()
            .fold(ScanState::new(self.limits), ScanState::step);
        state.finish()
    }
}

/// Build chunks with default attachment limits.
pub fn build_chunks(entries: &[LogEntry]) -> Vec<Chunk> {
    ChunkBuilder::new().build(entries)
}

/// Read a rollout file and build its chunks.
pub fn build_session_chunks(path: &Path, limits: AttachmentLimits) -> Result<Vec<Chunk>> {
    let (entries, report) = read_entries(path)?;
    let chunks = ChunkBuilder::with_limits(limits).build(&entries);
    tracing::debug!(
        path = %path.display(),
        entries = report.parsed,
        chunks = chunks.len(),
        "Built chunks"
    );
    Ok(chunks)
}

/// Everything the scan carries from one entry to the next.
#[derive(Debug)]
struct ScanState {
    limits: AttachmentLimits,
    chunks: Vec<Chunk>,
    ai: Option<AiAccumulator>,
    pending_user: Option<PendingUser>,
    /// Last seen (model, effort)
    model: Option<(String, Option<String>)>,
    collaboration_mode: Option<String>,
    reconciler: UsageReconciler,
}

impl ScanState {
    fn new(limits: AttachmentLimits) -> Self {
        Self {
            limits,
            chunks: Vec::new(),
            ai: None,
            pending_user: None,
            model: None,
            collaboration_mode: None,
            reconciler: UsageReconciler::new(),
        }
    }

    fn step(mut self, entry: &LogEntry) -> Self {
        let timestamp = entry.timestamp();

        if entry.is_compaction() {
            self.flush_user();
            self.flush_ai();
            self.push_compaction(timestamp);
            return self;
        }

        if let LogEntry::TurnContext(ctx) = entry {
            self.observe_turn_context(ctx);
            return self;
        }

        match classify(entry) {
            MessageKind::User => {
                self.flush_ai();
                if let Some(candidate) = user::user_candidate(entry, &self.limits) {
                    self.push_user(candidate);
                }
            }
            MessageKind::Developer => {
                self.flush_user();
                self.flush_ai();
                if let Some(ResponseItemPayload::Message(msg)) = entry.response_payload() {
                    let content = msg.text().trim().to_string();
                    if !content.is_empty() {
                        self.chunks
                            .push(Chunk::System(SystemChunk { content, timestamp }));
                    }
                }
            }
            _ => self.fold_into_ai(entry, timestamp),
        }

        self
    }

    fn fold_into_ai(&mut self, entry: &LogEntry, timestamp: DateTime<Utc>) {
        match entry {
            LogEntry::ResponseItem(item) => match &item.payload {
                ResponseItemPayload::Message(msg) if msg.role == MessageRole::Assistant => {
                    let ai = self.open_ai(timestamp);
                    for block in msg.text_blocks() {
                        ai.push_message(ContentSource::Response, block, timestamp);
                    }
                }
                ResponseItemPayload::FunctionCall {
                    name,
                    arguments,
                    call_id,
                    custom,
                } => {
                    self.open_ai(timestamp)
                        .push_call(call_id, name, arguments, *custom, timestamp);
                }
                ResponseItemPayload::FunctionCallOutput {
                    call_id,
                    output,
                    custom,
                } => {
                    self.open_ai(timestamp)
                        .push_output(call_id, output, *custom, timestamp);
                }
                ResponseItemPayload::Reasoning { summary, .. } => {
                    self.open_ai(timestamp).push_reasoning(
                        ContentSource::Response,
                        summary.iter().map(String::as_str),
                        timestamp,
                    );
                }
                ResponseItemPayload::Message(_) => {}
            },
            LogEntry::EventMsg(event) => match &event.payload {
                EventPayload::AgentMessage { message } => {
                    self.open_ai(timestamp)
                        .push_message(ContentSource::Event, message, timestamp);
                }
                EventPayload::AgentReasoning { text } => {
                    self.open_ai(timestamp).push_reasoning(
                        ContentSource::Event,
                        [text.as_str()],
                        timestamp,
                    );
                }
                EventPayload::TokenCount { info } => {
                    self.flush_user();
                    let Some(info) = info else {
                        return;
                    };
                    if let Some(delta) = self.reconciler.push(info) {
                        self.open_ai(timestamp).push_usage(delta, timestamp);
                    }
                }
                EventPayload::UserMessage { .. } | EventPayload::ContextCompacted => {}
            },
            other => tracing::trace!(kind = other.kind_name(), "Entry carries no turn content"),
        }
    }

    /// The open AI turn, opening one if needed. Any pending user turn is
    /// emitted first.
    fn open_ai(&mut self, timestamp: DateTime<Utc>) -> &mut AiAccumulator {
        self.flush_user();
        self.ai.get_or_insert_with(|| AiAccumulator::new(timestamp))
    }

    fn push_user(&mut self, candidate: UserCandidate) {
        match self.pending_user.as_mut() {
            Some(pending) if pending.is_equivalent(&candidate) => pending.merge(candidate),
            _ => {
                self.flush_user();
                self.pending_user = Some(PendingUser::new(candidate));
            }
        }
    }

    fn observe_turn_context(&mut self, ctx: &TurnContext) {
        if let Some(model) = &ctx.model {
            // A context that repeats the model without an effort keeps the last effort
            let effort = ctx.effort.clone().or_else(|| {
                self.model
                    .as_ref()
                    .filter(|(last, _)| last == model)
                    .and_then(|(_, effort)| effort.clone())
            });
            let next = (model.clone(), effort);
            if let Some(previous) = self.model.as_ref().filter(|prev| **prev != next) {
                let chunk = Chunk::ModelChange(ModelChangeChunk {
                    previous_model: Some(previous.0.clone()),
                    previous_effort: previous.1.clone(),
                    model: next.0.clone(),
                    effort: next.1.clone(),
                    timestamp: ctx.timestamp,
                });
                self.flush_user();
                self.flush_ai();
                self.chunks.push(chunk);
            }
            self.model = Some(next);
        }

        if let Some(mode) = &ctx.collaboration_mode {
            if let Some(previous) = self.collaboration_mode.as_ref().filter(|prev| *prev != mode) {
                let chunk = Chunk::CollaborationModeChange(CollaborationModeChangeChunk {
                    previous_mode: Some(previous.clone()),
                    mode: mode.clone(),
                    timestamp: ctx.timestamp,
                });
                self.flush_user();
                self.flush_ai();
                self.chunks.push(chunk);
            }
            self.collaboration_mode = Some(mode.clone());
        }
    }

    fn push_compaction(&mut self, timestamp: DateTime<Utc>) {
        if let Some(Chunk::Compaction(last)) = self.chunks.last() {
            if (timestamp - last.timestamp).num_milliseconds().abs() <= COMPACTION_DEDUP_WINDOW_MS {
                return;
            }
        }
        self.chunks
            .push(Chunk::Compaction(CompactionChunk { timestamp }));
    }

    fn flush_user(&mut self) {
        if let Some(pending) = self.pending_user.take() {
            self.chunks.push(Chunk::User(pending.into_chunk()));
        }
    }

    fn flush_ai(&mut self) {
        if let Some(chunk) = self.ai.take().and_then(AiAccumulator::finish) {
            self.chunks.push(Chunk::Ai(chunk));
        }
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush_user();
        self.flush_ai();
        self.chunks
    }
}
