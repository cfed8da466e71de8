//! Session parser
//!
//! One linear pass over a rollout's validated entries, in file order,
//! producing [`SessionMetadata`] and [`SessionMetrics`].

use crate::error::Result;
use crate::ingest::classify::{ClassifiedEntry, MessageKind};
use crate::ingest::entry::{EventPayload, LogEntry, ResponseItemPayload};
use crate::ingest::reader::{read_entries, validate_values, ReadReport};
use crate::ingest::usage::UsageReconciler;
use crate::types::{SessionMetadata, SessionMetrics};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Effort recorded when a model is known but no effort was ever reported.
pub const UNKNOWN_EFFORT: &str = "unknown";

/// Everything derived from one rollout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSession {
    pub metadata: SessionMetadata,
    pub metrics: SessionMetrics,
    pub entries: Vec<LogEntry>,
    pub classified: Vec<ClassifiedEntry>,
    pub report: ReadReport,
}

/// Read and parse one rollout file.
pub fn parse_session_file(path: &Path) -> Result<ParsedSession> {
    let (entries, report) = read_entries(path)?;
    let session = parse_entries(path, entries, report);
    tracing::info!(
        path = %path.display(),
        session_id = %session.metadata.id,
        entries = session.entries.len(),
        skipped = session.report.skipped(),
        "Parsed session"
    );
    Ok(session)
}

/// Parse an already-tokenized rollout. `path_hint` supplies the file name
/// used when no `session_meta` carries an id.
pub fn parse_session_values(path_hint: &Path, values: &[Value]) -> ParsedSession {
    let (entries, report) = validate_values(values);
    parse_entries(path_hint, entries, report)
}

/// Derive metadata and metrics from validated entries.
pub fn parse_entries(path: &Path, entries: Vec<LogEntry>, report: ReadReport) -> ParsedSession {
    let mut metadata = SessionMetadata {
        id: String::new(),
        file_path: path.to_path_buf(),
        cwd: None,
        model: None,
        reasoning_effort: None,
        model_provider: None,
        originator: None,
        cli_version: None,
        git_branch: None,
        git_commit: None,
        git_repository_url: None,
        start_time: None,
        end_time: None,
    };
    let mut metrics = SessionMetrics::default();
    let mut reconciler = UsageReconciler::new();

    let mut meta_id: Option<String> = None;
    let mut meta_start = None;
    let mut meta_model: Option<String> = None;
    let mut context_cwd: Option<String> = None;

    let classified: Vec<ClassifiedEntry> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| ClassifiedEntry::new(index, entry))
        .collect();

    for (entry, class) in entries.iter().zip(&classified) {
        if class.kind == MessageKind::User {
            metrics.turn_count += 1;
        }

        match entry {
            LogEntry::SessionMeta(meta) => {
                meta_start.get_or_insert(meta.timestamp);
                fill(&mut meta_id, &meta.id);
                fill(&mut metadata.cwd, &meta.cwd);
                fill(&mut meta_model, &meta.model);
                fill(&mut metadata.model_provider, &meta.model_provider);
                fill(&mut metadata.originator, &meta.originator);
                fill(&mut metadata.cli_version, &meta.cli_version);
                if let Some(git) = &meta.git {
                    fill(&mut metadata.git_branch, &git.branch);
                    fill(&mut metadata.git_commit, &git.commit_hash);
                    fill(&mut metadata.git_repository_url, &git.repository_url);
                }
            }
            LogEntry::TurnContext(ctx) => {
                fill(&mut context_cwd, &ctx.cwd);
                // Model and effort are taken as a pair from one context
                if metadata.model.is_none() && ctx.model.is_some() {
                    metadata.model = ctx.model.clone();
                    metadata.reasoning_effort = ctx.effort.clone();
                }
            }
            LogEntry::ResponseItem(item) => {
                if matches!(item.payload, ResponseItemPayload::FunctionCall { .. }) {
                    metrics.tool_call_count += 1;
                }
            }
            LogEntry::EventMsg(event) => {
                if let EventPayload::TokenCount { info: Some(info) } = &event.payload {
                    if let Some(delta) = reconciler.push(info) {
                        metrics.usage += delta;
                    }
                    if info.context_window.is_some() {
                        metrics.context_window = info.context_window;
                    }
                }
            }
            LogEntry::Compacted(_) => {}
        }
    }

    metadata.id = meta_id
        .or_else(|| extract_session_id(path))
        .unwrap_or_default();

    if metadata.cwd.is_none() {
        metadata.cwd = context_cwd;
    }

    if metadata.model.is_none() {
        if let Some(model) = meta_model {
            metadata.model = Some(model);
            metadata.reasoning_effort = Some(UNKNOWN_EFFORT.to_string());
        }
    }
    if metadata.model.is_some() && metadata.reasoning_effort.is_none() {
        metadata.reasoning_effort = Some(UNKNOWN_EFFORT.to_string());
    }

    let first = entries.first().map(LogEntry::timestamp);
    let last = entries.last().map(LogEntry::timestamp);
    metadata.start_time = meta_start.or(first);
    metadata.end_time = last;
    if let (Some(first), Some(last)) = (first, last) {
        metrics.duration_ms = (last - first).num_milliseconds().max(0);
    }

    ParsedSession {
        metadata,
        metrics,
        entries,
        classified,
        report,
    }
}

fn fill(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() {
        if let Some(v) = value {
            *slot = Some(v.clone());
        }
    }
}

/// Session id from a rollout file name.
///
/// File names look like
/// `rollout-2025-11-24T19-33-35-019ab86e-1e83-75b0-b2d7-d335492e7026.jsonl`;
/// the id is the trailing UUID. Names without one fall back to the stem.
pub fn extract_session_id(file_path: &Path) -> Option<String> {
    let stem = file_path.file_stem()?.to_str()?;

    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() >= 5 {
        let tail = &parts[parts.len() - 5..];
        let expected = [8, 4, 4, 4, 12];
        let is_uuid = tail
            .iter()
            .zip(expected)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()));
        if is_uuid {
            return Some(tail.join("-"));
        }
    }

    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
