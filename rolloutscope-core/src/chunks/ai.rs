//! AI turn accumulation
//!
//! An [`AiAccumulator`] collects every agent-side entry between two user or
//! system boundaries: assistant text, reasoning summaries, tool calls and
//! their outputs, and token usage deltas. [`AiAccumulator::finish`] turns it
//! into one [`AiChunk`].

use crate::chunks::user::normalize_whitespace;
use crate::types::{AiChunk, AiMetrics, AiSection, CodexToolExecution, ContentSource, TokenUsage};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Name given to outputs that arrive without a matching call.
const UNKNOWN_CALL_NAME: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct CallSlot {
    index: usize,
    started_at: DateTime<Utc>,
    /// Created by an output that sorted ahead of its call
    synthetic: bool,
}

#[derive(Debug, Clone)]
pub struct AiAccumulator {
    sections: Vec<AiSection>,
    executions: Vec<CodexToolExecution>,
    calls: HashMap<String, CallSlot>,
    /// Execution that receives the next token usage delta
    pending_usage_tool: Option<usize>,
    usage: TokenUsage,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl AiAccumulator {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            sections: Vec::new(),
            executions: Vec::new(),
            calls: HashMap::new(),
            pending_usage_tool: None,
            usage: TokenUsage::default(),
            started_at: timestamp,
            ended_at: timestamp,
        }
    }

    fn touch(&mut self, timestamp: DateTime<Utc>) {
        if timestamp > self.ended_at {
            self.ended_at = timestamp;
        }
    }

    /// Append assistant text. A block equal (modulo whitespace) to the
    /// previous block of the same section is dropped.
    pub fn push_message(&mut self, source: ContentSource, text: &str, timestamp: DateTime<Utc>) {
        self.touch(timestamp);
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if let Some(AiSection::Message {
            source: last_source,
            text_blocks,
        }) = self.sections.last_mut()
        {
            if *last_source == source {
                push_unless_repeated(text_blocks, text);
                return;
            }
        }

        self.sections.push(AiSection::Message {
            source,
            text_blocks: vec![text.to_string()],
        });
    }

    /// Append reasoning summaries. Consecutive reasoning from the same
    /// source lands in one section.
    pub fn push_reasoning<'a, I>(
        &mut self,
        source: ContentSource,
        summaries: I,
        timestamp: DateTime<Utc>,
    ) where
        I: IntoIterator<Item = &'a str>,
    {
        self.touch(timestamp);
        let summaries: Vec<&str> = summaries
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if summaries.is_empty() {
            return;
        }

        let extend_last = matches!(
            self.sections.last(),
            Some(AiSection::Reasoning { source: last, .. }) if *last == source
        );
        if !extend_last {
            self.sections.push(AiSection::Reasoning {
                source,
                summaries: Vec::new(),
            });
        }
        if let Some(AiSection::Reasoning {
            summaries: target,
            ..
        }) = self.sections.last_mut()
        {
            for summary in summaries {
                push_unless_repeated(target, summary);
            }
        }
    }

    /// Record a function call. A second call with an id already seen in
    /// this turn is ignored, unless the id so far only has an output; the
    /// call then completes that execution.
    pub fn push_call(
        &mut self,
        call_id: &str,
        name: &str,
        arguments: &str,
        custom: bool,
        timestamp: DateTime<Utc>,
    ) {
        self.touch(timestamp);
        match self.calls.get(call_id).copied() {
            Some(slot) if slot.synthetic => {
                let execution = &mut self.executions[slot.index];
                execution.name = name.to_string();
                execution.arguments = arguments.to_string();
                execution.custom = custom;
                execution.started_at = timestamp;
                execution.duration_ms = execution
                    .completed_at
                    .map(|done| (done - timestamp).num_milliseconds().max(0));
                self.calls.insert(
                    call_id.to_string(),
                    CallSlot {
                        index: slot.index,
                        started_at: timestamp,
                        synthetic: false,
                    },
                );
                self.pending_usage_tool = Some(slot.index);
                return;
            }
            Some(_) => {
                tracing::trace!(call_id, "Ignoring repeated function call");
                return;
            }
            None => {}
        }

        let index = self.push_execution(CodexToolExecution {
            call_id: call_id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
            custom,
            output: None,
            is_error: false,
            started_at: timestamp,
            completed_at: None,
            duration_ms: None,
            token_usage: None,
        });
        self.calls.insert(
            call_id.to_string(),
            CallSlot {
                index,
                started_at: timestamp,
                synthetic: false,
            },
        );
        self.pending_usage_tool = Some(index);
    }

    /// Attach an output to its call. Outputs without a known call become a
    /// synthetic `unknown` execution that starts and ends at the output.
    pub fn push_output(
        &mut self,
        call_id: &str,
        output: &str,
        custom: bool,
        timestamp: DateTime<Utc>,
    ) {
        self.touch(timestamp);
        let is_error = output_is_error(output);

        match self.calls.get(call_id).copied() {
            Some(slot) => {
                let execution = &mut self.executions[slot.index];
                if execution.output.is_some() {
                    return;
                }
                execution.output = Some(output.to_string());
                execution.is_error = is_error;
                execution.completed_at = Some(timestamp);
                execution.duration_ms =
                    Some((timestamp - slot.started_at).num_milliseconds().max(0));
            }
            None => {
                tracing::trace!(call_id, "Function output without a matching call");
                let index = self.push_execution(CodexToolExecution {
                    call_id: call_id.to_string(),
                    name: UNKNOWN_CALL_NAME.to_string(),
                    arguments: String::new(),
                    custom,
                    output: Some(output.to_string()),
                    is_error,
                    started_at: timestamp,
                    completed_at: Some(timestamp),
                    duration_ms: Some(0),
                    token_usage: None,
                });
                self.calls.insert(
                    call_id.to_string(),
                    CallSlot {
                        index,
                        started_at: timestamp,
                        synthetic: true,
                    },
                );
            }
        }
    }

    /// Add a reconciled usage delta. The first delta after a call is also
    /// recorded on that call.
    pub fn push_usage(&mut self, delta: TokenUsage, timestamp: DateTime<Utc>) {
        self.touch(timestamp);
        self.usage += delta;
        if let Some(index) = self.pending_usage_tool.take() {
            let execution = &mut self.executions[index];
            if execution.token_usage.is_none() {
                execution.token_usage = Some(delta);
            }
        }
    }

    fn push_execution(&mut self, execution: CodexToolExecution) -> usize {
        let index = self.executions.len();
        self.executions.push(execution);
        match self.sections.last_mut() {
            Some(AiSection::ToolCalls { execution_indices }) => execution_indices.push(index),
            _ => self.sections.push(AiSection::ToolCalls {
                execution_indices: vec![index],
            }),
        }
        index
    }

    /// Build the chunk, or `None` if the turn produced no text, reasoning,
    /// or tool calls.
    ///
    /// When a turn has response-sourced text, event-sourced text is the
    /// echo of it and is dropped; reasoning is filtered the same way.
    /// Sections that become adjacent are merged afterwards.
    pub fn finish(self) -> Option<AiChunk> {
        let has_response_message = self.sections.iter().any(|s| {
            matches!(s, AiSection::Message { source: ContentSource::Response, .. })
        });
        let has_response_reasoning = self.sections.iter().any(|s| {
            matches!(s, AiSection::Reasoning { source: ContentSource::Response, .. })
        });

        let kept = self.sections.into_iter().filter(|section| match section {
            AiSection::Message { source, .. } => {
                !has_response_message || *source == ContentSource::Response
            }
            AiSection::Reasoning { source, .. } => {
                !has_response_reasoning || *source == ContentSource::Response
            }
            AiSection::ToolCalls { .. } => true,
        });

        let mut sections: Vec<AiSection> = Vec::new();
        for section in kept {
            let leftover = match sections.last_mut() {
                Some(last) => merge_section(last, section, &self.executions),
                None => Some(section),
            };
            if let Some(section) = leftover {
                sections.push(section);
            }
        }

        let mut text_blocks = Vec::new();
        let mut reasoning = Vec::new();
        for section in &sections {
            match section {
                AiSection::Message {
                    text_blocks: blocks,
                    ..
                } => text_blocks.extend(blocks.iter().cloned()),
                AiSection::Reasoning { summaries, .. } => {
                    reasoning.extend(summaries.iter().cloned())
                }
                AiSection::ToolCalls { .. } => {}
            }
        }

        if text_blocks.is_empty() && reasoning.is_empty() && self.executions.is_empty() {
            return None;
        }

        let tool_call_count = self.executions.len();
        Some(AiChunk {
            text_blocks,
            tool_executions: self.executions,
            reasoning,
            sections,
            metrics: AiMetrics {
                usage: self.usage,
                tool_call_count,
            },
            timestamp: self.started_at,
            duration_ms: (self.ended_at - self.started_at).num_milliseconds().max(0),
        })
    }
}

/// Fold `section` into `last` when both are the same kind; otherwise hand
/// it back.
fn merge_section(
    last: &mut AiSection,
    section: AiSection,
    executions: &[CodexToolExecution],
) -> Option<AiSection> {
    match (last, section) {
        (
            AiSection::Message {
                text_blocks: target,
                ..
            },
            AiSection::Message { text_blocks, .. },
        ) => {
            for block in text_blocks {
                push_unless_repeated(target, &block);
            }
            None
        }
        (
            AiSection::Reasoning {
                summaries: target,
                ..
            },
            AiSection::Reasoning { summaries, .. },
        ) => {
            for summary in summaries {
                push_unless_repeated(target, &summary);
            }
            None
        }
        (
            AiSection::ToolCalls {
                execution_indices: target,
            },
            AiSection::ToolCalls { execution_indices },
        ) => {
            let seen: HashSet<String> = target
                .iter()
                .map(|&i| executions[i].call_id.clone())
                .collect();
            target.extend(
                execution_indices
                    .into_iter()
                    .filter(|&i| !seen.contains(&executions[i].call_id)),
            );
            None
        }
        (_, section) => Some(section),
    }
}

fn push_unless_repeated(blocks: &mut Vec<String>, text: &str) {
    let repeated = blocks
        .last()
        .is_some_and(|last| normalize_whitespace(last) == normalize_whitespace(text));
    if !repeated {
        blocks.push(text.to_string());
    }
}

/// Whether a tool output reports failure.
///
/// Outputs that parse as a JSON object are checked for `is_error`, then
/// `exit_code`, then `metadata.exit_code`. Anything else is a success.
pub fn output_is_error(output: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(output) else {
        return false;
    };

    if let Some(flag) = value.get("is_error").and_then(Value::as_bool) {
        return flag;
    }
    if let Some(code) = value.get("exit_code").and_then(Value::as_i64) {
        return code != 0;
    }
    value
        .get("metadata")
        .and_then(|m| m.get("exit_code"))
        .and_then(Value::as_i64)
        .is_some_and(|code| code != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_output_is_error() {
        assert!(output_is_error(r#"{"is_error": true}"#));
        assert!(!output_is_error(r#"{"is_error": false, "exit_code": 1}"#));
        assert!(output_is_error(r#"{"exit_code": 2}"#));
        assert!(output_is_error(
            r#"{"output": "boom", "metadata": {"exit_code": 127}}"#
        ));
        assert!(!output_is_error(
            r#"{"output": "ok", "metadata": {"exit_code": 0}}"#
        ));
        assert!(!output_is_error("Exit code: 1\nnot json"));
    }

    #[test]
    fn test_call_output_pairing_and_duration() {
        let mut acc = AiAccumulator::new(t0());
        acc.push_call("c1", "shell", r#"{"command":["ls"]}"#, false, t0());
        acc.push_output(
            "c1",
            r#"{"exit_code":2}"#,
            false,
            t0() + Duration::milliseconds(1500),
        );

        let chunk = acc.finish().unwrap();
        assert_eq!(chunk.tool_executions.len(), 1);
        let exec = &chunk.tool_executions[0];
        assert_eq!(exec.name, "shell");
        assert!(exec.is_error);
        assert_eq!(exec.duration_ms, Some(1500));
        assert_eq!(chunk.metrics.tool_call_count, 1);
        assert_eq!(chunk.duration_ms, 1500);
    }

    #[test]
    fn test_orphan_output_gets_unknown_execution() {
        let mut acc = AiAccumulator::new(t0());
        acc.push_output("ghost", "done", false, t0());

        let chunk = acc.finish().unwrap();
        let exec = &chunk.tool_executions[0];
        assert_eq!(exec.name, "unknown");
        assert_eq!(exec.arguments, "");
        assert_eq!(exec.duration_ms, Some(0));
        assert_eq!(exec.completed_at, Some(t0()));
    }

    #[test]
    fn test_call_after_its_output_completes_the_execution() {
        let mut acc = AiAccumulator::new(t0());
        let delta = TokenUsage {
            total_tokens: 40,
            ..Default::default()
        };
        acc.push_output("c1", "ok", false, t0() + Duration::seconds(4));
        acc.push_call(
            "c1",
            "shell",
            r#"{"command":["ls"]}"#,
            false,
            t0() + Duration::seconds(5),
        );
        acc.push_call("c1", "shell", "{}", false, t0() + Duration::seconds(6));
        acc.push_usage(delta, t0() + Duration::seconds(6));

        let chunk = acc.finish().unwrap();
        assert_eq!(chunk.tool_executions.len(), 1);
        let exec = &chunk.tool_executions[0];
        assert_eq!(exec.name, "shell");
        assert_eq!(exec.arguments, r#"{"command":["ls"]}"#);
        assert_eq!(exec.output.as_deref(), Some("ok"));
        assert_eq!(exec.duration_ms, Some(0));
        assert_eq!(exec.token_usage, Some(delta));
    }

    #[test]
    fn test_repeated_call_id_is_ignored() {
        let mut acc = AiAccumulator::new(t0());
        acc.push_call("c1", "shell", "{}", false, t0());
        acc.push_call("c1", "shell", "{}", false, t0());
        let chunk = acc.finish().unwrap();
        assert_eq!(chunk.tool_executions.len(), 1);
        assert_eq!(
            chunk.sections,
            vec![AiSection::ToolCalls {
                execution_indices: vec![0]
            }]
        );
    }

    #[test]
    fn test_event_text_dropped_when_response_text_present() {
        let mut acc = AiAccumulator::new(t0());
        acc.push_message(ContentSource::Event, "Done.", t0());
        acc.push_message(ContentSource::Response, "Done.", t0());

        let chunk = acc.finish().unwrap();
        assert_eq!(chunk.text_blocks, vec!["Done."]);
        assert_eq!(chunk.sections.len(), 1);
    }

    #[test]
    fn test_event_text_kept_without_response_text() {
        let mut acc = AiAccumulator::new(t0());
        acc.push_reasoning(ContentSource::Event, ["thinking"], t0());
        acc.push_message(ContentSource::Event, "hello", t0());
        acc.push_message(ContentSource::Event, "hello ", t0());

        let chunk = acc.finish().unwrap();
        assert_eq!(chunk.text_blocks, vec!["hello"]);
        assert_eq!(chunk.reasoning, vec!["thinking"]);
    }

    #[test]
    fn test_sections_merge_after_filtering() {
        let mut acc = AiAccumulator::new(t0());
        acc.push_message(ContentSource::Response, "first", t0());
        acc.push_message(ContentSource::Event, "first", t0());
        acc.push_message(ContentSource::Response, "second", t0());

        let chunk = acc.finish().unwrap();
        assert_eq!(
            chunk.sections,
            vec![AiSection::Message {
                source: ContentSource::Response,
                text_blocks: vec!["first".to_string(), "second".to_string()],
            }]
        );
    }

    #[test]
    fn test_usage_goes_to_pending_call_once() {
        let mut acc = AiAccumulator::new(t0());
        let delta = TokenUsage {
            total_tokens: 10,
            ..Default::default()
        };
        acc.push_call("c1", "shell", "{}", false, t0());
        acc.push_usage(delta, t0());
        acc.push_usage(delta, t0());

        let chunk = acc.finish().unwrap();
        assert_eq!(chunk.tool_executions[0].token_usage, Some(delta));
        assert_eq!(chunk.metrics.usage.total_tokens, 20);
    }

    #[test]
    fn test_empty_turn_yields_nothing() {
        let mut acc = AiAccumulator::new(t0());
        acc.push_message(ContentSource::Response, "   ", t0());
        acc.push_usage(TokenUsage::default(), t0());
        assert!(acc.finish().is_none());
    }
}
