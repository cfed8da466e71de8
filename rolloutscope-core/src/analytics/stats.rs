//! Per-session statistics
//!
//! Every reconciled token delta of a session is bucketed three ways: by local
//! calendar day, by local hour of day, and by `(model, reasoning effort)`.
//! Activity (non-token entries) is counted per day and hour alongside.

use crate::ingest::classify::MessageKind;
use crate::ingest::entry::{EventPayload, LogEntry};
use crate::ingest::session::{ParsedSession, UNKNOWN_EFFORT};
use crate::ingest::usage::UsageReconciler;
use crate::types::TokenUsage;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Model name used for tokens reported before any model is known.
pub const UNKNOWN_MODEL: &str = "unknown";

pub const HOURS_PER_DAY: usize = 24;

/// Activity and tokens for one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub event_count: usize,
    #[serde(flatten)]
    pub usage: TokenUsage,
}

/// Activity and tokens for one local hour of day (0-23).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    pub hour: u32,
    pub event_count: usize,
    #[serde(flatten)]
    pub usage: TokenUsage,
}

/// Tokens attributed to one `(model, reasoning effort)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBucket {
    pub model: String,
    pub reasoning_effort: String,
    #[serde(flatten)]
    pub usage: TokenUsage,
}

/// Statistical record of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexStatsSessionRecord {
    pub session_id: String,
    pub cwd: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    pub turn_count: usize,
    pub tool_call_count: usize,
    pub totals: TokenUsage,
    /// Days with activity or tokens, ascending
    pub daily: Vec<DailyBucket>,
    /// Always exactly 24 buckets, hour 0 first
    pub hourly: Vec<HourlyBucket>,
    /// Sorted by model, then effort
    pub models: Vec<ModelBucket>,
}

/// Build a session's record with buckets in the local time zone.
pub fn build_session_record(session: &ParsedSession) -> CodexStatsSessionRecord {
    build_session_record_in(session, &Local)
}

/// Build a session's record with day/hour buckets in `tz`.
pub fn build_session_record_in<Tz: TimeZone>(
    session: &ParsedSession,
    tz: &Tz,
) -> CodexStatsSessionRecord {
    let mut daily: BTreeMap<NaiveDate, DailyBucket> = BTreeMap::new();
    let mut hourly = empty_hours();
    let mut models: BTreeMap<(String, String), TokenUsage> = BTreeMap::new();
    let mut totals = TokenUsage::default();
    let mut reconciler = UsageReconciler::new();

    let mut model = session
        .metadata
        .model
        .clone()
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
    let mut effort = session
        .metadata
        .reasoning_effort
        .clone()
        .unwrap_or_else(|| UNKNOWN_EFFORT.to_string());

    for (entry, class) in session.entries.iter().zip(&session.classified) {
        let local = entry.timestamp().with_timezone(tz);
        let date = local.date_naive();
        let hour = local.hour();

        if is_activity(class.kind) {
            day_bucket(&mut daily, date).event_count += 1;
            hourly[hour as usize].event_count += 1;
        }

        match entry {
            LogEntry::TurnContext(ctx) => {
                if let Some(next) = &ctx.model {
                    effort = match &ctx.effort {
                        Some(e) => e.clone(),
                        None if *next == model => effort,
                        None => UNKNOWN_EFFORT.to_string(),
                    };
                    model = next.clone();
                }
            }
            LogEntry::EventMsg(event) => {
                let EventPayload::TokenCount { info: Some(info) } = &event.payload else {
                    continue;
                };
                let Some(delta) = reconciler.push(info) else {
                    continue;
                };
                totals += delta;
                day_bucket(&mut daily, date).usage += delta;
                hourly[hour as usize].usage += delta;
                *models
                    .entry((model.clone(), effort.clone()))
                    .or_default() += delta;
            }
            _ => {}
        }
    }

    CodexStatsSessionRecord {
        session_id: session.metadata.id.clone(),
        cwd: session.metadata.cwd.clone(),
        start_time: session.metadata.start_time,
        duration_ms: session.metrics.duration_ms,
        turn_count: session.metrics.turn_count,
        tool_call_count: session.metrics.tool_call_count,
        totals,
        daily: daily.into_values().collect(),
        hourly,
        models: models
            .into_iter()
            .map(|((model, reasoning_effort), usage)| ModelBucket {
                model,
                reasoning_effort,
                usage,
            })
            .collect(),
    }
}

/// Entries that count as activity: prose and tool traffic, not bookkeeping
/// events or metadata.
fn is_activity(kind: MessageKind) -> bool {
    !matches!(kind, MessageKind::Event | MessageKind::Other)
}

fn day_bucket(daily: &mut BTreeMap<NaiveDate, DailyBucket>, date: NaiveDate) -> &mut DailyBucket {
    daily.entry(date).or_insert_with(|| DailyBucket {
        date,
        event_count: 0,
        usage: TokenUsage::default(),
    })
}

pub(crate) fn empty_hours() -> Vec<HourlyBucket> {
    (0..HOURS_PER_DAY as u32)
        .map(|hour| HourlyBucket {
            hour,
            event_count: 0,
            usage: TokenUsage::default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::session::parse_session_values;
    use chrono::FixedOffset;
    use serde_json::{json, Value};
    use std::path::Path;

    fn token_count(ts: &str, total: u64) -> Value {
        let usage = json!({ "input_tokens": total, "output_tokens": 0, "total_tokens": total });
        json!({ "timestamp": ts, "type": "event_msg", "payload": {
            "type": "token_count",
            "info": { "total_token_usage": usage, "last_token_usage": usage }
        }})
    }

    fn user(ts: &str) -> Value {
        json!({
            "timestamp": ts,
            "type": "event_msg",
            "payload": { "type": "user_message", "message": "go" }
        })
    }

    fn turn_context(ts: &str, model: &str, effort: &str) -> Value {
        json!({
            "timestamp": ts,
            "type": "turn_context",
            "payload": { "cwd": "/repo", "model": model, "effort": effort }
        })
    }

    fn record(values: &[Value]) -> CodexStatsSessionRecord {
        let session = parse_session_values(Path::new("rollout-test.jsonl"), values);
        build_session_record_in(&session, &Utc)
    }

    #[test]
    fn test_repeated_totals_count_once() {
        let r = record(&[
            token_count("2025-03-01T10:00:00Z", 16),
            token_count("2025-03-01T10:00:01Z", 16),
        ]);
        assert_eq!(r.totals.total_tokens, 16);
        assert_eq!(r.hourly[10].usage.total_tokens, 16);
    }

    #[test]
    fn test_always_24_hours() {
        let r = record(&[]);
        assert_eq!(r.hourly.len(), 24);
        assert!(r.daily.is_empty());
        assert_eq!(r.hourly[23].hour, 23);
    }

    #[test]
    fn test_day_and_hour_follow_time_zone() {
        let values = vec![
            user("2025-03-01T23:30:00Z"),
            token_count("2025-03-01T23:30:05Z", 10),
        ];
        let session = parse_session_values(Path::new("rollout-test.jsonl"), &values);
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let r = build_session_record_in(&session, &plus_two);

        assert_eq!(r.daily.len(), 1);
        assert_eq!(
            r.daily[0].date,
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );
        assert_eq!(r.daily[0].event_count, 1);
        assert_eq!(r.hourly[1].event_count, 1);
        assert_eq!(r.hourly[1].usage.total_tokens, 10);
    }

    #[test]
    fn test_token_events_are_not_activity() {
        let r = record(&[token_count("2025-03-01T10:00:00Z", 5)]);
        assert_eq!(r.daily[0].event_count, 0);
        assert_eq!(r.daily[0].usage.total_tokens, 5);
    }

    #[test]
    fn test_model_buckets_follow_turn_context() {
        let r = record(&[
            turn_context("2025-03-01T10:00:00Z", "gpt-5", "high"),
            token_count("2025-03-01T10:00:01Z", 100),
            turn_context("2025-03-01T10:01:00Z", "gpt-5-mini", "low"),
            token_count("2025-03-01T10:01:01Z", 130),
        ]);
        assert_eq!(
            r.models,
            vec![
                ModelBucket {
                    model: "gpt-5".into(),
                    reasoning_effort: "high".into(),
                    usage: TokenUsage {
                        input_tokens: 100,
                        total_tokens: 100,
                        ..Default::default()
                    },
                },
                ModelBucket {
                    model: "gpt-5-mini".into(),
                    reasoning_effort: "low".into(),
                    usage: TokenUsage {
                        input_tokens: 30,
                        total_tokens: 30,
                        ..Default::default()
                    },
                },
            ]
        );
    }

    #[test]
    fn test_tokens_before_any_model_are_unknown() {
        let r = record(&[token_count("2025-03-01T10:00:00Z", 7)]);
        assert_eq!(r.models[0].model, UNKNOWN_MODEL);
        assert_eq!(r.models[0].reasoning_effort, UNKNOWN_EFFORT);
    }
}
