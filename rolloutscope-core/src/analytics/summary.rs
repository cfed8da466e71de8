//! Multi-session summary with cost estimation

use crate::analytics::rate_card::RateCard;
use crate::analytics::stats::{empty_hours, CodexStatsSessionRecord, DailyBucket, HourlyBucket};
use crate::error::{Error, Result};
use crate::types::TokenUsage;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Number of days and hours reported in the "top" lists.
pub const TOP_N: usize = 5;

/// Which sessions a summary covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatsScope {
    All,
    /// Sessions whose cwd equals this path exactly
    Project(String),
}

impl StatsScope {
    pub fn matches(&self, record: &CodexStatsSessionRecord) -> bool {
        match self {
            StatsScope::All => true,
            StatsScope::Project(cwd) => record.cwd.as_deref() == Some(cwd.as_str()),
        }
    }
}

impl fmt::Display for StatsScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsScope::All => write!(f, "all"),
            StatsScope::Project(cwd) => write!(f, "project:{}", cwd),
        }
    }
}

impl FromStr for StatsScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            return Ok(StatsScope::All);
        }
        match s.strip_prefix("project:") {
            Some(cwd) if !cwd.is_empty() => Ok(StatsScope::Project(cwd.to_string())),
            _ => Err(Error::Config(format!(
                "Invalid stats scope '{}': expected 'all' or 'project:<cwd>'",
                s
            ))),
        }
    }
}

impl Serialize for StatsScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Tokens and estimated cost of one `(model, reasoning effort)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCost {
    pub model: String,
    pub reasoning_effort: String,
    #[serde(flatten)]
    pub usage: TokenUsage,
    /// `None` when the model is absent from the rate card
    pub cost_usd: Option<f64>,
}

/// Aggregated statistics for a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexStatsSummary {
    pub scope: StatsScope,
    pub session_count: usize,
    pub turn_count: usize,
    pub tool_call_count: usize,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    pub totals: TokenUsage,
    pub daily: Vec<DailyBucket>,
    pub hourly: Vec<HourlyBucket>,
    pub models: Vec<ModelCost>,
    pub estimated_cost_usd: f64,
    pub unpriced_tokens: u64,
    pub unpriced_models: Vec<String>,
    pub top_days: Vec<DailyBucket>,
    pub top_hours: Vec<HourlyBucket>,
    pub rate_card_updated_at: Option<String>,
    pub rate_card_source: Option<String>,
    pub rate_card_warnings: Vec<String>,
}

/// Aggregate the records in `scope` and price them against `rate_card`.
pub fn summarize(
    records: &[CodexStatsSessionRecord],
    scope: &StatsScope,
    rate_card: &RateCard,
) -> CodexStatsSummary {
    let mut session_count = 0;
    let mut turn_count = 0;
    let mut tool_call_count = 0;
    let mut duration_ms = 0i64;
    let mut totals = TokenUsage::default();
    let mut daily: BTreeMap<NaiveDate, DailyBucket> = BTreeMap::new();
    let mut hourly = empty_hours();
    let mut models: BTreeMap<(String, String), TokenUsage> = BTreeMap::new();

    for record in records.iter().filter(|r| scope.matches(r)) {
        session_count += 1;
        turn_count += record.turn_count;
        tool_call_count += record.tool_call_count;
        duration_ms = duration_ms.saturating_add(record.duration_ms);
        totals += record.totals;

        for day in &record.daily {
            let bucket = daily.entry(day.date).or_insert_with(|| DailyBucket {
                date: day.date,
                event_count: 0,
                usage: TokenUsage::default(),
            });
            bucket.event_count += day.event_count;
            bucket.usage += day.usage;
        }
        for (target, hour) in hourly.iter_mut().zip(&record.hourly) {
            target.event_count += hour.event_count;
            target.usage += hour.usage;
        }
        for bucket in &record.models {
            *models
                .entry((bucket.model.clone(), bucket.reasoning_effort.clone()))
                .or_default() += bucket.usage;
        }
    }

    let mut estimated_cost_usd = 0.0;
    let mut unpriced_tokens = 0u64;
    let mut unpriced_models = BTreeSet::new();
    let models: Vec<ModelCost> = models
        .into_iter()
        .map(|((model, reasoning_effort), usage)| {
            let cost_usd = rate_card.rate_for(&model).map(|rate| rate.cost(&usage));
            match cost_usd {
                Some(cost) => estimated_cost_usd += cost,
                None => {
                    unpriced_tokens += usage.total_tokens;
                    unpriced_models.insert(model.clone());
                }
            }
            ModelCost {
                model,
                reasoning_effort,
                usage,
                cost_usd,
            }
        })
        .collect();

    let daily: Vec<DailyBucket> = daily.into_values().collect();
    let top_days = top_by_activity(&daily, |d| (d.event_count, d.usage.total_tokens));
    let top_hours = top_by_activity(&hourly, |h| (h.event_count, h.usage.total_tokens));

    if !unpriced_models.is_empty() {
        tracing::debug!(
            models = ?unpriced_models,
            tokens = unpriced_tokens,
            "Unpriced models in summary"
        );
    }

    CodexStatsSummary {
        scope: scope.clone(),
        session_count,
        turn_count,
        tool_call_count,
        duration_ms,
        totals,
        daily,
        hourly,
        models,
        estimated_cost_usd,
        unpriced_tokens,
        unpriced_models: unpriced_models.into_iter().collect(),
        top_days,
        top_hours,
        rate_card_updated_at: rate_card.updated_at.clone(),
        rate_card_source: rate_card.source.clone(),
        rate_card_warnings: rate_card.warnings.clone(),
    }
}

/// Up to [`TOP_N`] buckets with activity, busiest first. Ties on event count
/// go to the bucket with more tokens, then to the earlier bucket.
fn top_by_activity<T, F>(buckets: &[T], key: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> (usize, u64),
{
    let mut ranked: Vec<&T> = buckets
        .iter()
        .filter(|b| {
            let (events, tokens) = key(b);
            events > 0 || tokens > 0
        })
        .collect();
    ranked.sort_by(|a, b| key(b).cmp(&key(a)));
    ranked.into_iter().take(TOP_N).cloned().collect()
}
