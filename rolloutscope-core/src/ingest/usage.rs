//! Token usage reconciliation
//!
//! `token_count` events carry two snapshots: `total_token_usage`, a running
//! total for the session, and `last_token_usage`, the provider's own delta for
//! the latest request. Totals are re-emitted verbatim on some turns and reset
//! on others, so neither can be summed directly. [`resolve`] turns each
//! report into the increment that should be added to an aggregate.

use crate::ingest::entry::TokenCountInfo;
use crate::types::TokenUsage;

/// Compute the increment contributed by one cumulative usage report.
///
/// Returns `None` when the report is an exact re-emission of the previous
/// snapshot and must contribute nothing.
///
/// 1. No previous snapshot: the fallback delta bootstraps the session.
/// 2. Otherwise each field is diffed and clamped at zero independently, so a
///    shrinking counter (e.g. cached input after eviction) never cancels a
///    growing one.
/// 3. Any positive field: the clamped diff is the increment.
/// 4. All five fields identical: duplicate, skip.
/// 5. Otherwise the provider reset its counters: use the fallback delta.
pub fn resolve(
    previous: Option<&TokenUsage>,
    current: &TokenUsage,
    fallback: &TokenUsage,
) -> Option<TokenUsage> {
    let Some(previous) = previous else {
        return Some(*fallback);
    };

    let diff = current.clamped_diff(previous);
    if diff.any_positive() {
        return Some(diff);
    }

    if current == previous {
        return None;
    }

    Some(*fallback)
}

/// Stateful wrapper around [`resolve`] that remembers the last cumulative
/// snapshot of a session.
#[derive(Debug, Clone, Default)]
pub struct UsageReconciler {
    previous: Option<TokenUsage>,
}

impl UsageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one `token_count` report; returns the increment, if any.
    pub fn push(&mut self, info: &TokenCountInfo) -> Option<TokenUsage> {
        let delta = resolve(self.previous.as_ref(), &info.total_usage, &info.last_usage);
        self.previous = Some(info.total_usage);
        delta
    }

    /// Most recent cumulative snapshot seen.
    pub fn last_cumulative(&self) -> Option<&TokenUsage> {
        self.previous.as_ref()
    }
}
