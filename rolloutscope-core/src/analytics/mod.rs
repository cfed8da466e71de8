//! Usage analytics for Codex sessions
//!
//! Builds on [`ParsedSession`](crate::ingest::ParsedSession):
//! - [`stats`]: one [`CodexStatsSessionRecord`] per session, with token deltas
//!   bucketed by local day, local hour, and model
//! - [`summary`]: records aggregated for a [`StatsScope`] and priced against
//!   a [`RateCard`]
//! - [`collect`]: records for many files at once on the blocking pool

pub mod collect;
pub mod rate_card;
pub mod stats;
pub mod summary;

pub use collect::{collect_session_records, CollectedRecord};
pub use rate_card::{ModelRate, RateCard};
pub use stats::{
    build_session_record, build_session_record_in, CodexStatsSessionRecord, DailyBucket,
    HourlyBucket, ModelBucket,
};
pub use summary::{summarize, CodexStatsSummary, ModelCost, StatsScope};
