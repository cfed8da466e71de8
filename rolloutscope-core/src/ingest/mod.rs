//! Ingestion layer for Codex rollout files
//!
//! Turns raw JSONL lines into validated, typed entries and derives
//! per-session metadata from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │  rollout.jsonl  │ ──► │    reader    │ ──► │ entry::validate  │
//! └─────────────────┘     └──────────────┘     └──────────────────┘
//!                                                       │
//!                              ┌────────────────────────┴───────┐
//!                              ▼                                ▼
//!                    ┌──────────────────┐            ┌──────────────────┐
//!                    │ session (1 pass) │            │  crate::chunks   │
//!                    └──────────────────┘            └──────────────────┘
//!                              │
//!                              ▼
//!                    ┌──────────────────┐
//!                    │ crate::analytics │
//!                    └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rolloutscope_core::ingest::parse_session_file;
//! use std::path::Path;
//!
//! let session = parse_session_file(Path::new("rollout.jsonl"))?;
//! println!("{}: {} turns", session.metadata.id, session.metrics.turn_count);
//! # Ok::<(), rolloutscope_core::Error>(())
//! ```

pub mod classify;
pub mod entry;
pub mod reader;
pub mod session;
pub mod usage;

pub use classify::{classify, searchable_text, ClassifiedEntry, MessageKind};
pub use entry::{validate, LogEntry, TokenCountInfo};
pub use reader::{read_entries, validate_values, ReadReport};
pub use session::{
    extract_session_id, parse_entries, parse_session_file, parse_session_values, ParsedSession,
};
pub use usage::{resolve, UsageReconciler};
