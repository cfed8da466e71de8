//! # rolloutscope-core
//!
//! Core library for rolloutscope - reconstruction and accounting for Codex
//! rollout logs.
//!
//! This library provides:
//! - Validated, typed entries from rollout JSONL files
//! - Conversation chunks (user turns, AI turns, markers) for display
//! - Per-session metadata and token metrics
//! - Usage statistics and cost estimation across sessions
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Pipeline
//!
//! ```text
//! rollout.jsonl ─► ingest::reader ─► ingest::entry::validate
//!                                         │
//!                        ┌────────────────┴───────────────┐
//!                        ▼                                ▼
//!                 ingest::session                      chunks
//!                        │
//!                        ▼
//!                    analytics
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use rolloutscope_core::analytics::{build_session_record, summarize, RateCard, StatsScope};
//! use rolloutscope_core::{build_chunks, parse_session_file};
//! use std::path::Path;
//!
//! let session = parse_session_file(Path::new("rollout.jsonl"))?;
//! let chunks = build_chunks(&session.entries);
//! println!("{} chunks", chunks.len());
//!
//! let record = build_session_record(&session);
//! let summary = summarize(&[record], &StatsScope::All, &RateCard::default());
//! println!("{} tokens", summary.totals.total_tokens);
//! # Ok::<(), rolloutscope_core::Error>(())
//! ```

// Re-export commonly used items at the crate root
pub use chunks::{build_chunks, build_session_chunks, ChunkBuilder};
pub use config::{AttachmentLimits, Config};
pub use error::{Error, Result};
pub use ingest::{parse_session_file, parse_session_values, LogEntry, ParsedSession, ReadReport};
pub use types::*;

// Public modules
pub mod analytics;
pub mod chunks;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod types;
