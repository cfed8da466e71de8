//! Batch collection of session records
//!
//! Parsing is blocking file I/O, so each rollout is parsed on tokio's
//! blocking pool. All files are in flight at once; results come back in
//! input order.

use crate::analytics::stats::{build_session_record, CodexStatsSessionRecord};
use crate::error::Result;
use crate::ingest::session::parse_session_file;
use std::path::PathBuf;

/// Outcome of collecting one rollout.
#[derive(Debug)]
pub struct CollectedRecord {
    pub path: PathBuf,
    pub record: Result<CodexStatsSessionRecord>,
}

/// Parse every rollout in `paths` and build its stats record.
///
/// A file that cannot be read yields an error in its own slot; the rest of
/// the batch is unaffected.
pub async fn collect_session_records(paths: Vec<PathBuf>) -> Vec<CollectedRecord> {
    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let task_path = path.clone();
            let handle = tokio::task::spawn_blocking(move || {
                parse_session_file(&task_path).map(|session| build_session_record(&session))
            });
            (path, handle)
        })
        .collect();

    let mut collected = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let record = match handle.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &record {
            tracing::warn!(path = %path.display(), error = %e, "Failed to collect session");
        }
        collected.push(CollectedRecord { path, record });
    }

    let failed = collected.iter().filter(|c| c.record.is_err()).count();
    tracing::info!(files = collected.len(), failed, "Collected session records");
    collected
}
