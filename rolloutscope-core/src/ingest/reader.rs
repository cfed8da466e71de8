//! Line-oriented rollout reader
//!
//! Reads a rollout with a buffered reader, one line at a time, and validates
//! each JSON value as it goes. Only opening or reading the file can fail;
//! bad lines are skipped and counted in the [`ReadReport`].

use crate::error::{Error, Result};
use crate::ingest::entry::{validate, LogEntry};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Counters describing one read of a rollout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReport {
    /// Non-empty lines (or raw values) seen
    pub lines: usize,
    /// Values that validated into entries
    pub parsed: usize,
    /// Lines that were not valid JSON
    pub skipped_json: usize,
    /// JSON values rejected by the validator
    pub skipped_invalid: usize,
}

impl ReadReport {
    pub fn skipped(&self) -> usize {
        self.skipped_json + self.skipped_invalid
    }
}

/// Read and validate every line of a rollout file, in file order.
pub fn read_entries(path: &Path) -> Result<(Vec<LogEntry>, ReadReport)> {
    let file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut report = ReadReport::default();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = match line_result {
            Ok(l) => l,
            // Invalid UTF-8 on one line is a malformed line, not an I/O failure
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::debug!(
                    path = %path.display(),
                    line = line_number,
                    "Skipping non-UTF-8 line"
                );
                report.lines += 1;
                report.skipped_json += 1;
                continue;
            }
            Err(e) => {
                return Err(Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("{}:{}: read error: {}", path.display(), line_number, e),
                )))
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        report.lines += 1;

        let raw: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    line = line_number,
                    error = %e,
                    "Skipping malformed JSON line"
                );
                report.skipped_json += 1;
                continue;
            }
        };

        match validate(&raw) {
            Some(entry) => {
                report.parsed += 1;
                entries.push(entry);
            }
            None => {
                tracing::trace!(
                    path = %path.display(),
                    line = line_number,
                    "Dropping invalid entry"
                );
                report.skipped_invalid += 1;
            }
        }
    }

    tracing::debug!(
        path = %path.display(),
        lines = report.lines,
        parsed = report.parsed,
        skipped = report.skipped(),
        "Read rollout"
    );

    Ok((entries, report))
}

/// Validate an already-tokenized sequence of raw values.
pub fn validate_values<'a, I>(values: I) -> (Vec<LogEntry>, ReadReport)
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut entries = Vec::new();
    let mut report = ReadReport::default();

    for raw in values {
        report.lines += 1;
        match validate(raw) {
            Some(entry) => {
                report.parsed += 1;
                entries.push(entry);
            }
            None => report.skipped_invalid += 1,
        }
    }

    (entries, report)
}
