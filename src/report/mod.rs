//! Run reports.
//!
//! A run produces one directory holding:
//!
//! - `test_report.csv`: one row per classified group, then a summary block
//! - `summary.json`: the same summary, machine readable
//! - one `<group_path>.log` per group with the raw device transcript
//!
//! The orchestration engine only sees the [`ReportSink`] trait and
//! [`GroupLog`]; everything about file layout lives here.

pub mod analyze;
mod csv_sink;
pub mod display;
mod group_log;
mod summary;

pub use csv_sink::{CsvReportSink, MemoryReportSink, REPORT_FILE_NAME, SUMMARY_FILE_NAME};
pub use group_log::{log_file_name, GroupLog};
pub use summary::RunSummary;

use crate::engine::GroupOutcome;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Timestamp layout used in reports and group logs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot create '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report '{path}' has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// One classified group.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// 1-based position in the full leaf-group list.
    pub index: usize,
    pub group_path: String,
    pub outcome: GroupOutcome,
    pub duration: Duration,
    pub started: DateTime<Local>,
    pub ended: DateTime<Local>,
}

/// Append-only destination for run results.
///
/// `finish` is called at most once, after the last row. Sinks release their
/// resources on drop whether or not it was called.
pub trait ReportSink {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError>;

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError>;

    /// Where the report ends up, if it is persisted at all.
    fn location(&self) -> Option<&Path> {
        None
    }
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        (**self).record(row)
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        (**self).finish(summary)
    }

    fn location(&self) -> Option<&Path> {
        (**self).location()
    }
}
