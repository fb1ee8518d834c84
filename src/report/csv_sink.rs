use super::{ReportError, ReportRow, ReportSink, RunSummary, TIMESTAMP_FORMAT};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE_NAME: &str = "test_report.csv";
pub const SUMMARY_FILE_NAME: &str = "summary.json";

const HEADER: [&str; 6] = [
    "Index",
    "Group Path",
    "Result",
    "Duration (s)",
    "Start Time",
    "End Time",
];

/// `test_report.csv` plus `summary.json` in the run directory.
///
/// Rows are flushed as they are written so a killed run still leaves a
/// readable report behind.
#[derive(Debug)]
pub struct CsvReportSink {
    dir: PathBuf,
    path: PathBuf,
    writer: csv::Writer<File>,
    /// Shares the writer's file offset; carries the raw separator line.
    raw: File,
    finished: bool,
}

impl CsvReportSink {
    /// Create the report file in `dir` (which must exist) and write the header.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, ReportError> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(REPORT_FILE_NAME);
        let file = File::create(&path).map_err(|source| ReportError::Create {
            path: path.clone(),
            source,
        })?;
        let raw = file.try_clone().map_err(|source| ReportError::Create {
            path: path.clone(),
            source,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush()?;
        info!(path = %path.display(), "writing test report");
        Ok(Self {
            dir,
            path,
            writer,
            raw,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE_NAME)
    }
}

impl ReportSink for CsvReportSink {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        self.writer.write_record([
            row.index.to_string(),
            row.group_path.clone(),
            row.outcome.as_str().to_string(),
            format!("{:.2}", row.duration.as_secs_f64()),
            row.started.format(TIMESTAMP_FORMAT).to_string(),
            row.ended.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // Blank separator line, then the summary block.
        self.writer.flush()?;
        self.raw.write_all(b"\n")?;
        self.writer.write_record(["# Summary"])?;
        for (label, value) in summary.csv_rows() {
            self.writer.write_record([label, value.as_str()])?;
        }
        self.writer.flush()?;

        let json_path = self.summary_path();
        let json = File::create(&json_path).map_err(|source| ReportError::Create {
            path: json_path.clone(),
            source,
        })?;
        serde_json::to_writer_pretty(json, summary)?;

        info!(path = %self.path.display(), "test report saved");
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    pub rows: Vec<ReportRow>,
    pub summary: Option<RunSummary>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemoryReportSink {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{GroupOutcome, RunStats};
    use chrono::{Local, TimeZone};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn row(index: usize, path: &str, outcome: GroupOutcome) -> ReportRow {
        let started = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        ReportRow {
            index,
            group_path: path.to_string(),
            outcome,
            duration: Duration::from_millis(1234),
            started,
            ended: started + chrono::Duration::seconds(1),
        }
    }

    #[test]
    fn test_rows_and_summary_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvReportSink::create(dir.path()).unwrap();
        sink.record(&row(2, "pkg.A", GroupOutcome::Passed)).unwrap();
        sink.record(&row(3, "pkg.B", GroupOutcome::Hang)).unwrap();

        let stats = RunStats {
            passed: 1,
            hang: 1,
            ..RunStats::default()
        };
        sink.finish(&RunSummary::new(3, 1, stats, Duration::from_secs(10), false))
            .unwrap();
        drop(sink);

        let text = std::fs::read_to_string(dir.path().join(REPORT_FILE_NAME)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[..4],
            &[
                "Index,Group Path,Result,Duration (s),Start Time,End Time",
                "2,pkg.A,PASSED,1.23,2024-03-01 12:00:00,2024-03-01 12:00:01",
                "3,pkg.B,HUNG,1.23,2024-03-01 12:00:00,2024-03-01 12:00:01",
                "",
            ]
        );
        assert_eq!(lines[4], "# Summary");
        assert!(lines.contains(&"Pass Rate (%),50.0"));
        assert!(lines.contains(&"Avg Time per Group (s),5.00"));

        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(SUMMARY_FILE_NAME)).unwrap(),
        )
        .unwrap();
        assert_eq!(json["hang"], 1);
    }

    #[test]
    fn test_finish_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvReportSink::create(dir.path()).unwrap();
        let summary = RunSummary::new(0, 0, RunStats::default(), Duration::ZERO, false);
        sink.finish(&summary).unwrap();
        sink.finish(&summary).unwrap();
        drop(sink);

        let text = std::fs::read_to_string(dir.path().join(REPORT_FILE_NAME)).unwrap();
        assert_eq!(text.matches("# Summary").count(), 1);
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let err = CsvReportSink::create("/nonexistent/run").unwrap_err();
        assert!(matches!(err, ReportError::Create { .. }));
    }
}
