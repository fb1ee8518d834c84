//! Post-run crash triage.
//!
//! Walks a finished `test_report.csv`, opens the group log of every row with
//! the selected result and pulls out the first line carrying the reason
//! marker (by default the C++ runtime's `libc++abi:` abort message). The
//! output is the same table with an extra `Reason` column.

use super::{log_file_name, ReportError};
use std::path::{Path, PathBuf};
use tracing::info;

const RESULT_COLUMN: usize = 2;
const GROUP_COLUMN: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Result label whose rows are inspected.
    pub result: String,
    /// Substring identifying the reason line in a group log.
    pub marker: String,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            result: "CRASH".to_string(),
            marker: "libc++abi:".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub output: PathBuf,
    /// `(group path, reason)` for every inspected row, in report order.
    pub reasons: Vec<(String, String)>,
}

/// `dir/test_report.csv` becomes `dir/test_report_with_reasons.csv`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}_with_reasons.{}", ext.to_string_lossy()),
        None => format!("{stem}_with_reasons"),
    };
    input.with_file_name(name)
}

/// First line of the log containing `marker`, trimmed, or a bracketed note
/// explaining why there is none.
pub fn extract_reason(log_path: &Path, marker: &str) -> String {
    if !log_path.exists() {
        return format!("[Log file not found: {}]", log_path.display());
    }
    let bytes = match std::fs::read(log_path) {
        Ok(bytes) => bytes,
        Err(e) => return format!("[Error reading log: {e}]"),
    };
    String::from_utf8_lossy(&bytes)
        .lines()
        .find(|line| line.contains(marker))
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| format!("[{marker} not found in log]"))
}

/// Annotate `input` and write the result to `output`.
///
/// Group logs are looked up next to `input`. Rows too short to carry a
/// result (the summary block) get an empty reason.
pub fn analyze_report(
    input: &Path,
    output: &Path,
    options: &AnalyzeOptions,
) -> Result<Analysis, ReportError> {
    let log_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let file = std::fs::File::open(input).map_err(|source| ReportError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut records = reader.records();
    let mut header = match records.next() {
        Some(record) => record?,
        None => {
            return Err(ReportError::MissingColumn {
                path: input.to_path_buf(),
                column: "Result",
            })
        }
    };
    if header.get(RESULT_COLUMN).map(str::trim) != Some("Result") {
        return Err(ReportError::MissingColumn {
            path: input.to_path_buf(),
            column: "Result",
        });
    }
    header.push_field("Reason");

    let out = std::fs::File::create(output).map_err(|source| ReportError::Create {
        path: output.to_path_buf(),
        source,
    })?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
    writer.write_record(&header)?;

    let mut reasons = Vec::new();
    for record in records {
        let mut record = record?;
        let selected = record.len() > RESULT_COLUMN
            && record.get(RESULT_COLUMN).map(str::trim) == Some(options.result.as_str());
        if !selected {
            record.push_field("");
            writer.write_record(&record)?;
            continue;
        }

        let group = record.get(GROUP_COLUMN).unwrap_or_default().to_string();
        let reason = extract_reason(&log_dir.join(log_file_name(&group)), &options.marker);
        info!(group = %group, reason = %reason, "extracted reason");
        record.push_field(&reason);
        writer.write_record(&record)?;
        reasons.push((group, reason));
    }
    writer.flush()?;

    info!(
        matched = reasons.len(),
        result = %options.result,
        output = %output.display(),
        "analysis complete"
    );
    Ok(Analysis {
        output: output.to_path_buf(),
        reasons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPORT: &str = "\
Index,Group Path,Result,Duration (s),Start Time,End Time
1,pkg.A,PASSED,1.00,2024-03-01 10:00:00,2024-03-01 10:00:01
2,pkg.B,CRASH,2.00,2024-03-01 10:00:01,2024-03-01 10:00:03
3,pkg.C,CRASH,2.00,2024-03-01 10:00:03,2024-03-01 10:00:05
4,pkg.D,CRASH,2.00,2024-03-01 10:00:05,2024-03-01 10:00:07

# Summary
Total Groups,4
";

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/runs/a/test_report.csv")),
            PathBuf::from("/runs/a/test_report_with_reasons.csv")
        );
    }

    #[test]
    fn test_reasons_are_extracted_per_crash_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("test_report.csv");
        std::fs::write(&input, REPORT).unwrap();
        std::fs::write(
            dir.path().join("pkg_B.log"),
            "Command: x\nstuff\n  libc++abi: terminating due to uncaught exception\nmore libc++abi: later\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("pkg_C.log"), "PANIC\nno reason here\n").unwrap();

        let output = default_output_path(&input);
        let analysis = analyze_report(&input, &output, &AnalyzeOptions::default()).unwrap();

        assert_eq!(analysis.reasons.len(), 3);
        assert_eq!(
            analysis.reasons[0],
            (
                "pkg.B".to_string(),
                "libc++abi: terminating due to uncaught exception".to_string()
            )
        );
        assert_eq!(analysis.reasons[1].1, "[libc++abi: not found in log]");
        assert!(analysis.reasons[2].1.starts_with("[Log file not found:"));

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("Index,Group Path,Result,Duration (s),Start Time,End Time,Reason\n"));
        assert!(text.contains("1,pkg.A,PASSED,1.00,2024-03-01 10:00:00,2024-03-01 10:00:01,\n"));
        assert!(text.contains("Total Groups,4,\n"));
    }

    #[test]
    fn test_other_result_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("test_report.csv");
        std::fs::write(&input, REPORT).unwrap();
        std::fs::write(dir.path().join("pkg_A.log"), "ok\nGL_NO_ERROR seen\n").unwrap();

        let options = AnalyzeOptions {
            result: "PASSED".to_string(),
            marker: "GL_".to_string(),
        };
        let analysis =
            analyze_report(&input, &dir.path().join("out.csv"), &options).unwrap();
        assert_eq!(analysis.reasons, vec![("pkg.A".to_string(), "GL_NO_ERROR seen".to_string())]);
    }

    #[test]
    fn test_rejects_non_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("other.csv");
        std::fs::write(&input, "a,b\n1,2\n").unwrap();
        let err = analyze_report(&input, &dir.path().join("o.csv"), &AnalyzeOptions::default())
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingColumn { .. }));
    }
}
