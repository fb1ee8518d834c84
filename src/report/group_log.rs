use super::{ReportError, TIMESTAMP_FORMAT};
use crate::report::display::format_duration;
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const RULE_WIDTH: usize = 60;

/// File name of a group's diagnostic log: `a.b.c` becomes `a_b_c.log`.
pub fn log_file_name(group_path: &str) -> String {
    format!("{}.log", group_path.replace('.', "_").replace('*', "all"))
}

#[derive(Debug)]
enum Target {
    File(BufWriter<File>),
    Memory(Vec<u8>),
}

/// Raw transcript of one group: command, every byte the device printed, and
/// the classification.
///
/// Writes never fail the run. The first write error is logged and the rest of
/// the transcript is dropped.
#[derive(Debug)]
pub struct GroupLog {
    target: Target,
    path: Option<PathBuf>,
    echo: bool,
    broken: bool,
}

impl GroupLog {
    /// Create `<dir>/<log_file_name(group)>` and write the header.
    pub fn create(
        dir: impl AsRef<Path>,
        group_path: &str,
        started: DateTime<Local>,
        echo: bool,
    ) -> Result<Self, ReportError> {
        let path = dir.as_ref().join(log_file_name(group_path));
        let file = File::create(&path).map_err(|source| ReportError::Create {
            path: path.clone(),
            source,
        })?;
        let mut log = Self {
            target: Target::File(BufWriter::new(file)),
            path: Some(path),
            echo,
            broken: false,
        };
        log.header(group_path, started);
        Ok(log)
    }

    /// Transcript kept in memory, for callers that only need the text.
    pub fn in_memory(group_path: &str, started: DateTime<Local>) -> Self {
        let mut log = Self {
            target: Target::Memory(Vec::new()),
            path: None,
            echo: false,
            broken: false,
        };
        log.header(group_path, started);
        log
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Text written so far. Empty for file-backed logs.
    pub fn contents(&self) -> String {
        match &self.target {
            Target::Memory(buf) => String::from_utf8_lossy(buf).into_owned(),
            Target::File(_) => String::new(),
        }
    }

    fn write(&mut self, text: &str) {
        if self.broken {
            return;
        }
        let result = match &mut self.target {
            Target::File(w) => w.write_all(text.as_bytes()),
            Target::Memory(buf) => {
                buf.extend_from_slice(text.as_bytes());
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(path = ?self.path, error = %e, "group log write failed, transcript truncated");
            self.broken = true;
        }
    }

    fn header(&mut self, group_path: &str, started: DateTime<Local>) {
        self.write(&format!(
            "# Test Group: {group_path}\n# Start Time: {}\n{}\n\n",
            started.format(TIMESTAMP_FORMAT),
            "=".repeat(RULE_WIDTH)
        ));
    }

    /// The command line as sent, newline included.
    pub fn command(&mut self, command: &str) {
        self.write(&format!("Command: {command}"));
        if !command.ends_with('\n') {
            self.write("\n");
        }
    }

    /// Raw device output, optionally mirrored to stdout.
    pub fn device_output(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.write(text);
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }

    pub fn result(&mut self, line: &str) {
        self.write(&format!("\n\n# Result: {line}\n"));
    }

    pub fn begin_crash_log(&mut self) {
        self.write("\n# --- Begin Crash Log ---\n");
    }

    pub fn end_crash_log(&mut self) {
        self.write("\n# --- End Crash Log ---\n");
    }

    /// Write the trailer and flush.
    pub fn finish(&mut self, ended: DateTime<Local>, duration: Duration) -> Result<(), ReportError> {
        self.write(&format!(
            "\n# End Time: {}\n# Duration: {}\n",
            ended.format(TIMESTAMP_FORMAT),
            format_duration(duration)
        ));
        if let Target::File(w) = &mut self.target {
            w.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 9, 30, sec).unwrap()
    }

    #[test]
    fn test_file_name_mapping() {
        assert_eq!(
            log_file_name("dEQP-GLES2.functional.texture"),
            "dEQP-GLES2_functional_texture.log"
        );
        assert_eq!(log_file_name("pkg.*"), "pkg_all.log");
    }

    #[test]
    fn test_transcript_layout() {
        let mut log = GroupLog::in_memory("pkg.A", at(0));
        log.command("run 'pkg.A.*'\n");
        log.device_output("case 1 Pass\n");
        log.result("CRASH (PANIC)");
        log.begin_crash_log();
        log.device_output("backtrace\n");
        log.end_crash_log();
        log.finish(at(5), Duration::from_secs(5)).unwrap();

        let text = log.contents();
        assert!(text.starts_with("# Test Group: pkg.A\n# Start Time: 2024-03-01 09:30:00\n"));
        assert!(text.contains(&"=".repeat(60)));
        let order = [
            "Command: run 'pkg.A.*'\n",
            "case 1 Pass",
            "# Result: CRASH (PANIC)",
            "# --- Begin Crash Log ---",
            "backtrace",
            "# --- End Crash Log ---",
            "# End Time: 2024-03-01 09:30:05",
            "# Duration: 5.0s",
        ];
        let mut from = 0;
        for needle in order {
            let pos = text[from..].find(needle).unwrap_or_else(|| panic!("missing {needle:?}"));
            from += pos + needle.len();
        }
    }

    #[test]
    fn test_create_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = GroupLog::create(dir.path(), "pkg.B", at(0), false).unwrap();
        log.command("go\n");
        log.finish(at(1), Duration::from_secs(1)).unwrap();

        let path = log.path().unwrap().to_path_buf();
        assert_eq!(path, dir.path().join("pkg_B.log"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("Command: go\n"));
        assert!(log.contents().is_empty());
    }
}
