//! Per-group outcomes and the run-wide tallies they fold into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Final classification of one leaf group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOutcome {
    /// Completion marker seen, no failure pattern anywhere in the output.
    Passed,
    /// Completion marker seen after at least one failure pattern.
    Failed,
    /// Crash marker seen.
    Crash,
    /// Device stopped answering liveness probes.
    Hang,
    /// Device stayed alive but never finished within the attempt budget.
    Timeout,
    /// Wait loop never ran; nothing could be concluded.
    Unknown,
}

impl GroupOutcome {
    /// Label used in reports and diagnostic logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Crash => "CRASH",
            Self::Hang => "HUNG",
            Self::Timeout => "TIMEOUT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Longer line written as the classification record of a group log.
    pub fn log_line(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED (Fail pattern detected)",
            Self::Crash => "CRASH",
            Self::Hang => "SYSTEM HUNG",
            Self::Timeout => "TIMEOUT (exceeded max wait count)",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for GroupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupOutcome {
    type Err = std::convert::Infallible;

    /// Anything unrecognised reads back as `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "PASSED" => Self::Passed,
            "FAILED" => Self::Failed,
            "CRASH" => Self::Crash,
            "HUNG" | "HANG" => Self::Hang,
            "TIMEOUT" => Self::Timeout,
            _ => Self::Unknown,
        })
    }
}

/// Counts per outcome. `Unknown` is deliberately not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub passed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub hang: usize,
    pub crash: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: GroupOutcome) {
        match outcome {
            GroupOutcome::Passed => self.passed += 1,
            GroupOutcome::Failed => self.failed += 1,
            GroupOutcome::Timeout => self.timeout += 1,
            GroupOutcome::Hang => self.hang += 1,
            GroupOutcome::Crash => self.crash += 1,
            GroupOutcome::Unknown => {}
        }
    }

    pub fn completed(&self) -> usize {
        self.passed + self.failed + self.timeout + self.hang + self.crash
    }
}

/// Mutable run bookkeeping, owned by the coordinator.
#[derive(Debug, Clone)]
pub struct RunState {
    /// 1-based position of the group in flight within the groups to test.
    pub group_index: usize,
    /// Size of the full leaf-group list, skipped groups included.
    pub total_groups: usize,
    pub skipped: usize,
    pub stats: RunStats,
    pub started: Instant,
}

impl RunState {
    pub fn new(total_groups: usize, skipped: usize) -> Self {
        Self {
            group_index: 0,
            total_groups,
            skipped,
            stats: RunStats::default(),
            started: Instant::now(),
        }
    }

    pub fn to_test(&self) -> usize {
        self.total_groups.saturating_sub(self.skipped)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 1-based index of the group in flight within the full list.
    pub fn absolute_index(&self) -> usize {
        self.skipped + self.group_index
    }

    pub fn record(&mut self, outcome: GroupOutcome) {
        self.stats.record(outcome);
    }
}
