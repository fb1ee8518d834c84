use crate::engine::{RunState, RunStats};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// End-of-run totals, written once whether the run finished or was stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_groups: usize,
    pub skipped: usize,
    pub to_test: usize,
    pub completed: usize,
    #[serde(flatten)]
    pub stats: RunStats,
    /// Passed over to-test, in percent. `None` when nothing was to be tested.
    pub pass_rate: Option<f64>,
    pub total_time_secs: f64,
    /// `None` until at least one group completed.
    pub avg_time_per_group_secs: Option<f64>,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new(
        total_groups: usize,
        skipped: usize,
        stats: RunStats,
        total_time: Duration,
        interrupted: bool,
    ) -> Self {
        let to_test = total_groups.saturating_sub(skipped);
        let completed = stats.completed();
        let total_time_secs = total_time.as_secs_f64();
        Self {
            total_groups,
            skipped,
            to_test,
            completed,
            stats,
            pass_rate: (to_test > 0).then(|| stats.passed as f64 / to_test as f64 * 100.0),
            total_time_secs,
            avg_time_per_group_secs: (completed > 0).then(|| total_time_secs / completed as f64),
            interrupted,
        }
    }

    pub fn from_state(state: &RunState, interrupted: bool) -> Self {
        Self::new(
            state.total_groups,
            state.skipped,
            state.stats,
            state.elapsed(),
            interrupted,
        )
    }

    /// `label, value` rows of the CSV summary block, in order.
    pub fn csv_rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Total Groups", self.total_groups.to_string()),
            ("Skipped", self.skipped.to_string()),
            ("To Test", self.to_test.to_string()),
            ("Completed", self.completed.to_string()),
            ("Passed", self.stats.passed.to_string()),
            ("Failed", self.stats.failed.to_string()),
            ("Timeout", self.stats.timeout.to_string()),
            ("Hung", self.stats.hang.to_string()),
            ("Crash", self.stats.crash.to_string()),
        ];
        if let Some(rate) = self.pass_rate {
            rows.push(("Pass Rate (%)", format!("{rate:.1}")));
        }
        rows.push(("Total Time (s)", format!("{:.2}", self.total_time_secs)));
        if let Some(avg) = self.avg_time_per_group_secs {
            rows.push(("Avg Time per Group (s)", format!("{avg:.2}")));
        }
        rows
    }
}
