//! Group sequencing.
//!
//! The coordinator owns every resource of a run: the console channel, the
//! report sink and the recovery channel. Groups run strictly one after
//! another, each bracketed by device resets, and every group that reaches a
//! classification gets exactly one report row.

use super::classifier::{ClassifierSettings, OutcomeClassifier};
use super::outcome::RunState;
use crate::config::{Config, ConfigError};
use crate::error::{RunError, RunResult};
use crate::interrupt::{CancelToken, Cancelled};
use crate::port::{PortConfiguration, PortOpener};
use crate::recovery::{RecoveryChannel, RecoverySettings};
use crate::report::{
    display, CsvReportSink, GroupLog, ReportRow, ReportSink, RunSummary,
};
use crate::transport::TransportChannel;
use crate::tree::TestTree;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Most near matches listed when a start group cannot be found.
pub const MAX_SUGGESTIONS: usize = 10;

/// Leaf groups to run, plus where in the list the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    groups: Vec<String>,
    start: usize,
}

impl RunPlan {
    /// Run every group.
    pub fn all(groups: Vec<String>) -> Self {
        Self { groups, start: 0 }
    }

    /// Start at the first group (in list order) whose path contains
    /// `start_group`. An exact path always matches itself.
    pub fn resolve(groups: Vec<String>, start_group: Option<&str>) -> RunResult<Self> {
        let Some(requested) = start_group else {
            return Ok(Self::all(groups));
        };
        match groups.iter().position(|path| path.contains(requested)) {
            Some(start) => {
                info!(
                    group = %groups[start],
                    index = start + 1,
                    total = groups.len(),
                    "starting from group"
                );
                Ok(Self { groups, start })
            }
            None => Err(RunError::StartGroupNotFound {
                requested: requested.to_string(),
                suggestions: suggestions(&groups, requested),
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.groups.len()
    }

    pub fn skipped(&self) -> usize {
        self.start
    }

    pub fn to_test(&self) -> &[String] {
        &self.groups[self.start..]
    }
}

/// Groups containing `requested` ignoring case, at most [`MAX_SUGGESTIONS`].
pub fn suggestions(groups: &[String], requested: &str) -> Vec<String> {
    let needle = requested.to_lowercase();
    groups
        .iter()
        .filter(|path| path.to_lowercase().contains(&needle))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}

/// Drives a [`RunPlan`] to completion or interruption.
#[derive(Debug)]
pub struct RunCoordinator<'a, S: ReportSink> {
    channel: TransportChannel,
    recovery: RecoveryChannel<'a>,
    settings: ClassifierSettings,
    sink: S,
    log_dir: Option<PathBuf>,
    echo: bool,
}

impl<'a, S: ReportSink> RunCoordinator<'a, S> {
    pub fn new(
        channel: TransportChannel,
        recovery: RecoveryChannel<'a>,
        settings: ClassifierSettings,
        sink: S,
    ) -> Self {
        Self {
            channel,
            recovery,
            settings,
            sink,
            log_dir: None,
            echo: false,
        }
    }

    /// Write one diagnostic log per group into `dir`. Without this, group
    /// transcripts are kept in memory and discarded.
    pub fn with_group_logs(mut self, dir: impl Into<PathBuf>, echo: bool) -> Self {
        self.log_dir = Some(dir.into());
        self.echo = echo;
        self
    }

    /// Run every planned group, then write the summary.
    ///
    /// Interruption is not an error: the group in flight is abandoned
    /// without a row and the summary is written for what completed. The
    /// channel and sink are released when `self` drops, on every path.
    pub fn run(mut self, plan: &RunPlan) -> RunResult<RunSummary> {
        let mut state = RunState::new(plan.total(), plan.skipped());
        display::title(&format!(
            "Total leaf groups to test: {} (skipped: {})",
            state.to_test(),
            state.skipped
        ));

        let interrupted = match self.run_groups(plan, &mut state)? {
            Ok(()) => false,
            Err(Cancelled) => {
                info!("test run interrupted by user");
                true
            }
        };

        let summary = RunSummary::from_state(&state, interrupted);
        self.sink.finish(&summary)?;
        display::final_summary(&summary, self.sink.location());
        Ok(summary)
    }

    /// Outer `Err` is fatal; inner `Err` means the run was interrupted.
    fn run_groups(
        &mut self,
        plan: &RunPlan,
        state: &mut RunState,
    ) -> RunResult<Result<(), Cancelled>> {
        // Every group after the first is preceded by the previous group's
        // post-reset, so only the first needs one of its own.
        if let Err(cancelled) = self.recovery.cycle() {
            return Ok(Err(cancelled));
        }

        for (i, group) in plan.to_test().iter().enumerate() {
            state.group_index = i + 1;
            display::title(&display::group_banner(
                state.group_index,
                state.to_test(),
                state.absolute_index(),
                state.total_groups,
                group,
            ));

            let started_at = Local::now();
            let started = Instant::now();
            let mut log = match &self.log_dir {
                Some(dir) => match GroupLog::create(dir, group, started_at, self.echo) {
                    Ok(log) => {
                        if let Some(path) = log.path() {
                            info!(path = %path.display(), "writing group log");
                        }
                        log
                    }
                    Err(e) => {
                        warn!(group = %group, error = %e, "group log unavailable, keeping transcript in memory");
                        GroupLog::in_memory(group, started_at)
                    }
                },
                None => GroupLog::in_memory(group, started_at),
            };

            let classification =
                match OutcomeClassifier::new(&mut self.channel, &self.settings)
                    .classify(group, &mut log)
                {
                    Ok(classification) => classification,
                    Err(cancelled) => return Ok(Err(cancelled)),
                };

            let duration = started.elapsed();
            let ended_at = Local::now();
            if let Err(e) = log.finish(ended_at, duration) {
                warn!(group = %group, error = %e, "group log incomplete");
            }

            self.sink.record(&ReportRow {
                index: state.absolute_index(),
                group_path: group.clone(),
                outcome: classification.outcome,
                duration,
                started: started_at,
                ended: ended_at,
            })?;
            state.record(classification.outcome);

            info!(duration = %display::format_duration(duration), "case finished");
            display::progress(
                state.group_index,
                state.to_test(),
                &state.stats,
                duration,
                state.elapsed(),
            );

            // Unconditional: the next group must start on a freshly booted device.
            if let Err(cancelled) = self.recovery.cycle() {
                return Ok(Err(cancelled));
            }
        }
        Ok(Ok(()))
    }
}

/// What a finished (or interrupted) run left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub output_dir: PathBuf,
}

/// `logs_YYYYmmdd_HHMMSS` in the current directory.
pub fn default_output_dir() -> PathBuf {
    PathBuf::from(Local::now().format("logs_%Y%m%d_%H%M%S").to_string())
}

/// Full run: parse the case list, resolve the start group, open the
/// console, then test every planned group.
///
/// The configuration must already be validated. Nothing touches the device
/// until the case list has parsed and the start group resolved.
pub fn execute(
    config: &Config,
    case_list: &Path,
    start_group: Option<&str>,
    opener: &dyn PortOpener,
    cancel: CancelToken,
) -> RunResult<RunOutput> {
    let tree = TestTree::from_file(case_list)?;
    info!(
        package = tree.package(),
        groups = tree.group_count(),
        tests = tree.test_count(),
        "case list parsed"
    );
    let plan = RunPlan::resolve(tree.leaf_group_paths(), start_group)?;

    let output_dir = config
        .report
        .output_dir
        .clone()
        .unwrap_or_else(default_output_dir);
    std::fs::create_dir_all(&output_dir)?;
    info!(dir = %output_dir.display(), "log directory");

    let port = config
        .device
        .port
        .as_deref()
        .ok_or_else(|| ConfigError::MissingRequired("device.port".to_string()))?;
    let port_config = PortConfiguration::new(config.device.baud_rate, config.device.timeout());
    let channel = TransportChannel::open(opener, port, &port_config, cancel.clone())
        .map_err(|source| RunError::connection(port, source))?
        .with_poll_interval(config.orchestration.poll_interval());

    let sink = CsvReportSink::create(&output_dir)?;
    let recovery = RecoveryChannel::new(
        opener,
        RecoverySettings::from(&config.recovery),
        cancel,
    );

    let summary = RunCoordinator::new(
        channel,
        recovery,
        ClassifierSettings::from_config(config),
        sink,
    )
    .with_group_logs(&output_dir, config.report.echo_device_output)
    .run(&plan)?;

    Ok(RunOutput {
        summary,
        output_dir,
    })
}
