//! Per-group outcome classification.
//!
//! One call to [`OutcomeClassifier::classify`] drives a group from dispatch
//! to exactly one terminal outcome:
//!
//! ```text
//! Dispatched -> Waiting -+-> Crash
//!                        +-> Passed | Failed
//!                        +-> Hang      (probe failed on the last attempt)
//!                        +-> Timeout   (attempts exhausted, device alive)
//! ```
//!
//! Only silent collection cycles consume attempts. A device that keeps
//! printing is never given up on, however long it takes.

use super::outcome::GroupOutcome;
use crate::config::{Config, GROUP_PLACEHOLDER};
use crate::interrupt::Cancelled;
use crate::report::GroupLog;
use crate::transport::{KeywordSet, TransportChannel};
use memchr::memmem;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Device output markers. Every match is a case-insensitive substring test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signals {
    pub completion: String,
    pub crash: String,
    pub probe_command: String,
    pub probe_marker: String,
    pub failure_pattern: String,
}

impl Default for Signals {
    fn default() -> Self {
        Self::from(&crate::config::SignalsConfig::default())
    }
}

impl From<&crate::config::SignalsConfig> for Signals {
    fn from(cfg: &crate::config::SignalsConfig) -> Self {
        Self {
            completion: cfg.completion.clone(),
            crash: cfg.crash.clone(),
            probe_command: cfg.probe_command.clone(),
            probe_marker: cfg.probe_marker.clone(),
            failure_pattern: cfg.failure_pattern.clone(),
        }
    }
}

impl Signals {
    /// Terminal markers in precedence order: crash beats completion.
    pub fn terminal_keywords(&self) -> KeywordSet {
        KeywordSet::new([self.crash.clone(), self.completion.clone()])
    }

    pub fn probe_keywords(&self) -> KeywordSet {
        KeywordSet::new([self.probe_marker.clone()])
    }
}

/// Decide a group from its cumulative transcript alone.
///
/// `None` means no terminal marker has been seen yet. A crash marker
/// anywhere wins over completion; a completed group is `Failed` when the
/// failure pattern occurs anywhere in the transcript.
pub fn classify_transcript(text: &str, signals: &Signals) -> Option<GroupOutcome> {
    let matched = signals.terminal_keywords().find_first(text)?.to_owned();
    if matched == signals.crash {
        return Some(GroupOutcome::Crash);
    }
    let haystack = text.to_lowercase();
    let pattern = signals.failure_pattern.to_lowercase();
    if memmem::find(haystack.as_bytes(), pattern.as_bytes()).is_some() {
        Some(GroupOutcome::Failed)
    } else {
        Some(GroupOutcome::Passed)
    }
}

/// Device command with a `{group}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The command for `group`, terminated by exactly one newline.
    pub fn render(&self, group: &str) -> String {
        let mut line = self.0.replace(GROUP_PLACEHOLDER, group);
        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        line.push('\n');
        line
    }
}

/// Immutable per-run classifier tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSettings {
    /// Cap on one collection cycle, and on the probe reply.
    pub attempt_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_wait_attempts: u32,
    pub crash_drain_idle: Duration,
    pub crash_drain_max: Duration,
    pub command: CommandTemplate,
    pub signals: Signals,
}

impl ClassifierSettings {
    pub fn from_config(config: &Config) -> Self {
        let orch = &config.orchestration;
        Self {
            attempt_timeout: config.device.timeout(),
            idle_timeout: orch.idle_timeout(),
            max_wait_attempts: orch.max_wait_attempts,
            crash_drain_idle: orch.crash_drain_idle(),
            crash_drain_max: orch.crash_drain_max(),
            command: CommandTemplate::new(orch.command_template.clone()),
            signals: Signals::from(&config.signals),
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Terminal result of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: GroupOutcome,
    /// Silent cycles consumed.
    pub attempts: u32,
    /// Everything the device printed before classification, probe replies
    /// included. The crash drain is not part of it.
    pub transcript: String,
}

/// Transient state of one group's wait phase.
#[derive(Debug, Default)]
struct WaitState {
    attempts: u32,
    text: String,
}

impl WaitState {
    fn absorb(&mut self, text: &str, log: &mut GroupLog) {
        log.device_output(text);
        self.text.push_str(text);
    }

    fn into_classification(self, outcome: GroupOutcome) -> Classification {
        Classification {
            outcome,
            attempts: self.attempts,
            transcript: self.text,
        }
    }
}

/// Runs the wait loop for one group at a time over a borrowed channel.
#[derive(Debug)]
pub struct OutcomeClassifier<'a> {
    channel: &'a mut TransportChannel,
    settings: &'a ClassifierSettings,
}

impl<'a> OutcomeClassifier<'a> {
    pub fn new(channel: &'a mut TransportChannel, settings: &'a ClassifierSettings) -> Self {
        Self { channel, settings }
    }

    /// Dispatch `group` and wait for its outcome.
    ///
    /// Only interruption returns early; every device behaviour ends in a
    /// [`Classification`]. On interruption nothing is written to `log`
    /// beyond the raw output already received.
    pub fn classify(
        &mut self,
        group: &str,
        log: &mut GroupLog,
    ) -> Result<Classification, Cancelled> {
        let settings = self.settings;
        let max = settings.max_wait_attempts;

        let command = settings.command.render(group);
        if let Err(e) = self.channel.clear_input() {
            warn!(error = %e, "could not discard stale input");
        }
        if let Err(e) = self.channel.send(command.as_bytes()) {
            warn!(group, error = %e, "command write failed, relying on wait phase");
        }
        log.command(&command);

        let mut state = WaitState::default();
        while state.attempts < max {
            info!(
                attempt = state.attempts,
                max, "waiting for test completion"
            );
            let collected = self
                .channel
                .collect_until_idle(settings.attempt_timeout, settings.idle_timeout)?;
            state.absorb(&collected.text, log);

            if let Some(outcome) = classify_transcript(&state.text, &settings.signals) {
                return self.conclude(group, state, outcome, log);
            }

            if collected.saw_data {
                debug!("received output, device is alive; continuing to wait");
                continue;
            }

            state.attempts += 1;
            warn!(
                timeout = ?settings.attempt_timeout,
                attempt = state.attempts,
                max,
                "no output, probing device"
            );
            let alive = self.probe(&mut state, log)?;

            if let Some(outcome) = classify_transcript(&state.text, &settings.signals) {
                return self.conclude(group, state, outcome, log);
            }

            if alive {
                info!("device answered the probe; continuing to wait");
                continue;
            }
            if state.attempts >= max {
                error!(group, "device is not responding");
                return self.conclude(group, state, GroupOutcome::Hang, log);
            }
            warn!(attempt = state.attempts, max, "probe unanswered");
        }

        // Only reached once every attempt was used on a live device.
        error!(group, max, "exceeded max wait count");
        self.conclude(group, state, GroupOutcome::Timeout, log)
    }

    /// Send the liveness probe and report whether its marker came back.
    fn probe(&mut self, state: &mut WaitState, log: &mut GroupLog) -> Result<bool, Cancelled> {
        let signals = &self.settings.signals;
        let line = format!("{}\n", signals.probe_command);
        if let Err(e) = self.channel.send(line.as_bytes()) {
            warn!(error = %e, "probe write failed");
        }
        let response = self.channel.wait_for(
            &signals.probe_keywords(),
            self.settings.attempt_timeout,
            self.settings.idle_timeout,
        )?;
        state.absorb(&response.collected.text, log);
        Ok(response.found())
    }

    fn conclude(
        &mut self,
        group: &str,
        state: WaitState,
        outcome: GroupOutcome,
        log: &mut GroupLog,
    ) -> Result<Classification, Cancelled> {
        match outcome {
            GroupOutcome::Crash => {
                error!(group, marker = %self.settings.signals.crash, "group crashed");
                log.result(&format!(
                    "{} ({})",
                    outcome.log_line(),
                    self.settings.signals.crash
                ));
                self.drain_crash_log(log)?;
            }
            GroupOutcome::Failed => {
                warn!(group, "group completed with failures");
                log.result(outcome.log_line());
            }
            GroupOutcome::Passed => {
                info!(group, "group completed successfully");
                log.result(outcome.log_line());
            }
            _ => log.result(outcome.log_line()),
        }
        Ok(state.into_classification(outcome))
    }

    /// Keep reading after a crash so the fault handler's output lands in
    /// the group log. Nothing read here is classified.
    fn drain_crash_log(&mut self, log: &mut GroupLog) -> Result<(), Cancelled> {
        log.begin_crash_log();
        let drained = self.channel.collect_until_idle(
            self.settings.crash_drain_max,
            self.settings.crash_drain_idle,
        )?;
        log.device_output(&drained.text);
        log.end_crash_log();
        debug!(bytes = drained.text.len(), "crash log collected");
        Ok(())
    }
}
