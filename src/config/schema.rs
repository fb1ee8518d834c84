//! Configuration schema definitions.
//!
//! Every section carries `#[serde(default)]`, so a file only needs to name
//! the values it changes.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder substituted with the group path in the device command.
pub const GROUP_PLACEHOLDER: &str = "{group}";

/// Command used on the reference board: run every case under one group
/// against an off-screen surface, discarding the on-device log.
pub const DEFAULT_COMMAND_TEMPLATE: &str = "openglcts --deqp-archive-dir=\"/tmp/data\" \
--deqp-surface-type=fbo --deqp-surface-width=256 --deqp-surface-height=256 \
--deqp-case='{group}.*' --deqp-log-filename=/dev/null &";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device console (test channel)
    pub device: DeviceConfig,
    /// Relay board used for power cycling
    pub recovery: RecoveryConfig,
    /// Wait-loop tuning
    pub orchestration: OrchestrationConfig,
    /// Recognised device output markers
    pub signals: SignalsConfig,
    /// Report output
    pub report: ReportConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make a run meaningless or stall it.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.baud_rate == 0 {
            return Err(ConfigError::validation("device.baud_rate", "must be non-zero"));
        }
        if self.device.timeout_ms == 0 {
            return Err(ConfigError::validation("device.timeout_ms", "must be non-zero"));
        }
        if self.recovery.baud_rate == 0 {
            return Err(ConfigError::validation("recovery.baud_rate", "must be non-zero"));
        }

        let orch = &self.orchestration;
        if orch.max_wait_attempts == 0 {
            return Err(ConfigError::validation(
                "orchestration.max_wait_attempts",
                "must be at least 1",
            ));
        }
        if orch.idle_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "orchestration.idle_timeout_ms",
                "must be non-zero",
            ));
        }
        if orch.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "orchestration.poll_interval_ms",
                "must be non-zero",
            ));
        }
        if !orch.command_template.contains(GROUP_PLACEHOLDER) {
            return Err(ConfigError::validation(
                "orchestration.command_template",
                format!("must contain the {GROUP_PLACEHOLDER} placeholder"),
            ));
        }

        let signals = &self.signals;
        for (key, value) in [
            ("signals.completion", &signals.completion),
            ("signals.crash", &signals.crash),
            ("signals.probe_command", &signals.probe_command),
            ("signals.probe_marker", &signals.probe_marker),
            ("signals.failure_pattern", &signals.failure_pattern),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::validation(key, "must not be empty"));
            }
        }

        // Markers match case-insensitively, and a crash match outranks completion.
        let crash = signals.crash.to_lowercase();
        let completion = signals.completion.to_lowercase();
        if crash.contains(&completion) || completion.contains(&crash) {
            return Err(ConfigError::validation(
                "signals.crash",
                "must not overlap signals.completion",
            ));
        }

        if self.report.crash_reason_marker.is_empty() {
            return Err(ConfigError::validation(
                "report.crash_reason_marker",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Device console section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Console port name; required for a run
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Per-attempt wait, also used as the port read timeout
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 921_600,
            timeout_ms: 10_000,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Relay board section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Relay port; resets are skipped when unset
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Boot time allowed after a power cycle
    pub settle_ms: u64,
    /// Gap between the power-on and power-off frames
    pub command_gap_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            settle_ms: 5000,
            command_gap_ms: 100,
        }
    }
}

impl RecoveryConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn command_gap(&self) -> Duration {
        Duration::from_millis(self.command_gap_ms)
    }
}

/// Wait-loop section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Silent cycles allowed before a group is given up on
    pub max_wait_attempts: u32,
    /// Quiet gap that ends a read burst
    pub idle_timeout_ms: u64,
    /// Polling increment while reading
    pub poll_interval_ms: u64,
    /// Quiet gap that ends the crash-log drain
    pub crash_drain_idle_ms: u64,
    /// Hard cap on the crash-log drain
    pub crash_drain_max_ms: u64,
    /// Device command; `{group}` is replaced with the group path
    pub command_template: String,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_wait_attempts: 10,
            idle_timeout_ms: 500,
            poll_interval_ms: 10,
            crash_drain_idle_ms: 2000,
            crash_drain_max_ms: 10_000,
            command_template: DEFAULT_COMMAND_TEMPLATE.to_string(),
        }
    }
}

impl OrchestrationConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn crash_drain_idle(&self) -> Duration {
        Duration::from_millis(self.crash_drain_idle_ms)
    }

    pub fn crash_drain_max(&self) -> Duration {
        Duration::from_millis(self.crash_drain_max_ms)
    }
}

/// Device output markers, all matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    pub completion: String,
    pub crash: String,
    /// Liveness probe sent when the console goes quiet
    pub probe_command: String,
    /// Substring expected in the probe reply
    pub probe_marker: String,
    /// Substring marking a failed case
    pub failure_pattern: String,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            completion: "DONE!".to_string(),
            crash: "PANIC".to_string(),
            probe_command: "free".to_string(),
            probe_marker: "total".to_string(),
            failure_pattern: "Fail (".to_string(),
        }
    }
}

/// Report section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output directory; a timestamped one is created when unset
    pub output_dir: Option<PathBuf>,
    /// Mirror raw device output to stdout
    pub echo_device_output: bool,
    /// Line marker used to extract crash reasons from group logs
    pub crash_reason_marker: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            echo_device_output: false,
            crash_reason_marker: "libc++abi:".to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::validation(
                "logging.format",
                format!("unknown format '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.baud_rate, 921_600);
        assert_eq!(config.device.timeout(), Duration::from_secs(10));
        assert_eq!(config.recovery.baud_rate, 9600);
        assert_eq!(config.orchestration.max_wait_attempts, 10);
        assert_eq!(config.signals.crash, "PANIC");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_template_targets_group() {
        let template = &OrchestrationConfig::default().command_template;
        assert!(template.contains("--deqp-case='{group}.*'"));
        assert!(!template.ends_with('\n'));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[signals]"));
        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [device]
            port = "/dev/ttyUSB0"

            [signals]
            crash = "Unhandled exception"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.signals.crash, "Unhandled exception");
        // Defaults should still work
        assert_eq!(config.device.baud_rate, 921_600);
        assert_eq!(config.signals.completion, "DONE!");
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.orchestration.max_wait_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_wait_attempts"));
    }

    #[test]
    fn test_validate_rejects_template_without_placeholder() {
        let mut config = Config::default();
        config.orchestration.command_template = "run-everything".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_signal() {
        let mut config = Config::default();
        config.signals.probe_marker = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signals.probe_marker"));
    }

    #[test]
    fn test_validate_rejects_overlapping_crash_and_completion() {
        let mut config = Config::default();
        config.signals.crash = "done".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signals.crash"));

        config.signals.crash = "DONE! PANIC".to_string();
        assert!(config.validate().is_err());

        config.signals.crash = "Segfault".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
