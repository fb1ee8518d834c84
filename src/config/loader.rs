//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "CTS_RUNNER";

/// Config file name
const CONFIG_FILE_NAME: &str = "cts-runner.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "CTS_RUNNER_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `CTS_RUNNER_CONFIG` environment variable (explicit path)
    /// 2. `./cts-runner.toml` (current directory)
    /// 3. the platform config directory (`~/.config/cts-runner/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = platform_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    None
}

/// `cts-runner.toml` in the platform config directory.
fn platform_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "cts-runner").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}_{key}")).ok()
}

fn parse_env<T: FromStr>(key: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(format!("{ENV_PREFIX}_{key}"), what))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `CTS_RUNNER_<SECTION>_<KEY>`,
/// for example `CTS_RUNNER_DEVICE_PORT=/dev/ttyUSB0` or
/// `CTS_RUNNER_ORCHESTRATION_MAX_WAIT_ATTEMPTS=20`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Device overrides (also support legacy TEST_PORT)
    if let Some(val) = env_var("DEVICE_PORT").or_else(|| std::env::var("TEST_PORT").ok()) {
        config.device.port = Some(val);
    }
    if let Some(val) = env_var("DEVICE_BAUD_RATE") {
        config.device.baud_rate = parse_env("DEVICE_BAUD_RATE", &val, "Invalid baud rate")?;
    }
    if let Some(val) = env_var("DEVICE_TIMEOUT_MS") {
        config.device.timeout_ms = parse_env("DEVICE_TIMEOUT_MS", &val, "Invalid timeout")?;
    }

    // Recovery overrides (also support legacy RESET_PORT)
    if let Some(val) = env_var("RECOVERY_PORT").or_else(|| std::env::var("RESET_PORT").ok()) {
        config.recovery.port = Some(val);
    }
    if let Some(val) = env_var("RECOVERY_BAUD_RATE") {
        config.recovery.baud_rate = parse_env("RECOVERY_BAUD_RATE", &val, "Invalid baud rate")?;
    }
    if let Some(val) = env_var("RECOVERY_SETTLE_MS") {
        config.recovery.settle_ms = parse_env("RECOVERY_SETTLE_MS", &val, "Invalid duration")?;
    }

    // Orchestration overrides
    if let Some(val) = env_var("ORCHESTRATION_MAX_WAIT_ATTEMPTS") {
        config.orchestration.max_wait_attempts =
            parse_env("ORCHESTRATION_MAX_WAIT_ATTEMPTS", &val, "Invalid attempt count")?;
    }
    if let Some(val) = env_var("ORCHESTRATION_IDLE_TIMEOUT_MS") {
        config.orchestration.idle_timeout_ms =
            parse_env("ORCHESTRATION_IDLE_TIMEOUT_MS", &val, "Invalid duration")?;
    }

    // Signal overrides
    if let Some(val) = env_var("SIGNALS_CRASH") {
        config.signals.crash = val;
    }
    if let Some(val) = env_var("SIGNALS_COMPLETION") {
        config.signals.completion = val;
    }

    // Report overrides
    if let Some(val) = env_var("REPORT_OUTPUT_DIR") {
        config.report.output_dir = Some(PathBuf::from(val));
    }

    // Logging overrides
    if let Some(val) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = env_var("LOGGING_FORMAT") {
        config.logging.format = LogFormat::from_str(&val)?;
    }

    Ok(())
}
