//! Runner configuration.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `CTS_RUNNER_CONFIG` environment variable (explicit path)
//! 2. `./cts-runner.toml` (current directory)
//! 3. the platform config directory, e.g. `~/.config/cts-runner/cts-runner.toml`
//! 4. Built-in defaults (no file required)
//!
//! Command-line flags are applied on top of whatever this produces.
//!
//! # Environment Overrides
//!
//! The pattern is: `CTS_RUNNER_<SECTION>_<KEY>`
//!
//! Examples:
//! - `CTS_RUNNER_DEVICE_PORT=/dev/ttyUSB0`
//! - `CTS_RUNNER_RECOVERY_SETTLE_MS=8000`
//! - `CTS_RUNNER_SIGNALS_CRASH="Unhandled exception"`
//!
//! Legacy `TEST_PORT` and `RESET_PORT` are also honoured.
//!
//! # Example
//!
//! ```rust,ignore
//! use cts_serial_runner::config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?.into_config();
//! config.validate()?;
//! println!("console at {:?}", config.device.port);
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{
    Config, DeviceConfig, LogFormat, LoggingConfig, OrchestrationConfig, RecoveryConfig,
    ReportConfig, SignalsConfig, DEFAULT_COMMAND_TEMPLATE, GROUP_PLACEHOLDER,
};
