//! Errors raised while locating, reading or checking the runner
//! configuration. None of them can occur once a run has started.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file named with `--config` or `CTS_RUNNER_CONFIG` is missing.
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),

    #[error("cannot read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value parsed but is unusable, e.g. a zero baud rate.
    #[error("{key}: {message}")]
    ValidationError { key: String, message: String },

    #[error("environment override {var}: {message}")]
    EnvParseError { var: String, message: String },

    /// Needed for a run but set nowhere (file, environment or flag).
    #[error("{0} is not set")]
    MissingRequired(String),
}

impl ConfigError {
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_key() {
        let err = ConfigError::validation("device.baud_rate", "must be non-zero");
        assert_eq!(err.to_string(), "device.baud_rate: must be non-zero");

        let err = ConfigError::MissingRequired("device.port".into());
        assert_eq!(err.to_string(), "device.port is not set");

        let err = ConfigError::env_parse("CTS_RUNNER_DEVICE_BAUD_RATE", "expected an integer");
        assert!(err.to_string().contains("CTS_RUNNER_DEVICE_BAUD_RATE"));
    }
}
