//! Conditions that abort a whole run.
//!
//! Per-group failures are never represented here: a crashed or hung group is
//! an outcome, recorded like any other. Interruption is not an error either;
//! it ends the run early with a normal summary.

use crate::config::ConfigError;
use crate::port::PortError;
use crate::report::ReportError;
use crate::tree::TreeError;
use thiserror::Error;

/// A specialized `Result` type for run setup and execution.
pub type RunResult<T> = Result<T, RunError>;

#[derive(Debug, Error)]
pub enum RunError {
    /// The console port could not be opened.
    #[error("cannot open test channel '{port}': {source}")]
    Connection {
        port: String,
        #[source]
        source: PortError,
    },

    /// The case list could not be parsed.
    #[error(transparent)]
    Description(#[from] TreeError),

    /// The requested start group matches no leaf group.
    #[error("start group '{requested}' not found in the leaf group list")]
    StartGroupNotFound {
        requested: String,
        /// Up to ten case-insensitive near matches, in list order.
        suggestions: Vec<String>,
    },

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    pub fn connection(port: impl Into<String>, source: PortError) -> Self {
        Self::Connection {
            port: port.into(),
            source,
        }
    }

    /// Whether the process should still exit successfully. Only an
    /// unresolvable start group qualifies: the user is shown suggestions and
    /// nothing was touched.
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, Self::StartGroupNotFound { .. })
    }
}
