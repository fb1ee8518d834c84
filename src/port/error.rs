//! Port-specific error types.
//!
//! Kept separate from the run-level taxonomy: every variant here is either
//! fatal at open time or a soft I/O hiccup the transport folds into
//! "no data this cycle".

use thiserror::Error;

/// Failure of a single port operation.
#[derive(Debug, Error)]
pub enum PortError {
    /// No port of that name is present.
    #[error("no serial port named {0}")]
    NotFound(String),

    #[error("port I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The driver rejected the requested line settings.
    #[error("port rejected settings: {0}")]
    Config(String),

    #[error("serial driver: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error only means "nothing to read right now".
    pub fn is_transient(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "no serial port named /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "port rejected settings: Invalid baud rate");
    }

    #[test]
    fn test_driver_timeout_is_transient() {
        let err = PortError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "read"));
        assert!(err.is_transient());
        assert!(!PortError::not_found("COM9").is_transient());
    }

    #[test]
    fn test_would_block_is_transient() {
        let err = PortError::Io(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "No data available",
        ));
        assert!(err.is_transient());

        let err = PortError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "unplugged",
        ));
        assert!(!err.is_transient());
    }
}
