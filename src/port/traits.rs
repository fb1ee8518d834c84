//! Core traits for serial port abstraction.
//!
//! Defines the `SerialPortAdapter` trait that allows both real serial ports
//! and scripted mock devices to be used interchangeably by the transport and
//! recovery channels, plus the `PortOpener` factory the recovery channel
//! uses to open its port fresh for every power cycle.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration parameters for a serial port.
///
/// Both channels the runner drives are plain 8N1 lines without flow
/// control; only the rate and the base read timeout vary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Base read/write timeout handed to the driver.
    pub timeout: Duration,
}

impl PortConfiguration {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Trait for serial port I/O operations.
///
/// This trait abstracts over synchronous serial port operations, allowing both
/// real hardware ports and mock implementations for testing.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read/write timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard any unread data in the receive buffer.
    fn clear_input(&mut self) -> Result<(), PortError>;

    /// Number of bytes already received and waiting to be read.
    fn bytes_to_read(&self) -> Result<usize, PortError>;
}

impl<P: SerialPortAdapter + ?Sized> SerialPortAdapter for Box<P> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        (**self).write_bytes(data)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        (**self).read_bytes(buffer)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        (**self).set_timeout(timeout)
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        (**self).clear_input()
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        (**self).bytes_to_read()
    }
}

/// Opens ports by name.
///
/// The run coordinator owns one opener and hands it to whichever channel
/// needs to (re)open a port, so tests can substitute scripted devices.
pub trait PortOpener: std::fmt::Debug {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_configuration_roundtrips_through_json() {
        let config = PortConfiguration::new(921_600, Duration::from_secs(10));
        let json = serde_json::to_string(&config).unwrap();
        let back: PortConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
