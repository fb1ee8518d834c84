//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `SerialPortAdapter`
//! trait for dependency injection and testing.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use std::io::{Read, Write};
use std::time::Duration;

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration (8N1, no flow control).
    ///
    /// # Example
    /// ```no_run
    /// use cts_serial_runner::port::{PortConfiguration, SyncSerialPort};
    ///
    /// let config = PortConfiguration::default();
    /// let port = SyncSerialPort::open("/dev/ttyUSB0", &config)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .flow_control(serialport::FlowControl::None)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(config.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write_all(data).map_err(PortError::Io)?;
        self.port.flush().map_err(PortError::Io)?;
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(PortError::Serial)
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(PortError::Serial)
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

/// Opens real hardware ports through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(port_name, config)?))
    }
}
