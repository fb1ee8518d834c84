//! Port abstraction layer for serial communication.
//!
//! Provides the adapter trait both channels are written against, the real
//! `serialport`-backed implementation, and a scripted mock device.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockPortOpener, MockSerialPort};
pub use sync_port::{SyncSerialPort, SystemPortOpener};
pub use traits::{PortConfiguration, PortOpener, SerialPortAdapter};
