//! CTS Serial Runner Library
//!
//! Runs a conformance test suite group by group on a board that is reachable
//! only through its serial console, power-cycling it through a relay between
//! groups and classifying every group from the console output alone.
//!
//! # Modules
//!
//! - `tree`: Case-list model and XML parser; enumerates leaf groups
//! - `port`: Serial port abstraction with a real and a scripted mock backend
//! - `transport`: Console channel with idle-gap collection and keyword scans
//! - `recovery`: Relay power cycling
//! - `engine`: Outcome classifier, run coordinator and the `execute` entry point
//! - `report`: CSV report, per-group logs, progress display, crash analysis
//! - `config`: Configuration management with TOML support
//! - `interrupt`: Cooperative cancellation and Ctrl-C handling
//! - `logging`: Tracing subscriber setup
//! - `error`: Fatal run errors

pub mod config;
pub mod engine;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod port;
pub mod recovery;
pub mod report;
pub mod transport;
pub mod tree;

// Re-export commonly used types for convenience
pub use engine::{
    execute, ClassifierSettings, GroupOutcome, OutcomeClassifier, RunCoordinator, RunOutput,
    RunPlan, RunStats,
};
pub use error::{RunError, RunResult};
pub use interrupt::{CancelToken, Cancelled};
pub use port::{
    MockPortOpener, MockSerialPort, PortConfiguration, PortError, PortOpener, SerialPortAdapter,
    SyncSerialPort, SystemPortOpener,
};
pub use recovery::{RecoveryChannel, RecoverySettings};
pub use report::{CsvReportSink, ReportSink, RunSummary};
pub use transport::{KeywordSet, TransportChannel};
pub use tree::{TestNode, TestTree, TreeError};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
