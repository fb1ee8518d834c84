//! Shared test utilities for the run-level tests.
//!
//! Provides a case-list writer, a configuration tuned for millisecond
//! timings and a scripted device/relay pair behind a `MockPortOpener`.

#![allow(dead_code)]

use cts_serial_runner::config::Config;
use cts_serial_runner::port::{MockPortOpener, MockSerialPort};
use std::path::{Path, PathBuf};

pub const DEVICE: &str = "DEV";
pub const RELAY: &str = "RELAY";

/// Case list with one leaf group per name, each holding a single test,
/// all under package `p`.
pub fn case_list_xml(groups: &[&str]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<TestCaseList PackageName=\"p\">\n",
    );
    for group in groups {
        xml.push_str(&format!(
            "  <TestCase Name=\"{group}\" CaseType=\"TestGroup\">\n    <TestCase Name=\"t\" CaseType=\"SelfValidate\"/>\n  </TestCase>\n"
        ));
    }
    xml.push_str("</TestCaseList>\n");
    xml
}

/// Write [`case_list_xml`] into `dir` and return its path.
pub fn write_case_list(dir: &Path, groups: &[&str]) -> PathBuf {
    let path = dir.join("cases.xml");
    std::fs::write(&path, case_list_xml(groups)).expect("write case list");
    path
}

/// Valid configuration with timings short enough for tests.
pub fn fast_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.device.port = Some(DEVICE.to_string());
    config.device.timeout_ms = 40;
    config.recovery.port = Some(RELAY.to_string());
    config.recovery.settle_ms = 1;
    config.recovery.command_gap_ms = 1;
    config.orchestration.max_wait_attempts = 2;
    config.orchestration.idle_timeout_ms = 10;
    config.orchestration.poll_interval_ms = 1;
    config.orchestration.crash_drain_idle_ms = 10;
    config.orchestration.crash_drain_max_ms = 100;
    config.report.output_dir = Some(output_dir.to_path_buf());
    config.validate().expect("fast config is valid");
    config
}

/// Device and relay handles plus an opener that serves clones of both.
pub struct Bench {
    pub device: MockSerialPort,
    pub relay: MockSerialPort,
    pub opener: MockPortOpener,
}

impl Bench {
    pub fn new() -> Self {
        let device = MockSerialPort::new(DEVICE);
        let relay = MockSerialPort::new(RELAY);
        let opener = MockPortOpener::new()
            .with_port(device.clone())
            .with_port(relay.clone());
        Self {
            device,
            relay,
            opener,
        }
    }

    /// Reply to the dispatch command of leaf group `p.<group>`.
    pub fn on_group(&self, group: &str, reply: &str) {
        self.device.respond_to(format!("'p.{group}.*'"), reply);
    }

    /// Answer every liveness probe.
    pub fn answer_probes(&self) {
        self.device.respond_to("free\n", "Mem: total 1024 used 512\n");
    }

    /// Relay frames written so far; two per reset.
    pub fn relay_frames(&self) -> usize {
        self.relay.get_write_log().len()
    }
}

/// Non-empty lines of a text file.
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("read file")
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
