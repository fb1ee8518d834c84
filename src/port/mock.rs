//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that behaves like a scripted device: bytes can
//! be queued immediately, released after a delay, or emitted in reaction to
//! something the host writes. Clones share state, so a test keeps one handle
//! for inspection while the runner owns another.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use memchr::memmem;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bytes that become readable at `due`.
#[derive(Debug)]
struct Pending {
    due: Instant,
    data: Vec<u8>,
}

/// Reply emitted whenever a write contains `trigger`.
#[derive(Debug)]
struct Rule {
    trigger: Vec<u8>,
    script: Vec<(Duration, Vec<u8>)>,
    /// `None` fires forever.
    remaining: Option<usize>,
}

/// Inner state of the mock port, protected by a mutex for interior mutability.
#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes already "received" and waiting to be read.
    read_queue: VecDeque<u8>,
    /// Bytes scheduled to arrive later, ordered by due time.
    pending: Vec<Pending>,
    /// Log of all bytes written to the port.
    write_log: Vec<Vec<u8>>,
    rules: Vec<Rule>,
    fail_writes: bool,
    /// Writes beyond this many successful ones fail.
    fail_after: Option<usize>,
    write_attempts: usize,
    fail_reads: bool,
    timeout: Duration,
    input_clears: usize,
}

impl MockPortState {
    fn schedule(&mut self, due: Instant, data: Vec<u8>) {
        let at = self.pending.partition_point(|p| p.due <= due);
        self.pending.insert(at, Pending { due, data });
    }

    fn release_due(&mut self, now: Instant) {
        let ready = self.pending.partition_point(|p| p.due <= now);
        for pending in self.pending.drain(..ready) {
            self.read_queue.extend(pending.data);
        }
    }

    fn fire_rules(&mut self, written: &[u8], now: Instant) {
        let mut scheduled = Vec::new();
        for rule in &mut self.rules {
            if rule.remaining == Some(0) {
                continue;
            }
            if memmem::find(written, &rule.trigger).is_none() {
                continue;
            }
            if let Some(n) = rule.remaining.as_mut() {
                *n -= 1;
            }
            for (delay, data) in &rule.script {
                scheduled.push((now + *delay, data.clone()));
            }
        }
        for (due, data) in scheduled {
            self.schedule(due, data);
        }
    }
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use cts_serial_runner::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.respond_to("free", "Mem: total 1024\n");
///
/// port.write_bytes(b"free\n").unwrap();
/// assert_eq!(port.bytes_to_read().unwrap(), 16);
///
/// let mut buffer = [0u8; 32];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Mem: total 1024\n");
/// assert_eq!(port.written_text(), "free\n");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    /// The internal state, shared between clones.
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })),
        }
    }

    /// Make bytes readable right away.
    pub fn enqueue_read(&self, data: impl AsRef<[u8]>) {
        self.state.lock().read_queue.extend(data.as_ref());
    }

    /// Make bytes readable once `delay` has passed.
    pub fn enqueue_after(&self, delay: Duration, data: impl AsRef<[u8]>) {
        self.state
            .lock()
            .schedule(Instant::now() + delay, data.as_ref().to_vec());
    }

    /// Reply immediately every time a write contains `trigger`.
    pub fn respond_to(&self, trigger: impl AsRef<[u8]>, reply: impl AsRef<[u8]>) {
        self.add_rule(trigger, vec![(Duration::ZERO, reply.as_ref().to_vec())], None);
    }

    /// Reply immediately, but only the first time `trigger` is written.
    pub fn respond_once(&self, trigger: impl AsRef<[u8]>, reply: impl AsRef<[u8]>) {
        self.add_rule(
            trigger,
            vec![(Duration::ZERO, reply.as_ref().to_vec())],
            Some(1),
        );
    }

    /// Play a timed script of bursts (offsets relative to the triggering
    /// write) every time `trigger` is written.
    pub fn respond_with_script(
        &self,
        trigger: impl AsRef<[u8]>,
        script: Vec<(Duration, Vec<u8>)>,
    ) {
        self.add_rule(trigger, script, None);
    }

    fn add_rule(
        &self,
        trigger: impl AsRef<[u8]>,
        script: Vec<(Duration, Vec<u8>)>,
        remaining: Option<usize>,
    ) {
        self.state.lock().rules.push(Rule {
            trigger: trigger.as_ref().to_vec(),
            script,
            remaining,
        });
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Everything written so far, decoded lossily.
    pub fn written_text(&self) -> String {
        let state = self.state.lock();
        let bytes: Vec<u8> = state.write_log.concat();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Make every subsequent write fail with a broken pipe.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Let the next `n` writes through, then fail every write after them.
    pub fn fail_writes_after(&self, n: usize) {
        let mut state = self.state.lock();
        let done = state.write_log.len();
        state.fail_after = Some(done + n);
    }

    /// Every write call so far, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }

    /// Make every subsequent read (and availability query) fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// How many times the receive buffer has been discarded.
    pub fn input_clear_count(&self) -> usize {
        self.state.lock().input_clears
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        let mut state = self.state.lock();
        state.release_due(Instant::now());
        state.read_queue.len()
    }

    /// Configured driver timeout.
    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        state.write_attempts += 1;

        let exhausted = state
            .fail_after
            .is_some_and(|limit| state.write_log.len() >= limit);
        if state.fail_writes || exhausted {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }

        state.write_log.push(data.to_vec());
        state.fire_rules(data, Instant::now());

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.fail_reads {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock read failure",
            )));
        }

        state.release_due(Instant::now());

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            // Simulate "would block" behavior by returning an I/O error
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.release_due(Instant::now());
        state.read_queue.clear();
        state.input_clears += 1;
        Ok(())
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.fail_reads {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock read failure",
            )));
        }
        state.release_due(Instant::now());
        Ok(state.read_queue.len())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .finish()
    }
}

/// Hands out registered mock ports by name and records every open.
#[derive(Debug, Default)]
pub struct MockPortOpener {
    ports: HashMap<String, MockSerialPort>,
    opened: Mutex<Vec<(String, PortConfiguration)>>,
}

impl MockPortOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port; opening it yields a clone sharing the same state.
    pub fn with_port(mut self, port: MockSerialPort) -> Self {
        self.ports.insert(port.name().to_string(), port);
        self
    }

    /// Names and configurations of every successful open, in order.
    pub fn opened(&self) -> Vec<(String, PortConfiguration)> {
        self.opened.lock().clone()
    }
}

impl PortOpener for MockPortOpener {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut port = self
            .ports
            .get(port_name)
            .cloned()
            .ok_or_else(|| PortError::not_found(port_name))?;
        port.set_timeout(config.timeout)?;
        self.opened
            .lock()
            .push((port_name.to_string(), config.clone()));
        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_write_logging() {
        let mut port = MockSerialPort::new("MOCK0");
        port.write_bytes(b"Test1").unwrap();
        port.write_bytes(b"Test2").unwrap();

        let log = port.get_write_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], b"Test1");
        assert_eq!(log[1], b"Test2");
    }

    #[test]
    fn test_respond_to_trigger() {
        let mut port = MockSerialPort::new("MOCK0");
        port.respond_to("ping", "pong");

        port.write_bytes(b"noise").unwrap();
        assert_eq!(port.bytes_to_read().unwrap(), 0);

        port.write_bytes(b"ping\n").unwrap();
        port.write_bytes(b"ping\n").unwrap();
        assert_eq!(port.bytes_to_read().unwrap(), 8);
    }

    #[test]
    fn test_respond_once_fires_once() {
        let mut port = MockSerialPort::new("MOCK0");
        port.respond_once("go", "done");

        port.write_bytes(b"go").unwrap();
        port.write_bytes(b"go").unwrap();
        assert_eq!(port.available_bytes(), 4);
    }

    #[test]
    fn test_delayed_data_arrives_later() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_after(Duration::from_millis(30), b"late");

        assert_eq!(port.bytes_to_read().unwrap(), 0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(port.bytes_to_read().unwrap(), 4);
    }

    #[test]
    fn test_clear_input_drops_arrived_data_only() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"stale");
        port.enqueue_after(Duration::from_millis(30), b"fresh");

        port.clear_input().unwrap();
        assert_eq!(port.input_clear_count(), 1);
        assert_eq!(port.available_bytes(), 0);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(port.available_bytes(), 5);
    }

    #[test]
    fn test_empty_read_would_block() {
        let mut port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 10];

        match port.read_bytes(&mut buffer) {
            Err(PortError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
            other => panic!("Expected WouldBlock error, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_injection() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_fail_writes(true);
        assert!(port.write_bytes(b"x").is_err());
        assert!(port.get_write_log().is_empty());

        port.set_fail_reads(true);
        assert!(port.bytes_to_read().is_err());
    }

    #[test]
    fn test_fail_writes_after_counts_attempts() {
        let mut port = MockSerialPort::new("MOCK0");
        port.fail_writes_after(1);
        assert!(port.write_bytes(b"a").is_ok());
        assert!(port.write_bytes(b"b").is_err());
        assert_eq!(port.get_write_log(), vec![b"a".to_vec()]);
        assert_eq!(port.write_attempts(), 2);
    }

    #[test]
    fn test_opener_shares_state_and_records() {
        let device = MockSerialPort::new("RESET0");
        let opener = MockPortOpener::new().with_port(device.clone());
        let config = PortConfiguration::new(9600, Duration::from_millis(250));

        let mut opened = opener.open("RESET0", &config).unwrap();
        opened.write_bytes(&[0xA0, 0x01]).unwrap();

        assert_eq!(device.get_write_log(), vec![vec![0xA0, 0x01]]);
        assert_eq!(device.timeout(), Duration::from_millis(250));
        assert_eq!(opener.opened(), vec![("RESET0".to_string(), config)]);
        assert!(matches!(
            opener.open("MISSING", &PortConfiguration::default()),
            Err(PortError::NotFound(_))
        ));
    }
}
