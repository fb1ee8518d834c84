//! Transport channel over the device's control serial line.
//!
//! The device console is a raw character stream: no framing, no
//! acknowledgement, output in bursts separated by gaps of arbitrary length.
//! [`TransportChannel::collect_until_idle`] is the primitive everything else
//! is built on; it returns once a burst has finished (idle gap) or a hard cap
//! has elapsed, whichever comes first.

use crate::interrupt::{CancelToken, Cancelled};
use crate::port::{PortConfiguration, PortError, PortOpener, SerialPortAdapter};
use memchr::memmem;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Default polling increment; fine enough that high-rate bursts are not
/// left sitting in the driver buffer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 4096;

/// Ordered set of case-insensitive keywords.
///
/// Order is precedence: [`KeywordSet::find_first`] reports the first keyword
/// in set order that occurs anywhere in the text, not the earliest match
/// position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
    lowered: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
        let lowered = keywords.iter().map(|k| k.to_lowercase()).collect();
        Self { keywords, lowered }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// First keyword (in set order) contained in `text`, ignoring case.
    pub fn find_first(&self, text: &str) -> Option<&str> {
        if self.keywords.is_empty() || text.is_empty() {
            return None;
        }
        let haystack = text.to_lowercase();
        self.lowered
            .iter()
            .position(|k| memmem::find(haystack.as_bytes(), k.as_bytes()).is_some())
            .map(|i| self.keywords[i].as_str())
    }

    pub fn contains_any(&self, text: &str) -> bool {
        self.find_first(text).is_some()
    }
}

/// Everything read during one collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    /// Whether at least one byte arrived during the cycle.
    pub saw_data: bool,
    /// Received bytes, decoded lossily as UTF-8.
    pub text: String,
}

/// A collection cycle plus the keyword it matched, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub matched: Option<String>,
    pub collected: Collected,
}

impl Response {
    pub fn found(&self) -> bool {
        self.matched.is_some()
    }
}

/// Owned handle on the device console.
#[derive(Debug)]
pub struct TransportChannel {
    port: Box<dyn SerialPortAdapter>,
    poll_interval: Duration,
    cancel: CancelToken,
}

impl TransportChannel {
    /// Open the console port. Failure here is fatal to the run.
    pub fn open(
        opener: &dyn PortOpener,
        address: &str,
        config: &PortConfiguration,
        cancel: CancelToken,
    ) -> Result<Self, PortError> {
        let port = opener.open(address, config)?;
        info!(
            port = address,
            baud_rate = config.baud_rate,
            timeout = ?config.timeout,
            "test channel opened"
        );
        Ok(Self::from_port(port, cancel))
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPortAdapter>, cancel: CancelToken) -> Self {
        Self {
            port,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn name(&self) -> &str {
        self.port.name()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Best-effort write of the whole buffer.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), PortError> {
        debug!(
            port = self.port.name(),
            command = %String::from_utf8_lossy(bytes).trim_end(),
            "sending"
        );
        self.port.write_bytes(bytes).map(|_| ())
    }

    /// Drop whatever the device printed before now.
    pub fn clear_input(&mut self) -> Result<(), PortError> {
        self.port.clear_input()
    }

    /// Read until the stream has been quiet for `idle_timeout` after the last
    /// byte, or `max_timeout` has elapsed since the call began.
    ///
    /// The idle rule only applies once something has arrived: a silent
    /// device keeps the call waiting for the full `max_timeout`. Read errors
    /// are logged and count as "nothing this poll".
    pub fn collect_until_idle(
        &mut self,
        max_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Collected, Cancelled> {
        let start = Instant::now();
        let mut last_data = start;
        let mut raw = Vec::new();
        let mut saw_data = false;
        let mut error_logged = false;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            self.cancel.check()?;

            let elapsed = start.elapsed();
            if elapsed >= max_timeout {
                break;
            }

            let waiting = match self.port.bytes_to_read() {
                Ok(n) => n,
                Err(e) => {
                    if !error_logged {
                        warn!(port = self.port.name(), error = %e, "read error, treating as no data");
                        error_logged = true;
                    }
                    0
                }
            };

            let mut got = 0;
            if waiting > 0 {
                let want = waiting.min(READ_CHUNK);
                match self.port.read_bytes(&mut chunk[..want]) {
                    Ok(n) => {
                        raw.extend_from_slice(&chunk[..n]);
                        got = n;
                    }
                    Err(e) if e.is_transient() => {}
                    Err(e) => {
                        if !error_logged {
                            warn!(port = self.port.name(), error = %e, "read error, treating as no data");
                            error_logged = true;
                        }
                    }
                }
            }

            if got > 0 {
                trace!(bytes = got, "received");
                saw_data = true;
                last_data = Instant::now();
            } else {
                let remaining = max_timeout.saturating_sub(start.elapsed());
                std::thread::sleep(self.poll_interval.min(remaining));
            }

            if saw_data && last_data.elapsed() >= idle_timeout {
                break;
            }
        }

        Ok(Collected {
            saw_data,
            text: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    /// One collection cycle followed by a keyword scan of what it returned.
    pub fn wait_for(
        &mut self,
        keywords: &KeywordSet,
        max_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Response, Cancelled> {
        let collected = self.collect_until_idle(max_timeout, idle_timeout)?;
        let matched = keywords.find_first(&collected.text).map(str::to_owned);
        Ok(Response { matched, collected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;

    fn channel(port: &MockSerialPort) -> TransportChannel {
        TransportChannel::from_port(Box::new(port.clone()), CancelToken::new())
            .with_poll_interval(Duration::from_millis(2))
    }

    #[test]
    fn test_keyword_scan_is_case_insensitive() {
        let set = KeywordSet::new(["DONE!"]);
        assert_eq!(set.find_first("...done!\n"), Some("DONE!"));
        assert_eq!(set.find_first("nothing yet"), None);
    }

    #[test]
    fn test_keyword_scan_uses_set_order() {
        let set = KeywordSet::new(["PANIC", "DONE!"]);
        // Completion text appears first in the stream; set order still wins.
        assert_eq!(set.find_first("DONE! then panic"), Some("PANIC"));
        assert_eq!(set.find_first("only DONE!"), Some("DONE!"));
    }

    #[test]
    fn test_empty_keyword_set_never_matches() {
        let set = KeywordSet::new(Vec::<String>::new());
        assert!(set.is_empty());
        assert!(!set.contains_any("anything"));
    }

    #[test]
    fn test_collect_returns_after_idle_gap() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"burst one ");
        port.enqueue_after(Duration::from_millis(15), b"burst two");
        port.enqueue_after(Duration::from_millis(400), b"too late");

        let mut ch = channel(&port);
        let start = Instant::now();
        let got = ch
            .collect_until_idle(Duration::from_secs(2), Duration::from_millis(60))
            .unwrap();

        assert!(got.saw_data);
        assert_eq!(got.text, "burst one burst two");
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[test]
    fn test_collect_silent_waits_full_timeout() {
        let port = MockSerialPort::new("MOCK0");
        let mut ch = channel(&port);

        let start = Instant::now();
        let got = ch
            .collect_until_idle(Duration::from_millis(50), Duration::from_millis(5))
            .unwrap();

        assert!(!got.saw_data);
        assert!(got.text.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_collect_capped_by_max_timeout_for_chatty_device() {
        let port = MockSerialPort::new("MOCK0");
        for i in 0..40u64 {
            port.enqueue_after(Duration::from_millis(i * 5), b".");
        }
        let mut ch = channel(&port);

        let start = Instant::now();
        let got = ch
            .collect_until_idle(Duration::from_millis(60), Duration::from_millis(50))
            .unwrap();

        assert!(got.saw_data);
        assert!(got.text.len() < 40);
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[test]
    fn test_read_errors_fold_into_no_data() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"unreachable");
        port.set_fail_reads(true);
        let mut ch = channel(&port);

        let got = ch
            .collect_until_idle(Duration::from_millis(30), Duration::from_millis(5))
            .unwrap();
        assert!(!got.saw_data);
    }

    #[test]
    fn test_collect_stops_on_cancel() {
        let port = MockSerialPort::new("MOCK0");
        let token = CancelToken::new();
        let mut ch = TransportChannel::from_port(Box::new(port), token.clone());
        token.cancel();

        assert_eq!(
            ch.collect_until_idle(Duration::from_secs(5), Duration::from_millis(5)),
            Err(Cancelled)
        );
    }

    #[test]
    fn test_multibyte_text_split_across_reads_survives() {
        let port = MockSerialPort::new("MOCK0");
        let bytes = "résumé".as_bytes();
        port.enqueue_read(&bytes[..2]);
        port.enqueue_after(Duration::from_millis(5), &bytes[2..]);
        let mut ch = channel(&port);

        let got = ch
            .collect_until_idle(Duration::from_secs(1), Duration::from_millis(40))
            .unwrap();
        assert_eq!(got.text, "résumé");
    }

    #[test]
    fn test_wait_for_reports_match() {
        let port = MockSerialPort::new("MOCK0");
        port.respond_to("free", "Mem: total used\n");
        let mut ch = channel(&port);

        ch.send(b"free\n").unwrap();
        let resp = ch
            .wait_for(
                &KeywordSet::new(["total"]),
                Duration::from_millis(200),
                Duration::from_millis(10),
            )
            .unwrap();
        assert!(resp.found());
        assert_eq!(port.written_text(), "free\n");
    }
}
