//! Cooperative cancellation.
//!
//! A run is stopped by flipping a shared flag; every polling loop checks it
//! between sleeps and unwinds with [`Cancelled`]. Nothing is preempted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// The run was stopped by the user while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run interrupted by user")]
pub struct Cancelled;

/// Shared stop flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `total`, waking every `slice` to look at the flag.
    pub fn sleep(&self, total: Duration, slice: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now() + total;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(slice.min(deadline - now));
        }
    }

    /// Route Ctrl-C / SIGTERM to this token.
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if token.is_cancelled() {
                // Second signal: the user wants out now.
                std::process::exit(130);
            }
            token.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());

        token.cancel();
        assert_eq!(observer.check(), Err(Cancelled));
    }

    #[test]
    fn test_sleep_runs_to_completion() {
        let token = CancelToken::new();
        let start = Instant::now();
        token
            .sleep(Duration::from_millis(30), Duration::from_millis(5))
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_wakes_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        let result = token.sleep(Duration::from_secs(10), Duration::from_millis(5));
        handle.join().unwrap();

        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
