//! Out-of-band power cycling through a relay board on a second serial port.
//!
//! Nothing is ever read back from the relay. A cycle opens the port, writes
//! the power-on frame, waits a short gap, writes the power-off frame, closes
//! the port and then blocks for the settle period while the device reboots.
//! Every failure on this path is logged and swallowed: a run without resets
//! is degraded, not aborted.

use crate::config::RecoveryConfig;
use crate::interrupt::{CancelToken, Cancelled};
use crate::port::{PortConfiguration, PortOpener};
use std::time::Duration;
use tracing::{error, info, warn};

/// Relay frame: channel 1 on.
pub const POWER_ON_FRAME: [u8; 4] = [0xA0, 0x01, 0x01, 0xA2];
/// Relay frame: channel 1 off.
pub const POWER_OFF_FRAME: [u8; 4] = [0xA0, 0x01, 0x00, 0xA1];

/// How often the settle wait wakes up to report and check for interruption.
const SETTLE_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySettings {
    /// Relay port; `None` disables resets.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Time the device needs to boot after the cycle.
    pub settle: Duration,
    /// Pause between the two relay frames.
    pub command_gap: Duration,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            settle: Duration::from_secs(5),
            command_gap: Duration::from_millis(100),
        }
    }
}

impl From<&RecoveryConfig> for RecoverySettings {
    fn from(cfg: &RecoveryConfig) -> Self {
        Self {
            port: cfg.port.clone().filter(|p| !p.trim().is_empty()),
            baud_rate: cfg.baud_rate,
            settle: cfg.settle(),
            command_gap: cfg.command_gap(),
        }
    }
}

/// What a call to [`RecoveryChannel::cycle`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// Both frames written and the settle period elapsed.
    Completed,
    /// No relay port configured.
    Skipped,
    /// The relay could not be driven; the device state is unknown.
    Failed,
}

#[derive(Debug)]
pub struct RecoveryChannel<'a> {
    opener: &'a dyn PortOpener,
    settings: RecoverySettings,
    cancel: CancelToken,
}

impl<'a> RecoveryChannel<'a> {
    pub fn new(opener: &'a dyn PortOpener, settings: RecoverySettings, cancel: CancelToken) -> Self {
        Self {
            opener,
            settings,
            cancel,
        }
    }

    pub fn settings(&self) -> &RecoverySettings {
        &self.settings
    }

    /// Power-cycle the device and wait for it to boot.
    ///
    /// Only interruption is reported as an error; relay problems are logged
    /// and surface as [`CycleReport::Failed`]. Both frames are always
    /// attempted. The settle wait runs whenever at least one frame went out,
    /// since the relay may already have switched.
    pub fn cycle(&self) -> Result<CycleReport, Cancelled> {
        let Some(port_name) = self.settings.port.as_deref() else {
            warn!("no reset port configured, running without device resets");
            return Ok(CycleReport::Skipped);
        };

        info!(port = port_name, "resetting device");
        let config = PortConfiguration::new(self.settings.baud_rate, Duration::from_secs(1));
        let mut port = match self.opener.open(port_name, &config) {
            Ok(port) => port,
            Err(e) => {
                error!(port = port_name, error = %e, "cannot open reset port");
                return Ok(CycleReport::Failed);
            }
        };

        let mut sent = 0;
        for (i, (frame, label)) in [(POWER_ON_FRAME, "power-on"), (POWER_OFF_FRAME, "power-off")]
            .iter()
            .enumerate()
        {
            if i > 0 {
                self.cancel.sleep(self.settings.command_gap, self.settings.command_gap)?;
            }
            match port.write_bytes(frame) {
                Ok(_) => sent += 1,
                Err(e) => error!(port = port_name, error = %e, frame = *label, "relay frame not sent"),
            }
        }
        drop(port);

        if sent == 0 {
            return Ok(CycleReport::Failed);
        }
        info!(settle = ?self.settings.settle, "reset sent, waiting for device to boot");
        self.cancel.sleep(self.settings.settle, SETTLE_TICK)?;
        info!("device boot wait complete");
        Ok(if sent == 2 {
            CycleReport::Completed
        } else {
            CycleReport::Failed
        })
    }
}
