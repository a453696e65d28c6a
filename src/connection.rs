//! Live connection to one classified device.
//!
//! Bringing a device up walks a fixed state machine:
//!
//! ```text
//! Discovered → Configuring → (Handshaking) → Polling → { Disconnected, Errored }
//! ```
//!
//! `Configuring` and `Handshaking` block until done. A failure in either never
//! reaches `Polling`; the caller gets an [`OpenFailure`] carrying the scan
//! result back so it can retry with another adapter.

use crate::adapters::{adapter_for, ProtocolAdapter};
use crate::buttons::ButtonState;
use crate::classify::DeviceKind;
use crate::config::DriverConfig;
use crate::device::{TransferError, UsbDevice};
use crate::error::{Error, Result};
use crate::event::PollOutcome;
use crate::manager::ScanResult;
use crate::metadata::DeviceSummary;
use crate::polling::{Clock, Poller};
use std::fmt;
use tracing::{info, warn};

/// Where a connection is in its lifecycle.
///
/// A [`Connection`] only exists from `Polling` on, so [`state`](Connection::state)
/// reports `Polling`, `Disconnected` or `Errored`. A failed bring-up never
/// produces a connection and never reaches `Errored`: the phase it failed in
/// (`Discovered`, `Configuring` or `Handshaking`) is reported through
/// [`OpenFailure::phase`] instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Discovered,
    Configuring,
    Handshaking,
    Polling,
    /// The device went away, or too many reads timed out.
    Disconnected,
    /// Any other transport or protocol error while polling.
    Errored,
}

/// A connection attempt that did not reach `Polling`.
pub struct OpenFailure<D> {
    pub error: Error,
    /// Phase the attempt failed in.
    pub phase: LinkState,
    pub scan: ScanResult<D>,
}

impl<D> fmt::Debug for OpenFailure<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFailure")
            .field("error", &self.error)
            .field("phase", &self.phase)
            .field("kind", &self.scan.kind)
            .finish()
    }
}

pub struct Connection<D: UsbDevice> {
    device: D,
    kind: DeviceKind,
    summary: DeviceSummary,
    adapter: Box<dyn ProtocolAdapter>,
    poller: Poller,
    state: LinkState,
    timeout_streak: u32,
    timeout_streak_limit: Option<u32>,
}

impl<D: UsbDevice> fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("summary", &self.summary)
            .field("adapter", &self.adapter.name())
            .field("state", &self.state)
            .field("timeout_streak", &self.timeout_streak)
            .finish()
    }
}

impl<D: UsbDevice> Connection<D> {
    /// Bring a scanned device up with the adapter for its kind.
    pub fn open(scan: ScanResult<D>, cfg: &DriverConfig) -> Result<Self> {
        Self::try_open(scan, cfg).map_err(|f| f.error)
    }

    /// Like [`open`](Self::open), but hands the scan result back on failure.
    pub fn try_open(
        scan: ScanResult<D>,
        cfg: &DriverConfig,
    ) -> std::result::Result<Self, Box<OpenFailure<D>>> {
        match adapter_for(&scan.kind) {
            Some(adapter) => Self::open_with(scan, adapter, cfg),
            None => Err(Box::new(OpenFailure {
                error: Error::UnsupportedFeature("no adapter for unclassified device"),
                phase: LinkState::Discovered,
                scan,
            })),
        }
    }

    /// Bring a scanned device up with an explicit adapter.
    pub fn open_with(
        mut scan: ScanResult<D>,
        mut adapter: Box<dyn ProtocolAdapter>,
        cfg: &DriverConfig,
    ) -> std::result::Result<Self, Box<OpenFailure<D>>> {
        let summary = DeviceSummary::new(&scan.descriptor, &scan.kind, adapter.name());
        info!(device = %summary, "connecting");

        let mut phase = LinkState::Configuring;
        if let Err(error) = bring_up(adapter.as_mut(), &mut scan.device, cfg, &mut phase) {
            warn!(device = %summary, ?phase, error = %error, "connection failed");
            return Err(Box::new(OpenFailure { error, phase, scan }));
        }

        let poller = Poller::new(adapter.polling_policy(), cfg.poll_ratio_percent);
        info!(
            adapter = adapter.name(),
            target_ms = poller.target_ms(),
            "polling"
        );
        Ok(Self {
            device: scan.device,
            kind: scan.kind,
            summary,
            adapter,
            poller,
            state: LinkState::Polling,
            timeout_streak: 0,
            timeout_streak_limit: cfg.timeout_streak_limit,
        })
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    pub fn summary(&self) -> &DeviceSummary {
        &self.summary
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Consecutive read timeouts since the last report.
    pub fn timeout_streak(&self) -> u32 {
        self.timeout_streak
    }

    /// Button state as of the last normalized report.
    pub fn buttons(&self) -> ButtonState {
        self.poller.previous_buttons()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Tear down and return the device handle.
    pub fn close(self) -> D {
        self.device
    }

    /// One poll step. Errors leave the connection in `Disconnected` or `Errored`.
    pub fn poll_once<C: Clock + ?Sized>(&mut self, clock: &C) -> Result<PollOutcome> {
        if self.state != LinkState::Polling {
            return Err(Error::Transport(TransferError::Disconnected));
        }
        let outcome = self
            .poller
            .poll_once(clock, &mut self.device, self.adapter.as_ref());
        match outcome {
            Ok(PollOutcome::Timeout) => {
                self.timeout_streak += 1;
                match self.timeout_streak_limit {
                    Some(limit) if self.timeout_streak >= limit => {
                        warn!(streak = self.timeout_streak, "too many read timeouts");
                        self.state = LinkState::Disconnected;
                        Err(Error::Timeout)
                    }
                    _ => Ok(PollOutcome::Timeout),
                }
            }
            Ok(PollOutcome::NotDue) => Ok(PollOutcome::NotDue),
            Ok(other) => {
                self.timeout_streak = 0;
                Ok(other)
            }
            Err(e) => {
                self.state = match e {
                    Error::Transport(TransferError::Disconnected) => LinkState::Disconnected,
                    _ => LinkState::Errored,
                };
                Err(e)
            }
        }
    }

    /// Endless stream of poll outcomes; ends after the first error.
    pub fn events<'a, C: Clock + ?Sized>(&'a mut self, clock: &'a C) -> Events<'a, D, C> {
        Events {
            conn: self,
            clock,
            done: false,
        }
    }
}

fn bring_up(
    adapter: &mut dyn ProtocolAdapter,
    dev: &mut dyn UsbDevice,
    cfg: &DriverConfig,
    phase: &mut LinkState,
) -> Result<()> {
    adapter.initialize(dev, cfg)?;
    if adapter.needs_handshake() {
        *phase = LinkState::Handshaking;
        adapter.handshake(dev, cfg)?;
    }
    Ok(())
}

pub struct Events<'a, D: UsbDevice, C: Clock + ?Sized> {
    conn: &'a mut Connection<D>,
    clock: &'a C,
    done: bool,
}

impl<D: UsbDevice, C: Clock + ?Sized> Iterator for Events<'_, D, C> {
    type Item = Result<PollOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let r = self.conn.poll_once(self.clock);
        self.done = r.is_err();
        Some(r)
    }
}
