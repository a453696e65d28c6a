//! Session manager.
//!
//! [`SessionManager`] owns the bus, the clock, the fingerprint cache and at
//! most one live [`Connection`]. Each call to [`step`](SessionManager::step)
//! does one cooperative unit of work and returns a [`SessionEvent`]:
//!
//! - no connection: scan the bus once, and connect to the first new,
//!   classified device;
//! - connected: poll it once.
//!
//! Nothing here is fatal. A failed connect, a transport error or a timeout
//! streak drops the connection, clears the cache and the next step is a
//! scan again.
//!
//! ```
//! use padhost::backends::VirtualBus;
//! use padhost::config::DriverConfig;
//! use padhost::event::SessionEvent;
//! use padhost::fixtures;
//! use padhost::manager::SessionManager;
//! use padhost::polling::ManualClock;
//!
//! let bus = VirtualBus::new();
//! bus.plug(fixtures::sn30_pro_usb().into_virtual());
//! let mut session = SessionManager::new(bus, ManualClock::new(0), DriverConfig::default());
//! assert!(matches!(session.step(), SessionEvent::Connected(_)));
//! ```

use crate::adapters::PassthroughAdapter;
use crate::classify::{identify, log_kind, DeviceFingerprint, DeviceKind, FingerprintCache};
use crate::config::DriverConfig;
use crate::connection::Connection;
use crate::descriptor::{read_device_descriptor, Descriptor};
use crate::device::{UsbBus, UsbDevice};
use crate::error::{Error, Result};
use crate::event::{PollOutcome, Presenter, SessionEvent};
use crate::metadata::DeviceSummary;
use crate::polling::Clock;
use tracing::{debug, error, info, warn};

/// A classified device that has not been seen before in this session.
pub struct ScanResult<D> {
    pub device: D,
    pub descriptor: Descriptor,
    pub kind: DeviceKind,
}

pub struct SessionManager<B: UsbBus, C: Clock> {
    bus: B,
    clock: C,
    cfg: DriverConfig,
    cache: FingerprintCache,
    connection: Option<Connection<B::Device>>,
}

impl<B: UsbBus, C: Clock> SessionManager<B, C> {
    pub fn new(bus: B, clock: C, cfg: DriverConfig) -> Self {
        Self {
            bus,
            clock,
            cfg,
            cache: FingerprintCache::new(),
            connection: None,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.cfg
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    pub fn connection(&self) -> Option<&Connection<B::Device>> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Walk the bus once and return the first new device worth connecting to.
    ///
    /// Devices already in the cache and unclassified devices are skipped. A
    /// device whose device descriptor fails to read is left out of the cache
    /// and retried on the next scan; once the device descriptor parses the
    /// device is cached, so a bad configuration is logged only once.
    pub fn scan(&mut self) -> Option<ScanResult<B::Device>> {
        let devices = match self.bus.find_all_devices() {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "bus enumeration failed");
                return None;
            }
        };
        for mut device in devices {
            match inspect(&mut device, &mut self.cache, &self.cfg) {
                Ok(Some((descriptor, kind))) => {
                    return Some(ScanResult {
                        device,
                        descriptor,
                        kind,
                    })
                }
                Ok(None) => {}
                Err(e) => error!(error = %e, "skipping device"),
            }
        }
        None
    }

    /// Bring a scanned device up and make it the active connection.
    ///
    /// A SwitchPro device whose handshake fails is retried as raw HID when
    /// `switch_pro_failover` is set. Any final failure clears the cache.
    pub fn connect(&mut self, scan: ScanResult<B::Device>) -> Result<DeviceSummary> {
        self.connection = None;
        let failure = match Connection::try_open(scan, &self.cfg) {
            Ok(conn) => return Ok(self.activate(conn)),
            Err(f) => f,
        };

        let fallback = match (&failure.error, &failure.scan.kind) {
            (Error::HandshakeFailed { .. }, DeviceKind::SwitchPro(plan)) if self.cfg.switch_pro_failover => {
                Some(plan.clone())
            }
            _ => None,
        };
        let failure = match fallback {
            Some(plan) => {
                warn!(error = %failure.error, "SwitchPro handshake failed, falling back to raw HID");
                let adapter = Box::new(PassthroughAdapter::new("HID", plan));
                match Connection::open_with(failure.scan, adapter, &self.cfg) {
                    Ok(conn) => return Ok(self.activate(conn)),
                    Err(f) => f,
                }
            }
            None => failure,
        };

        self.cache.clear();
        Err(failure.error)
    }

    fn activate(&mut self, conn: Connection<B::Device>) -> DeviceSummary {
        let summary = conn.summary().clone();
        info!(device = %summary, "connected");
        self.connection = Some(conn);
        summary
    }

    /// Drop any connection and forget every device seen so far.
    pub fn request_rescan(&mut self) {
        info!("rescan requested");
        self.connection = None;
        self.cache.clear();
    }

    /// One cooperative unit of work.
    pub fn step(&mut self) -> SessionEvent {
        if let Some(conn) = self.connection.as_mut() {
            return match conn.poll_once(&self.clock) {
                Ok(PollOutcome::Input(report)) => SessionEvent::Input(report),
                Ok(_) => SessionEvent::NoData,
                Err(e) => {
                    warn!(error = %e, "connection lost");
                    self.connection = None;
                    self.cache.clear();
                    SessionEvent::Lost(e.to_string())
                }
            };
        }

        match self.scan() {
            Some(scan) => match self.connect(scan) {
                Ok(summary) => SessionEvent::Connected(summary),
                Err(e) => SessionEvent::Lost(e.to_string()),
            },
            None => SessionEvent::Idle,
        }
    }

    /// [`step`](Self::step), forwarding the event to `presenter`.
    pub fn step_with(&mut self, presenter: &mut dyn Presenter) -> SessionEvent {
        let event = self.step();
        presenter.on_event(&event);
        event
    }
}

/// Read, fingerprint and classify one device.
fn inspect<D: UsbDevice>(
    dev: &mut D,
    cache: &mut FingerprintCache,
    cfg: &DriverConfig,
) -> Result<Option<(Descriptor, DeviceKind)>> {
    let device = read_device_descriptor(dev, cfg.control_timeout_ms)?;
    // Cached as soon as the device descriptor parses, so a device with a
    // broken configuration is read and reported once, not on every scan.
    if !cache.insert(DeviceFingerprint::of(&device)) {
        debug!("Ignoring cached device");
        return Ok(None);
    }
    let desc = Descriptor::read_configuration(dev, device, cfg)?;
    debug!("{desc}");
    let kind = identify(&desc);
    log_kind(&desc, &kind);
    match kind {
        DeviceKind::Unclassified => Ok(None),
        kind => Ok(Some((desc, kind))),
    }
}
