//! Protocol adapters.
//!
//! One adapter per [`DeviceKind`]. Each knows how to bring its device up
//! ([`initialize`](ProtocolAdapter::initialize), plus a
//! [`handshake`](ProtocolAdapter::handshake) for protocols that need one), how
//! to turn a raw report into a [`ButtonState`]
//! ([`normalize`](ProtocolAdapter::normalize)) and how its endpoint should be
//! polled ([`polling_policy`](ProtocolAdapter::polling_policy)).

pub mod named_hid;
pub mod passthrough;
pub mod switch_pro;
pub mod xinput;

use crate::buttons::ButtonState;
use crate::classify::{DeviceKind, EndpointPlan};
use crate::config::DriverConfig;
use crate::device::{UsbDevice, UsbSpeed};
use crate::error::Result;
use tracing::debug;

pub use named_hid::{HidLayout, NamedHidAdapter};
pub use passthrough::PassthroughAdapter;
pub use switch_pro::SwitchProAdapter;
pub use xinput::XInputAdapter;

/// Largest report the poller buffers.
pub const MAX_REPORT_LEN: usize = 64;

/// Result of normalizing one raw report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    Buttons(ButtonState),
    /// Unnormalized report bytes (generic HID, keyboards, mice).
    Raw(Vec<u8>),
    /// The report is not an input report this adapter understands.
    NoEvent,
}

/// Which bytes of a report take part in change detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportWindow {
    Whole,
    /// Half-open `(start, end)` byte ranges.
    Spans(&'static [(usize, usize)]),
}

impl ReportWindow {
    /// Compare two reports over this window. Bytes past the end of either
    /// report read as zero.
    pub fn same(&self, a: &[u8], b: &[u8]) -> bool {
        match self {
            ReportWindow::Whole => a == b,
            ReportWindow::Spans(spans) => spans.iter().all(|&(start, end)| {
                (start..end).all(|i| a.get(i).copied().unwrap_or(0) == b.get(i).copied().unwrap_or(0))
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollingPolicy {
    /// Interrupt IN endpoint address.
    pub endpoint: u8,
    /// Raw `bInterval`.
    pub interval: u8,
    pub speed: UsbSpeed,
    /// Bytes requested per read.
    pub read_len: usize,
    pub window: ReportWindow,
}

impl PollingPolicy {
    pub fn for_plan(plan: &EndpointPlan, window: ReportWindow) -> Self {
        Self {
            endpoint: plan.input,
            interval: plan.interval,
            speed: plan.speed,
            read_len: usize::from(plan.max_packet).clamp(1, MAX_REPORT_LEN),
            window,
        }
    }
}

pub trait ProtocolAdapter {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Claim and configure the device (the `Configuring` phase).
    fn initialize(&mut self, dev: &mut dyn UsbDevice, cfg: &DriverConfig) -> Result<()>;

    /// Whether a `Handshaking` phase follows [`initialize`](Self::initialize).
    fn needs_handshake(&self) -> bool {
        false
    }

    fn handshake(&mut self, _dev: &mut dyn UsbDevice, _cfg: &DriverConfig) -> Result<()> {
        Ok(())
    }

    fn normalize(&self, report: &[u8]) -> Normalized;

    fn polling_policy(&self) -> PollingPolicy;
}

/// Detach any host driver from `interface` and select the configuration.
pub fn claim_interface(dev: &mut dyn UsbDevice, interface: u8) -> Result<()> {
    if dev.is_kernel_driver_active(interface)? {
        debug!(interface, "detaching kernel driver");
        dev.detach_kernel_driver(interface)?;
    }
    dev.set_configuration()?;
    Ok(())
}

/// Pick the adapter for a classified device. `None` for unclassified devices.
pub fn adapter_for(kind: &DeviceKind) -> Option<Box<dyn ProtocolAdapter>> {
    Some(match kind {
        DeviceKind::SwitchPro(plan) => Box::new(SwitchProAdapter::new(plan.clone())),
        DeviceKind::XInput(plan) => Box::new(XInputAdapter::new(plan.clone())),
        DeviceKind::NamedHid(variant, plan) => {
            Box::new(NamedHidAdapter::new(named_hid::layout_for(*variant), plan.clone()))
        }
        DeviceKind::BootKeyboard(plan) | DeviceKind::BootMouse(plan) | DeviceKind::GenericHid(plan) => {
            Box::new(PassthroughAdapter::new(kind.tag(), plan.clone()))
        }
        DeviceKind::Unclassified => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_spans_ignore_other_bytes() {
        let w = ReportWindow::Spans(&[(2, 4)]);
        assert!(w.same(&[0, 0x14, 1, 0, 9, 9], &[0, 0x14, 1, 0, 7, 7]));
        assert!(!w.same(&[0, 0x14, 1, 0], &[0, 0x14, 0, 0]));
    }

    #[test]
    fn window_pads_short_reports_with_zero() {
        let w = ReportWindow::Spans(&[(0, 4)]);
        assert!(w.same(&[1, 2], &[1, 2, 0, 0]));
        assert!(!ReportWindow::Whole.same(&[1, 2], &[1, 2, 0, 0]));
    }

    #[test]
    fn unclassified_has_no_adapter() {
        assert!(adapter_for(&DeviceKind::Unclassified).is_none());
    }
}
