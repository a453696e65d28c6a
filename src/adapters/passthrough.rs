//! Raw passthrough for HID devices with no known layout.
//!
//! Used for boot keyboards and mice, generic HID composites, and as the
//! fallback when a SwitchPro handshake fails. Reports are handed to the caller
//! unchanged for display or diagnosis.

use super::{claim_interface, Normalized, PollingPolicy, ProtocolAdapter, ReportWindow};
use crate::classify::EndpointPlan;
use crate::config::DriverConfig;
use crate::device::UsbDevice;
use crate::error::Result;

pub struct PassthroughAdapter {
    tag: &'static str,
    plan: EndpointPlan,
}

impl PassthroughAdapter {
    pub fn new(tag: &'static str, plan: EndpointPlan) -> Self {
        Self { tag, plan }
    }
}

impl ProtocolAdapter for PassthroughAdapter {
    fn name(&self) -> &'static str {
        self.tag
    }

    fn initialize(&mut self, dev: &mut dyn UsbDevice, _cfg: &DriverConfig) -> Result<()> {
        claim_interface(dev, self.plan.interface)
    }

    fn normalize(&self, report: &[u8]) -> Normalized {
        if report.is_empty() {
            Normalized::NoEvent
        } else {
            Normalized::Raw(report.to_vec())
        }
    }

    fn polling_policy(&self) -> PollingPolicy {
        PollingPolicy::for_plan(&self.plan, ReportWindow::Whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UsbSpeed;

    #[test]
    fn reports_pass_through() {
        let a = PassthroughAdapter::new(
            "BootKeyboard",
            EndpointPlan {
                interface: 0,
                input: 0x81,
                output: None,
                interval: 10,
                max_packet: 8,
                speed: UsbSpeed::Low,
            },
        );
        assert_eq!(
            a.normalize(&[0x02, 0, 0x04, 0, 0, 0, 0, 0]),
            Normalized::Raw(vec![0x02, 0, 0x04, 0, 0, 0, 0, 0])
        );
        assert_eq!(a.normalize(&[]), Normalized::NoEvent);
        assert_eq!(a.polling_policy().read_len, 8);
    }
}
