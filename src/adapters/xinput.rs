//! XInput (Xbox 360 wired protocol).
//!
//! Input report on the interface 0 IN endpoint:
//!
//! | bytes  | content                               |
//! |--------|---------------------------------------|
//! | 0, 1   | message type / length (`00 14`)       |
//! | 2, 3   | button bitfield, little-endian        |
//! | 4, 5   | left / right trigger (ignored)        |
//! | 6..14  | LX, LY, RX, RY as i16 (ignored)       |
//! | 14..20 | constant                              |
//!
//! The button bitfield is already in canonical [`ButtonState`] layout.

use super::{claim_interface, Normalized, PollingPolicy, ProtocolAdapter, ReportWindow, MAX_REPORT_LEN};
use crate::buttons::ButtonState;
use crate::classify::EndpointPlan;
use crate::config::DriverConfig;
use crate::device::{TransferError, UsbDevice};
use crate::error::Result;
use tracing::{debug, info, warn};

const BUTTON_BYTES: &[(usize, usize)] = &[(2, 4)];

/// LED pattern command lighting the quadrant for `player` (1..=4).
pub fn led_command(player: u8) -> [u8; 3] {
    [0x01, 0x03, 0x01 + player.clamp(1, 4)]
}

pub struct XInputAdapter {
    plan: EndpointPlan,
}

impl XInputAdapter {
    pub fn new(plan: EndpointPlan) -> Self {
        Self { plan }
    }

    fn drain(&self, dev: &mut dyn UsbDevice, cfg: &DriverConfig) -> Result<()> {
        let mut buf = [0u8; MAX_REPORT_LEN];
        for drained in 0..cfg.drain_reads {
            match dev.interrupt_read(self.plan.input, &mut buf, cfg.drain_timeout_ms) {
                Ok(_) => {}
                Err(TransferError::Timeout) => {
                    debug!(drained, "XInput buffer drained");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl ProtocolAdapter for XInputAdapter {
    fn name(&self) -> &'static str {
        "XInput"
    }

    fn initialize(&mut self, dev: &mut dyn UsbDevice, cfg: &DriverConfig) -> Result<()> {
        info!("Initializing XInput gamepad");
        claim_interface(dev, self.plan.interface)?;
        match self.plan.output {
            Some(out) => {
                dev.interrupt_write(out, &led_command(cfg.player), cfg.write_timeout_ms)?;
            }
            None => warn!("XInput interface 0 has no OUT endpoint, skipping player LED"),
        }
        // Stale reports (and the LED status reply) are buffered on the device.
        self.drain(dev, cfg)
    }

    fn normalize(&self, report: &[u8]) -> Normalized {
        match (report.get(2), report.get(3)) {
            (Some(&lo), Some(&hi)) => {
                Normalized::Buttons(ButtonState::from_raw(u16::from_le_bytes([lo, hi])))
            }
            _ => Normalized::NoEvent,
        }
    }

    fn polling_policy(&self) -> PollingPolicy {
        PollingPolicy::for_plan(&self.plan, ReportWindow::Spans(BUTTON_BYTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UsbSpeed;

    fn adapter() -> XInputAdapter {
        XInputAdapter::new(EndpointPlan {
            interface: 0,
            input: 0x81,
            output: Some(0x02),
            interval: 4,
            max_packet: 32,
            speed: UsbSpeed::Full,
        })
    }

    fn report(lo: u8, hi: u8) -> [u8; 20] {
        let mut r = [0u8; 20];
        r[1] = 0x14;
        r[2] = lo;
        r[3] = hi;
        r
    }

    #[test]
    fn bottom_button_passes_through() {
        assert_eq!(
            adapter().normalize(&report(0x00, 0x10)),
            Normalized::Buttons(ButtonState::B)
        );
        assert_eq!(
            adapter().normalize(&report(0x01, 0x00)),
            Normalized::Buttons(ButtonState::UP)
        );
    }

    #[test]
    fn short_report_is_no_event() {
        assert_eq!(adapter().normalize(&[0x00, 0x14, 0x01]), Normalized::NoEvent);
    }

    #[test]
    fn led_commands() {
        assert_eq!(led_command(1), [0x01, 0x03, 0x02]);
        assert_eq!(led_command(4), [0x01, 0x03, 0x05]);
    }

    #[test]
    fn policy_watches_button_bytes() {
        let p = adapter().polling_policy();
        assert_eq!(p.endpoint, 0x81);
        assert_eq!(p.read_len, 32);
        assert_eq!(p.window, ReportWindow::Spans(&[(2, 4)]));
    }
}
