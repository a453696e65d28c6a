//! Switch Pro Controller over USB.
//!
//! The controller stays silent until the host walks it through a fixed
//! sequence of USB commands and HID subcommands. After that it streams
//! standard input reports (ID `0x30`).
//!
//! Wire format:
//! - USB command: `[0x80, cmd]`, acknowledged by `[0x81, cmd, ..]`.
//! - Subcommand: output report `0x01`
//!   `[0x01, counter, <8 bytes neutral rumble>, subcmd, args..]`, acknowledged
//!   by input report `0x21` carrying the subcommand id at byte 14.

use super::{claim_interface, Normalized, PollingPolicy, ProtocolAdapter, ReportWindow, MAX_REPORT_LEN};
use crate::buttons::ButtonState;
use crate::classify::EndpointPlan;
use crate::config::DriverConfig;
use crate::device::{TransferError, UsbDevice};
use crate::error::{Error, Result};
use tracing::{debug, info, trace, warn};

const USB_CMD: u8 = 0x80;
const USB_REPLY: u8 = 0x81;
const SUBCMD_REPORT: u8 = 0x01;
const SUBCMD_REPLY: u8 = 0x21;
const SUBCMD_REPLY_ID_OFFSET: usize = 14;
pub const STANDARD_INPUT_REPORT: u8 = 0x30;

const RUMBLE_NEUTRAL: [u8; 8] = [0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40];

// report ID, then payload[2..5]
const BUTTON_BYTES: &[(usize, usize)] = &[(0, 1), (3, 6)];

#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    /// `[0x80, cmd]`; `strict` steps need a matching reply.
    Usb { cmd: u8, strict: bool },
    Subcommand { id: u8, args: Vec<u8> },
}

/// The handshake, in order, with the name each step reports on failure.
fn sequence(player: u8) -> Vec<(&'static str, Step)> {
    vec![
        ("get-device-info", Step::Usb { cmd: 0x01, strict: true }),
        ("handshake", Step::Usb { cmd: 0x02, strict: true }),
        ("raise-baud-rate", Step::Usb { cmd: 0x03, strict: true }),
        ("handshake", Step::Usb { cmd: 0x02, strict: true }),
        ("usb-hid-only", Step::Usb { cmd: 0x04, strict: false }),
        (
            "set-report-mode",
            Step::Subcommand { id: 0x03, args: vec![STANDARD_INPUT_REPORT] },
        ),
        (
            "set-player-led",
            Step::Subcommand { id: 0x30, args: vec![player_led_bits(player)] },
        ),
        (
            "set-home-led",
            Step::Subcommand { id: 0x38, args: vec![0x0F, 0xF0, 0x00] },
        ),
    ]
}

fn player_led_bits(player: u8) -> u8 {
    1 << (player.clamp(1, 4) - 1)
}

impl Step {
    fn encode(&self, counter: u8) -> Vec<u8> {
        match self {
            Step::Usb { cmd, .. } => vec![USB_CMD, *cmd],
            Step::Subcommand { id, args } => {
                let mut out = Vec::with_capacity(11 + args.len());
                out.push(SUBCMD_REPORT);
                out.push(counter & 0x0F);
                out.extend_from_slice(&RUMBLE_NEUTRAL);
                out.push(*id);
                out.extend_from_slice(args);
                out
            }
        }
    }

    fn is_ack(&self, reply: &[u8]) -> bool {
        match self {
            Step::Usb { strict: false, .. } => !reply.is_empty(),
            Step::Usb { cmd, .. } => matches!(reply, [USB_REPLY, c, ..] if c == cmd),
            Step::Subcommand { id, .. } => {
                reply.first() == Some(&SUBCMD_REPLY)
                    && reply.get(SUBCMD_REPLY_ID_OFFSET) == Some(id)
            }
        }
    }
}

pub struct SwitchProAdapter {
    plan: EndpointPlan,
    counter: u8,
}

impl SwitchProAdapter {
    pub fn new(plan: EndpointPlan) -> Self {
        Self { plan, counter: 0 }
    }

    fn run_step(
        &mut self,
        dev: &mut dyn UsbDevice,
        cfg: &DriverConfig,
        out: u8,
        name: &'static str,
        step: &Step,
    ) -> Result<()> {
        let frame = step.encode(self.counter);
        if matches!(step, Step::Subcommand { .. }) {
            self.counter = self.counter.wrapping_add(1);
        }
        match dev.interrupt_write(out, &frame, cfg.write_timeout_ms) {
            Ok(_) => {}
            Err(TransferError::Timeout) => {
                return Err(Error::HandshakeFailed {
                    step: name,
                    reason: "send timed out".into(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let mut buf = [0u8; MAX_REPORT_LEN];
        let mut unrelated = 0u32;
        for _ in 0..cfg.handshake_attempts {
            match dev.interrupt_read(self.plan.input, &mut buf, cfg.handshake_timeout_ms) {
                Ok(n) => {
                    let reply = buf.get(..n).unwrap_or_default();
                    if step.is_ack(reply) {
                        debug!(step = name, "acknowledged");
                        return Ok(());
                    }
                    trace!(step = name, id = reply.first().copied(), "unrelated reply");
                    unrelated += 1;
                }
                Err(TransferError::Timeout) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if unrelated > 0 {
            warn!(step = name, unrelated, "no matching ACK, continuing");
            Ok(())
        } else {
            Err(Error::HandshakeFailed {
                step: name,
                reason: format!("no reply after {} attempts", cfg.handshake_attempts),
            })
        }
    }
}

impl ProtocolAdapter for SwitchProAdapter {
    fn name(&self) -> &'static str {
        "SwitchPro"
    }

    fn initialize(&mut self, dev: &mut dyn UsbDevice, _cfg: &DriverConfig) -> Result<()> {
        claim_interface(dev, self.plan.interface)
    }

    fn needs_handshake(&self) -> bool {
        true
    }

    fn handshake(&mut self, dev: &mut dyn UsbDevice, cfg: &DriverConfig) -> Result<()> {
        let out = self.plan.output.ok_or_else(|| Error::HandshakeFailed {
            step: "setup",
            reason: "no interrupt OUT endpoint".into(),
        })?;
        info!("Initializing SwitchPro gamepad");
        for (name, step) in sequence(cfg.player) {
            self.run_step(dev, cfg, out, name, &step)?;
        }
        Ok(())
    }

    fn normalize(&self, report: &[u8]) -> Normalized {
        let payload = match report {
            [STANDARD_INPUT_REPORT, payload @ ..] if payload.len() >= 5 => payload,
            _ => return Normalized::NoEvent,
        };
        let mut b = match payload[2] {
            0x01 => ButtonState::Y,
            0x02 => ButtonState::X,
            0x04 => ButtonState::B,
            0x08 => ButtonState::A,
            _ => ButtonState::empty(),
        };
        let menu = payload[3];
        if menu & 0x01 != 0 {
            b |= ButtonState::SELECT;
        }
        if menu & 0x02 != 0 {
            b |= ButtonState::START;
        }
        let left = payload[4];
        for (mask, button) in [
            (0x01, ButtonState::DOWN),
            (0x02, ButtonState::UP),
            (0x04, ButtonState::RIGHT),
            (0x08, ButtonState::LEFT),
            (0x40, ButtonState::L),
        ] {
            if left & mask != 0 {
                b |= button;
            }
        }
        Normalized::Buttons(b)
    }

    fn polling_policy(&self) -> PollingPolicy {
        PollingPolicy::for_plan(&self.plan, ReportWindow::Spans(BUTTON_BYTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UsbSpeed;

    fn adapter() -> SwitchProAdapter {
        SwitchProAdapter::new(EndpointPlan {
            interface: 0,
            input: 0x81,
            output: Some(0x02),
            interval: 8,
            max_packet: 64,
            speed: UsbSpeed::Full,
        })
    }

    fn report(face: u8, menu: u8, left: u8) -> Vec<u8> {
        let mut r = vec![0u8; 64];
        r[0] = 0x30;
        r[1] = 0x5a;
        r[3] = face;
        r[4] = menu;
        r[5] = left;
        r
    }

    #[test]
    fn face_selector_is_exclusive() {
        let a = adapter();
        assert_eq!(a.normalize(&report(0x08, 0, 0)), Normalized::Buttons(ButtonState::A));
        assert_eq!(a.normalize(&report(0x01, 0, 0)), Normalized::Buttons(ButtonState::Y));
        assert_eq!(a.normalize(&report(0x0c, 0, 0)), Normalized::Buttons(ButtonState::empty()));
    }

    #[test]
    fn menu_and_dpad_bits() {
        let got = adapter().normalize(&report(0x04, 0x02, 0x42));
        assert_eq!(
            got,
            Normalized::Buttons(ButtonState::B | ButtonState::START | ButtonState::UP | ButtonState::L)
        );
    }

    #[test]
    fn other_report_ids_are_ignored() {
        let mut r = report(0x08, 0x03, 0x0f);
        r[0] = 0x21;
        assert_eq!(adapter().normalize(&r), Normalized::NoEvent);
        assert_eq!(adapter().normalize(&[0x30, 0, 0]), Normalized::NoEvent);
    }

    #[test]
    fn subcommand_frame_layout() {
        let step = Step::Subcommand { id: 0x38, args: vec![0x0F, 0xF0, 0x00] };
        assert_eq!(
            step.encode(0x13),
            vec![0x01, 0x03, 0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40, 0x38, 0x0F, 0xF0, 0x00]
        );
    }

    #[test]
    fn ack_matching() {
        let usb = Step::Usb { cmd: 0x02, strict: true };
        assert!(usb.is_ack(&[0x81, 0x02, 0x00]));
        assert!(!usb.is_ack(&[0x81, 0x01]));
        let mut reply = vec![0u8; 20];
        reply[0] = 0x21;
        reply[14] = 0x30;
        assert!(Step::Subcommand { id: 0x30, args: vec![1] }.is_ack(&reply));
        assert!(!Step::Subcommand { id: 0x38, args: vec![] }.is_ack(&reply));
    }

    #[test]
    fn sequence_has_eight_steps() {
        let seq = sequence(2);
        assert_eq!(seq.len(), 8);
        assert_eq!(
            seq[6].1,
            Step::Subcommand { id: 0x30, args: vec![0x02] }
        );
    }
}
