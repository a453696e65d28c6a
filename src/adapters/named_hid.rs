//! Hand-mapped HID gamepads.
//!
//! These devices are matched by exact vid:pid and decoded from fixed byte
//! offsets found by pressing buttons and watching the reports, not from their
//! report descriptors. Each device is a [`HidLayout`] table; supporting
//! another pad means adding a table.

use super::{claim_interface, Normalized, PollingPolicy, ProtocolAdapter, ReportWindow};
use crate::buttons::ButtonState;
use crate::classify::{EndpointPlan, NamedVariant};
use crate::config::DriverConfig;
use crate::device::UsbDevice;
use crate::error::Result;

/// `report[byte] & mask != 0` means `button` is pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonBit {
    pub byte: usize,
    pub mask: u8,
    pub button: ButtonState,
}

const fn bit(byte: usize, mask: u8, button: ButtonState) -> ButtonBit {
    ButtonBit { byte, mask, button }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DpadEncoding {
    /// Hat switch in the low nibble of `byte`: 0 = up, clockwise, 8+ = centered.
    Hat { byte: usize },
    /// Two axis bytes, `0x00` = left/up, `0xFF` = right/down, anything else centered.
    AxisPair { x: usize, y: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportLength {
    AtLeast(usize),
    /// Reports of any other length are not input reports.
    Exactly(usize),
}

impl ReportLength {
    fn accepts(self, len: usize) -> bool {
        match self {
            ReportLength::AtLeast(n) => len >= n,
            ReportLength::Exactly(n) => len == n,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HidLayout {
    pub variant: NamedVariant,
    /// Expected value of byte 0, if reports carry an ID.
    pub report_id: Option<u8>,
    pub length: ReportLength,
    pub dpad: DpadEncoding,
    pub buttons: &'static [ButtonBit],
    /// Bytes compared for change detection.
    pub window: &'static [(usize, usize)],
}

impl HidLayout {
    pub fn decode(&self, report: &[u8]) -> Option<ButtonState> {
        if !self.length.accepts(report.len()) {
            return None;
        }
        if let Some(id) = self.report_id {
            if report.first() != Some(&id) {
                return None;
            }
        }
        let mut state = match self.dpad {
            DpadEncoding::Hat { byte } => ButtonState::from_hat(report.get(byte)? & 0x0F),
            DpadEncoding::AxisPair { x, y } => {
                let mut d = ButtonState::empty();
                match report.get(x)? {
                    0x00 => d |= ButtonState::LEFT,
                    0xFF => d |= ButtonState::RIGHT,
                    _ => {}
                }
                match report.get(y)? {
                    0x00 => d |= ButtonState::UP,
                    0xFF => d |= ButtonState::DOWN,
                    _ => {}
                }
                d
            }
        };
        for b in self.buttons {
            if report.get(b.byte)? & b.mask != 0 {
                state |= b.button;
            }
        }
        Some(state)
    }
}

/// PowerA wired controller, from the `fixtures::powera_wired` capture
/// (20d6:a711). Its report descriptor declares 14 one-bit buttons in bytes
/// 0-1, a 4-bit hat switch in the low nibble of byte 2 and four 8-bit axes
/// in bytes 3-6. The button order within those bits is Y B A X L R ZL ZR,
/// then Minus Plus LS RS Home, the Switch-style order this pad reports. ZL
/// and ZR have no `ButtonState` bit.
pub const POWERA_WIRED: HidLayout = HidLayout {
    variant: NamedVariant::PowerAWired,
    report_id: None,
    length: ReportLength::AtLeast(3),
    dpad: DpadEncoding::Hat { byte: 2 },
    buttons: &[
        bit(0, 0x01, ButtonState::Y),
        bit(0, 0x02, ButtonState::B),
        bit(0, 0x04, ButtonState::A),
        bit(0, 0x08, ButtonState::X),
        bit(0, 0x10, ButtonState::L),
        bit(0, 0x20, ButtonState::R),
        bit(1, 0x01, ButtonState::SELECT),
        bit(1, 0x02, ButtonState::START),
        bit(1, 0x04, ButtonState::L3),
        bit(1, 0x08, ButtonState::R3),
        bit(1, 0x10, ButtonState::HOME),
    ],
    window: &[(0, 3)],
};

/// 8BitDo Zero 2 over USB-C, from the `fixtures::zero2` capture (2dc8:9018).
/// The report descriptor declares 15 buttons in bytes 0-1, a hat in byte 2
/// and X/Y/Z/Rz in bytes 3-6, but the pad leaves the hat neutral and drives
/// the d-pad through X (byte 3) and Y (byte 4) instead. Reports alternate
/// between 8 and 24 bytes; only the 8-byte ones carry input. These offsets
/// were read off live reports, not derived from the descriptor.
pub const ZERO2: HidLayout = HidLayout {
    variant: NamedVariant::Zero2,
    report_id: None,
    length: ReportLength::Exactly(8),
    dpad: DpadEncoding::AxisPair { x: 3, y: 4 },
    buttons: &[
        bit(0, 0x01, ButtonState::A),
        bit(0, 0x02, ButtonState::B),
        bit(0, 0x08, ButtonState::X),
        bit(0, 0x10, ButtonState::Y),
        bit(0, 0x40, ButtonState::L),
        bit(0, 0x80, ButtonState::R),
        bit(1, 0x04, ButtonState::SELECT),
        bit(1, 0x08, ButtonState::START),
    ],
    window: &[(0, 2), (3, 5)],
};

/// 8BitDo SN30 Pro over USB-C in DInput mode, from the
/// `fixtures::sn30_pro_bt_dinput` capture (2dc8:6001). Input report 0x03
/// carries the report ID in byte 0, a 4-bit hat in byte 1, four stick axes in
/// bytes 2-5, two trigger axes in bytes 6-7 and 16 buttons in bytes 8-9, as
/// its report descriptor declares.
pub const SN30_PRO_DINPUT: HidLayout = HidLayout {
    variant: NamedVariant::Sn30ProDinput,
    report_id: Some(0x03),
    length: ReportLength::AtLeast(10),
    dpad: DpadEncoding::Hat { byte: 1 },
    buttons: &[
        bit(8, 0x01, ButtonState::A),
        bit(8, 0x02, ButtonState::B),
        bit(8, 0x08, ButtonState::X),
        bit(8, 0x10, ButtonState::Y),
        bit(8, 0x40, ButtonState::L),
        bit(8, 0x80, ButtonState::R),
        bit(9, 0x04, ButtonState::SELECT),
        bit(9, 0x08, ButtonState::START),
        bit(9, 0x10, ButtonState::HOME),
        bit(9, 0x20, ButtonState::L3),
        bit(9, 0x40, ButtonState::R3),
    ],
    window: &[(0, 2), (8, 10)],
};

pub fn layout_for(variant: NamedVariant) -> &'static HidLayout {
    match variant {
        NamedVariant::PowerAWired => &POWERA_WIRED,
        NamedVariant::Zero2 => &ZERO2,
        NamedVariant::Sn30ProDinput => &SN30_PRO_DINPUT,
    }
}

pub struct NamedHidAdapter {
    layout: &'static HidLayout,
    plan: EndpointPlan,
}

impl NamedHidAdapter {
    pub fn new(layout: &'static HidLayout, plan: EndpointPlan) -> Self {
        Self { layout, plan }
    }
}

impl ProtocolAdapter for NamedHidAdapter {
    fn name(&self) -> &'static str {
        self.layout.variant.tag()
    }

    fn initialize(&mut self, dev: &mut dyn UsbDevice, _cfg: &DriverConfig) -> Result<()> {
        claim_interface(dev, self.plan.interface)
    }

    fn normalize(&self, report: &[u8]) -> Normalized {
        self.layout
            .decode(report)
            .map_or(Normalized::NoEvent, Normalized::Buttons)
    }

    fn polling_policy(&self) -> PollingPolicy {
        PollingPolicy::for_plan(&self.plan, ReportWindow::Spans(self.layout.window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powera_buttons_and_hat() {
        let state = POWERA_WIRED.decode(&[0x04, 0x02, 0x02, 0x80, 0x80, 0x80, 0x80, 0x00]);
        assert_eq!(state, Some(ButtonState::A | ButtonState::START | ButtonState::RIGHT));
        let idle = POWERA_WIRED.decode(&[0x00, 0x00, 0x0f, 0x80, 0x80, 0x80, 0x80, 0x00]);
        assert_eq!(idle, Some(ButtonState::empty()));
    }

    #[test]
    fn zero2_axis_dpad() {
        let state = ZERO2.decode(&[0x01, 0x08, 0x00, 0x00, 0xff, 0x7f, 0x7f, 0x00]);
        assert_eq!(
            state,
            Some(ButtonState::A | ButtonState::START | ButtonState::LEFT | ButtonState::DOWN)
        );
        let centered = ZERO2.decode(&[0, 0, 0, 0x7f, 0x7f, 0x7f, 0x7f, 0]);
        assert_eq!(centered, Some(ButtonState::empty()));
    }

    #[test]
    fn zero2_ignores_long_reports() {
        assert_eq!(ZERO2.decode(&[0x01; 24]), None);
    }

    #[test]
    fn sn30_needs_report_id() {
        let mut r = [0u8; 12];
        r[0] = 0x03;
        r[1] = 0x06;
        r[8] = 0x01;
        r[9] = 0x10;
        assert_eq!(
            SN30_PRO_DINPUT.decode(&r),
            Some(ButtonState::LEFT | ButtonState::A | ButtonState::HOME)
        );
        r[0] = 0x02;
        assert_eq!(SN30_PRO_DINPUT.decode(&r), None);
    }
}
