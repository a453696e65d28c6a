//! Device classifier.
//!
//! Maps parsed descriptors to a [`DeviceKind`]. Rules run in a fixed priority
//! order and the first match wins, because several kinds share generic
//! signatures:
//!
//! 1. fingerprint already cached: [`Classification::Skip`]
//! 2. exact vid:pid in [`KNOWN_DEVICES`]
//! 3. XInput signature: device `(ff,ff,ff)`, interface 0 `(ff,5d,01)`, exactly 4 interfaces
//! 4. device class `00` with interface 0 `(03,00,00)`: generic HID composite
//! 5. interface 0 `(03,01,01)` / `(03,01,02)`: boot keyboard / boot mouse
//! 6. anything else: unclassified
//!
//! Rule 4 is a heuristic. A composite HID interface might be a gamepad or might
//! not; the report descriptor's application usage is logged for diagnosis but
//! does not change the result.

use crate::descriptor::{ClassTriple, Descriptor, DeviceDescriptor, InterfaceDescriptor, DEVICE_DESCRIPTOR_LEN};
use crate::device::UsbSpeed;
use crate::hid_report;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

const XINPUT_DEVICE_CLASS: ClassTriple = ClassTriple(0xFF, 0xFF, 0xFF);
const XINPUT_INTERFACE0: ClassTriple = ClassTriple(0xFF, 0x5D, 0x01);
const XINPUT_INTERFACE_COUNT: u8 = 4;
const HID_COMPOSITE: ClassTriple = ClassTriple(0x03, 0x00, 0x00);
const BOOT_KEYBOARD: ClassTriple = ClassTriple(0x03, 0x01, 0x01);
const BOOT_MOUSE: ClassTriple = ClassTriple(0x03, 0x01, 0x02);

/// Gamepads with a hand-mapped report layout, matched by exact vid:pid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NamedVariant {
    /// PowerA wired controller sold for the Switch.
    PowerAWired,
    /// 8BitDo Zero 2 over USB-C.
    Zero2,
    /// 8BitDo SN30 Pro in DInput mode.
    Sn30ProDinput,
}

impl NamedVariant {
    pub fn tag(self) -> &'static str {
        match self {
            NamedVariant::PowerAWired => "PowerA",
            NamedVariant::Zero2 => "Zero2",
            NamedVariant::Sn30ProDinput => "SN30ProDInput",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownDevice {
    SwitchPro,
    Named(NamedVariant),
}

/// Static vid:pid table, checked before any class-based rule.
pub const KNOWN_DEVICES: &[(u16, u16, KnownDevice)] = &[
    (0x057E, 0x2009, KnownDevice::SwitchPro),
    (0x20D6, 0xA711, KnownDevice::Named(NamedVariant::PowerAWired)),
    (0x2DC8, 0x9018, KnownDevice::Named(NamedVariant::Zero2)),
    (0x2DC8, 0x6001, KnownDevice::Named(NamedVariant::Sn30ProDinput)),
];

pub fn lookup_known(vid: u16, pid: u16) -> Option<KnownDevice> {
    KNOWN_DEVICES
        .iter()
        .find(|(v, p, _)| *v == vid && *p == pid)
        .map(|(_, _, k)| *k)
}

/// Endpoints and timing an adapter needs to drive interface 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EndpointPlan {
    pub interface: u8,
    /// Interrupt IN endpoint address.
    pub input: u8,
    /// Interrupt OUT endpoint address, if the interface has one.
    pub output: Option<u8>,
    /// Raw `bInterval` of the IN endpoint.
    pub interval: u8,
    pub max_packet: u16,
    pub speed: UsbSpeed,
}

impl EndpointPlan {
    pub fn from_interface(iface: &InterfaceDescriptor, speed: UsbSpeed) -> Option<Self> {
        let input = iface.interrupt_in()?;
        Some(Self {
            interface: iface.number,
            input: input.address,
            output: iface.interrupt_out().map(|e| e.address),
            interval: input.interval,
            max_packet: input.max_packet_size,
            speed,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    SwitchPro(EndpointPlan),
    XInput(EndpointPlan),
    NamedHid(NamedVariant, EndpointPlan),
    BootKeyboard(EndpointPlan),
    BootMouse(EndpointPlan),
    GenericHid(EndpointPlan),
    Unclassified,
}

impl DeviceKind {
    pub fn tag(&self) -> &'static str {
        match self {
            DeviceKind::SwitchPro(_) => "SwitchPro",
            DeviceKind::XInput(_) => "XInput",
            DeviceKind::NamedHid(v, _) => v.tag(),
            DeviceKind::BootKeyboard(_) => "BootKeyboard",
            DeviceKind::BootMouse(_) => "BootMouse",
            DeviceKind::GenericHid(_) => "HID",
            DeviceKind::Unclassified => "Unclassified",
        }
    }

    pub fn plan(&self) -> Option<&EndpointPlan> {
        match self {
            DeviceKind::SwitchPro(p)
            | DeviceKind::XInput(p)
            | DeviceKind::NamedHid(_, p)
            | DeviceKind::BootKeyboard(p)
            | DeviceKind::BootMouse(p)
            | DeviceKind::GenericHid(p) => Some(p),
            DeviceKind::Unclassified => None,
        }
    }

    /// `true` for kinds normalized to a [`ButtonState`](crate::buttons::ButtonState).
    pub fn is_gamepad(&self) -> bool {
        matches!(
            self,
            DeviceKind::SwitchPro(_) | DeviceKind::XInput(_) | DeviceKind::NamedHid(..)
        )
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Kind(DeviceKind),
    /// Already seen during this scan session.
    Skip,
}

/// Cache key: the raw device descriptor bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceFingerprint([u8; DEVICE_DESCRIPTOR_LEN]);

impl DeviceFingerprint {
    pub fn of(device: &DeviceDescriptor) -> Self {
        Self(*device.raw())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Devices already classified during the current scan session.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    seen: HashSet<DeviceFingerprint>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fp: &DeviceFingerprint) -> bool {
        self.seen.contains(fp)
    }

    /// Returns `false` if the fingerprint was already present.
    pub fn insert(&mut self, fp: DeviceFingerprint) -> bool {
        self.seen.insert(fp)
    }

    pub fn clear(&mut self) {
        if !self.seen.is_empty() {
            debug!(entries = self.seen.len(), "clearing device cache");
        }
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Classify a device, recording its fingerprint.
pub fn classify(desc: &Descriptor, cache: &mut FingerprintCache) -> Classification {
    let fp = DeviceFingerprint::of(&desc.device);
    if !cache.insert(fp) {
        debug!("Ignoring cached device");
        return Classification::Skip;
    }
    let kind = identify(desc);
    log_kind(desc, &kind);
    Classification::Kind(kind)
}

/// Unclassified devices are ignored, so they only show up at debug level.
pub(crate) fn log_kind(desc: &Descriptor, kind: &DeviceKind) {
    let (vid, pid) = desc.vid_pid();
    match kind {
        DeviceKind::Unclassified => debug!(
            vid = format_args!("{vid:04x}"),
            pid = format_args!("{pid:04x}"),
            "unclassified device"
        ),
        _ => info!(
            vid = format_args!("{vid:04x}"),
            pid = format_args!("{pid:04x}"),
            kind = kind.tag(),
            "classified device"
        ),
    }
}

/// Apply the classification rules without touching any cache.
pub fn identify(desc: &Descriptor) -> DeviceKind {
    let (vid, pid) = desc.vid_pid();
    let dev = desc.device.class_triple();
    let int0 = desc.interface0();
    let int0_triple = desc.interface0_triple();

    let plan = || {
        let p = int0.and_then(|i| EndpointPlan::from_interface(i, desc.speed));
        if p.is_none() {
            warn!(
                vid = format_args!("{vid:04x}"),
                pid = format_args!("{pid:04x}"),
                "interface 0 has no interrupt IN endpoint"
            );
        }
        p
    };

    if let Some(known) = lookup_known(vid, pid) {
        return match (known, plan()) {
            (KnownDevice::SwitchPro, Some(p)) => DeviceKind::SwitchPro(p),
            (KnownDevice::Named(v), Some(p)) => DeviceKind::NamedHid(v, p),
            (_, None) => DeviceKind::Unclassified,
        };
    }

    if dev == XINPUT_DEVICE_CLASS
        && int0_triple == Some(XINPUT_INTERFACE0)
        && desc.config.num_interfaces == XINPUT_INTERFACE_COUNT
    {
        return plan().map_or(DeviceKind::Unclassified, DeviceKind::XInput);
    }

    if dev.0 == 0x00 && int0_triple == Some(HID_COMPOSITE) {
        if let Some(report) = int0.and_then(|i| i.report_descriptors().next()) {
            match hid_report::parse(report) {
                Ok(r) => debug!(
                    gamepad_usage = r.declares_gamepad(),
                    "composite HID report descriptor:\n{}",
                    r.dump(8)
                ),
                Err(e) => debug!(error = %e, "could not parse HID report descriptor"),
            }
        }
        return plan().map_or(DeviceKind::Unclassified, DeviceKind::GenericHid);
    }

    match int0_triple {
        Some(BOOT_KEYBOARD) => plan().map_or(DeviceKind::Unclassified, DeviceKind::BootKeyboard),
        Some(BOOT_MOUSE) => plan().map_or(DeviceKind::Unclassified, DeviceKind::BootMouse),
        _ => DeviceKind::Unclassified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn kind_of(capture: &fixtures::DeviceCapture) -> DeviceKind {
        identify(&capture.descriptor().unwrap())
    }

    #[test]
    fn known_table_beats_class_rules() {
        // The Switch-mode adapter looks like a composite HID device.
        assert!(matches!(
            kind_of(&fixtures::ultimate_bt()),
            DeviceKind::SwitchPro(_)
        ));
        assert!(matches!(
            kind_of(&fixtures::powera_wired()),
            DeviceKind::NamedHid(NamedVariant::PowerAWired, _)
        ));
    }

    #[test]
    fn xinput_needs_four_interfaces() {
        let mut capture = fixtures::sn30_pro_usb();
        assert!(matches!(kind_of(&capture), DeviceKind::XInput(_)));
        capture.interfaces.truncate(3);
        assert_eq!(kind_of(&capture), DeviceKind::Unclassified);
    }

    #[test]
    fn xinput_plan_uses_interface0_endpoints() {
        let DeviceKind::XInput(plan) = kind_of(&fixtures::sn30_pro_usb()) else {
            panic!("expected XInput");
        };
        assert_eq!(plan.input, 0x81);
        assert_eq!(plan.output, Some(0x02));
        assert_eq!(plan.interface, 0);
    }

    #[test]
    fn second_classification_is_skipped() {
        let desc = fixtures::compact_keyboard().descriptor().unwrap();
        let mut cache = FingerprintCache::new();
        assert!(matches!(
            classify(&desc, &mut cache),
            Classification::Kind(DeviceKind::BootKeyboard(_))
        ));
        assert_eq!(classify(&desc, &mut cache), Classification::Skip);
        cache.clear();
        assert!(matches!(classify(&desc, &mut cache), Classification::Kind(_)));
    }

    #[test]
    fn unclassified_devices_are_cached_too() {
        let mut capture = fixtures::cheap_mouse();
        capture.interfaces[0].class = (0x08, 0x06, 0x50);
        let desc = capture.descriptor().unwrap();
        let mut cache = FingerprintCache::new();
        assert_eq!(
            classify(&desc, &mut cache),
            Classification::Kind(DeviceKind::Unclassified)
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_interrupt_in_is_unclassified() {
        let mut capture = fixtures::cheap_mouse();
        capture.interfaces[0].endpoints.clear();
        assert_eq!(kind_of(&capture), DeviceKind::Unclassified);
    }
}
