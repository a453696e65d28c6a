//! Reference captures of real devices.
//!
//! Each [`DeviceCapture`] records the vid:pid, class triples, endpoint layout
//! and HID report descriptors of a device that was plugged in and dumped.
//! Captures render to descriptor bytes and to a scripted
//! [`VirtualDevice`], so the whole read → parse → classify path can run
//! without hardware.

use crate::backends::VirtualDevice;
use crate::config::DriverConfig;
use crate::descriptor::{Descriptor, DESC_CONFIGURATION, DESC_DEVICE, DESC_ENDPOINT, DESC_HID, DESC_HID_REPORT, DESC_INTERFACE};
use crate::device::UsbSpeed;
use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointCapture {
    pub address: u8,
    pub interval: u8,
    pub max_packet: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceCapture {
    /// `(class, subclass, protocol)`
    pub class: (u8, u8, u8),
    pub endpoints: Vec<EndpointCapture>,
    pub hid_report: Option<Vec<u8>>,
    /// Class-specific blocks emitted right after the interface descriptor.
    pub extra: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCapture {
    pub name: &'static str,
    pub vid: u16,
    pub pid: u16,
    pub bcd_device: u16,
    pub class: (u8, u8, u8),
    pub speed: UsbSpeed,
    pub interfaces: Vec<InterfaceCapture>,
    /// Tag the classifier is expected to assign.
    pub expected_tag: &'static str,
}

fn ep(address: u8, interval: u8, max_packet: u16) -> EndpointCapture {
    EndpointCapture {
        address,
        interval,
        max_packet,
    }
}

fn iface(class: (u8, u8, u8), endpoints: Vec<EndpointCapture>, hid_report: Option<&str>) -> InterfaceCapture {
    InterfaceCapture {
        class,
        endpoints,
        hid_report: hid_report.map(hex),
        extra: Vec::new(),
    }
}

/// Parse whitespace separated hex byte pairs.
pub fn hex(s: &str) -> Vec<u8> {
    s.split_whitespace()
        .filter_map(|b| u8::from_str_radix(b, 16).ok())
        .collect()
}

impl DeviceCapture {
    pub fn device_descriptor_bytes(&self) -> Vec<u8> {
        let [vid_lo, vid_hi] = self.vid.to_le_bytes();
        let [pid_lo, pid_hi] = self.pid.to_le_bytes();
        let [bcd_lo, bcd_hi] = self.bcd_device.to_le_bytes();
        let (class, subclass, protocol) = self.class;
        vec![
            18, DESC_DEVICE, 0x00, 0x02, class, subclass, protocol, 64, vid_lo, vid_hi, pid_lo,
            pid_hi, bcd_lo, bcd_hi, 1, 2, 3, 1,
        ]
    }

    /// Full configuration blob: header, then each interface followed by its
    /// HID (or vendor) blocks and endpoints.
    pub fn configuration_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (number, i) in self.interfaces.iter().enumerate() {
            let (class, subclass, protocol) = i.class;
            body.extend_from_slice(&[
                9,
                DESC_INTERFACE,
                number as u8,
                0,
                i.endpoints.len() as u8,
                class,
                subclass,
                protocol,
                0,
            ]);
            for block in &i.extra {
                body.extend_from_slice(block);
            }
            if let Some(report) = &i.hid_report {
                let [lo, hi] = (report.len() as u16).to_le_bytes();
                body.extend_from_slice(&[9, DESC_HID, 0x11, 0x01, 0x00, 0x01, DESC_HID_REPORT, lo, hi]);
            }
            for e in &i.endpoints {
                let [lo, hi] = e.max_packet.to_le_bytes();
                body.extend_from_slice(&[7, DESC_ENDPOINT, e.address, 0x03, lo, hi, e.interval]);
            }
        }
        let total = (9 + body.len()) as u16;
        let [lo, hi] = total.to_le_bytes();
        let mut blob = vec![
            9,
            DESC_CONFIGURATION,
            lo,
            hi,
            self.interfaces.len() as u8,
            1,
            0,
            0x80,
            250,
        ];
        blob.extend(body);
        blob
    }

    /// A scripted device that serves this capture's descriptors.
    pub fn into_virtual(&self) -> VirtualDevice {
        let mut dev = VirtualDevice::new(
            self.speed,
            self.device_descriptor_bytes(),
            self.configuration_bytes(),
        );
        for (number, i) in self.interfaces.iter().enumerate() {
            if let Some(report) = &i.hid_report {
                dev = dev.with_hid_report(number as u8, report.clone());
            }
        }
        dev
    }

    /// Read this capture back through the descriptor parser.
    pub fn descriptor(&self) -> Result<Descriptor> {
        Descriptor::read(&mut self.into_virtual(), &DriverConfig::default())
    }
}

const XINPUT_VENDOR_BLOCK: &str = "11 21 00 01 01 25 81 14 00 00 00 00 13 02 08 00 00";

fn xinput_interfaces(out0: u8, if1: [u8; 2], if2: u8, out1_interval: u8) -> Vec<InterfaceCapture> {
    let mut int0 = iface(
        (0xFF, 0x5D, 0x01),
        vec![ep(0x81, 4, 32), ep(out0, 8, 32)],
        None,
    );
    int0.extra.push(hex(XINPUT_VENDOR_BLOCK));
    vec![
        int0,
        iface(
            (0xFF, 0x5D, 0x03),
            vec![ep(if1[0], 2, 32), ep(if1[1], out1_interval, 32)],
            None,
        ),
        iface((0xFF, 0x5D, 0x02), vec![ep(if2, 16, 32)], None),
        iface((0xFF, 0xFD, 0x13), Vec::new(), None),
    ]
}

const SWITCH_MODE_REPORT: &str = "
    05 01 15 00 09 04 a1 01 85 30 05 01 05 09 19 01 29 0a 15 00 25 01 75 01
    95 0a 55 00 65 00 81 02 05 09 19 0b 29 0e 15 00 25 01 75 01 95 04 81 02
    75 01 95 02 81 03 0b 01 00 01 00 a1 00 0b 30 00 01 00 0b 31 00 01 00 0b
    32 00 01 00 0b 35 00 01 00 15 00 27 ff ff 00 00 75 10 95 04 81 02 c0 0b
    39 00 01 00 15 00 25 07 35 00 46 3b 01 65 14 75 04 95 01 81 02 05 09 19
    0f 29 12 15 00 25 01 75 01 95 04 81 02 75 08 95 34 81 03 06 00 ff 85 21
    09 01 75 08 95 3f 81 03 85 81 09 02 75 08 95 3f 81 03 85 01 09 03 75 08
    95 3f 91 83 85 10 09 04 75 08 95 3f 91 83 85 80 09 05 75 08 95 3f 91 83
    85 82 09 06 75 08 95 3f 91 83 c0";

pub fn compact_keyboard() -> DeviceCapture {
    DeviceCapture {
        name: "Compact Keyboard",
        vid: 0x2222,
        pid: 0x0099,
        bcd_device: 0x0110,
        class: (0, 0, 0),
        speed: UsbSpeed::Low,
        interfaces: vec![
            iface(
                (0x03, 0x01, 0x01),
                vec![ep(0x81, 10, 8)],
                Some(
                    "05 01 09 06 a1 01 05 08 19 01 29 03 15 00 25 01 75 01 95 03 91 02 95 05
                     91 01 05 07 19 e0 29 e7 95 08 81 02 75 08 95 01 81 01 19 00 2a ff 00 26
                     ff 00 95 06 81 00 c0",
                ),
            ),
            iface(
                (0x03, 0x00, 0x00),
                vec![ep(0x82, 10, 8)],
                Some(
                    "05 0c 09 01 a1 01 85 01 19 00 2a 3c 02 15 00 26 3c 02 95 01 75 10 81 00
                     c0 05 01 09 80 a1 01 85 02 19 81 29 83 25 01 75 01 95 03 81 02 95 05 81
                     01 c0",
                ),
            ),
        ],
        expected_tag: "BootKeyboard",
    }
}

pub fn cheap_mouse() -> DeviceCapture {
    DeviceCapture {
        name: "Cheap Mouse",
        vid: 0x413C,
        pid: 0x301A,
        bcd_device: 0x0100,
        class: (0, 0, 0),
        speed: UsbSpeed::Low,
        interfaces: vec![iface(
            (0x03, 0x01, 0x02),
            vec![ep(0x81, 10, 4)],
            Some(
                "05 01 09 02 a1 01 09 01 a1 00 05 09 19 01 29 03 15 00 25 01 75 01 95 03
                 81 02 75 05 95 01 81 03 06 00 ff 09 40 95 02 75 08 15 81 25 7f 81 02 05
                 01 09 38 15 81 25 7f 75 08 95 01 81 06 09 30 09 31 16 01 80 26 ff 7f 75
                 10 95 02 81 06 c0 c0",
            ),
        )],
        expected_tag: "BootMouse",
    }
}

pub fn powera_wired() -> DeviceCapture {
    DeviceCapture {
        name: "PowerA Wired Controller",
        vid: 0x20D6,
        pid: 0xA711,
        bcd_device: 0x0200,
        class: (0, 0, 0),
        speed: UsbSpeed::Full,
        interfaces: vec![iface(
            (0x03, 0x00, 0x00),
            vec![ep(0x02, 5, 64), ep(0x81, 5, 64)],
            Some(
                "05 01 09 05 a1 01 15 00 25 01 35 00 45 01 75 01 95 0e 05 09 19 01 29 0e
                 81 02 95 02 81 01 05 01 25 07 46 3b 01 75 04 95 01 65 14 09 39 81 42 65
                 00 95 01 81 01 26 ff 00 46 ff 00 09 30 09 31 09 32 09 35 75 08 95 04 81
                 02 75 08 95 01 81 01 05 0c 09 00 15 80 25 7f 75 08 95 40 b1 02 c0",
            ),
        )],
        expected_tag: "PowerA",
    }
}

/// 8BitDo Ultimate Bluetooth adapter, Switch Pro compatible mode.
pub fn ultimate_bt() -> DeviceCapture {
    DeviceCapture {
        name: "8BitDo Ultimate Bluetooth Adapter",
        vid: 0x057E,
        pid: 0x2009,
        bcd_device: 0x0210,
        class: (0, 0, 0),
        speed: UsbSpeed::Full,
        interfaces: vec![iface(
            (0x03, 0x00, 0x00),
            vec![ep(0x81, 8, 64), ep(0x02, 8, 64)],
            Some(SWITCH_MODE_REPORT),
        )],
        expected_tag: "SwitchPro",
    }
}

pub fn zero2() -> DeviceCapture {
    DeviceCapture {
        name: "8BitDo Zero 2",
        vid: 0x2DC8,
        pid: 0x9018,
        bcd_device: 0x0100,
        class: (0, 0, 0),
        speed: UsbSpeed::Full,
        interfaces: vec![iface(
            (0x03, 0x00, 0x00),
            vec![ep(0x81, 1, 64), ep(0x02, 1, 64)],
            Some(
                "05 01 09 05 a1 01 15 00 25 01 35 00 45 01 75 01 95 0f 05 09 19 01 29 0f
                 81 02 95 01 81 01 05 01 25 07 46 3b 01 75 04 95 01 65 14 09 39 81 42 65
                 00 95 01 81 01 26 ff 00 46 ff 00 09 30 09 31 09 32 09 35 75 08 95 04 81
                 02 65 00 75 08 95 02 81 01 05 08 09 43 15 00 26 ff 00 35 00 46 ff 00 75
                 08 95 02 91 82 09 44 91 82 09 45 91 82 09 46 91 82 c0",
            ),
        )],
        expected_tag: "Zero2",
    }
}

pub fn sn30_pro_bt_dinput() -> DeviceCapture {
    DeviceCapture {
        name: "8BitDo SN30 Pro Bluetooth (DInput)",
        vid: 0x2DC8,
        pid: 0x6001,
        bcd_device: 0x0100,
        class: (0, 0, 0),
        speed: UsbSpeed::Full,
        interfaces: vec![iface(
            (0x03, 0x00, 0x00),
            vec![ep(0x81, 1, 64), ep(0x02, 1, 64)],
            Some(
                "05 01 09 05 a1 01 85 03 05 01 15 00 25 07 46 3b 01 95 01 75 04 65 14 09
                 39 81 42 75 01 95 04 81 01 15 00 26 ff 00 09 30 09 31 09 32 09 35 95 04
                 75 08 81 02 05 02 15 00 26 ff 00 09 c4 09 c5 95 02 75 08 81 02 05 09 19
                 01 29 10 15 00 25 01 75 01 95 10 81 02 05 06 09 20 15 00 25 64 75 08 95
                 01 81 02 05 0f 09 70 85 05 15 00 25 64 75 08 95 04 91 02 85 02 09 02 75
                 08 95 3f 81 03 85 81 09 03 75 08 95 3f 91 83 c0",
            ),
        )],
        expected_tag: "SN30ProDInput",
    }
}

pub fn sn30_pro_bt_switch() -> DeviceCapture {
    DeviceCapture {
        name: "8BitDo SN30 Pro Bluetooth (Switch)",
        bcd_device: 0x0211,
        ..ultimate_bt()
    }
}

pub fn sn30_pro_bt_xinput() -> DeviceCapture {
    DeviceCapture {
        name: "8BitDo SN30 Pro Bluetooth (XInput)",
        vid: 0x045E,
        pid: 0x028E,
        bcd_device: 0x0114,
        class: (0xFF, 0xFF, 0xFF),
        speed: UsbSpeed::Full,
        interfaces: xinput_interfaces(0x01, [0x82, 0x02], 0x84, 8),
        expected_tag: "XInput",
    }
}

/// 8BitDo SN30 Pro USB, the wired XInput model.
pub fn sn30_pro_usb() -> DeviceCapture {
    DeviceCapture {
        name: "8BitDo SN30 Pro USB",
        bcd_device: 0x0110,
        interfaces: xinput_interfaces(0x02, [0x83, 0x04], 0x86, 4),
        ..sn30_pro_bt_xinput()
    }
}

/// Every reference capture.
pub fn all() -> Vec<DeviceCapture> {
    vec![
        compact_keyboard(),
        cheap_mouse(),
        powera_wired(),
        ultimate_bt(),
        zero2(),
        sn30_pro_bt_dinput(),
        sn30_pro_bt_switch(),
        sn30_pro_bt_xinput(),
        sn30_pro_usb(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::split_into_subdescriptors;

    #[test]
    fn configuration_total_length_matches() {
        for capture in all() {
            let blob = capture.configuration_bytes();
            let total = usize::from(u16::from_le_bytes([blob[2], blob[3]]));
            assert_eq!(total, blob.len(), "{}", capture.name);
            let joined: Vec<u8> = split_into_subdescriptors(&blob).unwrap().concat();
            assert_eq!(joined, blob);
        }
    }

    #[test]
    fn hid_reports_are_fetched() {
        let desc = powera_wired().descriptor().unwrap();
        let int0 = desc.interface0().unwrap();
        let report = int0.report_descriptors().next().unwrap();
        assert_eq!(&report[..4], &[0x05, 0x01, 0x09, 0x05]);
    }

    #[test]
    fn xinput_vendor_block_is_not_parsed_as_hid() {
        let desc = sn30_pro_usb().descriptor().unwrap();
        assert_eq!(desc.interfaces.len(), 4);
        assert!(desc.interfaces.iter().all(|i| i.hid.is_empty()));
    }

    #[test]
    fn fingerprints_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for capture in all() {
            assert!(seen.insert(capture.device_descriptor_bytes()), "{}", capture.name);
        }
    }
}
