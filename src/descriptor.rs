//! USB descriptor parser.
//!
//! Decodes the standard device / configuration / interface / endpoint blocks and
//! the HID class descriptor into typed records. Parsing is pure; the `read_*`
//! helpers and [`Descriptor::read`] issue the `GET_DESCRIPTOR` requests through a
//! [`UsbDevice`].
//!
//! ## Framing
//! A configuration blob is a run of sub-descriptors, each `[bLength, bDescriptorType, ...]`.
//! [`split_into_subdescriptors`] walks that framing; a zero length byte ends the
//! blob, a length running past the buffer is an error.
//!
//! ## Forward compatibility
//! [`parse_configuration`] dispatches on the `(bLength, bDescriptorType)` pair and
//! ignores anything it doesn't know. Endpoint and HID descriptors belong to the
//! most recent interface; one showing up before any interface is malformed.

use crate::config::DriverConfig;
use crate::device::{UsbDevice, UsbSpeed, REQUEST_GET_DESCRIPTOR, REQUEST_TYPE_INTERFACE_IN};
use crate::error::{Error, Result};
use std::fmt;
use tracing::{debug, trace, warn};

pub const DESC_DEVICE: u8 = 0x01;
pub const DESC_CONFIGURATION: u8 = 0x02;
pub const DESC_INTERFACE: u8 = 0x04;
pub const DESC_ENDPOINT: u8 = 0x05;
pub const DESC_HID: u8 = 0x21;
pub const DESC_HID_REPORT: u8 = 0x22;

pub const DEVICE_DESCRIPTOR_LEN: usize = 18;
const CONFIG_DESCRIPTOR_LEN: usize = 9;
const INTERFACE_DESCRIPTOR_LEN: usize = 9;
const ENDPOINT_DESCRIPTOR_LEN: usize = 7;
const HID_DESCRIPTOR_MIN_LEN: usize = 9;

/// A `(class, subclass, protocol)` triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ClassTriple(pub u8, pub u8, pub u8);

impl fmt::Display for ClassTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(0x{:02x}, 0x{:02x}, 0x{:02x})", self.0, self.1, self.2)
    }
}

/// Standard 18-byte device descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub bcd_usb: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    pub i_manufacturer: u8,
    pub i_product: u8,
    pub i_serial_number: u8,
    pub num_configurations: u8,
    raw: [u8; DEVICE_DESCRIPTOR_LEN],
}

impl DeviceDescriptor {
    /// The bytes this record was parsed from.
    pub fn raw(&self) -> &[u8; DEVICE_DESCRIPTOR_LEN] {
        &self.raw
    }

    pub fn class_triple(&self) -> ClassTriple {
        ClassTriple(self.class, self.subclass, self.protocol)
    }
}

/// Configuration descriptor header. Only the first configuration is inspected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub total_length: u16,
    pub num_interfaces: u8,
    /// Value passed to `SET_CONFIGURATION`.
    pub configuration_value: u8,
    pub attributes: u8,
    /// In units of 2 mA.
    pub max_power: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// High bit set = IN (device to host).
    pub address: u8,
    /// Low two bits: transfer type.
    pub attributes: u8,
    pub max_packet_size: u16,
    /// Raw `bInterval`. Milliseconds at low/full speed, 125 µs exponent at high speed.
    pub interval: u8,
}

impl EndpointDescriptor {
    pub fn is_in(&self) -> bool {
        self.address & 0x80 != 0
    }

    pub fn transfer_type(&self) -> TransferType {
        match self.attributes & 0x03 {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        self.transfer_type() == TransferType::Interrupt
    }
}

/// One `(bDescriptorType, wDescriptorLength)` entry of a HID descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HidSubDescriptor {
    pub descriptor_type: u8,
    pub length: u16,
    /// Fetched report descriptor bytes; `None` if not fetched or over the ceiling.
    pub report: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HidDescriptor {
    pub bcd_hid: u16,
    pub country_code: u8,
    pub subs: Vec<HidSubDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub endpoints: Vec<EndpointDescriptor>,
    pub hid: Vec<HidDescriptor>,
}

impl InterfaceDescriptor {
    pub fn class_triple(&self) -> ClassTriple {
        ClassTriple(self.class, self.subclass, self.protocol)
    }

    /// First interrupt IN endpoint.
    pub fn interrupt_in(&self) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.is_in() && e.is_interrupt())
    }

    /// First interrupt OUT endpoint.
    pub fn interrupt_out(&self) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| !e.is_in() && e.is_interrupt())
    }

    /// Fetched HID report descriptors attached to this interface.
    pub fn report_descriptors(&self) -> impl Iterator<Item = &[u8]> {
        self.hid
            .iter()
            .flat_map(|h| h.subs.iter())
            .filter_map(|s| s.report.as_deref())
    }
}

/// Parse an 18-byte device descriptor.
///
/// Fails on an all-zero block (seen right after a device connects) and on a
/// length byte other than 18.
pub fn parse_device_descriptor(bytes: &[u8]) -> Result<DeviceDescriptor> {
    let head = bytes.get(..DEVICE_DESCRIPTOR_LEN).unwrap_or(bytes);
    if head.iter().all(|&b| b == 0) {
        return Err(Error::malformed("empty device descriptor"));
    }
    let raw: [u8; DEVICE_DESCRIPTOR_LEN] = head.try_into().map_err(|_| {
        Error::malformed(format!(
            "device descriptor truncated to {} bytes",
            head.len()
        ))
    })?;
    if usize::from(raw[0]) != DEVICE_DESCRIPTOR_LEN {
        return Err(Error::malformed(format!(
            "bad device descriptor length: {}",
            raw[0]
        )));
    }
    Ok(DeviceDescriptor {
        bcd_usb: u16::from_le_bytes([raw[2], raw[3]]),
        class: raw[4],
        subclass: raw[5],
        protocol: raw[6],
        max_packet_size0: raw[7],
        vendor_id: u16::from_le_bytes([raw[8], raw[9]]),
        product_id: u16::from_le_bytes([raw[10], raw[11]]),
        bcd_device: u16::from_le_bytes([raw[12], raw[13]]),
        i_manufacturer: raw[14],
        i_product: raw[15],
        i_serial_number: raw[16],
        num_configurations: raw[17],
        raw,
    })
}

/// Split a configuration blob into its length-prefixed sub-descriptors.
///
/// Stops at a zero length byte or the end of the buffer. Concatenating the
/// returned slices gives back the consumed prefix of `bytes`.
pub fn split_into_subdescriptors(bytes: &[u8]) -> Result<Vec<&[u8]>> {
    let mut out = Vec::new();
    let mut rest = bytes;
    let mut offset = 0usize;
    while let Some(&len) = rest.first() {
        if len == 0 {
            break;
        }
        let len = usize::from(len);
        if len > rest.len() {
            return Err(Error::malformed(format!(
                "bad descriptor length: data[{offset}]={len} with {} bytes left",
                rest.len()
            )));
        }
        let (head, tail) = rest.split_at(len);
        out.push(head);
        rest = tail;
        offset += len;
    }
    Ok(out)
}

/// Build the configuration header and interface tree from split sub-descriptors.
///
/// HID class descriptors are only interpreted when `device_class` is 0x00
/// (class defined per interface); vendor-class devices reuse type 0x21 for
/// their own data.
pub fn parse_configuration(
    slices: &[&[u8]],
    device_class: u8,
) -> Result<(ConfigDescriptor, Vec<InterfaceDescriptor>)> {
    let mut config: Option<ConfigDescriptor> = None;
    let mut interfaces: Vec<InterfaceDescriptor> = Vec::new();

    for &d in slices {
        let (len, ty) = match d {
            [len, ty, ..] => (usize::from(*len), *ty),
            _ => continue,
        };
        match (len, ty) {
            (CONFIG_DESCRIPTOR_LEN, DESC_CONFIGURATION) => {
                if config.is_none() {
                    config = Some(parse_config_header(d)?);
                }
            }
            (INTERFACE_DESCRIPTOR_LEN, DESC_INTERFACE) => interfaces.push(parse_interface(d)?),
            (ENDPOINT_DESCRIPTOR_LEN, DESC_ENDPOINT) => {
                let ep = parse_endpoint(d)?;
                interfaces
                    .last_mut()
                    .ok_or_else(|| {
                        Error::malformed(format!(
                            "endpoint descriptor before any interface: {}",
                            hex_dump(d, 0)
                        ))
                    })?
                    .endpoints
                    .push(ep);
            }
            (_, DESC_HID) if device_class == 0x00 => {
                let hid = parse_hid(d)?;
                interfaces
                    .last_mut()
                    .ok_or_else(|| {
                        Error::malformed(format!(
                            "HID descriptor before any interface: {}",
                            hex_dump(d, 0)
                        ))
                    })?
                    .hid
                    .push(hid);
            }
            _ => trace!(len, ty, "ignoring descriptor"),
        }
    }

    let config = config.ok_or_else(|| Error::malformed("configuration descriptor missing"))?;
    Ok((config, interfaces))
}

fn parse_config_header(d: &[u8]) -> Result<ConfigDescriptor> {
    let d: [u8; CONFIG_DESCRIPTOR_LEN] = d
        .try_into()
        .map_err(|_| Error::malformed("bad configuration descriptor"))?;
    Ok(ConfigDescriptor {
        total_length: u16::from_le_bytes([d[2], d[3]]),
        num_interfaces: d[4],
        configuration_value: d[5],
        attributes: d[7],
        max_power: d[8],
    })
}

fn parse_interface(d: &[u8]) -> Result<InterfaceDescriptor> {
    let d: [u8; INTERFACE_DESCRIPTOR_LEN] = d
        .try_into()
        .map_err(|_| Error::malformed("bad interface descriptor"))?;
    Ok(InterfaceDescriptor {
        number: d[2],
        alternate_setting: d[3],
        num_endpoints: d[4],
        class: d[5],
        subclass: d[6],
        protocol: d[7],
        endpoints: Vec::new(),
        hid: Vec::new(),
    })
}

fn parse_endpoint(d: &[u8]) -> Result<EndpointDescriptor> {
    let d: [u8; ENDPOINT_DESCRIPTOR_LEN] = d
        .try_into()
        .map_err(|_| Error::malformed("bad endpoint descriptor"))?;
    Ok(EndpointDescriptor {
        address: d[2],
        attributes: d[3],
        max_packet_size: u16::from_le_bytes([d[4], d[5]]),
        interval: d[6],
    })
}

fn parse_hid(d: &[u8]) -> Result<HidDescriptor> {
    let bad = || Error::malformed(format!("bad HID descriptor: {}", hex_dump(d, 0)));
    if d.len() < HID_DESCRIPTOR_MIN_LEN {
        return Err(bad());
    }
    let (Some(&b_length), Some(&num)) = (d.first(), d.get(5)) else {
        return Err(bad());
    };
    if usize::from(b_length) != 6 + usize::from(num) * 3 {
        return Err(Error::malformed(format!(
            "bad HID descriptor (bNumDescriptors={num}, bLength={b_length})"
        )));
    }
    let bcd_hid = match (d.get(2), d.get(3)) {
        (Some(&lo), Some(&hi)) => u16::from_le_bytes([lo, hi]),
        _ => return Err(bad()),
    };
    let country_code = d.get(4).copied().ok_or_else(bad)?;
    let subs = d
        .get(6..)
        .unwrap_or_default()
        .chunks_exact(3)
        .take(usize::from(num))
        .map(|c| HidSubDescriptor {
            descriptor_type: c[0],
            length: u16::from_le_bytes([c[1], c[2]]),
            report: None,
        })
        .collect();
    Ok(HidDescriptor {
        bcd_hid,
        country_code,
        subs,
    })
}

/// Read and parse the device descriptor.
pub fn read_device_descriptor<D: UsbDevice + ?Sized>(
    dev: &mut D,
    timeout_ms: u32,
) -> Result<DeviceDescriptor> {
    let mut buf = [0u8; DEVICE_DESCRIPTOR_LEN];
    let n = dev.get_descriptor(DESC_DEVICE, 0, &mut buf, timeout_ms)?;
    parse_device_descriptor(buf.get(..n).unwrap_or(&buf))
}

/// Read the full configuration blob: header first, then `wTotalLength` bytes
/// (capped at `max_len`).
pub fn read_configuration_blob<D: UsbDevice + ?Sized>(
    dev: &mut D,
    max_len: usize,
    timeout_ms: u32,
) -> Result<Vec<u8>> {
    let mut head = [0u8; CONFIG_DESCRIPTOR_LEN];
    let n = dev.get_descriptor(DESC_CONFIGURATION, 0, &mut head, timeout_ms)?;
    if n < 4 {
        return Err(Error::malformed(format!(
            "configuration header truncated to {n} bytes"
        )));
    }
    let total = usize::from(u16::from_le_bytes([head[2], head[3]]));
    let want = total.clamp(CONFIG_DESCRIPTOR_LEN, max_len.max(CONFIG_DESCRIPTOR_LEN));
    if total > want {
        warn!(total, want, "configuration descriptor larger than limit, truncating");
    }
    let mut blob = vec![0u8; want];
    let n = dev.get_descriptor(DESC_CONFIGURATION, 0, &mut blob, timeout_ms)?;
    blob.truncate(n);
    Ok(blob)
}

/// Everything learned about one device from its descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub device: DeviceDescriptor,
    pub config: ConfigDescriptor,
    pub interfaces: Vec<InterfaceDescriptor>,
    pub speed: UsbSpeed,
}

impl Descriptor {
    /// Read device and configuration descriptors and fetch HID report
    /// descriptors that fit under the ceiling.
    pub fn read<D: UsbDevice + ?Sized>(dev: &mut D, cfg: &DriverConfig) -> Result<Self> {
        let device = read_device_descriptor(dev, cfg.control_timeout_ms)?;
        Self::read_configuration(dev, device, cfg)
    }

    /// Second half of [`Descriptor::read`] for callers that already hold the
    /// device descriptor.
    pub fn read_configuration<D: UsbDevice + ?Sized>(
        dev: &mut D,
        device: DeviceDescriptor,
        cfg: &DriverConfig,
    ) -> Result<Self> {
        debug!("Device Descriptor:\n{}", hex_dump(device.raw(), 1));
        let blob = read_configuration_blob(dev, cfg.max_configuration_len, cfg.control_timeout_ms)?;
        let slices = split_into_subdescriptors(&blob)?;
        if slices.is_empty() {
            return Err(Error::malformed("empty configuration descriptor"));
        }
        debug!("Configuration Descriptor:\n{}", hex_rows(&slices, 1));

        let (config, mut interfaces) = parse_configuration(&slices, device.class)?;
        fetch_report_descriptors(dev, &mut interfaces, cfg);

        Ok(Self {
            device,
            config,
            interfaces,
            speed: dev.speed(),
        })
    }

    pub fn vid_pid(&self) -> (u16, u16) {
        (self.device.vendor_id, self.device.product_id)
    }

    /// Interface 0, alternate setting 0.
    pub fn interface0(&self) -> Option<&InterfaceDescriptor> {
        self.interfaces
            .iter()
            .find(|i| i.number == 0 && i.alternate_setting == 0)
    }

    pub fn interface0_triple(&self) -> Option<ClassTriple> {
        self.interface0().map(InterfaceDescriptor::class_triple)
    }
}

fn fetch_report_descriptors<D: UsbDevice + ?Sized>(
    dev: &mut D,
    interfaces: &mut [InterfaceDescriptor],
    cfg: &DriverConfig,
) {
    for iface in interfaces.iter_mut() {
        let number = iface.number;
        for sub in iface.hid.iter_mut().flat_map(|h| h.subs.iter_mut()) {
            if sub.descriptor_type != DESC_HID_REPORT {
                continue;
            }
            let len = usize::from(sub.length);
            if len > cfg.hid_report_ceiling {
                warn!(
                    interface = number,
                    len,
                    ceiling = cfg.hid_report_ceiling,
                    "HID report descriptor over ceiling, keeping metadata only"
                );
                continue;
            }
            let mut buf = vec![0u8; len];
            match dev.control_transfer(
                REQUEST_TYPE_INTERFACE_IN,
                REQUEST_GET_DESCRIPTOR,
                u16::from(DESC_HID_REPORT) << 8,
                u16::from(number),
                &mut buf,
                cfg.control_timeout_ms,
            ) {
                Ok(n) => {
                    buf.truncate(n);
                    sub.report = Some(buf);
                }
                Err(e) => warn!(interface = number, error = %e, "could not fetch HID report descriptor"),
            }
        }
    }
}

/// Hexdump `data` as space-separated bytes, wrapped to 80 columns.
pub fn hex_dump(data: &[u8], indent: usize) -> String {
    let per_line = (80usize.saturating_sub(indent) / 3).max(1);
    data.chunks(per_line)
        .map(|chunk| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            format!("{}{}", " ".repeat(indent), hex.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One hexdump line per sub-descriptor.
pub fn hex_rows(rows: &[&[u8]], indent: usize) -> String {
    rows.iter()
        .map(|r| {
            let hex: Vec<String> = r.iter().map(|b| format!("{b:02x}")).collect();
            format!("{}{}", " ".repeat(indent), hex.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Descriptor:")?;
        writeln!(f, "  bDeviceClass: 0x{:02x}", self.class)?;
        writeln!(f, "  bDeviceSubClass: 0x{:02x}", self.subclass)?;
        writeln!(f, "  bDeviceProtocol: 0x{:02x}", self.protocol)?;
        writeln!(f, "  bMaxPacketSize0: {}", self.max_packet_size0)?;
        writeln!(f, "  idVendor: 0x{:04x}", self.vendor_id)?;
        writeln!(f, "  idProduct: 0x{:04x}", self.product_id)?;
        writeln!(f, "  iManufacturer: {}", self.i_manufacturer)?;
        writeln!(f, "  iProduct: {}", self.i_product)?;
        writeln!(f, "  iSerialNumber: {}", self.i_serial_number)?;
        write!(f, "  bNumConfigurations: {}", self.num_configurations)
    }
}

impl fmt::Display for ConfigDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config {}: NumInterfaces: {}, MaxPower: {} mA",
            self.configuration_value,
            self.num_interfaces,
            u32::from(self.max_power) * 2
        )
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interface {}: Endpoints: {}, Class: 0x{:02x}, SubClass: 0x{:02x}, Protocol: 0x{:02x}",
            self.number, self.num_endpoints, self.class, self.subclass, self.protocol
        )
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Endpoint 0x{:02x}: bmAttributes: 0x{:02x}, wMaxPacketSize: {}, bInterval: {}",
            self.address, self.attributes, self.max_packet_size, self.interval
        )
    }
}

impl fmt::Display for HidDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HID Descriptor:\n    bNumDescriptors: {}", self.subs.len())?;
        for sub in &self.subs {
            write!(
                f,
                "\n    bDescriptorType: 0x{:02x}, wDescriptorLength: {}",
                sub.descriptor_type, sub.length
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.device)?;
        write!(f, "\n  {}", self.config)?;
        for iface in &self.interfaces {
            write!(f, "\n  {iface}")?;
            for ep in &iface.endpoints {
                write!(f, "\n    {ep}")?;
            }
            for hid in &iface.hid {
                write!(f, "\n    {hid}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMEPAD_DEVICE: [u8; 18] = [
        0x12, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0xd6, 0x20, 0x11, 0xa7, 0x00, 0x01, 0x01,
        0x02, 0x00, 0x01,
    ];

    #[test]
    fn device_descriptor_fields() {
        let d = parse_device_descriptor(&GAMEPAD_DEVICE).unwrap();
        assert_eq!(d.vendor_id, 0x20d6);
        assert_eq!(d.product_id, 0xa711);
        assert_eq!(d.bcd_usb, 0x0200);
        assert_eq!(d.max_packet_size0, 64);
        assert_eq!(d.num_configurations, 1);
        assert_eq!(d.class_triple(), ClassTriple(0, 0, 0));
    }

    #[test]
    fn all_zero_device_descriptor_is_malformed() {
        let err = parse_device_descriptor(&[0u8; 18]).unwrap_err();
        assert!(matches!(err, Error::MalformedDescriptor(_)));
    }

    #[test]
    fn wrong_length_byte_is_malformed() {
        let mut bytes = GAMEPAD_DEVICE;
        bytes[0] = 0x10;
        assert!(matches!(
            parse_device_descriptor(&bytes),
            Err(Error::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn split_stops_at_zero_terminator() {
        let blob = [3, 0x24, 0xaa, 2, 0x25, 0, 0, 0];
        let slices = split_into_subdescriptors(&blob).unwrap();
        assert_eq!(slices, vec![&blob[..3], &blob[3..5]]);
    }

    #[test]
    fn split_rejects_overlong_subdescriptor() {
        let blob = [3, 0x24, 0xaa, 9, 0x04, 0x00];
        assert!(matches!(
            split_into_subdescriptors(&blob),
            Err(Error::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn endpoint_before_interface_is_malformed() {
        let config = [9, 2, 25, 0, 1, 1, 0, 0x80, 50];
        let ep = [7, 5, 0x81, 3, 64, 0, 4];
        let err = parse_configuration(&[&config, &ep], 0).unwrap_err();
        assert!(matches!(err, Error::MalformedDescriptor(_)));
    }

    #[test]
    fn unknown_descriptors_are_ignored() {
        let config = [9, 2, 30, 0, 1, 1, 0, 0x80, 50];
        let iface = [9, 4, 0, 0, 1, 3, 0, 0, 0];
        let odd = [5, 0x30, 1, 2, 3];
        let ep = [7, 5, 0x81, 3, 8, 0, 10];
        let (cfg, ifaces) = parse_configuration(&[&config, &iface, &odd, &ep], 0).unwrap();
        assert_eq!(cfg.num_interfaces, 1);
        assert_eq!(ifaces.len(), 1);
        assert_eq!(ifaces[0].endpoints.len(), 1);
        assert_eq!(ifaces[0].interrupt_in().map(|e| e.interval), Some(10));
    }

    #[test]
    fn hid_descriptor_only_for_interface_class_devices() {
        let config = [9, 2, 27, 0, 1, 1, 0, 0x80, 50];
        let iface = [9, 4, 0, 0, 1, 3, 0, 0, 0];
        let hid = [9, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3f, 0x00];
        let (_, ifaces) = parse_configuration(&[&config, &iface, &hid], 0x00).unwrap();
        assert_eq!(ifaces[0].hid.len(), 1);
        assert_eq!(ifaces[0].hid[0].subs[0].length, 0x3f);

        let (_, ifaces) = parse_configuration(&[&config, &iface, &hid], 0xff).unwrap();
        assert!(ifaces[0].hid.is_empty());
    }

    #[test]
    fn hid_descriptor_count_mismatch_is_malformed() {
        let config = [9, 2, 27, 0, 1, 1, 0, 0x80, 50];
        let iface = [9, 4, 0, 0, 1, 3, 0, 0, 0];
        let hid = [9, 0x21, 0x11, 0x01, 0x00, 0x02, 0x22, 0x3f, 0x00];
        assert!(parse_configuration(&[&config, &iface, &hid], 0).is_err());
    }

    #[test]
    fn interface_display_matches_dump_format() {
        let iface = parse_interface(&[9, 4, 0, 0, 2, 3, 0, 0, 0]).unwrap();
        assert_eq!(
            iface.to_string(),
            "Interface 0: Endpoints: 2, Class: 0x03, SubClass: 0x00, Protocol: 0x00"
        );
    }

    #[test]
    fn config_display_reports_milliamps() {
        let cfg = parse_config_header(&[9, 2, 41, 0, 1, 1, 0, 0x80, 250]).unwrap();
        assert_eq!(cfg.to_string(), "Config 1: NumInterfaces: 1, MaxPower: 500 mA");
    }

    fn report_fetches(dev: &crate::backends::VirtualDevice) -> usize {
        dev.control_requests()
            .iter()
            .filter(|r| r.request_type == REQUEST_TYPE_INTERFACE_IN && r.value == 0x2200)
            .count()
    }

    #[test]
    fn report_descriptor_over_ceiling_is_not_fetched() {
        // PowerA report descriptor is 94 bytes.
        let mut dev = crate::fixtures::powera_wired().into_virtual();
        let cfg = DriverConfig {
            hid_report_ceiling: 93,
            ..DriverConfig::default()
        };
        let desc = Descriptor::read(&mut dev, &cfg).unwrap();
        let sub = &desc.interfaces[0].hid[0].subs[0];
        assert_eq!(sub.descriptor_type, DESC_HID_REPORT);
        assert_eq!(sub.length, 94);
        assert!(sub.report.is_none());
        assert_eq!(report_fetches(&dev), 0);
    }

    #[test]
    fn report_descriptor_at_ceiling_is_fetched() {
        let mut dev = crate::fixtures::powera_wired().into_virtual();
        let cfg = DriverConfig {
            hid_report_ceiling: 94,
            ..DriverConfig::default()
        };
        let desc = Descriptor::read(&mut dev, &cfg).unwrap();
        let report = desc.interfaces[0].hid[0].subs[0].report.as_deref();
        assert_eq!(report.map(<[u8]>::len), Some(94));
        assert_eq!(report_fetches(&dev), 1);
    }

    #[test]
    fn hex_dump_wraps() {
        let data = [0xabu8; 30];
        let dump = hex_dump(&data, 4);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("    ab ab"));
    }
}
