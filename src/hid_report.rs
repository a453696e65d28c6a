//! HID report descriptor parser.
//!
//! Walks the short-item stream of a report descriptor (HID 1.11 §6.2.2.2) and
//! produces a flat list of annotated items. Collection nesting is kept as a
//! depth counter on each item, not as a tree; the output is meant for
//! diagnostic dumps.
//!
//! Item prefix byte: `size` in bits 0..2 (0, 1, 2 or 4 payload bytes), `type`
//! in bits 2..4, `tag` in bits 4..8. Payloads are little-endian.

use crate::error::{Error, Result};
use std::fmt;

const SIZE_MASK: u8 = 0x03;
const TYPE_MASK: u8 = 0x0C;
const TAG_MASK: u8 = 0xF0;

const LONG_ITEM_PREFIX: u8 = 0xFE;

// Main items
const MAIN_NOP: u8 = 0x00;
const INPUT: u8 = 0x80;
const OUTPUT: u8 = 0x90;
const COLLECTION: u8 = 0xA0;
const FEATURE: u8 = 0xB0;
const END_COLLECTION: u8 = 0xC0;

// Global items
const USAGE_PAGE: u8 = 0x04;
const LOGICAL_MIN: u8 = 0x14;
const LOGICAL_MAX: u8 = 0x24;
const PHYSICAL_MIN: u8 = 0x34;
const PHYSICAL_MAX: u8 = 0x44;
const UNIT_EXPONENT: u8 = 0x54;
const UNIT: u8 = 0x64;
const REPORT_SIZE: u8 = 0x74;
const REPORT_ID: u8 = 0x84;
const REPORT_COUNT: u8 = 0x94;
const PUSH: u8 = 0xA4;
const POP: u8 = 0xB4;

// Local items
const USAGE: u8 = 0x08;
const USAGE_MIN: u8 = 0x18;
const USAGE_MAX: u8 = 0x28;
const DESIGNATOR_IDX: u8 = 0x38;
const DESIGNATOR_MIN: u8 = 0x48;
const DESIGNATOR_MAX: u8 = 0x58;
const STRING_IDX: u8 = 0x78;
const STRING_MIN: u8 = 0x88;
const STRING_MAX: u8 = 0x98;
const DELIMITER: u8 = 0xA8;

pub const PAGE_GENERIC_DESKTOP: u16 = 0x01;
pub const PAGE_SIMULATION: u16 = 0x02;
pub const PAGE_GENERIC_DEVICE: u16 = 0x06;
pub const PAGE_KEYBOARD: u16 = 0x07;
pub const PAGE_LEDS: u16 = 0x08;
pub const PAGE_BUTTON: u16 = 0x09;
pub const PAGE_CONSUMER: u16 = 0x0C;
pub const PAGE_PHYSICAL_INPUT: u16 = 0x0F;

pub const USAGE_JOYSTICK: u16 = 0x04;
pub const USAGE_GAMEPAD: u16 = 0x05;

/// A usage resolved to its page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Usage {
    pub page: u16,
    pub id: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemKind {
    UsagePage(u32),
    Usage(Usage),
    UsageMin(u32),
    UsageMax(u32),
    ReportSize(u32),
    ReportId(u32),
    ReportCount(u32),
    Push(Option<u32>),
    Pop(Option<u32>),
    Delimiter(u32),
    Input(u32),
    Output(u32),
    Feature(u32),
    Collection(u32),
    EndCollection,
    /// Well-framed item with a tag this parser doesn't annotate.
    Unknown { prefix: u8, data: Option<u32> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HidReportItem {
    /// Display nesting level.
    pub depth: usize,
    pub kind: ItemKind,
}

/// A parsed report descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HidReport {
    pub items: Vec<HidReportItem>,
}

struct Cursor {
    depth: usize,
    usage_page: u16,
    seen_report_id: bool,
}

/// Parse a report descriptor into its annotated items.
///
/// Fails with [`Error::UnsupportedFeature`] on a long item and with
/// [`Error::MalformedDescriptor`] when an item's payload runs past the buffer.
/// Global items that only matter for field extraction (logical/physical
/// ranges, units) and designator/string locals are consumed but not recorded.
pub fn parse(bytes: &[u8]) -> Result<HidReport> {
    let mut items = Vec::new();
    let mut st = Cursor {
        depth: 0,
        usage_page: 0,
        seen_report_id: false,
    };
    let mut pos = 0usize;

    while let Some(&prefix) = bytes.get(pos) {
        if prefix == LONG_ITEM_PREFIX {
            return Err(Error::UnsupportedFeature("HID long items"));
        }
        let size = match prefix & SIZE_MASK {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };
        let payload = bytes.get(pos + 1..pos + 1 + size).ok_or_else(|| {
            Error::malformed(format!(
                "HID report descriptor: item 0x{prefix:02x} at offset {pos} needs {size} bytes"
            ))
        })?;
        let data = match *payload {
            [] => None,
            [a] => Some(u32::from(a)),
            [a, b] => Some(u32::from(u16::from_le_bytes([a, b]))),
            [a, b, c, d] => Some(u32::from_le_bytes([a, b, c, d])),
            _ => None,
        };
        let tag_type = prefix & (TAG_MASK | TYPE_MASK);
        st.item(tag_type, prefix, size, data, &mut items);
        pos += 1 + size;
    }

    Ok(HidReport { items })
}

impl Cursor {
    fn push(&self, kind: ItemKind, items: &mut Vec<HidReportItem>) {
        items.push(HidReportItem {
            depth: self.depth,
            kind,
        });
    }

    fn item(
        &mut self,
        tag_type: u8,
        prefix: u8,
        size: usize,
        data: Option<u32>,
        items: &mut Vec<HidReportItem>,
    ) {
        let value = data.unwrap_or(0);
        match tag_type {
            MAIN_NOP => {}
            LOGICAL_MIN | LOGICAL_MAX | PHYSICAL_MIN | PHYSICAL_MAX | UNIT_EXPONENT | UNIT => {}
            DESIGNATOR_IDX | DESIGNATOR_MIN | DESIGNATOR_MAX | STRING_IDX | STRING_MIN
            | STRING_MAX => {}

            USAGE_PAGE => {
                self.usage_page = value as u16;
                self.push(ItemKind::UsagePage(value), items);
            }
            REPORT_SIZE => self.push(ItemKind::ReportSize(value), items),
            REPORT_ID => {
                if self.seen_report_id {
                    self.depth = self.depth.saturating_sub(1);
                }
                self.push(ItemKind::ReportId(value), items);
                self.depth += 1;
                self.seen_report_id = true;
            }
            REPORT_COUNT => self.push(ItemKind::ReportCount(value), items),
            PUSH => self.push(ItemKind::Push(data), items),
            POP => self.push(ItemKind::Pop(data), items),

            USAGE => {
                // A 4-byte usage carries its own page in the high half.
                let usage = if size == 4 {
                    Usage {
                        page: (value >> 16) as u16,
                        id: (value & 0xFFFF) as u16,
                    }
                } else {
                    Usage {
                        page: self.usage_page,
                        id: value as u16,
                    }
                };
                self.push(ItemKind::Usage(usage), items);
            }
            USAGE_MIN => self.push(ItemKind::UsageMin(value), items),
            USAGE_MAX => self.push(ItemKind::UsageMax(value), items),
            DELIMITER => self.push(ItemKind::Delimiter(value), items),

            INPUT => self.push(ItemKind::Input(value), items),
            OUTPUT => self.push(ItemKind::Output(value), items),
            FEATURE => self.push(ItemKind::Feature(value), items),
            COLLECTION => {
                self.push(ItemKind::Collection(value), items);
                self.depth += 1;
            }
            END_COLLECTION => {
                self.depth = self.depth.saturating_sub(1);
                self.push(ItemKind::EndCollection, items);
            }

            _ => self.push(ItemKind::Unknown { prefix, data }, items),
        }
    }
}

impl HidReport {
    /// Usages that open an application collection (e.g. Generic Desktop / Gamepad).
    pub fn application_usages(&self) -> Vec<Usage> {
        let mut out = Vec::new();
        let mut last_usage = None;
        for item in &self.items {
            match item.kind {
                ItemKind::Usage(u) => last_usage = Some(u),
                ItemKind::Collection(1) => {
                    if let Some(u) = last_usage.take() {
                        out.push(u);
                    }
                }
                ItemKind::Input(_) | ItemKind::Output(_) | ItemKind::Feature(_) => {
                    last_usage = None
                }
                _ => {}
            }
        }
        out
    }

    /// `true` if any application collection is a joystick or gamepad.
    pub fn declares_gamepad(&self) -> bool {
        self.application_usages().iter().any(|u| {
            u.page == PAGE_GENERIC_DESKTOP && matches!(u.id, USAGE_JOYSTICK | USAGE_GAMEPAD)
        })
    }

    /// Render the annotated listing with every line indented by `base` spaces.
    pub fn dump(&self, base: usize) -> String {
        self.items
            .iter()
            .map(|it| format!("{}{}", " ".repeat(base + 2 * it.depth), it.kind))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for HidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump(0))
    }
}

pub fn usage_page_name(page: u32) -> String {
    match page {
        0x01 => "Generic Desktop".into(),
        0x02 => "Simulation Controls".into(),
        0x06 => "Generic Device Controls".into(),
        0x07 => "Keyboard/Keypad".into(),
        0x08 => "LEDs".into(),
        0x09 => "Button".into(),
        0x0C => "Consumer".into(),
        0x0F => "Physical Input Device".into(),
        0xFF00..=0xFFFF => format!("Vendor Defined 0x{page:04x}"),
        _ => format!("{page:08x}"),
    }
}

fn generic_desktop_usage(id: u16) -> Option<&'static str> {
    Some(match id {
        0x01 => "Pointer",
        0x02 => "Mouse",
        0x04 => "Joystick",
        0x05 => "Gamepad",
        0x06 => "Keyboard",
        0x08 => "Multi-axis Controller",
        0x30 => "X Axis",
        0x31 => "Y Axis",
        0x32 => "Z Axis",
        0x33 => "Rx Axis",
        0x34 => "Ry Axis",
        0x35 => "Rz Axis",
        0x36 => "Slider",
        0x37 => "Dial",
        0x38 => "Wheel",
        0x39 => "Hat Switch",
        0x80 => "System Control",
        _ => return None,
    })
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id;
        let named = match self.page {
            PAGE_GENERIC_DESKTOP => {
                return match generic_desktop_usage(id) {
                    Some(name) => f.write_str(name),
                    None => write!(f, "{:08x}", id),
                }
            }
            PAGE_SIMULATION => match id {
                0xC4 => Some("Accelerator"),
                0xC5 => Some("Brake"),
                _ => None,
            },
            PAGE_GENERIC_DEVICE => (id == 0x20).then_some("Battery Strength"),
            PAGE_LEDS => match id {
                0x43 => Some("Slow Blink On Time"),
                0x44 => Some("Slow Blink Off Time"),
                0x45 => Some("Fast Blink On Time"),
                0x46 => Some("Fast Blink Off Time"),
                _ => None,
            },
            PAGE_KEYBOARD => return write!(f, "Keyboard 0x{id:04x}"),
            PAGE_BUTTON => return write!(f, "Button 0x{id:04x}"),
            PAGE_CONSUMER => return write!(f, "Consumer 0x{id:04x}"),
            _ => None,
        };
        match named {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{id:04x}"),
        }
    }
}

fn collection_name(kind: u32) -> String {
    match kind {
        0x00 => "Physical".into(),
        0x01 => "Application".into(),
        0x02 => "Logical".into(),
        0x03 => "Report".into(),
        0x04 => "Named Array".into(),
        0x05 => "Usage Switch".into(),
        0x06 => "Usage Modifier".into(),
        other => format!("Unknown 0x{other:02x}"),
    }
}

fn opt(f: &mut fmt::Formatter<'_>, label: &str, data: Option<u32>) -> fmt::Result {
    match data {
        Some(v) => write!(f, "{label} ({v})"),
        None => f.write_str(label),
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::UsagePage(p) => write!(f, "Usage Page ({})", usage_page_name(*p)),
            ItemKind::Usage(u) => write!(f, "Usage ({u})"),
            ItemKind::UsageMin(v) => write!(f, "Usage Min ({v})"),
            ItemKind::UsageMax(v) => write!(f, "Usage Max ({v})"),
            ItemKind::ReportSize(v) => write!(f, "Report Size ({v})"),
            ItemKind::ReportId(v) => write!(f, "Report ID (0x{v:02x})"),
            ItemKind::ReportCount(v) => write!(f, "Report Count ({v})"),
            ItemKind::Push(d) => opt(f, "Push", *d),
            ItemKind::Pop(d) => opt(f, "Pop", *d),
            ItemKind::Delimiter(v) => write!(f, "Delimiter ({v})"),
            ItemKind::Input(v) => write!(f, "Input ({v})"),
            ItemKind::Output(v) => write!(f, "Output ({v})"),
            ItemKind::Feature(v) => write!(f, "Feature ({v})"),
            ItemKind::Collection(c) => write!(f, "Collection ({})", collection_name(*c)),
            ItemKind::EndCollection => f.write_str("End Collection"),
            ItemKind::Unknown { prefix, data } => opt(f, &format!("0x{prefix:02x}"), *data),
        }
    }
}
