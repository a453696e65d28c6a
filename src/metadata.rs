//! Device summary.
//!
//! [`DeviceSummary`] is a small, cloneable description of a connected device
//! for presenters and diagnostics. It is built once when a connection comes
//! up and serializes to JSON for dumps.
//!
//! # Example
//! ```
//! use padhost::fixtures;
//! use padhost::classify::identify;
//! use padhost::metadata::DeviceSummary;
//!
//! let desc = fixtures::sn30_pro_usb().descriptor().unwrap();
//! let kind = identify(&desc);
//! let summary = DeviceSummary::new(&desc, &kind, "XInput");
//! assert_eq!(summary.kind, "XInput");
//! assert!(summary.to_json().unwrap().contains("\"vid\": 1118"));
//! ```

use crate::classify::DeviceKind;
use crate::descriptor::{ClassTriple, Descriptor};
use crate::device::UsbSpeed;
use crate::error::Result;
use crate::polling::effective_interval_ms;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub vid: u16,
    pub pid: u16,
    /// Classifier tag (`"XInput"`, `"SwitchPro"`, `"Zero2"`, ...).
    pub kind: String,
    /// Adapter actually driving the device. Differs from `kind` after a failover.
    pub adapter: String,
    pub device_class: [u8; 3],
    pub interface0_class: Option<[u8; 3]>,
    pub num_interfaces: u8,
    pub speed: UsbSpeed,
    pub input_endpoint: Option<u8>,
    pub output_endpoint: Option<u8>,
    /// Effective polling interval of the input endpoint.
    pub interval_ms: Option<u32>,
}

fn triple(t: ClassTriple) -> [u8; 3] {
    [t.0, t.1, t.2]
}

impl DeviceSummary {
    pub fn new(desc: &Descriptor, kind: &DeviceKind, adapter: &str) -> Self {
        let (vid, pid) = desc.vid_pid();
        let plan = kind.plan();
        Self {
            vid,
            pid,
            kind: kind.tag().to_string(),
            adapter: adapter.to_string(),
            device_class: triple(desc.device.class_triple()),
            interface0_class: desc.interface0_triple().map(triple),
            num_interfaces: desc.config.num_interfaces,
            speed: desc.speed,
            input_endpoint: plan.map(|p| p.input),
            output_endpoint: plan.and_then(|p| p.output),
            interval_ms: plan.map(|p| effective_interval_ms(p.interval, p.speed)),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x} {}", self.vid, self.pid, self.kind)?;
        if self.adapter != self.kind {
            write!(f, " (via {})", self.adapter)?;
        }
        if let Some(ms) = self.interval_ms {
            write!(f, ", every {ms} ms")?;
        }
        Ok(())
    }
}
