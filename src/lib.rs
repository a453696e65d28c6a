//! Host-side USB gamepad core.
//!
//! Reads and parses USB descriptors, classifies attached devices (XInput,
//! Switch Pro, a few named HID pads, boot keyboards and mice), brings them up
//! and polls their interrupt endpoint into a normalized [`ButtonState`].
//! Hardware access sits behind the [`UsbDevice`]/[`UsbBus`] traits; the
//! [`backends::VirtualBus`] drives everything in tests and demos.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod adapters;
pub mod backends;
pub mod buttons;
pub mod classify;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod event;
#[cfg(any(test, feature = "fixtures"))]
#[cfg_attr(docsrs, doc(cfg(feature = "fixtures")))]
pub mod fixtures;
pub mod hid_report;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod polling;

pub use buttons::ButtonState;
pub use classify::DeviceKind;
pub use config::DriverConfig;
pub use connection::Connection;
pub use device::{UsbBus, UsbDevice};
pub use error::{Error, Result};
pub use event::{Presenter, SessionEvent};
pub use manager::{ScanResult, SessionManager};
