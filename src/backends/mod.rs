//! USB bus backends for `padhost`.
//!
//! Implementations of [`UsbBus`](crate::device::UsbBus) /
//! [`UsbDevice`](crate::device::UsbDevice). The core ships only the in-memory
//! [`virtual_bus`]; a board support crate wires the real host controller in
//! through the same traits.

pub mod virtual_bus;

pub use virtual_bus::{VirtualBus, VirtualDevice};
