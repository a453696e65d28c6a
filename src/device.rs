//! USB transport capability.
//!
//! The core never talks to a host controller directly. Everything it needs from
//! the bus is expressed by two traits:
//! - [`UsbBus`] enumerates attached devices (`find_all_devices`).
//! - [`UsbDevice`] is one attached device: control/interrupt transfers, configuration,
//!   kernel-driver detach and the negotiated [`UsbSpeed`].
//!
//! Every transfer is a blocking call bounded by an explicit millisecond timeout.
//! A timeout is reported as [`TransferError::Timeout`] so callers can tell the
//! expected "nothing arrived" outcome apart from real faults.
//!
//! The in-memory implementation used by tests and demos lives in
//! [`backends::virtual_bus`](crate::backends::virtual_bus).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `bmRequestType`: device-to-host, standard, device recipient.
pub const REQUEST_TYPE_STANDARD_IN: u8 = 0x80;
/// `bmRequestType`: device-to-host, standard, interface recipient.
pub const REQUEST_TYPE_INTERFACE_IN: u8 = 0x81;
/// Standard `GET_DESCRIPTOR` request.
pub const REQUEST_GET_DESCRIPTOR: u8 = 0x06;

/// Negotiated bus speed. Decides the unit of an endpoint's `bInterval`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsbSpeed {
    Low,
    Full,
    High,
}

/// Failure of a single transfer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Nothing completed within the timeout.
    #[error("transfer timed out")]
    Timeout,
    /// The device went away.
    #[error("device disconnected")]
    Disconnected,
    /// The device stalled the request.
    #[error("endpoint stalled")]
    Stall,
    /// Backend-specific fault.
    #[error("{0}")]
    Io(String),
}

/// One attached USB device.
///
/// Implementations are used from a single flow of control; nothing here needs
/// to be `Sync`.
pub trait UsbDevice {
    /// Negotiated speed of this device.
    fn speed(&self) -> UsbSpeed;

    /// Execute a control transfer. For IN requests `buf` receives the data;
    /// the return value is the number of bytes transferred.
    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, TransferError>;

    /// Read one report from an interrupt IN endpoint.
    fn interrupt_read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, TransferError>;

    /// Write one report to an interrupt OUT endpoint.
    fn interrupt_write(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<usize, TransferError>;

    /// Select the device's (first) configuration.
    fn set_configuration(&mut self) -> Result<(), TransferError>;

    fn is_kernel_driver_active(&mut self, interface: u8) -> Result<bool, TransferError>;

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransferError>;

    /// Issue a standard `GET_DESCRIPTOR` for `(desc_type, index)` into `buf`.
    fn get_descriptor(
        &mut self,
        desc_type: u8,
        index: u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, TransferError> {
        let value = (u16::from(desc_type) << 8) | u16::from(index);
        self.control_transfer(
            REQUEST_TYPE_STANDARD_IN,
            REQUEST_GET_DESCRIPTOR,
            value,
            0,
            buf,
            timeout_ms,
        )
    }
}

/// Bus-level enumeration.
pub trait UsbBus {
    type Device: UsbDevice;

    /// Handles for every device currently attached.
    fn find_all_devices(&mut self) -> Result<Vec<Self::Device>, TransferError>;
}

impl<D: UsbDevice + ?Sized> UsbDevice for Box<D> {
    fn speed(&self) -> UsbSpeed {
        (**self).speed()
    }

    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, TransferError> {
        (**self).control_transfer(request_type, request, value, index, buf, timeout_ms)
    }

    fn interrupt_read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, TransferError> {
        (**self).interrupt_read(endpoint, buf, timeout_ms)
    }

    fn interrupt_write(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<usize, TransferError> {
        (**self).interrupt_write(endpoint, data, timeout_ms)
    }

    fn set_configuration(&mut self) -> Result<(), TransferError> {
        (**self).set_configuration()
    }

    fn is_kernel_driver_active(&mut self, interface: u8) -> Result<bool, TransferError> {
        (**self).is_kernel_driver_active(interface)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransferError> {
        (**self).detach_kernel_driver(interface)
    }
}
