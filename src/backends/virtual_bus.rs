//! In-memory USB bus.
//!
//! A [`VirtualDevice`] answers `GET_DESCRIPTOR` from stored bytes, hands out
//! queued interrupt reports and records everything written to it. Handles are
//! cheap clones sharing one state, so a test can keep a handle to inspect
//! writes after the bus has passed another clone to the session.

use crate::descriptor::{DESC_CONFIGURATION, DESC_DEVICE, DESC_HID_REPORT};
use crate::device::{
    TransferError, UsbBus, UsbDevice, UsbSpeed, REQUEST_GET_DESCRIPTOR,
    REQUEST_TYPE_INTERFACE_IN, REQUEST_TYPE_STANDARD_IN,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// One scripted interrupt IN outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadStep {
    Report(Vec<u8>),
    Timeout,
    Error(TransferError),
}

/// Control request as seen by the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: usize,
}

/// Produces replies for a write: `(endpoint, data) -> reports`.
pub type Responder = Box<dyn FnMut(u8, &[u8]) -> Vec<Vec<u8>>>;

struct State {
    speed: UsbSpeed,
    device_descriptor: Vec<u8>,
    configuration: Vec<u8>,
    hid_reports: HashMap<u16, Vec<u8>>,
    reads: VecDeque<ReadStep>,
    replies: VecDeque<Vec<u8>>,
    writes: Vec<(u8, Vec<u8>)>,
    controls: Vec<ControlRequest>,
    kernel_claimed: HashSet<u8>,
    detached: Vec<u8>,
    configured: bool,
    connected: bool,
    write_error: Option<TransferError>,
    responder: Option<Responder>,
}

#[derive(Clone)]
pub struct VirtualDevice {
    state: Rc<RefCell<State>>,
}

impl VirtualDevice {
    pub fn new(speed: UsbSpeed, device_descriptor: Vec<u8>, configuration: Vec<u8>) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                speed,
                device_descriptor,
                configuration,
                hid_reports: HashMap::new(),
                reads: VecDeque::new(),
                replies: VecDeque::new(),
                writes: Vec::new(),
                controls: Vec::new(),
                kernel_claimed: HashSet::new(),
                detached: Vec::new(),
                configured: false,
                connected: true,
                write_error: None,
                responder: None,
            })),
        }
    }

    /// Serve `report` for `GET_DESCRIPTOR(HID report)` on `interface`.
    pub fn with_hid_report(self, interface: u8, report: Vec<u8>) -> Self {
        self.state
            .borrow_mut()
            .hid_reports
            .insert(u16::from(interface), report);
        self
    }

    /// Queue an interrupt IN report.
    pub fn queue_report(&self, report: impl Into<Vec<u8>>) {
        self.push(ReadStep::Report(report.into()));
    }

    pub fn queue_timeout(&self) {
        self.push(ReadStep::Timeout);
    }

    pub fn queue_error(&self, err: TransferError) {
        self.push(ReadStep::Error(err));
    }

    pub fn push(&self, step: ReadStep) {
        self.state.borrow_mut().reads.push_back(step);
    }

    /// Install a closure that answers writes. Its replies are read before
    /// anything queued with [`queue_report`](Self::queue_report).
    pub fn set_responder(&self, responder: impl FnMut(u8, &[u8]) -> Vec<Vec<u8>> + 'static) {
        self.state.borrow_mut().responder = Some(Box::new(responder));
    }

    /// Make every subsequent write fail with `err`.
    pub fn fail_writes(&self, err: Option<TransferError>) {
        self.state.borrow_mut().write_error = err;
    }

    /// Pretend a host driver has claimed `interface`.
    pub fn claim_by_kernel(&self, interface: u8) {
        self.state.borrow_mut().kernel_claimed.insert(interface);
    }

    /// Every transfer from now on fails with [`TransferError::Disconnected`].
    pub fn disconnect(&self) {
        self.state.borrow_mut().connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.borrow().writes.clone()
    }

    pub fn control_requests(&self) -> Vec<ControlRequest> {
        self.state.borrow().controls.clone()
    }

    pub fn detached_interfaces(&self) -> Vec<u8> {
        self.state.borrow().detached.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.state.borrow().configured
    }

    /// Queued reads not yet consumed.
    pub fn pending_reads(&self) -> usize {
        self.state.borrow().reads.len()
    }

    fn check_connected(&self) -> Result<(), TransferError> {
        if self.state.borrow().connected {
            Ok(())
        } else {
            Err(TransferError::Disconnected)
        }
    }
}

fn copy_into(src: &[u8], buf: &mut [u8]) -> usize {
    let n = src.len().min(buf.len());
    buf[..n].copy_from_slice(&src[..n]);
    n
}

impl UsbDevice for VirtualDevice {
    fn speed(&self) -> UsbSpeed {
        self.state.borrow().speed
    }

    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<usize, TransferError> {
        self.check_connected()?;
        let mut st = self.state.borrow_mut();
        st.controls.push(ControlRequest {
            request_type,
            request,
            value,
            index,
            length: buf.len(),
        });
        if request != REQUEST_GET_DESCRIPTOR {
            return Err(TransferError::Stall);
        }
        let desc_type = (value >> 8) as u8;
        let src = match (request_type, desc_type) {
            (REQUEST_TYPE_STANDARD_IN, DESC_DEVICE) => &st.device_descriptor,
            (REQUEST_TYPE_STANDARD_IN, DESC_CONFIGURATION) => &st.configuration,
            (REQUEST_TYPE_INTERFACE_IN, DESC_HID_REPORT) => {
                st.hid_reports.get(&index).ok_or(TransferError::Stall)?
            }
            _ => return Err(TransferError::Stall),
        };
        Ok(copy_into(src, buf))
    }

    fn interrupt_read(
        &mut self,
        _endpoint: u8,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<usize, TransferError> {
        self.check_connected()?;
        let mut st = self.state.borrow_mut();
        if let Some(reply) = st.replies.pop_front() {
            return Ok(copy_into(&reply, buf));
        }
        match st.reads.pop_front() {
            Some(ReadStep::Report(r)) => Ok(copy_into(&r, buf)),
            Some(ReadStep::Error(e)) => Err(e),
            Some(ReadStep::Timeout) | None => Err(TransferError::Timeout),
        }
    }

    fn interrupt_write(
        &mut self,
        endpoint: u8,
        data: &[u8],
        _timeout_ms: u32,
    ) -> Result<usize, TransferError> {
        self.check_connected()?;
        let mut st = self.state.borrow_mut();
        if let Some(err) = st.write_error.clone() {
            return Err(err);
        }
        st.writes.push((endpoint, data.to_vec()));
        let replies = match st.responder.as_mut() {
            Some(respond) => respond(endpoint, data),
            None => Vec::new(),
        };
        st.replies.extend(replies);
        Ok(data.len())
    }

    fn set_configuration(&mut self) -> Result<(), TransferError> {
        self.check_connected()?;
        self.state.borrow_mut().configured = true;
        Ok(())
    }

    fn is_kernel_driver_active(&mut self, interface: u8) -> Result<bool, TransferError> {
        self.check_connected()?;
        Ok(self.state.borrow().kernel_claimed.contains(&interface))
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransferError> {
        self.check_connected()?;
        let mut st = self.state.borrow_mut();
        st.kernel_claimed.remove(&interface);
        st.detached.push(interface);
        Ok(())
    }
}

/// A bus of [`VirtualDevice`]s.
#[derive(Clone, Default)]
pub struct VirtualBus {
    devices: Rc<RefCell<Vec<VirtualDevice>>>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plug(&self, device: VirtualDevice) {
        self.devices.borrow_mut().push(device);
    }

    /// Remove every device and mark it disconnected.
    pub fn unplug_all(&self) {
        for dev in self.devices.borrow_mut().drain(..) {
            dev.disconnect();
        }
    }

    pub fn len(&self) -> usize {
        self.devices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.borrow().is_empty()
    }
}

impl UsbBus for VirtualBus {
    type Device = VirtualDevice;

    fn find_all_devices(&mut self) -> Result<Vec<VirtualDevice>, TransferError> {
        Ok(self
            .devices
            .borrow()
            .iter()
            .filter(|d| d.is_connected())
            .cloned()
            .collect())
    }
}
