use padhost::backends::{VirtualBus, VirtualDevice};
use padhost::device::UsbSpeed;
use padhost::classify::{classify, identify, Classification, DeviceKind, FingerprintCache};
use padhost::polling::ManualClock;
use padhost::{fixtures, DriverConfig, SessionManager};

fn session_with(capture: &fixtures::DeviceCapture) -> SessionManager<VirtualBus, ManualClock> {
    let bus = VirtualBus::new();
    bus.plug(capture.into_virtual());
    SessionManager::new(bus, ManualClock::new(0), DriverConfig::default())
}

#[test]
fn every_capture_gets_its_expected_tag() {
    for capture in fixtures::all() {
        let desc = capture.descriptor().unwrap();
        assert_eq!(identify(&desc).tag(), capture.expected_tag, "{}", capture.name);
    }
}

#[test]
fn scan_classifies_through_the_bus() {
    for capture in fixtures::all() {
        let mut session = session_with(&capture);
        let found = session.scan().unwrap_or_else(|| panic!("{} not found", capture.name));
        assert_eq!(found.kind.tag(), capture.expected_tag, "{}", capture.name);
        assert_eq!(found.descriptor.vid_pid(), (capture.vid, capture.pid));
    }
}

#[test]
fn second_scan_skips_cached_device() {
    let mut session = session_with(&fixtures::powera_wired());
    assert!(session.scan().is_some());
    assert_eq!(session.cache().len(), 1);
    assert!(session.scan().is_none());
}

#[test]
fn classify_reports_skip_for_cached_fingerprint() {
    let desc = fixtures::zero2().descriptor().unwrap();
    let mut cache = FingerprintCache::new();
    assert!(matches!(
        classify(&desc, &mut cache),
        Classification::Kind(DeviceKind::NamedHid(..))
    ));
    assert_eq!(classify(&desc, &mut cache), Classification::Skip);
}

#[test]
fn same_model_different_revision_is_not_cached() {
    let bus = VirtualBus::new();
    bus.plug(fixtures::ultimate_bt().into_virtual());
    bus.plug(fixtures::sn30_pro_bt_switch().into_virtual());
    let mut session = SessionManager::new(bus, ManualClock::new(0), DriverConfig::default());
    assert_eq!(session.scan().unwrap().kind.tag(), "SwitchPro");
    assert_eq!(session.scan().unwrap().kind.tag(), "SwitchPro");
    assert!(session.scan().is_none());
}

#[test]
fn xinput_plan_uses_interface_zero_endpoints() {
    let wired = identify(&fixtures::sn30_pro_usb().descriptor().unwrap());
    let plan = wired.plan().unwrap();
    assert_eq!((plan.input, plan.output), (0x81, Some(0x02)));

    let bt = identify(&fixtures::sn30_pro_bt_xinput().descriptor().unwrap());
    assert_eq!(bt.plan().unwrap().output, Some(0x01));
}

fn session_on(dev: &VirtualDevice) -> SessionManager<VirtualBus, ManualClock> {
    let bus = VirtualBus::new();
    bus.plug(dev.clone());
    SessionManager::new(bus, ManualClock::new(0), DriverConfig::default())
}

#[test]
fn broken_configuration_is_cached_and_read_once() {
    let dd = fixtures::zero2().device_descriptor_bytes();
    let broken = VirtualDevice::new(UsbSpeed::Full, dd, vec![9, 2, 0]);
    let mut session = session_on(&broken);

    assert!(session.scan().is_none());
    assert_eq!(session.cache().len(), 1);
    let first = broken.control_requests().len();
    assert!(session.scan().is_none());
    // Only the device descriptor is read again.
    let second = broken.control_requests();
    assert_eq!(second.len(), first + 1);
    assert_eq!(second[first].value, 0x0100);
}

#[test]
fn unreadable_device_descriptor_is_retried() {
    let broken = VirtualDevice::new(UsbSpeed::Full, vec![0; 18], vec![9, 2, 0]);
    let mut session = session_on(&broken);

    assert!(session.scan().is_none());
    assert!(session.cache().is_empty());
    let first = broken.control_requests().len();
    assert!(session.scan().is_none());
    assert!(session.cache().is_empty());
    assert!(broken.control_requests().len() > first);
}

#[test]
fn interface_without_interrupt_in_is_unclassified() {
    let mut capture = fixtures::powera_wired();
    capture.pid = 0x0001;
    capture.interfaces[0].endpoints.retain(|e| e.address & 0x80 == 0);
    let desc = capture.descriptor().unwrap();
    assert_eq!(identify(&desc), DeviceKind::Unclassified);

    let mut session = session_with(&capture);
    assert!(session.scan().is_none());
    assert_eq!(session.cache().len(), 1);

    let mut cache = FingerprintCache::new();
    assert_eq!(
        classify(&desc, &mut cache),
        Classification::Kind(DeviceKind::Unclassified)
    );
    assert_eq!(cache.len(), 1);
}
