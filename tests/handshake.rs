use padhost::backends::{VirtualBus, VirtualDevice};
use padhost::classify::identify;
use padhost::connection::LinkState;
use padhost::device::TransferError;
use padhost::event::{InputReport, PollOutcome};
use padhost::polling::ManualClock;
use padhost::{fixtures, ButtonState, Connection, DriverConfig, Error, ScanResult, SessionEvent, SessionManager};

/// Acknowledge every USB command and subcommand the way a real pad does.
fn echo_acks(dev: &VirtualDevice) {
    dev.set_responder(|_, data| match data {
        [0x80, cmd, ..] => vec![vec![0x81, *cmd, 0x00, 0x03]],
        [0x01, _, rest @ ..] if rest.len() > 8 => {
            let mut reply = vec![0u8; 49];
            reply[0] = 0x21;
            reply[13] = 0x80;
            reply[14] = rest[8];
            vec![reply]
        }
        _ => Vec::new(),
    });
}

fn scan_of(dev: VirtualDevice) -> ScanResult<VirtualDevice> {
    let descriptor = fixtures::ultimate_bt().descriptor().unwrap();
    let kind = identify(&descriptor);
    ScanResult {
        device: dev,
        descriptor,
        kind,
    }
}

fn input_report(face: u8, menu: u8, left: u8) -> Vec<u8> {
    let mut r = vec![0u8; 64];
    r[0] = 0x30;
    r[1] = 0x10;
    r[3] = face;
    r[4] = menu;
    r[5] = left;
    r
}

#[test]
fn full_handshake_sends_eight_frames_in_order() {
    let dev = fixtures::ultimate_bt().into_virtual();
    echo_acks(&dev);
    let conn = Connection::open(scan_of(dev.clone()), &DriverConfig::default()).unwrap();
    assert_eq!(conn.state(), LinkState::Polling);
    assert_eq!(conn.adapter_name(), "SwitchPro");

    let writes = dev.writes();
    assert_eq!(writes.len(), 8);
    assert!(writes.iter().all(|(ep, _)| *ep == 0x02));
    let frames: Vec<&[u8]> = writes.iter().map(|(_, d)| d.as_slice()).collect();
    assert_eq!(frames[0], &[0x80, 0x01]);
    assert_eq!(frames[1], &[0x80, 0x02]);
    assert_eq!(frames[2], &[0x80, 0x03]);
    assert_eq!(frames[3], &[0x80, 0x02]);
    assert_eq!(frames[4], &[0x80, 0x04]);
    assert_eq!(
        frames[5],
        &[0x01, 0x00, 0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40, 0x03, 0x30]
    );
    assert_eq!(&frames[6][..2], &[0x01, 0x01]);
    assert_eq!(&frames[6][10..], &[0x30, 0x01]);
    assert_eq!(&frames[7][..2], &[0x01, 0x02]);
    assert_eq!(&frames[7][10..], &[0x38, 0x0F, 0xF0, 0x00]);
}

#[test]
fn player_number_sets_led_bits() {
    let dev = fixtures::ultimate_bt().into_virtual();
    echo_acks(&dev);
    let cfg = DriverConfig {
        player: 3,
        ..DriverConfig::default()
    };
    Connection::open(scan_of(dev.clone()), &cfg).unwrap();
    assert_eq!(&dev.writes()[6].1[10..], &[0x30, 0x04]);
}

#[test]
fn silent_device_fails_first_step() {
    let dev = fixtures::ultimate_bt().into_virtual();
    let failure = Connection::try_open(scan_of(dev.clone()), &DriverConfig::default()).unwrap_err();
    assert_eq!(failure.phase, LinkState::Handshaking);
    match failure.error {
        Error::HandshakeFailed { step, .. } => assert_eq!(step, "get-device-info"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(dev.writes().len(), 1);
}

#[test]
fn unplugged_device_fails_while_configuring() {
    let capture = fixtures::sn30_pro_usb();
    let descriptor = capture.descriptor().unwrap();
    let dev = capture.into_virtual();
    dev.disconnect();
    let scan = ScanResult {
        device: dev.clone(),
        kind: identify(&descriptor),
        descriptor,
    };
    let failure = Connection::try_open(scan, &DriverConfig::default()).unwrap_err();
    assert_eq!(failure.phase, LinkState::Configuring);
    assert!(matches!(failure.error, Error::Transport(TransferError::Disconnected)));
    assert!(dev.writes().is_empty());
}

#[test]
fn unrelated_replies_are_tolerated() {
    let dev = fixtures::ultimate_bt().into_virtual();
    // Every write is answered with a stray input report instead of an ACK.
    dev.set_responder(|_, _| vec![input_report(0, 0, 0)]);
    let conn = Connection::open(scan_of(dev.clone()), &DriverConfig::default()).unwrap();
    assert_eq!(conn.state(), LinkState::Polling);
    assert_eq!(dev.writes().len(), 8);
}

#[test]
fn send_timeout_fails_handshake() {
    let dev = fixtures::ultimate_bt().into_virtual();
    dev.fail_writes(Some(TransferError::Timeout));
    let err = Connection::open(scan_of(dev), &DriverConfig::default()).unwrap_err();
    assert!(matches!(err, Error::HandshakeFailed { step: "get-device-info", .. }));
}

#[test]
fn stall_during_handshake_is_transport_error() {
    let dev = fixtures::ultimate_bt().into_virtual();
    dev.fail_writes(Some(TransferError::Stall));
    let err = Connection::open(scan_of(dev), &DriverConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Transport(TransferError::Stall)));
}

#[test]
fn polls_standard_reports_after_handshake() {
    let dev = fixtures::ultimate_bt().into_virtual();
    echo_acks(&dev);
    let mut conn = Connection::open(scan_of(dev.clone()), &DriverConfig::default()).unwrap();
    dev.queue_report(input_report(0x08, 0x02, 0x02));
    let clock = ManualClock::new(0);
    assert_eq!(
        conn.poll_once(&clock).unwrap(),
        PollOutcome::Input(InputReport::Buttons {
            state: ButtonState::A | ButtonState::START | ButtonState::UP,
            changed: ButtonState::A | ButtonState::START | ButtonState::UP,
        })
    );
}

#[test]
fn session_fails_over_to_raw_hid() {
    let bus = VirtualBus::new();
    let dev = fixtures::ultimate_bt().into_virtual();
    bus.plug(dev.clone());
    let mut session = SessionManager::new(bus, ManualClock::new(0), DriverConfig::default());
    match session.step() {
        SessionEvent::Connected(summary) => {
            assert_eq!(summary.kind, "SwitchPro");
            assert_eq!(summary.adapter, "HID");
        }
        other => panic!("expected Connected, got {other:?}"),
    }

    dev.queue_report(vec![0x3f, 0x00, 0x00, 0x08]);
    assert_eq!(
        session.step(),
        SessionEvent::Input(InputReport::Raw(vec![0x3f, 0x00, 0x00, 0x08]))
    );
}

#[test]
fn without_failover_the_session_loses_the_device() {
    let bus = VirtualBus::new();
    bus.plug(fixtures::ultimate_bt().into_virtual());
    let cfg = DriverConfig {
        switch_pro_failover: false,
        ..DriverConfig::default()
    };
    let mut session = SessionManager::new(bus, ManualClock::new(0), cfg);
    match session.step() {
        SessionEvent::Lost(reason) => assert!(reason.contains("get-device-info"), "{reason}"),
        other => panic!("expected Lost, got {other:?}"),
    }
    assert!(session.cache().is_empty());
}
