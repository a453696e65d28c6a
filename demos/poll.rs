//! Poll a scripted XInput pad through a single [`Connection`].
//!
//! Run with `cargo run --example poll`.
use padhost::backends::VirtualBus;
use padhost::classify::identify;
use padhost::event::PollOutcome;
use padhost::polling::ManualClock;
use padhost::{fixtures, Connection, DriverConfig, ScanResult};

fn main() -> padhost::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cfg = DriverConfig::default();
    let capture = fixtures::sn30_pro_usb();
    let device = capture.into_virtual();
    let descriptor = capture.descriptor()?;
    let kind = identify(&descriptor);

    let bus = VirtualBus::new();
    bus.plug(device.clone());

    let mut conn = Connection::open(
        ScanResult {
            device,
            descriptor,
            kind,
        },
        &cfg,
    )?;

    // A: press, hold, release. Then Start + Up.
    let presses: [u16; 5] = [0x0000, 0x2000, 0x2000, 0x0000, 0x0011];
    for raw in presses {
        let [lo, hi] = raw.to_le_bytes();
        let mut report = vec![0x00, 0x14, lo, hi];
        report.resize(20, 0);
        conn.device().queue_report(report);
    }
    conn.device().queue_timeout();

    let clock = ManualClock::new(0);
    for outcome in conn.events(&clock).take(16) {
        clock.advance(4);
        match outcome? {
            PollOutcome::Input(report) => println!("{report:?}"),
            PollOutcome::Timeout => println!("timeout"),
            PollOutcome::NotDue | PollOutcome::Unchanged => {}
        }
    }
    Ok(())
}
