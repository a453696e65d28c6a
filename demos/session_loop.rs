//! Full session: scan a virtual bus, connect to a pad, poll it until it
//! stops answering, then fall over to the next device.
//!
//! Run with `cargo run --example session_loop`.
use padhost::backends::VirtualBus;
use padhost::logger::Logger;
use padhost::polling::ManualClock;
use padhost::{fixtures, DriverConfig, SessionEvent, SessionManager};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let bus = VirtualBus::new();
    let pad = fixtures::zero2().into_virtual();
    bus.plug(pad.clone());
    bus.plug(fixtures::compact_keyboard().into_virtual());

    for (buttons, dpad_x) in [(0x00u8, 0x7f), (0x01, 0x7f), (0x01, 0x00), (0x00, 0x7f)] {
        pad.queue_report(vec![buttons, 0x00, 0x7f, dpad_x, 0x7f, 0x7f, 0x7f, 0x7f]);
    }

    let cfg = DriverConfig {
        timeout_streak_limit: Some(3),
        ..DriverConfig::default()
    };
    let mut session = SessionManager::new(bus, ManualClock::new(0), cfg);
    let mut logger = Logger::new();

    for _ in 0..20 {
        session.clock().advance(1);
        // After the pad stops answering, pull it; the next scan picks the keyboard.
        if let SessionEvent::Lost(_) = session.step_with(&mut logger) {
            pad.disconnect();
        }
    }
    println!("{} input events", logger.inputs());
}
