//! Dump every reference capture the way the driver sees it: descriptors,
//! HID report descriptors and the classification result.
//!
//! Run with `cargo run --example diagnose`.
use padhost::classify::identify;
use padhost::fixtures;
use padhost::hid_report;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    for capture in fixtures::all() {
        println!("== {} ==", capture.name);
        let desc = match capture.descriptor() {
            Ok(d) => d,
            Err(e) => {
                println!("  failed to read descriptors: {e}");
                continue;
            }
        };
        println!("{desc}");

        for iface in &desc.interfaces {
            for raw in iface.report_descriptors() {
                match hid_report::parse(raw) {
                    Ok(report) => {
                        println!("  HID report (interface {}):", iface.number);
                        println!("{}", report.dump(4));
                    }
                    Err(e) => println!("  HID report (interface {}): {e}", iface.number),
                }
            }
        }

        let kind = identify(&desc);
        println!("  => {} (expected {})\n", kind.tag(), capture.expected_tag);
    }
}
