//! Property tests for the byte-level parsers and report decoders.
//!
//! Every parser is fed arbitrary bytes: it may reject them, but it must never
//! panic, and whatever it accepts must be consistent with the input.

use padhost::adapters::{adapter_for, ReportWindow};
use padhost::classify::identify;
use padhost::descriptor::{parse_configuration, parse_device_descriptor, split_into_subdescriptors};
use padhost::{fixtures, hid_report};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Splitting consumes a prefix and the slices concatenate back to it.
    #[test]
    fn prop_split_concatenates_to_prefix(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(slices) = split_into_subdescriptors(&bytes) {
            let joined: Vec<u8> = slices.concat();
            prop_assert_eq!(&bytes[..joined.len()], joined.as_slice());
            prop_assert!(slices.iter().all(|s| !s.is_empty() && usize::from(s[0]) == s.len()));
        }
    }

    #[test]
    fn prop_configuration_parse_never_panics(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        class in any::<u8>(),
    ) {
        if let Ok(slices) = split_into_subdescriptors(&bytes) {
            let _ = parse_configuration(&slices, class);
        }
    }

    #[test]
    fn prop_device_descriptor_needs_eighteen_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..40)) {
        let parsed = parse_device_descriptor(&bytes);
        if bytes.len() < 18 {
            prop_assert!(parsed.is_err());
        }
    }

    #[test]
    fn prop_hid_report_parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(report) = hid_report::parse(&bytes) {
            // Every short item consumes at least its prefix byte.
            prop_assert!(report.items.len() <= bytes.len());
            let _ = report.dump(0);
        }
    }

    /// No adapter panics on arbitrary report bytes.
    #[test]
    fn prop_normalize_never_panics(report in proptest::collection::vec(any::<u8>(), 0..64)) {
        for capture in fixtures::all() {
            let kind = identify(&capture.descriptor().unwrap());
            if let Some(adapter) = adapter_for(&kind) {
                let _ = adapter.normalize(&report);
            }
        }
    }

    #[test]
    fn prop_window_is_reflexive(report in proptest::collection::vec(any::<u8>(), 0..64)) {
        prop_assert!(ReportWindow::Whole.same(&report, &report));
        prop_assert!(ReportWindow::Spans(&[(0, 4), (10, 70)]).same(&report, &report));
    }
}
