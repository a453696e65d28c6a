//! Property tests for poll timing and button state arithmetic.

use padhost::device::UsbSpeed;
use padhost::polling::{effective_interval_ms, target_ms, ElapsedMs, TICKS_MASK};
use padhost::ButtonState;
use proptest::prelude::*;

fn speed() -> impl Strategy<Value = UsbSpeed> {
    prop_oneof![Just(UsbSpeed::Low), Just(UsbSpeed::Full), Just(UsbSpeed::High)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The delta between two ticks survives counter rollover.
    #[test]
    fn prop_elapsed_across_rollover(start in 0..=TICKS_MASK, delta in 0..TICKS_MASK) {
        let mut e = ElapsedMs::new();
        prop_assert_eq!(e.tick(start), 0);
        let now = start.wrapping_add(delta) & TICKS_MASK;
        prop_assert_eq!(e.tick(now), delta);
    }

    #[test]
    fn prop_interval_is_at_least_one_ms(interval: u8, speed in speed()) {
        prop_assert!(effective_interval_ms(interval, speed) >= 1);
    }

    #[test]
    fn prop_target_never_exceeds_interval(interval: u8, speed in speed(), ratio in 1u32..=100) {
        let target = target_ms(interval, speed, ratio);
        prop_assert!(target >= 1);
        prop_assert!(target <= effective_interval_ms(interval, speed));
    }

    #[test]
    fn prop_high_speed_interval_is_monotonic(a in 1u8..=16, b in 1u8..=16) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            effective_interval_ms(lo, UsbSpeed::High) <= effective_interval_ms(hi, UsbSpeed::High)
        );
    }

    /// Applying the changed mask to the previous state yields the new state.
    #[test]
    fn prop_changed_mask_reconstructs_state(prev: u16, next: u16) {
        let (prev, next) = (ButtonState::from_raw(prev), ButtonState::from_raw(next));
        let changed = next.changed_since(prev);
        prop_assert_eq!(prev ^ changed, next);
        prop_assert_eq!(changed, prev.changed_since(next));
    }

    #[test]
    fn prop_hat_sets_at_most_two_directions(hat: u8) {
        let dirs = ButtonState::from_hat(hat).bits().count_ones();
        prop_assert!(dirs <= 2);
        prop_assert_eq!(dirs == 0, hat >= 8);
    }
}
