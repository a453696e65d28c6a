//! Polling engine.
//!
//! [`Poller`] throttles interrupt reads to the endpoint's advertised interval
//! and turns reads into [`PollOutcome`]s. Each call to
//! [`Poller::poll_once`] does at most one read, bounded by the read timeout,
//! so the caller can interleave other work between polls.
//!
//! ## Timing
//! Elapsed time comes from a millisecond [`Clock`]. Deltas are taken modulo
//! [`TICKS_MASK`] so a counter rollover yields a small delta, not a huge one.
//! A read is attempted once the accumulated time reaches
//! [`target_ms`]: a percentage of the effective interval, so the device is
//! polled a little faster than its nominal rate.
//!
//! ## Change detection
//! Reports land in one of two fixed buffers. The new report is compared with
//! the previous one over the adapter's [`ReportWindow`](crate::adapters::ReportWindow);
//! only a changed report is normalized. The buffers swap only when the adapter
//! produced an event.

use crate::adapters::{Normalized, PollingPolicy, ProtocolAdapter, MAX_REPORT_LEN};
use crate::buttons::ButtonState;
use crate::device::{TransferError, UsbDevice, UsbSpeed};
use crate::error::Result;
use crate::event::{InputReport, PollOutcome};
use std::cell::Cell;
use std::time::Instant;
use tracing::trace;

/// Width of the millisecond tick counter.
pub const TICKS_MASK: u32 = 0x3FFF_FFFF;

/// Monotonic millisecond tick source. May wrap at [`TICKS_MASK`].
pub trait Clock {
    fn ticks_ms(&self) -> u32;
}

/// Ticks since construction, from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn ticks_ms(&self) -> u32 {
        (self.origin.elapsed().as_millis() & u128::from(TICKS_MASK)) as u32
    }
}

/// Settable clock for tests and demos.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    pub fn new(start: u32) -> Self {
        Self {
            now: Cell::new(start & TICKS_MASK),
        }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms & TICKS_MASK);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms) & TICKS_MASK);
    }
}

impl Clock for ManualClock {
    fn ticks_ms(&self) -> u32 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn ticks_ms(&self) -> u32 {
        (**self).ticks_ms()
    }
}

/// Milliseconds between successive ticks, rollover-safe.
#[derive(Debug, Default, Clone)]
pub struct ElapsedMs {
    last: Option<u32>,
}

impl ElapsedMs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the previous call. The first call returns 0.
    pub fn tick(&mut self, now: u32) -> u32 {
        let delta = match self.last {
            Some(last) => now.wrapping_sub(last) & TICKS_MASK,
            None => 0,
        };
        self.last = Some(now);
        delta
    }
}

/// Effective polling interval in milliseconds for a raw `bInterval`.
///
/// Low/full speed: `bInterval` is already in ms. High speed: it is an exponent
/// over 125 µs microframes, `2^(bInterval-1) / 8` ms. Never below 1 ms.
pub fn effective_interval_ms(interval: u8, speed: UsbSpeed) -> u32 {
    let ms = match speed {
        UsbSpeed::Low | UsbSpeed::Full => u32::from(interval),
        UsbSpeed::High => {
            let exp = u32::from(interval.clamp(1, 16)) - 1;
            ((1u32 << exp) + 4) / 8
        }
    };
    ms.max(1)
}

/// Poll target: `ratio_percent` of the effective interval, at least 1 ms.
pub fn target_ms(interval: u8, speed: UsbSpeed, ratio_percent: u32) -> u32 {
    (effective_interval_ms(interval, speed) * ratio_percent / 100).max(1)
}

/// Per-connection poll state.
pub struct Poller {
    policy: PollingPolicy,
    target: u32,
    read_timeout: u32,
    accum: u32,
    elapsed: ElapsedMs,
    bufs: [[u8; MAX_REPORT_LEN]; 2],
    front: usize,
    prev_buttons: ButtonState,
}

impl Poller {
    pub fn new(policy: PollingPolicy, ratio_percent: u32) -> Self {
        let target = target_ms(policy.interval, policy.speed, ratio_percent);
        Self {
            policy,
            target,
            read_timeout: effective_interval_ms(policy.interval, policy.speed),
            accum: target,
            elapsed: ElapsedMs::new(),
            bufs: [[0; MAX_REPORT_LEN]; 2],
            front: 0,
            prev_buttons: ButtonState::empty(),
        }
    }

    pub fn target_ms(&self) -> u32 {
        self.target
    }

    pub fn policy(&self) -> &PollingPolicy {
        &self.policy
    }

    /// Last committed report, `read_len` bytes (zero padded).
    pub fn previous_report(&self) -> &[u8] {
        &self.bufs[self.front][..self.read_len()]
    }

    pub fn previous_buttons(&self) -> ButtonState {
        self.prev_buttons
    }

    /// Forget all history; the next poll is due immediately.
    pub fn reset(&mut self) {
        self.accum = self.target;
        self.elapsed = ElapsedMs::new();
        self.bufs = [[0; MAX_REPORT_LEN]; 2];
        self.front = 0;
        self.prev_buttons = ButtonState::empty();
    }

    fn read_len(&self) -> usize {
        self.policy.read_len.clamp(1, MAX_REPORT_LEN)
    }

    /// One scheduling step: read if due, compare, normalize.
    pub fn poll_once<C: Clock + ?Sized>(
        &mut self,
        clock: &C,
        dev: &mut dyn UsbDevice,
        adapter: &dyn ProtocolAdapter,
    ) -> Result<PollOutcome> {
        let delta = self.elapsed.tick(clock.ticks_ms());
        self.accum = self.accum.saturating_add(delta);
        if self.accum < self.target {
            return Ok(PollOutcome::NotDue);
        }
        self.accum = 0;

        let len = self.read_len();
        let back = 1 - self.front;
        let buf = &mut self.bufs[back];
        buf.fill(0);
        let n = match dev.interrupt_read(self.policy.endpoint, &mut buf[..len], self.read_timeout) {
            Ok(n) => n.min(len),
            Err(TransferError::Timeout) => return Ok(PollOutcome::Timeout),
            Err(e) => return Err(e.into()),
        };

        #[cfg(feature = "debug-log")]
        trace!(
            "report {} bytes:\n{}",
            n,
            crate::descriptor::hex_dump(&self.bufs[back][..n], 1)
        );

        let (current, previous) = (&self.bufs[back][..len], &self.bufs[self.front][..len]);
        if self.policy.window.same(current, previous) {
            return Ok(PollOutcome::Unchanged);
        }

        let report = match adapter.normalize(&self.bufs[back][..n]) {
            Normalized::NoEvent => {
                trace!(len = n, "report ignored by adapter");
                return Ok(PollOutcome::Unchanged);
            }
            Normalized::Buttons(state) => {
                let changed = state.changed_since(self.prev_buttons);
                self.prev_buttons = state;
                InputReport::Buttons { state, changed }
            }
            Normalized::Raw(bytes) => InputReport::Raw(bytes),
        };
        self.front = back;
        Ok(PollOutcome::Input(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_speed_interval_conversion() {
        assert_eq!(effective_interval_ms(4, UsbSpeed::High), 1);
        assert_eq!(effective_interval_ms(1, UsbSpeed::High), 1);
        assert_eq!(effective_interval_ms(7, UsbSpeed::High), 8);
        assert_eq!(effective_interval_ms(200, UsbSpeed::High), 4096);
    }

    #[test]
    fn low_speed_interval_is_milliseconds() {
        assert_eq!(effective_interval_ms(10, UsbSpeed::Low), 10);
        assert_eq!(effective_interval_ms(0, UsbSpeed::Full), 1);
    }

    #[test]
    fn target_is_three_quarters() {
        assert_eq!(target_ms(8, UsbSpeed::Full, 75), 6);
        assert_eq!(target_ms(1, UsbSpeed::Full, 75), 1);
    }

    #[test]
    fn elapsed_survives_rollover() {
        let mut e = ElapsedMs::new();
        assert_eq!(e.tick(TICKS_MASK - 2), 0);
        assert_eq!(e.tick(3), 6);
        assert_eq!(e.tick(10), 7);
    }

    #[test]
    fn manual_clock_wraps() {
        let clock = ManualClock::new(TICKS_MASK);
        clock.advance(2);
        assert_eq!(clock.ticks_ms(), 1);
    }
}
