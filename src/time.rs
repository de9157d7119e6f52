// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Time keeping.
//!
//! All timestamps are `u32` microseconds from a free-running counter. They wrap after about 71
//! minutes, so every comparison goes through [`time_after`] and every difference through
//! `wrapping_sub`.

/// Timestamp in microseconds.
pub type Timestamp = u32;

/// Monotonic microsecond time source.
pub trait Clock {
    /// Current timestamp.
    fn now_us(&self) -> Timestamp;

    /// Busy-wait for `ms` milliseconds.
    fn delay_ms(&self, ms: u32) {
        let until = self.now_us().wrapping_add(ms.saturating_mul(1000));
        while !time_after(self.now_us(), until) {}
    }
}

/// True if `a` is later than `b`, tolerating counter wrap-around.
#[inline]
pub fn time_after(a: Timestamp, b: Timestamp) -> bool {
    (b.wrapping_sub(a) as i32) < 0
}

/// Measures the time between successive calls.
#[derive(Copy, Clone, Debug)]
pub struct DeltaTime {
    last: Timestamp,
}

impl DeltaTime {
    /// Start measuring from `now`.
    pub fn new(now: Timestamp) -> Self {
        Self { last: now }
    }

    /// Microseconds since the previous call (or since construction / reset).
    pub fn next_delta_us(&mut self, now: Timestamp) -> u32 {
        let dt = now.wrapping_sub(self.last);
        self.last = now;
        dt
    }

    /// Same as [`next_delta_us`](Self::next_delta_us) but in milliseconds.
    #[inline]
    pub fn next_delta_ms(&mut self, now: Timestamp) -> f32 {
        self.next_delta_us(now) as f32 / 1000.0
    }

    /// Restart measuring from `now`.
    pub fn reset(&mut self, now: Timestamp) {
        self.last = now;
    }
}
