// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Single-value low-pass filters.
//!
//! - [`MovingAverage`] - bounded-history sliding window average.
//! - [`Ema`] - exponential moving average with cutoff-frequency tuning.
//! - [`SmoothingFilter`] - either of the above, picked at construction time.
//!
//! Works in `no_std` and does not allocate memory.

use core::f32::consts::PI;

/// Largest history a [`MovingAverage`] can hold.
pub const MOVING_AVERAGE_MAX: usize = 32;

/// A filter that turns a stream of samples into a smoothed stream.
pub trait Smoothing {
    /// Feed a new sample and return the filtered value.
    fn next_value(&mut self, x: f32) -> f32;
}

/// Sliding window average over the last `len` samples.
///
/// Until the window is full the output is the average of the samples seen so far.
#[derive(Copy, Clone, Debug)]
pub struct MovingAverage {
    history: [f32; MOVING_AVERAGE_MAX],
    capacity: usize,
    sum: f32,
    index: usize,
    filled: usize,
}

impl MovingAverage {
    /// Create a moving average over `capacity` samples, clamped to `1..=MOVING_AVERAGE_MAX`.
    pub fn new(capacity: usize) -> Self {
        Self {
            history: [0.0; MOVING_AVERAGE_MAX],
            capacity: capacity.clamp(1, MOVING_AVERAGE_MAX),
            sum: 0.0,
            index: 0,
            filled: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Smoothing for MovingAverage {
    fn next_value(&mut self, x: f32) -> f32 {
        self.sum -= self.history[self.index];
        self.history[self.index] = x;
        self.sum += x;
        self.index = (self.index + 1) % self.capacity;
        if self.filled < self.capacity {
            self.filled += 1;
        }
        self.sum / self.filled as f32
    }
}

/// Exponential moving average: `y = alpha * (x - y_prev) + y_prev`.
///
/// The first sample passes through unchanged and seeds the state.
#[derive(Copy, Clone, Debug)]
pub struct Ema {
    alpha: f32,
    prev: Option<f32>,
}

impl Ema {
    /// `alpha` in [0, 1]: higher values discard older data faster.
    pub fn new(alpha: f32) -> Self {
        Self { alpha, prev: None }
    }

    /// Set the cutoff frequency.
    ///
    /// `cutoff_hz` — frequencies above this are attenuated
    /// `time_step_s` — sampling interval in seconds
    pub fn set_cutoff_freq(&mut self, cutoff_hz: f32, time_step_s: f32) {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        self.alpha = time_step_s / (time_step_s + rc);
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[inline]
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }
}

impl Smoothing for Ema {
    fn next_value(&mut self, x: f32) -> f32 {
        let y = match self.prev {
            Some(prev) => self.alpha * (x - prev) + prev,
            None => x,
        };
        self.prev = Some(y);
        y
    }
}

/// Smoothing strategy selected when the owner is built.
#[derive(Copy, Clone, Debug)]
pub enum SmoothingFilter {
    MovingAverage(MovingAverage),
    Ema(Ema),
}

impl SmoothingFilter {
    /// Retune an EMA filter. A moving average has no cutoff to set and ignores the call.
    pub fn set_cutoff_freq(&mut self, cutoff_hz: f32, time_step_s: f32) {
        if let SmoothingFilter::Ema(ema) = self {
            ema.set_cutoff_freq(cutoff_hz, time_step_s);
        }
    }
}

impl Smoothing for SmoothingFilter {
    #[inline]
    fn next_value(&mut self, x: f32) -> f32 {
        match self {
            SmoothingFilter::MovingAverage(f) => f.next_value(x),
            SmoothingFilter::Ema(f) => f.next_value(x),
        }
    }
}

impl From<MovingAverage> for SmoothingFilter {
    fn from(f: MovingAverage) -> Self {
        SmoothingFilter::MovingAverage(f)
    }
}

impl From<Ema> for SmoothingFilter {
    fn from(f: Ema) -> Self {
        SmoothingFilter::Ema(f)
    }
}
