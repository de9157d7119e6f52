// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Offset and scale normalized stick values into engineering units.
//!
//! Absolute converters map a stick position straight to an output. Relative converters treat the
//! stick as a rate: every call adds `(raw + offset) * scaling * dt_ms` to the previous output, so a
//! held stick keeps turning the setpoint at a steady speed regardless of the loop rate.

use crate::time::{DeltaTime, Timestamp};

/// How a [`ValueConverter`] maps its input.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Conversion {
    /// `(raw + offset) * scaling`
    Absolute,
    /// Integrate `(raw + offset) * scaling` over elapsed milliseconds into `[min, max]`.
    Relative { min: f32, max: f32, wrap_around: bool },
}

/// Converter for one input channel. The default is absolute without offset or scaling.
#[derive(Copy, Clone, Debug)]
pub struct ValueConverter {
    conversion: Conversion,
    offset: f32,
    scaling: f32,

    last_value: f32,
    delta_time: Option<DeltaTime>,
}

impl Default for ValueConverter {
    fn default() -> Self {
        Self::absolute(0.0, 1.0)
    }
}

impl ValueConverter {
    /// First add `offset`, then multiply with `scaling`.
    pub fn absolute(offset: f32, scaling: f32) -> Self {
        Self {
            conversion: Conversion::Absolute,
            offset,
            scaling,
            last_value: 0.0,
            delta_time: None,
        }
    }

    /// Offset, scale, multiply by the elapsed milliseconds and add to the previous value.
    ///
    /// Results outside `[min, max]` are clamped, or shifted back by multiples of `max - min` if
    /// `wrap_around` is set.
    pub fn relative(offset: f32, scaling: f32, min: f32, max: f32, wrap_around: bool) -> Self {
        Self {
            conversion: Conversion::Relative {
                min,
                max,
                wrap_around,
            },
            offset,
            scaling,
            last_value: 0.0,
            delta_time: None,
        }
    }

    /// Switch to absolute mode in place.
    pub fn set_absolute(&mut self, offset: f32, scaling: f32) {
        *self = Self {
            last_value: self.last_value,
            ..Self::absolute(offset, scaling)
        };
    }

    /// Switch to relative mode in place, keeping the accumulated value.
    pub fn set_relative(&mut self, offset: f32, scaling: f32, min: f32, max: f32, wrap_around: bool) {
        *self = Self {
            last_value: self.last_value,
            ..Self::relative(offset, scaling, min, max, wrap_around)
        };
    }

    #[inline]
    pub fn conversion(&self) -> Conversion {
        self.conversion
    }

    /// Start the elapsed-time tracker at `now`, so the first relative update integrates over the
    /// time since then.
    pub fn start_timing(&mut self, now: Timestamp) {
        self.delta_time = Some(DeltaTime::new(now));
    }

    /// Convert the next raw value. `now` feeds the elapsed-time tracker of relative converters.
    ///
    /// Without [`start_timing`](Self::start_timing), the first relative update integrates over 0 ms.
    pub fn next_value(&mut self, raw: f32, now: Timestamp) -> f32 {
        let (min, max, wrap_around) = match self.conversion {
            Conversion::Absolute => return (raw + self.offset) * self.scaling,
            Conversion::Relative {
                min,
                max,
                wrap_around,
            } => (min, max, wrap_around),
        };

        let dt_ms = match self.delta_time.as_mut() {
            Some(dt) => dt.next_delta_ms(now),
            None => {
                self.delta_time = Some(DeltaTime::new(now));
                0.0
            }
        };

        let mut value = (raw + self.offset) * self.scaling * dt_ms + self.last_value;
        if wrap_around {
            let span = max - min;
            if span > 0.0 {
                while value < min {
                    value += span;
                }
                while value > max {
                    value -= span;
                }
            }
        } else {
            value = value.clamp(min, max);
        }
        self.last_value = value;
        value
    }

    /// Overwrite the accumulated value, e.g. to start a yaw setpoint at the current heading.
    pub fn reset(&mut self, value: f32) {
        self.last_value = value;
    }

    #[inline]
    pub fn last_value(&self) -> f32 {
        self.last_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f32::consts::PI;

    #[test]
    fn absolute_is_affine() {
        for &(offset, scaling) in &[(0.0, 1.0), (0.25, 2.0), (-1.5, -0.3)] {
            let mut c = ValueConverter::absolute(offset, scaling);
            for (i, &raw) in [-1.0, -0.2, 0.0, 0.6, 1.0].iter().enumerate() {
                assert_relative_eq!(c.next_value(raw, i as u32 * 1000), (raw + offset) * scaling);
            }
        }
    }

    #[test]
    fn relative_integrates_over_elapsed_time() {
        let mut c = ValueConverter::relative(0.0, 0.001, -10.0, 10.0, false);
        assert_eq!(c.next_value(1.0, 0), 0.0);
        // 1.0 * 0.001 * 500 ms
        assert_relative_eq!(c.next_value(1.0, 500_000), 0.5);
        assert_relative_eq!(c.next_value(-1.0, 750_000), 0.25);
    }

    #[test]
    fn started_timing_integrates_first_sample() {
        let mut c = ValueConverter::relative(0.0, 0.001, -10.0, 10.0, false);
        c.start_timing(1_000_000);
        // 200 ms since start
        assert_relative_eq!(c.next_value(1.0, 1_200_000), 0.2);
        assert_relative_eq!(c.next_value(1.0, 1_300_000), 0.3);
    }

    #[test]
    fn relative_clamps_without_wrap() {
        let mut c = ValueConverter::relative(0.0, 1.0, -1.0, 1.0, false);
        c.next_value(0.0, 0);
        assert_eq!(c.next_value(1.0, 5_000), 1.0);
        assert_eq!(c.next_value(-1.0, 20_000), -1.0);
    }

    #[test]
    fn relative_wraps_preserving_delta() {
        let mut c = ValueConverter::relative(0.0, 0.001, -PI, PI, true);
        c.reset(PI - 0.1);
        c.next_value(0.0, 0);
        // +0.3 rad in 300 ms
        let v = c.next_value(1.0, 300_000);
        assert_relative_eq!(v, -PI + 0.2, epsilon = 1e-5);

        c.reset(-PI + 0.05);
        let v = c.next_value(-1.0, 400_000);
        assert_relative_eq!(v, PI - 0.05, epsilon = 1e-5);
    }

    #[test]
    fn reset_seeds_relative_value() {
        let mut c = ValueConverter::relative(0.0, 1.0, -5.0, 5.0, false);
        c.next_value(0.0, 0);
        c.reset(2.0);
        assert_relative_eq!(c.next_value(0.0, 1_000), 2.0);
        assert_relative_eq!(c.last_value(), 2.0);
    }

    #[test]
    fn switching_mode_keeps_accumulator() {
        let mut c = ValueConverter::default();
        c.reset(1.5);
        c.set_relative(0.0, 1.0, -5.0, 5.0, false);
        assert!(matches!(c.conversion(), Conversion::Relative { .. }));
        assert_relative_eq!(c.next_value(0.0, 0), 1.5);
        c.set_absolute(1.0, 2.0);
        assert_relative_eq!(c.next_value(0.5, 10), 3.0);
        assert_relative_eq!(c.last_value(), 1.5);
    }
}
