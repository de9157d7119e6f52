// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Status LED.
//!
//! The flight loop shows its mode through the blink rate of one LED. [`LedBlinker`] is polled from
//! the loop and toggles the LED whenever its period has elapsed; nothing runs from interrupts.

use crate::time::{time_after, Timestamp};
use embedded_hal::digital::v2::OutputPin;

/// Status output driven from the main loop.
pub trait StatusIndicator {
    /// Stop blinking and hold the LED on or off.
    fn set_led_state(&mut self, on: bool);

    /// Toggle the LED every `rate_ms` milliseconds.
    fn set_blink_rate(&mut self, rate_ms: u32);

    /// Poll. Toggles the LED if a blink period has elapsed.
    fn update(&mut self, now: Timestamp);
}

/// Whether the LED is driven active-high or active-low on the board wiring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActiveLevel {
    High,
    Low,
}

/// LED that remembers its active level and last known state.
pub struct Led<PIN: OutputPin> {
    pin: PIN,
    active: ActiveLevel,
    is_on: bool,
}

impl<PIN: OutputPin> Led<PIN> {
    /// Wrap `pin`, initializing the LED to off.
    pub fn new(pin: PIN, active: ActiveLevel) -> Self {
        let mut led = Self {
            pin,
            active,
            is_on: true,
        };
        led.set(false);
        led
    }

    pub fn active_high(pin: PIN) -> Self {
        Self::new(pin, ActiveLevel::High)
    }

    pub fn active_low(pin: PIN) -> Self {
        Self::new(pin, ActiveLevel::Low)
    }

    pub fn set(&mut self, on: bool) {
        let high = on == (self.active == ActiveLevel::High);
        // GPIO writes on this target cannot fail
        let _ = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        self.is_on = on;
    }

    #[inline]
    pub fn on(&mut self) {
        self.set(true);
    }

    #[inline]
    pub fn off(&mut self) {
        self.set(false);
    }

    pub fn toggle(&mut self) {
        self.set(!self.is_on);
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn free(self) -> PIN {
        self.pin
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Steady,
    Blink { rate_us: u32, next_toggle: Option<Timestamp> },
}

/// Blinks a [`Led`] from the main loop.
pub struct LedBlinker<PIN: OutputPin> {
    led: Led<PIN>,
    mode: Mode,
}

impl<PIN: OutputPin> LedBlinker<PIN> {
    pub fn new(led: Led<PIN>) -> Self {
        Self {
            led,
            mode: Mode::Steady,
        }
    }

    #[inline]
    pub fn led(&self) -> &Led<PIN> {
        &self.led
    }

    /// Blink period in milliseconds, `None` while steady.
    pub fn blink_rate_ms(&self) -> Option<u32> {
        match self.mode {
            Mode::Steady => None,
            Mode::Blink { rate_us, .. } => Some(rate_us / 1000),
        }
    }
}

impl<PIN: OutputPin> StatusIndicator for LedBlinker<PIN> {
    fn set_led_state(&mut self, on: bool) {
        self.mode = Mode::Steady;
        self.led.set(on);
    }

    fn set_blink_rate(&mut self, rate_ms: u32) {
        // the first update schedules the next toggle
        self.mode = Mode::Blink {
            rate_us: rate_ms.saturating_mul(1000),
            next_toggle: None,
        };
    }

    fn update(&mut self, now: Timestamp) {
        if let Mode::Blink {
            rate_us,
            next_toggle,
        } = &mut self.mode
        {
            match *next_toggle {
                None => *next_toggle = Some(now.wrapping_add(*rate_us)),
                Some(at) if !time_after(at, now) => {
                    self.led.toggle();
                    *next_toggle = Some(now.wrapping_add(*rate_us));
                }
                Some(_) => {}
            }
        }
    }
}
