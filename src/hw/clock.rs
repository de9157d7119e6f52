// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Microsecond clock on TIM2.
//!
//! TIM2 is a 32-bit timer. Prescaled to 1 MHz and left free-running over its full range, its
//! counter is directly a wrapping microsecond [`Timestamp`].

use stm32f7xx_hal::pac;

use crate::time::{Clock, Timestamp};

pub struct TimerClock {
    tim: pac::TIM2,
}

impl TimerClock {
    /// Start TIM2 counting microseconds. `timer_clk_hz` is the APB1 timer clock.
    pub fn tim2(tim2: pac::TIM2, timer_clk_hz: u32) -> Self {
        let tim = tim2;

        // Disable counter while configuring
        tim.cr1.modify(|_, w| w.cen().clear_bit());

        tim.psc
            .write(|w| unsafe { w.bits(timer_clk_hz / 1_000_000 - 1) });
        tim.arr.write(|w| w.bits(0xFFFF_FFFF));

        // Load the prescaler
        tim.egr.write(|w| w.ug().set_bit());
        tim.cnt.write(|w| w.bits(0));

        tim.cr1.modify(|_, w| w.cen().set_bit());

        Self { tim }
    }

    #[inline]
    pub fn free(self) -> pac::TIM2 {
        self.tim
    }
}

impl Clock for TimerClock {
    #[inline]
    fn now_us(&self) -> Timestamp {
        self.tim.cnt.read().bits()
    }
}

/// Current time for interrupt handlers, which cannot borrow the clock.
#[inline]
pub fn now_us() -> Timestamp {
    // read-only access to a free-running counter
    unsafe { (*pac::TIM2::ptr()).cnt.read().bits() }
}
