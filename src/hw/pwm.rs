// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! ESC signal generation on TIM4.
//!
//! The timer ticks at 1 MHz, so the auto-reload value is the period in microseconds and a compare
//! value is the pulse width in microseconds. Changing the frequency rescales every compare value
//! to keep the duty cycles.

use stm32f7xx_hal::pac;

use crate::motors::{PwmOutput, PWM_FREQ_MAX_HZ, PWM_FREQ_MIN_HZ};

pub const NUM_CHANNELS: usize = 4;

const TICK_HZ: u32 = 1_000_000;

pub struct EscPwm<TIM> {
    tim: TIM,
    freq: u32,
    duty: [f32; NUM_CHANNELS],
}

impl<TIM> EscPwm<TIM> {
    #[inline]
    pub fn free(self) -> TIM {
        self.tim
    }
}

impl EscPwm<pac::TIM4> {
    /// Configure all four TIM4 channels for PWM mode 1 at `freq` Hz, outputs low.
    pub fn tim4(tim4: pac::TIM4, timer_clk_hz: u32, freq: u32) -> Self {
        let tim = tim4;

        tim.cr1.modify(|_, w| w.cen().clear_bit());
        tim.psc
            .write(|w| unsafe { w.bits(timer_clk_hz / TICK_HZ - 1) });

        // PWM mode 1 with preload on every channel
        tim.ccmr1_output().modify(|_, w| unsafe {
            w.oc1m().bits(0b110).oc1pe().set_bit().oc2m().bits(0b110).oc2pe().set_bit()
        });
        tim.ccmr2_output().modify(|_, w| unsafe {
            w.oc3m().bits(0b110).oc3pe().set_bit().oc4m().bits(0b110).oc4pe().set_bit()
        });
        tim.ccer.modify(|_, w| {
            w.cc1e()
                .set_bit()
                .cc2e()
                .set_bit()
                .cc3e()
                .set_bit()
                .cc4e()
                .set_bit()
        });
        tim.cr1.modify(|_, w| w.arpe().set_bit());

        let mut pwm = Self {
            tim,
            freq: 0,
            duty: [0.0; NUM_CHANNELS],
        };
        let freq = freq.clamp(PWM_FREQ_MIN_HZ, PWM_FREQ_MAX_HZ);
        pwm.set_frequency(freq);
        pwm.tim.cr1.modify(|_, w| w.cen().set_bit());
        pwm
    }

    #[inline]
    fn period_ticks(&self) -> u32 {
        TICK_HZ / self.freq.max(1)
    }

    fn write_compare(&self, channel: usize, ticks: u32) {
        let tim = &self.tim;
        match channel {
            0 => tim.ccr1.write(|w| unsafe { w.bits(ticks) }),
            1 => tim.ccr2.write(|w| unsafe { w.bits(ticks) }),
            2 => tim.ccr3.write(|w| unsafe { w.bits(ticks) }),
            3 => tim.ccr4.write(|w| unsafe { w.bits(ticks) }),
            _ => {}
        }
    }
}

impl PwmOutput for EscPwm<pac::TIM4> {
    fn set_duty(&mut self, channel: usize, duty: f32) {
        if channel >= NUM_CHANNELS {
            return;
        }
        let duty = duty.clamp(0.0, 1.0);
        self.duty[channel] = duty;
        self.write_compare(channel, (duty * self.period_ticks() as f32) as u32);
    }

    fn duty(&self, channel: usize) -> f32 {
        self.duty.get(channel).copied().unwrap_or(0.0)
    }

    fn set_frequency(&mut self, hz: u32) -> bool {
        // the 16-bit auto-reload must hold the period in microseconds
        if !(PWM_FREQ_MIN_HZ..=PWM_FREQ_MAX_HZ).contains(&hz) {
            return false;
        }
        self.freq = hz;
        let period = self.period_ticks();
        self.tim.arr.write(|w| unsafe { w.bits(period - 1) });
        for channel in 0..NUM_CHANNELS {
            self.write_compare(channel, (self.duty[channel] * period as f32) as u32);
        }
        self.tim.egr.write(|w| w.ug().set_bit());
        true
    }

    fn frequency(&self) -> u32 {
        self.freq
    }
}
