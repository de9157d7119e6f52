// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin definitions for the STM32F777 flight controller board.

use stm32f7xx_hal::{
    gpio::{gpioa, gpiob, gpioc, gpiod, Alternate, OpenDrain, Output, PushPull},
    pac,
    prelude::*,
};

use crate::hw::rc_capture::RcPins;

/// All board pins. Construct this once at startup using:
///
/// ```rust
/// let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC, dp.GPIOD);
/// ```
pub struct BoardPins {
    pub leds: LedPins,
    pub usart1: Usart1Pins,
    pub i2c1: I2c1Pins,
    pub esc: EscPins,
    pub rc: RcPins,
}

pub struct LedPins {
    pub red: gpiod::PD8<Output<PushPull>>,
    pub yellow: gpiod::PD9<Output<PushPull>>,
    pub green: gpiod::PD10<Output<PushPull>>,
}

pub struct Usart1Pins {
    pub tx: gpioa::PA9<Alternate<7>>,
    pub rx: gpioa::PA10<Alternate<7>>,
}

/// Sensor bus: MPU-6050, HMC5883L, BMP180
pub struct I2c1Pins {
    pub scl: gpiob::PB8<Alternate<4, OpenDrain>>,
    pub sda: gpiob::PB9<Alternate<4, OpenDrain>>,
}

/// ESC signals, motors 0 to 3
pub struct EscPins {
    pub m0: gpiod::PD12<Alternate<2>>, // TIM4_CH1
    pub m1: gpiod::PD13<Alternate<2>>, // TIM4_CH2
    pub m2: gpiod::PD14<Alternate<2>>, // TIM4_CH3
    pub m3: gpiod::PD15<Alternate<2>>, // TIM4_CH4
}

impl BoardPins {
    /// Create all named pins from raw GPIO peripherals.
    pub fn new(gpioa: pac::GPIOA, gpiob: pac::GPIOB, gpioc: pac::GPIOC, gpiod: pac::GPIOD) -> Self {
        let gpioa = gpioa.split();
        let gpiob = gpiob.split();
        let gpioc = gpioc.split();
        let gpiod = gpiod.split();

        Self {
            leds: LedPins {
                red: gpiod.pd8.into_push_pull_output(),
                yellow: gpiod.pd9.into_push_pull_output(),
                green: gpiod.pd10.into_push_pull_output(),
            },

            usart1: Usart1Pins {
                tx: gpioa.pa9.into_alternate::<7>(),
                rx: gpioa.pa10.into_alternate::<7>(),
            },

            i2c1: I2c1Pins {
                scl: gpiob.pb8.into_alternate_open_drain::<4>(),
                sda: gpiob.pb9.into_alternate_open_drain::<4>(),
            },

            esc: EscPins {
                m0: gpiod.pd12.into_alternate::<2>(),
                m1: gpiod.pd13.into_alternate::<2>(),
                m2: gpiod.pd14.into_alternate::<2>(),
                m3: gpiod.pd15.into_alternate::<2>(),
            },

            rc: RcPins {
                ch0: gpioc.pc6.into_floating_input(),
                ch1: gpioc.pc7.into_floating_input(),
                ch2: gpioc.pc8.into_floating_input(),
                ch3: gpioc.pc9.into_floating_input(),
                ch4: gpioc.pc10.into_floating_input(),
            },
        }
    }
}
