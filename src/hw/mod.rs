// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Board Layer
//!
//! STM32F777 peripherals behind the collaborator traits of the flight loop.
//!
//! - [`clock`] - TIM2 microsecond [`Clock`](crate::time::Clock)
//! - [`pwm`] - TIM4 ESC signals as a [`PwmOutput`](crate::motors::PwmOutput)
//! - [`rc_capture`] - EXTI receiver edge capture as a [`PulseSource`](crate::input::PulseSource)
//! - [`usart`] - console [`Terminal`](crate::console::Terminal)
//! - [`pins`] - board pin map

pub mod clock;
pub mod pins;
pub mod pwm;
pub mod rc_capture;
pub mod usart;

pub use clock::TimerClock;
pub use pins::BoardPins;
pub use pwm::EscPwm;
pub use rc_capture::RcCapture;
pub use usart::UsartTerminal;
