// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # quadfc
//!
//! Flight-control firmware for an X-configuration quadrotor, written in Rust, targeting an
//! STM32F777 MCU.
//!
//! Everything except the board layer is hardware independent and runs (and is tested) on the host.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`time`] | Wrapping microsecond timestamps, `Clock`, `DeltaTime` |
//! | [`filter`] | Moving average and exponential smoothing filters |
//! | [`control`] | PID controller |
//! | [`input`] | RC pulse capture, channel decoding, value conversion, mode switch |
//! | [`fusion`] | Mahony attitude estimation |
//! | [`motors`] | Motor driver interface and X-configuration mixer |
//! | [`sensors`] | Sensor interface polled by the flight loop |
//! | [`drivers`] | I2C sensor drivers (MPU-6050, HMC5883L, BMP180) |
//! | [`indicator`] | Status LED blinker |
//! | [`console`] | Line-oriented diagnostic console |
//! | [`flight`] | Main loop, flight state machine, console commands |
//! | `hw` | MCU-level clock, PWM, RC capture, USART (target only) |
//!
//! ## Getting Started
//!
//! Run the tests on the host:
//!
//! ```bash
//! cargo test --lib
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cargo run --release --target thumbv7em-none-eabihf
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod console;
pub mod control;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod flight;
pub mod fusion;
pub mod indicator;
pub mod input;
pub mod motors;
pub mod sensors;
pub mod time;

#[cfg(target_os = "none")]
pub mod hw;

pub use error::StartupError;
