// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Control Algorithms
//!
//! Reusable building blocks for the attitude stabilization loop.
//!
//! ## Modules
//!
//! - [`pid`] - PID controller with a filtered derivative term.

pub mod pid;

pub use pid::Pid;
