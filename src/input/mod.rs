// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # RC Input
//!
//! Turns receiver pulses into stick and switch values.
//!
//! ## Modules
//!
//! - [`capture`] - edge timestamp tables written from interrupts (PWM and PPM-sum).
//! - [`control`] - per-channel decoding, smoothing and change tracking.
//! - [`converter`] - mapping of normalized values to setpoints.
//! - [`switch`] - discretized switch positions.

pub mod capture;
pub mod control;
pub mod converter;
pub mod switch;

pub use capture::{EdgeTable, PpmDecoder, PulseEdges, PulseSource};
pub use control::{InputControl, PulseDecoding};
pub use converter::{Conversion, ValueConverter};
pub use switch::InputSwitch;

/// Number of logical RC channels.
pub const NUM_CHANNELS: usize = 8;

/// Logical RC channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Yaw,
    Pitch,
    Roll,
    Throttle,
    Aux1,
    Aux2,
    Aux3,
    Aux4,
}

impl Channel {
    pub const ALL: [Channel; NUM_CHANNELS] = [
        Channel::Yaw,
        Channel::Pitch,
        Channel::Roll,
        Channel::Throttle,
        Channel::Aux1,
        Channel::Aux2,
        Channel::Aux3,
        Channel::Aux4,
    ];

    /// The four stick channels, in the order receivers are usually wired.
    pub const PRIMARY: [Channel; 4] = [
        Channel::Yaw,
        Channel::Pitch,
        Channel::Roll,
        Channel::Throttle,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}
