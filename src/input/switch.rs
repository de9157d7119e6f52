// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Multi-position switch read from an RC channel.

use crate::input::{Channel, InputControl};
use micromath::F32Ext;

/// A channel discretized into `num_states` equally wide positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InputSwitch {
    channel: Channel,
    num_states: u8,
}

impl InputSwitch {
    /// `num_states` below 2 is raised to 2.
    pub fn new(channel: Channel, num_states: u8) -> Self {
        Self {
            channel,
            num_states: num_states.max(2),
        }
    }

    #[inline]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    #[inline]
    pub fn num_states(&self) -> u8 {
        self.num_states
    }

    /// Map a raw value in [-1, 1] to a state in `0..num_states`.
    pub fn state_for(&self, raw: f32) -> u8 {
        let n = self.num_states as f32;
        let state = (((raw.clamp(-1.0, 1.0) + 1.0) / 2.0) * n).floor();
        (state as u8).min(self.num_states - 1)
    }

    /// Current position. Does not consume the channel's changed flag.
    pub fn state(&self, input: &InputControl<'_>) -> u8 {
        self.state_for(input.control_value_raw(self.channel))
    }

    pub fn is_on(&self, input: &InputControl<'_>) -> bool {
        self.state(input) == self.num_states - 1
    }

    pub fn is_off(&self, input: &InputControl<'_>) -> bool {
        self.state(input) == 0
    }
}
