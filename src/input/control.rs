// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! RC input handling.
//!
//! [`InputControl`] decodes captured RC pulses into per-channel values:
//!
//! 1. pulse width (ms) → `(width + offset) * scaling`, which calibration makes land in [-1, 1]
//! 2. clamp to [-1, 1] and smooth with a short moving average → "raw" value
//! 3. [`ValueConverter`] → "converted" value in engineering units
//!
//! Every update sets the channel's changed flag; the `take_*` readers clear it, so each update is
//! consumed exactly once.

use crate::filter::{MovingAverage, Smoothing};
use crate::input::capture::{PulseEdges, PulseSource};
use crate::input::converter::ValueConverter;
use crate::input::{Channel, NUM_CHANNELS};
use crate::time::Timestamp;

/// Length of the per-channel smoothing window.
pub const INPUT_FILTER_LEN: usize = 4;

/// Largest capture slot index (+1) a channel may map to.
pub const MAX_CAPTURE_SLOTS: usize = 16;

/// How the receiver delivers channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PulseDecoding {
    /// One GPIO pin per channel; slots are pin indexes.
    Pwm,
    /// All channels on one pin; slots are positions in the PPM frame.
    PpmSum,
}

#[derive(Copy, Clone, Debug)]
struct ChannelState {
    slot: Option<usize>,
    offset: f32,
    scaling: f32,
    last_low_us: Timestamp,

    raw: f32,
    converted: f32,
    changed: bool,
    filter: MovingAverage,
    converter: ValueConverter,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            slot: None,
            offset: 0.0,
            scaling: 1.0,
            last_low_us: 0,
            raw: 0.0,
            converted: 0.0,
            changed: false,
            filter: MovingAverage::new(INPUT_FILTER_LEN),
            converter: ValueConverter::default(),
        }
    }
}

/// RC input channels fed from a pulse capture table.
pub struct InputControl<'a> {
    source: &'a dyn PulseSource,
    decoding: PulseDecoding,
    channels: [ChannelState; NUM_CHANNELS],
}

impl<'a> InputControl<'a> {
    /// Create an input without any channel mapped.
    pub fn new(source: &'a dyn PulseSource, decoding: PulseDecoding) -> Self {
        Self {
            source,
            decoding,
            channels: [ChannelState::new(); NUM_CHANNELS],
        }
    }

    /// PWM receiver with yaw, pitch, roll and throttle on the given GPIO pins.
    pub fn pwm(source: &'a dyn PulseSource, pins: [usize; 4]) -> Self {
        Self::new(source, PulseDecoding::Pwm).with_primary_slots(pins)
    }

    /// PPM-sum receiver with yaw, pitch, roll and throttle at the given frame positions.
    pub fn ppm_sum(source: &'a dyn PulseSource, order: [usize; 4]) -> Self {
        Self::new(source, PulseDecoding::PpmSum).with_primary_slots(order)
    }

    fn with_primary_slots(mut self, slots: [usize; 4]) -> Self {
        for (channel, slot) in Channel::PRIMARY.iter().zip(slots) {
            self.map_channel(*channel, slot);
        }
        self
    }

    /// Read `channel` from capture slot `slot` (pin index or PPM position).
    pub fn map_channel(&mut self, channel: Channel, slot: usize) {
        if slot < MAX_CAPTURE_SLOTS {
            self.channels[channel.index()].slot = Some(slot);
        }
    }

    /// Builder form of [`map_channel`](Self::map_channel).
    pub fn with_channel(mut self, channel: Channel, slot: usize) -> Self {
        self.map_channel(channel, slot);
        self
    }

    #[inline]
    pub fn decoding(&self) -> PulseDecoding {
        self.decoding
    }

    /// Calibration: `offset` is added to the pulse width in milliseconds before scaling.
    pub fn set_offset(&mut self, channel: Channel, offset: f32) {
        self.channels[channel.index()].offset = offset;
    }

    pub fn set_offset_all(&mut self, offset: f32) {
        self.channels.iter_mut().for_each(|c| c.offset = offset);
    }

    /// Calibration: pick `scaling` so that the offset pulse width spans [-1, 1].
    pub fn set_scaling(&mut self, channel: Channel, scaling: f32) {
        self.channels[channel.index()].scaling = scaling;
    }

    pub fn set_scaling_all(&mut self, scaling: f32) {
        self.channels.iter_mut().for_each(|c| c.scaling = scaling);
    }

    /// Poll the capture table once. Called once per main loop iteration.
    pub fn update(&mut self, now: Timestamp) {
        let slots = self
            .channels
            .iter()
            .filter_map(|c| c.slot)
            .max()
            .map_or(0, |s| s + 1);
        if slots == 0 {
            return;
        }

        let mut edges = [PulseEdges::default(); MAX_CAPTURE_SLOTS];
        self.source.snapshot(&mut edges[..slots]);

        for channel in Channel::ALL {
            let state = &mut self.channels[channel.index()];
            let pulse = match state.slot {
                Some(slot) => edges[slot],
                None => continue,
            };
            // A wrap of the timer can hide at most one pulse here.
            if pulse.low_us == state.last_low_us || !pulse.is_complete() {
                continue;
            }
            state.last_low_us = pulse.low_us;

            let width_ms = pulse.width_us() as f32 / 1000.0;
            let value = (width_ms + state.offset) * state.scaling;
            self.update_value(channel, value, now);
        }
    }

    /// Push a normalized value into `channel`: clamp, smooth, convert and flag as changed.
    pub fn update_value(&mut self, channel: Channel, value: f32, now: Timestamp) {
        let state = &mut self.channels[channel.index()];
        state.raw = state.filter.next_value(value.clamp(-1.0, 1.0));
        state.converted = state.converter.next_value(state.raw, now);
        state.changed = true;
    }

    /// Filtered value in [-1, 1] if it changed since the last `take_*` call.
    pub fn take_control_value_raw(&mut self, channel: Channel) -> Option<f32> {
        let state = &mut self.channels[channel.index()];
        core::mem::take(&mut state.changed).then_some(state.raw)
    }

    /// Converted value if it changed since the last `take_*` call.
    pub fn take_control_value(&mut self, channel: Channel) -> Option<f32> {
        let state = &mut self.channels[channel.index()];
        core::mem::take(&mut state.changed).then_some(state.converted)
    }

    /// Filtered value in [-1, 1], without touching the changed flag.
    #[inline]
    pub fn control_value_raw(&self, channel: Channel) -> f32 {
        self.channels[channel.index()].raw
    }

    /// Converted value, without touching the changed flag.
    #[inline]
    pub fn control_value(&self, channel: Channel) -> f32 {
        self.channels[channel.index()].converted
    }

    #[inline]
    pub fn has_changed(&self, channel: Channel) -> bool {
        self.channels[channel.index()].changed
    }

    /// Start the elapsed-time trackers of all converters at `now`.
    pub fn start_timing(&mut self, now: Timestamp) {
        for ch in self.channels.iter_mut() {
            ch.converter.start_timing(now);
        }
    }

    pub fn converter(&mut self, channel: Channel) -> &mut ValueConverter {
        &mut self.channels[channel.index()].converter
    }
}
