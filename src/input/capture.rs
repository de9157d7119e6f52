// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! RC pulse capture.
//!
//! Edge interrupts write timestamps into a capture table; the main loop reads a snapshot of the
//! table through [`PulseSource`]. Two tables exist:
//!
//! - [`EdgeTable`] - one slot per GPIO pin holding the last rising and falling edge (PWM, one pin
//!   per channel).
//! - [`PpmDecoder`] - a single PPM-sum pin. A gap longer than [`PPM_SYNC_GAP_US`] starts a frame and
//!   every following pulse interval lands in the next slot.
//!
//! Both are plain data; the board layer wraps them in a critical-section mutex shared with the
//! interrupt handler.

use crate::time::{time_after, Timestamp};

/// Gap between two PPM rising edges that marks the start of a frame.
pub const PPM_SYNC_GAP_US: u32 = 2_700;

/// Edge timestamps of the latest pulse seen in one capture slot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PulseEdges {
    /// Rising edge (pulse start)
    pub high_us: Timestamp,
    /// Falling edge (pulse end)
    pub low_us: Timestamp,
}

impl PulseEdges {
    /// True if the falling edge closes the current pulse (it follows the rising edge).
    #[inline]
    pub fn is_complete(&self) -> bool {
        time_after(self.low_us, self.high_us)
    }

    /// Pulse width in microseconds.
    #[inline]
    pub fn width_us(&self) -> u32 {
        self.low_us.wrapping_sub(self.high_us)
    }
}

/// Snapshot access to a capture table.
pub trait PulseSource {
    /// Copy the edges of slots `0..out.len()` into `out`.
    ///
    /// Implementations shared with an interrupt handler must copy the whole range inside one
    /// critical section so a pulse's two edges always come from the same pulse.
    fn snapshot(&self, out: &mut [PulseEdges]);
}

/// Last edge timestamps for each of `N` GPIO pins.
#[derive(Copy, Clone, Debug)]
pub struct EdgeTable<const N: usize> {
    edges: [PulseEdges; N],
}

impl<const N: usize> Default for EdgeTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EdgeTable<N> {
    pub const fn new() -> Self {
        Self {
            edges: [PulseEdges {
                high_us: 0,
                low_us: 0,
            }; N],
        }
    }

    /// Record an edge on `pin`. Called from the edge interrupt.
    pub fn on_edge(&mut self, pin: usize, rising: bool, now: Timestamp) {
        if let Some(slot) = self.edges.get_mut(pin) {
            if rising {
                slot.high_us = now;
            } else {
                slot.low_us = now;
            }
        }
    }
}

impl<const N: usize> PulseSource for EdgeTable<N> {
    fn snapshot(&self, out: &mut [PulseEdges]) {
        for (dst, src) in out.iter_mut().zip(self.edges.iter()) {
            *dst = *src;
        }
    }
}

/// PPM-sum frame decoder for up to `N` channels.
#[derive(Copy, Clone, Debug)]
pub struct PpmDecoder<const N: usize> {
    pulses: [PulseEdges; N],
    last_edge: Option<Timestamp>,
    /// Slot of the next pulse; `None` until a sync gap was seen.
    next_slot: Option<usize>,
}

impl<const N: usize> Default for PpmDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PpmDecoder<N> {
    pub const fn new() -> Self {
        Self {
            pulses: [PulseEdges {
                high_us: 0,
                low_us: 0,
            }; N],
            last_edge: None,
            next_slot: None,
        }
    }

    /// Record a rising edge on the PPM pin. Called from the edge interrupt.
    pub fn on_rising_edge(&mut self, now: Timestamp) {
        let last = match self.last_edge.replace(now) {
            Some(last) => last,
            None => return,
        };

        if now.wrapping_sub(last) > PPM_SYNC_GAP_US {
            self.next_slot = Some(0);
            return;
        }

        if let Some(slot) = self.next_slot {
            if slot < N {
                self.pulses[slot] = PulseEdges {
                    high_us: last,
                    low_us: now,
                };
                self.next_slot = Some(slot + 1);
            } else {
                // more pulses than slots: ignore until the next sync gap
                self.next_slot = None;
            }
        }
    }
}

impl<const N: usize> PulseSource for PpmDecoder<N> {
    fn snapshot(&self, out: &mut [PulseEdges]) {
        for (dst, src) in out.iter_mut().zip(self.pulses.iter()) {
            *dst = *src;
        }
    }
}
