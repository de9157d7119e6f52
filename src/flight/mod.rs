// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Flight Control
//!
//! The main loop and everything it decides.
//!
//! ## Modules
//!
//! - [`state`] - flight modes and the pure transition function between them.
//! - [`controller`] - the polling loop tying sensors, fusion, inputs, PIDs and motors together.
//! - [`commands`] - diagnostic console commands served from the loop.

pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{FlightConfig, FlightController, LoopFrequency};
pub use state::{Action, Event, FlightState, SwitchPosition, Transition};

use core::f32::consts::PI;
use nalgebra::Vector3;

use crate::control::Pid;
use crate::input::{Channel, InputControl};

/// Index of the roll, pitch and yaw axes in attitude vectors and PID arrays.
pub const AXIS_ROLL: usize = 0;
pub const AXIS_PITCH: usize = 1;
pub const AXIS_YAW: usize = 2;

pub const DEFAULT_PID_KP: f32 = 0.15;
pub const DEFAULT_PID_KI: f32 = 0.0003;
pub const DEFAULT_PID_KD: f32 = 0.002;

/// Run-time tunables of the flight loop.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tuning {
    /// Cutoff of the PID derivative filters, retuned to the loop rate once per second
    pub pid_cutoff_hz: f32,
    /// Cutoff of the altitude filter, retuned to the attitude update rate once per second
    pub altitude_cutoff_hz: f32,
    /// Added to every fused attitude to compensate the sensor mounting
    pub attitude_offset: Vector3<f32>,
    /// Settling time after power-on before leaving Init
    pub init_delay_ms: u32,
    /// How long the motors are held at minimum during initialization
    pub motor_init_ms: u32,
    pub blink_landed_ms: u32,
    pub blink_manual_ms: u32,
    pub blink_flying_ms: u32,
    /// Scale of the raw sticks in manual mode
    pub manual_gain: f32,
    /// Stay in Debug after Init and never drive the motors automatically
    pub debug: bool,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            pid_cutoff_hz: 25.0,
            altitude_cutoff_hz: 0.15,
            attitude_offset: Vector3::new(0.026, 0.048, 0.0),
            init_delay_ms: 800,
            motor_init_ms: 3500,
            blink_landed_ms: 600,
            blink_manual_ms: 100,
            blink_flying_ms: 300,
            manual_gain: 1.0,
            debug: cfg!(feature = "debug-mode"),
        }
    }
}

impl Tuning {
    /// Blink period that shows `state`, `None` to keep the LED steady.
    pub fn blink_rate_ms(&self, state: FlightState) -> Option<u32> {
        match state {
            FlightState::Init => None,
            FlightState::Debug | FlightState::Landed => Some(self.blink_landed_ms),
            FlightState::Manual => Some(self.blink_manual_ms),
            FlightState::Flying => Some(self.blink_flying_ms),
        }
    }
}

/// Roll, pitch and yaw PIDs with the default gains.
pub fn default_pids() -> [Pid; 3] {
    core::array::from_fn(|_| Pid::new(DEFAULT_PID_KP, DEFAULT_PID_KI, DEFAULT_PID_KD))
}

/// Stick converters of the stock transmitter setup: roll and pitch map to ±45°, yaw is a rate
/// integrated over [-π, π], throttle passes through.
pub fn configure_default_converters(input: &mut InputControl<'_>) {
    let max_tilt = 45.0 * PI / 180.0;
    input.converter(Channel::Roll).set_absolute(0.0, max_tilt);
    input.converter(Channel::Pitch).set_absolute(0.0, max_tilt);
    input
        .converter(Channel::Yaw)
        .set_relative(0.0, 0.001, -PI, PI, true);
    input.converter(Channel::Throttle).set_absolute(0.0, 1.0);
}

/// Wrap an angle difference into (-π, π].
pub fn wrap_angle(mut a: f32) -> f32 {
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wrap_angle_range() {
        assert_relative_eq!(wrap_angle(0.5), 0.5);
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(1.5 * PI), -0.5 * PI, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-1.5 * PI), 0.5 * PI, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(5.0 * PI + 0.1), -PI + 0.1, epsilon = 1e-4);
    }

    #[test]
    fn blink_rates_follow_state() {
        let t = Tuning::default();
        assert_eq!(t.blink_rate_ms(FlightState::Landed), Some(600));
        assert_eq!(t.blink_rate_ms(FlightState::Manual), Some(100));
        assert_eq!(t.blink_rate_ms(FlightState::Flying), Some(300));
        assert_eq!(t.blink_rate_ms(FlightState::Init), None);
    }

    #[test]
    fn default_pid_gains() {
        let pids = default_pids();
        for pid in &pids {
            assert_eq!(pid.kp(), DEFAULT_PID_KP);
            assert_eq!(pid.ki(), DEFAULT_PID_KI);
            assert_eq!(pid.kd(), DEFAULT_PID_KD);
            assert_eq!(pid.imax(), 100.0);
        }
    }
}
