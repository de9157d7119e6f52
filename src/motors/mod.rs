// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Motor Output
//!
//! Thrust commands for the ESCs.
//!
//! A motor speed is the PWM duty cycle in [0, 1] of the ESC signal. Every motor carries its own
//! `[min_thrust, max_thrust]` range, fixed at construction: the minimum keeps the ESC armed at
//! idle, the maximum bounds the pulse the ESC accepts.
//!
//! ## Modules
//!
//! - [`mixer`] - X-configuration mixer on top of a [`PwmOutput`].

pub mod mixer;

pub use mixer::MotorMixer;

use nalgebra::Vector3;

/// Lowest PWM frequency accepted for ESC signals.
pub const PWM_FREQ_MIN_HZ: u32 = 50;
/// Highest PWM frequency accepted for ESC signals.
pub const PWM_FREQ_MAX_HZ: u32 = 400;

/// A bank of PWM channels sharing one frequency.
pub trait PwmOutput {
    /// Set the duty cycle of `channel`, in [0, 1].
    fn set_duty(&mut self, channel: usize, duty: f32);

    /// Current duty cycle of `channel`, in [0, 1].
    fn duty(&self, channel: usize) -> f32;

    /// Change the frequency of every channel. Returns false if `hz` is not supported.
    fn set_frequency(&mut self, hz: u32) -> bool;

    fn frequency(&self) -> u32;
}

/// Motor driver interface used by the flight loop and the console.
pub trait Motors {
    /// Mix a throttle and roll/pitch/yaw corrections, all roughly in [-1, 1], onto the motors.
    fn set_thrust(&mut self, throttle: f32, roll_pitch_yaw: &Vector3<f32>);

    /// Set one motor to `speed` in [0, 1]. Out of range motors are ignored.
    fn set_motor_speed(&mut self, motor: usize, speed: f32);

    fn motor_speed(&self, motor: usize) -> f32;

    fn num_motors(&self) -> usize;

    fn min_thrust(&self, motor: usize) -> f32;

    fn max_thrust(&self, motor: usize) -> f32;

    fn set_pwm_freq(&mut self, hz: u32) -> bool;

    fn pwm_freq(&self) -> u32;

    /// Idle every motor at its minimum thrust.
    fn set_motor_speed_min(&mut self) {
        for motor in 0..self.num_motors() {
            let min = self.min_thrust(motor);
            self.set_motor_speed(motor, min);
        }
    }
}
