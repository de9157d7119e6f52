// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Quadrotor X-configuration mixer.
//!
//! Motor order: 0 front-right, 1 rear-right, 2 rear-left, 3 front-left.
//!
//! Thrust limits are enforced in three steps. The largest overage above a motor's maximum is
//! removed from all motors, then the largest deficit below a motor's minimum is added to all
//! motors. Both keep the differential thrust intact. If a motor still ends up outside its own
//! range, it is clamped and a warning is logged.

use crate::motors::{Motors, PwmOutput, PWM_FREQ_MAX_HZ, PWM_FREQ_MIN_HZ};
use nalgebra::Vector3;

/// Number of motors of an X quadrotor.
pub const NUM_MOTORS: usize = 4;

/// X-configuration quadrotor motor mixer.
pub struct MotorMixer<P: PwmOutput> {
    pwm: P,
    /// PWM channel of each motor
    channels: [usize; NUM_MOTORS],
    min_thrust: [f32; NUM_MOTORS],
    max_thrust: [f32; NUM_MOTORS],
}

impl<P: PwmOutput> MotorMixer<P> {
    /// Create a mixer. The PWM frequency is left untouched.
    ///
    /// `min_thrust` and `max_thrust` are duty cycles in [0, 1], one per motor.
    pub fn new(
        pwm: P,
        channels: [usize; NUM_MOTORS],
        min_thrust: [f32; NUM_MOTORS],
        max_thrust: [f32; NUM_MOTORS],
    ) -> Self {
        Self {
            pwm,
            channels,
            min_thrust,
            max_thrust,
        }
    }

    /// Duty cycle of a pulse of `pulse_us` microseconds at the current PWM frequency.
    pub fn pulse_duty(&self, pulse_us: u32) -> f32 {
        pulse_us as f32 * self.pwm.frequency() as f32 / 1_000_000.0
    }

    #[inline]
    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    pub fn free(self) -> P {
        self.pwm
    }

    /// Compute the per-motor speeds for a throttle and correction without applying them.
    pub fn mix(&self, throttle: f32, roll_pitch_yaw: &Vector3<f32>) -> [f32; NUM_MOTORS] {
        let (roll, pitch, yaw) = (roll_pitch_yaw.x, roll_pitch_yaw.y, roll_pitch_yaw.z);
        let mut thrust = [
            throttle - yaw + (pitch - roll) * 0.5,
            throttle + yaw + (-pitch - roll) * 0.5,
            throttle - yaw + (-pitch + roll) * 0.5,
            throttle + yaw + (pitch + roll) * 0.5,
        ];

        for (i, t) in thrust.iter_mut().enumerate() {
            let (min, max) = (self.min_thrust[i], self.max_thrust[i]);
            *t = min + (*t + 1.0) * (max - min) / 2.0;
        }

        let overage = (0..NUM_MOTORS)
            .map(|i| thrust[i] - self.max_thrust[i])
            .fold(0.0f32, f32::max);
        if overage > 0.0 {
            thrust.iter_mut().for_each(|t| *t -= overage);
        }

        let deficit = (0..NUM_MOTORS)
            .map(|i| self.min_thrust[i] - thrust[i])
            .fold(0.0f32, f32::max);
        if deficit > 0.0 {
            thrust.iter_mut().for_each(|t| *t += deficit);
        }

        for (i, t) in thrust.iter_mut().enumerate() {
            let (min, max) = (self.min_thrust[i], self.max_thrust[i]);
            if *t > max || *t < min {
                warn!("motor {} thrust {} outside [{}, {}], clamping", i, *t, min, max);
                *t = t.clamp(min, max);
            }
        }

        thrust
    }
}

impl<P: PwmOutput> Motors for MotorMixer<P> {
    fn set_thrust(&mut self, throttle: f32, roll_pitch_yaw: &Vector3<f32>) {
        let thrust = self.mix(throttle, roll_pitch_yaw);
        for (motor, speed) in thrust.into_iter().enumerate() {
            self.set_motor_speed(motor, speed);
        }
    }

    fn set_motor_speed(&mut self, motor: usize, speed: f32) {
        if let Some(&channel) = self.channels.get(motor) {
            self.pwm.set_duty(channel, speed.clamp(0.0, 1.0));
        }
    }

    fn motor_speed(&self, motor: usize) -> f32 {
        self.channels
            .get(motor)
            .map_or(0.0, |&channel| self.pwm.duty(channel))
    }

    #[inline]
    fn num_motors(&self) -> usize {
        NUM_MOTORS
    }

    fn min_thrust(&self, motor: usize) -> f32 {
        self.min_thrust.get(motor).copied().unwrap_or(0.0)
    }

    fn max_thrust(&self, motor: usize) -> f32 {
        self.max_thrust.get(motor).copied().unwrap_or(0.0)
    }

    fn set_pwm_freq(&mut self, hz: u32) -> bool {
        if !(PWM_FREQ_MIN_HZ..=PWM_FREQ_MAX_HZ).contains(&hz) {
            return false;
        }
        self.pwm.set_frequency(hz)
    }

    fn pwm_freq(&self) -> u32 {
        self.pwm.frequency()
    }
}
