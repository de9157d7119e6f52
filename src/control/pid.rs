// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! PID controller with a low-pass filtered derivative term.
//!
//! Works in `no_std` and does not allocate memory.
//!
//! The caller computes the error (`desired - current`) and passes the same value to the P, I and D
//! terms. Positive error produces positive output. `dt` is in milliseconds.

use crate::filter::{Ema, Smoothing, SmoothingFilter};

/// Default integrator clamp.
pub const DEFAULT_IMAX: f32 = 100.0;

/// Default smoothing factor of the derivative EMA.
pub const DEFAULT_D_ALPHA: f32 = 0.7;

/// PID controller with tunable gains and integrator clamp.
#[derive(Clone, Debug)]
pub struct Pid {
    /// Proportional gain
    kp: f32,
    /// Integral gain
    ki: f32,
    /// Derivative gain
    kd: f32,
    /// Integrator clamp, applied symmetrically
    imax: f32,

    /// Integrator state
    integrator: f32,
    /// Last input (for derivative term)
    last_input: f32,
    /// Last filtered derivative; `None` right after a reset
    last_derivative: Option<f32>,

    /// Derivative low-pass
    d_filter: SmoothingFilter,
}

impl Pid {
    /// Create a new PID controller.
    ///
    /// `kp`, `ki`, `kd` are the gain constants.
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            imax: DEFAULT_IMAX,

            integrator: 0.0,
            last_input: 0.0,
            last_derivative: None,

            d_filter: Ema::new(DEFAULT_D_ALPHA).into(),
        }
    }

    /// Set the integrator clamp. The sign is ignored.
    pub fn with_imax(mut self, imax: f32) -> Self {
        self.imax = imax.max(-imax);
        self
    }

    /// Replace the derivative low-pass.
    pub fn with_derivative_filter(mut self, filter: impl Into<SmoothingFilter>) -> Self {
        self.d_filter = filter.into();
        self
    }

    /// Proportional term.
    #[inline]
    pub fn get_p(&self, error: f32) -> f32 {
        error * self.kp
    }

    /// Integral term. Accumulates only when `ki` and `dt` are non-zero.
    pub fn get_i(&mut self, error: f32, dt: f32) -> f32 {
        if self.ki == 0.0 || dt == 0.0 {
            return 0.0;
        }
        self.integrator += error * self.ki * dt;
        self.integrator = self.integrator.clamp(-self.imax, self.imax);
        self.integrator
    }

    /// Derivative term.
    ///
    /// The first call after [`reset_i`](Self::reset_i) returns 0 and only records `input`, so a step
    /// in the error does not kick the output.
    pub fn get_d(&mut self, input: f32, dt: f32) -> f32 {
        if self.kd == 0.0 || dt == 0.0 {
            return 0.0;
        }

        if self.last_derivative.is_none() {
            self.last_derivative = Some(0.0);
            self.last_input = input;
            return 0.0;
        }

        let derivative = self.d_filter.next_value((input - self.last_input) / dt);
        self.last_input = input;
        self.last_derivative = Some(derivative);
        self.kd * derivative
    }

    #[inline]
    pub fn get_pi(&mut self, error: f32, dt: f32) -> f32 {
        self.get_p(error) + self.get_i(error, dt)
    }

    #[inline]
    pub fn get_pid(&mut self, error: f32, dt: f32) -> f32 {
        self.get_p(error) + self.get_i(error, dt) + self.get_d(error, dt)
    }

    /// Zero the integrator and mark the derivative invalid.
    pub fn reset_i(&mut self) {
        self.integrator = 0.0;
        self.last_derivative = None;
    }

    #[inline]
    pub fn kp(&self) -> f32 {
        self.kp
    }

    #[inline]
    pub fn ki(&self) -> f32 {
        self.ki
    }

    #[inline]
    pub fn kd(&self) -> f32 {
        self.kd
    }

    #[inline]
    pub fn imax(&self) -> f32 {
        self.imax
    }

    pub fn set_kp(&mut self, v: f32) {
        self.kp = v;
    }

    pub fn set_ki(&mut self, v: f32) {
        self.ki = v;
    }

    pub fn set_kd(&mut self, v: f32) {
        self.kd = v;
    }

    pub fn set_imax(&mut self, v: f32) {
        self.imax = v.max(-v);
    }

    #[inline]
    pub fn integrator(&self) -> f32 {
        self.integrator
    }

    pub fn set_integrator(&mut self, i: f32) {
        self.integrator = i;
    }

    /// False between a reset and the next derivative evaluation.
    #[inline]
    pub fn derivative_valid(&self) -> bool {
        self.last_derivative.is_some()
    }

    /// Derivative low-pass, e.g. to retune its cutoff to the measured loop rate.
    #[inline]
    pub fn d_filter(&mut self) -> &mut SmoothingFilter {
        &mut self.d_filter
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}
