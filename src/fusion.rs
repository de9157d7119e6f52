// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Sensor Fusion
//!
//! Attitude estimation from gyroscope, accelerometer and (optionally) magnetometer samples.
//!
//! [`MahonyAhrs`] implements Mahony's complementary filter on a unit quaternion: the measured
//! gravity and magnetic field directions are compared with the directions predicted from the
//! current orientation, and the cross-product error is fed back into the gyro rate through a PI
//! controller before the quaternion is integrated.
//!
//! Attitude vectors are `(roll, pitch, yaw)` in radians. Roll and yaw are in [-π, π], pitch in
//! [-π/2, π/2]. The body frame is x forward (roll), y right (pitch), z down (yaw).

use micromath::F32Ext;
use nalgebra::Vector3;

/// Default proportional gain.
pub const DEFAULT_KP: f32 = 1.4;
/// Default integral gain.
pub const DEFAULT_KI: f32 = 0.02;
/// Proportional gain while fast convergence is enabled.
pub const FAST_CONVERGENCE_KP: f32 = 10.0;

/// Anything that turns sensor samples into an attitude.
pub trait SensorFusion {
    /// Feed one set of samples.
    ///
    /// - `gyro`: angular rate in rad/s
    /// - `accel`, `mag`: any consistent unit, only the direction is used. Pass `None` for `mag`
    ///   when the compass has no valid sample (e.g. saturated).
    /// - `dt_ms`: time since the previous update in milliseconds
    ///
    /// Returns the new `(roll, pitch, yaw)`.
    fn update(
        &mut self,
        gyro: &Vector3<f32>,
        accel: &Vector3<f32>,
        mag: Option<&Vector3<f32>>,
        dt_ms: f32,
    ) -> Vector3<f32>;

    /// Trade noise rejection for a fast initial lock, e.g. while the vehicle settles after power-on.
    fn enable_fast_convergence(&mut self, enable: bool);
}

/// Mahony AHRS with a fast inverse square root for renormalization.
#[derive(Clone, Debug)]
pub struct MahonyAhrs {
    two_kp: f32,
    two_ki: f32,
    fast_convergence: bool,

    /// Orientation of the sensor frame relative to the earth frame
    q: [f32; 4],
    /// Integral feedback, already scaled by `two_ki`
    integral_fb: Vector3<f32>,
}

impl Default for MahonyAhrs {
    fn default() -> Self {
        Self::new(DEFAULT_KP, DEFAULT_KI)
    }
}

impl MahonyAhrs {
    /// `kp` and `ki` are the gains of the PI feedback. `ki == 0` disables integral feedback.
    pub fn new(kp: f32, ki: f32) -> Self {
        Self {
            two_kp: 2.0 * kp,
            two_ki: 2.0 * ki,
            fast_convergence: false,
            q: [1.0, 0.0, 0.0, 0.0],
            integral_fb: Vector3::zeros(),
        }
    }

    /// Current orientation quaternion `(q0, q1, q2, q3)`, `q0` being the scalar part.
    #[inline]
    pub fn quaternion(&self) -> [f32; 4] {
        self.q
    }

    #[inline]
    pub fn is_fast_convergence(&self) -> bool {
        self.fast_convergence
    }

    fn gains(&self) -> (f32, f32) {
        if self.fast_convergence {
            (2.0 * FAST_CONVERGENCE_KP, 0.0)
        } else {
            (self.two_kp, self.two_ki)
        }
    }

    /// Update with gyro, accelerometer and magnetometer. `dt` in seconds.
    fn update_marg(&mut self, gyro: &Vector3<f32>, accel: &Vector3<f32>, mag: &Vector3<f32>, dt: f32) {
        if accel.x == 0.0 && accel.y == 0.0 && accel.z == 0.0 {
            self.integrate(*gyro, dt);
            return;
        }

        let a = *accel * inv_sqrt(accel.norm_squared());
        let m = *mag * inv_sqrt(mag.norm_squared());
        let [q0, q1, q2, q3] = self.q;

        let q0q0 = q0 * q0;
        let q0q1 = q0 * q1;
        let q0q2 = q0 * q2;
        let q0q3 = q0 * q3;
        let q1q1 = q1 * q1;
        let q1q2 = q1 * q2;
        let q1q3 = q1 * q3;
        let q2q2 = q2 * q2;
        let q2q3 = q2 * q3;
        let q3q3 = q3 * q3;

        // reference direction of the earth's magnetic field
        let hx = 2.0 * (m.x * (0.5 - q2q2 - q3q3) + m.y * (q1q2 - q0q3) + m.z * (q1q3 + q0q2));
        let hy = 2.0 * (m.x * (q1q2 + q0q3) + m.y * (0.5 - q1q1 - q3q3) + m.z * (q2q3 - q0q1));
        let bx = (hx * hx + hy * hy).sqrt();
        let bz = 2.0 * (m.x * (q1q3 - q0q2) + m.y * (q2q3 + q0q1) + m.z * (0.5 - q1q1 - q2q2));

        // estimated gravity and magnetic field directions (halved)
        let half_v = Vector3::new(q1q3 - q0q2, q0q1 + q2q3, q0q0 - 0.5 + q3q3);
        let half_w = Vector3::new(
            bx * (0.5 - q2q2 - q3q3) + bz * (q1q3 - q0q2),
            bx * (q1q2 - q0q3) + bz * (q0q1 + q2q3),
            bx * (q0q2 + q1q3) + bz * (0.5 - q1q1 - q2q2),
        );

        let half_e = a.cross(&half_v) + m.cross(&half_w);
        let rate = self.feedback(*gyro, half_e, dt);
        self.integrate(rate, dt);
    }

    /// Update with gyro and accelerometer only. `dt` in seconds.
    fn update_imu(&mut self, gyro: &Vector3<f32>, accel: &Vector3<f32>, dt: f32) {
        if accel.x == 0.0 && accel.y == 0.0 && accel.z == 0.0 {
            self.integrate(*gyro, dt);
            return;
        }

        let a = *accel * inv_sqrt(accel.norm_squared());
        let [q0, q1, q2, q3] = self.q;
        let half_v = Vector3::new(q1 * q3 - q0 * q2, q0 * q1 + q2 * q3, q0 * q0 - 0.5 + q3 * q3);

        let half_e = a.cross(&half_v);
        let rate = self.feedback(*gyro, half_e, dt);
        self.integrate(rate, dt);
    }

    /// Apply PI feedback of the direction error to the measured rate.
    fn feedback(&mut self, mut rate: Vector3<f32>, half_e: Vector3<f32>, dt: f32) -> Vector3<f32> {
        let (two_kp, two_ki) = self.gains();
        if two_ki > 0.0 {
            self.integral_fb += half_e * (two_ki * dt);
            rate += self.integral_fb;
        } else if !self.fast_convergence {
            self.integral_fb = Vector3::zeros();
        }
        rate + half_e * two_kp
    }

    /// First-order integration of the quaternion rate, then renormalize.
    fn integrate(&mut self, rate: Vector3<f32>, dt: f32) {
        let g = rate * (0.5 * dt);
        let [qa, qb, qc, qd] = self.q;
        let mut q = [
            qa + (-qb * g.x - qc * g.y - qd * g.z),
            qb + (qa * g.x + qc * g.z - qd * g.y),
            qc + (qa * g.y - qb * g.z + qd * g.x),
            qd + (qa * g.z + qb * g.y - qc * g.x),
        ];

        let recip_norm = inv_sqrt(q.iter().map(|v| v * v).sum());
        q.iter_mut().for_each(|v| *v *= recip_norm);
        self.q = q;
    }
}

impl SensorFusion for MahonyAhrs {
    fn update(
        &mut self,
        gyro: &Vector3<f32>,
        accel: &Vector3<f32>,
        mag: Option<&Vector3<f32>>,
        dt_ms: f32,
    ) -> Vector3<f32> {
        let dt = dt_ms / 1000.0;
        match mag {
            Some(m) if !(m.x == 0.0 && m.y == 0.0 && m.z == 0.0) => {
                self.update_marg(gyro, accel, m, dt)
            }
            _ => self.update_imu(gyro, accel, dt),
        }
        let [q0, q1, q2, q3] = self.q;
        quaternion_to_roll_pitch_yaw(q0, q1, q2, q3)
    }

    fn enable_fast_convergence(&mut self, enable: bool) {
        self.fast_convergence = enable;
    }
}

/// 1-2-3 Euler angles of a unit quaternion, in the vehicle's convention.
///
/// The estimator's frame has pitch and yaw pointing the other way than the vehicle's
/// (x front, y right, z down), so both are negated here.
pub fn quaternion_to_roll_pitch_yaw(q0: f32, q1: f32, q2: f32, q3: f32) -> Vector3<f32> {
    let roll = (2.0 * (q0 * q1 + q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2));
    let pitch = (2.0 * (q0 * q2 - q3 * q1)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (q0 * q3 + q1 * q2)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3));
    Vector3::new(roll, -pitch, -yaw)
}

/// `x^(-1/2)` by the bit-level initial guess plus one Newton step.
#[inline]
pub fn inv_sqrt(x: f32) -> f32 {
    let half_x = 0.5 * x;
    let y = f32::from_bits(0x5f37_59df - (x.to_bits() >> 1));
    y * (1.5 - half_x * y * y)
}
