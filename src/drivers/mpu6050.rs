// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! MPU-6050 gyroscope and accelerometer.
//!
//! One device serves two [`Sensor`]s: [`Mpu6050::split`] hands out a gyro view (rad/s) and an
//! accelerometer view (m/s²) that share the bus handle.

use core::cell::RefCell;
use core::f32::consts::PI;

use embedded_hal::blocking::i2c::{Write, WriteRead};
use nalgebra::Vector3;

use super::{be_i16x3, Device, Error};
use crate::sensors::Sensor;

/// Address with AD0 low.
pub const ADDR: u8 = 0x68;
/// Address with AD0 high.
pub const ADDR_ALT: u8 = 0x69;

pub mod reg {
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const CONFIG: u8 = 0x1A;
    pub const GYRO_CONFIG: u8 = 0x1B;
    pub const ACCEL_CONFIG: u8 = 0x1C;
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    pub const GYRO_XOUT_H: u8 = 0x43;
    pub const PWR_MGMT_1: u8 = 0x6B;
    pub const WHO_AM_I: u8 = 0x75;
}

const WHO_AM_I_VALUE: u8 = 0x68;
/// Clock from the X gyro PLL, sleep off.
const PWR_CLOCK_PLL_XGYRO: u8 = 0x01;

/// LSB per °/s at ±250 °/s.
const GYRO_LSB_PER_DPS: f32 = 131.0;
/// LSB per g at ±2 g.
const ACCEL_LSB_PER_G: f32 = 16384.0;
const STANDARD_GRAVITY: f32 = 9.80665;

/// Gyro and accelerometer are sampled at 1 kHz.
pub const MEASUREMENT_DELAY_US: u32 = 1_000;

pub struct Mpu6050<'a, I2C> {
    dev: Device<'a, I2C>,
}

impl<I2C> Clone for Mpu6050<'_, I2C> {
    fn clone(&self) -> Self {
        Self {
            dev: self.dev.clone(),
        }
    }
}

impl<'a, I2C, E> Mpu6050<'a, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Does not touch the device, call [`initialize`](Self::initialize).
    pub fn new(bus: &'a RefCell<I2C>, addr: u8) -> Self {
        Self {
            dev: Device::new(bus, addr),
        }
    }

    /// Wake up with the PLL clock, ±250 °/s and ±2 g full scale.
    pub fn initialize(&mut self) -> Result<(), Error<E>> {
        self.dev.write_reg(reg::PWR_MGMT_1, PWR_CLOCK_PLL_XGYRO)?;
        self.dev.write_reg(reg::SMPLRT_DIV, 0)?;
        // 188 Hz low-pass, keeps the 1 kHz sample rate
        self.dev.write_reg(reg::CONFIG, 0x01)?;
        self.dev.write_reg(reg::GYRO_CONFIG, 0x00)?;
        self.dev.write_reg(reg::ACCEL_CONFIG, 0x00)?;
        Ok(())
    }

    pub fn test_connection(&self) -> Result<bool, Error<E>> {
        Ok(self.dev.read_reg(reg::WHO_AM_I)? & 0x7E == WHO_AM_I_VALUE)
    }

    /// Angular rate in rad/s.
    pub fn read_rotation(&self) -> Result<Vector3<f32>, Error<E>> {
        let raw = self.read_triplet(reg::GYRO_XOUT_H)?;
        let scale = PI / 180.0 / GYRO_LSB_PER_DPS;
        Ok(Vector3::new(raw[0] as f32, raw[1] as f32, raw[2] as f32) * scale)
    }

    /// Acceleration in m/s².
    pub fn read_acceleration(&self) -> Result<Vector3<f32>, Error<E>> {
        let raw = self.read_triplet(reg::ACCEL_XOUT_H)?;
        let scale = STANDARD_GRAVITY / ACCEL_LSB_PER_G;
        Ok(Vector3::new(raw[0] as f32, raw[1] as f32, raw[2] as f32) * scale)
    }

    fn read_triplet(&self, reg: u8) -> Result<[i16; 3], Error<E>> {
        let mut buf = [0u8; 6];
        self.dev.read_regs(reg, &mut buf)?;
        Ok(be_i16x3(&buf))
    }

    /// Gyro and accelerometer as separate sensors.
    pub fn split(self) -> (Mpu6050Gyro<'a, I2C>, Mpu6050Accel<'a, I2C>) {
        (Mpu6050Gyro(self.clone()), Mpu6050Accel(self))
    }
}

pub struct Mpu6050Gyro<'a, I2C>(Mpu6050<'a, I2C>);

pub struct Mpu6050Accel<'a, I2C>(Mpu6050<'a, I2C>);

impl<I2C, E> Sensor<Vector3<f32>> for Mpu6050Gyro<'_, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn measurement(&mut self, out: &mut Vector3<f32>) -> bool {
        self.0.read_rotation().map(|v| *out = v).is_ok()
    }

    fn min_measurement_delay_us(&self) -> u32 {
        MEASUREMENT_DELAY_US
    }
}

impl<I2C, E> Sensor<Vector3<f32>> for Mpu6050Accel<'_, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn measurement(&mut self, out: &mut Vector3<f32>) -> bool {
        self.0.read_acceleration().map(|v| *out = v).is_ok()
    }

    fn min_measurement_delay_us(&self) -> u32 {
        MEASUREMENT_DELAY_US
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::{BrokenBus, RegisterBus};
    use approx::assert_relative_eq;

    #[test]
    fn initialize_wakes_device() {
        let bus = RefCell::new(RegisterBus::new(ADDR));
        bus.borrow_mut().set(reg::WHO_AM_I, &[0x68]);
        let mut mpu = Mpu6050::new(&bus, ADDR);
        mpu.initialize().unwrap();
        assert!(mpu.test_connection().unwrap());
        assert_eq!(bus.borrow().writes[0], (reg::PWR_MGMT_1, 0x01));
        assert_eq!(bus.borrow().regs[reg::GYRO_CONFIG as usize], 0);
    }

    #[test]
    fn scales_to_si_units() {
        let bus = RefCell::new(RegisterBus::new(ADDR));
        // 1 g on z, -0.5 g on x
        bus.borrow_mut()
            .set(reg::ACCEL_XOUT_H, &[0xE0, 0x00, 0x00, 0x00, 0x40, 0x00]);
        // 131 LSB = 1 °/s on y
        bus.borrow_mut()
            .set(reg::GYRO_XOUT_H, &[0x00, 0x00, 0x00, 131, 0x00, 0x00]);
        let (mut gyro, mut accel) = Mpu6050::new(&bus, ADDR).split();

        let mut a = Vector3::zeros();
        assert!(accel.measurement(&mut a));
        assert_relative_eq!(a.x, -STANDARD_GRAVITY / 2.0);
        assert_relative_eq!(a.z, STANDARD_GRAVITY);

        let mut g = Vector3::zeros();
        assert!(gyro.measurement(&mut g));
        assert_relative_eq!(g.y, PI / 180.0, epsilon = 1e-6);
        assert_eq!(gyro.min_measurement_delay_us(), 1_000);
    }

    #[test]
    fn bus_error_is_no_measurement() {
        let bus = RefCell::new(BrokenBus);
        let (mut gyro, _) = Mpu6050::new(&bus, ADDR).split();
        let mut g = Vector3::new(1.0, 2.0, 3.0);
        assert!(!gyro.measurement(&mut g));
        assert_eq!(g, Vector3::new(1.0, 2.0, 3.0));
        assert!(matches!(
            Mpu6050::new(&bus, ADDR).test_connection(),
            Err(Error::Bus(()))
        ));
    }
}
