// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! HMC5883L 3-axis compass.

use core::cell::RefCell;

use embedded_hal::blocking::i2c::{Write, WriteRead};
use nalgebra::Vector3;

use super::{be_i16x3, Device, Error};
use crate::sensors::Sensor;

pub const ADDR: u8 = 0x1E;

pub mod reg {
    pub const CONFIG_A: u8 = 0x00;
    pub const CONFIG_B: u8 = 0x01;
    pub const MODE: u8 = 0x02;
    /// X, Z, Y in this order
    pub const DATA_X_H: u8 = 0x03;
    pub const ID_A: u8 = 0x0A;
}

const ID: [u8; 3] = *b"H43";

/// 8-sample averaging, 75 Hz output rate, normal bias.
const CONFIG_A_AVG8_75HZ: u8 = 0b0111_1000;
/// ±1.3 Ga range.
const CONFIG_B_GAIN_1090: u8 = 0b0010_0000;
const MODE_CONTINUOUS: u8 = 0x00;
const LSB_PER_GAUSS: f32 = 1090.0;

/// Value of an axis whose ADC over- or underflowed.
pub const OVERFLOW: i16 = -4096;

/// Half a 75 Hz period, readouts are not synchronized to the device.
pub const MEASUREMENT_DELAY_US: u32 = 13_334 / 2;

pub struct Hmc5883l<'a, I2C> {
    dev: Device<'a, I2C>,
    saturated: bool,
}

impl<'a, I2C, E> Hmc5883l<'a, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    pub fn new(bus: &'a RefCell<I2C>) -> Self {
        Self {
            dev: Device::new(bus, ADDR),
            saturated: false,
        }
    }

    /// Continuous measurement at 75 Hz with ±1.3 Ga range.
    pub fn initialize(&mut self) -> Result<(), Error<E>> {
        self.dev.write_reg(reg::CONFIG_A, CONFIG_A_AVG8_75HZ)?;
        self.dev.write_reg(reg::CONFIG_B, CONFIG_B_GAIN_1090)?;
        self.dev.write_reg(reg::MODE, MODE_CONTINUOUS)?;
        Ok(())
    }

    pub fn test_connection(&self) -> Result<bool, Error<E>> {
        let mut id = [0u8; 3];
        self.dev.read_regs(reg::ID_A, &mut id)?;
        Ok(id == ID)
    }

    /// Raw X, Y, Z counts.
    pub fn read_raw(&self) -> Result<[i16; 3], Error<E>> {
        let mut buf = [0u8; 6];
        self.dev.read_regs(reg::DATA_X_H, &mut buf)?;
        let [x, z, y] = be_i16x3(&buf);
        Ok([x, y, z])
    }

    /// Field in gauss. Marks the compass as saturated if any axis overflowed.
    pub fn read_field(&mut self) -> Result<Vector3<f32>, Error<E>> {
        let raw = self.read_raw()?;
        self.saturated = raw.contains(&OVERFLOW);
        Ok(Vector3::new(raw[0] as f32, raw[1] as f32, raw[2] as f32) / LSB_PER_GAUSS)
    }

    /// Whether the last reading overflowed on any axis.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}

impl<I2C, E> Sensor<Vector3<f32>> for Hmc5883l<'_, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn measurement(&mut self, out: &mut Vector3<f32>) -> bool {
        self.read_field().map(|v| *out = v).is_ok()
    }

    fn min_measurement_delay_us(&self) -> u32 {
        MEASUREMENT_DELAY_US
    }

    fn saturated(&self) -> bool {
        self.saturated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::RegisterBus;
    use approx::assert_relative_eq;

    #[test]
    fn identifies_and_configures() {
        let bus = RefCell::new(RegisterBus::new(ADDR));
        bus.borrow_mut().set(reg::ID_A, b"H43");
        let mut compass = Hmc5883l::new(&bus);
        assert!(compass.test_connection().unwrap());
        compass.initialize().unwrap();
        assert_eq!(
            bus.borrow().writes,
            [(0x00, 0x78), (0x01, 0x20), (0x02, 0x00)]
        );
    }

    #[test]
    fn reorders_axes_and_scales_to_gauss() {
        let bus = RefCell::new(RegisterBus::new(ADDR));
        // x = 1090, z = -545, y = 218
        let [xh, xl] = 1090i16.to_be_bytes();
        let [zh, zl] = (-545i16).to_be_bytes();
        let [yh, yl] = 218i16.to_be_bytes();
        bus.borrow_mut()
            .set(reg::DATA_X_H, &[xh, xl, zh, zl, yh, yl]);
        let mut compass = Hmc5883l::new(&bus);

        let mut field = Vector3::zeros();
        assert!(compass.measurement(&mut field));
        assert_relative_eq!(field, Vector3::new(1.0, 0.2, -0.5), epsilon = 1e-6);
        assert!(!compass.saturated());
    }

    #[test]
    fn overflow_marks_saturation() {
        let bus = RefCell::new(RegisterBus::new(ADDR));
        let [h, l] = OVERFLOW.to_be_bytes();
        bus.borrow_mut().set(reg::DATA_X_H, &[0, 10, h, l, 0, 20]);
        let mut compass = Hmc5883l::new(&bus);

        let mut field = Vector3::zeros();
        assert!(compass.measurement(&mut field));
        assert!(compass.saturated());

        bus.borrow_mut().set(reg::DATA_X_H, &[0, 10, 0, 30, 0, 20]);
        assert!(compass.measurement(&mut field));
        assert!(!compass.is_saturated());
    }
}
