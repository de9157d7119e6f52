// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! I2C sensor drivers that sit above the bus and below the flight loop. Each is generic over the
//! embedded-hal 0.2 blocking I2C traits and borrows the bus through a `RefCell`, so all sensors on
//! one board share a single bus instance. [`SensorSet::start`] brings all of them up.
//!
//! ## Existing drivers
//!
//! - [`mpu6050`] – InvenSense MPU-6050 gyroscope and accelerometer
//! - [`hmc5883l`] – Honeywell HMC5883L 3-axis compass
//! - [`bmp180`] – Bosch BMP180 barometer

pub mod bmp180;
pub mod hmc5883l;
pub mod mpu6050;

pub use bmp180::Bmp180;
pub use hmc5883l::Hmc5883l;
pub use mpu6050::{Mpu6050, Mpu6050Accel, Mpu6050Gyro};

use core::cell::RefCell;
use embedded_hal::blocking::i2c::{Write, WriteRead};
use thiserror::Error;

use crate::error::{check_device, StartupError};
use crate::time::Clock;

/// Driver error.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// The bus reported an error.
    #[error("I2C bus error")]
    Bus(E),
    /// The bus is borrowed by another driver.
    #[error("I2C bus busy")]
    BusBusy,
    /// The device returned data its compensation cannot be applied to.
    #[error("invalid sensor data")]
    InvalidData,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Bus(e)
    }
}

/// The sensors of the board, all on one bus. A device is `None` if it was skipped in debug mode.
pub struct SensorSet<'a, I2C> {
    pub gyro: Option<Mpu6050Gyro<'a, I2C>>,
    pub accel: Option<Mpu6050Accel<'a, I2C>>,
    pub compass: Option<Hmc5883l<'a, I2C>>,
    pub barometer: Option<Bmp180<'a, I2C>>,
}

impl<'a, I2C, E> SensorSet<'a, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Initialize and test every sensor.
    ///
    /// A device that does not answer aborts startup, unless `debug` is set.
    pub fn start(
        bus: &'a RefCell<I2C>,
        clock: &dyn Clock,
        debug: bool,
    ) -> Result<Self, StartupError> {
        let mut mpu = Mpu6050::new(bus, mpu6050::ADDR);
        let imu_ok = mpu.initialize().and_then(|_| mpu.test_connection());
        let (gyro, accel) =
            if check_device(imu_ok, StartupError::GyroAccelNotConnected, debug)? {
                let (g, a) = mpu.split();
                (Some(g), Some(a))
            } else {
                (None, None)
            };

        let mut compass = Hmc5883l::new(bus);
        let compass_ok = compass.test_connection().and_then(|ok| {
            compass.initialize()?;
            Ok(ok)
        });
        let compass = check_device(compass_ok, StartupError::CompassNotConnected, debug)?
            .then_some(compass);

        let mut barometer = Bmp180::new(bus, bmp180::Oversampling::UltraHighResolution);
        let baro_ok = barometer.test_connection().and_then(|ok| {
            if ok {
                barometer.initialize(clock)?;
            }
            Ok(ok)
        });
        let barometer = check_device(baro_ok, StartupError::BarometerNotConnected, debug)?
            .then_some(barometer);

        info!("sensors started");
        Ok(Self {
            gyro,
            accel,
            compass,
            barometer,
        })
    }
}

/// Register access to one device on a shared bus.
pub(crate) struct Device<'a, I2C> {
    bus: &'a RefCell<I2C>,
    addr: u8,
}

impl<I2C> Clone for Device<'_, I2C> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus,
            addr: self.addr,
        }
    }
}

impl<'a, I2C, E> Device<'a, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    pub(crate) fn new(bus: &'a RefCell<I2C>, addr: u8) -> Self {
        Self { bus, addr }
    }

    pub(crate) fn write_reg(&self, reg: u8, value: u8) -> Result<(), Error<E>> {
        let mut bus = self.bus.try_borrow_mut().map_err(|_| Error::BusBusy)?;
        bus.write(self.addr, &[reg, value])?;
        Ok(())
    }

    pub(crate) fn read_regs(&self, reg: u8, buf: &mut [u8]) -> Result<(), Error<E>> {
        let mut bus = self.bus.try_borrow_mut().map_err(|_| Error::BusBusy)?;
        bus.write_read(self.addr, &[reg], buf)?;
        Ok(())
    }

    pub(crate) fn read_reg(&self, reg: u8) -> Result<u8, Error<E>> {
        let mut buf = [0u8];
        self.read_regs(reg, &mut buf)?;
        Ok(buf[0])
    }
}

/// Three big-endian `i16` values.
pub(crate) fn be_i16x3(buf: &[u8; 6]) -> [i16; 3] {
    [
        i16::from_be_bytes([buf[0], buf[1]]),
        i16::from_be_bytes([buf[2], buf[3]]),
        i16::from_be_bytes([buf[4], buf[5]]),
    ]
}


#[cfg(test)]
mod tests {
    use super::mock::BrokenBus;
    use super::*;
    use crate::flight::controller::tests::TestClock;

    #[test]
    fn missing_sensors_abort_startup() {
        let bus = RefCell::new(BrokenBus);
        let clock = TestClock::new();
        assert!(matches!(
            SensorSet::start(&bus, &clock, false),
            Err(StartupError::GyroAccelNotConnected)
        ));
    }

    #[test]
    fn debug_mode_runs_without_sensors() {
        let bus = RefCell::new(BrokenBus);
        let clock = TestClock::new();
        let set = SensorSet::start(&bus, &clock, true).unwrap();
        assert!(set.gyro.is_none() && set.accel.is_none());
        assert!(set.compass.is_none());
        assert!(set.barometer.is_none());
    }
}
