// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! BMP180 barometer.
//!
//! Pressure conversions run back to back: each readout fetches the finished conversion and starts
//! the next one. The temperature compensation term is sampled at [`Bmp180::initialize`] and on
//! [`Bmp180::refresh_temperature`].

use core::cell::RefCell;

use embedded_hal::blocking::i2c::{Write, WriteRead};
use micromath::F32Ext;

use super::{Device, Error};
use crate::sensors::Sensor;
use crate::time::Clock;

pub const ADDR: u8 = 0x77;

pub mod reg {
    pub const CALIBRATION: u8 = 0xAA;
    pub const CHIP_ID: u8 = 0xD0;
    pub const CONTROL: u8 = 0xF4;
    pub const DATA: u8 = 0xF6;
}

const CHIP_ID: u8 = 0x55;
const CMD_TEMPERATURE: u8 = 0x2E;
const CMD_PRESSURE: u8 = 0x34;
const TEMPERATURE_DELAY_MS: u32 = 5;

/// Standard sea level pressure in Pa.
pub const SEA_LEVEL_PA: f32 = 101_325.0;

/// Pressure oversampling setting, 0 (fastest) to 3 (8 samples, lowest noise).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Oversampling {
    UltraLowPower = 0,
    Standard = 1,
    HighResolution = 2,
    UltraHighResolution = 3,
}

impl Oversampling {
    /// Conversion time in microseconds.
    pub fn conversion_us(self) -> u32 {
        match self {
            Self::UltraLowPower => 4_500,
            Self::Standard => 7_500,
            Self::HighResolution => 13_500,
            Self::UltraHighResolution => 25_500,
        }
    }

    fn oss(self) -> u8 {
        self as u8
    }
}

/// Factory calibration from the device EEPROM.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Calibration {
    fn from_bytes(b: &[u8; 22]) -> Self {
        let w = |i: usize| [b[2 * i], b[2 * i + 1]];
        Self {
            ac1: i16::from_be_bytes(w(0)),
            ac2: i16::from_be_bytes(w(1)),
            ac3: i16::from_be_bytes(w(2)),
            ac4: u16::from_be_bytes(w(3)),
            ac5: u16::from_be_bytes(w(4)),
            ac6: u16::from_be_bytes(w(5)),
            b1: i16::from_be_bytes(w(6)),
            b2: i16::from_be_bytes(w(7)),
            mb: i16::from_be_bytes(w(8)),
            mc: i16::from_be_bytes(w(9)),
            md: i16::from_be_bytes(w(10)),
        }
    }

    /// Temperature term B5 from an uncompensated temperature reading.
    ///
    /// `None` if the calibration makes the divisor zero.
    pub fn b5(&self, ut: i32) -> Option<i32> {
        let x1 = (ut - self.ac6 as i32).wrapping_mul(self.ac5 as i32) >> 15;
        let x2 = ((self.mc as i32) << 11).checked_div(x1.wrapping_add(self.md as i32))?;
        Some(x1.wrapping_add(x2))
    }

    /// Temperature in 0.1 °C.
    pub fn temperature(&self, b5: i32) -> i32 {
        b5.wrapping_add(8) >> 4
    }

    /// Compensated pressure in Pa.
    ///
    /// The datasheet algorithm relies on two's complement and unsigned wrap-around, so the
    /// arithmetic wraps. `None` if the calibration makes B4 zero.
    pub fn pressure(&self, b5: i32, up: i32, oss: u8) -> Option<i32> {
        let b6 = b5.wrapping_sub(4000);
        let b6_sq = b6.wrapping_mul(b6) >> 12;
        let x1 = (self.b2 as i32).wrapping_mul(b6_sq) >> 11;
        let x2 = (self.ac2 as i32).wrapping_mul(b6) >> 11;
        let x3 = x1.wrapping_add(x2);
        let b3 = ((self.ac1 as i32 * 4).wrapping_add(x3) << oss).wrapping_add(2) / 4;

        let x1 = (self.ac3 as i32).wrapping_mul(b6) >> 13;
        let x2 = (self.b1 as i32).wrapping_mul(b6_sq) >> 16;
        let x3 = x1.wrapping_add(x2).wrapping_add(2) >> 2;
        let b4 = (self.ac4 as u32).wrapping_mul(x3.wrapping_add(32768) as u32) >> 15;
        if b4 == 0 {
            return None;
        }
        let b7 = (up.wrapping_sub(b3) as u32).wrapping_mul(50_000u32 >> oss);

        let p = if b7 < 0x8000_0000 {
            (b7 * 2 / b4) as i32
        } else {
            (b7 / b4).wrapping_mul(2) as i32
        };
        let x1 = (p >> 8).wrapping_mul(p >> 8);
        let x1 = x1.wrapping_mul(3038) >> 16;
        let x2 = p.wrapping_mul(-7357) >> 16;
        Some(p.wrapping_add(x1.wrapping_add(x2).wrapping_add(3791) >> 4))
    }
}

/// Altitude in meters for `pressure` Pa, international barometric formula.
pub fn altitude(pressure: f32, sea_level: f32) -> f32 {
    44_330.0 * (1.0 - (pressure / sea_level).powf(1.0 / 5.255))
}

pub struct Bmp180<'a, I2C> {
    dev: Device<'a, I2C>,
    oversampling: Oversampling,
    calibration: Calibration,
    b5: i32,
    sea_level: f32,
}

impl<'a, I2C, E> Bmp180<'a, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    pub fn new(bus: &'a RefCell<I2C>, oversampling: Oversampling) -> Self {
        Self {
            dev: Device::new(bus, ADDR),
            oversampling,
            calibration: Calibration::default(),
            b5: 0,
            sea_level: SEA_LEVEL_PA,
        }
    }

    /// Read the calibration, sample the temperature and start the first pressure conversion.
    pub fn initialize(&mut self, clock: &dyn Clock) -> Result<(), Error<E>> {
        let mut buf = [0u8; 22];
        self.dev.read_regs(reg::CALIBRATION, &mut buf)?;
        self.calibration = Calibration::from_bytes(&buf);
        self.refresh_temperature(clock)
    }

    pub fn test_connection(&self) -> Result<bool, Error<E>> {
        Ok(self.dev.read_reg(reg::CHIP_ID)? == CHIP_ID)
    }

    /// Blocking temperature conversion. Restarts the pressure conversion afterwards.
    pub fn refresh_temperature(&mut self, clock: &dyn Clock) -> Result<(), Error<E>> {
        self.dev.write_reg(reg::CONTROL, CMD_TEMPERATURE)?;
        clock.delay_ms(TEMPERATURE_DELAY_MS);
        let mut buf = [0u8; 2];
        self.dev.read_regs(reg::DATA, &mut buf)?;
        self.b5 = self
            .calibration
            .b5(u16::from_be_bytes(buf) as i32)
            .ok_or(Error::InvalidData)?;
        self.start_pressure()
    }

    fn start_pressure(&mut self) -> Result<(), Error<E>> {
        let cmd = CMD_PRESSURE + (self.oversampling.oss() << 6);
        self.dev.write_reg(reg::CONTROL, cmd)
    }

    /// Fetch the finished pressure conversion (Pa) and start the next one.
    pub fn read_pressure(&mut self) -> Result<i32, Error<E>> {
        let mut buf = [0u8; 3];
        self.dev.read_regs(reg::DATA, &mut buf)?;
        let oss = self.oversampling.oss();
        let up = ((buf[0] as i32) << 16 | (buf[1] as i32) << 8 | buf[2] as i32) >> (8 - oss);
        let pressure = self.calibration.pressure(self.b5, up, oss);
        self.start_pressure()?;
        pressure.ok_or(Error::InvalidData)
    }

    /// Temperature in °C at the last refresh.
    pub fn temperature(&self) -> f32 {
        self.calibration.temperature(self.b5) as f32 / 10.0
    }

    pub fn set_sea_level_pressure(&mut self, pa: f32) {
        self.sea_level = pa;
    }
}

impl<I2C, E> Sensor<f32> for Bmp180<'_, I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Altitude in meters.
    fn measurement(&mut self, out: &mut f32) -> bool {
        match self.read_pressure() {
            Ok(p) => {
                *out = altitude(p as f32, self.sea_level);
                true
            }
            Err(_) => false,
        }
    }

    fn min_measurement_delay_us(&self) -> u32 {
        self.oversampling.conversion_us()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::RegisterBus;
    use crate::flight::controller::tests::TestClock;
    use approx::assert_relative_eq;

    fn datasheet_calibration() -> Calibration {
        Calibration {
            ac1: 408,
            ac2: -72,
            ac3: -14383,
            ac4: 32741,
            ac5: 32757,
            ac6: 23153,
            b1: 6190,
            b2: 4,
            mb: -32768,
            mc: -8711,
            md: 2868,
        }
    }

    #[test]
    fn datasheet_example() {
        let cal = datasheet_calibration();
        // the datasheet rounds X2 to -2344, integer division truncates to -2343
        let b5 = cal.b5(27898).unwrap();
        assert_eq!(b5, 2400);
        assert_eq!(cal.temperature(b5), 150);
        assert_eq!(cal.pressure(b5, 23843, 0), Some(69964));
        assert_eq!(cal.pressure(2399, 23843, 0), Some(69964));
    }

    #[test]
    fn pressure_below_offset_does_not_overflow() {
        let cal = datasheet_calibration();
        // UP smaller than B3 wraps B7 into the upper half
        assert!(cal.pressure(2400, 0, 0).is_some());
        assert!(cal.pressure(2400, -1_000_000, 3).is_some());
    }

    #[test]
    fn degenerate_calibration_is_rejected() {
        let cal = Calibration {
            ac4: 0,
            ..datasheet_calibration()
        };
        assert_eq!(cal.pressure(2400, 23843, 0), None);

        let cal = Calibration {
            mc: 1,
            md: 0,
            ac5: 0,
            ..datasheet_calibration()
        };
        assert_eq!(cal.b5(27898), None);
    }

    #[test]
    fn blank_device_reports_no_measurement() {
        let bus = RefCell::new(RegisterBus::new(ADDR));
        let clock = TestClock::new();
        let mut baro = Bmp180::new(&bus, Oversampling::Standard);
        // all-zero calibration divides by zero in B5
        assert!(matches!(baro.initialize(&clock), Err(Error::InvalidData)));

        let mut alt = 0.0;
        assert!(!baro.measurement(&mut alt));
        assert_eq!(alt, 0.0);
    }

    #[test]
    fn altitude_formula() {
        assert_relative_eq!(altitude(SEA_LEVEL_PA, SEA_LEVEL_PA), 0.0);
        // about 3 km for 70 kPa
        let h = altitude(69_964.0, SEA_LEVEL_PA);
        assert!((3_000.0..3_100.0).contains(&h), "{}", h);
    }

    #[test]
    fn reads_altitude_and_restarts_conversion() {
        let cal = datasheet_calibration();
        let mut bytes = [0u8; 22];
        let words = [
            cal.ac1 as u16,
            cal.ac2 as u16,
            cal.ac3 as u16,
            cal.ac4,
            cal.ac5,
            cal.ac6,
            cal.b1 as u16,
            cal.b2 as u16,
            cal.mb as u16,
            cal.mc as u16,
            cal.md as u16,
        ];
        for (i, w) in words.iter().enumerate() {
            bytes[2 * i..2 * i + 2].copy_from_slice(&w.to_be_bytes());
        }

        let bus = RefCell::new(RegisterBus::new(ADDR));
        bus.borrow_mut().set(reg::CALIBRATION, &bytes);
        bus.borrow_mut().set(reg::CHIP_ID, &[0x55]);
        bus.borrow_mut().set(reg::DATA, &27898u16.to_be_bytes());
        let clock = TestClock::new();

        let mut baro = Bmp180::new(&bus, Oversampling::UltraLowPower);
        assert!(baro.test_connection().unwrap());
        baro.initialize(&clock).unwrap();
        assert_eq!(clock.now_us(), 5_000);
        assert_relative_eq!(baro.temperature(), 15.0);
        assert_eq!(baro.calibration, cal);

        // UP = 23843 with oss 0: the 24-bit reading shifted right by 8
        let up = 23843u32 << 8;
        bus.borrow_mut()
            .set(reg::DATA, &[(up >> 16) as u8, (up >> 8) as u8, up as u8]);
        bus.borrow_mut().writes.clear();

        let mut alt = 0.0;
        assert!(baro.measurement(&mut alt));
        assert_relative_eq!(alt, altitude(69_964.0, SEA_LEVEL_PA));
        assert_eq!(bus.borrow().writes, [(reg::CONTROL, CMD_PRESSURE)]);
        assert_eq!(baro.min_measurement_delay_us(), 4_500);
    }
}
