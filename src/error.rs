// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Startup errors.
//!
//! The flight loop itself cannot fail. Only board bring-up can, when a device does not answer or
//! the ESC frequency is out of range.

use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupError {
    #[error("no connection to the MPU-6050 gyro/accelerometer")]
    GyroAccelNotConnected,
    #[error("no connection to the BMP180 barometer")]
    BarometerNotConnected,
    #[error("no connection to the HMC5883L compass")]
    CompassNotConnected,
    #[error("unsupported PWM frequency {0} Hz")]
    PwmFrequency(u32),
}

/// Check the outcome of a device connection test.
///
/// Returns `Ok(true)` if the device answered. Otherwise `missing` is an error, unless `debug` is
/// set: then it is only logged and `Ok(false)` tells the caller to run without the device.
pub fn check_device<E>(
    connected: Result<bool, E>,
    missing: StartupError,
    debug: bool,
) -> Result<bool, StartupError> {
    if let Ok(true) = connected {
        return Ok(true);
    }
    error!("startup: {}", missing);
    if debug {
        warn!("debug mode, continuing without the device");
        Ok(false)
    } else {
        Err(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn missing_device_is_fatal_unless_debugging() {
        let err = StartupError::CompassNotConnected;
        assert_eq!(check_device::<()>(Ok(true), err, false), Ok(true));
        assert_eq!(check_device::<()>(Ok(false), err, false), Err(err));
        assert_eq!(check_device(Err(()), err, false), Err(err));
        assert_eq!(check_device(Err(()), err, true), Ok(false));
    }

    #[test]
    fn messages() {
        assert_eq!(
            StartupError::PwmFrequency(20).to_string(),
            "unsupported PWM frequency 20 Hz"
        );
    }
}
