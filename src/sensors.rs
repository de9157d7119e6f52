// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Sensor collaborator interface.
//!
//! The flight loop polls every sensor at its own rate: a sensor is read only once its
//! [`min_measurement_delay_us`](Sensor::min_measurement_delay_us) has passed since the last
//! successful readout. A failed read keeps the previous sample.

/// A source of measurements of type `T`: `nalgebra::Vector3<f32>` for gyro (rad/s), accelerometer
/// and compass, `f32` for barometric altitude (m).
pub trait Sensor<T> {
    /// Read a new measurement into `out`. Returns false (and leaves `out` untouched) on failure.
    fn measurement(&mut self, out: &mut T) -> bool;

    /// Minimum time between two readouts in microseconds.
    fn min_measurement_delay_us(&self) -> u32;

    /// True if the last measurement hit the sensor's range limit.
    fn saturated(&self) -> bool {
        false
    }
}

/// Latest sample of a sensor and when it may be read again.
#[derive(Copy, Clone, Debug, Default)]
pub struct SensorSlot<T> {
    pub data: T,
    pub next_readout: crate::time::Timestamp,
}

impl<T> SensorSlot<T> {
    pub fn new(data: T, now: crate::time::Timestamp) -> Self {
        Self {
            data,
            next_readout: now,
        }
    }

    /// Read `sensor` if its readout time has come. Returns true if `data` was refreshed.
    pub fn poll<S>(&mut self, sensor: &mut S, now: crate::time::Timestamp) -> bool
    where
        S: Sensor<T> + ?Sized,
    {
        if crate::time::time_after(self.next_readout, now) {
            return false;
        }
        if !sensor.measurement(&mut self.data) {
            trace!("sensor readout failed");
            return false;
        }
        self.next_readout = now.wrapping_add(sensor.min_measurement_delay_us());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: f32,
        fail: bool,
    }

    impl Sensor<f32> for Counter {
        fn measurement(&mut self, out: &mut f32) -> bool {
            if self.fail {
                return false;
            }
            self.value += 1.0;
            *out = self.value;
            true
        }

        fn min_measurement_delay_us(&self) -> u32 {
            1_000
        }
    }

    #[test]
    fn slot_respects_readout_interval() {
        let mut sensor = Counter {
            value: 0.0,
            fail: false,
        };
        let mut slot = SensorSlot::new(0.0, 100);
        assert!(slot.poll(&mut sensor, 100));
        assert_eq!(slot.data, 1.0);
        assert!(!slot.poll(&mut sensor, 600));
        assert!(slot.poll(&mut sensor, 1_100));
        assert_eq!(slot.data, 2.0);
    }

    #[test]
    fn failed_read_keeps_sample_and_retries() {
        let mut sensor = Counter {
            value: 5.0,
            fail: true,
        };
        let mut slot = SensorSlot::new(-1.0, 0);
        assert!(!slot.poll(&mut sensor, 10));
        assert_eq!(slot.data, -1.0);
        assert_eq!(slot.next_readout, 0);

        sensor.fail = false;
        assert!(slot.poll(&mut sensor, 20));
        assert_eq!(slot.data, 6.0);
        assert!(!sensor.saturated());
    }

    #[test]
    fn slot_works_through_trait_object() {
        let mut sensor = Counter {
            value: 0.0,
            fail: false,
        };
        let dynamic: &mut dyn Sensor<f32> = &mut sensor;
        let mut slot = SensorSlot::new(0.0, 0);
        assert!(slot.poll(dynamic, 0));
    }
}
