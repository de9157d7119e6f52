// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Flight loop.
//!
//! [`FlightController::step`] runs one iteration, always in this order:
//!
//! 1. poll every sensor whose readout interval has passed
//! 2. fuse new gyro/accel/compass samples into the attitude, filter new altitude samples
//! 3. poll the RC inputs and latch changed stick values
//! 4. run the roll, pitch and yaw PIDs on the wrapped attitude error
//! 5. advance the state machine, or apply the current state's motor output
//! 6. update the status LED and serve the console
//! 7. once per second, measure the loop rate and retune the filters to it
//!
//! [`FlightController::run`] repeats this forever.

use nalgebra::Vector3;

use crate::console::Console;
use crate::control::Pid;
use crate::filter::{Ema, MovingAverage, Smoothing};
use crate::flight::commands::Session;
use crate::flight::state::{transition, Action, Event, FlightState, SwitchPosition};
use crate::flight::{wrap_angle, Tuning, AXIS_PITCH, AXIS_ROLL, AXIS_YAW};
use crate::fusion::SensorFusion;
use crate::indicator::StatusIndicator;
use crate::input::{Channel, InputControl, InputSwitch};
use crate::motors::Motors;
use crate::sensors::{Sensor, SensorSlot};
use crate::time::{time_after, Clock, DeltaTime, Timestamp};

/// Number of seconds the average loop frequency covers.
pub const FREQUENCY_AVERAGE_LEN: usize = 20;

/// Everything the flight loop talks to.
///
/// A missing sensor is skipped. Without gyro and accelerometer the attitude is never updated.
pub struct FlightConfig<'a> {
    pub clock: &'a dyn Clock,
    pub gyro: Option<&'a mut dyn Sensor<Vector3<f32>>>,
    pub accel: Option<&'a mut dyn Sensor<Vector3<f32>>>,
    pub compass: Option<&'a mut dyn Sensor<Vector3<f32>>>,
    pub barometer: Option<&'a mut dyn Sensor<f32>>,
    pub fusion: &'a mut dyn SensorFusion,
    pub motors: &'a mut dyn Motors,
    pub input: InputControl<'a>,
    /// Two positions for landed/flying, three for landed/manual/flying
    pub mode_switch: InputSwitch,
    /// Roll, pitch and yaw, indexed by `AXIS_*`
    pub pids: [Pid; 3],
    pub indicator: &'a mut dyn StatusIndicator,
    pub console: Option<Console<'a>>,
    pub tuning: Tuning,
}

/// Iteration and attitude update rates, measured once per second.
#[derive(Clone, Debug)]
pub struct LoopFrequency {
    iterations: u32,
    attitude_updates: u32,
    current_hz: u32,
    attitude_hz: u32,
    average_hz: u32,
    average: MovingAverage,
    next_second: Timestamp,
    seconds: u32,
}

impl LoopFrequency {
    pub fn new(now: Timestamp) -> Self {
        Self {
            iterations: 0,
            attitude_updates: 0,
            current_hz: 0,
            attitude_hz: 0,
            average_hz: 0,
            average: MovingAverage::new(FREQUENCY_AVERAGE_LEN),
            next_second: now.wrapping_add(1_000_000),
            seconds: 0,
        }
    }

    /// Count one loop iteration. Returns true when a new second started.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        self.iterations += 1;
        if !time_after(now, self.next_second) {
            return false;
        }
        self.current_hz = self.iterations;
        self.attitude_hz = self.attitude_updates;
        self.average_hz = self.average.next_value(self.iterations as f32) as u32;
        self.iterations = 0;
        self.attitude_updates = 0;
        self.next_second = now.wrapping_add(1_000_000);
        self.seconds += 1;
        true
    }

    pub fn count_attitude_update(&mut self) {
        self.attitude_updates += 1;
    }

    /// Loop iterations during the last second.
    #[inline]
    pub fn current_hz(&self) -> u32 {
        self.current_hz
    }

    /// Attitude updates during the last second.
    #[inline]
    pub fn attitude_hz(&self) -> u32 {
        self.attitude_hz
    }

    /// Loop frequency averaged over the last [`FREQUENCY_AVERAGE_LEN`] seconds.
    #[inline]
    pub fn average_hz(&self) -> u32 {
        self.average_hz
    }

    #[inline]
    pub fn seconds(&self) -> u32 {
        self.seconds
    }
}

pub struct FlightController<'a> {
    pub(crate) config: FlightConfig<'a>,
    state: FlightState,

    pub(crate) gyro: SensorSlot<Vector3<f32>>,
    pub(crate) accel: SensorSlot<Vector3<f32>>,
    pub(crate) compass: SensorSlot<Vector3<f32>>,
    pub(crate) barometer: SensorSlot<f32>,

    attitude: Vector3<f32>,
    altitude: f32,
    altitude_filter: Ema,

    /// Commanded roll, pitch and yaw
    input_rpy: Vector3<f32>,
    input_throttle: f32,
    pid_output: Vector3<f32>,
    stabilize: [bool; 3],

    dt_pid: DeltaTime,
    dt_fusion: DeltaTime,
    init_deadline: Timestamp,
    freq: LoopFrequency,

    pub(crate) session: Option<Session>,
}

impl<'a> FlightController<'a> {
    /// Take over the collaborators and enter Init.
    ///
    /// The LED is turned on and the fusion filter starts in fast convergence until Init ends.
    pub fn new(mut config: FlightConfig<'a>) -> Self {
        let now = config.clock.now_us();
        config.indicator.set_led_state(true);
        config.fusion.enable_fast_convergence(true);
        config.input.start_timing(now);
        if let Some(console) = config.console.as_mut() {
            console.prompt();
        }
        let init_deadline = now.wrapping_add(config.tuning.init_delay_ms.saturating_mul(1000));

        Self {
            state: FlightState::Init,
            gyro: SensorSlot::new(Vector3::zeros(), now),
            accel: SensorSlot::new(Vector3::zeros(), now),
            compass: SensorSlot::new(Vector3::zeros(), now),
            barometer: SensorSlot::new(0.0, now),
            attitude: Vector3::zeros(),
            altitude: 0.0,
            altitude_filter: Ema::new(1.0),
            input_rpy: Vector3::zeros(),
            input_throttle: 0.0,
            pid_output: Vector3::zeros(),
            stabilize: [true; 3],
            dt_pid: DeltaTime::new(now),
            dt_fusion: DeltaTime::new(now),
            init_deadline,
            freq: LoopFrequency::new(now),
            session: None,
            config,
        }
    }

    /// Run the loop until power-off.
    pub fn run(&mut self) -> ! {
        info!("flight loop started");
        loop {
            self.step();
        }
    }

    /// One loop iteration.
    pub fn step(&mut self) {
        let now = self.config.clock.now_us();

        let (attitude_data, altitude_data) = self.poll_sensors(now);
        if attitude_data {
            self.update_attitude(now);
        }
        if altitude_data {
            self.altitude = self.altitude_filter.next_value(self.barometer.data);
        }

        self.update_inputs(now);
        self.update_pids(now);
        self.update_state(now);

        self.config.indicator.update(now);
        self.service_console(now);

        let now = self.config.clock.now_us();
        if self.freq.tick(now) {
            self.every_second();
        }
    }

    /// Returns whether new attitude (gyro, accel, compass) and altitude data arrived.
    fn poll_sensors(&mut self, now: Timestamp) -> (bool, bool) {
        let cfg = &mut self.config;
        let altitude = cfg
            .barometer
            .as_deref_mut()
            .map_or(false, |s| self.barometer.poll(s, now));
        let compass = cfg
            .compass
            .as_deref_mut()
            .map_or(false, |s| self.compass.poll(s, now));
        let accel = cfg
            .accel
            .as_deref_mut()
            .map_or(false, |s| self.accel.poll(s, now));
        let gyro = cfg
            .gyro
            .as_deref_mut()
            .map_or(false, |s| self.gyro.poll(s, now));
        (compass || accel || gyro, altitude)
    }

    fn update_attitude(&mut self, now: Timestamp) {
        if self.config.gyro.is_none() || self.config.accel.is_none() {
            return;
        }
        let mag_valid = self
            .config
            .compass
            .as_deref()
            .map_or(false, |c| !c.saturated());
        let mag = mag_valid.then_some(&self.compass.data);

        let dt = self.dt_fusion.next_delta_ms(now);
        let attitude = self
            .config
            .fusion
            .update(&self.gyro.data, &self.accel.data, mag, dt);
        self.attitude = attitude + self.config.tuning.attitude_offset;
        self.freq.count_attitude_update();
    }

    fn update_inputs(&mut self, now: Timestamp) {
        let input = &mut self.config.input;
        input.update(now);
        for channel in Channel::PRIMARY {
            let value = match input.take_control_value(channel) {
                Some(v) => v,
                None => continue,
            };
            trace!("input {} = {}", channel.index(), value);
            match channel {
                Channel::Roll => self.input_rpy[AXIS_ROLL] = value,
                Channel::Pitch => self.input_rpy[AXIS_PITCH] = value,
                Channel::Yaw => self.input_rpy[AXIS_YAW] = value,
                Channel::Throttle => self.input_throttle = value,
                _ => {}
            }
        }
    }

    fn update_pids(&mut self, now: Timestamp) {
        let dt = self.dt_pid.next_delta_ms(now);
        for axis in [AXIS_ROLL, AXIS_PITCH, AXIS_YAW] {
            self.pid_output[axis] = if self.stabilize[axis] {
                let error = wrap_angle(self.input_rpy[axis] - self.attitude[axis]);
                self.config.pids[axis].get_pid(error, dt)
            } else {
                0.0
            };
        }
    }

    fn switch_position(&self) -> SwitchPosition {
        let switch = &self.config.mode_switch;
        SwitchPosition::from_state(switch.state(&self.config.input), switch.num_states())
    }

    fn update_state(&mut self, now: Timestamp) {
        let event = match self.state {
            FlightState::Init => time_after(now, self.init_deadline).then_some(Event::InitElapsed),
            FlightState::Debug => None,
            FlightState::Landed | FlightState::Manual | FlightState::Flying => {
                Some(Event::Switch(self.switch_position()))
            }
        };

        // a transition replaces the state's output for this iteration
        if let Some(t) = event.and_then(|e| transition(self.state, e, self.config.tuning.debug)) {
            info!("flight state {} -> {}", self.state, t.next);
            self.state = t.next;
            self.abort_motor_session();
            for &action in t.actions {
                self.execute(action);
            }
            return;
        }

        if self.session.as_ref().map_or(false, Session::owns_motors) {
            return;
        }

        match self.state {
            FlightState::Flying => {
                self.config
                    .motors
                    .set_thrust(self.input_throttle, &self.pid_output);
            }
            FlightState::Manual => {
                let input = &self.config.input;
                let sticks = Vector3::new(
                    input.control_value_raw(Channel::Roll),
                    input.control_value_raw(Channel::Pitch),
                    input.control_value_raw(Channel::Yaw),
                ) * self.config.tuning.manual_gain;
                self.config.motors.set_thrust(self.input_throttle, &sticks);
            }
            FlightState::Init | FlightState::Debug | FlightState::Landed => {}
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::UpdateBlinkRate => match self.config.tuning.blink_rate_ms(self.state) {
                Some(rate) => self.config.indicator.set_blink_rate(rate),
                None => self.config.indicator.set_led_state(true),
            },
            Action::DisableFastConvergence => self.config.fusion.enable_fast_convergence(false),
            Action::InitMotors => self.init_motors(),
            Action::ResetIntegrators => self.reset_integrators(),
            Action::ReseedInputs => {
                let input = &mut self.config.input;
                input.converter(Channel::Roll).reset(self.attitude[AXIS_ROLL]);
                input.converter(Channel::Pitch).reset(self.attitude[AXIS_PITCH]);
                input.converter(Channel::Yaw).reset(self.attitude[AXIS_YAW]);
                input.converter(Channel::Throttle).reset(0.0);
                self.input_rpy = self.attitude;
            }
            Action::MotorsMin => self.config.motors.set_motor_speed_min(),
        }
    }

    fn every_second(&mut self) {
        let hz = self.freq.current_hz();
        let attitude_hz = self.freq.attitude_hz();
        debug!("loop {} Hz, attitude {} Hz", hz, attitude_hz);

        if hz > 0 {
            let dt = 1.0 / hz as f32;
            let cutoff = self.config.tuning.pid_cutoff_hz;
            for pid in self.config.pids.iter_mut() {
                pid.d_filter().set_cutoff_freq(cutoff, dt);
            }
        }
        if attitude_hz > 0 {
            self.altitude_filter
                .set_cutoff_freq(self.config.tuning.altitude_cutoff_hz, 1.0 / attitude_hz as f32);
        }

        if self.state == FlightState::Landed && self.freq.seconds() % 5 == 0 {
            debug!("landed, waiting for the mode switch");
        }
    }

    /// Hold all motors at minimum for the configured time so the ESCs arm. Blocks.
    pub fn init_motors(&mut self) {
        info!("initializing motors");
        self.config.motors.set_motor_speed_min();
        self.config.clock.delay_ms(self.config.tuning.motor_init_ms);
        info!("motors initialized");
    }

    pub fn reset_integrators(&mut self) {
        self.config.pids.iter_mut().for_each(Pid::reset_i);
    }

    /// Enable or disable stabilization of one axis. A change resets all integrators.
    pub fn set_stabilize(&mut self, axis: usize, enabled: bool) {
        if let Some(flag) = self.stabilize.get_mut(axis) {
            if *flag != enabled {
                *flag = enabled;
                self.reset_integrators();
            }
        }
    }

    #[inline]
    pub fn stabilize(&self, axis: usize) -> bool {
        self.stabilize.get(axis).copied().unwrap_or(false)
    }

    #[inline]
    pub fn state(&self) -> FlightState {
        self.state
    }

    /// Roll, pitch and yaw in radians, mounting offset applied.
    #[inline]
    pub fn attitude(&self) -> &Vector3<f32> {
        &self.attitude
    }

    /// Filtered barometric altitude in meters.
    #[inline]
    pub fn altitude(&self) -> f32 {
        self.altitude
    }

    #[inline]
    pub fn input_roll_pitch_yaw(&self) -> &Vector3<f32> {
        &self.input_rpy
    }

    #[inline]
    pub fn input_throttle(&self) -> f32 {
        self.input_throttle
    }

    /// PID output of the last iteration, zero on disabled axes.
    #[inline]
    pub fn pid_output(&self) -> &Vector3<f32> {
        &self.pid_output
    }

    #[inline]
    pub fn pids(&self) -> &[Pid; 3] {
        &self.config.pids
    }

    #[inline]
    pub fn pids_mut(&mut self) -> &mut [Pid; 3] {
        &mut self.config.pids
    }

    #[inline]
    pub fn loop_frequency(&self) -> &LoopFrequency {
        &self.freq
    }

    pub fn input_mut(&mut self) -> &mut InputControl<'a> {
        &mut self.config.input
    }

    pub fn motors(&mut self) -> &mut dyn Motors {
        &mut *self.config.motors
    }

    #[inline]
    pub fn tuning(&self) -> &Tuning {
        &self.config.tuning
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::console::Terminal;
    use crate::filter::SmoothingFilter;
    use crate::flight::default_pids;
    use crate::fusion::MahonyAhrs;
    use crate::input::{PulseDecoding, PulseEdges, PulseSource};
    use approx::assert_relative_eq;
    use core::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::string::String;
    use std::vec::Vec;

    pub(crate) struct TestClock(Cell<u32>);

    impl TestClock {
        pub fn new() -> Self {
            Self(Cell::new(0))
        }

        pub fn advance_ms(&self, ms: u32) {
            self.0.set(self.0.get().wrapping_add(ms * 1000));
        }
    }

    impl Clock for TestClock {
        fn now_us(&self) -> Timestamp {
            self.0.get()
        }

        fn delay_ms(&self, ms: u32) {
            self.advance_ms(ms);
        }
    }

    pub(crate) struct FixedSensor<T: Copy> {
        pub value: T,
        pub delay_us: u32,
        pub saturated: bool,
    }

    impl<T: Copy> Sensor<T> for FixedSensor<T> {
        fn measurement(&mut self, out: &mut T) -> bool {
            *out = self.value;
            true
        }

        fn min_measurement_delay_us(&self) -> u32 {
            self.delay_us
        }

        fn saturated(&self) -> bool {
            self.saturated
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum MotorCall {
        Thrust(f32, Vector3<f32>),
        Speed(usize, f32),
        Freq(u32),
    }

    pub(crate) struct LoggingMotors {
        pub log: Rc<RefCell<Vec<MotorCall>>>,
        speeds: [f32; 4],
        freq: u32,
    }

    impl Motors for LoggingMotors {
        fn set_thrust(&mut self, throttle: f32, roll_pitch_yaw: &Vector3<f32>) {
            self.log
                .borrow_mut()
                .push(MotorCall::Thrust(throttle, *roll_pitch_yaw));
        }

        fn set_motor_speed(&mut self, motor: usize, speed: f32) {
            self.speeds[motor] = speed;
            self.log.borrow_mut().push(MotorCall::Speed(motor, speed));
        }

        fn motor_speed(&self, motor: usize) -> f32 {
            self.speeds[motor]
        }

        fn num_motors(&self) -> usize {
            4
        }

        fn min_thrust(&self, _motor: usize) -> f32 {
            0.05
        }

        fn max_thrust(&self, _motor: usize) -> f32 {
            0.1
        }

        fn set_pwm_freq(&mut self, hz: u32) -> bool {
            self.freq = hz;
            self.log.borrow_mut().push(MotorCall::Freq(hz));
            true
        }

        fn pwm_freq(&self) -> u32 {
            self.freq
        }
    }

    pub(crate) struct RecordingIndicator {
        pub blink_ms: Rc<Cell<Option<u32>>>,
    }

    impl StatusIndicator for RecordingIndicator {
        fn set_led_state(&mut self, _on: bool) {
            self.blink_ms.set(None);
        }

        fn set_blink_rate(&mut self, rate_ms: u32) {
            self.blink_ms.set(Some(rate_ms));
        }

        fn update(&mut self, _now: Timestamp) {}
    }

    pub(crate) struct NoPulses;

    impl PulseSource for NoPulses {
        fn snapshot(&self, _out: &mut [PulseEdges]) {}
    }

    #[derive(Default)]
    pub(crate) struct TermState {
        pub input: VecDeque<u8>,
        pub output: String,
    }

    pub(crate) struct SharedTerminal(pub Rc<RefCell<TermState>>);

    impl Terminal for SharedTerminal {
        fn read_byte(&mut self) -> Option<u8> {
            self.0.borrow_mut().input.pop_front()
        }

        fn write_str(&mut self, s: &str) {
            self.0.borrow_mut().output.push_str(s);
        }
    }

    /// Owned collaborators for a controller under test.
    pub(crate) struct Rig {
        pub gyro: FixedSensor<Vector3<f32>>,
        pub accel: FixedSensor<Vector3<f32>>,
        pub compass: FixedSensor<Vector3<f32>>,
        pub barometer: FixedSensor<f32>,
        pub fusion: MahonyAhrs,
        pub motors: LoggingMotors,
        pub indicator: RecordingIndicator,
        pub pulses: NoPulses,
        pub terminal: SharedTerminal,
        pub tuning: Tuning,
        pub switch_states: u8,

        pub motor_log: Rc<RefCell<Vec<MotorCall>>>,
        pub blink_ms: Rc<Cell<Option<u32>>>,
        pub term: Rc<RefCell<TermState>>,
    }

    impl Rig {
        pub fn new() -> Self {
            let motor_log = Rc::new(RefCell::new(Vec::new()));
            let blink_ms = Rc::new(Cell::new(None));
            let term = Rc::new(RefCell::new(TermState::default()));
            Self {
                gyro: FixedSensor {
                    value: Vector3::zeros(),
                    delay_us: 1_000,
                    saturated: false,
                },
                accel: FixedSensor {
                    value: Vector3::new(0.0, 0.0, 1.0),
                    delay_us: 1_000,
                    saturated: false,
                },
                compass: FixedSensor {
                    value: Vector3::new(1.0, 0.0, 0.0),
                    delay_us: 5_000,
                    saturated: false,
                },
                barometer: FixedSensor {
                    value: 120.0,
                    delay_us: 20_000,
                    saturated: false,
                },
                fusion: MahonyAhrs::default(),
                motors: LoggingMotors {
                    log: motor_log.clone(),
                    speeds: [0.0; 4],
                    freq: 50,
                },
                indicator: RecordingIndicator {
                    blink_ms: blink_ms.clone(),
                },
                pulses: NoPulses,
                terminal: SharedTerminal(term.clone()),
                tuning: Tuning {
                    debug: false,
                    ..Tuning::default()
                },
                switch_states: 2,
                motor_log,
                blink_ms,
                term,
            }
        }

        pub fn controller<'a>(&'a mut self, clock: &'a TestClock) -> FlightController<'a> {
            FlightController::new(FlightConfig {
                clock,
                gyro: Some(&mut self.gyro),
                accel: Some(&mut self.accel),
                compass: Some(&mut self.compass),
                barometer: Some(&mut self.barometer),
                fusion: &mut self.fusion,
                motors: &mut self.motors,
                input: InputControl::new(&self.pulses, PulseDecoding::Pwm),
                mode_switch: InputSwitch::new(Channel::Aux1, self.switch_states),
                pids: default_pids(),
                indicator: &mut self.indicator,
                console: Some(Console::new(&mut self.terminal)),
                tuning: self.tuning,
            })
        }
    }

    /// Queue keystrokes on the test terminal.
    pub(crate) fn type_keys(term: &Rc<RefCell<TermState>>, keys: &str) {
        term.borrow_mut().input.extend(keys.bytes());
    }

    /// Drain everything written to the test terminal.
    pub(crate) fn take_output(term: &Rc<RefCell<TermState>>) -> String {
        core::mem::take(&mut term.borrow_mut().output)
    }

    /// Hold the mode switch at `raw` long enough to fill its filter.
    pub(crate) fn set_switch(fc: &mut FlightController<'_>, raw: f32) {
        for _ in 0..4 {
            fc.input_mut().update_value(Channel::Aux1, raw, 0);
        }
    }

    /// Run until Landed.
    pub(crate) fn land(fc: &mut FlightController<'_>, clock: &TestClock) {
        set_switch(fc, -1.0);
        fc.step();
        clock.advance_ms(801);
        fc.step();
        assert_eq!(fc.state(), FlightState::Landed);
    }

    #[test]
    fn init_waits_then_lands_with_motor_init() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        let log = rig.motor_log.clone();
        let blink = rig.blink_ms.clone();
        let mut fc = rig.controller(&clock);

        set_switch(&mut fc, 1.0);
        fc.step();
        clock.advance_ms(500);
        fc.step();
        assert_eq!(fc.state(), FlightState::Init);
        assert!(log.borrow().is_empty());

        clock.advance_ms(301);
        fc.step();
        assert_eq!(fc.state(), FlightState::Landed);
        assert_eq!(blink.get(), Some(600));
        // all four motors idled, then the init delay passed
        assert_eq!(log.borrow().len(), 4);
        assert!(log.borrow().contains(&MotorCall::Speed(3, 0.05)));
        assert!(clock.now_us() >= 801_000 + 3_500_000);
    }

    #[test]
    fn takeoff_resets_pids_before_first_motor_output() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        let log = rig.motor_log.clone();
        let blink = rig.blink_ms.clone();
        let mut fc = rig.controller(&clock);
        land(&mut fc, &clock);

        for pid in fc.pids_mut() {
            pid.set_integrator(5.0);
            pid.get_d(0.3, 1.0);
        }
        let thrust_before = log.borrow().len();

        set_switch(&mut fc, 1.0);
        clock.advance_ms(5);
        fc.step();
        assert_eq!(fc.state(), FlightState::Flying);
        assert_eq!(blink.get(), Some(300));
        for pid in fc.pids() {
            assert_eq!(pid.integrator(), 0.0);
            assert!(!pid.derivative_valid());
        }
        assert_eq!(log.borrow().len(), thrust_before);

        clock.advance_ms(5);
        fc.step();
        let calls = log.borrow();
        assert!(matches!(calls.last(), Some(MotorCall::Thrust(..))));
    }

    #[test]
    fn takeoff_seeds_yaw_setpoint_with_attitude() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        rig.tuning.attitude_offset = Vector3::new(0.1, -0.2, 0.5);
        let mut fc = rig.controller(&clock);
        crate::flight::configure_default_converters(fc.input_mut());
        land(&mut fc, &clock);
        for _ in 0..4 {
            fc.input_mut().update_value(Channel::Yaw, 0.0, 0);
        }
        fc.step();
        assert_eq!(fc.input_roll_pitch_yaw()[AXIS_YAW], 0.0);

        set_switch(&mut fc, 1.0);
        clock.advance_ms(5);
        fc.step();
        assert_eq!(fc.state(), FlightState::Flying);
        let attitude = *fc.attitude();
        assert_relative_eq!(
            fc.input_mut().converter(Channel::Yaw).last_value(),
            attitude[AXIS_YAW]
        );
        assert_eq!(fc.input_mut().converter(Channel::Throttle).last_value(), 0.0);
        // the setpoint holds the current attitude until the next stick frame
        assert_relative_eq!(fc.input_roll_pitch_yaw()[AXIS_YAW], attitude[AXIS_YAW]);
        assert_relative_eq!(fc.input_roll_pitch_yaw()[AXIS_ROLL], attitude[AXIS_ROLL]);
        assert_relative_eq!(fc.input_roll_pitch_yaw()[AXIS_PITCH], attitude[AXIS_PITCH]);
    }

    #[test]
    fn landing_switch_idles_motors() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        let log = rig.motor_log.clone();
        let blink = rig.blink_ms.clone();
        let mut fc = rig.controller(&clock);
        land(&mut fc, &clock);

        set_switch(&mut fc, 1.0);
        fc.step();
        fc.step();
        log.borrow_mut().clear();

        set_switch(&mut fc, -1.0);
        fc.step();
        assert_eq!(fc.state(), FlightState::Landed);
        assert_eq!(blink.get(), Some(600));
        assert_eq!(
            *log.borrow(),
            (0..4).map(|m| MotorCall::Speed(m, 0.05)).collect::<Vec<_>>()
        );
        fc.step();
        assert_eq!(log.borrow().len(), 4);
    }

    #[test]
    fn manual_passes_sticks_without_pids() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        rig.switch_states = 3;
        rig.tuning.manual_gain = 0.5;
        let log = rig.motor_log.clone();
        let mut fc = rig.controller(&clock);
        land(&mut fc, &clock);

        set_switch(&mut fc, 0.0);
        fc.input_mut().update_value(Channel::Roll, 0.4, 0);
        fc.input_mut().update_value(Channel::Throttle, -0.2, 0);
        fc.step();
        assert_eq!(fc.state(), FlightState::Manual);

        fc.step();
        match log.borrow().last() {
            Some(MotorCall::Thrust(throttle, rpy)) => {
                assert_relative_eq!(*throttle, -0.2);
                assert_relative_eq!(rpy.x, 0.2);
                assert_relative_eq!(rpy.y, 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        // manual to flying goes through the takeoff resets
        set_switch(&mut fc, 1.0);
        fc.pids_mut()[AXIS_PITCH].set_integrator(1.0);
        fc.step();
        assert_eq!(fc.state(), FlightState::Flying);
        assert_eq!(fc.pids()[AXIS_PITCH].integrator(), 0.0);
    }

    #[test]
    fn debug_mode_never_drives_motors() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        rig.tuning.debug = true;
        let log = rig.motor_log.clone();
        let mut fc = rig.controller(&clock);

        set_switch(&mut fc, 1.0);
        fc.step();
        clock.advance_ms(900);
        for _ in 0..10 {
            fc.step();
            clock.advance_ms(10);
        }
        assert_eq!(fc.state(), FlightState::Debug);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn disabled_axis_has_no_correction() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        let mut fc = rig.controller(&clock);
        land(&mut fc, &clock);

        fc.input_mut().update_value(Channel::Roll, 1.0, 0);
        fc.pids_mut()[AXIS_ROLL].set_integrator(3.0);
        fc.set_stabilize(AXIS_ROLL, false);
        assert_eq!(fc.pids()[AXIS_ROLL].integrator(), 0.0);
        clock.advance_ms(5);
        fc.step();
        assert_eq!(fc.pid_output()[AXIS_ROLL], 0.0);

        fc.set_stabilize(AXIS_ROLL, true);
        clock.advance_ms(5);
        fc.step();
        assert!(fc.pid_output()[AXIS_ROLL] > 0.0);
    }

    #[test]
    fn saturated_compass_falls_back_to_imu() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        rig.compass.saturated = true;
        let mut fc = rig.controller(&clock);
        fc.step();
        // saturated compass falls back to gyro and accel, still level
        assert_relative_eq!(fc.attitude()[AXIS_ROLL], 0.026, epsilon = 1e-3);
        assert_relative_eq!(fc.attitude()[AXIS_PITCH], 0.048, epsilon = 1e-3);
        assert_relative_eq!(fc.altitude(), 120.0);
    }

    #[test]
    fn loop_rate_retunes_filters() {
        let clock = TestClock::new();
        let mut rig = Rig::new();
        // no blocking motor init inside the measured second
        rig.tuning.debug = true;
        let mut fc = rig.controller(&clock);

        // the second closes on the first iteration after the 1 s mark
        for _ in 0..1_001 {
            clock.advance_ms(1);
            fc.step();
        }
        let freq = fc.loop_frequency();
        assert_eq!(freq.current_hz(), 1_001);
        assert_eq!(freq.average_hz(), 1_001);
        assert!(freq.attitude_hz() > 900);

        // alpha = dt / (dt + 1 / (2π fc)) with dt = 1 / 1001 s, fc = 25 Hz
        let dt = 1.0 / 1_001.0;
        let rc = 1.0 / (2.0 * core::f32::consts::PI * 25.0);
        let expected = dt / (dt + rc);
        match fc.pids_mut()[AXIS_YAW].d_filter() {
            SmoothingFilter::Ema(ema) => assert_relative_eq!(ema.alpha(), expected, epsilon = 1e-4),
            other => panic!("unexpected filter {:?}", other),
        }
    }
}
