// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Diagnostic console commands.
//!
//! The console is served once per loop iteration. A command line either runs to completion at once
//! (`help`, `freq`, `initmotors`) or opens an interactive session that consumes single keys until
//! `q`:
//!
//! - `sensors`, `attitude`, `inputs` - live watch, refreshed every 100 ms
//! - `motors` - jog single motors and the PWM frequency
//! - `stabilize` - drive the motors from a test throttle plus the enabled PID axes, tune gains
//!
//! Sessions that drive motors are only started while landed (or in debug mode), and any flight
//! state change ends them.

use core::fmt::Write;

use crate::console::{Console, ConsoleEvent, Line};
use crate::flight::controller::FlightController;
use crate::flight::state::FlightState;
use crate::flight::{AXIS_PITCH, AXIS_ROLL, AXIS_YAW};
use crate::motors::{Motors, PWM_FREQ_MAX_HZ, PWM_FREQ_MIN_HZ};
use crate::time::{time_after, Timestamp};

/// Refresh interval of live watches.
pub const WATCH_INTERVAL_MS: u32 = 100;
/// Refresh interval of the stabilize status.
pub const STABILIZE_INTERVAL_MS: u32 = 500;
/// Most motors the `motors` command can select.
pub const MAX_MOTORS: usize = 8;

const HELP: &[(&str, &str)] = &[
    ("help", "list commands"),
    ("freq", "print main loop update frequency"),
    ("sensors", "watch sensor values"),
    ("attitude", "watch attitude"),
    ("inputs", "watch RC inputs"),
    ("motors", "adjust motor speeds"),
    ("initmotors", "initialize motors"),
    ("stabilize", "test stabilization"),
];

const MOTORS_KEYS: &str = "Keys: 'q' quit, '1'-'4' select motors, '5' invert selection, ' ' all to 0\r\n\
'j'/'k' speed -/+0.01, 'n'/'m' -/+0.001, 'u'/'i' PWM frequency -/+25 Hz\r\n\
'x' selected to 1 ms, 'c' selected to min thrust\r\n";

const STABILIZE_KEYS: &str = "Keys: 'q' quit, '1'-'3' roll, pitch, yaw stabilization, ' ' reset\r\n\
'j'/'k' throttle -/+0.01, 'n'/'m' -/+0.001\r\n\
'w'/'e', 's'/'d', 'x'/'c' decrease/increase P, I, D of enabled axes\r\n";

macro_rules! out {
    ($console:expr, $($arg:tt)*) => {{
        let _ = write!($console, $($arg)*);
    }};
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum WatchTarget {
    Sensors,
    Attitude,
    Inputs,
}

/// An interactive command in progress.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Session {
    Watch {
        target: WatchTarget,
        next_print: Timestamp,
    },
    Motors {
        selected: [bool; MAX_MOTORS],
    },
    Stabilize {
        throttle: f32,
        next_print: Timestamp,
    },
}

impl Session {
    /// True if the session drives the motors instead of the flight state.
    pub(crate) fn owns_motors(&self) -> bool {
        matches!(self, Session::Motors { .. } | Session::Stabilize { .. })
    }
}

impl FlightController<'_> {
    /// Serve one pass of the console.
    pub(crate) fn service_console(&mut self, now: Timestamp) {
        let mut console = match self.config.console.take() {
            Some(c) => c,
            None => return,
        };

        // a state change may have ended the session
        console.set_interactive(self.session.is_some());
        let event = console.poll();

        self.session = match (self.session.take(), event) {
            (None, Some(ConsoleEvent::Line(line))) => self.run_command(&mut console, &line, now),
            (None, _) => None,
            (Some(session), event) => {
                let key = match event {
                    Some(ConsoleEvent::Key(k)) => Some(k),
                    _ => None,
                };
                self.continue_session(&mut console, session, key, now)
            }
        };

        if self.session.is_none() && console.is_interactive() {
            console.set_interactive(false);
            console.prompt();
        } else {
            console.set_interactive(self.session.is_some());
        }
        self.config.console = Some(console);
    }

    /// Close any motor-driving session. Called on every flight state change.
    pub(crate) fn abort_motor_session(&mut self) {
        if self.session.as_ref().map_or(false, Session::owns_motors) {
            warn!("console session aborted by state change");
            self.session = None;
            self.enable_all_axes();
            if let Some(console) = self.config.console.as_mut() {
                out!(console, "\r\nAborted, flight state changed\r\n");
                console.set_interactive(false);
                console.prompt();
            }
        }
    }

    fn motors_allowed(&self) -> bool {
        matches!(self.state(), FlightState::Landed | FlightState::Debug)
    }

    fn enable_all_axes(&mut self) {
        for axis in [AXIS_ROLL, AXIS_PITCH, AXIS_YAW] {
            self.set_stabilize(axis, true);
        }
    }

    fn run_command(&mut self, console: &mut Console<'_>, line: &Line, now: Timestamp) -> Option<Session> {
        let session = match line.command() {
            "help" => {
                for (name, description) in HELP {
                    out!(console, "  {:<12}{}\r\n", name, description);
                }
                None
            }
            "freq" => {
                let freq = self.loop_frequency();
                out!(
                    console,
                    "Current update frequency: {} Hz, average: {} Hz\r\n",
                    freq.current_hz(),
                    freq.average_hz()
                );
                None
            }
            "sensors" => Some(WatchTarget::Sensors),
            "attitude" => Some(WatchTarget::Attitude),
            "inputs" => Some(WatchTarget::Inputs),
            "motors" | "initmotors" | "stabilize" if !self.motors_allowed() => {
                out!(console, "Only available while landed\r\n");
                None
            }
            "motors" => {
                out!(console, "{}", MOTORS_KEYS);
                let selected = [false; MAX_MOTORS];
                self.print_motors(console, &selected);
                return Some(Session::Motors { selected });
            }
            "initmotors" => {
                out!(console, "Initializing motors...");
                self.init_motors();
                out!(console, " done\r\n");
                None
            }
            "stabilize" => {
                for axis in [AXIS_ROLL, AXIS_PITCH, AXIS_YAW] {
                    self.set_stabilize(axis, false);
                }
                out!(console, "{}", STABILIZE_KEYS);
                let throttle = -1.0;
                self.print_stabilize(console, throttle);
                return Some(Session::Stabilize {
                    throttle,
                    next_print: now.wrapping_add(STABILIZE_INTERVAL_MS * 1000),
                });
            }
            other => {
                out!(console, "Unknown command '{}', try 'help'\r\n", other);
                None
            }
        };

        match session {
            Some(target) => {
                out!(console, "Press 'q' to quit\r\n");
                Some(Session::Watch {
                    target,
                    next_print: now,
                })
            }
            None => {
                console.prompt();
                None
            }
        }
    }

    fn continue_session(
        &mut self,
        console: &mut Console<'_>,
        session: Session,
        key: Option<u8>,
        now: Timestamp,
    ) -> Option<Session> {
        match session {
            Session::Watch { target, next_print } => {
                if key == Some(b'q') {
                    return None;
                }
                if time_after(next_print, now) {
                    return Some(session);
                }
                console.clear_screen();
                self.print_watch(console, target);
                Some(Session::Watch {
                    target,
                    next_print: now.wrapping_add(WATCH_INTERVAL_MS * 1000),
                })
            }
            Session::Motors { selected } => self.motors_key(console, selected, key),
            Session::Stabilize {
                throttle,
                next_print,
            } => self.stabilize_key(console, throttle, next_print, key, now),
        }
    }

    fn print_watch(&self, console: &mut Console<'_>, target: WatchTarget) {
        match target {
            WatchTarget::Sensors => {
                let (c, g, a) = (&self.compass.data, &self.gyro.data, &self.accel.data);
                out!(console, "altitude: {:.3}\r\n", self.barometer.data);
                out!(console, "compass: {:.3}, {:.3}, {:.3}\r\n", c.x, c.y, c.z);
                out!(console, "gyro: {:.3}, {:.3}, {:.3}\r\n", g.x, g.y, g.z);
                out!(console, "accel: {:.3}, {:.3}, {:.3}\r\n", a.x, a.y, a.z);
            }
            WatchTarget::Attitude => {
                let att = self.attitude();
                out!(console, "attitude: {:.3}, {:.3}, {:.3}\r\n", att.x, att.y, att.z);
            }
            WatchTarget::Inputs => {
                let rpy = self.input_roll_pitch_yaw();
                out!(console, "roll-pitch-yaw: {:.3}, {:.3}, {:.3}\r\n", rpy.x, rpy.y, rpy.z);
                out!(console, "throttle: {:.3}\r\n", self.input_throttle());
            }
        }
    }

    fn motors_key(
        &mut self,
        console: &mut Console<'_>,
        mut selected: [bool; MAX_MOTORS],
        key: Option<u8>,
    ) -> Option<Session> {
        let key = match key {
            Some(b'q') => return None,
            Some(k) => k,
            None => return Some(Session::Motors { selected }),
        };

        let motors = self.motors();
        let n = motors.num_motors().min(MAX_MOTORS);

        match key {
            b' ' => (0..n).for_each(|m| motors.set_motor_speed(m, 0.0)),
            b'j' => change_speed(motors, &selected[..n], -0.01),
            b'k' => change_speed(motors, &selected[..n], 0.01),
            b'n' => change_speed(motors, &selected[..n], -0.001),
            b'm' => change_speed(motors, &selected[..n], 0.001),
            b'u' | b'i' => {
                let step = if key == b'u' { -25 } else { 25 };
                let hz = (motors.pwm_freq() as i32 + step)
                    .clamp(PWM_FREQ_MIN_HZ as i32, PWM_FREQ_MAX_HZ as i32);
                if !motors.set_pwm_freq(hz as u32) {
                    out!(console, "PWM frequency {} Hz rejected\r\n", hz);
                }
            }
            b'x' => {
                // 1 ms pulse
                let duty = (motors.pwm_freq() as f32 / 1000.0).clamp(0.0, 1.0);
                for m in (0..n).filter(|&m| selected[m]) {
                    motors.set_motor_speed(m, duty);
                }
            }
            b'c' => {
                for m in (0..n).filter(|&m| selected[m]) {
                    let min = motors.min_thrust(m);
                    motors.set_motor_speed(m, min);
                }
            }
            b'1'..=b'9' => {
                let idx = (key - b'1') as usize;
                if idx < n {
                    selected[idx] = !selected[idx];
                } else if idx == n {
                    selected[..n].iter_mut().for_each(|s| *s = !*s);
                } else {
                    return Some(Session::Motors { selected });
                }
            }
            _ => return Some(Session::Motors { selected }),
        }

        self.print_motors(console, &selected);
        Some(Session::Motors { selected })
    }

    fn print_motors(&mut self, console: &mut Console<'_>, selected: &[bool; MAX_MOTORS]) {
        let motors = self.motors();
        let n = motors.num_motors().min(MAX_MOTORS);

        out!(console, "Selected motors:");
        let mut any = false;
        for m in (0..n).filter(|&m| selected[m]) {
            out!(console, " {}", m);
            any = true;
        }
        if !any {
            out!(console, " none (use keys '1'-'{}')", n);
        }

        let hz = motors.pwm_freq();
        out!(console, "\r\nPWM frequency: {} Hz\r\n", hz);
        for m in 0..n {
            let speed = motors.motor_speed(m);
            let pulse_ms = if hz > 0 { speed / hz as f32 * 1000.0 } else { 0.0 };
            out!(console, "Motor {} speed: {:.4} ({:.3} ms)\r\n", m, speed, pulse_ms);
        }
    }

    fn stabilize_key(
        &mut self,
        console: &mut Console<'_>,
        mut throttle: f32,
        mut next_print: Timestamp,
        key: Option<u8>,
        now: Timestamp,
    ) -> Option<Session> {
        let axes = [AXIS_ROLL, AXIS_PITCH, AXIS_YAW];
        let enabled = axes.map(|axis| self.stabilize(axis));

        match key {
            Some(b'q') => {
                self.motors().set_motor_speed_min();
                self.enable_all_axes();
                return None;
            }
            Some(b' ') => {
                throttle = -1.0;
                for axis in axes {
                    self.set_stabilize(axis, false);
                }
            }
            Some(b'j') => throttle -= 0.01,
            Some(b'k') => throttle += 0.01,
            Some(b'n') => throttle -= 0.001,
            Some(b'm') => throttle += 0.001,
            Some(k @ b'1'..=b'3') => {
                let axis = (k - b'1') as usize;
                self.set_stabilize(axis, !enabled[axis]);
            }
            Some(k @ (b'w' | b'e' | b's' | b'd' | b'x' | b'c')) => {
                let delta = if matches!(k, b'w' | b's' | b'x') { -0.1 } else { 0.1 };
                for axis in axes.into_iter().filter(|&a| enabled[a]) {
                    let pid = &mut self.pids_mut()[axis];
                    let (kp, ki, kd) = (pid.kp(), pid.ki(), pid.kd());
                    match k {
                        b'w' | b'e' => pid.set_kp(kp + delta),
                        b's' | b'd' => pid.set_ki(ki + delta),
                        _ => pid.set_kd(kd + delta),
                    }
                }
            }
            _ => {}
        }
        throttle = throttle.clamp(-1.0, 1.0);

        let output = *self.pid_output();
        self.motors().set_thrust(throttle, &output);

        if !time_after(next_print, now) {
            console.clear_screen();
            self.print_stabilize(console, throttle);
            next_print = now.wrapping_add(STABILIZE_INTERVAL_MS * 1000);
        }
        Some(Session::Stabilize {
            throttle,
            next_print,
        })
    }

    fn print_stabilize(&self, console: &mut Console<'_>, throttle: f32) {
        out!(console, "Stabilize:");
        let names = ["Roll", "Pitch", "Yaw"];
        let mut any = false;
        for axis in [AXIS_ROLL, AXIS_PITCH, AXIS_YAW] {
            if self.stabilize(axis) {
                out!(console, " {}", names[axis]);
                any = true;
            }
        }
        if !any {
            out!(console, " none (use '1'-'3')");
        }
        out!(console, "\r\nThrottle: {:.3}\r\n", throttle);
        for (name, pid) in ["Roll ", "Pitch", "Yaw  "].iter().zip(self.pids()) {
            out!(
                console,
                "PID {}: P={:.3}, I={:.3}, D={:.3}\r\n",
                name,
                pid.kp(),
                pid.ki(),
                pid.kd()
            );
        }
        let dest = self.input_roll_pitch_yaw();
        let cur = self.attitude();
        out!(console, "Dest roll/pitch/yaw: {:.3}, {:.3}, {:.3}\r\n", dest.x, dest.y, dest.z);
        out!(console, "Cur  roll/pitch/yaw: {:.3}, {:.3}, {:.3}\r\n", cur.x, cur.y, cur.z);
    }
}

fn change_speed(motors: &mut dyn Motors, selected: &[bool], amount: f32) {
    for (m, _) in selected.iter().enumerate().filter(|(_, s)| **s) {
        let speed = (motors.motor_speed(m) + amount).clamp(0.0, 1.0);
        motors.set_motor_speed(m, speed);
    }
}
