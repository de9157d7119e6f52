// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Flight modes and their transitions.
//!
//! ```text
//!  Init ──(delay)──> Landed <──off── Manual
//!    │                 │  └─middle──>  ↑ │
//!    │ (debug)         │              mid on
//!    ▼                 └──on──> Flying ┘ ↓
//!  Debug                          ↑──────┘
//! ```
//!
//! [`transition`] is pure: it names the next state and the actions to run on the way, and the
//! controller executes them. Debug is never left.

/// Mode of the flight loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightState {
    /// Sensors settling after power-on
    Init,
    /// Diagnostics only, motors are never driven automatically
    Debug,
    /// Motors at minimum, waiting for the mode switch
    Landed,
    /// Sticks go straight to the mixer
    Manual,
    /// Attitude stabilized by the PIDs
    Flying,
}

/// Position of the mode switch. A two-position switch only reports `Off` and `On`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchPosition {
    Off,
    Middle,
    On,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The settling delay after power-on has passed.
    InitElapsed,
    Switch(SwitchPosition),
}

/// Side effect of a transition, executed in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Show the new state on the status LED.
    UpdateBlinkRate,
    DisableFastConvergence,
    /// Hold the motors at minimum so the ESCs arm. Blocks.
    InitMotors,
    /// Reset the integrators of all three PIDs.
    ResetIntegrators,
    /// Seed the relative input converters with the current attitude and zero throttle.
    ReseedInputs,
    MotorsMin,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: FlightState,
    pub actions: &'static [Action],
}

const TO_DEBUG: &[Action] = &[Action::UpdateBlinkRate, Action::DisableFastConvergence];

const TO_LANDED_FROM_INIT: &[Action] = &[
    Action::UpdateBlinkRate,
    Action::DisableFastConvergence,
    Action::InitMotors,
];

const TAKEOFF: &[Action] = &[
    Action::UpdateBlinkRate,
    Action::ResetIntegrators,
    Action::ReseedInputs,
];

const TO_MANUAL: &[Action] = &[Action::UpdateBlinkRate];

const LANDING: &[Action] = &[Action::UpdateBlinkRate, Action::MotorsMin];

/// Next state for `event` in `state`, or `None` if the event does not change the state.
pub fn transition(state: FlightState, event: Event, debug: bool) -> Option<Transition> {
    use FlightState::*;
    use SwitchPosition::*;

    let (next, actions) = match (state, event) {
        (Init, Event::InitElapsed) if debug => (Debug, TO_DEBUG),
        (Init, Event::InitElapsed) => (Landed, TO_LANDED_FROM_INIT),
        (Landed | Manual, Event::Switch(On)) => (Flying, TAKEOFF),
        (Landed | Flying, Event::Switch(Middle)) => (Manual, TO_MANUAL),
        (Manual | Flying, Event::Switch(Off)) => (Landed, LANDING),
        _ => return None,
    };
    Some(Transition { next, actions })
}

impl SwitchPosition {
    /// Position of a switch with `num_states` positions in state `state`.
    pub fn from_state(state: u8, num_states: u8) -> Self {
        if state == 0 {
            SwitchPosition::Off
        } else if state + 1 >= num_states {
            SwitchPosition::On
        } else {
            SwitchPosition::Middle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITIONS: [SwitchPosition; 3] =
        [SwitchPosition::Off, SwitchPosition::Middle, SwitchPosition::On];

    #[test]
    fn init_goes_to_landed_after_motor_init() {
        let t = transition(FlightState::Init, Event::InitElapsed, false).unwrap();
        assert_eq!(t.next, FlightState::Landed);
        assert!(t.actions.contains(&Action::InitMotors));
        assert!(t.actions.contains(&Action::DisableFastConvergence));
    }

    #[test]
    fn debug_build_never_leaves_debug() {
        let t = transition(FlightState::Init, Event::InitElapsed, true).unwrap();
        assert_eq!(t.next, FlightState::Debug);
        assert!(!t.actions.contains(&Action::InitMotors));
        for p in POSITIONS {
            assert_eq!(transition(FlightState::Debug, Event::Switch(p), true), None);
        }
    }

    #[test]
    fn init_ignores_switch() {
        for p in POSITIONS {
            assert_eq!(transition(FlightState::Init, Event::Switch(p), false), None);
        }
    }

    #[test]
    fn takeoff_resets_controllers() {
        for from in [FlightState::Landed, FlightState::Manual] {
            let t = transition(from, Event::Switch(SwitchPosition::On), false).unwrap();
            assert_eq!(t.next, FlightState::Flying);
            assert!(t.actions.contains(&Action::ResetIntegrators));
            assert!(t.actions.contains(&Action::ReseedInputs));
        }
    }

    #[test]
    fn landing_idles_motors() {
        for from in [FlightState::Manual, FlightState::Flying] {
            let t = transition(from, Event::Switch(SwitchPosition::Off), false).unwrap();
            assert_eq!(t.next, FlightState::Landed);
            assert_eq!(t.actions, &[Action::UpdateBlinkRate, Action::MotorsMin]);
        }
    }

    #[test]
    fn holding_position_is_not_a_transition() {
        let hold = [
            (FlightState::Landed, SwitchPosition::Off),
            (FlightState::Manual, SwitchPosition::Middle),
            (FlightState::Flying, SwitchPosition::On),
        ];
        for (state, p) in hold {
            assert_eq!(transition(state, Event::Switch(p), false), None);
        }
        assert_eq!(transition(FlightState::Landed, Event::InitElapsed, false), None);
    }

    #[test]
    fn switch_positions_from_states() {
        assert_eq!(SwitchPosition::from_state(0, 2), SwitchPosition::Off);
        assert_eq!(SwitchPosition::from_state(1, 2), SwitchPosition::On);
        assert_eq!(SwitchPosition::from_state(1, 3), SwitchPosition::Middle);
        assert_eq!(SwitchPosition::from_state(2, 3), SwitchPosition::On);
    }
}
