// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! RC receiver edge capture.
//!
//! Every receiver pin raises EXTI on both edges. The interrupt handlers call [`service_exti`],
//! which timestamps the edge and records it in a shared [`EdgeTable`]. The flight loop reads the
//! table through [`RcCapture`], a [`PulseSource`] that copies it inside a critical section.

use core::cell::RefCell;

use cortex_m::interrupt::{self, Mutex};
use stm32f7xx_hal::{
    gpio::{gpioc, Edge, ExtiPin, Floating, Input},
    pac,
    prelude::*,
};

use crate::hw::clock;
use crate::input::{EdgeTable, PulseEdges, PulseSource};

/// Receiver pins, in capture slot order.
pub const NUM_PINS: usize = 5;

pub struct RcPins {
    pub ch0: gpioc::PC6<Input<Floating>>,
    pub ch1: gpioc::PC7<Input<Floating>>,
    pub ch2: gpioc::PC8<Input<Floating>>,
    pub ch3: gpioc::PC9<Input<Floating>>,
    pub ch4: gpioc::PC10<Input<Floating>>,
}

static EDGES: Mutex<RefCell<EdgeTable<NUM_PINS>>> = Mutex::new(RefCell::new(EdgeTable::new()));
static PINS: Mutex<RefCell<Option<RcPins>>> = Mutex::new(RefCell::new(None));

/// Route every receiver pin to EXTI on both edges and hand the pins to the interrupt handlers.
///
/// The caller unmasks `EXTI9_5` and `EXTI15_10` afterwards.
pub fn start(
    mut pins: RcPins,
    syscfg: &mut pac::SYSCFG,
    exti: &mut pac::EXTI,
    apb2: &mut stm32f7xx_hal::rcc::APB2,
) {
    macro_rules! route {
        ($($pin:ident),*) => {$(
            pins.$pin.make_interrupt_source(syscfg, apb2);
            pins.$pin.trigger_on_edge(exti, Edge::RisingFalling);
            pins.$pin.enable_interrupt(exti);
        )*};
    }
    route!(ch0, ch1, ch2, ch3, ch4);

    interrupt::free(|cs| PINS.borrow(cs).replace(Some(pins)));
}

/// Record every pending receiver edge. Call from `EXTI9_5` and `EXTI15_10`.
pub fn service_exti() {
    let now = clock::now_us();
    interrupt::free(|cs| {
        let mut pins = PINS.borrow(cs).borrow_mut();
        let pins = match pins.as_mut() {
            Some(p) => p,
            None => return,
        };
        let mut edges = EDGES.borrow(cs).borrow_mut();

        macro_rules! check {
            ($($slot:literal => $pin:ident),*) => {$(
                if pins.$pin.check_interrupt() {
                    pins.$pin.clear_interrupt_pending_bit();
                    let high = pins.$pin.is_high().unwrap_or(false);
                    edges.on_edge($slot, high, now);
                }
            )*};
        }
        check!(0 => ch0, 1 => ch1, 2 => ch2, 3 => ch3, 4 => ch4);
    });
}

/// Flight loop view of the captured edges.
pub struct RcCapture;

impl PulseSource for RcCapture {
    fn snapshot(&self, out: &mut [PulseEdges]) {
        interrupt::free(|cs| EDGES.borrow(cs).borrow().snapshot(out));
    }
}
