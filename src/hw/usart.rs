// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! USART console terminal.
//!
//! Output blocks per byte, input never blocks. The console sends `\r\n` line endings.
//!
//! To access the terminal on the host machine, connect to the debug USB port and use
//! ```
//! $ screen /dev/tty.usbmodem* <baud_rate>
//! ```
//!
//! To close the debug terminal, press `Ctrl+A` then `Ctrl+\` then `y`.

use nb::block;

use stm32f7xx_hal::{
    prelude::*,
    serial::{Instance, Pins, Rx, Serial, Tx},
};

use crate::console::Terminal;

pub struct UsartTerminal<U: Instance> {
    tx: Tx<U>,
    rx: Rx<U>,
}

impl<U: Instance> UsartTerminal<U> {
    pub fn new<PINS: Pins<U>>(serial: Serial<U, PINS>) -> Self {
        let (tx, rx) = serial.split();
        Self { tx, rx }
    }

    #[inline]
    pub fn write_byte(&mut self, b: u8) {
        let _ = block!(self.tx.write(b));
    }

    /// Block until the hardware TX FIFO/drain is flushed.
    #[inline]
    pub fn flush(&mut self) {
        let _ = block!(self.tx.flush());
    }
}

impl<U: Instance> Terminal for UsartTerminal<U> {
    fn read_byte(&mut self) -> Option<u8> {
        // overrun and framing errors drop the byte
        self.rx.read().ok()
    }

    fn write_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.write_byte(b);
        }
    }
}
