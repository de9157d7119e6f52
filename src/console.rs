// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Diagnostic console line discipline.
//!
//! [`Console`] reads bytes from a [`Terminal`] without blocking and assembles them into command
//! lines, echoing input and handling backspace. While a command runs interactively (a live watch
//! or a motor jog), every byte is passed through as a key press instead.
//!
//! Output goes through [`core::fmt::Write`], so `write!` works on a console. Terminals expect
//! `\r\n` line endings.

use core::fmt;

/// Longest command line, excess input is dropped.
pub const LINE_CAPACITY: usize = 64;

pub const PROMPT: &str = "> ";

/// Byte-level serial terminal.
pub trait Terminal {
    /// Next received byte, if any. Must not block.
    fn read_byte(&mut self) -> Option<u8>;

    fn write_str(&mut self, s: &str);
}

/// One complete command line.
#[derive(Copy, Clone)]
pub struct Line {
    buf: [u8; LINE_CAPACITY],
    len: usize,
}

impl Line {
    const fn empty() -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        // only printable ASCII is ever stored
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    /// First word of the line.
    pub fn command(&self) -> &str {
        self.as_str().split_whitespace().next().unwrap_or("")
    }

    /// Words after the command.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.as_str().split_whitespace().skip(1)
    }

    fn push(&mut self, b: u8) -> bool {
        if self.len < LINE_CAPACITY {
            self.buf[self.len] = b;
            self.len += 1;
            true
        } else {
            false
        }
    }

    fn pop(&mut self) -> bool {
        if self.len > 0 {
            self.len -= 1;
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Line").field(&self.as_str()).finish()
    }
}

/// Result of one [`Console::poll`].
#[derive(Copy, Clone, Debug)]
pub enum ConsoleEvent {
    /// A non-empty command line was entered.
    Line(Line),
    /// A key was pressed while in interactive mode.
    Key(u8),
}

pub struct Console<'a> {
    term: &'a mut dyn Terminal,
    line: Line,
    interactive: bool,
}

impl<'a> Console<'a> {
    pub fn new(term: &'a mut dyn Terminal) -> Self {
        Self {
            term,
            line: Line::empty(),
            interactive: false,
        }
    }

    /// Consume pending input until a line or key is complete.
    pub fn poll(&mut self) -> Option<ConsoleEvent> {
        while let Some(b) = self.term.read_byte() {
            if self.interactive {
                return Some(ConsoleEvent::Key(b));
            }
            match b {
                b'\r' | b'\n' => {
                    if self.line.len == 0 {
                        continue;
                    }
                    self.term.write_str("\r\n");
                    let line = core::mem::replace(&mut self.line, Line::empty());
                    return Some(ConsoleEvent::Line(line));
                }
                0x08 | 0x7f => {
                    if self.line.pop() {
                        self.term.write_str("\x08 \x08");
                    }
                }
                0x20..=0x7e => {
                    if self.line.push(b) {
                        let echo = [b];
                        self.term.write_str(core::str::from_utf8(&echo).unwrap_or(""));
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// In interactive mode every byte is reported as [`ConsoleEvent::Key`].
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    #[inline]
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn prompt(&mut self) {
        self.term.write_str(PROMPT);
    }

    /// Clear the screen and move the cursor home (ANSI).
    pub fn clear_screen(&mut self) {
        self.term.write_str("\x1b[2J\x1b[H");
    }
}

impl fmt::Write for Console<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.term.write_str(s);
        Ok(())
    }
}
