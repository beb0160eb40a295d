/*
 * dckernel is a kernel core for the SH-4 based Dreamcast console
 * Copyright (C) 2025  MD Gaziur Rahman Noor
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! dmesg: the last [`DMESG_LINES`] log lines, kept in a fixed ring so that
//! logging from interrupt context never allocates.

use crate::ds::RingBuffer;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::{self, Write};

pub const DMESG_LINES: usize = 64;
pub const LINE_LEN: usize = 120;

#[derive(Clone, Copy)]
pub struct LogLine {
    bytes: [u8; LINE_LEN],
    len: usize,
}

impl LogLine {
    pub const EMPTY: Self = Self {
        bytes: [0; LINE_LEN],
        len: 0,
    };

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

impl Write for LogLine {
    /// Truncates at the line length, never inside a character.
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = LINE_LEN - self.len;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.bytes[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;

        Ok(())
    }
}

type Dmesg = RingBuffer<LogLine, DMESG_LINES>;

#[cfg(not(test))]
fn with_dmesg<R>(f: impl FnOnce(&mut Dmesg) -> R) -> R {
    static DMESG: spin::Mutex<Dmesg> = spin::Mutex::new(RingBuffer::new(LogLine::EMPTY));
    f(&mut DMESG.lock())
}

// Tests run in parallel; keep each thread's log to itself.
#[cfg(test)]
fn with_dmesg<R>(f: impl FnOnce(&mut Dmesg) -> R) -> R {
    use std::cell::RefCell;
    std::thread_local! {
        static DMESG: RefCell<Dmesg> = const { RefCell::new(RingBuffer::new(LogLine::EMPTY)) };
    }
    DMESG.with(|dmesg| f(&mut dmesg.borrow_mut()))
}

pub fn dmesgln(prefix: &str, msg: fmt::Arguments) {
    let mut line = LogLine::EMPTY;
    let _ = write!(line, "{} {}", prefix, msg);
    with_dmesg(|dmesg| dmesg.insert(line));
}

/// Oldest line first.
pub fn dmesg_get_all() -> Vec<String> {
    with_dmesg(|dmesg| dmesg.iter().map(|line| line.as_str().to_string()).collect())
}
