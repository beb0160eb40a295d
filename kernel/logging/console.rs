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

//! Kernel console. Output goes to the SCIF once it has been brought up and
//! is dropped before that.

use crate::arch::scif::Scif;
use core::fmt::{self, Write};
use lazy_static::lazy_static;
use spin::Mutex;

pub const BAUD_RATE: u32 = 115_200;

lazy_static! {
    static ref CONSOLE: Mutex<Console> = Mutex::new(Console { serial: None });
}

pub struct Console {
    serial: Option<Scif>,
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match &mut self.serial {
            Some(serial) => serial.write_str(s),
            None => Ok(()),
        }
    }
}

/// Brings up the serial port.
///
/// # Safety
///
/// Must run on hardware, once, before interrupts are enabled.
pub unsafe fn init(baud: u32) {
    let serial = unsafe { Scif::init(baud) };
    CONSOLE.lock().serial = Some(serial);
}

pub fn write(msg: fmt::Arguments) {
    let _ = CONSOLE.lock().write_fmt(msg);
}

/// Releases the console lock held by whatever was interrupted.
///
/// # Safety
///
/// Only for the panic path, after interrupts are off for good.
pub unsafe fn force_unlock() {
    unsafe { CONSOLE.force_unlock() }
}
