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

pub mod console;

use crate::arch::cpu::Cpu;
use core::fmt;

#[macro_export]
macro_rules! kprint {
    ($prefix_colored:literal, $prefix:literal, $($arg:tt)*) => {
        $crate::logging::log($prefix_colored, $prefix, format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! print_raw {
    ($($arg:tt)*) => {
        $crate::logging::print_raw(format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => ($crate::kprint!("\x1B[1;34m[ Info  ]\x1B[0m", "[ Info  ]", $($arg)*));
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => ($crate::kprint!("\x1B[1;31m[ Error ]\x1B[0m", "[ Error ]", $($arg)*));
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ($crate::kprint!("\x1B[1;33m[ Warn  ]\x1B[0m", "[ Warn  ]", $($arg)*));
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => ($crate::kprint!("\x1B[1;90m[ Debug ]\x1B[0m", "[ Debug ]", $($arg)*));
}

/// Writes one prefixed line to the console and keeps a plain copy in dmesg.
pub fn log(prefix_colored: &str, prefix: &str, msg: fmt::Arguments) {
    Cpu::without_interrupts(|| {
        console::write(format_args!("{} {}\n", prefix_colored, msg));
        crate::dbg::dmesgln(prefix, msg);
    });
}

pub fn print_raw(msg: fmt::Arguments) {
    Cpu::without_interrupts(|| console::write(msg));
}
