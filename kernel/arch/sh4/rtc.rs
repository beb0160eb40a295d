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

//! AICA real time clock. Counts seconds since 1950-01-01 00:00 in two
//! 16-bit halves.

use super::mmio;

const RTC_HIGH: usize = 0xa071_0000;
const RTC_LOW: usize = 0xa071_0004;

/// Seconds between 1950-01-01 and 1970-01-01.
pub const UNIX_OFFSET: i64 = 631_152_000;

pub fn read_raw() -> u32 {
    // The low half can carry into the high half between the two reads.
    loop {
        let (high, low, again) = unsafe {
            (
                mmio::read32(RTC_HIGH) & 0xffff,
                mmio::read32(RTC_LOW) & 0xffff,
                mmio::read32(RTC_HIGH) & 0xffff,
            )
        };
        if high == again {
            return (high << 16) | low;
        }
    }
}

/// Wall clock in seconds since the unix epoch.
pub fn unix_time() -> i64 {
    i64::from(read_raw()) - UNIX_OFFSET
}
