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

//! Exception event registers and interrupt priority setup.

use super::mmio;
use crate::irq::EventSource;

pub const TRA: usize = 0xff00_0020;
pub const EXPEVT: usize = 0xff00_0024;
pub const INTEVT: usize = 0xff00_0028;

pub const IPRA: usize = 0xffd0_0004;

/// The CPU's own event code registers.
pub struct CpuEvents;

pub static CPU_EVENTS: CpuEvents = CpuEvents;

impl EventSource for CpuEvents {
    fn exception_event(&self) -> u32 {
        unsafe { mmio::read32(EXPEVT) }
    }

    fn interrupt_event(&self) -> u32 {
        unsafe { mmio::read32(INTEVT) }
    }

    fn trap_code(&self) -> u32 {
        unsafe { mmio::read32(TRA) }
    }
}

/// Sets the 4-bit priority of the TMU channel in IPRA.
pub fn set_timer_priority(channel: usize, priority: u16) {
    let shift = 12 - 4 * channel as u16;
    unsafe {
        let ipra = mmio::read16(IPRA);
        let ipra = (ipra & !(0xf << shift)) | ((priority & 0xf) << shift);
        mmio::write16(IPRA, ipra);
    }
}
