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

//! Timer unit, channels 0 to 2.

use super::{intc, mmio, PERIPHERAL_CLOCK};
use crate::irq::TimerUnit;
use spin::Mutex;

const TMU_BASE: usize = 0xffd8_0000;
const TSTR: usize = TMU_BASE + 0x04;

const TCR_UNF: u16 = 0x0100;
const TCR_UNIE: u16 = 0x0020;
/// Counts at Pφ/4.
const TCR_TPSC_DIV4: u16 = 0x0000;

pub const CHANNELS: usize = 3;

const fn tcor(channel: usize) -> usize {
    TMU_BASE + 0x08 + channel * 12
}

const fn tcnt(channel: usize) -> usize {
    TMU_BASE + 0x0c + channel * 12
}

const fn tcr(channel: usize) -> usize {
    TMU_BASE + 0x10 + channel * 12
}

/// Reload value giving `hz` underflows per second.
pub const fn reload_for(hz: u32) -> u32 {
    PERIPHERAL_CLOCK / 4 / hz
}

pub struct Tmu {
    // TSTR is shared between channels.
    tstr: Mutex<()>,
}

pub static TMU: Tmu = Tmu { tstr: Mutex::new(()) };

impl TimerUnit for Tmu {
    fn clear_underflow(&self, channel: usize) {
        unsafe {
            let value = mmio::read16(tcr(channel));
            mmio::write16(tcr(channel), value & !TCR_UNF);
        }
    }

    fn start(&self, channel: usize, hz: u32) {
        let reload = reload_for(hz.max(1));
        self.stop(channel);
        unsafe {
            mmio::write32(tcor(channel), reload);
            mmio::write32(tcnt(channel), reload);
            mmio::write16(tcr(channel), TCR_TPSC_DIV4 | TCR_UNIE);
        }
        intc::set_timer_priority(channel, 15);

        let _guard = self.tstr.lock();
        unsafe {
            let tstr = mmio::read8(TSTR);
            mmio::write8(TSTR, tstr | (1 << channel));
        }
    }

    fn stop(&self, channel: usize) {
        let _guard = self.tstr.lock();
        unsafe {
            let tstr = mmio::read8(TSTR);
            mmio::write8(TSTR, tstr & !(1 << channel));
        }
    }
}
