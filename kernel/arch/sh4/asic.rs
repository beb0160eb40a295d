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

//! Holly ASIC event routing. Peripheral completion events (maple DMA among
//! them) are collected here and raised on one of three IRL levels.

use super::mmio;

const ASIC_ACK_A: usize = 0xa05f_6900;
/// Enable masks for the IRL 13, 11 and 9 outputs, in that order.
const ASIC_IRQ_BASE: usize = 0xa05f_6910;

/// Maple DMA transfer complete, bit 12 of the first event word.
pub const EVT_MAPLE_DMA: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    Irq13 = 0,
    Irq11 = 1,
    Irq9 = 2,
}

pub fn enable_event(event: u32, line: IrqLine) {
    let reg = ASIC_IRQ_BASE + (line as usize) * 0x10;
    unsafe {
        let mask = mmio::read32(reg);
        mmio::write32(reg, mask | (1 << event));
    }
}

pub fn disable_event(event: u32, line: IrqLine) {
    let reg = ASIC_IRQ_BASE + (line as usize) * 0x10;
    unsafe {
        let mask = mmio::read32(reg);
        mmio::write32(reg, mask & !(1 << event));
    }
}

/// Returns whether `event` was pending and acknowledges it.
pub fn take_event(event: u32) -> bool {
    unsafe {
        let pending = mmio::read32(ASIC_ACK_A);
        if pending & (1 << event) == 0 {
            return false;
        }
        mmio::write32(ASIC_ACK_A, 1 << event);
    }

    true
}
