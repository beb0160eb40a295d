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

use core::fmt;

/// Exception or interrupt event code, as read from EXPEVT or INTEVT.
///
/// Hardware codes are multiples of 0x20; the two software events sit in the
/// otherwise unused top of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Irq(u16);

/// Handler table slots are 16 codes apart.
pub const CODE_STEP: u16 = 0x10;
pub const CODE_LIMIT: u16 = 0x1000;
pub const TABLE_SIZE: usize = (CODE_LIMIT / CODE_STEP) as usize;

impl Irq {
    pub const RESET_POWERON: Irq = Irq(0x0000);
    pub const RESET_MANUAL: Irq = Irq(0x0020);
    pub const TLB_MISS_READ: Irq = Irq(0x0040);
    pub const TLB_MISS_WRITE: Irq = Irq(0x0060);
    pub const INITIAL_PAGE_WRITE: Irq = Irq(0x0080);
    pub const TLB_PROT_READ: Irq = Irq(0x00a0);
    pub const TLB_PROT_WRITE: Irq = Irq(0x00c0);
    pub const DATA_ADDR_READ: Irq = Irq(0x00e0);
    pub const DATA_ADDR_WRITE: Irq = Irq(0x0100);
    pub const FPU: Irq = Irq(0x0120);
    pub const TLB_MULTI_HIT: Irq = Irq(0x0140);
    pub const TRAPA: Irq = Irq(0x0160);
    pub const ILLEGAL_INSTR: Irq = Irq(0x0180);
    pub const SLOT_ILLEGAL_INSTR: Irq = Irq(0x01a0);
    pub const NMI: Irq = Irq(0x01c0);
    pub const USER_BREAK: Irq = Irq(0x01e0);
    pub const IRQ9: Irq = Irq(0x0320);
    pub const IRQ11: Irq = Irq(0x0360);
    pub const IRQ13: Irq = Irq(0x03a0);
    pub const TMU0: Irq = Irq(0x0400);
    pub const TMU1: Irq = Irq(0x0420);
    pub const TMU2: Irq = Irq(0x0440);
    pub const TMU2_CAPTURE: Irq = Irq(0x0460);
    pub const RTC_ALARM: Irq = Irq(0x0480);
    pub const RTC_PERIODIC: Irq = Irq(0x04a0);
    pub const RTC_CARRY: Irq = Irq(0x04c0);
    pub const SCIF_ERROR: Irq = Irq(0x0700);
    pub const SCIF_RX: Irq = Irq(0x0720);
    pub const SCIF_BREAK: Irq = Irq(0x0740);
    pub const SCIF_TX: Irq = Irq(0x0760);
    pub const GENERAL_FPU: Irq = Irq(0x0800);
    pub const SLOT_FPU: Irq = Irq(0x0820);
    /// Raised in software when nothing handled an event.
    pub const UNHANDLED_EXC: Irq = Irq(0x0fe0);
    /// Raised in software when an event arrives while another is handled.
    pub const DOUBLE_FAULT: Irq = Irq(0x0ff0);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn from_event(raw: u32) -> Self {
        Self(raw as u16)
    }

    pub const fn code(self) -> u16 {
        self.0
    }

    /// Slot in the handler table, if this code can own one.
    pub const fn table_index(self) -> Option<usize> {
        if self.0 % CODE_STEP != 0 || self.0 >= CODE_LIMIT {
            return None;
        }

        Some((self.0 / CODE_STEP) as usize)
    }

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::RESET_POWERON => "power-on reset",
            Self::RESET_MANUAL => "manual reset",
            Self::TLB_MISS_READ => "TLB miss (read)",
            Self::TLB_MISS_WRITE => "TLB miss (write)",
            Self::INITIAL_PAGE_WRITE => "initial page write",
            Self::TLB_PROT_READ => "TLB protection violation (read)",
            Self::TLB_PROT_WRITE => "TLB protection violation (write)",
            Self::DATA_ADDR_READ => "address error (read)",
            Self::DATA_ADDR_WRITE => "address error (write)",
            Self::FPU => "FPU exception",
            Self::TLB_MULTI_HIT => "TLB multi-hit",
            Self::TRAPA => "trapa",
            Self::ILLEGAL_INSTR => "illegal instruction",
            Self::SLOT_ILLEGAL_INSTR => "slot illegal instruction",
            Self::NMI => "NMI",
            Self::USER_BREAK => "user break",
            Self::TMU0 => "TMU0 underflow",
            Self::TMU1 => "TMU1 underflow",
            Self::TMU2 => "TMU2 underflow",
            Self::GENERAL_FPU => "FPU disabled",
            Self::SLOT_FPU => "slot FPU disabled",
            Self::UNHANDLED_EXC => "unhandled exception",
            Self::DOUBLE_FAULT => "double fault",
            _ => return None,
        };

        Some(name)
    }
}

impl fmt::Display for Irq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{:#06x} ({})", self.0, name),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

/// Which vector the low level entry code came in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    Reset = 0,
    Exception = 1,
    TlbMiss = 2,
    Interrupt = 3,
}

impl EntryClass {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Reset),
            1 => Some(Self::Exception),
            2 => Some(Self::TlbMiss),
            3 => Some(Self::Interrupt),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_index_rejects_unaligned_and_out_of_range() {
        assert_eq!(Irq::TMU0.table_index(), Some(0x40));
        assert_eq!(Irq::DOUBLE_FAULT.table_index(), Some(0xff));
        assert_eq!(Irq::new(0x0408).table_index(), None);
        assert_eq!(Irq::new(0x1000).table_index(), None);
    }

    #[test]
    fn display_includes_name_when_known() {
        assert_eq!(format!("{}", Irq::TRAPA), "0x0160 (trapa)");
        assert_eq!(format!("{}", Irq::new(0x0600)), "0x0600");
    }
}
