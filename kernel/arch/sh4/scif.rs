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

//! SCIF serial port, used as the kernel console.

use super::{mmio, PERIPHERAL_CLOCK};
use core::fmt;

const SCIF_BASE: usize = 0xffe8_0000;
const SCSMR2: usize = SCIF_BASE + 0x00;
const SCBRR2: usize = SCIF_BASE + 0x04;
const SCSCR2: usize = SCIF_BASE + 0x08;
const SCFTDR2: usize = SCIF_BASE + 0x0c;
const SCFSR2: usize = SCIF_BASE + 0x10;
const SCFCR2: usize = SCIF_BASE + 0x18;
const SCLSR2: usize = SCIF_BASE + 0x24;

const SCFSR2_TDFE: u16 = 0x0020;
const SCFSR2_TEND: u16 = 0x0040;
const SCSCR2_TE_RE: u16 = 0x0030;
const SCFCR2_FIFO_RESET: u16 = 0x0006;

pub const fn bit_rate_divider(baud: u32) -> u8 {
    (PERIPHERAL_CLOCK / (32 * baud) - 1) as u8
}

pub struct Scif;

impl Scif {
    /// Programs the port for 8N1 at `baud`.
    ///
    /// # Safety
    ///
    /// Must only be called on hardware that has the SCIF.
    pub unsafe fn init(baud: u32) -> Self {
        unsafe {
            mmio::write16(SCSCR2, 0);
            mmio::write16(SCFCR2, SCFCR2_FIFO_RESET);
            mmio::write16(SCSMR2, 0);
            mmio::write8(SCBRR2, bit_rate_divider(baud));
            mmio::write16(SCFCR2, 0);
            mmio::write16(SCFSR2, 0);
            mmio::write16(SCLSR2, 0);
            mmio::write16(SCSCR2, SCSCR2_TE_RE);
        }

        Self
    }

    pub fn write_byte(&mut self, byte: u8) {
        unsafe {
            while mmio::read16(SCFSR2) & SCFSR2_TDFE == 0 {}
            mmio::write8(SCFTDR2, byte);
            let status = mmio::read16(SCFSR2);
            mmio::write16(SCFSR2, status & !(SCFSR2_TDFE | SCFSR2_TEND));
        }
    }
}

impl fmt::Write for Scif {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_for_common_rates() {
        assert_eq!(bit_rate_divider(115_200), 12);
        assert_eq!(bit_rate_divider(57_600), 26);
    }
}
