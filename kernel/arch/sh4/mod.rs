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

//! SH-4 (SH7091) support: status register control, on-chip peripherals and
//! the holly ASIC interrupt routing used by the rest of the kernel.

pub mod asic;
pub mod cpu;
pub mod intc;
pub mod mmio;
pub mod rtc;
pub mod scif;
pub mod tmu;

/// Peripheral clock feeding the TMU and SCIF.
pub const PERIPHERAL_CLOCK: u32 = 50_000_000;

/// Physical address of a P1/P2 pointer.
pub const fn physical(addr: usize) -> usize {
    addr & 0x1fff_ffff
}

/// Uncached (P2) alias of a P1 or physical address.
pub const fn uncached(addr: usize) -> usize {
    physical(addr) | 0xa000_0000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_space_aliases() {
        assert_eq!(physical(0x8c01_0000), 0x0c01_0000);
        assert_eq!(uncached(0x8c01_0000), 0xac01_0000);
        assert_eq!(uncached(0x0c01_0000), 0xac01_0000);
    }
}
