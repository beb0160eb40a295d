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

use super::backtrace::{Backtrace, RamWindow, StackTrace};
use super::codes::Irq;
use super::context::Context;

#[cfg(feature = "hw")]
fn read_word(addr: u32) -> u32 {
    // StackTrace only hands out addresses inside the RAM window.
    unsafe { crate::arch::mmio::read32(addr as usize) }
}

#[cfg(not(feature = "hw"))]
fn read_word(_addr: u32) -> u32 {
    super::backtrace::FRAME_END
}

/// Prints the saved registers and a stack trace of the faulting code.
pub fn dump_context(class: u32, source: Option<Irq>, context: &Context, window: RamWindow) {
    match source {
        Some(source) => error!("Unhandled exception: event {}, vector class {}", source, class),
        None => error!("Unexpected entry through vector class {}", class),
    }

    print_raw!(
        " PC {:08x}   PR {:08x}   SR {:08x}  GBR {:08x}\n",
        context.pc,
        context.pr,
        context.sr,
        context.gbr
    );
    for (row, regs) in context.r.chunks(4).enumerate() {
        print_raw!(
            " R{:<2} {:08x}  R{:<2} {:08x}  R{:<2} {:08x}  R{:<2} {:08x}\n",
            row * 4,
            regs[0],
            row * 4 + 1,
            regs[1],
            row * 4 + 2,
            regs[2],
            row * 4 + 3,
            regs[3]
        );
    }

    print_raw!("{}", Backtrace(StackTrace::new(context.r[14], window, read_word)));
}
