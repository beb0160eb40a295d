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

use crate::arch::cpu::SR_MD;
use crate::irq::backtrace::FRAME_END;

/// FPSCR for new tasks: denormals flushed to zero.
pub const FPSCR_DEFAULT: u32 = 0x0004_0000;

/// Register save area filled by the exception entry code and restored on
/// return. The entry code addresses fields by offset, so the layout is
/// fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct Context {
    pub r: [u32; 16],
    pub pc: u32,
    pub pr: u32,
    pub gbr: u32,
    pub vbr: u32,
    pub mach: u32,
    pub macl: u32,
    pub sr: u32,
    pub fpul: u32,
    /// FPU bank 1 (XF registers).
    pub frbank: [u32; 16],
    pub fr: [u32; 16],
    pub fpscr: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    Kernel,
    User,
}

impl Context {
    pub const fn zeroed() -> Self {
        Self {
            r: [0; 16],
            pc: 0,
            pr: 0,
            gbr: 0,
            vbr: 0,
            mach: 0,
            macl: 0,
            sr: 0,
            fpul: 0,
            frbank: [0; 16],
            fr: [0; 16],
            fpscr: 0,
        }
    }

    /// Initial context of a task entering `entry` on `stack_top`. Up to
    /// four arguments go in r4..r7; `return_to` is where `entry` returns.
    pub fn for_task(entry: u32, stack_top: u32, args: &[u32], return_to: u32, mode: TaskMode) -> Self {
        assert!(args.len() <= 4, "a task takes at most four register arguments");

        let mut context = Self::zeroed();
        context.pc = entry;
        context.pr = return_to;
        context.r[15] = stack_top;
        // Terminates frame pointer walks at the task's first frame.
        context.r[14] = FRAME_END;
        context.r[4..4 + args.len()].copy_from_slice(args);
        context.sr = match mode {
            TaskMode::Kernel => SR_MD,
            TaskMode::User => 0,
        };
        context.fpscr = FPSCR_DEFAULT;

        context
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, offset_of, size_of};

    #[test]
    fn layout_matches_entry_code() {
        assert_eq!(size_of::<Context>(), 256);
        assert_eq!(align_of::<Context>(), 32);
        assert_eq!(offset_of!(Context, pc), 0x40);
        assert_eq!(offset_of!(Context, sr), 0x58);
        assert_eq!(offset_of!(Context, frbank), 0x60);
        assert_eq!(offset_of!(Context, fr), 0xa0);
        assert_eq!(offset_of!(Context, fpscr), 0xe0);
    }

    #[test]
    fn task_context() {
        let ctx = Context::for_task(0x8c01_0000, 0x8c20_0000, &[1, 2], 0x8c00_1234, TaskMode::Kernel);
        assert_eq!(ctx.pc, 0x8c01_0000);
        assert_eq!(ctx.pr, 0x8c00_1234);
        assert_eq!(ctx.r[15], 0x8c20_0000);
        assert_eq!(ctx.r[14], FRAME_END);
        assert_eq!(&ctx.r[4..8], &[1, 2, 0, 0]);
        assert_eq!(ctx.sr, SR_MD);
        assert_eq!(ctx.fpscr, FPSCR_DEFAULT);

        let user = Context::for_task(0, 0, &[], 0, TaskMode::User);
        assert_eq!(user.sr, 0);
    }
}
