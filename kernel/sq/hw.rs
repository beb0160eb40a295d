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

use super::{Backend, StoreQueues, QACR0, QACR1, SQ_BASE, SQ_BLOCK, SQ_WORDS};
use crate::arch::cpu::Cpu;
use crate::arch::mmio;

/// The CPU's store queues.
pub struct Sh4Queues;

pub static STORE_QUEUES: StoreQueues<Sh4Queues> = StoreQueues::new(Sh4Queues);

impl Backend for Sh4Queues {
    fn set_area(&mut self, qacr0: u32, qacr1: u32) {
        unsafe {
            mmio::write32(QACR0, qacr0);
            mmio::write32(QACR1, qacr1);
        }
    }

    fn stage(&mut self, sq_addr: usize, block: &[u32; SQ_WORDS]) {
        for (i, word) in block.iter().enumerate() {
            unsafe { mmio::write32(sq_addr + i * 4, *word) };
        }
    }

    fn flush(&mut self, sq_addr: usize) {
        Cpu::prefetch(sq_addr);
    }

    fn drain(&mut self) {
        // A store to a queue stalls until that queue's previous burst is
        // out, so one dummy write per queue waits for both.
        unsafe {
            mmio::write32(SQ_BASE, 0);
            mmio::write32(SQ_BASE + SQ_BLOCK, 0);
        }
    }
}
