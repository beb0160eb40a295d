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

//! Store queues simulated against a sparse word map, decoding queue
//! addresses and QACR values the way the hardware does.

use super::{Backend, SQ_ADDR_MASK, SQ_BASE, SQ_BLOCK, SQ_WORDS};
use std::collections::BTreeMap;

pub struct SimQueues {
    qacr: [u32; 2],
    staged: [[u32; SQ_WORDS]; 2],
    memory: BTreeMap<usize, u32>,
    /// Physical destination of every flush, in order.
    pub flushes: Vec<usize>,
    pub drains: usize,
}

impl SimQueues {
    pub fn new() -> Self {
        Self {
            qacr: [0; 2],
            staged: [[0; SQ_WORDS]; 2],
            memory: BTreeMap::new(),
            flushes: Vec::new(),
            drains: 0,
        }
    }

    pub fn read(&self, phys: usize, words: usize) -> Vec<u32> {
        (0..words)
            .map(|i| self.memory.get(&(phys + i * 4)).copied().unwrap_or(0))
            .collect()
    }

    fn queue(sq_addr: usize) -> usize {
        assert_eq!(sq_addr & !0x03ff_ffff, SQ_BASE, "{:#x} is not a store queue address", sq_addr);
        (sq_addr >> 5) & 1
    }
}

impl Backend for SimQueues {
    fn set_area(&mut self, qacr0: u32, qacr1: u32) {
        self.qacr = [qacr0, qacr1];
    }

    fn stage(&mut self, sq_addr: usize, block: &[u32; SQ_WORDS]) {
        self.staged[Self::queue(sq_addr)] = *block;
    }

    fn flush(&mut self, sq_addr: usize) {
        let queue = Self::queue(sq_addr);
        let area = ((self.qacr[queue] >> 2) & 0x7) as usize;
        let phys = (area << 26) | (sq_addr & SQ_ADDR_MASK);
        for (i, word) in self.staged[queue].iter().enumerate() {
            self.memory.insert(phys + i * 4, *word);
        }
        self.flushes.push(phys);
        debug_assert_eq!(phys % SQ_BLOCK, 0);
    }

    fn drain(&mut self) {
        self.drains += 1;
    }
}
