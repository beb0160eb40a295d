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

//! The file allocation table: one block of 16-bit cells, one per block.

use super::dir::FileType;
use super::BLOCK_SIZE;
use core::ops::Range;
use utils::le;

pub const FAT_CELLS: usize = BLOCK_SIZE / 2;

pub const UNALLOCATED: u16 = 0xfffc;
pub const LAST_IN_FILE: u16 = 0xfffa;
pub const DAMAGED: u16 = 0xffff;

#[derive(Clone, PartialEq, Eq)]
pub struct Fat {
    cells: [u16; FAT_CELLS],
}

impl Fat {
    pub fn parse(block: &[u8; BLOCK_SIZE]) -> Self {
        let mut cells = [0; FAT_CELLS];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = le::read_u16(block, i * 2);
        }
        Self { cells }
    }

    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0; BLOCK_SIZE];
        for (i, cell) in self.cells.iter().enumerate() {
            le::write_u16(&mut block, i * 2, *cell);
        }
        block
    }

    /// Everything free.
    pub fn empty() -> Self {
        Self {
            cells: [UNALLOCATED; FAT_CELLS],
        }
    }

    pub fn get(&self, block: u16) -> Option<u16> {
        self.cells.get(usize::from(block)).copied()
    }

    pub fn set(&mut self, block: u16, value: u16) {
        self.cells[usize::from(block)] = value;
    }

    /// Links `blocks` in order and ends the chain after the last one.
    pub fn chain(&mut self, blocks: impl IntoIterator<Item = u16>) {
        let mut previous: Option<u16> = None;
        for block in blocks {
            if let Some(previous) = previous {
                self.set(previous, block);
            }
            previous = Some(block);
        }
        if let Some(last) = previous {
            self.set(last, LAST_IN_FILE);
        }
    }

    pub fn free_in(&self, region: Range<u16>) -> usize {
        region.filter(|b| self.get(*b) == Some(UNALLOCATED)).count()
    }

    /// Next free block for a file of type `kind`: data files fill the region
    /// from the top, game files from the bottom.
    pub fn allocate(&self, kind: FileType, region: Range<u16>) -> Option<u16> {
        let free = |b: &u16| self.get(*b) == Some(UNALLOCATED);
        match kind {
            FileType::Data => region.rev().find(free),
            FileType::Game => region.into_iter().find(free),
            FileType::None => None,
        }
    }
}
