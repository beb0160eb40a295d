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

//! Memory card kept in RAM, with injectable failures.

use super::{format, BlockDevice, BlockError, BLOCK_SIZE};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct RamCard {
    blocks: Mutex<Vec<[u8; BLOCK_SIZE]>>,
    memcard: bool,
    fail_read: Mutex<Option<u16>>,
    fail_write: Mutex<Option<u16>>,
    writes: AtomicUsize,
}

impl RamCard {
    pub fn new(blocks: usize) -> Self {
        Self {
            blocks: Mutex::new(vec![[0; BLOCK_SIZE]; blocks]),
            memcard: true,
            fail_read: Mutex::new(None),
            fail_write: Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn formatted() -> Self {
        let card = Self::new(256);
        format(&card, b"TEST").unwrap();
        card
    }

    pub fn not_a_card() -> Self {
        Self {
            memcard: false,
            ..Self::new(256)
        }
    }

    pub fn block(&self, block: u16) -> [u8; BLOCK_SIZE] {
        self.blocks.lock().unwrap()[usize::from(block)]
    }

    pub fn set_block(&self, block: u16, data: &[u8; BLOCK_SIZE]) {
        self.blocks.lock().unwrap()[usize::from(block)] = *data;
    }

    pub fn fail_reads_from(&self, block: u16) {
        *self.fail_read.lock().unwrap() = Some(block);
    }

    pub fn fail_writes_to(&self, block: u16) {
        *self.fail_write.lock().unwrap() = Some(block);
    }

    /// Successful block writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl BlockDevice for RamCard {
    fn is_memcard(&self) -> bool {
        self.memcard
    }

    fn read_block(&self, block: u16, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        if *self.fail_read.lock().unwrap() == Some(block) {
            return Err(BlockError::Timeout);
        }
        let blocks = self.blocks.lock().unwrap();
        *buf = *blocks.get(usize::from(block)).ok_or(BlockError::OutOfRange)?;
        Ok(())
    }

    fn write_block(&self, block: u16, buf: &[u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        if *self.fail_write.lock().unwrap() == Some(block) {
            return Err(BlockError::Timeout);
        }
        let mut blocks = self.blocks.lock().unwrap();
        *blocks.get_mut(usize::from(block)).ok_or(BlockError::OutOfRange)? = *buf;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
