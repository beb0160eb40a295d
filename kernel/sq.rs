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

//! Store queue burst transfers.
//!
//! The SH-4 has two 32-byte store queues mapped at [`SQ_BASE`]. Writing
//! eight words to a queue and then issuing a prefetch on its address
//! bursts the whole block to memory. Bit 5 of the queue address selects
//! the queue and bits 25..5 the destination offset; the top destination
//! bits come from the QACR registers of the queue being flushed.
//!
//! All transfers go through a [`Burst`] taken with [`StoreQueues::lock`],
//! so one burst owns both queues and the QACR pair for its whole duration.

pub mod hw;
#[cfg(test)]
pub mod sim;

use spin::{Mutex, MutexGuard};

pub const SQ_BASE: usize = 0xe000_0000;
/// Destination bits carried by the queue address itself.
pub const SQ_ADDR_MASK: usize = 0x03ff_ffe0;
pub const QACR0: usize = 0xff00_0038;
pub const QACR1: usize = 0xff00_003c;
/// Bytes moved by one queue flush.
pub const SQ_BLOCK: usize = 32;
const SQ_WORDS: usize = SQ_BLOCK / 4;

/// The queue address that writes through to `dest`.
pub const fn staging_address(dest: usize) -> usize {
    SQ_BASE | (dest & SQ_ADDR_MASK)
}

/// QACR value selecting the 64 MiB area that contains `dest`.
pub const fn area_bits(dest: usize) -> u32 {
    (((dest >> 26) << 2) & 0x1c) as u32
}

/// Low level queue operations, either real registers or a simulation.
pub trait Backend {
    /// Programs QACR0 and QACR1.
    fn set_area(&mut self, qacr0: u32, qacr1: u32);

    /// Fills the queue selected by `sq_addr` with one block.
    fn stage(&mut self, sq_addr: usize, block: &[u32; SQ_WORDS]);

    /// Starts the burst of the queue selected by `sq_addr`.
    fn flush(&mut self, sq_addr: usize);

    /// Waits for both queues to finish writing.
    fn drain(&mut self);
}

pub struct StoreQueues<B> {
    backend: Mutex<B>,
}

impl<B: Backend> StoreQueues<B> {
    pub const fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Takes exclusive use of the queues. Other callers spin until the
    /// returned burst is dropped.
    pub fn lock(&self) -> Burst<'_, B> {
        Burst {
            backend: self.backend.lock(),
        }
    }
}

pub struct Burst<'a, B: Backend> {
    backend: MutexGuard<'a, B>,
}

impl<B: Backend> Burst<'_, B> {
    fn begin(&mut self, dest: usize, len: usize) -> usize {
        debug_assert!(dest % SQ_BLOCK == 0, "store queue destination {:#x} is not 32-byte aligned", dest);
        debug_assert!(len % SQ_BLOCK == 0, "store queue length {} is not a multiple of 32", len);

        let area = area_bits(dest);
        self.backend.set_area(area, area);

        staging_address(dest)
    }

    fn fill(&mut self, dest: usize, pattern: u32, len: usize) {
        let block = [pattern; SQ_WORDS];
        let mut sq = self.begin(dest, len);
        for _ in 0..len / SQ_BLOCK {
            self.backend.stage(sq, &block);
            self.backend.flush(sq);
            sq += SQ_BLOCK;
        }
        self.backend.drain();
    }

    /// Zeroes `len` bytes at `dest`.
    pub fn clear(&mut self, dest: usize, len: usize) {
        self.fill(dest, 0, len);
    }

    /// Copies `src` to `dest` one queue at a time.
    pub fn copy(&mut self, dest: usize, src: &[u32]) {
        let mut sq = self.begin(dest, src.len() * 4);
        let mut block = [0u32; SQ_WORDS];
        for chunk in src.chunks_exact(SQ_WORDS) {
            block.copy_from_slice(chunk);
            self.backend.stage(sq, &block);
            self.backend.flush(sq);
            sq += SQ_BLOCK;
        }
        self.backend.drain();
    }

    /// Like [`Burst::copy`], but stages both queues before flushing them.
    /// The destination must be 64-byte aligned and `src` a whole number of
    /// 64-byte blocks.
    pub fn copy64(&mut self, dest: usize, src: &[u32]) {
        debug_assert!(dest % (2 * SQ_BLOCK) == 0, "copy64 destination {:#x} is not 64-byte aligned", dest);
        debug_assert!(src.len() % (2 * SQ_WORDS) == 0, "copy64 length is not a multiple of 64");

        let mut sq = self.begin(dest, src.len() * 4);
        let mut first = [0u32; SQ_WORDS];
        let mut second = [0u32; SQ_WORDS];
        for chunk in src.chunks_exact(2 * SQ_WORDS) {
            first.copy_from_slice(&chunk[..SQ_WORDS]);
            second.copy_from_slice(&chunk[SQ_WORDS..]);
            self.backend.stage(sq, &first);
            self.backend.stage(sq + SQ_BLOCK, &second);
            self.backend.flush(sq);
            self.backend.flush(sq + SQ_BLOCK);
            sq += 2 * SQ_BLOCK;
        }
        self.backend.drain();
    }

    pub fn set8(&mut self, dest: usize, value: u8, len: usize) {
        self.fill(dest, u32::from_ne_bytes([value; 4]), len);
    }

    pub fn set16(&mut self, dest: usize, value: u16, len: usize) {
        let value = u32::from(value);
        self.fill(dest, value | (value << 16), len);
    }

    pub fn set32(&mut self, dest: usize, value: u32, len: usize) {
        self.fill(dest, value, len);
    }
}

#[cfg(test)]
mod tests {
    use super::sim::SimQueues;
    use super::*;
    use proptest::prelude::*;

    fn queues() -> StoreQueues<SimQueues> {
        StoreQueues::new(SimQueues::new())
    }

    #[test]
    fn address_translation() {
        assert_eq!(staging_address(0x0c01_0020), 0xe001_0020);
        assert_eq!(staging_address(0x1000_0040), 0xe000_0040);
        assert_eq!(area_bits(0x0c00_0000), 0x0c);
        assert_eq!(area_bits(0x1000_0000), 0x10);
        assert_eq!(area_bits(0xa500_0000), 0x04);
    }

    #[test]
    fn copy_lands_at_destination_in_block_order() {
        let sq = queues();
        let src: Vec<u32> = (0..24).collect();
        sq.lock().copy(0x1000_0000, &src);

        let sim = sq.backend.lock();
        assert_eq!(sim.read(0x1000_0000, 24), src);
        assert_eq!(sim.flushes, [0x1000_0000, 0x1000_0020, 0x1000_0040]);
        assert_eq!(sim.drains, 1);
    }

    #[test]
    fn copy64_stages_pairs() {
        let sq = queues();
        let src: Vec<u32> = (100..132).collect();
        sq.lock().copy64(0x0c00_0040, &src);

        let sim = sq.backend.lock();
        assert_eq!(sim.read(0x0c00_0040, 32), src);
        assert_eq!(sim.flushes.len(), 4);
        assert_eq!(sim.drains, 1);
    }

    #[test]
    fn fills_replicate_the_pattern() {
        let sq = queues();
        sq.lock().set8(0x0c00_0000, 0xab, 32);
        sq.lock().set16(0x0c00_0020, 0x1234, 32);
        sq.lock().set32(0x0c00_0040, 0xdead_beef, 64);
        sq.lock().clear(0x0c00_0080, 32);

        let sim = sq.backend.lock();
        assert!(sim.read(0x0c00_0000, 8).iter().all(|&w| w == 0xabab_abab));
        assert!(sim.read(0x0c00_0020, 8).iter().all(|&w| w == 0x1234_1234));
        assert!(sim.read(0x0c00_0040, 16).iter().all(|&w| w == 0xdead_beef));
        assert!(sim.read(0x0c00_0080, 8).iter().all(|&w| w == 0));
        assert_eq!(sim.drains, 4);
    }

    #[test]
    fn empty_transfer_still_drains() {
        let sq = queues();
        sq.lock().copy(0x0c00_0000, &[]);
        let sim = sq.backend.lock();
        assert!(sim.flushes.is_empty());
        assert_eq!(sim.drains, 1);
    }

    proptest! {
        #[test]
        fn copy_matches_source(blocks in 0usize..16, offset in 0usize..0x1000, seed in any::<u32>()) {
            let dest = 0x0c00_0000 + offset * SQ_BLOCK;
            let src: Vec<u32> = (0..blocks * 8).map(|i| seed.wrapping_mul(i as u32 + 1)).collect();
            let sq = queues();
            sq.lock().copy(dest, &src);

            let sim = sq.backend.lock();
            prop_assert_eq!(sim.read(dest, src.len()), src);
            prop_assert_eq!(sim.flushes.len(), blocks);
        }
    }
}
