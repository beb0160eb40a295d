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

//! An open card: the module lock plus the root block.
//!
//! Everything that touches the FAT or the directory goes through a
//! [`Session`], so it can only run while the lock is held.

use super::dir::{DirEntry, Directory, FileType};
use super::error::{Stage, VmuError};
use super::fat::{Fat, LAST_IN_FILE, UNALLOCATED};
use super::root::{Root, ROOT_BLOCK};
use super::{BlockDevice, BLOCK_SIZE, LOCK};
use alloc::vec::Vec;
use core::ops::Range;
use spin::MutexGuard;

pub struct Session<'d> {
    dev: &'d dyn BlockDevice,
    root: Root,
    _lock: MutexGuard<'static, ()>,
}

impl<'d> Session<'d> {
    /// Checks the device, takes the lock and reads the root block.
    pub fn open(dev: &'d dyn BlockDevice) -> Result<Self, VmuError> {
        if !dev.is_memcard() {
            return Err(VmuError::NotMemcard);
        }
        let lock = LOCK.lock();

        let mut block = [0; BLOCK_SIZE];
        dev.read_block(ROOT_BLOCK, &mut block)
            .map_err(|e| VmuError::Io(Stage::RootRead, e))?;
        let root = Root::parse(&block).ok_or(VmuError::Unformatted)?;

        Ok(Self {
            dev,
            root,
            _lock: lock,
        })
    }

    /// Takes the lock without reading anything, for formatting.
    pub(crate) fn open_blank(dev: &'d dyn BlockDevice, root: Root) -> Result<Self, VmuError> {
        if !dev.is_memcard() {
            return Err(VmuError::NotMemcard);
        }

        Ok(Self {
            dev,
            root,
            _lock: LOCK.lock(),
        })
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn user_region(&self) -> Range<u16> {
        self.root.media.user_region()
    }

    fn read(&self, block: u16, stage: Stage) -> Result<[u8; BLOCK_SIZE], VmuError> {
        let mut buf = [0; BLOCK_SIZE];
        self.dev.read_block(block, &mut buf).map_err(|e| VmuError::Io(stage, e))?;
        Ok(buf)
    }

    fn write(&self, block: u16, buf: &[u8; BLOCK_SIZE], stage: Stage) -> Result<(), VmuError> {
        self.dev.write_block(block, buf).map_err(|e| VmuError::Io(stage, e))
    }

    pub fn write_root(&self) -> Result<(), VmuError> {
        self.write(self.root.media.root_loc, &self.root.to_block(), Stage::RootWrite)
    }

    pub fn read_fat(&self) -> Result<Fat, VmuError> {
        if self.root.media.fat_size > 1 {
            return Err(VmuError::UnsupportedFat);
        }
        Ok(Fat::parse(&self.read(self.root.media.fat_loc, Stage::FatRead)?))
    }

    pub fn write_fat(&self, fat: &Fat) -> Result<(), VmuError> {
        self.write(self.root.media.fat_loc, &fat.to_block(), Stage::FatWrite)
    }

    pub fn read_dir(&self) -> Result<Directory, VmuError> {
        let mut dir = Directory::with_blocks(usize::from(self.root.media.dir_size))?;
        for (index, block) in self.root.media.dir_blocks().enumerate() {
            dir.load_block(index, &self.read(block, Stage::DirRead)?);
        }
        Ok(dir)
    }

    /// Writes back the directory blocks holding changed entries.
    pub fn write_dir(&self, dir: &mut Directory) -> Result<(), VmuError> {
        for (index, block) in self.root.media.dir_blocks().enumerate() {
            if let Some(buf) = dir.take_dirty_block(index) {
                self.write(block, &buf, Stage::DirWrite)?;
            }
        }
        Ok(())
    }

    pub fn free_blocks(&self, fat: &Fat) -> usize {
        fat.free_in(self.user_region())
    }

    /// Follows the entry's chain, reading every block.
    pub fn read_file(&self, fat: &Fat, entry: &DirEntry) -> Result<Vec<u8>, VmuError> {
        let mut data = Vec::new();
        data.try_reserve_exact(entry.size_bytes())
            .map_err(|_| VmuError::OutOfMemory)?;

        let region = self.user_region();
        let mut block = entry.first_block;
        if entry.size_blocks > 0 && !region.contains(&block) {
            return Err(VmuError::BrokenChain);
        }
        for step in 0..entry.size_blocks {
            data.extend_from_slice(&self.read(block, Stage::DataRead)?);

            let next = fat.get(block).ok_or(VmuError::TruncatedChain)?;
            let last = step + 1 == entry.size_blocks;
            if last {
                if next != LAST_IN_FILE {
                    return Err(VmuError::FatOverrun);
                }
            } else if next == UNALLOCATED || next == LAST_IN_FILE {
                return Err(VmuError::TruncatedChain);
            } else if !region.contains(&next) {
                return Err(VmuError::BrokenChain);
            }
            block = next;
        }

        Ok(data)
    }

    /// Allocates and writes `data` and records it in `dir`. Only the data
    /// blocks reach the card; the caller flushes the FAT and directory.
    /// On failure before the data is written, `fat` and `dir` are left
    /// as they were.
    pub fn write_file(&self, fat: &mut Fat, dir: &mut Directory, entry: DirEntry, data: &[u8]) -> Result<(), VmuError> {
        if dir.find(&entry.name).is_some() {
            return Err(VmuError::AlreadyExists);
        }
        if entry.file_type == FileType::None {
            return Err(VmuError::InvalidFileType);
        }

        let blocks = data.len().div_ceil(BLOCK_SIZE).max(1);
        if blocks > self.free_blocks(fat) {
            return Err(VmuError::OutOfSpace);
        }
        if dir.live().count() == dir.entries().len() {
            return Err(VmuError::DirectoryFull);
        }

        let region = self.user_region();
        let mut chain = Vec::new();
        chain.try_reserve_exact(blocks).map_err(|_| VmuError::OutOfMemory)?;

        let mut scratch = fat.clone();
        let mut current = scratch
            .allocate(entry.file_type, region.clone())
            .ok_or(VmuError::OutOfSpace)?;
        chain.push(current);
        for _ in 1..blocks {
            // A chain cut short here stays a valid, shorter file.
            scratch.set(current, LAST_IN_FILE);
            let next = scratch
                .allocate(entry.file_type, region.clone())
                .ok_or(VmuError::OutOfSpace)?;
            scratch.set(current, next);
            current = next;
            chain.push(current);
        }
        scratch.set(current, LAST_IN_FILE);

        let mut buf = [0; BLOCK_SIZE];
        for (block, chunk) in chain.iter().zip(data.chunks(BLOCK_SIZE).chain(core::iter::once(&[][..]))) {
            buf.fill(0);
            buf[..chunk.len()].copy_from_slice(chunk);
            self.write(*block, &buf, Stage::DataWrite)?;
        }

        let mut entry = entry;
        entry.first_block = chain[0];
        entry.size_blocks = blocks as u16;
        dir.add(entry)?;
        *fat = scratch;

        Ok(())
    }

    /// Frees the chain of the entry at `index` and clears the entry. The
    /// caller flushes the FAT, then the directory.
    pub fn delete_file(&self, fat: &mut Fat, dir: &mut Directory, index: usize) -> Result<(), VmuError> {
        let entry = *dir.get(index).ok_or(VmuError::NotFound)?;
        let region = self.user_region();

        let mut scratch = fat.clone();
        let mut block = entry.first_block;
        for _ in 0..entry.size_blocks {
            if !region.contains(&block) {
                return Err(VmuError::BrokenChain);
            }
            let next = scratch.get(block).ok_or(VmuError::BrokenChain)?;
            if next == UNALLOCATED {
                return Err(VmuError::BrokenChain);
            }
            scratch.set(block, UNALLOCATED);
            if next == LAST_IN_FILE {
                break;
            }
            block = next;
        }

        *fat = scratch;
        dir.remove(index);
        Ok(())
    }
}
