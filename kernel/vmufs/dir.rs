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

//! Directory entries and the in-memory directory.

use super::error::VmuError;
use super::timestamp::{Timestamp, TIMESTAMP_SIZE};
use super::BLOCK_SIZE;
use alloc::vec::Vec;
use core::fmt;
use utils::le;

pub const ENTRY_SIZE: usize = 32;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / ENTRY_SIZE;
pub const NAME_SIZE: usize = 12;

const TYPE: usize = 0x00;
const COPY_PROTECT: usize = 0x01;
const FIRST_BLOCK: usize = 0x02;
const NAME: usize = 0x04;
const TIMESTAMP: usize = 0x10;
const SIZE: usize = 0x18;
const HEADER_OFFSET: usize = 0x1a;
const DIRTY: usize = 0x1c;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    None,
    Data,
    Game,
}

impl FileType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x33 => Self::Data,
            0xcc => Self::Game,
            _ => Self::None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Data => 0x33,
            Self::Game => 0xcc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyProtect {
    Copyable,
    Protected,
}

impl CopyProtect {
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            Self::Copyable
        } else {
            Self::Protected
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::Copyable => 0x00,
            Self::Protected => 0xff,
        }
    }
}

/// Up to twelve bytes, zero padded on the card.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FileName([u8; NAME_SIZE]);

impl FileName {
    pub fn new(name: &str) -> Result<Self, VmuError> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_SIZE || bytes.contains(&0) {
            return Err(VmuError::InvalidName);
        }

        let mut raw = [0; NAME_SIZE];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    pub fn from_raw(raw: [u8; NAME_SIZE]) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &[u8; NAME_SIZE] {
        &self.0
    }

    /// Name without padding.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|b| *b == 0).unwrap_or(NAME_SIZE);
        &self.0[..len]
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{}", char::from(*byte))?;
        }
        Ok(())
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub file_type: FileType,
    pub copy_protect: CopyProtect,
    pub first_block: u16,
    pub name: FileName,
    pub timestamp: Timestamp,
    /// Length in blocks.
    pub size_blocks: u16,
    /// Blocks between the start of the file and its header.
    pub header_offset: u16,
    dirty: bool,
}

impl DirEntry {
    pub const EMPTY: Self = Self {
        file_type: FileType::None,
        copy_protect: CopyProtect::Copyable,
        first_block: 0,
        name: FileName([0; NAME_SIZE]),
        timestamp: Timestamp {
            century: 0,
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
            second: 0,
            weekday: 0,
        },
        size_blocks: 0,
        header_offset: 0,
        dirty: false,
    };

    pub fn new(name: FileName, file_type: FileType, size_blocks: u16, timestamp: Timestamp) -> Self {
        Self {
            file_type,
            name,
            timestamp,
            size_blocks,
            header_offset: if file_type == FileType::Game { 1 } else { 0 },
            ..Self::EMPTY
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file_type == FileType::None
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn size_bytes(&self) -> usize {
        usize::from(self.size_blocks) * BLOCK_SIZE
    }

    pub fn parse(raw: &[u8]) -> Self {
        let mut name = [0; NAME_SIZE];
        name.copy_from_slice(&raw[NAME..NAME + NAME_SIZE]);
        let mut stamp = [0; TIMESTAMP_SIZE];
        stamp.copy_from_slice(&raw[TIMESTAMP..TIMESTAMP + TIMESTAMP_SIZE]);

        Self {
            file_type: FileType::from_raw(raw[TYPE]),
            copy_protect: CopyProtect::from_raw(raw[COPY_PROTECT]),
            first_block: le::read_u16(raw, FIRST_BLOCK),
            name: FileName(name),
            timestamp: Timestamp::from_bytes(&stamp),
            size_blocks: le::read_u16(raw, SIZE),
            header_offset: le::read_u16(raw, HEADER_OFFSET),
            dirty: false,
        }
    }

    /// On-card form. The dirty flag never reaches the card.
    pub fn write_to(&self, raw: &mut [u8]) {
        raw[..ENTRY_SIZE].fill(0);
        if self.is_empty() {
            return;
        }

        raw[TYPE] = self.file_type.raw();
        raw[COPY_PROTECT] = self.copy_protect.raw();
        le::write_u16(raw, FIRST_BLOCK, self.first_block);
        raw[NAME..NAME + NAME_SIZE].copy_from_slice(&self.name.0);
        raw[TIMESTAMP..TIMESTAMP + TIMESTAMP_SIZE].copy_from_slice(&self.timestamp.to_bytes());
        le::write_u16(raw, SIZE, self.size_blocks);
        le::write_u16(raw, HEADER_OFFSET, self.header_offset);
        raw[DIRTY] = 0;
    }
}

/// Every entry of every directory block, block order top first.
pub struct Directory {
    entries: Vec<DirEntry>,
}

impl Directory {
    pub fn with_blocks(blocks: usize) -> Result<Self, VmuError> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(blocks * ENTRIES_PER_BLOCK)
            .map_err(|_| VmuError::OutOfMemory)?;
        entries.resize(blocks * ENTRIES_PER_BLOCK, DirEntry::EMPTY);

        Ok(Self { entries })
    }

    pub fn blocks(&self) -> usize {
        self.entries.len() / ENTRIES_PER_BLOCK
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn live(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| !e.is_empty())
    }

    pub(crate) fn load_block(&mut self, index: usize, block: &[u8; BLOCK_SIZE]) {
        let entries = &mut self.entries[index * ENTRIES_PER_BLOCK..(index + 1) * ENTRIES_PER_BLOCK];
        for (entry, raw) in entries.iter_mut().zip(block.chunks_exact(ENTRY_SIZE)) {
            *entry = DirEntry::parse(raw);
        }
    }

    /// The block's on-card bytes if any of its entries changed. Clears the
    /// dirty flags.
    pub(crate) fn take_dirty_block(&mut self, index: usize) -> Option<[u8; BLOCK_SIZE]> {
        let entries = &mut self.entries[index * ENTRIES_PER_BLOCK..(index + 1) * ENTRIES_PER_BLOCK];
        if !entries.iter().any(|e| e.dirty) {
            return None;
        }

        let mut block = [0; BLOCK_SIZE];
        for (entry, raw) in entries.iter_mut().zip(block.chunks_exact_mut(ENTRY_SIZE)) {
            entry.dirty = false;
            entry.write_to(raw);
        }
        Some(block)
    }

    pub fn find(&self, name: &FileName) -> Option<usize> {
        self.entries.iter().position(|e| !e.is_empty() && e.name == *name)
    }

    pub fn get(&self, index: usize) -> Option<&DirEntry> {
        self.entries.get(index)
    }

    /// Stores `entry` in the first empty slot.
    pub fn add(&mut self, entry: DirEntry) -> Result<usize, VmuError> {
        let index = self
            .entries
            .iter()
            .position(DirEntry::is_empty)
            .ok_or(VmuError::DirectoryFull)?;
        self.entries[index] = DirEntry { dirty: true, ..entry };

        Ok(index)
    }

    pub fn remove(&mut self, index: usize) {
        self.entries[index] = DirEntry {
            dirty: true,
            ..DirEntry::EMPTY
        };
    }

    /// Moves every live entry down to the lowest free slot before it,
    /// keeping their order.
    pub fn compact(&mut self) {
        let mut free = 0;
        for i in 0..self.entries.len() {
            if self.entries[i].is_empty() {
                continue;
            }
            if i != free {
                self.entries[free] = self.entries[i];
                self.entries[i] = DirEntry::EMPTY;
            }
            free += 1;
        }
    }

    pub fn into_live(mut self) -> Vec<DirEntry> {
        self.compact();
        let live = self.live().count();
        self.entries.truncate(live);
        self.entries.shrink_to_fit();
        self.entries
    }
}
