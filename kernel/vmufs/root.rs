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

//! The root block at the top of the card.

use super::timestamp::{Timestamp, TIMESTAMP_SIZE};
use super::BLOCK_SIZE;
use core::ops::Range;
use utils::le;

pub const ROOT_BLOCK: u16 = 255;
pub const MAGIC: u8 = 0x55;
pub const MAGIC_SIZE: usize = 16;
pub const LABEL_SIZE: usize = 32;

const LABEL: usize = 0x10;
const TIMESTAMP: usize = 0x30;
const TOTAL_BLOCKS: usize = 0x40;
const PARTITION: usize = 0x42;
const ROOT_LOC: usize = 0x44;
const FAT_LOC: usize = 0x46;
const FAT_SIZE: usize = 0x48;
const DIR_LOC: usize = 0x4a;
const DIR_SIZE: usize = 0x4c;
const ICON_SHAPE: usize = 0x4e;
const USER_SIZE: usize = 0x50;
const USER_LOC: usize = 0x52;
const HIDDEN_LOC: usize = 0x54;
const HIDDEN_SIZE: usize = 0x56;

/// Where things live on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    pub total_blocks: u16,
    pub partition: u16,
    pub root_loc: u16,
    pub fat_loc: u16,
    pub fat_size: u16,
    pub dir_loc: u16,
    pub dir_size: u16,
    pub icon_shape: u16,
    pub user_loc: u16,
    pub user_size: u16,
    pub hidden_loc: u16,
    pub hidden_size: u16,
}

impl MediaInfo {
    /// Layout of a standard 128 KiB card.
    pub const STANDARD: Self = Self {
        total_blocks: 256,
        partition: 0,
        root_loc: ROOT_BLOCK,
        fat_loc: 254,
        fat_size: 1,
        dir_loc: 253,
        dir_size: 13,
        icon_shape: 0,
        user_loc: 0,
        user_size: 200,
        hidden_loc: 0,
        hidden_size: 0,
    };

    /// Blocks files may be allocated from. An explicit user region wins,
    /// then whatever lies below the hidden region, then everything below
    /// the directory.
    pub fn user_region(&self) -> Range<u16> {
        if self.user_size != 0 {
            return self.user_loc..self.user_loc.saturating_add(self.user_size);
        }
        if self.hidden_size != 0 {
            return 0..self.hidden_loc.saturating_sub(self.hidden_size);
        }

        0..self.dir_loc.saturating_sub(self.dir_size)
    }

    /// Directory blocks, top first.
    pub fn dir_blocks(&self) -> impl Iterator<Item = u16> {
        let dir_loc = self.dir_loc;
        (0..self.dir_size).map(move |i| dir_loc - i)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    pub label: [u8; LABEL_SIZE],
    pub formatted: Timestamp,
    pub media: MediaInfo,
}

impl Root {
    /// `None` unless the block carries the format signature.
    pub fn parse(block: &[u8; BLOCK_SIZE]) -> Option<Self> {
        if block[..MAGIC_SIZE].iter().any(|b| *b != MAGIC) {
            return None;
        }

        let mut label = [0; LABEL_SIZE];
        label.copy_from_slice(&block[LABEL..LABEL + LABEL_SIZE]);
        let mut stamp = [0; TIMESTAMP_SIZE];
        stamp.copy_from_slice(&block[TIMESTAMP..TIMESTAMP + TIMESTAMP_SIZE]);
        let field = |offset| le::read_u16(block, offset);

        let media = MediaInfo {
            total_blocks: field(TOTAL_BLOCKS),
            partition: field(PARTITION),
            root_loc: field(ROOT_LOC),
            fat_loc: field(FAT_LOC),
            fat_size: field(FAT_SIZE),
            dir_loc: field(DIR_LOC),
            dir_size: field(DIR_SIZE),
            icon_shape: field(ICON_SHAPE),
            user_size: field(USER_SIZE),
            user_loc: field(USER_LOC),
            hidden_loc: field(HIDDEN_LOC),
            hidden_size: field(HIDDEN_SIZE),
        };
        // A directory reaching below block 0 cannot be walked.
        if media.dir_size > media.dir_loc.saturating_add(1) {
            return None;
        }

        Some(Self {
            label,
            formatted: Timestamp::from_bytes(&stamp),
            media,
        })
    }

    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0; BLOCK_SIZE];
        block[..MAGIC_SIZE].fill(MAGIC);
        block[LABEL..LABEL + LABEL_SIZE].copy_from_slice(&self.label);
        block[TIMESTAMP..TIMESTAMP + TIMESTAMP_SIZE].copy_from_slice(&self.formatted.to_bytes());

        let media = &self.media;
        for (offset, value) in [
            (TOTAL_BLOCKS, media.total_blocks),
            (PARTITION, media.partition),
            (ROOT_LOC, media.root_loc),
            (FAT_LOC, media.fat_loc),
            (FAT_SIZE, media.fat_size),
            (DIR_LOC, media.dir_loc),
            (DIR_SIZE, media.dir_size),
            (ICON_SHAPE, media.icon_shape),
            (USER_SIZE, media.user_size),
            (USER_LOC, media.user_loc),
            (HIDDEN_LOC, media.hidden_loc),
            (HIDDEN_SIZE, media.hidden_size),
        ] {
            le::write_u16(&mut block, offset, value);
        }

        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_region_choices() {
        let mut media = MediaInfo::STANDARD;
        assert_eq!(media.user_region(), 0..200);

        media.user_size = 0;
        assert_eq!(media.user_region(), 0..240);

        media.hidden_loc = 240;
        media.hidden_size = 41;
        assert_eq!(media.user_region(), 0..199);
    }

    #[test]
    fn directory_walks_down() {
        let blocks: Vec<u16> = MediaInfo::STANDARD.dir_blocks().collect();
        assert_eq!(blocks.len(), 13);
        assert_eq!(blocks[0], 253);
        assert_eq!(blocks[12], 241);
    }

    #[test]
    fn block_layout() {
        let mut label = [0; LABEL_SIZE];
        label[..4].copy_from_slice(b"SAVE");
        let root = Root {
            label,
            formatted: Timestamp::Y2K,
            media: MediaInfo::STANDARD,
        };

        let block = root.to_block();
        assert!(block[..16].iter().all(|b| *b == 0x55));
        assert_eq!(&block[0x10..0x14], b"SAVE");
        assert_eq!(block[0x30], 0x20);
        assert_eq!(le::read_u16(&block, 0x46), 254);
        assert_eq!(le::read_u16(&block, 0x4a), 253);
        assert_eq!(le::read_u16(&block, 0x4c), 13);
        assert_eq!(le::read_u16(&block, 0x50), 200);
        assert_eq!(Root::parse(&block), Some(root));
    }

    #[test]
    fn blank_block_is_unformatted() {
        assert_eq!(Root::parse(&[0; BLOCK_SIZE]), None);
    }
}
