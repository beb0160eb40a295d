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

use crate::maple::error::BusError;
use core::fmt;

/// Block transfer failures from a [`super::BlockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// No memory card at that address.
    NoDevice,
    /// The device frame stayed locked by someone else.
    Busy,
    /// The frame was reset under us.
    Lost,
    /// The card answered with this response code.
    Rejected(u8),
    Timeout,
    ShortReply,
    OutOfRange,
    Bus(BusError),
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevice => write!(f, "no memory card"),
            Self::Busy => write!(f, "device busy"),
            Self::Lost => write!(f, "request lost"),
            Self::Rejected(code) => write!(f, "rejected with response {}", *code as i8),
            Self::Timeout => write!(f, "timed out"),
            Self::ShortReply => write!(f, "short reply"),
            Self::OutOfRange => write!(f, "block out of range"),
            Self::Bus(e) => write!(f, "bus error: {}", e),
        }
    }
}

impl From<BusError> for BlockError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

/// Which part of a card operation an I/O error hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RootRead,
    RootWrite,
    FatRead,
    FatWrite,
    DirRead,
    DirWrite,
    DataRead,
    DataWrite,
}

impl Stage {
    fn code(self) -> i32 {
        match self {
            Self::RootRead => -10,
            Self::RootWrite => -11,
            Self::FatRead => -12,
            Self::FatWrite => -13,
            Self::DirRead => -14,
            Self::DirWrite => -15,
            Self::DataRead => -16,
            Self::DataWrite => -17,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RootRead => "reading root block",
            Self::RootWrite => "writing root block",
            Self::FatRead => "reading FAT",
            Self::FatWrite => "writing FAT",
            Self::DirRead => "reading directory",
            Self::DirWrite => "writing directory",
            Self::DataRead => "reading file data",
            Self::DataWrite => "writing file data",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmuError {
    NotFound,
    AlreadyExists,
    /// The chain ended before the directory's block count.
    TruncatedChain,
    /// The chain kept going after the directory's block count.
    FatOverrun,
    /// A chain being freed pointed at a free or impossible block.
    BrokenChain,
    NotMemcard,
    Unformatted,
    UnsupportedFat,
    InvalidName,
    InvalidFileType,
    OutOfSpace,
    DirectoryFull,
    OutOfMemory,
    Io(Stage, BlockError),
}

impl VmuError {
    /// Small negative code for C callers.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound => -1,
            Self::AlreadyExists | Self::TruncatedChain => -2,
            Self::FatOverrun | Self::BrokenChain => -3,
            Self::NotMemcard => -4,
            Self::Unformatted | Self::UnsupportedFat => -5,
            Self::InvalidName | Self::InvalidFileType => -6,
            Self::OutOfSpace => -7,
            Self::DirectoryFull => -8,
            Self::OutOfMemory => -9,
            Self::Io(stage, _) => stage.code(),
        }
    }
}

impl fmt::Display for VmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::AlreadyExists => write!(f, "file already exists"),
            Self::TruncatedChain => write!(f, "file truncated in FAT"),
            Self::FatOverrun => write!(f, "FAT overruns directory"),
            Self::BrokenChain => write!(f, "broken FAT chain"),
            Self::NotMemcard => write!(f, "not a memory card"),
            Self::Unformatted => write!(f, "card is not formatted"),
            Self::UnsupportedFat => write!(f, "FAT larger than one block"),
            Self::InvalidName => write!(f, "invalid file name"),
            Self::InvalidFileType => write!(f, "invalid file type"),
            Self::OutOfSpace => write!(f, "out of space"),
            Self::DirectoryFull => write!(f, "directory full"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Io(stage, e) => write!(f, "I/O error {}: {}", stage, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_per_stage() {
        let stages = [
            Stage::RootRead,
            Stage::RootWrite,
            Stage::FatRead,
            Stage::FatWrite,
            Stage::DirRead,
            Stage::DirWrite,
            Stage::DataRead,
            Stage::DataWrite,
        ];
        let mut codes: Vec<i32> = stages
            .iter()
            .map(|s| VmuError::Io(*s, BlockError::Timeout).code())
            .collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), stages.len());
        assert_eq!(VmuError::NotFound.code(), -1);
        assert_eq!(VmuError::AlreadyExists.code(), -2);
        assert_eq!(VmuError::OutOfSpace.code(), -7);
    }

    #[test]
    fn io_errors_name_the_stage() {
        let e = VmuError::Io(Stage::FatRead, BlockError::Timeout);
        assert_eq!(format!("{}", e), "I/O error reading FAT: timed out");
    }
}
