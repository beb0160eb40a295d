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

//! Filesystem of the VMU memory card.
//!
//! Stateless: every call opens the card, reads what it needs, writes back
//! what changed and lets go. One lock covers all cards.

pub mod dir;
pub mod error;
pub mod fat;
#[cfg(test)]
pub mod ramcard;
pub mod root;
pub mod session;
pub mod timestamp;

pub use self::dir::{CopyProtect, DirEntry, FileName, FileType};
pub use self::error::{BlockError, Stage, VmuError};
pub use self::root::{MediaInfo, Root, LABEL_SIZE};
pub use self::session::Session;
pub use self::timestamp::Timestamp;

use self::fat::Fat;
use alloc::vec::Vec;
use bitflags::bitflags;
use spin::Mutex;

pub const BLOCK_SIZE: usize = 512;

/// Something that stores 512-byte blocks, normally a memory card on the
/// maple bus.
pub trait BlockDevice {
    /// Whether the device is present and really a memory card.
    fn is_memcard(&self) -> bool;
    fn read_block(&self, block: u16, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), BlockError>;
    fn write_block(&self, block: u16, buf: &[u8; BLOCK_SIZE]) -> Result<(), BlockError>;
}

bitflags! {
    pub struct WriteFlags: u32 {
        /// Replace an existing file of the same name.
        const OVERWRITE = 1 << 0;
        /// Store as a game, allocated from the bottom of the card.
        const GAME = 1 << 1;
        /// Mark the file copy protected.
        const NO_COPY = 1 << 2;
    }
}

pub(crate) static LOCK: Mutex<()> = Mutex::new(());

/// Seconds since the Unix epoch.
pub type TimeSource = fn() -> i64;

static TIME_SOURCE: Mutex<Option<TimeSource>> = Mutex::new(None);

/// Clock used to stamp new files and formats. Without one, files are
/// stamped 2000-01-01.
pub fn set_time_source(source: Option<TimeSource>) {
    *TIME_SOURCE.lock() = source;
}

fn now() -> Timestamp {
    let source = *TIME_SOURCE.lock();
    source
        .and_then(|source| Timestamp::from_unix(source()))
        .unwrap_or(Timestamp::Y2K)
}

fn report<T>(op: &str, name: &FileName, result: Result<T, VmuError>) -> Result<T, VmuError> {
    if let Err(e) = &result {
        match e {
            VmuError::TruncatedChain | VmuError::FatOverrun | VmuError::BrokenChain => {
                error!("vmufs: {} {}: card is corrupted: {}", op, name, e)
            }
            VmuError::Io(..) => warn!("vmufs: {} {}: {}", op, name, e),
            _ => {}
        }
    }
    result
}

/// Whole contents of `name`, padded to a multiple of the block size.
pub fn read(dev: &dyn BlockDevice, name: &str) -> Result<Vec<u8>, VmuError> {
    let name = FileName::new(name)?;
    let session = Session::open(dev)?;
    let dir = session.read_dir()?;
    let fat = session.read_fat()?;

    let entry = dir
        .find(&name)
        .and_then(|index| dir.get(index))
        .ok_or(VmuError::NotFound)?;
    report("reading", &name, session.read_file(&fat, entry))
}

/// Stores `data` as `name`. An empty file still takes one block.
pub fn write(dev: &dyn BlockDevice, name: &str, data: &[u8], flags: WriteFlags) -> Result<(), VmuError> {
    let name = FileName::new(name)?;
    let session = Session::open(dev)?;
    let mut dir = session.read_dir()?;
    let mut fat = session.read_fat()?;

    if let Some(index) = dir.find(&name) {
        if !flags.contains(WriteFlags::OVERWRITE) {
            return Err(VmuError::AlreadyExists);
        }
        report("replacing", &name, session.delete_file(&mut fat, &mut dir, index))?;
    }

    let file_type = if flags.contains(WriteFlags::GAME) {
        FileType::Game
    } else {
        FileType::Data
    };
    let mut entry = DirEntry::new(name, file_type, 0, now());
    if flags.contains(WriteFlags::NO_COPY) {
        entry.copy_protect = CopyProtect::Protected;
    }

    report("writing", &name, session.write_file(&mut fat, &mut dir, entry, data))?;
    session.write_fat(&fat)?;
    if let Err(e) = session.write_dir(&mut dir) {
        error!("vmufs: {}: card may be corrupted or leaking blocks ({})", name, e);
        return Err(e);
    }

    debug!("vmufs: wrote {} ({} bytes)", name, data.len());
    Ok(())
}

pub fn delete(dev: &dyn BlockDevice, name: &str) -> Result<(), VmuError> {
    let name = FileName::new(name)?;
    let session = Session::open(dev)?;
    let mut dir = session.read_dir()?;
    let mut fat = session.read_fat()?;

    let index = dir.find(&name).ok_or(VmuError::NotFound)?;
    report("deleting", &name, session.delete_file(&mut fat, &mut dir, index))?;
    session.write_fat(&fat)?;
    session.write_dir(&mut dir)
}

/// Every file on the card, in directory order.
pub fn readdir(dev: &dyn BlockDevice) -> Result<Vec<DirEntry>, VmuError> {
    let session = Session::open(dev)?;
    Ok(session.read_dir()?.into_live())
}

pub fn file_info(dev: &dyn BlockDevice, name: &str) -> Result<DirEntry, VmuError> {
    let name = FileName::new(name)?;
    let session = Session::open(dev)?;
    let dir = session.read_dir()?;

    dir.find(&name)
        .and_then(|index| dir.get(index))
        .copied()
        .ok_or(VmuError::NotFound)
}

/// Unallocated blocks in the user region.
pub fn free_blocks(dev: &dyn BlockDevice) -> Result<usize, VmuError> {
    let session = Session::open(dev)?;
    let fat = session.read_fat()?;
    Ok(session.free_blocks(&fat))
}

/// Lays down an empty filesystem with the standard layout. The label is
/// truncated to [`LABEL_SIZE`] bytes.
pub fn format(dev: &dyn BlockDevice, label: &[u8]) -> Result<(), VmuError> {
    let mut raw_label = [0; LABEL_SIZE];
    let len = label.len().min(LABEL_SIZE);
    raw_label[..len].copy_from_slice(&label[..len]);

    let media = MediaInfo::STANDARD;
    let root = Root {
        label: raw_label,
        formatted: now(),
        media,
    };
    let session = Session::open_blank(dev, root)?;

    let mut fat = Fat::empty();
    fat.chain([media.root_loc]);
    fat.chain([media.fat_loc]);
    fat.chain(media.dir_blocks());

    // Directory all written, not just the dirty blocks.
    let blank = [0; BLOCK_SIZE];
    for block in media.dir_blocks() {
        dev.write_block(block, &blank)
            .map_err(|e| VmuError::Io(Stage::DirWrite, e))?;
    }
    session.write_fat(&fat)?;
    // The signature goes last, so an interrupted format stays unformatted.
    session.write_root()?;

    info!("vmufs: formatted card, {} blocks free", session.free_blocks(&fat));
    Ok(())
}
