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

//! Frame pointer stack walking.
//!
//! Every frame saves the caller's frame pointer and return address at the
//! bottom of its frame: the return address at `fp`, the previous frame
//! pointer at `fp + 4`. A frame pointer of [`FRAME_END`] ends the chain.

use crate::kutils::{RAM_END, RAM_START};
use core::fmt;
use core::ops::Range;

pub const FRAME_END: u32 = 0xffff_ffff;
/// Stops walks over corrupted, cyclic chains.
pub const MAX_FRAMES: usize = 64;

/// Addresses a frame pointer may point into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamWindow(Range<u32>);

impl RamWindow {
    pub const DEFAULT: RamWindow = RamWindow(RAM_START as u32..RAM_END as u32);

    pub const fn new(range: Range<u32>) -> Self {
        Self(range)
    }

    pub fn range(&self) -> Range<u32> {
        self.0.clone()
    }

    /// Whether a whole frame record at `fp` can be read.
    pub fn holds_frame(&self, fp: u32) -> bool {
        fp % 4 == 0 && fp >= self.0.start && fp.checked_add(8).is_some_and(|end| end <= self.0.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktraceItem {
    Link(u32),
    InvalidFramePointer(u32),
}

pub struct StackTrace<R> {
    fp: u32,
    window: RamWindow,
    read: R,
    frames: usize,
    done: bool,
}

impl<R: Fn(u32) -> u32> StackTrace<R> {
    /// Walks from `fp`, reading words through `read`. `read` is only ever
    /// handed addresses inside `window`.
    pub fn new(fp: u32, window: RamWindow, read: R) -> Self {
        Self {
            fp,
            window,
            read,
            frames: 0,
            done: false,
        }
    }
}

impl<R: Fn(u32) -> u32> Iterator for StackTrace<R> {
    type Item = BacktraceItem;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.fp == FRAME_END || self.frames >= MAX_FRAMES {
            return None;
        }

        if !self.window.holds_frame(self.fp) {
            self.done = true;
            return Some(BacktraceItem::InvalidFramePointer(self.fp));
        }

        let link = (self.read)(self.fp);
        self.fp = (self.read)(self.fp + 4);
        self.frames += 1;

        Some(BacktraceItem::Link(link))
    }
}

/// Printable trace, one line per frame.
pub struct Backtrace<R>(pub StackTrace<R>);

impl<R: Fn(u32) -> u32> fmt::Display for Backtrace<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Backtrace:")?;
        let walk = StackTrace::new(self.0.fp, self.0.window.clone(), &self.0.read);
        for (i, item) in walk.enumerate() {
            match item {
                BacktraceItem::Link(addr) => writeln!(f, "  {:>2}. {:08x}", i + 1, addr)?,
                BacktraceItem::InvalidFramePointer(fp) => writeln!(
                    f,
                    "  {:>2}. ERROR! Encountered invalid frame pointer ({:08x}) during backtrace",
                    i + 1,
                    fp
                )?,
            }
        }

        Ok(())
    }
}
