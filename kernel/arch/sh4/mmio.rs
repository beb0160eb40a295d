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

//! Volatile accessors for memory mapped registers.
//!
//! # Safety
//!
//! Every function here dereferences a raw address. Callers must pass the
//! address of a real register (or RAM) of the matching width.

use volatile::Volatile;

#[inline]
pub unsafe fn read32(addr: usize) -> u32 {
    Volatile::new(unsafe { &*(addr as *const u32) }).read()
}

#[inline]
pub unsafe fn write32(addr: usize, value: u32) {
    Volatile::new(unsafe { &mut *(addr as *mut u32) }).write(value)
}

#[inline]
pub unsafe fn read16(addr: usize) -> u16 {
    Volatile::new(unsafe { &*(addr as *const u16) }).read()
}

#[inline]
pub unsafe fn write16(addr: usize, value: u16) {
    Volatile::new(unsafe { &mut *(addr as *mut u16) }).write(value)
}

#[inline]
pub unsafe fn read8(addr: usize) -> u8 {
    Volatile::new(unsafe { &*(addr as *const u8) }).read()
}

#[inline]
pub unsafe fn write8(addr: usize, value: u8) {
    Volatile::new(unsafe { &mut *(addr as *mut u8) }).write(value)
}
