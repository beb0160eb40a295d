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

use core::cell::UnsafeCell;

/// Interior-mutable cell that is `Sync` without any locking.
///
/// # Why
/// Some statics are shared with hardware or with assembly rather than with
/// other Rust threads: the register save area the exception trampoline writes
/// into, or a DMA descriptor list the bus controller reads. Those need a stable
/// address and raw mutable access, which `static mut` would give only with
/// warnings on every use.
///
/// # SAFETY:
/// Every access through [`RacyCell::get`] must be serialized by the caller,
/// usually by masking interrupts or by owning the device that touches the
/// memory.
#[repr(transparent)]
pub struct RacyCell<T> {
    inner: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for RacyCell<T> {}

impl<T> RacyCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: UnsafeCell::new(value),
        }
    }

    /// Raw pointer to the contents. Stable for the lifetime of the cell.
    pub const fn get(&self) -> *mut T {
        self.inner.get()
    }

    /// # SAFETY:
    /// No other reference to the contents may be live.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut(&self) -> &mut T {
        unsafe { &mut *self.inner.get() }
    }

    /// # SAFETY:
    /// No mutable reference to the contents may be live.
    pub unsafe fn as_ref(&self) -> &T {
        unsafe { &*self.inner.get() }
    }
}
