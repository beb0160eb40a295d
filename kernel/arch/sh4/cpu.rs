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

use bit_field::BitField;

/// Interrupt mask level field of SR.
const SR_IMASK: core::ops::Range<usize> = 4..8;
/// Block bit; exceptions and interrupts are held while it is set.
pub const SR_BL: u32 = 1 << 28;
/// Privileged mode bit.
pub const SR_MD: u32 = 1 << 30;

/// Saved interrupt state returned by [`Cpu::disable_interrupts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct IrqState(u32);

pub struct Cpu;

impl Cpu {
    pub fn enable_interrupts() {
        let mut sr = sr::read();
        sr.set_bits(SR_IMASK, 0);
        sr::write(sr);
    }

    /// Masks every interrupt level and hands back the previous state.
    pub fn disable_interrupts() -> IrqState {
        let old = sr::read();
        let mut sr = old;
        sr.set_bits(SR_IMASK, 0xf);
        sr::write(sr);

        IrqState(old)
    }

    pub fn restore_interrupts(state: IrqState) {
        let mut sr = sr::read();
        sr.set_bits(SR_IMASK, state.0.get_bits(SR_IMASK));
        sr::write(sr);
    }

    pub fn interrupts_enabled() -> bool {
        sr::read().get_bits(SR_IMASK) != 0xf
    }

    pub fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let state = Self::disable_interrupts();
        let result = f();
        Self::restore_interrupts(state);

        result
    }

    /// Waits for the next interrupt. With every level masked nothing could
    /// wake a `sleep`, so the caller's poll loop just spins instead.
    pub fn idle() {
        if !Self::can_sleep() {
            core::hint::spin_loop();
            return;
        }

        #[cfg(feature = "hw")]
        unsafe {
            core::arch::asm!("sleep", options(nomem, nostack));
        }

        #[cfg(not(feature = "hw"))]
        core::hint::spin_loop();
    }

    fn can_sleep() -> bool {
        let sr = sr::read();
        sr.get_bits(SR_IMASK) != 0xf && sr & SR_BL == 0
    }

    /// Issues a cache-line prefetch, which on a store queue address
    /// starts the burst write of that queue.
    #[inline]
    pub fn prefetch(addr: usize) {
        #[cfg(feature = "hw")]
        unsafe {
            core::arch::asm!("pref @{}", in(reg) addr, options(nostack, preserves_flags));
        }

        #[cfg(not(feature = "hw"))]
        let _ = addr;
    }

    pub fn halt() -> ! {
        let _ = Self::disable_interrupts();
        loop {
            Self::idle();
        }
    }
}

#[cfg(feature = "hw")]
mod sr {
    use core::arch::asm;

    pub fn read() -> u32 {
        let sr: u32;
        unsafe {
            asm!("stc sr, {}", out(reg) sr, options(nomem, nostack, preserves_flags));
        }

        sr
    }

    pub fn write(sr: u32) {
        unsafe {
            asm!("ldc {}, sr", in(reg) sr, options(nostack));
        }
    }
}

// Host builds keep SR in memory so interrupt masking logic can be exercised
// without the hardware. Each test thread gets its own register.
#[cfg(all(not(feature = "hw"), not(test)))]
mod sr {
    use core::sync::atomic::{AtomicU32, Ordering};

    static SR: AtomicU32 = AtomicU32::new(super::SR_MD | 0xf0);

    pub fn read() -> u32 {
        SR.load(Ordering::Relaxed)
    }

    pub fn write(sr: u32) {
        SR.store(sr, Ordering::Relaxed)
    }
}

#[cfg(all(not(feature = "hw"), test))]
mod sr {
    use std::cell::Cell;

    std::thread_local! {
        static SR: Cell<u32> = const { Cell::new(super::SR_MD) };
    }

    pub fn read() -> u32 {
        SR.with(|sr| sr.get())
    }

    pub fn write(sr: u32) {
        SR.with(|cell| cell.set(sr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_and_restore_nest() {
        Cpu::enable_interrupts();
        assert!(Cpu::interrupts_enabled());

        let outer = Cpu::disable_interrupts();
        assert!(!Cpu::interrupts_enabled());
        let inner = Cpu::disable_interrupts();
        Cpu::restore_interrupts(inner);
        assert!(!Cpu::interrupts_enabled());
        Cpu::restore_interrupts(outer);
        assert!(Cpu::interrupts_enabled());
    }

    #[test]
    fn without_interrupts_returns_value_and_restores() {
        Cpu::enable_interrupts();
        let seen = Cpu::without_interrupts(|| Cpu::interrupts_enabled());
        assert!(!seen);
        assert!(Cpu::interrupts_enabled());
    }

    #[test]
    fn idle_never_sleeps_while_masked() {
        Cpu::enable_interrupts();
        assert!(Cpu::can_sleep());

        let state = Cpu::disable_interrupts();
        assert!(!Cpu::can_sleep());
        // Returns instead of waiting for an interrupt that cannot arrive.
        Cpu::idle();
        Cpu::restore_interrupts(state);
        assert!(Cpu::can_sleep());
    }
}
