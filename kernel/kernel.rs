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

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
mod logging;
#[macro_use]
mod kutils;

pub mod arch;
pub mod dbg;
mod ds;
pub mod irq;
pub mod maple;
#[cfg(not(test))]
mod panicking;
pub mod sq;
pub mod vmufs;

use core::fmt;
use core::ops::Range;
use irq::{IrqError, RamWindow};
use maple::{BusError, RegisterError};

#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: linked_list_allocator::LockedHeap = linked_list_allocator::LockedHeap::empty();

#[allow(unused)]
static NAME: &str = "dckernel";

/// Boot-time knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Maple bus ticks per second.
    pub poll_hz: u32,
    /// Where backtraces may look for stack frames.
    pub ram_window: RamWindow,
    /// Heap extent. `None` takes everything from the end of the image up to
    /// the kernel stack.
    pub heap: Option<Range<usize>>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            poll_hz: maple::DEFAULT_POLL_HZ,
            ram_window: RamWindow::DEFAULT,
            heap: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    Irq(IrqError),
    Bus(BusError),
    Driver(RegisterError),
}

impl From<IrqError> for InitError {
    fn from(e: IrqError) -> Self {
        Self::Irq(e)
    }
}

impl From<BusError> for InitError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<RegisterError> for InitError {
    fn from(e: RegisterError) -> Self {
        Self::Driver(e)
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Irq(e) => write!(f, "irq: {}", e),
            InitError::Bus(e) => write!(f, "maple: {}", e),
            InitError::Driver(e) => write!(f, "maple driver: {}", e),
        }
    }
}

#[cfg(all(feature = "hw", not(test)))]
extern "C" {
    /// End of the loaded image, from the linker script.
    static _end: u8;
}

/// Brings the kernel up: console, heap, exception dispatch, the maple bus
/// and its drivers. Interrupts are enabled on success.
#[cfg(all(feature = "hw", not(test)))]
pub fn kernel_init(config: KernelConfig) -> Result<(), InitError> {
    use arch::cpu::Cpu;
    use arch::tmu::TMU;
    use logging::console;
    use maple::dma::MAPLE_DMA;

    verify_called_once!();

    unsafe { console::init(console::BAUD_RATE) };

    let heap = config.heap.clone().unwrap_or_else(|| {
        let start = unsafe { core::ptr::addr_of!(_end) as usize };
        start..kutils::RAM_END - kutils::KERNEL_STACK_SIZE
    });
    unsafe { ALLOCATOR.lock().init(heap.start as *mut u8, heap.end - heap.start) };
    info!("{}: heap {:#x}..{:#x}", NAME, heap.start, heap.end);

    irq::init(&TMU, config.ram_window.clone())?;
    vmufs::set_time_source(Some(arch::rtc::unix_time));

    unsafe { MAPLE_DMA.init() };
    let bus = maple::init(&MAPLE_DMA)?;
    maple::dma::enable_completion_irq()?;
    maple::register_default_drivers(bus)?;
    bus.scan_all();
    maple::start_polling(&TMU, config.poll_hz)?;

    Cpu::enable_interrupts();
    info!("Welcome to {}!", NAME);

    Ok(())
}

/// C entry point, called by the startup code with the default config.
#[cfg(all(feature = "hw", not(test)))]
#[no_mangle]
pub extern "C" fn arch_main() -> i32 {
    match kernel_init(KernelConfig::default()) {
        Ok(()) => 0,
        Err(e) => {
            error!("init failed: {}", e);
            -1
        }
    }
}
