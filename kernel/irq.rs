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

//! Exception and interrupt dispatch.
//!
//! The low level entry code saves the interrupted registers into the
//! context pointed to by [`irq_srt_addr`] and calls
//! [`irq_handle_exception`] with the vector class it came in through.
//! From there the [`Dispatcher`] reads the event code and runs the global
//! handler, the handler registered for that code, and when nothing
//! accepted the event the [`Irq::UNHANDLED_EXC`] handler. An event that
//! arrives while another one is being handled only ever reaches the
//! [`Irq::DOUBLE_FAULT`] handler.

pub mod backtrace;
pub mod codes;
pub mod context;
pub mod defaults;
pub mod dispatcher;
mod dump;

pub use self::backtrace::RamWindow;
pub use self::codes::{EntryClass, Irq};
pub use self::context::{Context, TaskMode};
pub use self::dispatcher::{Dispatcher, IrqHandler, TrapHandler};

use crate::arch::intc::CPU_EVENTS;
use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};
use utils::RacyCell;

/// Where event codes are read from.
pub trait EventSource: Sync {
    /// EXPEVT
    fn exception_event(&self) -> u32;
    /// INTEVT
    fn interrupt_event(&self) -> u32;
    /// TRA, the `trapa` immediate shifted left by two.
    fn trap_code(&self) -> u32;
}

pub trait TimerUnit: Sync {
    fn clear_underflow(&self, channel: usize);
    /// Starts periodic underflow interrupts at `hz`.
    fn start(&self, channel: usize, hz: u32);
    fn stop(&self, channel: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqError {
    /// Not a multiple of 16 or past the end of the table.
    InvalidCode(Irq),
}

impl IrqError {
    pub fn code(&self) -> i32 {
        match self {
            IrqError::InvalidCode(_) => -1,
        }
    }
}

impl fmt::Display for IrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrqError::InvalidCode(irq) => write!(f, "no handler slot for event code {:#06x}", irq.code()),
        }
    }
}

pub static DISPATCHER: Dispatcher = Dispatcher::new();

static DEFAULT_CONTEXT: RacyCell<Context> = RacyCell::new(Context::zeroed());

/// Register save area used by the next exception entry.
#[no_mangle]
#[allow(non_upper_case_globals)]
pub static irq_srt_addr: AtomicPtr<Context> = AtomicPtr::new(ptr::null_mut());

/// Non-zero while the entry code is inside [`irq_handle_exception`].
#[no_mangle]
#[allow(non_upper_case_globals)]
pub static irq_inside_int: AtomicU32 = AtomicU32::new(0);

pub fn init(timer: &'static dyn TimerUnit, window: RamWindow) -> Result<(), IrqError> {
    verify_called_once!();

    irq_srt_addr.store(DEFAULT_CONTEXT.get(), Ordering::Release);
    DISPATCHER.set_ram_window(window);
    DISPATCHER.install_defaults(timer, &CPU_EVENTS)?;
    info!("irq: dispatcher ready, context save area at {:p}", DEFAULT_CONTEXT.get());

    Ok(())
}

/// Points the entry code at a different register save area, typically the
/// context of the task about to run.
///
/// # Safety
///
/// `context` must stay valid until it is replaced again.
pub unsafe fn set_context(context: *mut Context) {
    irq_srt_addr.store(context, Ordering::Release);
}

pub fn context() -> *mut Context {
    irq_srt_addr.load(Ordering::Acquire)
}

pub fn set_handler(code: Irq, handler: Option<&'static dyn IrqHandler>) -> Result<(), IrqError> {
    DISPATCHER.set_handler(code, handler)
}

pub fn handler(code: Irq) -> Option<&'static dyn IrqHandler> {
    DISPATCHER.handler(code)
}

pub fn set_global_handler(handler: Option<&'static dyn IrqHandler>) {
    DISPATCHER.set_global_handler(handler)
}

pub fn global_handler() -> Option<&'static dyn IrqHandler> {
    DISPATCHER.global_handler()
}

pub fn set_trap_handler(vector: u8, handler: Option<&'static dyn TrapHandler>) {
    DISPATCHER.set_trap_handler(vector, handler)
}

pub fn trap_handler(vector: u8) -> Option<&'static dyn TrapHandler> {
    DISPATCHER.trap_handler(vector)
}

pub fn accept() {
    DISPATCHER.accept()
}

pub fn reject() {
    DISPATCHER.reject()
}

pub fn inside_interrupt() -> bool {
    DISPATCHER.inside_interrupt()
}

pub fn interrupt_depth() -> usize {
    DISPATCHER.interrupt_depth()
}

pub fn active_event(depth: usize) -> Option<Irq> {
    DISPATCHER.active_event(depth)
}

pub fn event_handled(depth: usize) -> Option<bool> {
    DISPATCHER.event_handled(depth)
}

/// Called by the entry code with interrupts blocked.
#[no_mangle]
pub extern "C" fn irq_handle_exception(class: u32) {
    // SAFETY: the entry code has just filled the current save area, and
    // nothing else touches it until we return.
    let Some(context) = (unsafe { irq_srt_addr.load(Ordering::Acquire).as_mut() }) else {
        panic!("exception (vector class {}) taken before irq::init", class);
    };

    irq_inside_int.fetch_add(1, Ordering::AcqRel);
    DISPATCHER.dispatch(class, &CPU_EVENTS, context);
    irq_inside_int.fetch_sub(1, Ordering::AcqRel);
}
