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

use super::backtrace::RamWindow;
use super::codes::{EntryClass, Irq, TABLE_SIZE};
use super::context::Context;
use super::{dump, EventSource, IrqError};
use alloc::boxed::Box;
use core::cell::Cell;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use spin::Mutex;

pub const TRAP_COUNT: usize = 256;

pub trait IrqHandler: Sync {
    fn handle(&self, irq: &Dispatcher, source: Irq, context: &mut Context);
}

impl<F> IrqHandler for F
where
    F: Fn(&Dispatcher, Irq, &mut Context) + Sync,
{
    fn handle(&self, irq: &Dispatcher, source: Irq, context: &mut Context) {
        self(irq, source, context)
    }
}

/// Handler for one `trapa #imm` vector.
pub trait TrapHandler: Sync {
    fn handle(&self, irq: &Dispatcher, vector: u8, context: &mut Context);
}

impl<F> TrapHandler for F
where
    F: Fn(&Dispatcher, u8, &mut Context) + Sync,
{
    fn handle(&self, irq: &Dispatcher, vector: u8, context: &mut Context) {
        self(irq, vector, context)
    }
}

/// One handler slot. The dispatch path reads it with a single atomic load,
/// so an exception taken while task code is registering never waits.
struct Slot<H: ?Sized + 'static> {
    installed: AtomicPtr<&'static H>,
}

impl<H: ?Sized + 'static> Slot<H> {
    const EMPTY: Self = Self {
        installed: AtomicPtr::new(ptr::null_mut()),
    };

    fn get(&self) -> Option<&'static H> {
        let installed = self.installed.load(Ordering::Acquire);
        // SAFETY: non-null pointers come from `set` and are never freed.
        unsafe { installed.as_ref().copied() }
    }

    fn set(&self, handler: Option<&'static H>) {
        let installed = match handler {
            Some(handler) => Box::into_raw(Box::new(handler)),
            None => ptr::null_mut(),
        };
        // The replaced record is leaked: an exception may still be reading it.
        self.installed.store(installed, Ordering::Release);
    }
}

/// State of one event being dispatched. Lives on the dispatching stack and
/// is linked to the event it interrupted.
struct EventFrame {
    class: u32,
    source: Irq,
    handled: Cell<bool>,
    outer: *const EventFrame,
}

/// Puts the interrupted event back on top even if a handler unwinds.
struct FrameGuard<'a> {
    innermost: &'a AtomicPtr<EventFrame>,
    outer: *mut EventFrame,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.innermost.store(self.outer, Ordering::Release);
    }
}

pub struct Dispatcher {
    global: Slot<dyn IrqHandler>,
    specific: [Slot<dyn IrqHandler>; TABLE_SIZE],
    traps: [Slot<dyn TrapHandler>; TRAP_COUNT],
    innermost: AtomicPtr<EventFrame>,
    ram_window: Mutex<RamWindow>,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self {
            global: Slot::EMPTY,
            specific: [Slot::EMPTY; TABLE_SIZE],
            traps: [Slot::EMPTY; TRAP_COUNT],
            innermost: AtomicPtr::new(ptr::null_mut()),
            ram_window: Mutex::new(RamWindow::DEFAULT),
        }
    }

    /// Installs (or with `None` removes) the handler for `code`.
    pub fn set_handler(&self, code: Irq, handler: Option<&'static dyn IrqHandler>) -> Result<(), IrqError> {
        let index = code.table_index().ok_or(IrqError::InvalidCode(code))?;
        self.specific[index].set(handler);

        Ok(())
    }

    pub fn handler(&self, code: Irq) -> Option<&'static dyn IrqHandler> {
        let index = code.table_index()?;
        self.specific[index].get()
    }

    /// The global handler sees every event before the specific one.
    pub fn set_global_handler(&self, handler: Option<&'static dyn IrqHandler>) {
        self.global.set(handler);
    }

    pub fn global_handler(&self) -> Option<&'static dyn IrqHandler> {
        self.global.get()
    }

    pub fn set_trap_handler(&self, vector: u8, handler: Option<&'static dyn TrapHandler>) {
        self.traps[usize::from(vector)].set(handler);
    }

    pub fn trap_handler(&self, vector: u8) -> Option<&'static dyn TrapHandler> {
        self.traps[usize::from(vector)].get()
    }

    pub fn set_ram_window(&self, window: RamWindow) {
        *self.ram_window.lock() = window;
    }

    pub fn ram_window(&self) -> RamWindow {
        self.ram_window.lock().clone()
    }

    /// Marks the innermost event as handled.
    pub fn accept(&self) {
        self.set_handled(true);
    }

    /// Marks the innermost event as not handled, so the fallback chain runs.
    pub fn reject(&self) {
        self.set_handled(false);
    }

    fn set_handled(&self, handled: bool) {
        let frame = self.frames().next();
        let frame = frame.unwrap_or_else(|| panic!("event accepted or rejected outside of a handler"));
        frame.handled.set(handled);
    }

    pub fn inside_interrupt(&self) -> bool {
        !self.innermost.load(Ordering::Acquire).is_null()
    }

    /// Number of events being handled; above one means a double fault.
    pub fn interrupt_depth(&self) -> usize {
        self.frames().count()
    }

    /// Event at `depth`, counted outwards from the innermost (0).
    pub fn active_event(&self, depth: usize) -> Option<Irq> {
        self.frames().nth(depth).map(|frame| frame.source)
    }

    pub fn event_handled(&self, depth: usize) -> Option<bool> {
        self.frames().nth(depth).map(|frame| frame.handled.get())
    }

    fn frames(&self) -> impl Iterator<Item = &EventFrame> + '_ {
        let mut next = self.innermost.load(Ordering::Acquire) as *const EventFrame;
        core::iter::from_fn(move || {
            // Frames are linked only while their dispatch call is running.
            let frame = unsafe { next.as_ref()? };
            next = frame.outer;
            Some(frame)
        })
    }

    /// Handles one exception entry. `class` says which vector was taken;
    /// the event code is read from `events` accordingly.
    pub fn dispatch(&self, class: u32, events: &dyn EventSource, context: &mut Context) {
        let source = match EntryClass::from_raw(class) {
            Some(EntryClass::Exception) | Some(EntryClass::TlbMiss) => Irq::from_event(events.exception_event()),
            Some(EntryClass::Interrupt) => Irq::from_event(events.interrupt_event()),
            Some(EntryClass::Reset) | None => {
                dump::dump_context(class, None, context, self.ram_window());
                panic!("spurious exception entry through vector class {}", class);
            }
        };

        let outer = self.innermost.load(Ordering::Acquire);
        let frame = EventFrame {
            class,
            source,
            handled: Cell::new(false),
            outer,
        };
        self.innermost
            .store(&frame as *const EventFrame as *mut EventFrame, Ordering::Release);
        let _guard = FrameGuard {
            innermost: &self.innermost,
            outer,
        };

        if outer.is_null() {
            self.run_chain(&frame, context);
        } else {
            self.double_fault(&frame, context);
        }
    }

    fn run_chain(&self, frame: &EventFrame, context: &mut Context) {
        if let Some(global) = self.global_handler() {
            global.handle(self, frame.source, context);
        }

        if let Some(handler) = self.handler(frame.source) {
            // Handlers that do nothing special have handled the event.
            frame.handled.set(true);
            handler.handle(self, frame.source, context);
        }

        if !frame.handled.get() {
            if let Some(fallback) = self.handler(Irq::UNHANDLED_EXC) {
                fallback.handle(self, frame.source, context);
            }
        }

        if !frame.handled.get() {
            self.fatal(frame, context);
        }
    }

    fn double_fault(&self, frame: &EventFrame, context: &mut Context) {
        if let Some(handler) = self.handler(Irq::DOUBLE_FAULT) {
            handler.handle(self, frame.source, context);
        }

        if !frame.handled.get() {
            self.fatal(frame, context);
        }
    }

    fn fatal(&self, frame: &EventFrame, context: &Context) -> ! {
        dump::dump_context(frame.class, Some(frame.source), context, self.ram_window());

        // SAFETY: the outer frame belongs to a dispatch call further up this stack.
        match unsafe { frame.outer.as_ref() } {
            Some(outer) => panic!("double fault: event {} while handling {}", frame.source, outer.source),
            None => panic!("unhandled exception: event {}", frame.source),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub struct Events {
        pub expevt: u32,
        pub intevt: u32,
        pub tra: u32,
    }

    impl EventSource for Events {
        fn exception_event(&self) -> u32 {
            self.expevt
        }

        fn interrupt_event(&self) -> u32 {
            self.intevt
        }

        fn trap_code(&self) -> u32 {
            self.tra
        }
    }

    fn interrupt(code: Irq) -> Events {
        Events {
            expevt: 0,
            intevt: u32::from(code.code()),
            tra: 0,
        }
    }

    fn exception(code: Irq) -> Events {
        Events {
            expevt: u32::from(code.code()),
            intevt: 0,
            tra: 0,
        }
    }

    fn leak<H: IrqHandler + 'static>(handler: H) -> &'static dyn IrqHandler {
        Box::leak(Box::new(handler))
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn set_handler_validates_code() {
        let irq = Dispatcher::new();
        let h = leak(|_: &Dispatcher, _: Irq, _: &mut Context| {});
        assert_eq!(irq.set_handler(Irq::new(0x0408), Some(h)), Err(IrqError::InvalidCode(Irq::new(0x0408))));
        assert_eq!(irq.set_handler(Irq::new(0x1000), Some(h)), Err(IrqError::InvalidCode(Irq::new(0x1000))));
        assert!(irq.set_handler(Irq::TMU2, Some(h)).is_ok());
        assert!(irq.handler(Irq::TMU2).is_some());
        irq.set_handler(Irq::TMU2, None).unwrap();
        assert!(irq.handler(Irq::TMU2).is_none());
    }

    #[test]
    fn global_runs_before_specific_and_sees_the_code() {
        let irq = Dispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let seen = order.clone();
        irq.set_global_handler(Some(leak(move |_: &Dispatcher, code: Irq, _: &mut Context| {
            seen.lock().push(("global", code));
        })));
        let seen = order.clone();
        irq.set_handler(
            Irq::TMU0,
            Some(leak(move |_: &Dispatcher, code: Irq, _: &mut Context| {
                seen.lock().push(("tmu0", code));
            })),
        )
        .unwrap();

        let mut ctx = Context::zeroed();
        irq.dispatch(3, &interrupt(Irq::TMU0), &mut ctx);

        assert_eq!(*order.lock(), [("global", Irq::TMU0), ("tmu0", Irq::TMU0)]);
        assert!(!irq.inside_interrupt());
    }

    #[test]
    fn exception_classes_read_expevt() {
        let irq = Dispatcher::new();
        let hits = counter();
        let h = hits.clone();
        irq.set_handler(
            Irq::ILLEGAL_INSTR,
            Some(leak(move |irq: &Dispatcher, _: Irq, ctx: &mut Context| {
                assert_eq!(irq.active_event(0), Some(Irq::ILLEGAL_INSTR));
                assert_eq!(irq.interrupt_depth(), 1);
                ctx.pc += 2;
                h.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        let mut ctx = Context::zeroed();
        irq.dispatch(1, &exception(Irq::ILLEGAL_INSTR), &mut ctx);
        irq.dispatch(2, &exception(Irq::ILLEGAL_INSTR), &mut ctx);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.pc, 4);
    }

    #[test]
    fn rejected_event_falls_back_to_unhandled_handler() {
        let irq = Dispatcher::new();
        let fallback = counter();
        irq.set_handler(
            Irq::TRAPA,
            Some(leak(|irq: &Dispatcher, _: Irq, _: &mut Context| irq.reject())),
        )
        .unwrap();
        let f = fallback.clone();
        irq.set_handler(
            Irq::UNHANDLED_EXC,
            Some(leak(move |irq: &Dispatcher, code: Irq, _: &mut Context| {
                assert_eq!(code, Irq::TRAPA);
                f.fetch_add(1, Ordering::SeqCst);
                irq.accept();
            })),
        )
        .unwrap();

        irq.dispatch(1, &exception(Irq::TRAPA), &mut Context::zeroed());
        assert_eq!(fallback.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accepted_or_silent_handlers_skip_the_fallback() {
        let irq = Dispatcher::new();
        let fallback = counter();
        let f = fallback.clone();
        irq.set_handler(
            Irq::UNHANDLED_EXC,
            Some(leak(move |irq: &Dispatcher, _: Irq, _: &mut Context| {
                f.fetch_add(1, Ordering::SeqCst);
                irq.accept();
            })),
        )
        .unwrap();
        irq.set_handler(
            Irq::TRAPA,
            Some(leak(|irq: &Dispatcher, _: Irq, _: &mut Context| irq.accept())),
        )
        .unwrap();
        irq.set_handler(Irq::TMU1, Some(leak(|_: &Dispatcher, _: Irq, _: &mut Context| {})))
            .unwrap();

        irq.dispatch(1, &exception(Irq::TRAPA), &mut Context::zeroed());
        irq.dispatch(3, &interrupt(Irq::TMU1), &mut Context::zeroed());
        assert_eq!(fallback.load(Ordering::SeqCst), 0);

        // No specific handler at all: the fallback is the only one left.
        irq.dispatch(3, &interrupt(Irq::TMU2), &mut Context::zeroed());
        assert_eq!(fallback.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_can_be_swapped_from_inside_dispatch() {
        static SECOND: AtomicUsize = AtomicUsize::new(0);
        fn second(irq: &Dispatcher, _: Irq, _: &mut Context) {
            SECOND.fetch_add(1, Ordering::SeqCst);
            irq.accept();
        }

        let irq = Dispatcher::new();
        irq.set_handler(
            Irq::TMU0,
            Some(leak(|irq: &Dispatcher, code: Irq, _: &mut Context| {
                irq.set_handler(code, Some(leak(second))).unwrap();
                assert!(irq.handler(code).is_some());
                assert!(irq.global_handler().is_none());
            })),
        )
        .unwrap();

        irq.dispatch(3, &interrupt(Irq::TMU0), &mut Context::zeroed());
        assert_eq!(SECOND.load(Ordering::SeqCst), 0);
        irq.dispatch(3, &interrupt(Irq::TMU0), &mut Context::zeroed());
        assert_eq!(SECOND.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "unhandled exception: event 0x0180")]
    fn unhandled_exception_panics() {
        let irq = Dispatcher::new();
        irq.dispatch(1, &exception(Irq::ILLEGAL_INSTR), &mut Context::zeroed());
    }

    #[test]
    #[should_panic(expected = "spurious exception entry")]
    fn reset_class_is_fatal() {
        let irq = Dispatcher::new();
        irq.dispatch(0, &exception(Irq::RESET_POWERON), &mut Context::zeroed());
    }

    #[test]
    fn nested_event_goes_to_double_fault_handler_only() {
        let irq = Dispatcher::new();
        let double_faults = counter();
        let tmu1 = counter();

        let d = double_faults.clone();
        irq.set_handler(
            Irq::DOUBLE_FAULT,
            Some(leak(move |irq: &Dispatcher, code: Irq, _: &mut Context| {
                assert_eq!(code, Irq::TMU1);
                assert_eq!(irq.interrupt_depth(), 2);
                assert_eq!(irq.active_event(1), Some(Irq::TMU0));
                d.fetch_add(1, Ordering::SeqCst);
                irq.accept();
            })),
        )
        .unwrap();
        let t = tmu1.clone();
        irq.set_handler(
            Irq::TMU1,
            Some(leak(move |_: &Dispatcher, _: Irq, _: &mut Context| {
                t.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
        irq.set_handler(
            Irq::TMU0,
            Some(leak(|irq: &Dispatcher, _: Irq, ctx: &mut Context| {
                irq.dispatch(3, &interrupt(Irq::TMU1), ctx);
                // Back in the outer event, still handled.
                assert_eq!(irq.interrupt_depth(), 1);
                assert_eq!(irq.event_handled(0), Some(true));
            })),
        )
        .unwrap();

        irq.dispatch(3, &interrupt(Irq::TMU0), &mut Context::zeroed());
        assert_eq!(double_faults.load(Ordering::SeqCst), 1);
        assert_eq!(tmu1.load(Ordering::SeqCst), 0);
        assert!(!irq.inside_interrupt());
    }

    #[test]
    #[should_panic(expected = "double fault: event 0x0420 (TMU1 underflow) while handling 0x0400 (TMU0 underflow)")]
    fn unaccepted_double_fault_panics_with_both_codes() {
        let irq = Dispatcher::new();
        irq.set_handler(
            Irq::DOUBLE_FAULT,
            Some(leak(|_: &Dispatcher, _: Irq, _: &mut Context| {})),
        )
        .unwrap();
        irq.set_handler(
            Irq::TMU0,
            Some(leak(|irq: &Dispatcher, _: Irq, ctx: &mut Context| {
                irq.dispatch(3, &interrupt(Irq::TMU1), ctx);
            })),
        )
        .unwrap();

        irq.dispatch(3, &interrupt(Irq::TMU0), &mut Context::zeroed());
    }

    #[test]
    fn trap_table() {
        let irq = Dispatcher::new();
        let trap: &'static dyn TrapHandler = Box::leak(Box::new(|_: &Dispatcher, vector: u8, ctx: &mut Context| {
            ctx.r[0] = u32::from(vector);
        }));
        irq.set_trap_handler(0x20, Some(trap));
        assert!(irq.trap_handler(0x20).is_some());
        assert!(irq.trap_handler(0x21).is_none());
        irq.set_trap_handler(0x20, None);
        assert!(irq.trap_handler(0x20).is_none());
    }

    #[test]
    #[should_panic(expected = "outside of a handler")]
    fn accept_outside_handler_is_a_bug() {
        Dispatcher::new().accept();
    }
}
