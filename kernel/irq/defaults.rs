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

//! Handlers installed by [`Dispatcher::install_defaults`].

use super::codes::Irq;
use super::context::Context;
use super::dispatcher::{Dispatcher, IrqHandler};
use super::{EventSource, IrqError, TimerUnit};
use alloc::boxed::Box;

/// Acknowledges a timer underflow so it does not fire again immediately.
pub struct TimerUnderflow {
    timer: &'static dyn TimerUnit,
    channel: usize,
}

impl IrqHandler for TimerUnderflow {
    fn handle(&self, irq: &Dispatcher, _source: Irq, _context: &mut Context) {
        self.timer.clear_underflow(self.channel);
        irq.accept();
    }
}

/// FPU disabled: skip the faulting instruction.
pub struct FpuDisabled;

impl IrqHandler for FpuDisabled {
    fn handle(&self, irq: &Dispatcher, _source: Irq, context: &mut Context) {
        context.pc = context.pc.wrapping_add(2);
        irq.accept();
    }
}

/// Routes `trapa #imm` to the trap table; unknown vectors are rejected.
pub struct TrapDispatch {
    events: &'static dyn EventSource,
}

impl TrapDispatch {
    pub fn vector(tra: u32) -> u8 {
        ((tra >> 2) & 0xff) as u8
    }
}

impl IrqHandler for TrapDispatch {
    fn handle(&self, irq: &Dispatcher, _source: Irq, context: &mut Context) {
        let vector = Self::vector(self.events.trap_code());
        match irq.trap_handler(vector) {
            Some(handler) => handler.handle(irq, vector, context),
            None => irq.reject(),
        }
    }
}

static FPU_DISABLED: FpuDisabled = FpuDisabled;

impl Dispatcher {
    pub fn install_defaults(
        &self,
        timer: &'static dyn TimerUnit,
        events: &'static dyn EventSource,
    ) -> Result<(), IrqError> {
        for (channel, code) in [Irq::TMU0, Irq::TMU1, Irq::TMU2].into_iter().enumerate() {
            let handler: &'static TimerUnderflow = Box::leak(Box::new(TimerUnderflow { timer, channel }));
            self.set_handler(code, Some(handler))?;
        }

        self.set_handler(Irq::GENERAL_FPU, Some(&FPU_DISABLED))?;
        self.set_handler(Irq::SLOT_FPU, Some(&FPU_DISABLED))?;

        let trap: &'static TrapDispatch = Box::leak(Box::new(TrapDispatch { events }));
        self.set_handler(Irq::TRAPA, Some(trap))
    }
}
