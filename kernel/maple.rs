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

//! Maple, the serial bus controllers and memory cards hang off.
//!
//! Four ports with up to six units each. Every bus tick the registered
//! drivers queue their polls, the enumeration frame probes one more slot,
//! and whatever is queued goes out as one DMA transfer. Replies come back
//! through the completion interrupt and are handed to the frame callbacks.

pub mod bus;
pub mod device;
pub mod dma;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod frame;
pub mod proto;
#[cfg(test)]
pub mod sim;
pub mod transport;

pub use self::bus::{Maple, Notify};
pub use self::device::Device;
pub use self::driver::Driver;
pub use self::error::{BusError, RegisterError};
pub use self::frame::{Frame, FrameCallback, FrameState};
pub use self::proto::{Command, DeviceInfo, Functions, Response};
pub use self::transport::Transport;

use crate::arch::cpu::Cpu;
use crate::irq::{self, Context, Dispatcher, Irq, IrqError, IrqHandler, TimerUnit};
use conquer_once::spin::OnceCell;
use spin::Mutex;

/// Timer channel driving the bus tick.
pub const POLL_CHANNEL: usize = 1;
pub const DEFAULT_POLL_HZ: u32 = 100;

static MAPLE: OnceCell<Maple> = OnceCell::uninit();
static POLL_TIMER: Mutex<Option<&'static dyn TimerUnit>> = Mutex::new(None);

pub fn init(transport: &'static dyn Transport) -> Result<&'static Maple, BusError> {
    MAPLE
        .try_init_once(|| Maple::new(transport))
        .map_err(|_| BusError::AlreadyInitialized)?;
    bus()
}

pub fn bus() -> Result<&'static Maple, BusError> {
    MAPLE.try_get().map_err(|_| BusError::NotInitialized)
}

pub fn register_default_drivers(bus: &Maple) -> Result<(), RegisterError> {
    bus.register_driver(&drivers::controller::CONTROLLER)?;
    bus.register_driver(&drivers::memcard::MEMCARD)
}

/// Ticks the bus on every underflow of the poll timer.
struct PollTick;

impl IrqHandler for PollTick {
    fn handle(&self, irq: &Dispatcher, _source: Irq, _context: &mut Context) {
        if let Some(timer) = *POLL_TIMER.lock() {
            timer.clear_underflow(POLL_CHANNEL);
        }
        if let Ok(bus) = bus() {
            bus.tick();
        }
        irq.accept();
    }
}

static POLL_TICK: PollTick = PollTick;

/// Starts ticking the bus `hz` times a second from timer channel 1.
pub fn start_polling(timer: &'static dyn TimerUnit, hz: u32) -> Result<(), IrqError> {
    Cpu::without_interrupts(|| *POLL_TIMER.lock() = Some(timer));
    irq::set_handler(Irq::TMU1, Some(&POLL_TICK))?;
    timer.start(POLL_CHANNEL, hz);

    info!("maple: polling at {} Hz", hz);
    Ok(())
}

pub fn set_poll_frequency(hz: u32) -> Result<(), BusError> {
    let timer = Cpu::without_interrupts(|| *POLL_TIMER.lock()).ok_or(BusError::NotInitialized)?;
    timer.start(POLL_CHANNEL, hz);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::sim::{SimBus, SimDevice};
    use super::*;
    use crate::irq::EventSource;
    use std::sync::Mutex as StdMutex;

    struct Timer1 {
        calls: StdMutex<Vec<(&'static str, usize, u32)>>,
    }

    impl TimerUnit for Timer1 {
        fn clear_underflow(&self, channel: usize) {
            self.calls.lock().unwrap().push(("clear", channel, 0));
        }

        fn start(&self, channel: usize, hz: u32) {
            self.calls.lock().unwrap().push(("start", channel, hz));
        }

        fn stop(&self, channel: usize) {
            self.calls.lock().unwrap().push(("stop", channel, 0));
        }
    }

    struct Tmu1Underflow;

    impl EventSource for Tmu1Underflow {
        fn exception_event(&self) -> u32 {
            0
        }

        fn interrupt_event(&self) -> u32 {
            u32::from(Irq::TMU1.code())
        }

        fn trap_code(&self) -> u32 {
            0
        }
    }

    // The only test touching the global bus and dispatcher.
    #[test]
    fn timer_underflow_ticks_the_global_bus() {
        assert_eq!(bus().err(), Some(BusError::NotInitialized));
        assert_eq!(set_poll_frequency(60), Err(BusError::NotInitialized));

        let sim = SimBus::leak();
        sim.plug(0, 0, SimDevice::controller());
        let maple = init(sim).unwrap();
        assert_eq!(init(sim).err(), Some(BusError::AlreadyInitialized));
        register_default_drivers(maple).unwrap();
        maple.scan_all();

        let timer: &'static Timer1 = Box::leak(Box::new(Timer1 {
            calls: StdMutex::new(Vec::new()),
        }));
        start_polling(timer, DEFAULT_POLL_HZ).unwrap();
        assert!(irq::handler(Irq::TMU1).is_some());

        let dispatcher = Dispatcher::new();
        dispatcher.set_handler(Irq::TMU1, Some(&POLL_TICK)).unwrap();
        let mut context = Context::zeroed();
        let before = maple.ticks();
        dispatcher.dispatch(3, &Tmu1Underflow, &mut context);
        assert_eq!(maple.ticks(), before + 1);
        assert_eq!(dispatcher.interrupt_depth(), 0);

        set_poll_frequency(60).unwrap();
        let calls = timer.calls.lock().unwrap();
        assert_eq!(calls[0], ("start", POLL_CHANNEL, DEFAULT_POLL_HZ));
        assert!(calls.contains(&("clear", POLL_CHANNEL, 0)));
        assert_eq!(calls.last(), Some(&("start", POLL_CHANNEL, 60)));
    }
}
