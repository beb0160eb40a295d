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

//! The maple DMA engine.
//!
//! A transfer is a list in RAM: for each frame a control word (port,
//! payload length, end-of-list bit), the physical address its reply goes
//! to, then the frame itself. The controller walks the list, writes every
//! reply (or `0xffffffff` when nobody answered) and raises the maple DMA
//! event on the ASIC.

use super::bus::{Maple, QUEUE_DEPTH};
use super::error::BusError;
use super::proto::{Header, MAX_FRAME_WORDS};
use super::transport::Transport;
use crate::arch::asic::{self, IrqLine, EVT_MAPLE_DMA};
use crate::arch::cpu::Cpu;
use crate::arch::{mmio, physical};
use crate::irq::{self, Context, Dispatcher, Irq, IrqError, IrqHandler};
use spin::Mutex;
use utils::RacyCell;

const MAPLE_BASE: usize = 0xa05f_6c00;
const MAPLE_DMAADDR: usize = MAPLE_BASE + 0x04;
const MAPLE_TRIGGER: usize = MAPLE_BASE + 0x10;
const MAPLE_ENABLE: usize = MAPLE_BASE + 0x14;
const MAPLE_STATE: usize = MAPLE_BASE + 0x18;
const MAPLE_SPEED: usize = MAPLE_BASE + 0x80;
const MAPLE_RESET: usize = MAPLE_BASE + 0x8c;

const RESET_MAGIC: u32 = 0x6155_404f;
/// 2 Mbps, timeout in 20 ns units.
const SPEED_2MBPS: u32 = 0;
const TIMEOUT: u32 = 50_000;
/// Polls of the state register per idle call when interrupts are masked.
const MASKED_SPIN_LIMIT: usize = 1 << 20;

pub const LAST_ENTRY: u32 = 0x8000_0000;
pub const NO_RESPONSE: u32 = 0xffff_ffff;

/// Control word, receive address, header.
const ENTRY_OVERHEAD: usize = 3;
const SEND_WORDS: usize = QUEUE_DEPTH * (ENTRY_OVERHEAD + MAX_FRAME_WORDS);

pub fn control_word(port: u8, payload_words: usize, last: bool) -> u32 {
    let mut word = u32::from(port) << 16 | payload_words as u32;
    if last {
        word |= LAST_ENTRY;
    }
    word
}

/// Appends frames to a transfer list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListBuilder {
    frames: usize,
    used: usize,
    last: Option<usize>,
}

impl ListBuilder {
    pub const fn new() -> Self {
        Self {
            frames: 0,
            used: 0,
            last: None,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Writes one entry into `list`. `recv_addr` is the physical address
    /// the reply will be written to.
    pub fn push(&mut self, list: &mut [u32], recv_addr: u32, header: Header, payload: &[u32]) -> Result<(), BusError> {
        let words = ENTRY_OVERHEAD + payload.len();
        if self.frames >= QUEUE_DEPTH || self.used + words > list.len() {
            return Err(BusError::TransportFull);
        }

        let entry = &mut list[self.used..self.used + words];
        entry[0] = control_word(header.port(), payload.len(), false);
        entry[1] = recv_addr;
        entry[2] = header.encode();
        entry[ENTRY_OVERHEAD..].copy_from_slice(payload);

        self.last = Some(self.used);
        self.used += words;
        self.frames += 1;
        Ok(())
    }

    /// Marks the end of the list. False if it is empty.
    pub fn finish(&self, list: &mut [u32]) -> bool {
        match self.last {
            Some(last) => {
                list[last] |= LAST_ENTRY;
                true
            }
            None => false,
        }
    }
}

#[repr(C, align(32))]
struct DmaArea {
    // Replies first so every buffer stays 32-byte aligned.
    recv: [[u32; MAX_FRAME_WORDS]; QUEUE_DEPTH],
    send: [u32; SEND_WORDS],
}

static DMA_AREA: RacyCell<DmaArea> = RacyCell::new(DmaArea {
    recv: [[0; MAX_FRAME_WORDS]; QUEUE_DEPTH],
    send: [0; SEND_WORDS],
});

/// The DMA area seen through the uncached mirror, so the controller and
/// the CPU agree on its contents.
fn area() -> *mut DmaArea {
    #[cfg(feature = "hw")]
    {
        crate::arch::uncached(DMA_AREA.get() as usize) as *mut DmaArea
    }
    #[cfg(not(feature = "hw"))]
    {
        DMA_AREA.get()
    }
}

pub struct DmaTransport {
    list: Mutex<ListBuilder>,
}

pub static MAPLE_DMA: DmaTransport = DmaTransport {
    list: Mutex::new(ListBuilder::new()),
};

impl DmaTransport {
    /// Resets the controller and sets the bus speed.
    ///
    /// # Safety
    ///
    /// Only on real hardware, before the bus is used.
    pub unsafe fn init(&self) {
        unsafe {
            mmio::write32(MAPLE_RESET, RESET_MAGIC);
            mmio::write32(MAPLE_SPEED, TIMEOUT << 16 | SPEED_2MBPS);
            mmio::write32(MAPLE_TRIGGER, 0);
            mmio::write32(MAPLE_ENABLE, 1);
        }
    }

    pub fn in_progress(&self) -> bool {
        unsafe { mmio::read32(MAPLE_STATE) & 1 != 0 }
    }
}

impl Transport for DmaTransport {
    fn begin(&self) {
        *self.list.lock() = ListBuilder::new();
    }

    fn push(&self, header: Header, payload: &[u32]) -> Result<(), BusError> {
        let mut list = self.list.lock();
        let index = list.frames();
        // SAFETY: the list is only built while the bus is not transferring,
        // and the busy flag keeps other builders out.
        let area = unsafe { &mut *area() };
        if index >= QUEUE_DEPTH {
            return Err(BusError::TransportFull);
        }
        let recv_addr = physical(area.recv[index].as_ptr() as usize) as u32;
        list.push(&mut area.send, recv_addr, header, payload)?;
        area.recv[index][0] = NO_RESPONSE;

        Ok(())
    }

    fn start(&self) {
        let list = self.list.lock();
        // SAFETY: as in push.
        let area = unsafe { &mut *area() };
        if !list.finish(&mut area.send) {
            return;
        }

        unsafe {
            mmio::write32(MAPLE_DMAADDR, physical(area.send.as_ptr() as usize) as u32);
            mmio::write32(MAPLE_STATE, 1);
        }
    }

    fn response(&self, index: usize, buffer: &mut [u32; MAX_FRAME_WORDS]) -> usize {
        if index >= QUEUE_DEPTH {
            return 0;
        }
        // SAFETY: the transfer is over, the controller no longer writes.
        let recv = unsafe { &(*area()).recv[index] };
        if recv[0] == NO_RESPONSE {
            return 0;
        }

        let words = 1 + usize::from(Header::decode(recv[0]).length);
        let words = words.min(MAX_FRAME_WORDS);
        buffer[..words].copy_from_slice(&recv[..words]);
        words
    }

    fn idle(&self, bus: &Maple) {
        Cpu::without_interrupts(|| {
            if bus.is_busy() && !self.in_progress() {
                bus.complete();
            }
            bus.flush();
        });
        if Cpu::interrupts_enabled() {
            Cpu::idle();
            return;
        }

        // Masked, as during the boot scan: the completion event cannot be
        // taken, so wait on the engine and let the next call complete it.
        let mut spins = 0;
        while self.in_progress() && spins < MASKED_SPIN_LIMIT {
            core::hint::spin_loop();
            spins += 1;
        }
    }
}

/// Maple DMA done, raised on IRL 9 through the ASIC.
struct DmaDone;

impl IrqHandler for DmaDone {
    fn handle(&self, irq: &Dispatcher, _source: Irq, _context: &mut Context) {
        if !asic::take_event(EVT_MAPLE_DMA) {
            irq.reject();
            return;
        }
        let Ok(bus) = super::bus() else {
            return;
        };

        if bus.is_busy() && !MAPLE_DMA.in_progress() {
            bus.complete();
        }
        bus.flush();
    }
}

static DMA_DONE: DmaDone = DmaDone;

/// Routes the DMA completion event to the bus.
pub fn enable_completion_irq() -> Result<(), IrqError> {
    irq::set_handler(Irq::IRQ9, Some(&DMA_DONE))?;
    asic::enable_event(EVT_MAPLE_DMA, IrqLine::Irq9);
    Ok(())
}
