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

//! Memory card block access.
//!
//! Blocks are 512 bytes. A read comes back in one frame; a write goes out
//! as four 128-byte phases followed by a sync.

use crate::maple::bus::{Maple, IDLE_LIMIT};
use crate::maple::device::Device;
use crate::maple::driver::Driver;
use crate::maple::error::BusError;
use crate::maple::frame::FrameState;
use crate::maple::proto::{Command, Functions, Response, MAX_PAYLOAD_WORDS};
use crate::vmufs::{BlockDevice, BlockError, BLOCK_SIZE};
use utils::le;

pub const BLOCK_WORDS: usize = BLOCK_SIZE / 4;
pub const PHASES: u8 = 4;
pub const PHASE_WORDS: usize = BLOCK_WORDS / PHASES as usize;
/// Attempts per request when the card asks to try again.
pub const RETRIES: usize = 3;

/// Location word: partition, phase, then the block number big-endian.
pub fn location(block: u16, phase: u8) -> u32 {
    u32::from(phase) << 8 | u32::from(block >> 8) << 16 | u32::from(block & 0xff) << 24
}

pub fn decode_location(word: u32) -> (u16, u8) {
    let block = ((word >> 16) & 0xff) << 8 | (word >> 24);
    (block as u16, (word >> 8) as u8)
}

pub struct MemcardDriver;

pub static MEMCARD: MemcardDriver = MemcardDriver;

impl Driver for MemcardDriver {
    fn name(&self) -> &'static str {
        "memory card"
    }

    fn functions(&self) -> Functions {
        Functions::MEMCARD
    }

    fn attach(&self, _bus: &Maple, device: &mut Device) -> Result<(), BusError> {
        device.set_status_valid(false);
        Ok(())
    }
}

/// A memory card at a fixed bus address.
pub struct MemCard<'a> {
    bus: &'a Maple,
    port: u8,
    unit: u8,
}

impl<'a> MemCard<'a> {
    pub fn new(bus: &'a Maple, port: u8, unit: u8) -> Self {
        Self { bus, port, unit }
    }

    fn idle(&self) {
        self.bus.transport().idle(self.bus);
    }

    /// Sends one request and waits for its reply, copying the reply data
    /// into `data`. Returns the number of data words.
    fn request(
        &self,
        command: Command,
        payload: &[u32],
        expect: Response,
        data: &mut [u32; MAX_PAYLOAD_WORDS],
    ) -> Result<usize, BlockError> {
        let mut idles = 0;
        let generation = loop {
            let queued = self
                .bus
                .with_device(self.port, self.unit, |device| {
                    if !device.is_valid() || !device.functions().contains(Functions::MEMCARD) {
                        return Err(BlockError::NoDevice);
                    }
                    if device.frame.lock().is_err() {
                        return Ok(None);
                    }

                    let queued = device.frame.prepare(command, payload, None).and_then(|()| {
                        // Only data replies echo the function code.
                        let function = (expect == Response::DataTransfer).then_some(Functions::MEMCARD);
                        device.frame.expect(expect, function);
                        self.bus.queue_frame(device)
                    });
                    match queued {
                        Ok(()) => Ok(Some(device.frame.generation())),
                        Err(e) => {
                            device.frame.unlock();
                            Err(BlockError::Bus(e))
                        }
                    }
                })
                .unwrap_or(Err(BlockError::NoDevice))?;

            if let Some(generation) = queued {
                break generation;
            }
            idles += 1;
            if idles > IDLE_LIMIT {
                return Err(BlockError::Busy);
            }
            self.idle();
        };

        for _ in 0..IDLE_LIMIT {
            self.idle();
            let outcome = self
                .bus
                .with_device(self.port, self.unit, |device| {
                    if device.frame.generation() != generation {
                        return Some(Err(BlockError::Lost));
                    }
                    match device.frame.state() {
                        FrameState::Responded => {
                            let reply = device.frame.reply().data();
                            data[..reply.len()].copy_from_slice(reply);
                            Some(Ok(reply.len()))
                        }
                        FrameState::Rejected => {
                            let response = device.frame.reply().response();
                            device.frame.reset();
                            Some(Err(BlockError::Rejected(response.raw())))
                        }
                        FrameState::Queued | FrameState::Sent | FrameState::Vacant => None,
                    }
                })
                .unwrap_or(Some(Err(BlockError::NoDevice)));

            if let Some(outcome) = outcome {
                return outcome;
            }
        }

        let _ = self.bus.with_device(self.port, self.unit, |device| {
            if device.frame.generation() == generation {
                device.frame.reset();
            }
        });
        Err(BlockError::Timeout)
    }

    fn request_with_retry(
        &self,
        command: Command,
        payload: &[u32],
        expect: Response,
        data: &mut [u32; MAX_PAYLOAD_WORDS],
    ) -> Result<usize, BlockError> {
        let again = BlockError::Rejected(Response::Again.raw());
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request(command, payload, expect, data) {
                Err(e) if (e == again || e == BlockError::Timeout) && attempt < RETRIES => {
                    debug!("memcard: {:?} on block request, retrying", e);
                }
                result => return result,
            }
        }
    }
}

impl BlockDevice for MemCard<'_> {
    fn is_memcard(&self) -> bool {
        self.bus
            .with_device(self.port, self.unit, |device| {
                device.is_valid() && device.functions().contains(Functions::MEMCARD)
            })
            .unwrap_or(false)
    }

    fn read_block(&self, block: u16, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        let mut data = [0u32; MAX_PAYLOAD_WORDS];
        let payload = [Functions::MEMCARD.bits(), location(block, 0)];
        let words = self.request_with_retry(Command::BlockRead, &payload, Response::DataTransfer, &mut data)?;
        // Function code and location come back ahead of the data.
        if words < 2 + BLOCK_WORDS {
            return Err(BlockError::ShortReply);
        }
        le::words_to_bytes(&data[2..2 + BLOCK_WORDS], buf);

        Ok(())
    }

    fn write_block(&self, block: u16, buf: &[u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        let mut data = [0u32; MAX_PAYLOAD_WORDS];
        let mut payload = [0u32; 2 + PHASE_WORDS];
        payload[0] = Functions::MEMCARD.bits();

        for phase in 0..PHASES {
            payload[1] = location(block, phase);
            let start = usize::from(phase) * PHASE_WORDS * 4;
            le::bytes_to_words(&buf[start..start + PHASE_WORDS * 4], &mut payload[2..]);
            self.request_with_retry(Command::BlockWrite, &payload, Response::Ok, &mut data)?;
        }

        let sync = [Functions::MEMCARD.bits(), location(block, PHASES)];
        self.request_with_retry(Command::BlockSync, &sync, Response::Ok, &mut data)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maple::sim::{SimBus, SimDevice};

    #[test]
    fn location_word_layout() {
        assert_eq!(location(0x00ff, 0), 0xff00_0000);
        assert_eq!(location(0x0102, 3), 0x0201_0300);
        assert_eq!(decode_location(0x0201_0300), (0x0102, 3));
    }

    fn card_bus() -> (&'static SimBus, Maple) {
        let sim = SimBus::leak();
        sim.plug(0, 1, SimDevice::memcard(256));
        sim.plug(0, 0, SimDevice::controller());
        let bus = Maple::new(sim);
        bus.register_driver(&MEMCARD).unwrap();
        bus.scan_all();
        (sim, bus)
    }

    #[test]
    fn block_round_trip() {
        let (sim, bus) = card_bus();
        let card = MemCard::new(&bus, 0, 1);
        assert!(card.is_memcard());

        let mut block = [0u8; BLOCK_SIZE];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = (i * 7) as u8;
        }
        card.write_block(200, &block).unwrap();
        assert_eq!(sim.with_device(0, 1, |d| d.blocks[200]).unwrap(), block);
        assert_eq!(sim.requests(Command::BlockWrite), 4);
        assert_eq!(sim.requests(Command::BlockSync), 1);

        let mut back = [0u8; BLOCK_SIZE];
        card.read_block(200, &mut back).unwrap();
        assert_eq!(back, block);
        // The frame is free again for the next request.
        assert_eq!(bus.with_device(0, 1, |d| d.frame.is_locked()), Some(false));
    }

    #[test]
    fn controller_is_not_a_memcard() {
        let (_sim, bus) = card_bus();
        let pad = MemCard::new(&bus, 0, 0);
        assert!(!pad.is_memcard());
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(pad.read_block(0, &mut buf), Err(BlockError::NoDevice));
    }

    #[test]
    fn rejection_is_reported_and_frame_released() {
        let (sim, bus) = card_bus();
        sim.with_device(0, 1, |d| d.reject_with = Some(Response::FileError));

        let card = MemCard::new(&bus, 0, 1);
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(
            card.read_block(3, &mut buf),
            Err(BlockError::Rejected(Response::FileError.raw()))
        );
        assert_eq!(bus.with_device(0, 1, |d| d.frame.is_locked()), Some(false));
    }

    #[test]
    fn busy_card_is_retried() {
        let (sim, bus) = card_bus();
        sim.with_device(0, 1, |d| d.reject_with = Some(Response::Again));

        let card = MemCard::new(&bus, 0, 1);
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(card.read_block(3, &mut buf), Err(BlockError::Rejected(Response::Again.raw())));
        assert_eq!(sim.requests(Command::BlockRead), RETRIES);
    }

    #[test]
    fn out_of_range_block() {
        let (_sim, bus) = card_bus();
        let card = MemCard::new(&bus, 0, 1);
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(card.read_block(0x1000, &mut buf).is_err());
    }
}
