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

//! A bus full of fake devices, answering frames the way real peripherals
//! do. Replies are computed when the batch starts and handed back on the
//! next [`Transport::idle`].

use super::bus::Maple;
use super::drivers::memcard::{decode_location, BLOCK_WORDS, PHASE_WORDS};
use super::error::BusError;
use super::proto::{
    address, decode_address, host_address, Command, DeviceInfo, Functions, Header, Response, MAX_FRAME_WORDS,
};
use super::transport::Transport;
use crate::vmufs::BLOCK_SIZE;
use std::collections::BTreeMap;
use std::sync::Mutex;
use utils::le;

pub const NO_RESPONSE: u32 = 0xffff_ffff;

pub struct SimDevice {
    pub info: DeviceInfo,
    pub condition: [u32; 2],
    pub blocks: Vec<[u8; BLOCK_SIZE]>,
    /// Answer everything but device info with this code.
    pub reject_with: Option<Response>,
}

impl SimDevice {
    pub fn new(functions: Functions, name: &str) -> Self {
        let mut info = DeviceInfo::EMPTY;
        info.functions = functions;
        info.product_name[..name.len()].copy_from_slice(name.as_bytes());
        Self {
            info,
            // All buttons released, sticks centered.
            condition: [0x0000_ffff, 0x8080_8080],
            blocks: Vec::new(),
            reject_with: None,
        }
    }

    pub fn controller() -> Self {
        Self::new(Functions::CONTROLLER, "Dreamcast Controller")
    }

    pub fn memcard(blocks: usize) -> Self {
        let mut device = Self::new(Functions::MEMCARD | Functions::LCD | Functions::CLOCK, "Visual Memory");
        device.blocks = vec![[0; BLOCK_SIZE]; blocks];
        device
    }
}

#[derive(Default)]
struct SimState {
    devices: BTreeMap<(u8, u8), SimDevice>,
    replies: Vec<Vec<u32>>,
    batch: Vec<(Header, Vec<u32>)>,
    requests: Vec<Header>,
    batches: usize,
    capacity: Option<usize>,
}

#[derive(Default)]
pub struct SimBus {
    state: Mutex<SimState>,
}

impl SimBus {
    pub fn leak() -> &'static SimBus {
        Box::leak(Box::default())
    }

    pub fn plug(&self, port: u8, unit: u8, device: SimDevice) {
        self.state.lock().unwrap().devices.insert((port, unit), device);
    }

    pub fn unplug(&self, port: u8, unit: u8) -> Option<SimDevice> {
        self.state.lock().unwrap().devices.remove(&(port, unit))
    }

    pub fn with_device<R>(&self, port: u8, unit: u8, f: impl FnOnce(&mut SimDevice) -> R) -> Option<R> {
        self.state.lock().unwrap().devices.get_mut(&(port, unit)).map(f)
    }

    /// How many frames with `command` have been sent so far.
    pub fn requests(&self, command: Command) -> usize {
        let state = self.state.lock().unwrap();
        state.requests.iter().filter(|h| h.command == command as u8).count()
    }

    pub fn batches(&self) -> usize {
        self.state.lock().unwrap().batches
    }

    /// Limits how many frames fit in one batch.
    pub fn set_capacity(&self, capacity: Option<usize>) {
        self.state.lock().unwrap().capacity = capacity;
    }
}

impl SimState {
    fn answer(&mut self, header: Header, payload: &[u32]) -> Vec<u32> {
        let (port, Some(unit)) = decode_address(header.recipient) else {
            return vec![NO_RESPONSE];
        };
        let subunits = (1..6u8)
            .filter(|u| self.devices.contains_key(&(port, *u)))
            .fold(0, |mask, u| mask | (1 << (u - 1)));
        let Some(device) = self.devices.get_mut(&(port, unit)) else {
            return vec![NO_RESPONSE];
        };

        let sender = if unit == 0 { address(port, 0) | subunits } else { address(port, unit) };
        let reply = |response: Response, data: &[u32]| {
            let header = Header {
                command: response.raw(),
                recipient: host_address(port),
                sender,
                length: data.len() as u8,
            };
            let mut words = vec![header.encode()];
            words.extend_from_slice(data);
            words
        };

        let function = payload.first().copied().unwrap_or(0);
        let command = header.command;
        if command == Command::DeviceInfo as u8 {
            return reply(Response::DeviceInfo, &device.info.to_words());
        }
        if let Some(response) = device.reject_with {
            return reply(response, &[]);
        }
        if function != 0 && device.info.functions.bits() & function != function {
            return reply(Response::FunctionUnsupported, &[]);
        }

        match command {
            c if c == Command::GetCondition as u8 => {
                reply(Response::DataTransfer, &[function, device.condition[0], device.condition[1]])
            }
            c if c == Command::BlockRead as u8 => {
                let (block, _) = decode_location(payload[1]);
                let Some(data) = device.blocks.get(usize::from(block)) else {
                    return reply(Response::FileError, &[]);
                };
                let mut words = vec![function, payload[1]];
                let mut block_words = [0u32; BLOCK_WORDS];
                le::bytes_to_words(data, &mut block_words);
                words.extend_from_slice(&block_words);
                reply(Response::DataTransfer, &words)
            }
            c if c == Command::BlockWrite as u8 => {
                let (block, phase) = decode_location(payload[1]);
                let Some(data) = device.blocks.get_mut(usize::from(block)) else {
                    return reply(Response::FileError, &[]);
                };
                let offset = usize::from(phase) * PHASE_WORDS * 4;
                le::words_to_bytes(&payload[2..2 + PHASE_WORDS], &mut data[offset..offset + PHASE_WORDS * 4]);
                reply(Response::Ok, &[])
            }
            c if c == Command::BlockSync as u8 => reply(Response::Ok, &[]),
            _ => reply(Response::UnknownCommand, &[]),
        }
    }
}

impl Transport for SimBus {
    fn begin(&self) {
        let mut state = self.state.lock().unwrap();
        state.batch.clear();
        state.replies.clear();
    }

    fn push(&self, header: Header, payload: &[u32]) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap();
        if state.capacity.is_some_and(|capacity| state.batch.len() >= capacity) {
            return Err(BusError::TransportFull);
        }
        state.requests.push(header);
        state.batch.push((header, payload.to_vec()));
        Ok(())
    }

    fn start(&self) {
        let mut state = self.state.lock().unwrap();
        let batch = std::mem::take(&mut state.batch);
        let replies = batch.iter().map(|(header, payload)| state.answer(*header, payload)).collect();
        state.replies = replies;
        state.batches += 1;
    }

    fn response(&self, index: usize, buffer: &mut [u32; MAX_FRAME_WORDS]) -> usize {
        let state = self.state.lock().unwrap();
        let Some(reply) = state.replies.get(index) else {
            return 0;
        };
        buffer[..reply.len()].copy_from_slice(reply);
        reply.len()
    }

    fn idle(&self, bus: &Maple) {
        bus.flush();
        if bus.is_busy() {
            bus.complete();
        }
    }
}
