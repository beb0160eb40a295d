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

use super::bus::Maple;
use super::device::Device;
use super::error::BusError;
use super::proto::{address, host_address, Command, Functions, Header, Response, MAX_FRAME_WORDS, MAX_PAYLOAD_WORDS};

/// Runs in the completion path once a reply matched the frame's
/// expectation. The reply is in `device.frame`.
pub type FrameCallback = fn(bus: &Maple, device: &mut Device);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Not queued; a locked vacant frame is being prepared.
    Vacant,
    Queued,
    /// Handed to the transport.
    Sent,
    Responded,
    /// The reply did not match; the frame stays locked until the device is
    /// seen again by enumeration.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    pub response: Response,
    /// Function code the reply's first data word must carry.
    pub function: Option<Functions>,
}

/// One request/response buffer. Each device owns exactly one.
pub struct Frame {
    port: u8,
    unit: u8,
    command: u8,
    length: usize,
    send: [u32; MAX_PAYLOAD_WORDS],
    recv: [u32; MAX_FRAME_WORDS],
    recv_len: usize,
    callback: Option<FrameCallback>,
    expect: Option<Expectation>,
    state: FrameState,
    locked: bool,
    generation: u32,
}

impl Frame {
    pub const fn new(port: u8, unit: u8) -> Self {
        Self {
            port,
            unit,
            command: 0,
            length: 0,
            send: [0; MAX_PAYLOAD_WORDS],
            recv: [0; MAX_FRAME_WORDS],
            recv_len: 0,
            callback: None,
            expect: None,
            state: FrameState::Vacant,
            locked: false,
            generation: 0,
        }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }

    pub(crate) fn retarget(&mut self, port: u8, unit: u8) {
        self.port = port;
        self.unit = unit;
    }

    pub fn lock(&mut self) -> Result<(), BusError> {
        if self.locked {
            return Err(BusError::Busy);
        }
        self.locked = true;

        Ok(())
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: FrameState) {
        self.state = state;
    }

    /// Bumped every time the frame is queued.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Fills in a request. The frame must be locked.
    pub fn prepare(&mut self, command: Command, payload: &[u32], callback: Option<FrameCallback>) -> Result<(), BusError> {
        if !self.locked {
            return Err(BusError::NotLocked);
        }
        if payload.len() > MAX_PAYLOAD_WORDS {
            return Err(BusError::PayloadTooLong);
        }

        self.command = command as u8;
        self.length = payload.len();
        self.send[..payload.len()].copy_from_slice(payload);
        self.callback = callback;
        self.expect = None;
        self.recv_len = 0;
        self.state = FrameState::Vacant;

        Ok(())
    }

    /// Replies that don't match are rejected instead of reaching the callback.
    pub fn expect(&mut self, response: Response, function: Option<Functions>) {
        self.expect = Some(Expectation { response, function });
    }

    pub fn header(&self) -> Header {
        Header {
            command: self.command,
            recipient: address(self.port, self.unit),
            sender: host_address(self.port),
            length: self.length as u8,
        }
    }

    pub fn payload(&self) -> &[u32] {
        &self.send[..self.length]
    }

    pub(crate) fn callback(&self) -> Option<FrameCallback> {
        self.callback
    }

    pub(crate) fn mark_queued(&mut self) {
        self.state = FrameState::Queued;
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn recv_buffer(&mut self) -> &mut [u32; MAX_FRAME_WORDS] {
        &mut self.recv
    }

    pub(crate) fn set_received(&mut self, words: usize) {
        self.recv_len = words.min(MAX_FRAME_WORDS);
    }

    pub fn reply(&self) -> Reply<'_> {
        if self.recv_len == 0 {
            return Reply::NONE;
        }

        let header = Header::decode(self.recv[0]);
        let end = (1 + usize::from(header.length)).min(self.recv_len);
        Reply {
            header,
            data: &self.recv[1..end],
        }
    }

    pub(crate) fn reply_matches(&self) -> bool {
        let Some(expect) = self.expect else {
            return true;
        };

        let reply = self.reply();
        if reply.response() != expect.response {
            return false;
        }

        match expect.function {
            Some(function) => reply.data().first() == Some(&function.bits()),
            None => true,
        }
    }

    /// Drops whatever the frame was doing: unlocked, vacant, and with a new
    /// generation so a waiter can tell its request is gone.
    pub fn reset(&mut self) {
        self.locked = false;
        self.state = FrameState::Vacant;
        self.callback = None;
        self.expect = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// A received frame.
#[derive(Debug, Clone, Copy)]
pub struct Reply<'a> {
    header: Header,
    data: &'a [u32],
}

impl Reply<'static> {
    const NONE: Self = Self {
        header: Header {
            command: 0xff,
            recipient: 0xff,
            sender: 0xff,
            length: 0,
        },
        data: &[],
    };
}

impl<'a> Reply<'a> {
    pub fn header(&self) -> Header {
        self.header
    }

    pub fn response(&self) -> Response {
        self.header.response()
    }

    pub fn data(&self) -> &'a [u32] {
        self.data
    }
}
