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

//! Maple wire format: addresses, command and response codes, frame
//! headers and the device information block.

use bit_field::BitField;
use bitflags::bitflags;
use utils::le;

pub const PORT_COUNT: usize = 4;
/// Unit 0 is the main device on a port, units 1..5 its sub-units.
pub const UNIT_COUNT: usize = 6;
/// Longest payload a frame header can announce, in words.
pub const MAX_PAYLOAD_WORDS: usize = 255;
/// Header plus the longest payload.
pub const MAX_FRAME_WORDS: usize = MAX_PAYLOAD_WORDS + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    DeviceInfo = 1,
    AllInfo = 2,
    Reset = 3,
    Kill = 4,
    GetCondition = 9,
    GetMemInfo = 10,
    BlockRead = 11,
    BlockWrite = 12,
    BlockSync = 13,
    SetCondition = 14,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    DeviceInfo,
    AllInfo,
    Ok,
    DataTransfer,
    /// The port was empty or the device did not answer in time.
    NoResponse,
    FunctionUnsupported,
    UnknownCommand,
    Again,
    FileError,
    Other(u8),
}

impl Response {
    pub fn from_raw(raw: u8) -> Self {
        match raw as i8 {
            5 => Self::DeviceInfo,
            6 => Self::AllInfo,
            7 => Self::Ok,
            8 => Self::DataTransfer,
            -1 => Self::NoResponse,
            -2 => Self::FunctionUnsupported,
            -3 => Self::UnknownCommand,
            -4 => Self::Again,
            -5 => Self::FileError,
            _ => Self::Other(raw),
        }
    }

    pub fn raw(self) -> u8 {
        let code: i8 = match self {
            Self::DeviceInfo => 5,
            Self::AllInfo => 6,
            Self::Ok => 7,
            Self::DataTransfer => 8,
            Self::NoResponse => -1,
            Self::FunctionUnsupported => -2,
            Self::UnknownCommand => -3,
            Self::Again => -4,
            Self::FileError => -5,
            Self::Other(raw) => return raw,
        };

        code as u8
    }

    pub fn is_error(self) -> bool {
        (self.raw() as i8) < 0
    }
}

bitflags! {
    /// Function codes a device implements.
    pub struct Functions: u32 {
        const PURUPURU = 0x0001_0000;
        const MOUSE = 0x0002_0000;
        const CAMERA = 0x0008_0000;
        const CONTROLLER = 0x0100_0000;
        const MEMCARD = 0x0200_0000;
        const LCD = 0x0400_0000;
        const CLOCK = 0x0800_0000;
        const MICROPHONE = 0x1000_0000;
        const ARGUN = 0x2000_0000;
        const KEYBOARD = 0x4000_0000;
        const LIGHTGUN = 0x8000_0000;
    }
}

/// Bus address of a port/unit pair. The main unit is bit 5, sub-unit n
/// is bit n-1, the port sits in the top two bits.
pub const fn address(port: u8, unit: u8) -> u8 {
    let unit_bit = if unit == 0 { 0x20 } else { 1 << (unit - 1) };
    (port << 6) | unit_bit
}

/// Address the host uses as sender on `port`.
pub const fn host_address(port: u8) -> u8 {
    port << 6
}

/// Port and unit named by a bus address.
pub fn decode_address(addr: u8) -> (u8, Option<u8>) {
    let port = addr >> 6;
    let unit = if addr & 0x20 != 0 {
        Some(0)
    } else {
        (0..5u8).find(|bit| addr & (1 << bit) != 0).map(|bit| bit + 1)
    };

    (port, unit)
}

/// First word of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: u8,
    pub recipient: u8,
    pub sender: u8,
    /// Payload length in words.
    pub length: u8,
}

impl Header {
    pub fn encode(&self) -> u32 {
        let mut word = 0u32;
        word.set_bits(0..8, u32::from(self.command));
        word.set_bits(8..16, u32::from(self.recipient));
        word.set_bits(16..24, u32::from(self.sender));
        word.set_bits(24..32, u32::from(self.length));
        word
    }

    pub fn decode(word: u32) -> Self {
        Self {
            command: word.get_bits(0..8) as u8,
            recipient: word.get_bits(8..16) as u8,
            sender: word.get_bits(16..24) as u8,
            length: word.get_bits(24..32) as u8,
        }
    }

    pub fn response(&self) -> Response {
        Response::from_raw(self.command)
    }

    pub fn port(&self) -> u8 {
        self.recipient >> 6
    }
}

pub const DEVINFO_WORDS: usize = 28;

/// Reply to [`Command::DeviceInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub functions: Functions,
    pub function_data: [u32; 3],
    pub area_code: u8,
    pub connector_direction: u8,
    pub product_name: [u8; 30],
    pub product_license: [u8; 60],
    pub standby_power: u16,
    pub max_power: u16,
}

impl DeviceInfo {
    pub const EMPTY: Self = Self {
        functions: Functions::empty(),
        function_data: [0; 3],
        area_code: 0,
        connector_direction: 0,
        product_name: [b' '; 30],
        product_license: [b' '; 60],
        standby_power: 0,
        max_power: 0,
    };

    pub fn parse(words: &[u32]) -> Option<Self> {
        if words.len() < DEVINFO_WORDS {
            return None;
        }

        let mut bytes = [0u8; DEVINFO_WORDS * 4];
        le::words_to_bytes(&words[..DEVINFO_WORDS], &mut bytes);

        let mut info = Self::EMPTY;
        info.functions = Functions::from_bits_truncate(le::read_u32(&bytes, 0));
        for (i, data) in info.function_data.iter_mut().enumerate() {
            *data = le::read_u32(&bytes, 4 + i * 4);
        }
        info.area_code = bytes[16];
        info.connector_direction = bytes[17];
        info.product_name.copy_from_slice(&bytes[18..48]);
        info.product_license.copy_from_slice(&bytes[48..108]);
        info.standby_power = le::read_u16(&bytes, 108);
        info.max_power = le::read_u16(&bytes, 110);

        Some(info)
    }

    pub fn to_words(&self) -> [u32; DEVINFO_WORDS] {
        let mut bytes = [0u8; DEVINFO_WORDS * 4];
        le::write_u32(&mut bytes, 0, self.functions.bits());
        for (i, data) in self.function_data.iter().enumerate() {
            le::write_u32(&mut bytes, 4 + i * 4, *data);
        }
        bytes[16] = self.area_code;
        bytes[17] = self.connector_direction;
        bytes[18..48].copy_from_slice(&self.product_name);
        bytes[48..108].copy_from_slice(&self.product_license);
        le::write_u16(&mut bytes, 108, self.standby_power);
        le::write_u16(&mut bytes, 110, self.max_power);

        let mut words = [0u32; DEVINFO_WORDS];
        le::bytes_to_words(&bytes, &mut words);
        words
    }

    /// Product name without its space padding.
    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.product_name)
            .unwrap_or("")
            .trim_end_matches(|c| c == ' ' || c == '\0')
    }
}
