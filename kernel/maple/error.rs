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

use super::proto::Functions;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    NotInitialized,
    NoDevice,
    /// The frame is already locked by someone else.
    Busy,
    NotLocked,
    AlreadyQueued,
    QueueFull,
    PayloadTooLong,
    /// The transport has no room left for this transfer.
    TransportFull,
    AlreadyInitialized,
}

impl BusError {
    pub fn code(&self) -> i32 {
        match self {
            BusError::NotInitialized => -1,
            BusError::NoDevice => -2,
            BusError::Busy => -3,
            BusError::NotLocked => -4,
            BusError::AlreadyQueued => -5,
            BusError::QueueFull => -6,
            BusError::PayloadTooLong => -7,
            BusError::TransportFull => -8,
            BusError::AlreadyInitialized => -9,
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BusError::NotInitialized => "maple bus is not initialized",
            BusError::NoDevice => "no device at that address",
            BusError::Busy => "frame is locked",
            BusError::NotLocked => "frame must be locked first",
            BusError::AlreadyQueued => "frame is already queued",
            BusError::QueueFull => "frame queue is full",
            BusError::PayloadTooLong => "payload does not fit in a frame",
            BusError::TransportFull => "transfer list is full",
            BusError::AlreadyInitialized => "maple bus is already initialized",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    AlreadyRegistered,
    /// Another driver already claims some of the same function codes.
    Overlap { existing: &'static str, functions: Functions },
    TooManyDrivers,
}

impl RegisterError {
    pub fn code(&self) -> i32 {
        match self {
            RegisterError::AlreadyRegistered => -1,
            RegisterError::Overlap { .. } => -2,
            RegisterError::TooManyDrivers => -3,
        }
    }
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::AlreadyRegistered => write!(f, "driver is already registered"),
            RegisterError::Overlap { existing, functions } => {
                write!(f, "functions {:#010x} are claimed by {}", functions.bits(), existing)
            }
            RegisterError::TooManyDrivers => write!(f, "driver table is full"),
        }
    }
}
