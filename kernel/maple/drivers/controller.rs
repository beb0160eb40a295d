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

//! Standard controller: polls GETCOND every tick and keeps the latest
//! condition in the device status.

use crate::maple::bus::Maple;
use crate::maple::device::Device;
use crate::maple::driver::Driver;
use crate::maple::error::BusError;
use crate::maple::proto::{Command, Functions, Response};
use bitflags::bitflags;
use core::ops::ControlFlow;

bitflags! {
    #[derive(Default)]
    pub struct Buttons: u32 {
        const C = 1 << 0;
        const B = 1 << 1;
        const A = 1 << 2;
        const START = 1 << 3;
        const DPAD_UP = 1 << 4;
        const DPAD_DOWN = 1 << 5;
        const DPAD_LEFT = 1 << 6;
        const DPAD_RIGHT = 1 << 7;
        const Z = 1 << 8;
        const Y = 1 << 9;
        const X = 1 << 10;
        const D = 1 << 11;
        const DPAD2_UP = 1 << 12;
        const DPAD2_DOWN = 1 << 13;
        const DPAD2_LEFT = 1 << 14;
        const DPAD2_RIGHT = 1 << 15;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    /// Pressed buttons.
    pub buttons: Buttons,
    pub ltrig: u8,
    pub rtrig: u8,
    pub joyx: i8,
    pub joyy: i8,
    pub joy2x: i8,
    pub joy2y: i8,
}

fn centered(raw: u32) -> i8 {
    (i16::from(raw as u8) - 128) as i8
}

impl ControllerState {
    /// Decodes the two condition words of a GETCOND reply. Buttons are
    /// active low on the wire.
    pub fn from_condition(cond: [u32; 2]) -> Self {
        Self {
            buttons: Buttons::from_bits_truncate(!cond[0] & 0xffff),
            rtrig: (cond[0] >> 16) as u8,
            ltrig: (cond[0] >> 24) as u8,
            joyx: centered(cond[1]),
            joyy: centered(cond[1] >> 8),
            joy2x: centered(cond[1] >> 16),
            joy2y: centered(cond[1] >> 24),
        }
    }
}

pub struct ControllerDriver;

pub static CONTROLLER: ControllerDriver = ControllerDriver;

fn condition_reply(_bus: &Maple, device: &mut Device) {
    let data = device.frame.reply().data();
    if data.len() < 3 {
        device.set_status_valid(false);
        return;
    }
    let cond = [data[1], data[2]];
    device.status_mut()[..2].copy_from_slice(&cond);
    device.set_status_valid(true);
}

impl Driver for ControllerDriver {
    fn name(&self) -> &'static str {
        "controller"
    }

    fn functions(&self) -> Functions {
        Functions::CONTROLLER
    }

    fn periodic(&self, bus: &Maple) {
        let _ = bus.driver_foreach(self, |device| {
            if device.frame.lock().is_err() {
                device.note_missed_tick();
                return ControlFlow::Continue(());
            }

            let queued = device
                .frame
                .prepare(
                    Command::GetCondition,
                    &[Functions::CONTROLLER.bits()],
                    Some(condition_reply),
                )
                .and_then(|()| {
                    device.frame.expect(Response::DataTransfer, Some(Functions::CONTROLLER));
                    bus.queue_frame(device)
                });

            match queued {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => {
                    device.frame.unlock();
                    ControlFlow::Break(())
                }
            }
        });
    }

    fn attach(&self, _bus: &Maple, device: &mut Device) -> Result<(), BusError> {
        device.set_status_valid(false);
        Ok(())
    }

    fn detach(&self, _bus: &Maple, device: &mut Device) {
        device.set_status_valid(false);
    }
}

/// Latest state of a controller, once a poll has come back.
pub fn state(device: &Device) -> Option<ControllerState> {
    if !device.status_valid() {
        return None;
    }
    let status = device.status();
    Some(ControllerState::from_condition([status[0], status[1]]))
}
