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
use super::proto::Functions;
use core::ptr;

/// A class driver. Drivers are matched to devices by function code and
/// live for the rest of the kernel's life.
pub trait Driver: Sync {
    fn name(&self) -> &'static str;

    /// Function codes this driver handles. No two registered drivers may
    /// share one.
    fn functions(&self) -> Functions;

    /// Called on every bus tick, typically to queue a poll per device.
    fn periodic(&self, _bus: &Maple) {}

    /// A device with a matching function appeared. An error leaves the
    /// device unbound.
    fn attach(&self, _bus: &Maple, _device: &mut Device) -> Result<(), BusError> {
        Ok(())
    }

    fn detach(&self, _bus: &Maple, _device: &mut Device) {}
}

pub fn same_driver(a: &dyn Driver, b: &dyn Driver) -> bool {
    ptr::addr_eq(a as *const dyn Driver, b as *const dyn Driver)
}
