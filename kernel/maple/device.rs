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

use super::driver::Driver;
use super::frame::Frame;
use super::proto::{DeviceInfo, Functions};

/// Words of driver-owned status kept per device.
pub const STATUS_WORDS: usize = 32;

/// One port/unit slot of the bus.
pub struct Device {
    port: u8,
    unit: u8,
    valid: bool,
    info: DeviceInfo,
    driver: Option<&'static dyn Driver>,
    status: [u32; STATUS_WORDS],
    status_valid: bool,
    missed_ticks: u32,
    pub frame: Frame,
}

impl Device {
    pub const fn new(port: u8, unit: u8) -> Self {
        Self {
            port,
            unit,
            valid: false,
            info: DeviceInfo::EMPTY,
            driver: None,
            status: [0; STATUS_WORDS],
            status_valid: false,
            missed_ticks: 0,
            frame: Frame::new(port, unit),
        }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }

    /// Whether something answered at this address on the last probe.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn functions(&self) -> Functions {
        self.info.functions
    }

    pub fn driver(&self) -> Option<&'static dyn Driver> {
        self.driver
    }

    pub fn status(&self) -> &[u32; STATUS_WORDS] {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut [u32; STATUS_WORDS] {
        &mut self.status
    }

    pub fn status_valid(&self) -> bool {
        self.status_valid
    }

    pub fn set_status_valid(&mut self, valid: bool) {
        self.status_valid = valid;
    }

    /// Polls skipped because the previous request was still out.
    pub fn missed_ticks(&self) -> u32 {
        self.missed_ticks
    }

    pub fn note_missed_tick(&mut self) {
        self.missed_ticks = self.missed_ticks.saturating_add(1);
    }

    /// `A0`, `B2`, ...
    pub fn name(&self) -> DeviceName {
        DeviceName(self.port, self.unit)
    }

    pub(crate) fn set_driver(&mut self, driver: Option<&'static dyn Driver>) {
        self.driver = driver;
    }

    pub(crate) fn take_driver(&mut self) -> Option<&'static dyn Driver> {
        self.driver.take()
    }

    pub(crate) fn set_info(&mut self, info: DeviceInfo) {
        self.info = info;
    }

    /// Fresh state for a newly found device.
    pub(crate) fn arrive(&mut self, info: DeviceInfo) {
        self.valid = true;
        self.info = info;
        self.driver = None;
        self.status = [0; STATUS_WORDS];
        self.status_valid = false;
        self.missed_ticks = 0;
        self.frame.reset();
    }

    pub(crate) fn depart(&mut self) {
        self.valid = false;
        self.status_valid = false;
        self.frame.reset();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceName(u8, u8);

impl core::fmt::Display for DeviceName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", char::from(b'A' + self.0), self.1)
    }
}
