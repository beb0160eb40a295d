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

//! Card timestamps: eight BCD bytes.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use core::fmt;
use utils::bcd::{from_bcd, to_bcd};

pub const TIMESTAMP_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub century: u8,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 is Monday.
    pub weekday: u8,
}

impl Timestamp {
    /// Saturday 2000-01-01 00:00:00, used when no clock is available.
    pub const Y2K: Self = Self {
        century: 0x20,
        year: 0x00,
        month: 0x01,
        day: 0x01,
        hour: 0x00,
        minute: 0x00,
        second: 0x00,
        weekday: 0x05,
    };

    pub fn from_bytes(raw: &[u8; TIMESTAMP_SIZE]) -> Self {
        Self {
            century: raw[0],
            year: raw[1],
            month: raw[2],
            day: raw[3],
            hour: raw[4],
            minute: raw[5],
            second: raw[6],
            weekday: raw[7],
        }
    }

    pub fn to_bytes(&self) -> [u8; TIMESTAMP_SIZE] {
        [
            self.century,
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.weekday,
        ]
    }

    /// `None` outside years 1900..=9999, which the century byte cannot hold.
    pub fn from_datetime(time: &NaiveDateTime) -> Option<Self> {
        let year = u32::try_from(time.year()).ok()?;
        if !(1900..=9999).contains(&year) {
            return None;
        }

        Some(Self {
            century: to_bcd((19 + (year - 1900) / 100) as u8),
            year: to_bcd((year % 100) as u8),
            month: to_bcd(time.month() as u8),
            day: to_bcd(time.day() as u8),
            hour: to_bcd(time.hour() as u8),
            minute: to_bcd(time.minute() as u8),
            second: to_bcd(time.second() as u8),
            weekday: to_bcd(time.weekday().num_days_from_monday() as u8),
        })
    }

    /// `None` if a field is not BCD or the date does not exist.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let year = i32::from(from_bcd(self.century)?) * 100 + i32::from(from_bcd(self.year)?);
        NaiveDate::from_ymd_opt(
            year,
            u32::from(from_bcd(self.month)?),
            u32::from(from_bcd(self.day)?),
        )?
        .and_hms_opt(
            u32::from(from_bcd(self.hour)?),
            u32::from(from_bcd(self.minute)?),
            u32::from(from_bcd(self.second)?),
        )
    }

    pub fn from_unix(seconds: i64) -> Option<Self> {
        Self::from_datetime(&DateTime::from_timestamp(seconds, 0)?.naive_utc())
    }

    pub fn to_unix(&self) -> Option<i64> {
        Some(self.to_datetime()?.and_utc().timestamp())
    }

    pub fn weekday(&self) -> Option<Weekday> {
        match from_bcd(self.weekday)? {
            0 => Some(Weekday::Mon),
            1 => Some(Weekday::Tue),
            2 => Some(Weekday::Wed),
            3 => Some(Weekday::Thu),
            4 => Some(Weekday::Fri),
            5 => Some(Weekday::Sat),
            6 => Some(Weekday::Sun),
            _ => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}{:02x}-{:02x}-{:02x} {:02x}:{:02x}:{:02x}",
            self.century, self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
