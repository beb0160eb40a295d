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

//! Packed binary-coded decimal, two digits per byte.

/// Encodes `value` (0..=99) as one BCD byte.
pub const fn to_bcd(value: u8) -> u8 {
    debug_assert!(value < 100);
    ((value / 10) << 4) | (value % 10)
}

/// Decodes one BCD byte. Returns `None` if either nibble is not a decimal digit.
pub const fn from_bcd(value: u8) -> Option<u8> {
    let hi = value >> 4;
    let lo = value & 0x0f;
    if hi > 9 || lo > 9 {
        return None;
    }

    Some(hi * 10 + lo)
}

pub const fn is_bcd(value: u8) -> bool {
    from_bcd(value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_two_digit_number_survives() {
        for n in 0..100u8 {
            assert_eq!(from_bcd(to_bcd(n)), Some(n));
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(to_bcd(0), 0x00);
        assert_eq!(to_bcd(9), 0x09);
        assert_eq!(to_bcd(10), 0x10);
        assert_eq!(to_bcd(59), 0x59);
        assert_eq!(to_bcd(99), 0x99);
    }

    #[test]
    fn rejects_hex_nibbles() {
        assert_eq!(from_bcd(0x1a), None);
        assert_eq!(from_bcd(0xa1), None);
        assert!(!is_bcd(0xff));
        assert!(is_bcd(0x42));
    }
}
