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

/// Fixed capacity ring that overwrites its oldest element once full.
#[derive(Debug)]
pub struct RingBuffer<T, const N: usize> {
    storage: [T; N],
    len: usize,
    writer: usize,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    pub const fn new(fill: T) -> Self {
        Self {
            storage: [fill; N],
            len: 0,
            writer: 0,
        }
    }

    pub fn insert(&mut self, value: T) {
        self.storage[self.writer] = value;
        self.writer = (self.writer + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let start = (self.writer + N - self.len) % N;
        (0..self.len).map(move |i| &self.storage[(start + i) % N])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_insertion_order_after_wrapping() {
        let mut ring = RingBuffer::<u32, 4>::new(0);
        assert!(ring.is_empty());
        for i in 1..=6 {
            ring.insert(i);
        }
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), [3, 4, 5, 6]);
    }

    #[test]
    fn partial_fill() {
        let mut ring = RingBuffer::<u8, 8>::new(0);
        ring.insert(7);
        ring.insert(9);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), [7, 9]);
    }
}
