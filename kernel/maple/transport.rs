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
use super::error::BusError;
use super::proto::{Header, MAX_FRAME_WORDS};

/// Moves a batch of frames over the wire.
///
/// The bus calls [`Transport::begin`], pushes every queued frame, then
/// [`Transport::start`]. Once the batch is done, [`Maple::complete`] reads
/// the replies back in push order.
pub trait Transport: Sync {
    fn begin(&self);

    fn push(&self, header: Header, payload: &[u32]) -> Result<(), BusError>;

    fn start(&self);

    /// Copies the reply to the `index`th pushed frame, returning the
    /// number of words including the header. Zero means nothing arrived.
    fn response(&self, index: usize, buffer: &mut [u32; MAX_FRAME_WORDS]) -> usize;

    /// Lets a transfer progress while a caller waits on it.
    fn idle(&self, bus: &Maple);
}
