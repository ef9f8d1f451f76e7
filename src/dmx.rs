// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crate::levels::UNIVERSE_SIZE;

mod engine;
#[cfg(test)]
pub(crate) mod mock;
mod ola_client;
mod thread_priority;

pub use engine::Engine;
pub use ola_client::OlaTransport;

/// Somewhere to send finished universe frames. Sends are fire-and-forget; failures are
/// the transport's to log.
pub trait Transport: Send + Sync {
    /// Sends a full frame for a universe.
    fn send(&self, universe: u16, frame: &[u8; UNIVERSE_SIZE]);
}

/// A transport that drops every frame. Used by offline commands.
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, _universe: u16, _frame: &[u8; UNIVERSE_SIZE]) {}
}
