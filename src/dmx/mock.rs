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

use parking_lot::Mutex;

use crate::levels::UNIVERSE_SIZE;

use super::Transport;

/// A sent frame.
#[derive(Clone, Debug)]
pub struct SentFrame {
    pub universe: u16,
    pub frame: [u8; UNIVERSE_SIZE],
}

/// Records every frame sent through it.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentFrame>>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    /// Get the number of frames sent.
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Get the last frame sent to a universe.
    pub fn last_frame(&self, universe: u16) -> Option<[u8; UNIVERSE_SIZE]> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|sent| sent.universe == universe)
            .map(|sent| sent.frame)
    }

    /// Get the level last sent to a 1-based output.
    pub fn output(&self, universe: u16, output: u16) -> u8 {
        self.last_frame(universe)
            .and_then(|frame| frame.get(usize::from(output) - 1).copied())
            .unwrap_or(0)
    }

    /// Get the universes sent to, in order.
    pub fn universes(&self) -> Vec<u16> {
        self.sent.lock().iter().map(|sent| sent.universe).collect()
    }

    /// Clear all sent frames.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for MockTransport {
    fn send(&self, universe: u16, frame: &[u8; UNIVERSE_SIZE]) {
        self.sent.lock().push(SentFrame {
            universe,
            frame: *frame,
        });
    }
}
