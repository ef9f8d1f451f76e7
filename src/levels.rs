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

//! Channel addressing and the dense level buffers shared between layers.

use std::sync::Arc;

use parking_lot::RwLock;

/// The highest addressable logical channel.
pub const MAX_CHANNELS: usize = 1024;

/// A DMX universe is 512 channels.
pub const UNIVERSE_SIZE: usize = 512;

/// A DMX level.
pub type Level = u8;

/// A dense level buffer indexed directly by channel number. Slot 0 is never used.
pub type ChannelBuffer = Vec<Level>;

/// Creates a zeroed channel buffer.
pub fn empty_buffer() -> ChannelBuffer {
    vec![0; MAX_CHANNELS + 1]
}

/// Returns true if the channel is in 1..=MAX_CHANNELS.
pub fn is_valid_channel(channel: u16) -> bool {
    channel >= 1 && usize::from(channel) <= MAX_CHANNELS
}

/// Iterates over every addressable channel.
pub fn all_channels() -> impl Iterator<Item = u16> {
    1..=(MAX_CHANNELS as u16)
}

/// Rounds and clamps a floating point level into DMX range.
pub fn to_level(value: f64) -> Level {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, f64::from(u8::MAX)) as Level
}

/// A layer's published levels. The owning writer builds a complete buffer and swaps
/// it in, so readers only ever see a whole recompute pass.
#[derive(Clone)]
pub struct LayerBuffer {
    published: Arc<RwLock<Arc<ChannelBuffer>>>,
}

impl LayerBuffer {
    /// Creates a new, dark layer buffer.
    pub fn new() -> LayerBuffer {
        LayerBuffer {
            published: Arc::new(RwLock::new(Arc::new(empty_buffer()))),
        }
    }

    /// Publishes a new set of levels.
    pub fn publish(&self, levels: ChannelBuffer) {
        debug_assert_eq!(levels.len(), MAX_CHANNELS + 1);
        *self.published.write() = Arc::new(levels);
    }

    /// Publishes a dark buffer.
    pub fn clear(&self) {
        self.publish(empty_buffer());
    }

    /// Gets the most recently published levels.
    pub fn snapshot(&self) -> Arc<ChannelBuffer> {
        self.published.read().clone()
    }

    /// Gets the published level of a single channel.
    pub fn get(&self, channel: u16) -> Level {
        self.published
            .read()
            .get(usize::from(channel))
            .copied()
            .unwrap_or(0)
    }
}

impl Default for LayerBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_level() {
        assert_eq!(0, to_level(-3.0));
        assert_eq!(0, to_level(f64::NAN));
        assert_eq!(128, to_level(127.5));
        assert_eq!(255, to_level(300.0));
    }

    #[test]
    fn test_valid_channels() {
        assert!(!is_valid_channel(0));
        assert!(is_valid_channel(1));
        assert!(is_valid_channel(1024));
        assert!(!is_valid_channel(1025));
        assert_eq!(MAX_CHANNELS, all_channels().count());
    }

    #[test]
    fn test_snapshot_survives_publish() {
        let layer = LayerBuffer::new();
        let mut levels = empty_buffer();
        levels[3] = 200;
        layer.publish(levels);

        let before = layer.snapshot();
        layer.clear();

        // A snapshot taken before the swap is unaffected by later publishes.
        assert_eq!(200, before[3]);
        assert_eq!(0, layer.get(3));
        assert_eq!(0, layer.get(5000));
    }
}
