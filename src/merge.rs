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

//! Highest-level-wins resolution of every layer into per-universe DMX frames.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::curve::Curves;
use crate::levels::{is_valid_channel, to_level, ChannelBuffer, Level, UNIVERSE_SIZE};
use crate::patch::{Address, Patch};

/// Resolves one channel. A user override replaces the sequence level unless a Go is
/// in flight; faders and independents can only raise the result.
pub fn resolve_level(
    base: Level,
    user: Option<Level>,
    on_go: bool,
    fader: Level,
    independent: Level,
) -> Level {
    let base = match user {
        Some(user) if !on_go => user,
        _ => base,
    };
    base.max(fader).max(independent)
}

/// Read-only views of every layer taken for one merge pass.
pub struct Layers<'a> {
    pub main: &'a ChannelBuffer,
    pub main_scale: f64,
    pub user: &'a [Option<Level>],
    pub on_go: bool,
    pub faders: Vec<Arc<ChannelBuffer>>,
    pub independents: &'a ChannelBuffer,
}

impl Layers<'_> {
    /// The resolved level of a channel, before any output curve.
    pub fn level(&self, channel: u16) -> Level {
        debug_assert!(is_valid_channel(channel), "channel {channel} reached the merge");
        if !is_valid_channel(channel) {
            return 0;
        }

        let index = usize::from(channel);
        let base = self.main.get(index).copied().unwrap_or(0);
        let base = if self.main_scale < 1.0 {
            to_level(f64::from(base) * self.main_scale)
        } else {
            base
        };
        let user = self.user.get(index).copied().flatten();
        let fader = self
            .faders
            .iter()
            .filter_map(|dmx| dmx.get(index))
            .copied()
            .max()
            .unwrap_or(0);
        let independent = self.independents.get(index).copied().unwrap_or(0);
        resolve_level(base, user, self.on_go, fader, independent)
    }
}

/// The output frame of every universe, with the universes changed since the last send.
pub struct Frames {
    frames: BTreeMap<u16, [u8; UNIVERSE_SIZE]>,
    dirty: BTreeSet<u16>,
}

impl Frames {
    /// Creates dark frames for the given universes.
    pub fn new(universes: &[u16]) -> Frames {
        Frames {
            frames: universes
                .iter()
                .map(|universe| (*universe, [0; UNIVERSE_SIZE]))
                .collect(),
            dirty: universes.iter().copied().collect(),
        }
    }

    /// Gets a universe frame.
    pub fn frame(&self, universe: u16) -> Option<&[u8; UNIVERSE_SIZE]> {
        self.frames.get(&universe)
    }

    /// Gets the output level at an address.
    pub fn get(&self, address: Address) -> u8 {
        self.frames
            .get(&address.universe)
            .zip(address.slot())
            .and_then(|(frame, slot)| frame.get(slot))
            .copied()
            .unwrap_or(0)
    }

    /// Writes an output level, marking its universe dirty if it changed.
    pub fn write(&mut self, address: Address, level: u8) {
        let Some(frame) = self.frames.get_mut(&address.universe) else {
            return;
        };
        if let Some(slot) = address.slot().and_then(|slot| frame.get_mut(slot)) {
            if *slot != level {
                *slot = level;
                self.dirty.insert(address.universe);
            }
        }
    }

    /// Darkens every frame and marks them all dirty.
    pub fn clear(&mut self) {
        for frame in self.frames.values_mut() {
            frame.fill(0);
        }
        self.mark_all_dirty();
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.extend(self.frames.keys().copied());
    }

    /// Takes the universes that changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<u16> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }
}

/// Merges the given channels into the frames. Each resolved level is passed through the
/// curve of every output the channel is patched to.
pub fn merge_channels<I>(
    frames: &mut Frames,
    patch: &Patch,
    curves: &Curves,
    layers: &Layers,
    channels: I,
) where
    I: IntoIterator<Item = u16>,
{
    for channel in channels {
        let outputs = patch.outputs_of(channel);
        if outputs.is_empty() {
            continue;
        }
        let level = layers.level(channel);
        for address in outputs {
            let curve = patch.binding(*address).map_or(0, |binding| binding.curve);
            frames.write(*address, curves.apply(curve, level));
        }
    }
}

/// Rebuilds every frame from scratch.
pub fn merge_all(frames: &mut Frames, patch: &Patch, curves: &Curves, layers: &Layers) {
    frames.clear();
    for (address, binding) in patch.iter() {
        let level = layers.level(binding.channel);
        frames.write(address, curves.apply(binding.curve, level));
    }
}
