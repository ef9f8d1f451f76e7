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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::curve::LINEAR_CURVE;
use crate::error::ShowError;
use crate::levels::{is_valid_channel, MAX_CHANNELS, UNIVERSE_SIZE};

/// A physical DMX address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub universe: u16,
    /// The 1-based output within the universe.
    pub output: u16,
}

impl Address {
    pub fn new(universe: u16, output: u16) -> Address {
        Address { universe, output }
    }

    /// The 0-based slot of this address within its universe frame. Output 0 has none.
    pub fn slot(&self) -> Option<usize> {
        usize::from(self.output).checked_sub(1)
    }
}

/// What drives an output: the channel and the curve applied on the way out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputBinding {
    pub channel: u16,
    pub curve: usize,
}

/// The channel to output binding table. Both directions are updated together so
/// every output listed for a channel points back at that channel.
pub struct Patch {
    universes: Vec<u16>,
    channels: Vec<Vec<Address>>,
    outputs: BTreeMap<Address, OutputBinding>,
}

impl Patch {
    /// Creates an empty patch over the given universes.
    pub fn new(universes: Vec<u16>) -> Patch {
        Patch {
            universes,
            channels: vec![Vec::new(); MAX_CHANNELS + 1],
            outputs: BTreeMap::new(),
        }
    }

    /// Gets the universes outputs can be patched into.
    pub fn universes(&self) -> &[u16] {
        &self.universes
    }

    /// Checks that a channel and address can be patched together.
    pub fn validate(&self, channel: u16, output: u16, universe: u16) -> Result<(), ShowError> {
        if !is_valid_channel(channel) {
            return Err(ShowError::InvalidChannel(channel));
        }
        if output == 0 || usize::from(output) > UNIVERSE_SIZE {
            return Err(ShowError::InvalidOutput(output));
        }
        if !self.universes.contains(&universe) {
            return Err(ShowError::InvalidUniverse(universe));
        }
        Ok(())
    }

    /// Patches a channel to an output, unpatching whatever channel drove that output
    /// before.
    pub fn add_output(
        &mut self,
        channel: u16,
        output: u16,
        universe: u16,
        curve: usize,
    ) -> Result<(), ShowError> {
        self.validate(channel, output, universe)?;

        let address = Address::new(universe, output);
        self.remove_output(output, universe);

        self.channels[usize::from(channel)].push(address);
        self.outputs.insert(address, OutputBinding { channel, curve });
        debug!(channel, universe, output, curve, "Patched output");
        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// Unpatches an output, returning the channel that drove it.
    pub fn remove_output(&mut self, output: u16, universe: u16) -> Option<u16> {
        let address = Address::new(universe, output);
        let binding = self.outputs.remove(&address)?;
        if let Some(addresses) = self.channels.get_mut(usize::from(binding.channel)) {
            addresses.retain(|a| *a != address);
        }
        Some(binding.channel)
    }

    /// Unpatches every output driven by a channel.
    pub fn unpatch_channel(&mut self, channel: u16) {
        let Some(addresses) = self.channels.get_mut(usize::from(channel)) else {
            return;
        };
        for address in addresses.drain(..) {
            self.outputs.remove(&address);
        }
    }

    /// Sets the curve of a patched output.
    pub fn set_curve(&mut self, output: u16, universe: u16, curve: usize) -> Result<(), ShowError> {
        match self.outputs.get_mut(&Address::new(universe, output)) {
            Some(binding) => {
                binding.curve = curve;
                Ok(())
            }
            None => Err(ShowError::InvalidOutput(output)),
        }
    }

    /// Resets every output using the curve back to the linear curve, returning how many
    /// outputs changed.
    pub fn reset_curve(&mut self, curve: usize) -> usize {
        let mut count = 0;
        for binding in self.outputs.values_mut() {
            if binding.curve == curve {
                binding.curve = LINEAR_CURVE;
                count += 1;
            }
        }
        count
    }

    /// Returns true if the channel drives at least one output.
    pub fn is_patched(&self, channel: u16) -> bool {
        self.channels
            .get(usize::from(channel))
            .is_some_and(|addresses| !addresses.is_empty())
    }

    /// Gets the outputs driven by a channel, in the order they were patched.
    pub fn outputs_of(&self, channel: u16) -> &[Address] {
        self.channels
            .get(usize::from(channel))
            .map_or(&[], |addresses| addresses.as_slice())
    }

    /// Gets the channel driving an output, if it is patched.
    pub fn channel_of(&self, output: u16, universe: u16) -> Option<u16> {
        self.outputs
            .get(&Address::new(universe, output))
            .map(|binding| binding.channel)
    }

    /// Gets the binding for an output.
    pub fn binding(&self, address: Address) -> Option<OutputBinding> {
        self.outputs.get(&address).copied()
    }

    /// Iterates over every patched output in address order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, OutputBinding)> + '_ {
        self.outputs.iter().map(|(a, b)| (*a, *b))
    }

    /// Unpatches everything.
    pub fn patch_empty(&mut self) {
        self.outputs.clear();
        self.channels.iter_mut().for_each(|addresses| addresses.clear());
    }

    /// Patches channel n to output n, filling the configured universes in order.
    pub fn patch_1on1(&mut self) {
        self.patch_empty();
        for (index, universe) in self.universes.iter().enumerate() {
            for slot in 0..UNIVERSE_SIZE {
                let channel = index * UNIVERSE_SIZE + slot + 1;
                if channel > MAX_CHANNELS {
                    return;
                }
                let address = Address::new(*universe, (slot + 1) as u16);
                self.channels[channel].push(address);
                self.outputs.insert(
                    address,
                    OutputBinding {
                        channel: channel as u16,
                        curve: LINEAR_CURVE,
                    },
                );
            }
        }
    }

    /// Checks that both directions of the patch agree.
    pub fn is_consistent(&self) -> bool {
        let forward = self
            .channels
            .iter()
            .enumerate()
            .all(|(channel, addresses)| {
                addresses.iter().all(|address| {
                    self.outputs
                        .get(address)
                        .is_some_and(|b| usize::from(b.channel) == channel)
                })
            });
        let reverse = self.outputs.iter().all(|(address, binding)| {
            self.outputs_of(binding.channel).contains(address)
        });
        forward && reverse
    }
}
