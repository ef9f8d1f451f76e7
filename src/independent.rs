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

use crate::error::ShowError;
use crate::levels::{empty_buffer, to_level, ChannelBuffer, Level};

/// An always-on override layer. Independents are never recorded into cues.
#[derive(Clone, Debug)]
pub struct Independent {
    number: u32,
    text: String,
    level: f64,
    levels: BTreeMap<u16, Level>,
    dmx: BTreeMap<u16, Level>,
}

impl Independent {
    /// Creates a new independent at level 0.
    pub fn new(number: u32, text: &str, levels: BTreeMap<u16, Level>) -> Independent {
        Independent {
            number,
            text: text.to_string(),
            level: 0.0,
            levels,
            dmx: BTreeMap::new(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The level, 0..255.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// The full-level content.
    pub fn levels(&self) -> &BTreeMap<u16, Level> {
        &self.levels
    }

    /// The current contribution of each channel.
    pub fn dmx(&self) -> &BTreeMap<u16, Level> {
        &self.dmx
    }

    fn set_level(&mut self, level: f64) {
        self.level = if level.is_finite() {
            level.clamp(0.0, 255.0)
        } else {
            0.0
        };
        let scale = self.level / 255.0;
        self.dmx = self
            .levels
            .iter()
            .map(|(channel, level)| (*channel, to_level(f64::from(*level) * scale)))
            .collect();
    }
}

/// Every independent plus their per-channel maximum.
pub struct Independents {
    items: BTreeMap<u32, Independent>,
    dmx: ChannelBuffer,
}

impl Independents {
    pub fn new() -> Independents {
        Independents {
            items: BTreeMap::new(),
            dmx: empty_buffer(),
        }
    }

    /// Adds or replaces an independent. Returns the channels whose aggregate changed.
    pub fn insert(&mut self, independent: Independent) -> Vec<u16> {
        let mut channels: Vec<u16> = independent.levels.keys().copied().collect();
        if let Some(previous) = self.items.insert(independent.number, independent) {
            channels.extend(previous.levels.keys());
        }
        self.refresh(channels)
    }

    /// Removes an independent. Returns the channels whose aggregate changed.
    pub fn remove(&mut self, number: u32) -> Result<Vec<u16>, ShowError> {
        let removed = self
            .items
            .remove(&number)
            .ok_or(ShowError::UnknownIndependent(number))?;
        Ok(self.refresh(removed.levels.keys().copied().collect()))
    }

    pub fn get(&self, number: u32) -> Option<&Independent> {
        self.items.get(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Independent> {
        self.items.values()
    }

    /// Sets an independent's level, 0..255. Returns only the channels whose aggregate
    /// level changed, which are the only ones needing a merge.
    pub fn set_level(&mut self, number: u32, level: f64) -> Result<Vec<u16>, ShowError> {
        let independent = self
            .items
            .get_mut(&number)
            .ok_or(ShowError::UnknownIndependent(number))?;
        independent.set_level(level);
        let channels = independent.levels.keys().copied().collect();
        Ok(self.refresh(channels))
    }

    /// The aggregate level of a channel.
    pub fn level(&self, channel: u16) -> Level {
        self.dmx.get(usize::from(channel)).copied().unwrap_or(0)
    }

    /// The aggregate buffer.
    pub fn dmx(&self) -> &ChannelBuffer {
        &self.dmx
    }

    /// Removes every independent.
    pub fn clear(&mut self) -> Vec<u16> {
        let channels = self
            .items
            .values()
            .flat_map(|independent| independent.levels.keys().copied())
            .collect();
        self.items.clear();
        self.refresh(channels)
    }

    fn refresh(&mut self, mut channels: Vec<u16>) -> Vec<u16> {
        channels.sort_unstable();
        channels.dedup();
        channels.retain(|channel| {
            let level = self
                .items
                .values()
                .filter_map(|independent| independent.dmx.get(channel))
                .copied()
                .max()
                .unwrap_or(0);
            match self.dmx.get_mut(usize::from(*channel)) {
                Some(slot) if *slot != level => {
                    *slot = level;
                    true
                }
                _ => false,
            }
        });
        channels
    }
}

impl Default for Independents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn independents() -> Independents {
        let mut independents = Independents::new();
        independents.insert(Independent::new(
            1,
            "house",
            BTreeMap::from([(1, 255), (2, 100)]),
        ));
        independents.insert(Independent::new(2, "work", BTreeMap::from([(2, 200)])));
        independents
    }

    #[test]
    fn test_scaled_by_level() -> Result<(), ShowError> {
        let mut independents = independents();
        assert_eq!(0, independents.level(1));

        let changed = independents.set_level(1, 127.5)?;
        assert_eq!(vec![1, 2], changed);
        assert_eq!(128, independents.level(1));
        assert_eq!(50, independents.level(2));
        Ok(())
    }

    #[test]
    fn test_aggregate_is_max() -> Result<(), ShowError> {
        let mut independents = independents();
        independents.set_level(1, 255.0)?;
        independents.set_level(2, 255.0)?;
        assert_eq!(200, independents.level(2));

        // Dropping the lower independent changes nothing on stage.
        assert!(independents.set_level(1, 0.0)?.contains(&1));
        assert_eq!(200, independents.level(2));

        assert_eq!(vec![2], independents.set_level(2, 0.0)?);
        assert_eq!(0, independents.level(2));
        Ok(())
    }

    #[test]
    fn test_only_changed_channels_are_dirty() -> Result<(), ShowError> {
        let mut independents = independents();
        independents.set_level(2, 255.0)?;
        // Channel 2 stays at 200 because independent 2 is higher.
        assert_eq!(vec![1], independents.set_level(1, 255.0)?);
        assert!(independents.set_level(1, 255.0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_level_is_clamped() -> Result<(), ShowError> {
        let mut independents = independents();
        independents.set_level(1, 1000.0)?;
        assert_eq!(255.0, independents.get(1).unwrap().level());
        independents.set_level(1, f64::NAN)?;
        assert_eq!(0.0, independents.get(1).unwrap().level());
        Ok(())
    }

    #[test]
    fn test_unknown_and_remove() -> Result<(), ShowError> {
        let mut independents = independents();
        assert_eq!(
            Err(ShowError::UnknownIndependent(9)),
            independents.set_level(9, 1.0)
        );
        independents.set_level(1, 255.0)?;
        assert_eq!(vec![1, 2], independents.remove(1)?);
        assert_eq!(0, independents.level(1));
        assert!(independents.remove(1).is_err());
        Ok(())
    }
}
