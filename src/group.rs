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

use crate::levels::Level;

/// A named set of channels at preset levels, used as fader content.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    index: f64,
    text: String,
    channels: BTreeMap<u16, Level>,
}

impl Group {
    /// Creates a new group.
    pub fn new(index: f64, text: &str, channels: BTreeMap<u16, Level>) -> Group {
        Group {
            index,
            text: text.to_string(),
            channels: channels.into_iter().filter(|(_, l)| *l > 0).collect(),
        }
    }

    pub fn index(&self) -> f64 {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn channels(&self) -> &BTreeMap<u16, Level> {
        &self.channels
    }
}
