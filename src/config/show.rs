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

//! The JSON show file. Everything here is plain data; [crate::LightShow] validates and
//! applies it.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cue::{ChannelTime, Timing};
use crate::curve::CurveKind;
use crate::fader::FaderSource;
use crate::levels::Level;

/// A whole show.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowFile {
    pub curves: Vec<CurveEntry>,
    pub patch: Vec<PatchEntry>,
    pub cues: Vec<CueEntry>,
    pub groups: Vec<GroupEntry>,
    pub main_playback: Vec<StepEntry>,
    pub chasers: Vec<ChaserEntry>,
    pub faders: Vec<FaderEntry>,
    pub independents: Vec<IndependentEntry>,
}

impl ShowFile {
    /// Loads a show from a JSON file.
    pub fn load(path: &Path) -> Result<ShowFile, Box<dyn Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("error reading show {}: {}", path.display(), e))?;
        serde_json::from_str(&contents)
            .map_err(|e| format!("error parsing show {}: {}", path.display(), e).into())
    }

    /// Saves the show to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// A user curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveEntry {
    pub id: usize,
    pub name: String,
    pub kind: CurveKind,
}

/// One patched output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub channel: u16,
    pub universe: u16,
    pub output: u16,
    #[serde(default)]
    pub curve: usize,
}

/// A recorded memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CueEntry {
    pub memory: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channels: BTreeMap<u16, Level>,
}

/// A step with its cue inline. Missing timings default to 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepEntry {
    pub memory: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channels: BTreeMap<u16, Level>,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub channel_time: BTreeMap<u16, ChannelTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChaserEntry {
    pub index: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub steps: Vec<StepEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub index: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channels: BTreeMap<u16, Level>,
}

/// A fader slot and what it holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaderEntry {
    pub page: usize,
    pub index: usize,
    #[serde(default)]
    pub level: f64,
    pub content: FaderSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndependentEntry {
    pub number: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub level: f64,
    #[serde(default)]
    pub channels: BTreeMap<u16, Level>,
}
