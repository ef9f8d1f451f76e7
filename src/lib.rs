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
pub mod config;
pub mod controller;
pub mod crossfade;
pub mod cue;
pub mod curve;
pub mod dmx;
pub mod error;
pub mod fader;
pub mod group;
pub mod independent;
pub mod levels;
pub mod merge;
pub mod patch;
pub mod playsync;
pub mod sequence;
pub mod show;
pub mod util;

#[cfg(test)]
mod testutil;

pub use error::ShowError;
pub use show::LightShow;
