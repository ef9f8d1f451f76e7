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
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::show::{ShowSettings, MAX_TICK, MIN_TICK};

use super::error::ConfigError;

/// The port olad listens on by default.
pub const DEFAULT_OLA_PORT: u16 = 9010;

const DEFAULT_TICK: Duration = Duration::from_millis(25);

/// A YAML representation of the console configuration.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Console {
    /// How often crossfades advance, e.g. "25ms".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tick: Option<String>,

    /// Display levels as percentages.
    #[serde(default)]
    percent_mode: bool,

    /// The port of the OLA daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ola_port: Option<u16>,

    /// The universes outputs can be patched into.
    #[serde(default = "default_universes")]
    universes: Vec<Universe>,

    /// The fade time of steps added without timings, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    fader_pages: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    faders_per_page: Option<usize>,

    /// A show file to load at start, relative to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    show: Option<String>,
}

fn default_universes() -> Vec<Universe> {
    vec![Universe::new(1, "default".to_string())]
}

impl Default for Console {
    fn default() -> Self {
        Console {
            tick: Some("25ms".to_string()),
            percent_mode: false,
            ola_port: None,
            universes: default_universes(),
            default_time: None,
            fader_pages: None,
            faders_per_page: None,
            show: Some("show.json".to_string()),
        }
    }
}

impl Console {
    /// Parses a console configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Console, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Console>()?)
    }

    /// Writes the configuration as YAML.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let serialized = serde_yml::to_string(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(serialized.as_bytes())?;
        info!(path = %path.display(), "Wrote console configuration");
        Ok(())
    }

    /// Gets the tick, clamped to 20-40ms.
    pub fn tick(&self) -> Result<Duration, ConfigError> {
        let tick = match &self.tick {
            Some(tick) => DurationString::from_string(tick.clone())?.into(),
            None => DEFAULT_TICK,
        };
        let clamped = tick.clamp(MIN_TICK, MAX_TICK);
        if clamped != tick {
            warn!(?tick, ?clamped, "Tick out of range");
        }
        Ok(clamped)
    }

    pub fn percent_mode(&self) -> bool {
        self.percent_mode
    }

    pub fn ola_port(&self) -> u16 {
        self.ola_port.unwrap_or(DEFAULT_OLA_PORT)
    }

    pub fn universes(&self) -> &[Universe] {
        &self.universes
    }

    /// Resolves the show file against the directory holding the configuration.
    pub fn show_path(&self, config_path: &Path) -> Option<PathBuf> {
        let show = Path::new(self.show.as_ref()?);
        if show.is_absolute() {
            return Some(show.to_path_buf());
        }
        Some(
            config_path
                .parent()
                .map_or_else(|| show.to_path_buf(), |dir| dir.join(show)),
        )
    }

    /// Converts the configuration into runtime settings.
    pub fn to_settings(&self) -> Result<ShowSettings, ConfigError> {
        let defaults = ShowSettings::default();
        Ok(ShowSettings {
            universes: self.universes.iter().map(Universe::universe).collect(),
            tick: self.tick()?,
            percent_mode: self.percent_mode,
            default_time: self.default_time.unwrap_or(defaults.default_time),
            fader_pages: self.fader_pages.unwrap_or(defaults.fader_pages),
            faders_per_page: self.faders_per_page.unwrap_or(defaults.faders_per_page),
        })
    }
}

/// A YAML representation of a DMX universe.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Universe {
    /// The OpenLighting universe.
    universe: u16,

    /// A name to show the operator.
    #[serde(default)]
    name: String,
}

impl Universe {
    pub fn new(universe: u16, name: String) -> Universe {
        Universe { universe, name }
    }

    /// Gets the OpenLighting universe.
    pub fn universe(&self) -> u16 {
        self.universe
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
