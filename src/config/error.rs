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

/// Problems reading the console configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The YAML could not be read or does not describe a console.
    #[error("unable to load console config: {0}")]
    Load(#[from] config::ConfigError),
    /// The tick is not a duration such as "25ms".
    #[error("invalid tick: {0}")]
    Duration(#[from] duration_string::Error),
}
