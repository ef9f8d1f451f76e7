// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::path::Path;

use tracing::info;

use crate::LightShow;

mod console;
mod error;
pub mod show;

pub use self::console::{Console, Universe, DEFAULT_OLA_PORT};
pub use self::error::ConfigError;
pub use self::show::ShowFile;

/// Loads a show file into the show.
pub fn load_show(light_show: &mut LightShow, path: &Path) -> Result<(), Box<dyn Error>> {
    let show = ShowFile::load(path)?;
    light_show.import(&show)?;
    info!(path = %path.display(), "Loaded show");
    Ok(())
}

/// Saves the show to a file.
pub fn save_show(light_show: &LightShow, path: &Path) -> Result<(), Box<dyn Error>> {
    light_show.export().save(path)?;
    info!(path = %path.display(), "Saved show");
    Ok(())
}
