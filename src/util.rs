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

use crate::levels::Level;

/// Formats a level for display, either as 0-255 or as a 0-100 percentage.
pub fn format_level(level: Level, percent_mode: bool) -> String {
    if percent_mode {
        format!("{}%", (f64::from(level) / 2.55).round() as u8)
    } else {
        level.to_string()
    }
}

/// Outputs a cue memory address, dropping the fraction for whole memories.
pub fn format_memory(memory: f64) -> String {
    if memory.fract() == 0.0 {
        format!("{}", memory as i64)
    } else {
        format!("{}", memory)
    }
}

/// Outputs a time in seconds, the way step timings are displayed.
pub fn format_seconds(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = seconds - (minutes as f64) * 60.0;
    if minutes > 0 {
        format!("{}:{:04.1}", minutes, secs)
    } else {
        format!("{:.1}", secs)
    }
}
