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
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::levels::Level;
use crate::util::format_memory;

/// A recorded snapshot of channel levels. Only channels above zero are stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Cue {
    memory: f64,
    channels: BTreeMap<u16, Level>,
    text: String,
}

impl Cue {
    /// Creates a new cue. Zero levels are dropped.
    pub fn new(memory: f64, channels: BTreeMap<u16, Level>, text: &str) -> Cue {
        Cue {
            memory,
            channels: channels.into_iter().filter(|(_, l)| *l > 0).collect(),
            text: text.to_string(),
        }
    }

    /// The "nothing loaded" cue that sits at position 0 of every sequence.
    pub fn sentinel() -> Cue {
        Cue::new(0.0, BTreeMap::new(), "")
    }

    /// Gets the memory address of the cue.
    pub fn memory(&self) -> f64 {
        self.memory
    }

    /// Returns true if this is the sentinel cue.
    pub fn is_sentinel(&self) -> bool {
        self.memory == 0.0
    }

    /// Gets the cue text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Gets the non-zero channels of the cue.
    pub fn channels(&self) -> &BTreeMap<u16, Level> {
        &self.channels
    }

    /// Gets the level of a channel. Absent channels are at 0.
    pub fn level(&self, channel: u16) -> Level {
        self.channels.get(&channel).copied().unwrap_or(0)
    }

    /// Sets the level of a channel.
    pub fn set_level(&mut self, channel: u16, level: Level) {
        if level == 0 {
            self.channels.remove(&channel);
        } else {
            self.channels.insert(channel, level);
        }
    }

    /// Replaces the content of the cue, keeping its memory.
    pub fn set_channels(&mut self, channels: BTreeMap<u16, Level>) {
        self.channels = channels.into_iter().filter(|(_, l)| *l > 0).collect();
    }

    /// Sets the cue text.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} channels)",
            format_memory(self.memory),
            self.text,
            self.channels.len()
        )
    }
}

/// A per-channel delay and time override.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelTime {
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub time: f64,
}

impl ChannelTime {
    pub fn new(delay: f64, time: f64) -> ChannelTime {
        ChannelTime {
            delay: sanitize(delay),
            time: sanitize(time),
        }
    }
}

/// The step-wide timings. Every field is in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default)]
    pub time_in: f64,
    #[serde(default)]
    pub time_out: f64,
    #[serde(default)]
    pub delay_in: f64,
    #[serde(default)]
    pub delay_out: f64,
    #[serde(default)]
    pub wait: f64,
}

impl Timing {
    /// The same fade time up and down, no delays and no wait.
    pub fn fade(time: f64) -> Timing {
        Timing {
            time_in: time,
            time_out: time,
            ..Default::default()
        }
    }

    fn sanitized(self) -> Timing {
        Timing {
            time_in: sanitize(self.time_in),
            time_out: sanitize(self.time_out),
            delay_in: sanitize(self.delay_in),
            delay_out: sanitize(self.delay_out),
            wait: sanitize(self.wait),
        }
    }
}

/// Timing values are never negative or NaN; anything malformed becomes 0.
fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

/// A cue placed in a sequence with its own timings.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    cue: Arc<Cue>,
    timing: Timing,
    channel_time: BTreeMap<u16, ChannelTime>,
    total_time: f64,
}

impl Step {
    /// Creates a new step.
    pub fn new(cue: Arc<Cue>, timing: Timing) -> Step {
        let mut step = Step {
            cue,
            timing: timing.sanitized(),
            channel_time: BTreeMap::new(),
            total_time: 0.0,
        };
        step.update_total_time();
        step
    }

    /// The sentinel step at position 0 of a sequence.
    pub fn sentinel() -> Step {
        Step::new(Arc::new(Cue::sentinel()), Timing::default())
    }

    /// Gets the cue of this step.
    pub fn cue(&self) -> &Arc<Cue> {
        &self.cue
    }

    /// Replaces the cue of this step, keeping the timings.
    pub fn set_cue(&mut self, cue: Arc<Cue>) {
        self.cue = cue;
    }

    /// Gets the level of a channel in this step's cue.
    pub fn level(&self, channel: u16) -> Level {
        self.cue.level(channel)
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn time_in(&self) -> f64 {
        self.timing.time_in
    }

    pub fn time_out(&self) -> f64 {
        self.timing.time_out
    }

    pub fn delay_in(&self) -> f64 {
        self.timing.delay_in
    }

    pub fn delay_out(&self) -> f64 {
        self.timing.delay_out
    }

    pub fn wait(&self) -> f64 {
        self.timing.wait
    }

    /// Gets the per-channel time overrides.
    pub fn channel_time(&self) -> &BTreeMap<u16, ChannelTime> {
        &self.channel_time
    }

    /// The time from Go until every channel of this step has arrived.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Replaces all step-wide timings.
    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing.sanitized();
        self.update_total_time();
    }

    pub fn set_time_in(&mut self, time: f64) {
        self.timing.time_in = sanitize(time);
        self.update_total_time();
    }

    pub fn set_time_out(&mut self, time: f64) {
        self.timing.time_out = sanitize(time);
        self.update_total_time();
    }

    pub fn set_delay_in(&mut self, delay: f64) {
        self.timing.delay_in = sanitize(delay);
        self.update_total_time();
    }

    pub fn set_delay_out(&mut self, delay: f64) {
        self.timing.delay_out = sanitize(delay);
        self.update_total_time();
    }

    pub fn set_wait(&mut self, wait: f64) {
        self.timing.wait = sanitize(wait);
        self.update_total_time();
    }

    /// Overrides the delay and time of a single channel.
    pub fn set_channel_time(&mut self, channel: u16, delay: f64, time: f64) {
        self.channel_time
            .insert(channel, ChannelTime::new(delay, time));
        self.update_total_time();
    }

    /// Removes a channel override.
    pub fn remove_channel_time(&mut self, channel: u16) {
        if self.channel_time.remove(&channel).is_some() {
            self.update_total_time();
        }
    }

    /// Gets the delay and fade time that govern a channel moving in the given direction.
    pub fn channel_timing(&self, channel: u16, rising: bool) -> (f64, f64) {
        match self.channel_time.get(&channel) {
            Some(channel_time) => (channel_time.delay, channel_time.time),
            None if rising => (self.timing.delay_in, self.timing.time_in),
            None => (self.timing.delay_out, self.timing.time_out),
        }
    }

    fn update_total_time(&mut self) {
        let timing = &self.timing;
        let mut total = timing.wait
            + (timing.time_in + timing.delay_in).max(timing.time_out + timing.delay_out);
        for channel_time in self.channel_time.values() {
            total = total.max(timing.wait + channel_time.delay + channel_time.time);
        }
        self.total_time = total;
    }
}
