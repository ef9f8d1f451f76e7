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

//! Timed interpolation between two steps.
//!
//! Channels going up follow the incoming step's `delay_in`/`time_in`, channels going
//! down follow `delay_out`/`time_out`, and a per-channel override replaces both for
//! its channel. Nothing moves until the step's wait has passed.

use std::collections::BTreeSet;
use std::time::Instant;

use crate::cue::Step;
use crate::levels::{to_level, ChannelBuffer, Level};

/// The level of a channel moving from `old` to `next`, `elapsed` seconds into its own
/// fade of `fade_time` seconds (wait and delay already removed).
///
/// The up ramp is biased by +1 and the down ramp by -1 so each lands on its target at
/// exactly `fade_time` without overshooting it along the way.
pub fn ramp_level(old: Level, next: Level, fade_time: f64, elapsed: f64) -> Level {
    if elapsed < 0.0 {
        return old;
    }

    let (old_f, next_f) = (f64::from(old), f64::from(next));
    if next > old && elapsed < fade_time {
        let step = ((next_f - old_f + 1.0) / fade_time * elapsed).floor();
        (old_f + step).min(next_f) as Level
    } else if next < old && elapsed < fade_time {
        let step = ((old_f - next_f - 1.0) / fade_time * elapsed).floor();
        (old_f - step).max(next_f) as Level
    } else {
        next
    }
}

/// The level of one channel of a transition into `step`, `elapsed` seconds after Go.
pub fn channel_level(old: Level, next: Level, step: &Step, channel: u16, elapsed: f64) -> Level {
    if old == next {
        return next;
    }
    let (delay, fade_time) = step.channel_timing(channel, next > old);
    ramp_level(old, next, fade_time, elapsed - step.wait() - delay)
}

/// Levels of a chaser moving from step `from` to step `to`. The main playback's levels
/// floor both ends so a chaser never dips below what is already on stage. The result is
/// scaled by the fader level and written for the chaser's channels only.
pub fn overlay_levels(
    from: &Step,
    to: &Step,
    floor: &ChannelBuffer,
    channels: &[u16],
    elapsed: f64,
    scale: f64,
    out: &mut ChannelBuffer,
) {
    for channel in channels {
        let index = usize::from(*channel);
        let stage = floor.get(index).copied().unwrap_or(0);
        let old = from.level(*channel).max(stage);
        let next = to.level(*channel).max(stage);
        let level = channel_level(old, next, to, *channel, elapsed);
        if let Some(slot) = out.get_mut(index) {
            *slot = to_level(f64::from(level) * scale);
        }
    }
}

/// A Go (or Go Back) in flight on the main playback.
pub struct Crossfade {
    from: ChannelBuffer,
    target: usize,
    step: Step,
    channels: Vec<u16>,
    started: Instant,
}

impl Crossfade {
    /// Starts a crossfade from the levels on stage to the step at `target`. The step's
    /// timings govern the fade.
    pub fn new(from: ChannelBuffer, target: usize, step: Step, started: Instant) -> Crossfade {
        let mut channels: BTreeSet<u16> = step.cue().channels().keys().copied().collect();
        channels.extend(
            from.iter()
                .enumerate()
                .filter(|(_, level)| **level > 0)
                .map(|(channel, _)| channel as u16),
        );
        Crossfade {
            from,
            target,
            step,
            channels: channels.into_iter().collect(),
            started,
        }
    }

    /// The position the sequence lands on when this crossfade completes.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Keeps the target on the same step when a step is inserted at `position`.
    pub fn step_inserted(&mut self, position: usize) {
        if position <= self.target {
            self.target += 1;
        }
    }

    /// The step being faded in.
    pub fn step(&self) -> &Step {
        &self.step
    }

    /// The channels that change during this crossfade.
    pub fn channels(&self) -> &[u16] {
        &self.channels
    }

    /// Seconds since the Go.
    pub fn elapsed(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started).as_secs_f64()
    }

    /// Returns true once every channel has reached its target.
    pub fn is_complete(&self, elapsed: f64) -> bool {
        elapsed >= self.step.total_time()
    }

    /// Gets the level a channel is fading from.
    pub fn from_level(&self, channel: u16) -> Level {
        self.from.get(usize::from(channel)).copied().unwrap_or(0)
    }

    /// Gets the level a channel is fading to.
    pub fn next_level(&self, channel: u16) -> Level {
        self.step.level(channel)
    }

    /// Writes the level of every moving channel at `elapsed` seconds into `out`.
    pub fn levels_at(&self, elapsed: f64, out: &mut ChannelBuffer) {
        for channel in &self.channels {
            let level = channel_level(
                self.from_level(*channel),
                self.next_level(*channel),
                &self.step,
                *channel,
                elapsed,
            );
            if let Some(slot) = out.get_mut(usize::from(*channel)) {
                *slot = level;
            }
        }
    }
}
