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

//! Fader overlay layers. Each fader owns a private [LayerBuffer] that only it (or its
//! chaser thread) writes; the merge reads the published snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, span, Level as TraceLevel};

use crate::crossfade::overlay_levels;
use crate::cue::Cue;
use crate::error::ShowError;
use crate::levels::{empty_buffer, to_level, ChannelBuffer, LayerBuffer, Level};
use crate::playsync::CancelHandle;
use crate::sequence::Sequence;

/// What a fader is assigned to, by reference. Resolved against the show into a
/// [FaderContent] when assigned.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaderSource {
    #[default]
    None,
    Channels {
        channels: BTreeMap<u16, Level>,
    },
    Group {
        index: f64,
    },
    Preset {
        memory: f64,
    },
    Sequence {
        chaser: u32,
    },
    Main,
}

/// What a fader controls.
#[derive(Clone, Debug, Default)]
pub enum FaderContent {
    #[default]
    None,
    /// Individual channels at fixed levels.
    Channels(BTreeMap<u16, Level>),
    /// A group's channels.
    Group {
        index: f64,
        channels: BTreeMap<u16, Level>,
    },
    /// A recorded cue.
    Preset(Arc<Cue>),
    /// A chaser, run in its own loop while the fader is up.
    Sequence(Arc<Sequence>),
    /// The main playback. Scales the sequence layer instead of adding to it.
    Main,
}

impl FaderContent {
    /// The full-level contribution of the content, for static content types.
    fn levels(&self) -> Option<&BTreeMap<u16, Level>> {
        match self {
            FaderContent::Channels(channels) => Some(channels),
            FaderContent::Group { channels, .. } => Some(channels),
            FaderContent::Preset(cue) => Some(cue.channels()),
            FaderContent::None | FaderContent::Sequence(_) | FaderContent::Main => None,
        }
    }

    /// The reference this content was resolved from.
    pub fn source(&self) -> FaderSource {
        match self {
            FaderContent::None => FaderSource::None,
            FaderContent::Channels(channels) => FaderSource::Channels {
                channels: channels.clone(),
            },
            FaderContent::Group { index, .. } => FaderSource::Group { index: *index },
            FaderContent::Preset(cue) => FaderSource::Preset {
                memory: cue.memory(),
            },
            FaderContent::Sequence(sequence) => FaderSource::Sequence {
                chaser: sequence.index(),
            },
            FaderContent::Main => FaderSource::Main,
        }
    }

    /// Every channel the content can touch.
    pub fn channels(&self) -> BTreeSet<u16> {
        match self {
            FaderContent::Sequence(sequence) => sequence.channels(),
            content => content
                .levels()
                .map(|levels| levels.keys().copied().collect())
                .unwrap_or_default(),
        }
    }
}

/// A single fader.
pub struct Fader {
    content: FaderContent,
    level: f64,
    dmx: LayerBuffer,
    runner: Option<ChaserRunner>,
}

impl Fader {
    /// Creates a fader holding the given content. Main faders start at full so a fresh
    /// show is not blacked out.
    pub fn new(content: FaderContent) -> Fader {
        let level = match content {
            FaderContent::Main => 1.0,
            _ => 0.0,
        };
        Fader {
            content,
            level,
            dmx: LayerBuffer::new(),
            runner: None,
        }
    }

    pub fn content(&self) -> &FaderContent {
        &self.content
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Gets the fader's published levels.
    pub fn dmx(&self) -> &LayerBuffer {
        &self.dmx
    }

    /// Returns true while a chaser loop is writing this fader's buffer.
    pub fn is_running(&self) -> bool {
        self.runner.is_some()
    }

    /// Returns true if the fader currently adds anything to the merge.
    pub fn is_active(&self) -> bool {
        self.level > 0.0 && !matches!(self.content, FaderContent::None | FaderContent::Main)
    }

    /// Sets the fader level, clamped to 0..1, and recomputes its buffer. A sequence
    /// fader starts its chaser when raised from 0 and stops it when brought back to 0.
    pub fn set_level(&mut self, level: f64, floor: &LayerBuffer, tick: Duration) {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.level = level;

        let FaderContent::Sequence(sequence) = &self.content else {
            self.recompute_dmx();
            return;
        };
        let sequence = sequence.clone();

        if level == 0.0 {
            self.stop();
        } else if let Some(runner) = &self.runner {
            runner.set_level(level);
        } else {
            self.runner =
                ChaserRunner::start(sequence, level, self.dmx.clone(), floor.clone(), tick);
        }
    }

    /// Rebuilds the buffer from the content and level: `dmx[c] = round(content[c] * level)`.
    pub fn recompute_dmx(&self) {
        let mut dmx = empty_buffer();
        if let Some(levels) = self.content.levels() {
            for (channel, level) in levels {
                if let Some(slot) = dmx.get_mut(usize::from(*channel)) {
                    *slot = to_level(f64::from(*level) * self.level);
                }
            }
        }
        self.dmx.publish(dmx);
    }

    /// Stops a running chaser, waiting for its thread to exit, and darkens the fader.
    pub fn stop(&mut self) {
        if let Some(mut runner) = self.runner.take() {
            runner.stop();
        }
        self.dmx.clear();
    }
}

impl Drop for Fader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The background loop driving a chaser fader.
pub struct ChaserRunner {
    cancel_handle: CancelHandle,
    level: Arc<AtomicU64>,
    join_handle: Option<JoinHandle<()>>,
}

impl ChaserRunner {
    /// Starts cycling the sequence into the given buffer. Returns None if the sequence
    /// has nothing to cycle through.
    fn start(
        sequence: Arc<Sequence>,
        level: f64,
        dmx: LayerBuffer,
        floor: LayerBuffer,
        tick: Duration,
    ) -> Option<ChaserRunner> {
        if sequence.next_position().is_none() {
            debug!(chaser = sequence.index(), "Chaser has no steps, not starting");
            return None;
        }

        let cancel_handle = CancelHandle::new();
        let shared_level = Arc::new(AtomicU64::new(level.to_bits()));
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            let shared_level = shared_level.clone();
            thread::spawn(move || {
                let span = span!(TraceLevel::INFO, "chaser", index = sequence.index());
                let _enter = span.enter();
                info!(text = sequence.text(), "Chaser started.");

                ChaserRunner::run(&sequence, &shared_level, &dmx, &floor, tick, &cancel_handle);

                info!("Chaser stopped.");
            })
        };

        Some(ChaserRunner {
            cancel_handle,
            level: shared_level,
            join_handle: Some(join_handle),
        })
    }

    fn run(
        sequence: &Sequence,
        level: &AtomicU64,
        dmx: &LayerBuffer,
        floor: &LayerBuffer,
        tick: Duration,
        cancel_handle: &CancelHandle,
    ) {
        let channels: Vec<u16> = sequence.channels().into_iter().collect();
        let mut position = sequence.position();
        let mut buffer = empty_buffer();

        while let Some(next) = sequence.next_after(position) {
            let (Some(from), Some(to)) = (sequence.step(position), sequence.step(next)) else {
                return;
            };
            let started = Instant::now();
            let mut last_time = started;

            loop {
                let elapsed = last_time.saturating_duration_since(started).as_secs_f64();
                let scale = f64::from_bits(level.load(Ordering::Relaxed));
                let stage = floor.snapshot();
                overlay_levels(from, to, &stage, &channels, elapsed, scale, &mut buffer);
                dmx.publish(buffer.clone());

                if elapsed >= to.total_time() {
                    break;
                }
                last_time += tick;
                if cancel_handle.wait_timeout(last_time.saturating_duration_since(Instant::now())) {
                    return;
                }
            }

            position = next;
            if cancel_handle.wait_timeout(tick) {
                return;
            }
        }
    }

    /// Updates the scale the loop applies to its levels.
    pub fn set_level(&self, level: f64) {
        self.level.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Cancels the loop and waits for it to exit.
    pub fn stop(&mut self) {
        self.cancel_handle.cancel();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Error joining chaser thread");
            }
        }
    }
}

impl Drop for ChaserRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pages of faders.
pub struct FaderBank {
    pages: Vec<Vec<Fader>>,
    floor: LayerBuffer,
    tick: Duration,
}

impl FaderBank {
    /// Creates a bank of empty faders. Chasers are floored by the levels published to
    /// `floor` and advance once per `tick`.
    pub fn new(pages: usize, per_page: usize, floor: LayerBuffer, tick: Duration) -> FaderBank {
        FaderBank {
            pages: (0..pages)
                .map(|_| (0..per_page).map(|_| Fader::new(FaderContent::None)).collect())
                .collect(),
            floor,
            tick,
        }
    }

    /// Gets a fader.
    pub fn get(&self, page: usize, index: usize) -> Result<&Fader, ShowError> {
        self.pages
            .get(page)
            .and_then(|faders| faders.get(index))
            .ok_or(ShowError::UnknownFader { page, index })
    }

    fn get_mut(&mut self, page: usize, index: usize) -> Result<&mut Fader, ShowError> {
        self.pages
            .get_mut(page)
            .and_then(|faders| faders.get_mut(index))
            .ok_or(ShowError::UnknownFader { page, index })
    }

    /// Replaces a fader with a new one holding the content. The old fader's chaser is
    /// stopped and joined first. Returns the channels the old fader covered.
    pub fn set_content(
        &mut self,
        page: usize,
        index: usize,
        content: FaderContent,
    ) -> Result<BTreeSet<u16>, ShowError> {
        let fader = self.get_mut(page, index)?;
        let previous = fader.content.channels();
        fader.stop();
        *fader = Fader::new(content);
        fader.recompute_dmx();
        Ok(previous)
    }

    /// Sets a fader's level. Returns the channels whose contribution may have changed.
    pub fn set_level(
        &mut self,
        page: usize,
        index: usize,
        level: f64,
    ) -> Result<BTreeSet<u16>, ShowError> {
        let (floor, tick) = (self.floor.clone(), self.tick);
        let fader = self.get_mut(page, index)?;
        fader.set_level(level, &floor, tick);
        Ok(fader.content.channels())
    }

    /// Iterates over every fader with its page and index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Fader)> {
        self.pages.iter().enumerate().flat_map(|(page, faders)| {
            faders
                .iter()
                .enumerate()
                .map(move |(index, fader)| (page, index, fader))
        })
    }

    /// Snapshots of every active fader's published levels.
    pub fn active_buffers(&self) -> Vec<Arc<ChannelBuffer>> {
        self.iter()
            .filter(|(_, _, fader)| fader.is_active())
            .map(|(_, _, fader)| fader.dmx.snapshot())
            .collect()
    }

    /// The scale applied to the main playback. The lowest Main fader wins; without one
    /// the main playback is at full.
    pub fn main_scale(&self) -> f64 {
        self.iter()
            .filter(|(_, _, fader)| matches!(fader.content, FaderContent::Main))
            .map(|(_, _, fader)| fader.level)
            .fold(1.0, f64::min)
    }

    /// Channels written by chaser threads, which can change between any two ticks.
    pub fn running_channels(&self) -> BTreeSet<u16> {
        self.iter()
            .filter(|(_, _, fader)| fader.is_running())
            .flat_map(|(_, _, fader)| fader.content.channels())
            .collect()
    }

    /// Replaces preset content holding a cue with the same memory.
    pub fn update_cue(&mut self, cue: &Arc<Cue>) -> BTreeSet<u16> {
        let mut touched = BTreeSet::new();
        for fader in self.pages.iter_mut().flatten() {
            if let FaderContent::Preset(existing) = &fader.content {
                if existing.memory() == cue.memory() {
                    touched.extend(existing.channels().keys().copied());
                    touched.extend(cue.channels().keys().copied());
                    fader.content = FaderContent::Preset(cue.clone());
                    fader.recompute_dmx();
                }
            }
        }
        touched
    }

    /// Swaps in a new snapshot of a chaser on every fader holding it, restarting any
    /// running loop.
    pub fn update_sequence(&mut self, sequence: &Arc<Sequence>) -> BTreeSet<u16> {
        let (floor, tick) = (self.floor.clone(), self.tick);
        let mut touched = BTreeSet::new();
        for fader in self.pages.iter_mut().flatten() {
            let FaderContent::Sequence(existing) = &fader.content else {
                continue;
            };
            if existing.index() != sequence.index() {
                continue;
            }
            touched.extend(existing.channels());
            touched.extend(sequence.channels());
            fader.stop();
            fader.content = FaderContent::Sequence(sequence.clone());
            let level = fader.level;
            fader.set_level(level, &floor, tick);
        }
        touched
    }

    /// Returns every fader to empty content, stopping all chasers.
    pub fn clear(&mut self) {
        for fader in self.pages.iter_mut().flatten() {
            fader.stop();
            *fader = Fader::new(FaderContent::None);
        }
    }

    pub fn pages(&self) -> usize {
        self.pages.len()
    }

    pub fn per_page(&self) -> usize {
        self.pages.first().map_or(0, |faders| faders.len())
    }
}
