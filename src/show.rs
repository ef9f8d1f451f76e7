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

//! The show: every layer, the patch and the output frames, owned in one place and
//! driven by user actions and the periodic tick.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::crossfade::Crossfade;
use crate::cue::{Cue, Step, Timing};
use crate::curve::{Curve, Curves};
use crate::dmx::Transport;
use crate::error::ShowError;
use crate::fader::{FaderBank, FaderContent, FaderSource};
use crate::group::Group;
use crate::independent::{Independent, Independents};
use crate::levels::{all_channels, empty_buffer, is_valid_channel, ChannelBuffer, LayerBuffer, Level};
use crate::merge::{merge_all, merge_channels, Frames, Layers};
use crate::patch::Patch;
use crate::sequence::{Sequence, SequenceKind};
use crate::util::{format_level, format_memory};

mod import;

#[cfg(test)]
mod tests;

/// The shortest tick the engine will run at.
pub const MIN_TICK: Duration = Duration::from_millis(20);

/// The longest tick the engine will run at.
pub const MAX_TICK: Duration = Duration::from_millis(40);

/// Console settings the show needs at runtime.
#[derive(Clone, Debug)]
pub struct ShowSettings {
    /// The universes outputs can be patched into, in 1:1 patch order.
    pub universes: Vec<u16>,
    /// How often crossfades and chasers advance.
    pub tick: Duration,
    /// Display levels as 0-100% instead of 0-255.
    pub percent_mode: bool,
    /// The fade time given to steps added without explicit timings.
    pub default_time: f64,
    pub fader_pages: usize,
    pub faders_per_page: usize,
}

impl Default for ShowSettings {
    fn default() -> Self {
        ShowSettings {
            universes: vec![1],
            tick: Duration::from_millis(25),
            percent_mode: false,
            default_time: 5.0,
            fader_pages: 10,
            faders_per_page: 10,
        }
    }
}

/// The live show.
pub struct LightShow {
    settings: ShowSettings,
    patch: Patch,
    curves: Curves,
    memories: Vec<Arc<Cue>>,
    groups: Vec<Group>,
    main: Sequence,
    crossfade: Option<Crossfade>,
    /// The sequence layer as currently on stage.
    main_levels: ChannelBuffer,
    /// The sequence layer as published to chaser threads.
    stage: LayerBuffer,
    user: Vec<Option<Level>>,
    chasers: BTreeMap<u32, Arc<Sequence>>,
    faders: FaderBank,
    independents: Independents,
    frames: Frames,
    dirty: BTreeSet<u16>,
    transport: Arc<dyn Transport>,
}

impl LightShow {
    /// Creates an empty show sending frames to the given transport.
    pub fn new(mut settings: ShowSettings, transport: Arc<dyn Transport>) -> LightShow {
        settings.tick = settings.tick.clamp(MIN_TICK, MAX_TICK);
        if settings.universes.is_empty() {
            warn!("No universes configured, using universe 1");
            settings.universes.push(1);
        }

        let stage = LayerBuffer::new();
        LightShow {
            patch: Patch::new(settings.universes.clone()),
            curves: Curves::new(),
            memories: Vec::new(),
            groups: Vec::new(),
            main: Sequence::new(0, "Main Playback", SequenceKind::Main),
            crossfade: None,
            main_levels: empty_buffer(),
            stage: stage.clone(),
            user: vec![None; empty_buffer().len()],
            chasers: BTreeMap::new(),
            faders: FaderBank::new(
                settings.fader_pages,
                settings.faders_per_page,
                stage,
                settings.tick,
            ),
            independents: Independents::new(),
            frames: Frames::new(&settings.universes),
            dirty: BTreeSet::new(),
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &ShowSettings {
        &self.settings
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn curves(&self) -> &Curves {
        &self.curves
    }

    /// Every recorded memory, ordered by memory address.
    pub fn memories(&self) -> &[Arc<Cue>] {
        &self.memories
    }

    /// Gets a recorded memory.
    pub fn cue(&self, memory: f64) -> Option<&Arc<Cue>> {
        self.memories.iter().find(|cue| cue.memory() == memory)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// The main playback.
    pub fn main(&self) -> &Sequence {
        &self.main
    }

    pub fn chasers(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.chasers.values()
    }

    pub fn faders(&self) -> &FaderBank {
        &self.faders
    }

    pub fn independents(&self) -> &Independents {
        &self.independents
    }

    pub fn frames(&self) -> &Frames {
        &self.frames
    }

    /// Returns true while the main playback is crossfading.
    pub fn is_fading(&self) -> bool {
        self.crossfade.is_some()
    }

    /// Starts a crossfade to the next step. Returns false if nothing started.
    pub fn do_go(&mut self) -> bool {
        self.do_go_at(Instant::now())
    }

    /// Starts a crossfade to the next step as of `now`.
    pub fn do_go_at(&mut self, now: Instant) -> bool {
        if self.crossfade.is_some() {
            debug!("Go ignored, a crossfade is already running");
            return false;
        }
        let Some(next) = self.main.next_position() else {
            debug!("Go ignored, already at the last step");
            return false;
        };
        self.start_crossfade(next, now);
        true
    }

    /// Crossfades back to the previous step using that step's timings.
    pub fn go_back(&mut self) -> bool {
        self.go_back_at(Instant::now())
    }

    pub fn go_back_at(&mut self, now: Instant) -> bool {
        if self.crossfade.is_some() {
            debug!("Go Back ignored, a crossfade is already running");
            return false;
        }
        let Some(previous) = self.main.previous_position() else {
            debug!("Go Back ignored, already at the start");
            return false;
        };
        self.start_crossfade(previous, now);
        true
    }

    /// Crossfades to any step of the main playback using that step's timings.
    pub fn goto(&mut self, position: usize) -> Result<bool, ShowError> {
        self.goto_at(position, Instant::now())
    }

    pub fn goto_at(&mut self, position: usize, now: Instant) -> Result<bool, ShowError> {
        if position >= self.main.last() {
            return Err(ShowError::UnknownStep(position));
        }
        if self.crossfade.is_some() {
            debug!(position, "Goto ignored, a crossfade is already running");
            return Ok(false);
        }
        self.start_crossfade(position, now);
        Ok(true)
    }

    fn start_crossfade(&mut self, target: usize, now: Instant) {
        let Some(step) = self.main.step(target).cloned() else {
            return;
        };

        // User levels are absorbed into the fade: the fade starts from what is on stage.
        for (channel, user) in self.user.iter_mut().enumerate() {
            if let Some(level) = user.take() {
                self.main_levels[channel] = level;
                self.dirty.insert(channel as u16);
            }
        }
        self.main.set_on_go(true);

        info!(
            from = self.main.position(),
            to = target,
            memory = %format_memory(step.cue().memory()),
            total_time = step.total_time(),
            "Go"
        );
        self.crossfade = Some(Crossfade::new(
            self.main_levels.clone(),
            target,
            step,
            now,
        ));
        self.tick(now);
    }

    /// Advances the crossfade and picks up chaser output, then merges and sends every
    /// universe that changed.
    pub fn tick(&mut self, now: Instant) {
        let mut completed = None;
        if let Some(crossfade) = &self.crossfade {
            let elapsed = crossfade.elapsed(now);
            crossfade.levels_at(elapsed, &mut self.main_levels);
            self.dirty.extend(crossfade.channels());
            if crossfade.is_complete(elapsed) {
                completed = Some(crossfade.target());
            }
            self.stage.publish(self.main_levels.clone());
        }

        if let Some(target) = completed {
            self.crossfade = None;
            self.main.set_position(target);
            self.main.set_on_go(false);
            // User levels set during the fade take over again.
            self.dirty.extend(
                self.user
                    .iter()
                    .enumerate()
                    .filter(|(_, user)| user.is_some())
                    .map(|(channel, _)| channel as u16),
            );
            info!(position = target, "Crossfade complete");
        }

        self.dirty.extend(self.faders.running_channels());
        self.refresh();
    }

    /// Sets a user level on a channel, on top of the main playback.
    pub fn set_channel_level(&mut self, channel: u16, level: Level) -> Result<(), ShowError> {
        if !is_valid_channel(channel) {
            return Err(ShowError::InvalidChannel(channel));
        }
        self.user[usize::from(channel)] = Some(level);
        self.dirty.insert(channel);
        self.refresh();
        Ok(())
    }

    /// Releases a user level.
    pub fn clear_channel_level(&mut self, channel: u16) -> Result<(), ShowError> {
        if !is_valid_channel(channel) {
            return Err(ShowError::InvalidChannel(channel));
        }
        if self.user[usize::from(channel)].take().is_some() {
            self.dirty.insert(channel);
            self.refresh();
        }
        Ok(())
    }

    /// Releases every user level.
    pub fn clear_user_levels(&mut self) {
        for (channel, user) in self.user.iter_mut().enumerate() {
            if user.take().is_some() {
                self.dirty.insert(channel as u16);
            }
        }
        self.refresh();
    }

    /// Gets the user level set on a channel, if any.
    pub fn user_level(&self, channel: u16) -> Option<Level> {
        self.user.get(usize::from(channel)).copied().flatten()
    }

    /// The current and next levels of a channel on the main playback. The current level
    /// includes any user level; the next level is where the running crossfade ends, or
    /// the next step's level when idle.
    pub fn channel_levels(&self, channel: u16) -> Result<(Level, Level), ShowError> {
        if !is_valid_channel(channel) {
            return Err(ShowError::InvalidChannel(channel));
        }
        let current = self.stage_level(channel);
        let next = match &self.crossfade {
            Some(crossfade) => crossfade.next_level(channel),
            None => self.main.next_step().map_or(0, |step| step.level(channel)),
        };
        Ok((current, next))
    }

    /// The merged level of a channel before its output curves.
    pub fn output_level(&self, channel: u16) -> Result<Level, ShowError> {
        if !is_valid_channel(channel) {
            return Err(ShowError::InvalidChannel(channel));
        }
        let layers = Layers {
            main: &self.main_levels,
            main_scale: self.faders.main_scale(),
            user: &self.user,
            on_go: self.main.on_go(),
            faders: self.faders.active_buffers(),
            independents: self.independents.dmx(),
        };
        Ok(layers.level(channel))
    }

    /// Formats a level for display.
    pub fn display_level(&self, level: Level) -> String {
        format_level(level, self.settings.percent_mode)
    }

    /// The main playback level on stage, with any user level on top.
    fn stage_level(&self, channel: u16) -> Level {
        let index = usize::from(channel);
        match self.user.get(index).copied().flatten() {
            Some(level) if !self.main.on_go() => level,
            _ => self.main_levels.get(index).copied().unwrap_or(0),
        }
    }

    /// Records what the main playback and user levels put on stage into a memory.
    /// Faders and independents are never recorded. Recording over an existing memory
    /// updates it.
    pub fn record_cue(&mut self, memory: f64, text: &str) -> Result<Arc<Cue>, ShowError> {
        if !memory.is_finite() || memory <= 0.0 {
            return Err(ShowError::InvalidMemory(memory));
        }
        let channels: BTreeMap<u16, Level> = all_channels()
            .map(|channel| (channel, self.stage_level(channel)))
            .filter(|(_, level)| *level > 0)
            .collect();
        let cue = Arc::new(Cue::new(memory, channels, text));

        if self.cue(memory).is_some() {
            self.replace_cue(cue.clone());
        } else {
            let position = self.memories.partition_point(|c| c.memory() < memory);
            self.memories.insert(position, cue.clone());
        }
        info!(memory = %format_memory(memory), channels = cue.channels().len(), "Recorded cue");
        Ok(cue)
    }

    /// Re-records an existing memory from the stage, keeping its text, and updates every
    /// step and preset fader holding it.
    pub fn update_cue(&mut self, memory: f64) -> Result<Arc<Cue>, ShowError> {
        let text = self
            .cue(memory)
            .ok_or(ShowError::UnknownCue(memory))?
            .text()
            .to_string();
        self.record_cue(memory, &text)
    }

    fn replace_cue(&mut self, cue: Arc<Cue>) {
        if let Some(slot) = self
            .memories
            .iter_mut()
            .find(|existing| existing.memory() == cue.memory())
        {
            *slot = cue.clone();
        }

        self.main.update_cue(&cue);

        let mut touched = self.faders.update_cue(&cue);
        let indexes: Vec<u32> = self.chasers.keys().copied().collect();
        for index in indexes {
            let Some(chaser) = self.chasers.get(&index) else {
                continue;
            };
            let mut updated = (**chaser).clone();
            if updated.update_cue(&cue) > 0 {
                let updated = Arc::new(updated);
                touched.extend(self.faders.update_sequence(&updated));
                self.chasers.insert(index, updated);
            }
        }
        self.dirty.extend(touched);
        self.refresh();
    }

    /// Appends a memory to the main playback. Without timings the step fades in and out
    /// over the default time.
    pub fn add_step(&mut self, memory: f64, timing: Option<Timing>) -> Result<usize, ShowError> {
        let step = self.new_step(memory, timing)?;
        self.main.add_step(step);
        Ok(self.main.last() - 1)
    }

    /// Inserts a memory into the main playback at a position.
    pub fn insert_step(
        &mut self,
        position: usize,
        memory: f64,
        timing: Option<Timing>,
    ) -> Result<(), ShowError> {
        let step = self.new_step(memory, timing)?;
        let position = position.clamp(1, self.main.last());
        self.main.insert_step(position, step);
        if let Some(crossfade) = &mut self.crossfade {
            crossfade.step_inserted(position);
        }
        Ok(())
    }

    fn new_step(&self, memory: f64, timing: Option<Timing>) -> Result<Step, ShowError> {
        let cue = self.cue(memory).ok_or(ShowError::UnknownCue(memory))?;
        let timing = timing.unwrap_or_else(|| Timing::fade(self.settings.default_time));
        Ok(Step::new(cue.clone(), timing))
    }

    fn main_step_mut(&mut self, position: usize) -> Result<&mut Step, ShowError> {
        if position == 0 {
            return Err(ShowError::UnknownStep(position));
        }
        self.main
            .step_mut(position)
            .ok_or(ShowError::UnknownStep(position))
    }

    /// Replaces the step-wide timings of a main playback step.
    pub fn set_step_timing(&mut self, position: usize, timing: Timing) -> Result<(), ShowError> {
        self.main_step_mut(position)?.set_timing(timing);
        Ok(())
    }

    /// Sets a per-channel delay and time on a main playback step.
    pub fn set_channel_time(
        &mut self,
        position: usize,
        channel: u16,
        delay: f64,
        time: f64,
    ) -> Result<(), ShowError> {
        if !is_valid_channel(channel) {
            return Err(ShowError::InvalidChannel(channel));
        }
        self.main_step_mut(position)?
            .set_channel_time(channel, delay, time);
        Ok(())
    }

    /// Creates an empty chaser, replacing any chaser with the same index.
    pub fn add_chaser(&mut self, index: u32, text: &str) {
        let chaser = Arc::new(Sequence::new(index, text, SequenceKind::Chaser));
        let touched = self.faders.update_sequence(&chaser);
        self.chasers.insert(index, chaser);
        self.dirty.extend(touched);
        self.refresh();
    }

    /// Appends a memory to a chaser. Faders running the chaser restart with the new
    /// steps.
    pub fn add_chaser_step(
        &mut self,
        index: u32,
        memory: f64,
        timing: Option<Timing>,
    ) -> Result<(), ShowError> {
        let step = self.new_step(memory, timing)?;
        let chaser = self
            .chasers
            .get(&index)
            .ok_or(ShowError::UnknownChaser(index))?;
        let mut updated = (**chaser).clone();
        updated.add_step(step);
        self.install_chaser(Arc::new(updated));
        Ok(())
    }

    fn install_chaser(&mut self, chaser: Arc<Sequence>) {
        let touched = self.faders.update_sequence(&chaser);
        self.chasers.insert(chaser.index(), chaser);
        self.dirty.extend(touched);
        self.refresh();
    }

    /// Adds or replaces a group.
    pub fn add_group(&mut self, group: Group) -> Result<(), ShowError> {
        validate_channels(group.channels())?;
        match self
            .groups
            .iter_mut()
            .find(|existing| existing.index() == group.index())
        {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
        Ok(())
    }

    /// Assigns content to a fader. The previous fader is stopped and discarded.
    pub fn set_fader_content(
        &mut self,
        page: usize,
        index: usize,
        source: FaderSource,
    ) -> Result<(), ShowError> {
        let content = self.resolve_source(source)?;
        let touched = self.faders.set_content(page, index, content)?;
        self.dirty.extend(touched);
        // A main fader changes the scale of every channel.
        self.dirty.extend(all_channels());
        self.refresh();
        Ok(())
    }

    fn resolve_source(&self, source: FaderSource) -> Result<FaderContent, ShowError> {
        Ok(match source {
            FaderSource::None => FaderContent::None,
            FaderSource::Channels { channels } => {
                validate_channels(&channels)?;
                FaderContent::Channels(channels)
            }
            FaderSource::Group { index } => {
                let group = self
                    .groups
                    .iter()
                    .find(|group| group.index() == index)
                    .ok_or(ShowError::UnknownGroup(index))?;
                FaderContent::Group {
                    index,
                    channels: group.channels().clone(),
                }
            }
            FaderSource::Preset { memory } => FaderContent::Preset(
                self.cue(memory)
                    .ok_or(ShowError::UnknownCue(memory))?
                    .clone(),
            ),
            FaderSource::Sequence { chaser } => FaderContent::Sequence(
                self.chasers
                    .get(&chaser)
                    .ok_or(ShowError::UnknownChaser(chaser))?
                    .clone(),
            ),
            FaderSource::Main => FaderContent::Main,
        })
    }

    /// Moves a fader, 0..1.
    pub fn set_fader_level(
        &mut self,
        page: usize,
        index: usize,
        level: f64,
    ) -> Result<(), ShowError> {
        let is_main = matches!(self.faders.get(page, index)?.content(), FaderContent::Main);
        let touched = self.faders.set_level(page, index, level)?;
        if is_main {
            self.dirty.extend(all_channels());
        } else {
            self.dirty.extend(touched);
        }
        self.refresh();
        Ok(())
    }

    /// Adds or replaces an independent.
    pub fn add_independent(&mut self, independent: Independent) -> Result<(), ShowError> {
        validate_channels(independent.levels())?;
        let changed = self.independents.insert(independent);
        self.dirty.extend(changed);
        self.refresh();
        Ok(())
    }

    /// Moves an independent, 0..255. Only channels whose aggregate changed are merged.
    pub fn set_independent_level(&mut self, number: u32, level: f64) -> Result<(), ShowError> {
        let changed = self.independents.set_level(number, level)?;
        self.dirty.extend(changed);
        self.refresh();
        Ok(())
    }

    /// Registers a user curve, returning its id (0 when no id is free).
    pub fn add_curve(&mut self, curve: Curve) -> usize {
        self.curves.add_curve(curve)
    }

    /// Gets a curve for editing. Call [LightShow::refresh_outputs] once done.
    pub fn curve_mut(&mut self, id: usize) -> Option<&mut Curve> {
        self.curves.get_mut(id)
    }

    /// Deletes a user curve; outputs using it fall back to the linear curve.
    pub fn del_curve(&mut self, id: usize) -> Result<(), ShowError> {
        self.curves.del_curve(id, &mut self.patch)?;
        self.refresh_outputs();
        Ok(())
    }

    /// Sets the curve of a patched output.
    pub fn set_output_curve(
        &mut self,
        output: u16,
        universe: u16,
        curve: usize,
    ) -> Result<(), ShowError> {
        if self.curves.get(curve).is_none() {
            return Err(ShowError::UnknownCurve(curve));
        }
        self.patch.set_curve(output, universe, curve)?;
        self.refresh_outputs();
        Ok(())
    }

    /// Patches a channel to an output.
    pub fn patch_output(
        &mut self,
        channel: u16,
        output: u16,
        universe: u16,
        curve: usize,
    ) -> Result<(), ShowError> {
        if self.curves.get(curve).is_none() {
            return Err(ShowError::UnknownCurve(curve));
        }
        self.patch.add_output(channel, output, universe, curve)?;
        self.refresh_outputs();
        Ok(())
    }

    /// Unpatches an output.
    pub fn unpatch_output(&mut self, output: u16, universe: u16) -> Option<u16> {
        let channel = self.patch.remove_output(output, universe);
        self.refresh_outputs();
        channel
    }

    pub fn patch_empty(&mut self) {
        self.patch.patch_empty();
        info!("Unpatched everything");
        self.refresh_outputs();
    }

    pub fn patch_1on1(&mut self) {
        self.patch.patch_1on1();
        info!("Patched 1:1");
        self.refresh_outputs();
    }

    /// Rebuilds and resends every frame. Needed after any patch or curve change.
    pub fn refresh_outputs(&mut self) {
        let layers = Layers {
            main: &self.main_levels,
            main_scale: self.faders.main_scale(),
            user: &self.user,
            on_go: self.main.on_go(),
            faders: self.faders.active_buffers(),
            independents: self.independents.dmx(),
        };
        merge_all(&mut self.frames, &self.patch, &self.curves, &layers);
        self.dirty.clear();
        self.send();
    }

    /// Merges the pending channels and sends what changed.
    fn refresh(&mut self) {
        if !self.dirty.is_empty() {
            let channels = std::mem::take(&mut self.dirty);
            let layers = Layers {
                main: &self.main_levels,
                main_scale: self.faders.main_scale(),
                user: &self.user,
                on_go: self.main.on_go(),
                faders: self.faders.active_buffers(),
                independents: self.independents.dmx(),
            };
            merge_channels(&mut self.frames, &self.patch, &self.curves, &layers, channels);
        }
        self.send();
    }

    fn send(&mut self) {
        for universe in self.frames.take_dirty() {
            if let Some(frame) = self.frames.frame(universe) {
                self.transport.send(universe, frame);
            }
        }
    }
}

impl fmt::Display for LightShow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Universes: {:?}", self.settings.universes)?;
        writeln!(f, "Patched outputs: {}", self.patch.iter().count())?;
        writeln!(
            f,
            "Curves: {}",
            self.curves
                .iter()
                .map(|(id, curve)| format!("{} ({})", curve.name(), id))
                .collect::<Vec<String>>()
                .join(", ")
        )?;
        writeln!(f, "Memories (count: {}):", self.memories.len())?;
        for cue in &self.memories {
            writeln!(f, "- {}", cue)?;
        }
        writeln!(f, "Main playback: {}", self.main)?;
        for (position, step) in self.main.recorded_steps().iter().enumerate() {
            writeln!(
                f,
                "  {}. {} (total {})",
                position + 1,
                format_memory(step.cue().memory()),
                crate::util::format_seconds(step.total_time())
            )?;
        }
        writeln!(f, "Chasers (count: {}):", self.chasers.len())?;
        for chaser in self.chasers.values() {
            writeln!(f, "- {}", chaser)?;
        }
        write!(f, "Independents: {}", self.independents.iter().count())
    }
}

fn validate_channels(channels: &BTreeMap<u16, Level>) -> Result<(), ShowError> {
    match channels.keys().find(|channel| !is_valid_channel(**channel)) {
        Some(channel) => Err(ShowError::InvalidChannel(*channel)),
        None => Ok(()),
    }
}
