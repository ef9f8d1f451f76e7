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

//! Bulk loading and saving of the show. Every import validates all of its input
//! before touching the show so a bad file never leaves a half-loaded show behind.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::show::{
    ChaserEntry, CueEntry, CurveEntry, FaderEntry, GroupEntry, IndependentEntry, PatchEntry,
    ShowFile, StepEntry,
};
use crate::cue::{Cue, Step};
use crate::curve::{Curve, FIRST_USER_CURVE, MAX_CURVE};
use crate::error::ShowError;
use crate::fader::{FaderContent, FaderSource};
use crate::group::Group;
use crate::independent::Independent;
use crate::levels::{all_channels, empty_buffer, Level};
use crate::sequence::{Sequence, SequenceKind};

use super::{validate_channels, LightShow};

impl LightShow {
    /// Replaces the whole patch. Nothing changes unless every entry is valid.
    pub fn import_patch(&mut self, entries: &[PatchEntry]) -> Result<(), ShowError> {
        for entry in entries {
            if self.curves.get(entry.curve).is_none() {
                warn!(curve = entry.curve, "Patch import rejected");
                return Err(ShowError::UnknownCurve(entry.curve));
            }
            if let Err(e) = self.patch.validate(entry.channel, entry.output, entry.universe) {
                warn!(error = %e, "Patch import rejected");
                return Err(e);
            }
        }

        self.patch.patch_empty();
        for entry in entries {
            self.patch
                .add_output(entry.channel, entry.output, entry.universe, entry.curve)?;
        }
        info!(outputs = entries.len(), "Imported patch");
        self.refresh_outputs();
        Ok(())
    }

    /// Replaces the main playback. The stage returns to the sentinel.
    pub fn import_main_playback(&mut self, entries: &[StepEntry]) -> Result<(), ShowError> {
        validate_steps(entries)?;

        let steps = entries
            .iter()
            .map(|entry| self.import_step(entry))
            .collect();
        self.main = Sequence::with_steps(0, "Main Playback", SequenceKind::Main, steps);
        self.crossfade = None;
        self.main_levels = empty_buffer();
        self.stage.clear();
        self.dirty.extend(all_channels());
        info!(steps = entries.len(), "Imported main playback");
        self.refresh();
        Ok(())
    }

    /// Adds or replaces a chaser.
    pub fn import_chaser(&mut self, entry: &ChaserEntry) -> Result<(), ShowError> {
        validate_steps(&entry.steps)?;

        let steps = entry
            .steps
            .iter()
            .map(|step| self.import_step(step))
            .collect();
        let chaser = Sequence::with_steps(entry.index, &entry.text, SequenceKind::Chaser, steps);
        info!(index = entry.index, steps = entry.steps.len(), "Imported chaser");
        self.install_chaser(Arc::new(chaser));
        Ok(())
    }

    fn import_step(&mut self, entry: &StepEntry) -> Step {
        let cue = self.register_cue(entry.memory, &entry.text, &entry.channels);
        let mut step = Step::new(cue, entry.timing);
        for (channel, channel_time) in &entry.channel_time {
            step.set_channel_time(*channel, channel_time.delay, channel_time.time);
        }
        step
    }

    /// Gets the memory at an address, recording it from the given levels if there is
    /// none yet.
    fn register_cue(
        &mut self,
        memory: f64,
        text: &str,
        channels: &BTreeMap<u16, Level>,
    ) -> Arc<Cue> {
        if let Some(cue) = self.cue(memory) {
            return cue.clone();
        }
        let cue = Arc::new(Cue::new(memory, channels.clone(), text));
        let position = self.memories.partition_point(|c| c.memory() < memory);
        self.memories.insert(position, cue.clone());
        cue
    }

    /// Empties the show: memories, sequences, faders, independents, user curves and the
    /// patch. The stage goes dark.
    pub fn clear(&mut self) {
        self.faders.clear();
        self.chasers.clear();
        self.independents.clear();
        self.groups.clear();
        self.memories.clear();
        self.main.clear();
        self.crossfade = None;
        self.main_levels = empty_buffer();
        self.stage.clear();
        self.user.iter_mut().for_each(|user| *user = None);
        self.curves.clear_user_curves(&mut self.patch);
        self.patch.patch_empty();
        self.dirty.clear();
        self.refresh_outputs();
    }

    /// Loads a whole show, replacing the current one.
    pub fn import(&mut self, show: &ShowFile) -> Result<(), ShowError> {
        self.validate_show(show)?;
        self.clear();

        for entry in &show.curves {
            self.curves
                .insert_curve(entry.id, Curve::new(&entry.name, entry.kind.clone()))?;
        }
        self.import_patch(&show.patch)?;
        for entry in &show.cues {
            self.register_cue(entry.memory, &entry.text, &entry.channels);
        }
        for entry in &show.groups {
            self.add_group(Group::new(entry.index, &entry.text, entry.channels.clone()))?;
        }
        self.import_main_playback(&show.main_playback)?;
        for entry in &show.chasers {
            self.import_chaser(entry)?;
        }
        for entry in &show.independents {
            self.add_independent(Independent::new(
                entry.number,
                &entry.text,
                entry.channels.clone(),
            ))?;
            self.set_independent_level(entry.number, entry.level)?;
        }
        for entry in &show.faders {
            self.set_fader_content(entry.page, entry.index, entry.content.clone())?;
            self.set_fader_level(entry.page, entry.index, entry.level)?;
        }

        info!(
            memories = self.memories.len(),
            steps = self.main.last() - 1,
            chasers = self.chasers.len(),
            "Imported show"
        );
        Ok(())
    }

    /// Checks every reference and address in a show file against itself and this
    /// show's universes and fader layout.
    fn validate_show(&self, show: &ShowFile) -> Result<(), ShowError> {
        let mut curves: BTreeSet<usize> = self
            .curves
            .iter()
            .map(|(id, _)| id)
            .filter(|id| *id < FIRST_USER_CURVE)
            .collect();
        for entry in &show.curves {
            if !(FIRST_USER_CURVE..=MAX_CURVE).contains(&entry.id) {
                return Err(ShowError::ReservedCurve(entry.id));
            }
            curves.insert(entry.id);
        }

        for entry in &show.patch {
            self.patch
                .validate(entry.channel, entry.output, entry.universe)?;
            if !curves.contains(&entry.curve) {
                return Err(ShowError::UnknownCurve(entry.curve));
            }
        }

        let mut memories = Vec::new();
        for entry in &show.cues {
            validate_memory(entry.memory)?;
            validate_channels(&entry.channels)?;
            memories.push(entry.memory);
        }
        validate_steps(&show.main_playback)?;
        memories.extend(show.main_playback.iter().map(|step| step.memory));
        for chaser in &show.chasers {
            validate_steps(&chaser.steps)?;
            memories.extend(chaser.steps.iter().map(|step| step.memory));
        }

        for entry in &show.groups {
            validate_channels(&entry.channels)?;
        }
        for entry in &show.independents {
            validate_channels(&entry.channels)?;
        }

        for entry in &show.faders {
            self.faders.get(entry.page, entry.index)?;
            match &entry.content {
                FaderSource::None | FaderSource::Main => {}
                FaderSource::Channels { channels } => validate_channels(channels)?,
                FaderSource::Group { index } => {
                    if !show.groups.iter().any(|group| group.index == *index) {
                        return Err(ShowError::UnknownGroup(*index));
                    }
                }
                FaderSource::Preset { memory } => {
                    if !memories.contains(memory) {
                        return Err(ShowError::UnknownCue(*memory));
                    }
                }
                FaderSource::Sequence { chaser } => {
                    if !show.chasers.iter().any(|c| c.index == *chaser) {
                        return Err(ShowError::UnknownChaser(*chaser));
                    }
                }
            }
        }
        Ok(())
    }

    /// Saves the show. The sentinel steps and built in curves are left out.
    pub fn export(&self) -> ShowFile {
        ShowFile {
            curves: self
                .curves
                .iter()
                .filter(|(id, _)| *id >= FIRST_USER_CURVE)
                .map(|(id, curve)| CurveEntry {
                    id,
                    name: curve.name().to_string(),
                    kind: curve.kind().clone(),
                })
                .collect(),
            patch: self
                .patch
                .iter()
                .map(|(address, binding)| PatchEntry {
                    channel: binding.channel,
                    universe: address.universe,
                    output: address.output,
                    curve: binding.curve,
                })
                .collect(),
            cues: self
                .memories
                .iter()
                .map(|cue| CueEntry {
                    memory: cue.memory(),
                    text: cue.text().to_string(),
                    channels: cue.channels().clone(),
                })
                .collect(),
            groups: self
                .groups
                .iter()
                .map(|group| GroupEntry {
                    index: group.index(),
                    text: group.text().to_string(),
                    channels: group.channels().clone(),
                })
                .collect(),
            main_playback: export_steps(&self.main),
            chasers: self
                .chasers
                .values()
                .map(|chaser| ChaserEntry {
                    index: chaser.index(),
                    text: chaser.text().to_string(),
                    steps: export_steps(chaser),
                })
                .collect(),
            faders: self
                .faders
                .iter()
                .filter(|(_, _, fader)| !matches!(fader.content(), FaderContent::None))
                .map(|(page, index, fader)| FaderEntry {
                    page,
                    index,
                    level: fader.level(),
                    content: fader.content().source(),
                })
                .collect(),
            independents: self
                .independents
                .iter()
                .map(|independent| IndependentEntry {
                    number: independent.number(),
                    text: independent.text().to_string(),
                    level: independent.level(),
                    channels: independent.levels().clone(),
                })
                .collect(),
        }
    }
}

fn export_steps(sequence: &Sequence) -> Vec<StepEntry> {
    sequence
        .recorded_steps()
        .iter()
        .map(|step| StepEntry {
            memory: step.cue().memory(),
            text: step.cue().text().to_string(),
            channels: step.cue().channels().clone(),
            timing: step.timing(),
            channel_time: step.channel_time().clone(),
        })
        .collect()
}

fn validate_memory(memory: f64) -> Result<(), ShowError> {
    if memory.is_finite() && memory > 0.0 {
        Ok(())
    } else {
        Err(ShowError::InvalidMemory(memory))
    }
}

fn validate_steps(entries: &[StepEntry]) -> Result<(), ShowError> {
    for entry in entries {
        validate_memory(entry.memory)?;
        validate_channels(&entry.channels)?;
        for channel in entry.channel_time.keys() {
            if !crate::levels::is_valid_channel(*channel) {
                return Err(ShowError::InvalidChannel(*channel));
            }
        }
    }
    Ok(())
}
