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

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::cue::{Cue, Step};

/// How a sequence moves past its last step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceKind {
    /// The main playback stops at its last step.
    Main,
    /// A chaser wraps back around to step 1.
    Chaser,
}

/// An ordered list of steps with a cursor on the step currently live on stage.
/// Step 0 is always the sentinel.
#[derive(Clone, Debug)]
pub struct Sequence {
    index: u32,
    text: String,
    kind: SequenceKind,
    steps: Vec<Step>,
    position: usize,
    on_go: bool,
}

impl Sequence {
    /// Creates an empty sequence holding only the sentinel step.
    pub fn new(index: u32, text: &str, kind: SequenceKind) -> Sequence {
        Sequence {
            index,
            text: text.to_string(),
            kind,
            steps: vec![Step::sentinel()],
            position: 0,
            on_go: false,
        }
    }

    /// Creates a sequence from its steps. The sentinel is added in front.
    pub fn with_steps(index: u32, text: &str, kind: SequenceKind, steps: Vec<Step>) -> Sequence {
        let mut sequence = Sequence::new(index, text, kind);
        sequence.steps.extend(steps);
        sequence
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    /// Gets every step, including the sentinel.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Gets the steps after the sentinel.
    pub fn recorded_steps(&self) -> &[Step] {
        &self.steps[1..]
    }

    pub fn step(&self, position: usize) -> Option<&Step> {
        self.steps.get(position)
    }

    pub fn step_mut(&mut self, position: usize) -> Option<&mut Step> {
        self.steps.get_mut(position)
    }

    /// The number of steps, sentinel included.
    pub fn last(&self) -> usize {
        self.steps.len()
    }

    /// Appends a step.
    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Inserts a step at the given position, never in front of the sentinel.
    pub fn insert_step(&mut self, position: usize, step: Step) {
        let position = position.clamp(1, self.steps.len());
        if position <= self.position && self.position > 0 {
            self.position += 1;
        }
        self.steps.insert(position, step);
    }

    /// Removes all recorded steps and returns to the sentinel.
    pub fn clear(&mut self) {
        self.steps.truncate(1);
        self.position = 0;
        self.on_go = false;
    }

    /// The step currently live on stage.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor, clamped to the existing steps.
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.steps.len() - 1);
    }

    /// The position a Go would move to, if any.
    pub fn next_position(&self) -> Option<usize> {
        self.next_after(self.position)
    }

    /// The position that follows the given one for this kind of sequence.
    pub fn next_after(&self, position: usize) -> Option<usize> {
        let last = self.steps.len();
        match self.kind {
            SequenceKind::Main => (position + 1 < last).then_some(position + 1),
            SequenceKind::Chaser if last < 2 => None,
            SequenceKind::Chaser if position + 1 >= last => Some(1),
            SequenceKind::Chaser => Some(position + 1),
        }
    }

    /// The position a Go Back would move to, if any.
    pub fn previous_position(&self) -> Option<usize> {
        self.position.checked_sub(1)
    }

    /// The step currently live on stage.
    pub fn current_step(&self) -> &Step {
        &self.steps[self.position]
    }

    /// The step a Go would bring in.
    pub fn next_step(&self) -> Option<&Step> {
        self.next_position().and_then(|p| self.steps.get(p))
    }

    /// Returns true while a Go is fading.
    pub fn on_go(&self) -> bool {
        self.on_go
    }

    pub fn set_on_go(&mut self, on_go: bool) {
        self.on_go = on_go;
    }

    /// Every channel used by any step.
    pub fn channels(&self) -> BTreeSet<u16> {
        self.steps
            .iter()
            .flat_map(|step| step.cue().channels().keys().copied())
            .collect()
    }

    /// Replaces every step's cue that shares the memory of the given cue. Returns the
    /// number of steps updated.
    pub fn update_cue(&mut self, cue: &Arc<Cue>) -> usize {
        let mut updated = 0;
        for step in self.steps.iter_mut().skip(1) {
            if step.cue().memory() == cue.memory() {
                step.set_cue(cue.clone());
                updated += 1;
            }
        }
        updated
    }

    /// Finds the first step holding the given memory.
    pub fn find_memory(&self, memory: f64) -> Option<usize> {
        self.steps
            .iter()
            .skip(1)
            .position(|step| step.cue().memory() == memory)
            .map(|p| p + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} steps, at {})",
            self.index,
            self.text,
            self.steps.len() - 1,
            self.position
        )
    }
}
