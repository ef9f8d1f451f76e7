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

/// Errors raised at the mutation boundary of the show. Nothing is applied when one
/// of these is returned.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ShowError {
    #[error("channel {0} is out of range")]
    InvalidChannel(u16),
    #[error("output {0} is out of range")]
    InvalidOutput(u16),
    #[error("universe {0} is not configured")]
    InvalidUniverse(u16),
    #[error("invalid memory address {0}")]
    InvalidMemory(f64),
    #[error("no cue recorded at memory {0}")]
    UnknownCue(f64),
    #[error("no step at position {0}")]
    UnknownStep(usize),
    #[error("no chaser with index {0}")]
    UnknownChaser(u32),
    #[error("no group with index {0}")]
    UnknownGroup(f64),
    #[error("no curve with id {0}")]
    UnknownCurve(usize),
    #[error("curve {0} is reserved")]
    ReservedCurve(usize),
    #[error("curve '{0}' is not editable")]
    CurveNotEditable(String),
    #[error("no fader at page {page}, index {index}")]
    UnknownFader { page: usize, index: usize },
    #[error("no independent with number {0}")]
    UnknownIndependent(u32),
}
