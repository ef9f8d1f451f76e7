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

//! Output dimmer curves. Every curve is precomputed into a 256 entry lookup table so
//! applying one during a merge is a single index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ShowError;
use crate::levels::Level;
use crate::patch::Patch;

/// The identity curve. Outputs fall back to it when their curve goes away.
pub const LINEAR_CURVE: usize = 0;

/// The perceptual square root curve.
pub const SQUARE_ROOT_CURVE: usize = 1;

/// Ids below this are reserved for built in curves.
pub const FIRST_USER_CURVE: usize = 10;

/// The highest id a user curve can be given.
pub const MAX_CURVE: usize = 9999;

/// The shape of a curve and the parameters that produce its lookup table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    Linear,
    SquareRoot,
    /// Scales the full range down so that 255 maps to the limit.
    Limit { limit: Level },
    /// Straight lines between control points.
    Segments { points: BTreeMap<Level, Level> },
    /// A smooth monotone-preserving cubic through control points.
    Interpolate { points: BTreeMap<Level, Level> },
}

/// A dimmer curve with its precomputed output table.
#[derive(Clone, Debug)]
pub struct Curve {
    name: String,
    kind: CurveKind,
    values: [Level; 256],
}

impl Curve {
    /// Creates a curve and populates its values.
    pub fn new(name: &str, kind: CurveKind) -> Curve {
        let kind = match kind {
            CurveKind::Segments { points } => CurveKind::Segments {
                points: with_endpoints(points),
            },
            CurveKind::Interpolate { points } => CurveKind::Interpolate {
                points: with_endpoints(points),
            },
            kind => kind,
        };
        let mut curve = Curve {
            name: name.to_string(),
            kind,
            values: [0; 256],
        };
        curve.populate_values();
        curve
    }

    /// Gets the name of the curve.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the kind of the curve.
    pub fn kind(&self) -> &CurveKind {
        &self.kind
    }

    /// Returns true if the curve has parameters a user may edit.
    pub fn editable(&self) -> bool {
        !matches!(self.kind, CurveKind::Linear | CurveKind::SquareRoot)
    }

    /// Gets the output level for an input level. Anything outside the table is 0.
    pub fn get_level(&self, input: usize) -> Level {
        self.values.get(input).copied().unwrap_or(0)
    }

    /// Recomputes the lookup table from the curve parameters.
    pub fn populate_values(&mut self) {
        match &self.kind {
            CurveKind::Linear => {
                for (x, value) in self.values.iter_mut().enumerate() {
                    *value = x as Level;
                }
            }
            CurveKind::SquareRoot => {
                for (x, value) in self.values.iter_mut().enumerate() {
                    *value = ((x as f64) * 255.0).sqrt().round() as Level;
                }
            }
            CurveKind::Limit { limit } => {
                let ratio = f64::from(*limit) / 255.0;
                for (x, value) in self.values.iter_mut().enumerate() {
                    *value = ((x as f64) * ratio).round() as Level;
                }
            }
            CurveKind::Segments { points } => segments(points, &mut self.values),
            CurveKind::Interpolate { points } => interpolate(points, &mut self.values),
        }
    }

    /// Sets the limit of a limit curve.
    pub fn set_limit(&mut self, new_limit: Level) -> Result<(), ShowError> {
        match &mut self.kind {
            CurveKind::Limit { limit } => *limit = new_limit,
            _ => return Err(ShowError::CurveNotEditable(self.name.clone())),
        }
        self.populate_values();
        Ok(())
    }

    /// Adds or moves the control point at the given input.
    pub fn add_point(&mut self, x: Level, y: Level) -> Result<(), ShowError> {
        match &mut self.kind {
            CurveKind::Segments { points } | CurveKind::Interpolate { points } => {
                points.insert(x, y);
            }
            _ => return Err(ShowError::CurveNotEditable(self.name.clone())),
        }
        self.populate_values();
        Ok(())
    }

    /// Removes the control point at the given input. The end points can only be moved.
    pub fn remove_point(&mut self, x: Level) -> Result<bool, ShowError> {
        let removed = match &mut self.kind {
            CurveKind::Segments { points } | CurveKind::Interpolate { points } => {
                x != 0 && x != Level::MAX && points.remove(&x).is_some()
            }
            _ => return Err(ShowError::CurveNotEditable(self.name.clone())),
        };
        if removed {
            self.populate_values();
        }
        Ok(removed)
    }
}

fn with_endpoints(mut points: BTreeMap<Level, Level>) -> BTreeMap<Level, Level> {
    points.entry(0).or_insert(0);
    points.entry(Level::MAX).or_insert(Level::MAX);
    points
}

/// Finds the control point segment containing x. Points always hold both end points.
fn segment_for(xs: &[f64], x: f64) -> usize {
    let mut k = 0;
    while k + 2 < xs.len() && x > xs[k + 1] {
        k += 1;
    }
    k
}

fn split_points(points: &BTreeMap<Level, Level>) -> (Vec<f64>, Vec<f64>) {
    points
        .iter()
        .map(|(x, y)| (f64::from(*x), f64::from(*y)))
        .unzip()
}

fn segments(points: &BTreeMap<Level, Level>, values: &mut [Level; 256]) {
    let (xs, ys) = split_points(points);
    for (x, value) in values.iter_mut().enumerate() {
        let x = x as f64;
        let k = segment_for(&xs, x);
        let t = (x - xs[k]) / (xs[k + 1] - xs[k]);
        *value = crate::levels::to_level(ys[k] + t * (ys[k + 1] - ys[k]));
    }
}

// Fritsch-Carlson monotone cubic Hermite interpolation.
fn interpolate(points: &BTreeMap<Level, Level>, values: &mut [Level; 256]) {
    let (xs, ys) = split_points(points);
    let n = xs.len();
    if n < 3 {
        segments(points, values);
        return;
    }

    let secants: Vec<f64> = (0..n - 1)
        .map(|k| (ys[k + 1] - ys[k]) / (xs[k + 1] - xs[k]))
        .collect();
    let mut tangents = vec![0.0; n];
    tangents[0] = secants[0];
    tangents[n - 1] = secants[n - 2];
    for k in 1..n - 1 {
        if secants[k - 1] * secants[k] > 0.0 {
            tangents[k] = (secants[k - 1] + secants[k]) / 2.0;
        }
    }
    for k in 0..n - 1 {
        if secants[k] == 0.0 {
            tangents[k] = 0.0;
            tangents[k + 1] = 0.0;
            continue;
        }
        let a = tangents[k] / secants[k];
        let b = tangents[k + 1] / secants[k];
        let s = a * a + b * b;
        if s > 9.0 {
            let t = 3.0 / s.sqrt();
            tangents[k] = t * a * secants[k];
            tangents[k + 1] = t * b * secants[k];
        }
    }

    for (x, value) in values.iter_mut().enumerate() {
        let x = x as f64;
        let k = segment_for(&xs, x);
        let h = xs[k + 1] - xs[k];
        let t = (x - xs[k]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let y = (2.0 * t3 - 3.0 * t2 + 1.0) * ys[k]
            + (t3 - 2.0 * t2 + t) * h * tangents[k]
            + (-2.0 * t3 + 3.0 * t2) * ys[k + 1]
            + (t3 - t2) * h * tangents[k + 1];
        *value = crate::levels::to_level(y);
    }
}

/// The registry of all curves known to the show.
pub struct Curves {
    curves: BTreeMap<usize, Curve>,
}

impl Curves {
    /// Creates the registry with the built in curves.
    pub fn new() -> Curves {
        let mut curves = BTreeMap::new();
        curves.insert(LINEAR_CURVE, Curve::new("Linear", CurveKind::Linear));
        curves.insert(
            SQUARE_ROOT_CURVE,
            Curve::new("Square Root", CurveKind::SquareRoot),
        );
        Curves { curves }
    }

    /// Gets a curve by id.
    pub fn get(&self, id: usize) -> Option<&Curve> {
        self.curves.get(&id)
    }

    /// Gets a curve by id for editing.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Curve> {
        self.curves.get_mut(&id)
    }

    /// Iterates over every curve, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Curve)> {
        self.curves.iter().map(|(id, curve)| (*id, curve))
    }

    /// Applies a curve to a level. Unknown curves behave like the linear curve.
    pub fn apply(&self, id: usize, level: Level) -> Level {
        self.curves
            .get(&id)
            .map_or(level, |curve| curve.get_level(usize::from(level)))
    }

    /// Adds a user curve under the lowest free id, returning it. Returns 0 when every
    /// user id is taken.
    pub fn add_curve(&mut self, curve: Curve) -> usize {
        let Some(id) = (FIRST_USER_CURVE..=MAX_CURVE).find(|id| !self.curves.contains_key(id))
        else {
            warn!(name = curve.name(), "No free curve ids left, curve not added");
            return LINEAR_CURVE;
        };
        self.curves.insert(id, curve);
        id
    }

    /// Inserts a curve under an explicit id, replacing anything already there. Used
    /// when loading a show.
    pub fn insert_curve(&mut self, id: usize, curve: Curve) -> Result<(), ShowError> {
        if !(FIRST_USER_CURVE..=MAX_CURVE).contains(&id) {
            return Err(ShowError::ReservedCurve(id));
        }
        self.curves.insert(id, curve);
        Ok(())
    }

    /// Deletes a user curve. Any patched output using it is reset to the linear curve
    /// first so no output is left pointing at a missing curve.
    pub fn del_curve(&mut self, id: usize, patch: &mut Patch) -> Result<(), ShowError> {
        if id < FIRST_USER_CURVE {
            return Err(ShowError::ReservedCurve(id));
        }
        if !self.curves.contains_key(&id) {
            return Err(ShowError::UnknownCurve(id));
        }

        let demoted = patch.reset_curve(id);
        if demoted > 0 {
            info!(curve = id, outputs = demoted, "Outputs reset to linear curve");
        }
        self.curves.remove(&id);
        Ok(())
    }

    /// Removes every user curve.
    pub fn clear_user_curves(&mut self, patch: &mut Patch) {
        let ids: Vec<usize> = self
            .curves
            .keys()
            .copied()
            .filter(|id| *id >= FIRST_USER_CURVE)
            .collect();
        for id in ids {
            patch.reset_curve(id);
            self.curves.remove(&id);
        }
    }
}

impl Default for Curves {
    fn default() -> Self {
        Self::new()
    }
}
