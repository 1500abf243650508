// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core value types shared by the grid, the geometry and the agents.
//!
//! All coordinates are image coordinates: `x` grows to the right and `y`
//! grows downward. A cell's centre is the integer point `(x, y)`.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, SQRT_2};
use std::fmt;
use std::num::NonZeroU32;

/// A pixel of the grid, identified by its coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell whose centre is nearest to `p`.
    pub fn from_point(p: &Point2<f64>) -> Self {
        Self {
            x: p.x.round() as i32,
            y: p.y.round() as i32,
        }
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }

    /// The cell `k` integer steps away along `direction`.
    pub fn step(&self, direction: Direction8, k: i32) -> Self {
        let (dx, dy) = direction.step();
        Self {
            x: self.x + dx * k,
            y: self.y + dy * k,
        }
    }
}

/// Stable identifier of an agent.
///
/// Ids are never zero: occupancy maps use 0 to mark a free cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(NonZeroU32);

impl AgentId {
    /// Rebuilds an id from its raw occupancy-map value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id counter owned by the scheduler and handed to agent factories.
#[derive(Debug, Default)]
pub struct IdGenerator {
    issued: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> AgentId {
        let id = AgentId(NonZeroU32::MIN.saturating_add(self.issued));
        self.issued = self.issued.saturating_add(1);
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u32 {
        self.issued
    }
}

/// One of the eight compass directions a quantized box can point to.
///
/// Variants are named for image space (y down), so `South` is `(0, 1)` and
/// corresponds to a rotation of 90°.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction8 {
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    North,
    NorthEast,
}

impl Direction8 {
    pub const ALL: [Direction8; 8] = [
        Direction8::East,
        Direction8::SouthEast,
        Direction8::South,
        Direction8::SouthWest,
        Direction8::West,
        Direction8::NorthWest,
        Direction8::North,
        Direction8::NorthEast,
    ];

    /// The four axes; scanning one of them covers its opposite as well.
    pub const AXES: [Direction8; 4] = [
        Direction8::East,
        Direction8::SouthEast,
        Direction8::South,
        Direction8::SouthWest,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: usize) -> Self {
        Self::ALL[index % 8]
    }

    /// Direction for a rotation in degrees, snapped to the nearest 45°.
    pub fn from_rotation(degrees: f64) -> Self {
        let snapped = snap_rotation(degrees);
        Self::from_index((snapped / 45.0).round() as usize)
    }

    pub fn rotation(self) -> f64 {
        self.index() as f64 * 45.0
    }

    /// Integer pixel step.
    pub fn step(self) -> (i32, i32) {
        match self {
            Direction8::East => (1, 0),
            Direction8::SouthEast => (1, 1),
            Direction8::South => (0, 1),
            Direction8::SouthWest => (-1, 1),
            Direction8::West => (-1, 0),
            Direction8::NorthWest => (-1, -1),
            Direction8::North => (0, -1),
            Direction8::NorthEast => (1, -1),
        }
    }

    /// Exact unit vector.
    pub fn unit(self) -> Vector2<f64> {
        match self {
            Direction8::East => Vector2::new(1.0, 0.0),
            Direction8::SouthEast => Vector2::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            Direction8::South => Vector2::new(0.0, 1.0),
            Direction8::SouthWest => Vector2::new(-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            Direction8::West => Vector2::new(-1.0, 0.0),
            Direction8::NorthWest => Vector2::new(-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
            Direction8::North => Vector2::new(0.0, -1.0),
            Direction8::NorthEast => Vector2::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
        }
    }

    /// Euclidean length of one integer step.
    pub fn step_length(self) -> f64 {
        if self.is_diagonal() {
            SQRT_2
        } else {
            1.0
        }
    }

    pub fn is_diagonal(self) -> bool {
        self.index() % 2 == 1
    }

    /// The direction rotated by +90°.
    pub fn rotated_90(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 4)
    }

    /// Same or opposite direction.
    pub fn is_parallel_to(self, other: Direction8) -> bool {
        self.index() % 4 == other.index() % 4
    }

    pub fn is_perpendicular_to(self, other: Direction8) -> bool {
        self.rotated_90().is_parallel_to(other)
    }
}

/// Snaps a rotation to the nearest multiple of 45° in `[0, 360)`.
pub fn snap_rotation(degrees: f64) -> f64 {
    let snapped = (degrees / 45.0).round() * 45.0;
    let normalized = snapped.rem_euclid(360.0);
    // rem_euclid keeps -0.0 and can round up to exactly 360.0
    if normalized >= 360.0 || normalized == 0.0 {
        0.0
    } else {
        normalized
    }
}

/// Wall type classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WallType {
    Exterior,
    Interior,
    #[default]
    Unknown,
}

/// Opening type classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpeningType {
    Door,
    Window,
    Unknown,
}
