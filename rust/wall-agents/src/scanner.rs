// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ray-cast wall scanner.
//!
//! From an origin cell the scanner sends one [`Sonde`] per direction: it
//! walks backward until it leaves valid ground, then forward counting cells.
//! The longest sonde becomes the stem of the wall, the sonde perpendicular to
//! it gives the width, and together they fix the centre of the fitted box.
//!
//! A step is only valid when the food run perpendicular to the walk is at
//! least `min_perpendicular_run` cells wide, which keeps the scanner from
//! leaking through one-pixel gaps.

use nalgebra::Point2;

use crate::config::EngineConfig;
use crate::grid::World;
use crate::oriented_box::OrientedBox;
use crate::types::{Cell, Direction8};

/// Extent of one directional probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Sonde {
    pub direction: Direction8,
    /// Furthest cell reached walking backward
    pub start: Cell,
    /// Furthest cell reached walking forward
    pub end: Cell,
    /// Cells from `start` to `end`, inclusive
    pub cells: u32,
    /// The walk hit the ray length bound
    pub exhausted: bool,
}

impl Sonde {
    /// Run length in pixels, counting the end cells as one pixel each.
    pub fn length(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        (self.cells - 1) as f64 * self.direction.step_length() + 1.0
    }
}

/// Why a scan did not produce a wall-like fit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanRejection {
    #[error("scan exceeded the ray length bound")]
    Exhausted,
    #[error("origin is not on food")]
    OffFood,
    #[error("no sonde perpendicular to the stem")]
    NoWidthAxis,
    #[error("stem too short: {length:.1}")]
    TooShort { length: f64 },
    #[error("width not wall-like: {width:.1}")]
    BadWidth { width: f64 },
}

impl ScanRejection {
    /// Exhausted scans are retried on the next tick instead of killing the agent.
    pub fn is_deferred(&self) -> bool {
        matches!(self, ScanRejection::Exhausted)
    }
}

/// Box parameters fitted from a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct WallFit {
    pub center: Point2<f64>,
    pub rotation: f64,
    pub length: f64,
    pub width: f64,
}

impl WallFit {
    pub fn to_box(&self) -> OrientedBox {
        OrientedBox::new(self.center, self.width, self.length, self.rotation)
    }
}

/// All sondes sent from one origin.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub origin: Cell,
    pub sondes: Vec<Sonde>,
}

impl ScanResult {
    /// Picks stem and width axes and derives the centre from their extents.
    pub fn calculate_result(&self, config: &EngineConfig) -> Result<WallFit, ScanRejection> {
        if self.sondes.iter().any(|s| s.exhausted) {
            return Err(ScanRejection::Exhausted);
        }

        let mut stem: Option<&Sonde> = None;
        for sonde in self.sondes.iter().filter(|s| s.cells > 0) {
            if stem.map_or(true, |best| sonde.length() > best.length()) {
                stem = Some(sonde);
            }
        }
        let stem = stem.ok_or(ScanRejection::OffFood)?;

        let across = self
            .sondes
            .iter()
            .find(|s| s.direction.is_perpendicular_to(stem.direction))
            .ok_or(ScanRejection::NoWidthAxis)?;

        let length = stem.length();
        let width = across.length();
        if length <= config.min_stem_length {
            return Err(ScanRejection::TooShort { length });
        }
        if width <= config.min_scan_width || width >= config.max_scan_width {
            return Err(ScanRejection::BadWidth { width });
        }

        let origin = self.origin.center();
        let d = stem.direction.unit();
        let n = stem.direction.rotated_90().unit();
        let t0 = (stem.start.center() - origin).dot(&d);
        let t1 = (stem.end.center() - origin).dot(&d);
        let n0 = (across.start.center() - origin).dot(&n);
        let n1 = (across.end.center() - origin).dot(&n);

        Ok(WallFit {
            center: origin + d * ((t0 + t1) / 2.0) + n * ((n0 + n1) / 2.0),
            rotation: stem.direction.rotation(),
            length,
            width,
        })
    }
}

/// Casts sondes over the food cells of a world.
pub struct WallScanner<'a> {
    world: &'a World,
    max_ray_length: u32,
    min_perpendicular_run: u32,
}

impl<'a> WallScanner<'a> {
    pub fn new(world: &'a World, config: &EngineConfig) -> Self {
        Self {
            world,
            max_ray_length: config.max_ray_length,
            min_perpendicular_run: config.min_perpendicular_run,
        }
    }

    pub fn scan_for_walls(&self, origin: Cell, directions: &[Direction8]) -> ScanResult {
        ScanResult {
            origin,
            sondes: directions
                .iter()
                .map(|&direction| self.probe(origin, direction))
                .collect(),
        }
    }

    fn probe(&self, origin: Cell, direction: Direction8) -> Sonde {
        if !self.world.is_food(origin) {
            return Sonde {
                direction,
                start: origin,
                end: origin,
                cells: 0,
                exhausted: false,
            };
        }

        let mut exhausted = false;

        let back = direction.opposite();
        let mut start = origin;
        let mut steps = 0;
        loop {
            if steps >= self.max_ray_length {
                exhausted = true;
                break;
            }
            let next = start.step(back, 1);
            if !self.accepts(next, direction) {
                break;
            }
            start = next;
            steps += 1;
        }

        let mut end = start;
        let mut cells = 1;
        while !exhausted {
            if cells > self.max_ray_length {
                exhausted = true;
                break;
            }
            let next = end.step(direction, 1);
            if !self.accepts(next, direction) {
                break;
            }
            end = next;
            cells += 1;
        }

        Sonde {
            direction,
            start,
            end,
            cells,
            exhausted,
        }
    }

    fn accepts(&self, cell: Cell, direction: Direction8) -> bool {
        self.world.is_food(cell)
            && self.perpendicular_run(cell, direction) >= self.min_perpendicular_run
    }

    /// Food run through `cell` across `direction`, capped at the minimum needed.
    fn perpendicular_run(&self, cell: Cell, direction: Direction8) -> u32 {
        let across = direction.rotated_90();
        let mut run = 1;
        for side in [across, across.opposite()] {
            let mut k = 1;
            while run < self.min_perpendicular_run && self.world.is_food(staircase(cell, side, k)) {
                run += 1;
                k += 1;
            }
        }
        run
    }
}

/// `k`-th cell of a 4-connected walk from `cell` toward `side`. Diagonal
/// sides alternate an x step and a y step, so a diagonal stroke counts as
/// many cells across as it is thick along either axis.
fn staircase(cell: Cell, side: Direction8, k: i32) -> Cell {
    if !side.is_diagonal() {
        return cell.step(side, k);
    }
    let (dx, dy) = side.step();
    Cell::new(cell.x + dx * ((k + 1) / 2), cell.y + dy * (k / 2))
}
