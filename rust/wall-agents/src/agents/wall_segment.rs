// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Merged wall agent.
//!
//! A wall segment owns the co-axial mushrooms ("parts") of one physical
//! wall. It folds their boxes into one, yields to larger segments on the
//! same axis, snaps its parts onto the shared axis, measures how far the
//! stroke really runs and finally records the gaps between parts as
//! openings.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{AgentContext, Arena, Mushroom};
use crate::config::EngineConfig;
use crate::grid::World;
use crate::oriented_box::OrientedBox;
use crate::types::{AgentId, Cell, Direction8, WallType};

/// Lifecycle of a [`WallSegment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentState {
    Idle,
    Negotiate,
    Prune,
    Normalize,
    Fill,
    Extend,
    Fitting,
    Opening,
    Done,
    Error,
    Dead,
}

impl SegmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentState::Idle => "idle",
            SegmentState::Negotiate => "negotiate",
            SegmentState::Prune => "prune",
            SegmentState::Normalize => "normalize",
            SegmentState::Fill => "fill",
            SegmentState::Extend => "extend",
            SegmentState::Fitting => "fitting",
            SegmentState::Opening => "opening",
            SegmentState::Done => "done",
            SegmentState::Error => "error",
            SegmentState::Dead => "dead",
        }
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gap along a wall axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Opening {
    /// Distance of the gap centre from the start of the merged box
    pub offset: f64,
    pub width: f64,
}

/// Parallel boxes that overlap claim the same wall.
pub fn segments_conflict(a: &OrientedBox, b: &OrientedBox) -> bool {
    a.is_parallel_to(b, 0.0) && a.overlaps(b)
}

#[derive(Debug, Clone)]
pub struct WallSegment {
    id: AgentId,
    parts: Vec<AgentId>,
    collision_box: Option<OrientedBox>,
    extended_box: Option<OrientedBox>,
    openings: Vec<Opening>,
    wall_cells: FxHashSet<Cell>,
    wall_type: WallType,
    state: SegmentState,
    alive: bool,
}

impl WallSegment {
    pub fn new(id: AgentId, parts: Vec<AgentId>) -> Self {
        Self {
            id,
            parts,
            collision_box: None,
            extended_box: None,
            openings: Vec::new(),
            wall_cells: FxHashSet::default(),
            wall_type: WallType::Unknown,
            state: SegmentState::Idle,
            alive: true,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn parts(&self) -> &[AgentId] {
        &self.parts
    }

    pub fn collision_box(&self) -> Option<&OrientedBox> {
        self.collision_box.as_ref()
    }

    /// The merged box stretched to the physical end of the stroke.
    pub fn extended_box(&self) -> Option<&OrientedBox> {
        self.extended_box.as_ref()
    }

    pub fn openings(&self) -> &[Opening] {
        &self.openings
    }

    pub fn wall_cells(&self) -> &FxHashSet<Cell> {
        &self.wall_cells
    }

    pub fn wall_type(&self) -> WallType {
        self.wall_type
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self.state,
            SegmentState::Done | SegmentState::Error | SegmentState::Dead
        )
    }

    pub(crate) fn add_part(&mut self, part: AgentId) {
        if !self.parts.contains(&part) {
            self.parts.push(part);
        }
    }

    /// Drops a part; the segment dies once it has none left.
    pub(crate) fn remove_part(&mut self, part: AgentId) {
        self.parts.retain(|&p| p != part);
        self.invalidate();
    }

    /// The part set changed: measure everything again.
    pub fn invalidate(&mut self) {
        if self.alive && !matches!(self.state, SegmentState::Idle | SegmentState::Error) {
            self.state = SegmentState::Negotiate;
        }
    }

    pub(crate) fn run(&mut self, ctx: &mut AgentContext<'_>) {
        if !self.alive {
            return;
        }
        match self.state {
            SegmentState::Idle => self.state = SegmentState::Negotiate,
            SegmentState::Negotiate => self.negotiate(ctx),
            SegmentState::Prune => self.prune(ctx),
            SegmentState::Normalize => self.normalize(ctx.mushrooms),
            SegmentState::Fill => self.fill(ctx.world),
            SegmentState::Extend => self.extend(ctx.world, ctx.config),
            SegmentState::Fitting => self.fitting(ctx.mushrooms),
            SegmentState::Opening => self.opening(ctx),
            SegmentState::Error => self.kill(ctx.world),
            SegmentState::Done | SegmentState::Dead => {}
        }
    }

    fn negotiate(&mut self, ctx: &mut AgentContext<'_>) {
        self.release_cells(ctx.world);

        let mut merged: Option<OrientedBox> = None;
        let mut detached = Vec::new();
        for &part in &self.parts {
            let Some(bx) = ctx.mushrooms.get(&part).and_then(|m| m.collision_box()) else {
                detached.push(part);
                continue;
            };
            merged = match merged {
                None => Some(bx.clone()),
                Some(acc) => match acc.merge_aligned(bx) {
                    Ok(m) => Some(m),
                    Err(e) => {
                        debug!(id = %self.id, part = %part, error = %e, "part detached");
                        detached.push(part);
                        Some(acc)
                    }
                },
            };
        }

        for part in &detached {
            if let Some(m) = ctx.mushrooms.get_mut(part) {
                if m.wall_segment == Some(self.id) {
                    m.wall_segment = None;
                }
            }
        }
        let had_parts = !self.parts.is_empty();
        self.parts.retain(|p| !detached.contains(p));

        match merged {
            Some(bx) => {
                self.collision_box = Some(bx);
                self.state = SegmentState::Prune;
            }
            None if had_parts => {
                debug!(id = %self.id, "no part could be merged");
                self.state = SegmentState::Error;
            }
            None => self.kill(ctx.world),
        }
    }

    fn prune(&mut self, ctx: &mut AgentContext<'_>) {
        let Some(bx) = &self.collision_box else {
            self.state = SegmentState::Negotiate;
            return;
        };
        let area = bx.get_area();

        let dominator = ctx
            .segments
            .values()
            .filter(|s| s.alive)
            .find(|s| {
                s.collision_box.as_ref().map_or(false, |other| {
                    segments_conflict(bx, other)
                        && (other.get_area() > area || (other.get_area() == area && s.id < self.id))
                })
            })
            .map(|s| s.id);

        match dominator {
            Some(winner) => {
                debug!(id = %self.id, winner = %winner, "segment yields");
                let parts = std::mem::take(&mut self.parts);
                self.kill(ctx.world);
                ctx.adopt_parts(winner, parts);
            }
            None => self.state = SegmentState::Normalize,
        }
    }

    /// Puts every part on the segment's axis with the segment's width.
    fn normalize(&mut self, mushrooms: &mut Arena<Mushroom>) {
        let Some(axis) = &self.collision_box else {
            return;
        };
        for part in &self.parts {
            let Some(bx) = mushrooms.get_mut(part).and_then(|m| m.collision_box_mut()) else {
                continue;
            };
            let (t, _) = axis.project(&bx.center());
            bx.set_rotation(axis.rotation());
            bx.set_width(axis.width());
            bx.set_center(axis.center() + axis.get_direction() * t);
        }
        self.state = SegmentState::Fill;
    }

    fn fill(&mut self, world: &mut World) {
        if let Some(bx) = &self.collision_box {
            for cell in bx.iterate_covered_pixels() {
                if world.is_food(cell) && world.occupied_wall_mut().claim(cell, self.id) {
                    self.wall_cells.insert(cell);
                }
            }
        }
        self.state = SegmentState::Extend;
    }

    /// Follows food past both ends of the merged box.
    fn extend(&mut self, world: &World, config: &EngineConfig) {
        let Some(bx) = &self.collision_box else {
            return;
        };
        let axis = bx.direction8();
        let reach = |dir: Direction8| {
            let u = dir.unit();
            let step = dir.step_length();
            let base = bx.length() / 2.0 + 0.5;
            let mut k = 0;
            while k < config.max_crawl_length
                && world.is_food(Cell::from_point(&(bx.center() + u * (base + k as f64 * step))))
            {
                k += 1;
            }
            k as f64 * step
        };
        let forward = reach(axis);
        let backward = reach(axis.opposite());

        let d = bx.get_direction();
        let start = bx.start_point() - d * backward;
        let end = bx.end_point() + d * forward;
        self.extended_box = match OrientedBox::from_segment(start, end, bx.width()) {
            Ok(extended) => Some(extended),
            Err(e) => {
                debug!(id = %self.id, error = %e, "extent not measurable");
                None
            }
        };
        self.state = SegmentState::Fitting;
    }

    /// Majority of the parts' kinds; exterior wins a tie.
    fn fitting(&mut self, mushrooms: &Arena<Mushroom>) {
        let (mut exterior, mut interior) = (0, 0);
        for m in self.parts.iter().filter_map(|p| mushrooms.get(p)) {
            match m.wall_type() {
                WallType::Exterior => exterior += 1,
                WallType::Interior => interior += 1,
                WallType::Unknown => {}
            }
        }
        self.wall_type = if exterior == 0 && interior == 0 {
            WallType::Unknown
        } else if exterior >= interior {
            WallType::Exterior
        } else {
            WallType::Interior
        };
        self.state = SegmentState::Opening;
    }

    fn opening(&mut self, ctx: &mut AgentContext<'_>) {
        let settled = self.parts.iter().all(|p| match ctx.mushrooms.get(p) {
            Some(m) => m.is_settled(),
            None => !ctx.is_pending(*p),
        });
        if !settled {
            return;
        }

        self.openings = if self.is_segment_fully_occupied(ctx.world) {
            Vec::new()
        } else {
            self.detect_openings(ctx.mushrooms, ctx.config.min_opening_width)
        };
        trace!(id = %self.id, parts = self.parts.len(), openings = self.openings.len(), "segment settled");
        self.state = SegmentState::Done;
    }

    /// Every pixel on the centre line belongs to one of the parts.
    pub fn is_segment_fully_occupied(&self, world: &World) -> bool {
        let Some(bx) = &self.collision_box else {
            return false;
        };
        let d = bx.get_direction();
        let step = bx.direction8().step_length();
        let half = bx.length() / 2.0;
        let mut t = -half + 0.5;
        while t <= half + 1e-9 {
            let cell = Cell::from_point(&(bx.center() + d * t));
            match world.occupied().owner(cell) {
                Some(owner) if self.parts.contains(&owner) => {}
                _ => return false,
            }
            t += step;
        }
        true
    }

    /// Gaps between consecutive part spans along the axis.
    pub fn detect_openings(&self, mushrooms: &Arena<Mushroom>, min_width: f64) -> Vec<Opening> {
        let Some(axis) = &self.collision_box else {
            return Vec::new();
        };
        let mut spans: Vec<(f64, f64)> = self
            .parts
            .iter()
            .filter_map(|p| mushrooms.get(p))
            .filter(|m| m.is_alive())
            .filter_map(|m| m.collision_box())
            .map(|bx| axis.span_of(bx))
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        let start = -axis.length() / 2.0;
        let mut openings = Vec::new();
        let mut spans = spans.into_iter();
        let Some((_, mut reach)) = spans.next() else {
            return openings;
        };
        for (lo, hi) in spans {
            let width = lo - reach;
            if width > min_width {
                openings.push(Opening {
                    offset: (reach + lo) / 2.0 - start,
                    width,
                });
            }
            reach = reach.max(hi);
        }
        openings
    }

    fn release_cells(&mut self, world: &mut World) {
        for cell in self.wall_cells.drain() {
            world.occupied_wall_mut().release(cell, self.id);
        }
    }

    /// Kills the segment and hands back its parts.
    pub(crate) fn dissolve(&mut self, world: &mut World) -> Vec<AgentId> {
        let parts = std::mem::take(&mut self.parts);
        self.kill(world);
        parts
    }

    pub fn kill(&mut self, world: &mut World) {
        if self.alive {
            trace!(id = %self.id, state = %self.state, "segment killed");
        }
        self.alive = false;
        self.release_cells(world);
        self.state = SegmentState::Dead;
    }
}
