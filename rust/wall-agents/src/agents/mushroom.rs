// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall candidate agent.
//!
//! A mushroom is planted on a free food cell by its blob, fits an oriented
//! box to the stroke it sits on, claims the covered cells and then walks its
//! own axis to find collinear neighbours it should share a wall with.

use std::fmt;

use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use super::wall_segment::WallSegment;
use super::{find_mushroom_mut, Agent, AgentContext};
use crate::agents::blob::Blob;
use crate::config::EngineConfig;
use crate::grid::World;
use crate::oriented_box::OrientedBox;
use crate::scanner::WallScanner;
use crate::types::{AgentId, Cell, Direction8, WallType};

/// Lifecycle of a [`Mushroom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MushroomState {
    RayTrace,
    FillPhase,
    Pruning,
    WallType,
    Center,
    Overlap,
    Crawl,
    Wrapup,
    Done,
    Dead,
}

impl MushroomState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MushroomState::RayTrace => "ray_trace",
            MushroomState::FillPhase => "fill_phase",
            MushroomState::Pruning => "pruning",
            MushroomState::WallType => "wall_type",
            MushroomState::Center => "center",
            MushroomState::Overlap => "overlap",
            MushroomState::Crawl => "crawl",
            MushroomState::Wrapup => "wrapup",
            MushroomState::Done => "done",
            MushroomState::Dead => "dead",
        }
    }

    /// The box is fitted and the shape checks passed.
    fn is_fitted(&self) -> bool {
        !matches!(
            self,
            MushroomState::RayTrace | MushroomState::FillPhase | MushroomState::Pruning
        )
    }
}

impl fmt::Display for MushroomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stations along the stem where margins are sampled.
const MARGIN_STATIONS: usize = 5;

/// Largest share of the occupation ratio a re-centering move may give up.
const MAX_RECENTER_RATIO_LOSS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Oriented wall candidate.
#[derive(Debug, Clone)]
pub struct Mushroom {
    id: AgentId,
    pub(crate) blob: Option<AgentId>,
    seed: Cell,
    collision_box: Option<OrientedBox>,
    root_cells: FxHashSet<Cell>,
    margin_left: f64,
    margin_right: f64,
    gap_left: Option<f64>,
    gap_right: Option<f64>,
    wall_type: WallType,
    alive: bool,
    state: MushroomState,
    pub(crate) wall_segment: Option<AgentId>,
    co_axial_walls: Vec<AgentId>,
    scan_retries: u32,
    center_iterations: u32,
    recenter_pending: bool,
}

impl Mushroom {
    pub fn new(id: AgentId, blob: Option<AgentId>, seed: Cell) -> Self {
        Self {
            id,
            blob,
            seed,
            collision_box: None,
            root_cells: FxHashSet::default(),
            margin_left: 0.0,
            margin_right: 0.0,
            gap_left: None,
            gap_right: None,
            wall_type: WallType::Unknown,
            alive: true,
            state: MushroomState::RayTrace,
            wall_segment: None,
            co_axial_walls: Vec::new(),
            scan_retries: 0,
            center_iterations: 0,
            recenter_pending: false,
        }
    }

    /// Starts from a known box, skipping the scan.
    pub fn from_box(id: AgentId, blob: Option<AgentId>, collision_box: OrientedBox) -> Self {
        let seed = Cell::from_point(&collision_box.center());
        Self {
            collision_box: Some(collision_box),
            state: MushroomState::FillPhase,
            ..Self::new(id, blob, seed)
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn blob(&self) -> Option<AgentId> {
        self.blob
    }

    pub fn seed(&self) -> Cell {
        self.seed
    }

    pub fn collision_box(&self) -> Option<&OrientedBox> {
        self.collision_box.as_ref()
    }

    pub(crate) fn collision_box_mut(&mut self) -> Option<&mut OrientedBox> {
        self.collision_box.as_mut()
    }

    pub fn root_cells(&self) -> &FxHashSet<Cell> {
        &self.root_cells
    }

    /// Food overhang beyond each side, `(left, right)`.
    pub fn margins(&self) -> (f64, f64) {
        (self.margin_left, self.margin_right)
    }

    /// Free run beyond each margin until food returns, `(left, right)`.
    pub fn gaps(&self) -> (Option<f64>, Option<f64>) {
        (self.gap_left, self.gap_right)
    }

    pub fn wall_type(&self) -> WallType {
        self.wall_type
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn state(&self) -> MushroomState {
        self.state
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, MushroomState::Done | MushroomState::Dead)
    }

    pub fn wall_segment(&self) -> Option<AgentId> {
        self.wall_segment
    }

    pub fn co_axial_walls(&self) -> &[AgentId] {
        &self.co_axial_walls
    }

    /// Claimed cells per unit of box area.
    pub fn occupation_ratio(&self) -> f64 {
        match &self.collision_box {
            Some(b) if b.get_area() > 0.0 => self.root_cells.len() as f64 / b.get_area(),
            _ => 0.0,
        }
    }

    pub(crate) fn run(&mut self, ctx: &mut AgentContext<'_>) {
        if !self.alive {
            return;
        }
        match self.state {
            MushroomState::RayTrace => self.ray_trace(ctx),
            MushroomState::FillPhase => self.fill_phase(ctx.world, ctx.config),
            MushroomState::Pruning => self.pruning(ctx.world, ctx.config),
            MushroomState::WallType => self.wall_type_phase(ctx.world, ctx.config),
            MushroomState::Center => self.center_phase(ctx.world, ctx.config),
            MushroomState::Overlap => self.overlap_phase(ctx),
            MushroomState::Crawl => self.crawl_phase(ctx),
            MushroomState::Wrapup => self.wrapup(ctx),
            MushroomState::Done | MushroomState::Dead => {}
        }
    }

    fn ray_trace(&mut self, ctx: &mut AgentContext<'_>) {
        let origin = self
            .collision_box
            .as_ref()
            .map(|b| Cell::from_point(&b.center()))
            .unwrap_or(self.seed);
        let scan = WallScanner::new(ctx.world, ctx.config)
            .scan_for_walls(origin, &ctx.config.scan_directions);

        match scan.calculate_result(ctx.config) {
            Ok(fit) => {
                trace!(id = %self.id, rotation = fit.rotation, width = fit.width, length = fit.length, "scan fitted");
                self.collision_box = Some(fit.to_box());
                self.state = MushroomState::FillPhase;
            }
            Err(rejection)
                if rejection.is_deferred() && self.scan_retries < ctx.config.max_scan_retries =>
            {
                self.scan_retries += 1;
                trace!(id = %self.id, retry = self.scan_retries, "scan deferred");
            }
            Err(rejection) => {
                debug!(id = %self.id, reason = %rejection, "scan rejected");
                self.kill(ctx.world);
            }
        }
    }

    fn fill_phase(&mut self, world: &mut World, config: &EngineConfig) {
        if let Some(bx) = self.collision_box.as_mut() {
            if Self::detect_bleed_along_collision_box(world, bx, config.bleed_ratio) {
                trace!(id = %self.id, width = bx.width(), "bleed absorbed");
            }
        }
        self.claim_box_cells(world);
        self.state = MushroomState::Pruning;
    }

    /// Grows the box by one normal step toward every side whose outside row
    /// is mostly food while the row beyond it is not. Rows are walked in
    /// whole `normal8` steps from the centre line. Returns whether it grew.
    pub fn detect_bleed_along_collision_box(world: &World, bx: &mut OrientedBox, ratio: f64) -> bool {
        let d = bx.get_direction();
        let step = bx.direction8().step_length();
        let half_length = bx.length() / 2.0;

        let mut samples = Vec::new();
        let mut t = -half_length + 0.5;
        while t <= half_length - 0.5 + 1e-9 {
            samples.push(t);
            t += step;
        }
        if samples.is_empty() {
            samples.push(0.0);
        }
        let count = samples.len() as f64;
        let centre_line: Vec<Cell> = samples
            .iter()
            .map(|&t| Cell::from_point(&(bx.center() + d * t)))
            .collect();

        let normal = bx.normal8();
        let reach = (bx.width() / normal.step_length()).ceil() as i32 + 2;
        let mut shifts = Vec::new();
        for side in [normal, normal.opposite()] {
            let (mut outside, mut beyond) = (0.0, 0.0);
            for &cell in &centre_line {
                let Some(k) = (1..=reach).find(|&k| !bx.is_point_inside(&cell.step(side, k).center()))
                else {
                    continue;
                };
                if world.is_food(cell.step(side, k)) {
                    outside += 1.0;
                }
                if world.is_food(cell.step(side, k + 1)) {
                    beyond += 1.0;
                }
            }
            if outside >= ratio * count && beyond < (1.0 - ratio) * count {
                shifts.push(side);
            }
        }

        for side in &shifts {
            let grow = side.step_length();
            bx.set_width(bx.width() + grow);
            bx.translate(side.unit() * (grow / 2.0));
        }
        !shifts.is_empty()
    }

    fn claim_box_cells(&mut self, world: &mut World) {
        let Some(bx) = &self.collision_box else {
            return;
        };
        for cell in bx.iterate_covered_pixels() {
            if world.occupy(cell, self.id) {
                self.root_cells.insert(cell);
            }
        }
    }

    fn release_cells(&mut self, world: &mut World) {
        for cell in self.root_cells.drain() {
            world.free(cell, self.id);
        }
    }

    fn is_shape_valid(&self, world: &World, config: &EngineConfig) -> bool {
        let Some(bx) = &self.collision_box else {
            return false;
        };
        world.is_food(Cell::from_point(&bx.center()))
            && bx.length() > bx.width()
            && bx.width() > config.min_wall_width
            && bx.width() < config.max_wall_width
    }

    fn pruning(&mut self, world: &mut World, config: &EngineConfig) {
        if self.is_shape_valid(world, config) {
            self.state = MushroomState::WallType;
        } else {
            debug!(id = %self.id, "pruned: not wall-shaped");
            self.kill(world);
        }
    }

    fn wall_type_phase(&mut self, world: &mut World, config: &EngineConfig) {
        self.measure_margins(world, config);
        self.wall_type = match (self.gap_left, self.gap_right) {
            (Some(_), Some(_)) => WallType::Interior,
            (Some(_), None) | (None, Some(_)) => WallType::Exterior,
            (None, None) => WallType::Unknown,
        };
        self.state = MushroomState::Center;
    }

    /// Walks outward on both sides from several stations along the stem:
    /// food overhang first, then the free run until food comes back. Each
    /// side keeps the station with the median overhang, so a stroke crossing
    /// the wall at one station does not count as overhang.
    fn measure_margins(&mut self, world: &World, config: &EngineConfig) {
        let Some(bx) = &self.collision_box else {
            return;
        };
        let normal = bx.normal8();
        let d = bx.get_direction();
        let stations: Vec<Point2<f64>> = (0..MARGIN_STATIONS)
            .map(|i| {
                let f = (i as f64 + 0.5) / MARGIN_STATIONS as f64 - 0.5;
                bx.center() + d * (f * bx.length())
            })
            .collect();

        let measure = |origin: Point2<f64>, side: Side| {
            let dir: Direction8 = match side {
                Side::Right => normal,
                Side::Left => normal.opposite(),
            };
            let u: Vector2<f64> = dir.unit();
            let step = dir.step_length();
            let base = bx.width() / 2.0 + 0.5;
            let at = |k: u32| Cell::from_point(&(origin + u * (base + k as f64 * step)));

            let mut k = 0;
            while k < config.max_margin && world.is_food(at(k)) {
                k += 1;
            }
            let margin = k as f64 * step;

            let mut free = 0u32;
            let mut gap = None;
            while k < config.max_margin {
                let cell = at(k);
                if !world.in_bounds(cell) {
                    break;
                }
                if world.is_food(cell) {
                    gap = Some(free as f64 * step);
                    break;
                }
                free += 1;
                k += 1;
            }
            (margin, gap)
        };
        let median = |side: Side| {
            let mut runs: Vec<(f64, Option<f64>)> = stations.iter().map(|&p| measure(p, side)).collect();
            runs.sort_by(|a, b| a.0.total_cmp(&b.0));
            runs[runs.len() / 2]
        };

        let (margin_left, gap_left) = median(Side::Left);
        let (margin_right, gap_right) = median(Side::Right);
        self.margin_left = margin_left;
        self.margin_right = margin_right;
        self.gap_left = gap_left;
        self.gap_right = gap_right;
    }

    fn center_phase(&mut self, world: &mut World, config: &EngineConfig) {
        self.recenter_pending = false;
        if self.center_iterations < config.max_center_iterations {
            if let Some(candidate) = self.recentered_box(config) {
                self.center_iterations += 1;
                let kept = self.occupation_ratio() * (1.0 - MAX_RECENTER_RATIO_LOSS);
                if self.claimable_ratio(world, &candidate) >= kept {
                    trace!(id = %self.id, margins = ?self.margins(), width = candidate.width(), "re-centering");
                    self.release_cells(world);
                    self.collision_box = Some(candidate);
                    self.claim_box_cells(world);
                    self.recenter_pending = true;
                } else {
                    trace!(id = %self.id, margins = ?self.margins(), "re-centering rejected");
                }
            }
        }
        self.state = MushroomState::Overlap;
    }

    /// The box moved toward the larger overhang, at most half its width.
    /// When food overhangs both sides the box also widens over it.
    fn recentered_box(&self, config: &EngineConfig) -> Option<OrientedBox> {
        let bx = self.collision_box.as_ref()?;
        let (left, right) = (self.margin_left, self.margin_right);
        let asymmetry = right - left;
        let widen = left.min(right) > 0.0 && bx.width() + left + right < config.max_wall_width;
        if !widen && asymmetry.abs() <= config.center_tolerance {
            return None;
        }

        let mut candidate = bx.clone();
        if widen {
            candidate.set_width(bx.width() + left + right);
        }
        let limit = candidate.width() / 2.0;
        candidate.translate(bx.get_normal() * (asymmetry / 2.0).clamp(-limit, limit));
        Some(candidate)
    }

    /// Share of `candidate` this mushroom could hold: covered food cells that
    /// are free or already its own, per unit of area.
    fn claimable_ratio(&self, world: &World, candidate: &OrientedBox) -> f64 {
        if candidate.get_area() <= 0.0 {
            return 0.0;
        }
        let claimable = candidate
            .iterate_covered_pixels()
            .into_iter()
            .filter(|&cell| {
                world.is_food(cell) && world.occupied().owner(cell).map_or(true, |o| o == self.id)
            })
            .count();
        claimable as f64 / candidate.get_area()
    }

    fn overlap_phase(&mut self, ctx: &mut AgentContext<'_>) {
        let Some(bx) = self.collision_box.clone() else {
            self.kill(ctx.world);
            return;
        };
        let my_ratio = self.occupation_ratio();

        let siblings: Vec<AgentId> = ctx
            .mushrooms
            .values()
            .filter(|m| m.alive && m.blob == self.blob && m.state.is_fitted())
            .filter(|m| {
                m.collision_box
                    .as_ref()
                    .map_or(false, |other| bx.is_parallel_to(other, 0.0) && bx.overlaps(other))
            })
            .map(|m| m.id)
            .collect();

        for sibling_id in siblings {
            let Some(sibling) = ctx.mushrooms.get_mut(&sibling_id) else {
                continue;
            };
            let their_ratio = sibling.occupation_ratio();
            let self_loses =
                my_ratio < their_ratio || (my_ratio == their_ratio && self.id > sibling_id);
            if self_loses {
                debug!(id = %self.id, winner = %sibling_id, "lost overlap");
                self.kill(ctx.world);
                return;
            }
            debug!(id = %sibling_id, winner = %self.id, "lost overlap");
            sibling.kill(ctx.world);
        }

        if self.recenter_pending {
            self.measure_margins(ctx.world, ctx.config);
            self.state = MushroomState::Center;
        } else {
            self.state = MushroomState::Crawl;
        }
    }

    fn crawl_phase(&mut self, ctx: &mut AgentContext<'_>) {
        let Some(bx) = self.collision_box.clone() else {
            self.kill(ctx.world);
            return;
        };
        let axis = bx.direction8();
        for dir in [axis, axis.opposite()] {
            self.crawl_ray(ctx, &bx, dir);
        }
        self.join_wall_segment(ctx);
        self.state = MushroomState::Wrapup;
    }

    fn crawl_ray(&mut self, ctx: &mut AgentContext<'_>, bx: &OrientedBox, dir: Direction8) {
        let u = dir.unit();
        let step = dir.step_length();
        let base = bx.length() / 2.0 + 0.5;
        let mut non_food = 0u32;

        for k in 0..ctx.config.max_crawl_length {
            let p: Point2<f64> = bx.center() + u * (base + k as f64 * step);
            let cell = Cell::from_point(&p);
            if !ctx.world.in_bounds(cell) {
                break;
            }
            if !ctx.world.is_food(cell) {
                non_food += 1;
                if non_food > ctx.config.max_opening_length {
                    break;
                }
                continue;
            }
            non_food = 0;

            match ctx.world.occupied().owner(cell) {
                Some(owner) if owner == self.id => {}
                Some(owner) => {
                    let co_axial = ctx
                        .mushrooms
                        .get(&owner)
                        .and_then(|m| m.collision_box.as_ref())
                        .map_or(false, |other| {
                            bx.is_on_same_axis_as(other, ctx.config.axis_offset_tolerance)
                        });
                    if co_axial && !self.co_axial_walls.contains(&owner) {
                        trace!(id = %self.id, other = %owner, "co-axial wall found");
                        self.co_axial_walls.push(owner);
                    }
                }
                None => {
                    if !ctx.world.blob_grid().is_claimed(cell) {
                        let blob_id = ctx.ids.next_id();
                        debug!(id = %self.id, blob = %blob_id, x = cell.x, y = cell.y, "branch found");
                        ctx.spawn(Agent::Blob(Blob::new(blob_id, cell)));
                        break;
                    }
                }
            }
        }
    }

    fn join_wall_segment(&mut self, ctx: &mut AgentContext<'_>) {
        let mut segments: Vec<AgentId> = self
            .co_axial_walls
            .iter()
            .filter_map(|&m| ctx.mushroom(m).and_then(|m| m.wall_segment))
            .filter(|&s| ctx.segment(s).map_or(false, |s| s.is_alive()))
            .collect();
        segments.sort();
        segments.dedup();

        let winner = segments.iter().copied().fold(None, |best: Option<AgentId>, s| {
            let score = ctx.segment(s).map_or(0, |s| s.parts().len());
            match best {
                Some(b) if ctx.segment(b).map_or(0, |b| b.parts().len()) >= score => Some(b),
                _ => Some(s),
            }
        });

        match winner {
            Some(winner) => {
                for &loser in segments.iter().filter(|&&s| s != winner) {
                    debug!(winner = %winner, loser = %loser, "wall segments merged");
                    ctx.merge_segments(winner, loser);
                }
                ctx.adopt_parts(winner, vec![self.id]);
                self.wall_segment = Some(winner);
            }
            None => {
                let segment_id = ctx.ids.next_id();
                debug!(id = %self.id, segment = %segment_id, "wall segment created");
                ctx.spawn(Agent::WallSegment(WallSegment::new(segment_id, vec![self.id])));
                self.wall_segment = Some(segment_id);
            }
        }
    }

    fn wrapup(&mut self, ctx: &mut AgentContext<'_>) {
        if !self.is_shape_valid(ctx.world, ctx.config) {
            debug!(id = %self.id, "invalid at wrapup");
            self.kill(ctx.world);
            return;
        }
        self.force_fill(ctx);
        self.state = MushroomState::Done;
    }

    /// Takes every covered food cell, whoever held it.
    fn force_fill(&mut self, ctx: &mut AgentContext<'_>) {
        let Some(bx) = &self.collision_box else {
            return;
        };
        for cell in bx.iterate_covered_pixels() {
            if !ctx.world.is_food(cell) {
                continue;
            }
            if let Some(previous) = ctx.world.force_occupy(cell, self.id) {
                if previous != self.id {
                    if let Some(m) = find_mushroom_mut(ctx.mushrooms, ctx.candidates, previous) {
                        m.root_cells.remove(&cell);
                    }
                }
            }
            self.root_cells.insert(cell);
        }
    }

    /// Marks the mushroom dead and releases every cell it holds.
    pub fn kill(&mut self, world: &mut World) {
        if self.alive {
            trace!(id = %self.id, state = %self.state, cells = self.root_cells.len(), "mushroom killed");
        }
        self.alive = false;
        self.release_cells(world);
        self.state = MushroomState::Dead;
    }

    /// A fitted, filled and settled mushroom for tests that start from parts.
    #[cfg(test)]
    pub(crate) fn settled(id: AgentId, collision_box: OrientedBox, world: &mut World) -> Self {
        let mut m = Self::from_box(id, None, collision_box);
        m.claim_box_cells(world);
        m.state = MushroomState::Done;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::Harness;
    use crate::grid::Grid;
    use approx::assert_relative_eq;

    fn band() -> World {
        World::new(Grid::from_fn(16, 12, |x, y| {
            (2..=11).contains(&x) && (4..=6).contains(&y)
        }))
    }

    fn step_until(harness: &mut Harness, m: &mut Mushroom, state: MushroomState) {
        for _ in 0..16 {
            if m.state() == state || !m.is_alive() {
                return;
            }
            m.run(&mut harness.context());
        }
    }

    #[test]
    fn test_fit_and_claim() {
        let mut harness = Harness::new(band());
        let id = harness.ids.next_id();
        let mut m = Mushroom::new(id, None, Cell::new(2, 4));

        step_until(&mut harness, &mut m, MushroomState::WallType);
        assert!(m.is_alive());
        let bx = m.collision_box().unwrap();
        assert_eq!(bx.rotation(), 0.0);
        assert_relative_eq!(bx.center(), Point2::new(6.5, 5.0));
        assert_eq!(m.root_cells().len(), 30);
        assert_relative_eq!(m.occupation_ratio(), 1.0);
    }

    #[test]
    fn test_bleed_widens_toward_food_side() {
        // rows 4..=7 are food, but the box only covers 4..=6
        let world = World::new(Grid::from_fn(16, 12, |x, y| {
            (2..=11).contains(&x) && (4..=7).contains(&y)
        }));
        let mut bx = OrientedBox::new(Point2::new(6.5, 5.0), 3.0, 10.0, 0.0);
        assert!(Mushroom::detect_bleed_along_collision_box(&world, &mut bx, 0.8));
        assert_relative_eq!(bx.width(), 4.0);
        assert_relative_eq!(bx.center(), Point2::new(6.5, 5.5));

        let mut exact = OrientedBox::new(Point2::new(6.5, 5.5), 4.0, 10.0, 0.0);
        assert!(!Mushroom::detect_bleed_along_collision_box(&world, &mut exact, 0.8));
    }

    #[test]
    fn test_open_area_is_killed() {
        let mut harness = Harness::new(World::new(Grid::from_fn(30, 30, |_, _| true)));
        let id = harness.ids.next_id();
        let mut m = Mushroom::new(id, None, Cell::new(15, 15));
        m.run(&mut harness.context());
        assert!(!m.is_alive());
        assert_eq!(m.state(), MushroomState::Dead);
    }

    #[test]
    fn test_kill_releases_every_cell() {
        let mut harness = Harness::new(band());
        let id = harness.ids.next_id();
        let mut m = Mushroom::new(id, None, Cell::new(2, 4));
        step_until(&mut harness, &mut m, MushroomState::Pruning);
        assert_eq!(harness.world.occupied().count_owned_by(id), 30);

        m.kill(&mut harness.world);
        assert!(m.root_cells().is_empty());
        assert_eq!(harness.world.occupied().count_owned_by(id), 0);
    }

    #[test]
    fn test_wall_type_from_gaps() {
        // band with food again at rows 9..=10: gap only on the +normal side
        let world = World::new(Grid::from_fn(16, 12, |x, y| {
            (2..=11).contains(&x) && ((4..=6).contains(&y) || (9..=10).contains(&y))
        }));
        let mut harness = Harness::new(world);
        let id = harness.ids.next_id();
        let mut m = Mushroom::new(id, None, Cell::new(2, 4));
        step_until(&mut harness, &mut m, MushroomState::Center);

        assert_eq!(m.gaps(), (None, Some(2.0)));
        assert_eq!(m.margins(), (0.0, 0.0));
        assert_eq!(m.wall_type(), WallType::Exterior);
    }

    #[test]
    fn test_bar_of_a_t_stays_on_its_stroke() {
        // the stem leaves the bar right under its centre
        let world = World::new(Grid::from_fn(60, 50, |x, y| {
            ((5..=54).contains(&x) && (5..=8).contains(&y))
                || ((28..=31).contains(&x) && (5..=44).contains(&y))
        }));
        let mut harness = Harness::new(world);
        let id = harness.ids.next_id();
        let mut m = Mushroom::new(id, None, Cell::new(5, 5));
        step_until(&mut harness, &mut m, MushroomState::Crawl);

        assert!(m.is_alive());
        assert_eq!(m.margins(), (0.0, 0.0));
        let bx = m.collision_box().unwrap();
        assert_relative_eq!(bx.center(), Point2::new(29.5, 6.5));
        assert_relative_eq!(bx.width(), 4.0);
        assert_eq!(m.root_cells().len(), 200);
    }

    #[test]
    fn test_narrow_diagonal_box_grows_over_its_stroke() {
        // 45° band 8 cells thick along each axis, axis on x - y = 3.5
        let world = World::new(Grid::from_fn(60, 60, |x, y| {
            (0..=7).contains(&(x - y)) && (8..=100).contains(&(x + y))
        }));
        let mut harness = Harness::new(world);
        let id = harness.ids.next_id();
        let narrow = OrientedBox::new(Point2::new(31.0, 29.0), 1.0 + std::f64::consts::SQRT_2, 30.0, 45.0);
        let mut m = Mushroom::from_box(id, None, narrow);
        step_until(&mut harness, &mut m, MushroomState::Crawl);

        assert!(m.is_alive());
        let bx = m.collision_box().unwrap();
        assert_eq!(bx.rotation(), 45.0);
        assert!(bx.width() > 3.5, "width {}", bx.width());
        let axis_offset = (bx.center().x - bx.center().y - 3.5).abs() / std::f64::consts::SQRT_2;
        assert!(axis_offset <= 1.0, "centre {:?}", bx.center());
    }

    #[test]
    fn test_recentering_is_capped_at_half_the_width() {
        let mut harness = Harness::new(band());
        let id = harness.ids.next_id();
        let mut m = Mushroom::from_box(id, None, OrientedBox::new(Point2::new(6.5, 5.0), 3.0, 10.0, 0.0));
        m.margin_left = 20.0;
        let candidate = m.recentered_box(&harness.config).unwrap();
        assert_relative_eq!(candidate.center(), Point2::new(6.5, 3.5));
        assert_relative_eq!(candidate.width(), 3.0);
    }

    #[test]
    fn test_recentering_off_the_stroke_is_rejected() {
        let mut harness = Harness::new(band());
        let id = harness.ids.next_id();
        let mut m = Mushroom::new(id, None, Cell::new(2, 4));
        step_until(&mut harness, &mut m, MushroomState::Center);

        // overhang that is not there: the move would leave most cells off food
        m.margin_right = 6.0;
        m.run(&mut harness.context());
        assert_eq!(m.state(), MushroomState::Overlap);
        assert_relative_eq!(m.collision_box().unwrap().center(), Point2::new(6.5, 5.0));
        assert_eq!(m.root_cells().len(), 30);
    }

    #[test]
    fn test_crawl_collects_co_axial_and_creates_segment() {
        // two pieces of one wall separated by a 4-pixel opening
        let world = World::new(Grid::from_fn(40, 12, |x, y| {
            (4..=6).contains(&y) && ((2..=13).contains(&x) || (18..=29).contains(&x))
        }));
        let mut harness = Harness::new(world);
        let left_id = harness.ids.next_id();
        let right_id = harness.ids.next_id();

        let right = Mushroom::settled(
            right_id,
            OrientedBox::new(Point2::new(23.5, 5.0), 3.0, 12.0, 0.0),
            &mut harness.world,
        );
        harness.mushrooms.insert(right_id, right);

        let mut left = Mushroom::new(left_id, None, Cell::new(2, 4));
        step_until(&mut harness, &mut left, MushroomState::Done);

        assert!(left.is_alive());
        assert_eq!(left.co_axial_walls(), &[right_id]);
        let segment = left.wall_segment().unwrap();
        assert!(matches!(
            harness.candidates.back(),
            Some(Agent::WallSegment(s)) if s.id() == segment
        ));
    }
}
