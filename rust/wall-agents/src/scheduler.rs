// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tick-based cooperative scheduler.
//!
//! One tick runs the world phase, then every live blob, mushroom and wall
//! segment once (in that order, ascending id within a kind), reaps the dead
//! and promotes at most one spawned candidate into the live set. Agents
//! spawned during a tick therefore never run in that same tick.

use std::collections::VecDeque;

use tracing::{debug, info, trace};

use crate::agents::{
    find_segment_mut, Agent, AgentContext, AgentKind, Arena, Blob, Mushroom, WallSegment,
};
use crate::config::EngineConfig;
use crate::graph::WallLine;
use crate::grid::{Grid, World};
use crate::types::{AgentId, Cell, IdGenerator};

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub promoted: Option<(AgentKind, AgentId)>,
    pub reaped: usize,
    pub seeded: Option<AgentId>,
}

/// Result of running to convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    /// `false` when the tick limit stopped the run
    pub converged: bool,
}

pub struct Scheduler {
    world: World,
    config: EngineConfig,
    ids: IdGenerator,
    blobs: Arena<Blob>,
    mushrooms: Arena<Mushroom>,
    segments: Arena<WallSegment>,
    candidates: VecDeque<Agent>,
    tick: u64,
    seed_cursor: usize,
    seeding_exhausted: bool,
}

impl Scheduler {
    pub fn new(world: World, config: EngineConfig) -> Self {
        Self {
            world,
            config,
            ids: IdGenerator::new(),
            blobs: Arena::new(),
            mushrooms: Arena::new(),
            segments: Arena::new(),
            candidates: VecDeque::new(),
            tick: 0,
            seed_cursor: 0,
            seeding_exhausted: false,
        }
    }

    pub fn from_grid(grid: Grid, config: EngineConfig) -> Self {
        Self::new(World::new(grid), config)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn pending_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn blobs(&self) -> impl Iterator<Item = &Blob> {
        self.blobs.values()
    }

    pub fn blob(&self, id: AgentId) -> Option<&Blob> {
        self.blobs.get(&id)
    }

    pub fn mushrooms(&self) -> impl Iterator<Item = &Mushroom> {
        self.mushrooms.values()
    }

    pub fn mushroom(&self, id: AgentId) -> Option<&Mushroom> {
        self.mushrooms.get(&id)
    }

    pub fn wall_segments(&self) -> impl Iterator<Item = &WallSegment> {
        self.segments.values()
    }

    pub fn wall_segment(&self, id: AgentId) -> Option<&WallSegment> {
        self.segments.get(&id)
    }

    /// Queues a blob at `cell`; it is promoted on a later tick.
    pub fn seed_blob(&mut self, cell: Cell) -> AgentId {
        let id = self.ids.next_id();
        self.candidates.push_back(Agent::Blob(Blob::new(id, cell)));
        id
    }

    /// Queues a stand-alone mushroom at `cell`.
    pub fn seed_mushroom(&mut self, cell: Cell) -> AgentId {
        let id = self.ids.next_id();
        self.candidates
            .push_back(Agent::Mushroom(Mushroom::new(id, None, cell)));
        id
    }

    /// Nothing pending, nothing left to seed, every agent at rest.
    pub fn is_settled(&self) -> bool {
        self.candidates.is_empty()
            && (!self.config.auto_seed_blobs || self.seeding_exhausted)
            && self.blobs.values().all(Blob::is_settled)
            && self.mushrooms.values().all(Mushroom::is_settled)
            && self.segments.values().all(WallSegment::is_settled)
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let seeded = self.stage_world();
        self.stage_blobs();
        self.stage_mushrooms();
        self.stage_segments();
        let reaped = self.stage_reap();
        let promoted = self.stage_promote();

        trace!(
            tick = self.tick,
            blobs = self.blobs.len(),
            mushrooms = self.mushrooms.len(),
            segments = self.segments.len(),
            pending = self.candidates.len(),
            "tick"
        );
        TickReport {
            tick: self.tick,
            promoted,
            reaped,
            seeded,
        }
    }

    /// Ticks until settled or `max_ticks` is reached.
    pub fn run_until_settled(&mut self) -> RunSummary {
        let start = self.tick;
        while !self.is_settled() {
            if self.tick - start >= self.config.max_ticks {
                info!(ticks = self.tick - start, "tick limit reached");
                return RunSummary {
                    ticks: self.tick - start,
                    converged: false,
                };
            }
            self.tick();
        }
        info!(
            ticks = self.tick - start,
            segments = self.segments.len(),
            mushrooms = self.mushrooms.len(),
            "simulation settled"
        );
        RunSummary {
            ticks: self.tick - start,
            converged: true,
        }
    }

    /// Centre lines of every live, fitted wall segment.
    pub fn wall_lines(&self) -> Vec<WallLine> {
        self.segments
            .values()
            .filter(|s| s.is_alive())
            .filter_map(WallLine::from_segment)
            .collect()
    }

    fn context(&mut self) -> AgentContext<'_> {
        AgentContext {
            world: &mut self.world,
            config: &self.config,
            ids: &mut self.ids,
            blobs: &mut self.blobs,
            mushrooms: &mut self.mushrooms,
            segments: &mut self.segments,
            candidates: &mut self.candidates,
        }
    }

    /// Seeds a blob at the next food cell no blob has claimed, in raster
    /// order, once everything else is idle.
    fn stage_world(&mut self) -> Option<AgentId> {
        if !self.config.auto_seed_blobs
            || self.seeding_exhausted
            || !self.candidates.is_empty()
            || !self.blobs.values().all(Blob::is_settled)
        {
            return None;
        }

        let mut next = None;
        let grid = self.world.grid();
        while self.seed_cursor < grid.len() {
            let cell = grid.cell_at(self.seed_cursor);
            self.seed_cursor += 1;
            if grid.is_food(cell) && !self.world.blob_grid().is_claimed(cell) {
                next = Some(cell);
                break;
            }
        }

        match next {
            Some(cell) => {
                let id = self.seed_blob(cell);
                debug!(id = %id, x = cell.x, y = cell.y, "blob seeded");
                Some(id)
            }
            None => {
                debug!(tick = self.tick, "seeding exhausted");
                self.seeding_exhausted = true;
                None
            }
        }
    }

    fn stage_blobs(&mut self) {
        let ids: Vec<AgentId> = self.blobs.keys().copied().collect();
        for id in ids {
            let Some(mut blob) = self.blobs.remove(&id) else {
                continue;
            };
            blob.run(&mut self.context());
            self.blobs.insert(id, blob);
        }
    }

    fn stage_mushrooms(&mut self) {
        let ids: Vec<AgentId> = self.mushrooms.keys().copied().collect();
        for id in ids {
            let Some(mut mushroom) = self.mushrooms.remove(&id) else {
                continue;
            };
            mushroom.run(&mut self.context());
            self.mushrooms.insert(id, mushroom);
        }
    }

    fn stage_segments(&mut self) {
        let ids: Vec<AgentId> = self.segments.keys().copied().collect();
        for id in ids {
            let Some(mut segment) = self.segments.remove(&id) else {
                continue;
            };
            segment.run(&mut self.context());
            self.segments.insert(id, segment);
        }
    }

    /// Removes dead agents, releasing their cells and dangling references.
    fn stage_reap(&mut self) -> usize {
        let mut reaped = 0;

        let dead: Vec<AgentId> = self
            .mushrooms
            .values()
            .filter(|m| !m.is_alive())
            .map(Mushroom::id)
            .collect();
        for id in dead {
            let Some(mut mushroom) = self.mushrooms.remove(&id) else {
                continue;
            };
            mushroom.kill(&mut self.world);
            if let Some(segment_id) = mushroom.wall_segment() {
                if let Some(segment) =
                    find_segment_mut(&mut self.segments, &mut self.candidates, segment_id)
                {
                    segment.remove_part(id);
                    if segment.parts().is_empty() {
                        segment.kill(&mut self.world);
                    }
                }
            }
            reaped += 1;
        }

        let dead: Vec<AgentId> = self
            .segments
            .values()
            .filter(|s| !s.is_alive())
            .map(WallSegment::id)
            .collect();
        for id in dead {
            let Some(mut segment) = self.segments.remove(&id) else {
                continue;
            };
            segment.kill(&mut self.world);
            for part in segment.parts() {
                if let Some(m) = self.mushrooms.get_mut(part) {
                    if m.wall_segment == Some(id) {
                        m.wall_segment = None;
                    }
                }
            }
            reaped += 1;
        }

        let dead: Vec<AgentId> = self
            .blobs
            .values()
            .filter(|b| !b.is_alive())
            .map(Blob::id)
            .collect();
        for id in dead {
            if let Some(mut blob) = self.blobs.remove(&id) {
                blob.release(&mut self.world);
                reaped += 1;
            }
        }

        if reaped > 0 {
            trace!(tick = self.tick, reaped, "reaped");
        }
        reaped
    }

    /// Moves the oldest live candidate into its arena.
    fn stage_promote(&mut self) -> Option<(AgentKind, AgentId)> {
        while let Some(agent) = self.candidates.pop_front() {
            if !agent.is_alive() {
                trace!(id = %agent.id(), kind = %agent.kind(), "dropped dead candidate");
                continue;
            }
            let promoted = (agent.kind(), agent.id());
            match agent {
                Agent::Blob(b) => {
                    self.blobs.insert(b.id(), b);
                }
                Agent::Mushroom(m) => {
                    self.mushrooms.insert(m.id(), m);
                }
                Agent::WallSegment(s) => {
                    self.segments.insert(s.id(), s);
                }
            }
            trace!(id = %promoted.1, kind = %promoted.0, "promoted");
            return Some(promoted);
        }
        None
    }
}
