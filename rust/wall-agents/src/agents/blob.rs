// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Region-growing agent.
//!
//! A blob floods one connected food region a ring per tick, then plants
//! mushrooms on its cells one at a time until every cell is either covered
//! by a wall candidate or has been tried.

use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use super::mushroom::Mushroom;
use super::{Agent, AgentContext};
use crate::grid::World;
use crate::types::{AgentId, Cell};

/// Lifecycle of a [`Blob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobStatus {
    Born,
    Grow,
    Mush,
    Done,
    Cleanup,
    Dead,
}

impl BlobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobStatus::Born => "born",
            BlobStatus::Grow => "grow",
            BlobStatus::Mush => "mush",
            BlobStatus::Done => "done",
            BlobStatus::Cleanup => "cleanup",
            BlobStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for BlobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Blob {
    id: AgentId,
    seed: Cell,
    cells: FxHashSet<Cell>,
    /// Cells in the order they were claimed
    order: Vec<Cell>,
    frontier: Vec<Cell>,
    free_slots: VecDeque<Cell>,
    status: BlobStatus,
    alive: bool,
    active_mushroom: Option<AgentId>,
    spawned: u32,
}

impl Blob {
    pub fn new(id: AgentId, seed: Cell) -> Self {
        Self {
            id,
            seed,
            cells: FxHashSet::default(),
            order: Vec::new(),
            frontier: Vec::new(),
            free_slots: VecDeque::new(),
            status: BlobStatus::Born,
            alive: true,
            active_mushroom: None,
            spawned: 0,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn seed(&self) -> Cell {
        self.seed
    }

    pub fn cells(&self) -> &FxHashSet<Cell> {
        &self.cells
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn status(&self) -> BlobStatus {
        self.status
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, BlobStatus::Done | BlobStatus::Dead)
    }

    pub fn active_mushroom(&self) -> Option<AgentId> {
        self.active_mushroom
    }

    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Mushrooms planted so far.
    pub fn spawned_count(&self) -> u32 {
        self.spawned
    }

    pub(crate) fn run(&mut self, ctx: &mut AgentContext<'_>) {
        if !self.alive {
            return;
        }
        match self.status {
            BlobStatus::Born => self.born(ctx.world),
            BlobStatus::Grow => self.grow(ctx),
            BlobStatus::Mush => self.mush(ctx),
            BlobStatus::Cleanup => self.cleanup(ctx.world),
            BlobStatus::Done | BlobStatus::Dead => {}
        }
    }

    fn born(&mut self, world: &mut World) {
        if !world.is_food(self.seed) || !world.blob_grid_mut().claim(self.seed, self.id) {
            trace!(id = %self.id, x = self.seed.x, y = self.seed.y, "seed unavailable");
            self.alive = false;
            self.status = BlobStatus::Dead;
            return;
        }
        self.cells.insert(self.seed);
        self.order.push(self.seed);
        self.frontier.push(self.seed);
        self.status = BlobStatus::Grow;
    }

    fn grow(&mut self, ctx: &mut AgentContext<'_>) {
        let mut next = Vec::new();
        let mut touching: Vec<AgentId> = Vec::new();

        for cell in std::mem::take(&mut self.frontier) {
            let neighbors: Vec<Cell> = ctx
                .world
                .get_neighbors_8(cell)
                .filter(|&c| ctx.world.is_food(c))
                .collect();
            for neighbor in neighbors {
                match ctx.world.blob_grid().owner(neighbor) {
                    None => {
                        if ctx.world.blob_grid_mut().claim(neighbor, self.id) {
                            self.cells.insert(neighbor);
                            self.order.push(neighbor);
                            next.push(neighbor);
                        }
                    }
                    Some(owner) if owner == self.id => {}
                    Some(other) => {
                        if !touching.contains(&other) {
                            touching.push(other);
                        }
                    }
                }
            }
        }
        self.frontier = next;

        for other in touching {
            if !self.alive {
                return;
            }
            self.merge_with(ctx, other);
        }
        if !self.alive {
            return;
        }

        if self.frontier.is_empty() {
            if self.cells.len() > ctx.config.min_blob_cells {
                self.free_slots = self.order.iter().copied().collect();
                trace!(id = %self.id, cells = self.cells.len(), "growth stalled");
                self.status = BlobStatus::Mush;
            } else {
                self.status = BlobStatus::Cleanup;
            }
        }
    }

    /// The larger of the two blobs eats the other.
    fn merge_with(&mut self, ctx: &mut AgentContext<'_>, other_id: AgentId) {
        let Some(other) = ctx.blobs.get_mut(&other_id) else {
            return;
        };
        if !other.alive {
            return;
        }
        if self.cells.len() >= other.cells.len() {
            debug!(eater = %self.id, eaten = %other_id, "blobs merged");
            self.eat(other, ctx.world);
            ctx.reparent_mushrooms(other_id, self.id);
        } else {
            debug!(eater = %other_id, eaten = %self.id, "blobs merged");
            other.eat(self, ctx.world);
            ctx.reparent_mushrooms(self.id, other_id);
        }
    }

    fn eat(&mut self, prey: &mut Blob, world: &mut World) {
        for cell in prey.cells.drain() {
            world.blob_grid_mut().force_claim(cell, self.id);
            self.cells.insert(cell);
        }
        self.order.append(&mut prey.order);
        self.frontier.append(&mut prey.frontier);
        self.free_slots.extend(prey.free_slots.drain(..));
        if self.active_mushroom.is_none() {
            self.active_mushroom = prey.active_mushroom.take();
        }
        self.spawned += prey.spawned;

        if !self.frontier.is_empty() {
            self.status = BlobStatus::Grow;
        } else if self.status == BlobStatus::Done && !self.free_slots.is_empty() {
            self.status = BlobStatus::Mush;
        }

        prey.alive = false;
        prey.status = BlobStatus::Dead;
    }

    fn mush(&mut self, ctx: &mut AgentContext<'_>) {
        if let Some(active) = self.active_mushroom {
            if ctx.mushroom_is_busy(active) {
                return;
            }
            self.active_mushroom = None;
        }

        while let Some(cell) = self.free_slots.pop_front() {
            if ctx.world.is_food(cell) && !ctx.world.is_occupied(cell) {
                let id = ctx.ids.next_id();
                ctx.spawn(Agent::Mushroom(Mushroom::new(id, Some(self.id), cell)));
                self.active_mushroom = Some(id);
                self.spawned += 1;
                return;
            }
        }

        debug!(id = %self.id, cells = self.cells.len(), mushrooms = self.spawned, "blob done");
        self.status = BlobStatus::Done;
    }

    fn cleanup(&mut self, world: &mut World) {
        trace!(id = %self.id, cells = self.cells.len(), "blob too small");
        self.release(world);
        self.alive = false;
        self.status = BlobStatus::Dead;
    }

    /// Gives every claimed cell back to the blob grid.
    pub fn release(&mut self, world: &mut World) {
        for cell in self.cells.drain() {
            world.blob_grid_mut().release(cell, self.id);
        }
        self.order.clear();
        self.frontier.clear();
        self.free_slots.clear();
    }
}
