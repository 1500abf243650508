// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The three agent kinds and the context they run in.
//!
//! Agents live in flat arenas keyed by [`AgentId`]; every cross-reference
//! (mushroom → blob, mushroom → wall segment, segment → parts) is an id.
//! While an agent runs it is taken out of its arena, so it can borrow every
//! other agent mutably through the [`AgentContext`].

pub mod blob;
pub mod mushroom;
pub mod wall_segment;

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::config::EngineConfig;
use crate::grid::World;
use crate::types::{AgentId, IdGenerator};

pub use blob::{Blob, BlobStatus};
pub use mushroom::{Mushroom, MushroomState};
pub use wall_segment::{segments_conflict, Opening, SegmentState, WallSegment};

/// Agent storage ordered by id, so every tick visits agents deterministically.
pub type Arena<T> = BTreeMap<AgentId, T>;

/// A newly created agent, tagged with its kind.
#[derive(Debug)]
pub enum Agent {
    Blob(Blob),
    Mushroom(Mushroom),
    WallSegment(WallSegment),
}

/// Discriminant for agent kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Blob,
    Mushroom,
    WallSegment,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Blob => "Blob",
            AgentKind::Mushroom => "Mushroom",
            AgentKind::WallSegment => "WallSegment",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Agent {
    pub fn id(&self) -> AgentId {
        match self {
            Agent::Blob(b) => b.id(),
            Agent::Mushroom(m) => m.id(),
            Agent::WallSegment(s) => s.id(),
        }
    }

    pub fn kind(&self) -> AgentKind {
        match self {
            Agent::Blob(_) => AgentKind::Blob,
            Agent::Mushroom(_) => AgentKind::Mushroom,
            Agent::WallSegment(_) => AgentKind::WallSegment,
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Agent::Blob(b) => b.is_alive(),
            Agent::Mushroom(m) => m.is_alive(),
            Agent::WallSegment(s) => s.is_alive(),
        }
    }
}

/// Everything an agent may touch during its step.
pub(crate) struct AgentContext<'a> {
    pub world: &'a mut World,
    pub config: &'a EngineConfig,
    pub ids: &'a mut IdGenerator,
    pub blobs: &'a mut Arena<Blob>,
    pub mushrooms: &'a mut Arena<Mushroom>,
    pub segments: &'a mut Arena<WallSegment>,
    /// Agents spawned but not yet promoted into the live arenas
    pub candidates: &'a mut VecDeque<Agent>,
}

impl AgentContext<'_> {
    /// Queues a new agent; it runs at the earliest on the next tick.
    pub fn spawn(&mut self, agent: Agent) {
        trace!(id = %agent.id(), kind = %agent.kind(), "agent spawned");
        self.candidates.push_back(agent);
    }

    pub fn is_pending(&self, id: AgentId) -> bool {
        self.candidates.iter().any(|a| a.id() == id)
    }

    pub fn mushroom(&self, id: AgentId) -> Option<&Mushroom> {
        self.mushrooms.get(&id).or_else(|| {
            self.candidates.iter().find_map(|a| match a {
                Agent::Mushroom(m) if m.id() == id => Some(m),
                _ => None,
            })
        })
    }

    /// A mushroom is busy while pending or while alive and unsettled.
    pub fn mushroom_is_busy(&self, id: AgentId) -> bool {
        self.mushroom(id)
            .map(|m| m.is_alive() && !m.is_settled())
            .unwrap_or(false)
    }

    pub fn segment(&self, id: AgentId) -> Option<&WallSegment> {
        self.segments.get(&id).or_else(|| {
            self.candidates.iter().find_map(|a| match a {
                Agent::WallSegment(s) if s.id() == id => Some(s),
                _ => None,
            })
        })
    }

    /// Moves every part of `loser` into `winner` and kills `loser`.
    pub fn merge_segments(&mut self, winner: AgentId, loser: AgentId) {
        if winner == loser {
            return;
        }
        let parts = match find_segment_mut(self.segments, self.candidates, loser) {
            Some(segment) => segment.dissolve(self.world),
            None => return,
        };
        self.adopt_parts(winner, parts);
    }

    /// Files `parts` under `winner`, re-pointing each mushroom at it.
    pub fn adopt_parts(&mut self, winner: AgentId, parts: Vec<AgentId>) {
        for &part in &parts {
            if let Some(m) = find_mushroom_mut(self.mushrooms, self.candidates, part) {
                m.wall_segment = Some(winner);
            }
        }
        if let Some(segment) = find_segment_mut(self.segments, self.candidates, winner) {
            for part in parts {
                segment.add_part(part);
            }
            segment.invalidate();
        }
    }

    /// Re-parents mushrooms of an eaten blob.
    pub fn reparent_mushrooms(&mut self, from: AgentId, to: AgentId) {
        let live = self.mushrooms.values_mut();
        let pending = self.candidates.iter_mut().filter_map(|a| match a {
            Agent::Mushroom(m) => Some(m),
            _ => None,
        });
        for m in live.chain(pending) {
            if m.blob == Some(from) {
                m.blob = Some(to);
            }
        }
    }
}

pub(crate) fn find_mushroom_mut<'b>(
    mushrooms: &'b mut Arena<Mushroom>,
    candidates: &'b mut VecDeque<Agent>,
    id: AgentId,
) -> Option<&'b mut Mushroom> {
    if let Some(m) = mushrooms.get_mut(&id) {
        return Some(m);
    }
    candidates.iter_mut().find_map(|a| match a {
        Agent::Mushroom(m) if m.id() == id => Some(m),
        _ => None,
    })
}

pub(crate) fn find_segment_mut<'b>(
    segments: &'b mut Arena<WallSegment>,
    candidates: &'b mut VecDeque<Agent>,
    id: AgentId,
) -> Option<&'b mut WallSegment> {
    if let Some(s) = segments.get_mut(&id) {
        return Some(s);
    }
    candidates.iter_mut().find_map(|a| match a {
        Agent::WallSegment(s) if s.id() == id => Some(s),
        _ => None,
    })
}
