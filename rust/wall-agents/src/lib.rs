// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Agent-based wall reconstruction from rasterized floor plans
//!
//! Instead of fitting lines to edges, this crate lets small geometric agents
//! consume the wall strokes of a binarized plan:
//! 1. **Blobs** flood connected stroke regions and plant candidates on them
//! 2. **Mushrooms** fit an oriented box to the stroke under them, claim its
//!    pixels and look along their axis for collinear neighbours
//! 3. **Wall segments** merge collinear mushrooms into one wall and record
//!    the gaps between them as openings
//! 4. The **intersection solver** turns the settled walls into a node/edge
//!    graph
//!
//! # Usage
//!
//! ```rust,ignore
//! use ifc_lite_wall_agents::{
//!     raster::{load_grid, RasterOptions},
//!     reconstruct, EngineConfig, ExportConfig,
//! };
//!
//! let grid = load_grid(Path::new("plan.png"), &RasterOptions::default())?;
//! let result = reconstruct(grid, &EngineConfig::default(), &ExportConfig::default());
//! println!("{} walls", result.graph.edges.len());
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod grid;
pub mod oriented_box;
pub mod raster;
pub mod scanner;
pub mod scheduler;
pub mod types;

pub use agents::{Agent, AgentKind, Blob, Mushroom, Opening, WallSegment};
pub use config::{EngineConfig, ExportConfig};
pub use error::{Error, Result};
pub use export::{write_json, GraphDocument, GraphWriter};
pub use graph::{Edge, FloorGraph, IntersectionSolver, Node, WallLine};
pub use grid::{Grid, World};
pub use oriented_box::OrientedBox;
pub use scheduler::{RunSummary, Scheduler};
pub use types::{AgentId, Cell, Direction8, OpeningType, WallType};

/// Everything one reconstruction run produced.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub graph: FloorGraph,
    /// Wall pairs the solver considers the same wall
    pub merge_candidates: Vec<(AgentId, AgentId)>,
    pub wall_lines: Vec<WallLine>,
    pub summary: RunSummary,
}

/// Runs the agents on `grid` until they settle, then solves the graph.
pub fn reconstruct(grid: Grid, engine: &EngineConfig, export: &ExportConfig) -> Reconstruction {
    let mut scheduler = Scheduler::from_grid(grid, engine.clone());
    let summary = scheduler.run_until_settled();
    let wall_lines = scheduler.wall_lines();
    let solved = IntersectionSolver::new(engine, export).solve(&wall_lines);

    Reconstruction {
        graph: solved.graph,
        merge_candidates: solved.merge_candidates,
        wall_lines,
        summary,
    }
}
