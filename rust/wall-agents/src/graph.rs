// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall graph extraction.
//!
//! Settled wall segments are reduced to centre lines. The
//! [`IntersectionSolver`] intersects every pair of lines: nearly parallel
//! pairs are reported as merge candidates, crossing pairs share a junction
//! node. Every line then becomes one edge between its two outermost nodes.

use nalgebra::{Point2, Vector2};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agents::WallSegment;
use crate::config::{EngineConfig, ExportConfig};
use crate::types::{AgentId, OpeningType, WallType};

/// Opening on a centre line, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineOpening {
    pub center: Point2<f64>,
    pub width: f64,
}

/// Centre line of one wall segment.
#[derive(Debug, Clone, PartialEq)]
pub struct WallLine {
    pub segment: AgentId,
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    pub width: f64,
    pub wall_type: WallType,
    pub openings: Vec<LineOpening>,
}

impl WallLine {
    /// Uses the extended box when the segment measured one.
    pub fn from_segment(segment: &WallSegment) -> Option<Self> {
        let merged = segment.collision_box()?;
        let line = segment.extended_box().unwrap_or(merged);
        let origin = merged.start_point();
        let d = merged.get_direction();

        Some(Self {
            segment: segment.id(),
            start: line.start_point(),
            end: line.end_point(),
            width: merged.width(),
            wall_type: segment.wall_type(),
            openings: segment
                .openings()
                .iter()
                .map(|o| LineOpening {
                    center: origin + d * o.offset,
                    width: o.width,
                })
                .collect(),
        })
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Angle between the two lines in degrees, folded into `[0, 90]`.
    pub fn angle_to(&self, other: &WallLine) -> f64 {
        let a = self.end - self.start;
        let b = other.end - other.start;
        let mut diff = (a.y.atan2(a.x) - b.y.atan2(b.x)).abs().to_degrees() % 180.0;
        if diff > 90.0 {
            diff = 180.0 - diff;
        }
        diff
    }

    /// Perpendicular distance from `p` to the infinite line.
    pub fn distance_to_line(&self, p: &Point2<f64>) -> f64 {
        let d = self.end - self.start;
        let len = d.norm();
        if len < 1e-10 {
            return (p - self.start).norm();
        }
        cross(&d, &(p - self.start)).abs() / len
    }
}

fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// How two centre lines meet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    None,
    Point(Point2<f64>),
    /// Collinear lines sharing the span between the two points
    Overlap(Point2<f64>, Point2<f64>),
}

/// Intersects two centre lines, accepting points up to `tolerance` past
/// either end.
pub fn intersect(a: &WallLine, b: &WallLine, tolerance: f64) -> Intersection {
    let da = a.end - a.start;
    let db = b.end - b.start;
    let (len_a, len_b) = (da.norm(), db.norm());
    if len_a < 1e-10 || len_b < 1e-10 {
        return Intersection::None;
    }

    let denom = cross(&da, &db);
    if denom.abs() < 1e-9 * len_a * len_b {
        let max_offset = a.width.max(b.width) / 2.0;
        if a.distance_to_line(&b.start) > max_offset {
            return Intersection::None;
        }
        let u = da / len_a;
        let tb0 = (b.start - a.start).dot(&u);
        let tb1 = (b.end - a.start).dot(&u);
        let lo = tb0.min(tb1).max(0.0);
        let hi = tb0.max(tb1).min(len_a);
        if hi + tolerance < lo {
            return Intersection::None;
        }
        return Intersection::Overlap(a.start + u * lo, a.start + u * hi.max(lo));
    }

    let rel = b.start - a.start;
    let t = cross(&rel, &db) / denom;
    let s = cross(&rel, &da) / denom;
    let on_a = t * len_a >= -tolerance && t * len_a <= len_a + tolerance;
    let on_b = s * len_b >= -tolerance && s * len_b <= len_b + tolerance;
    if on_a && on_b {
        Intersection::Point(a.start + da * t)
    } else {
        Intersection::None
    }
}

/// Graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

/// Opening as written on an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeOpening {
    #[serde(rename = "type")]
    pub opening_type: OpeningType,
    /// Distance from the start node along the edge
    pub center_x: f64,
    pub bottom_z: f64,
    pub width: f64,
    pub height: f64,
}

/// One wall between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: u32,
    pub start_node: u32,
    pub end_node: u32,
    pub wall_type: WallType,
    pub stud_type: String,
    pub height: f64,
    pub openings: Vec<EdgeOpening>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl FloorGraph {
    pub fn node(&self, id: u32) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Number of edges meeting at a node.
    pub fn degree(&self, id: u32) -> usize {
        self.edges
            .iter()
            .filter(|e| e.start_node == id || e.end_node == id)
            .count()
    }
}

/// Solver output: the graph plus pairs of lines that look like one wall.
#[derive(Debug, Clone, Default)]
pub struct SolverOutput {
    pub graph: FloorGraph,
    pub merge_candidates: Vec<(AgentId, AgentId)>,
}

/// Nodes deduplicated by rounded position. A node keeps the exact point
/// that first created it.
#[derive(Debug, Default)]
struct NodeRegistry {
    nodes: Vec<Node>,
    index: FxHashMap<(i64, i64), u32>,
}

impl NodeRegistry {
    fn add(&mut self, p: Point2<f64>) -> u32 {
        let key = (p.x.round() as i64, p.y.round() as i64);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.nodes.len() as u32;
        self.nodes.push(Node { id, x: p.x, y: p.y });
        self.index.insert(key, id);
        id
    }

    fn position(&self, id: u32) -> Point2<f64> {
        let n = &self.nodes[id as usize];
        Point2::new(n.x, n.y)
    }
}

pub struct IntersectionSolver<'a> {
    engine: &'a EngineConfig,
    export: &'a ExportConfig,
}

impl<'a> IntersectionSolver<'a> {
    pub fn new(engine: &'a EngineConfig, export: &'a ExportConfig) -> Self {
        Self { engine, export }
    }

    pub fn solve(&self, lines: &[WallLine]) -> SolverOutput {
        let mut registry = NodeRegistry::default();
        let mut junctions: Vec<Vec<u32>> = vec![Vec::new(); lines.len()];
        let mut merge_candidates = Vec::new();

        for i in 0..lines.len() {
            for j in (i + 1)..lines.len() {
                let (a, b) = (&lines[i], &lines[j]);
                let hit = intersect(a, b, self.engine.junction_tolerance);
                if a.angle_to(b) < self.engine.merge_angle_threshold {
                    if hit != Intersection::None {
                        merge_candidates.push((a.segment, b.segment));
                    }
                    continue;
                }
                if let Intersection::Point(p) = hit {
                    let node = registry.add(p);
                    for k in [i, j] {
                        if !junctions[k].contains(&node) {
                            junctions[k].push(node);
                        }
                    }
                }
            }
        }

        let mut edges: Vec<Edge> = Vec::new();
        for (line, mut nodes) in lines.iter().zip(junctions) {
            let snap = line.width.max(self.engine.junction_tolerance);
            for end in [line.start, line.end] {
                let near_junction = nodes
                    .iter()
                    .any(|&n| (registry.position(n) - end).norm() <= snap);
                if !near_junction {
                    let node = registry.add(end);
                    if !nodes.contains(&node) {
                        nodes.push(node);
                    }
                }
            }

            let Some((first, second)) = farthest_pair(&registry, &nodes) else {
                debug!(segment = %line.segment, "line collapsed to a single node");
                continue;
            };
            // start node is the one nearer the line's start
            let (start_node, end_node) = if (registry.position(first) - line.start).norm()
                <= (registry.position(second) - line.start).norm()
            {
                (first, second)
            } else {
                (second, first)
            };

            let duplicate = edges.iter().any(|e| {
                (e.start_node == start_node && e.end_node == end_node)
                    || (e.start_node == end_node && e.end_node == start_node)
            });
            if duplicate {
                continue;
            }

            let origin = registry.position(start_node);
            let axis = registry.position(end_node) - origin;
            let axis = axis / axis.norm();
            edges.push(Edge {
                id: edges.len() as u32,
                start_node,
                end_node,
                wall_type: line.wall_type,
                stud_type: self.stud_type(line.wall_type).to_string(),
                height: self.export.wall_height,
                openings: line
                    .openings
                    .iter()
                    .map(|o| self.edge_opening(o, &origin, &axis))
                    .collect(),
            });
        }

        debug!(
            nodes = registry.nodes.len(),
            edges = edges.len(),
            merge_candidates = merge_candidates.len(),
            "graph solved"
        );
        SolverOutput {
            graph: FloorGraph {
                nodes: registry.nodes,
                edges,
            },
            merge_candidates,
        }
    }

    fn stud_type(&self, wall_type: WallType) -> &str {
        match wall_type {
            WallType::Exterior => &self.export.exterior_stud_type,
            WallType::Interior | WallType::Unknown => &self.export.interior_stud_type,
        }
    }

    fn edge_opening(
        &self,
        opening: &LineOpening,
        origin: &Point2<f64>,
        axis: &Vector2<f64>,
    ) -> EdgeOpening {
        let center_x = (opening.center - origin).dot(axis);
        if opening.width >= self.export.door_min_width_px {
            EdgeOpening {
                opening_type: OpeningType::Door,
                center_x,
                bottom_z: 0.0,
                width: opening.width,
                height: self.export.door_height,
            }
        } else {
            EdgeOpening {
                opening_type: OpeningType::Window,
                center_x,
                bottom_z: self.export.window_sill_height,
                width: opening.width,
                height: self.export.window_height,
            }
        }
    }
}

fn farthest_pair(registry: &NodeRegistry, nodes: &[u32]) -> Option<(u32, u32)> {
    let mut best: Option<(u32, u32, f64)> = None;
    for (i, &a) in nodes.iter().enumerate() {
        for &b in &nodes[i + 1..] {
            let dist = (registry.position(a) - registry.position(b)).norm();
            if dist > 0.0 && best.map_or(true, |(_, _, d)| dist > d) {
                best = Some((a, b, dist));
            }
        }
    }
    best.map(|(a, b, _)| (a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(id: u32, start: (f64, f64), end: (f64, f64)) -> WallLine {
        WallLine {
            segment: AgentId::from_raw(id).unwrap(),
            start: Point2::new(start.0, start.1),
            end: Point2::new(end.0, end.1),
            width: 4.0,
            wall_type: WallType::Exterior,
            openings: Vec::new(),
        }
    }

    #[test]
    fn test_crossing_lines_intersect() {
        let a = line(1, (0.0, 10.0), (40.0, 10.0));
        let b = line(2, (20.0, 0.0), (20.0, 40.0));
        assert_eq!(intersect(&a, &b, 2.0), Intersection::Point(Point2::new(20.0, 10.0)));

        // an end one pixel short still meets within tolerance
        let c = line(3, (41.0, 0.0), (41.0, 40.0));
        assert!(matches!(intersect(&a, &c, 2.0), Intersection::Point(_)));
        let far = line(4, (50.0, 0.0), (50.0, 40.0));
        assert_eq!(intersect(&a, &far, 2.0), Intersection::None);
    }

    #[test]
    fn test_collinear_lines_overlap() {
        let a = line(1, (0.0, 10.0), (20.0, 10.0));
        let b = line(2, (15.0, 11.0), (30.0, 11.0));
        match intersect(&a, &b, 2.0) {
            Intersection::Overlap(p, q) => {
                assert_relative_eq!(p.x, 15.0);
                assert_relative_eq!(q.x, 20.0);
            }
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[test]
    fn test_l_corner_shares_a_node() {
        let engine = EngineConfig::default();
        let export = ExportConfig::default();
        let lines = vec![
            line(1, (3.5, 5.5), (43.5, 5.5)),
            line(2, (5.5, 3.5), (5.5, 43.5)),
        ];
        let out = IntersectionSolver::new(&engine, &export).solve(&lines);

        assert_eq!(out.graph.nodes.len(), 3);
        assert_eq!(out.graph.edges.len(), 2);
        let corner = out.graph.edges[0].start_node;
        assert_eq!(out.graph.edges[1].start_node, corner);
        assert_eq!(out.graph.degree(corner), 2);
        assert!(out.merge_candidates.is_empty());
        assert_eq!(out.graph.edges[0].stud_type, "2x6");
    }

    #[test]
    fn test_nodes_keep_their_exact_position() {
        let engine = EngineConfig::default();
        let export = ExportConfig::default();
        let lines = vec![
            line(1, (3.5, 5.5), (43.5, 5.5)),
            line(2, (5.5, 3.5), (5.5, 43.5)),
        ];
        let out = IntersectionSolver::new(&engine, &export).solve(&lines);

        let corner = out.graph.node(out.graph.edges[0].start_node).unwrap();
        assert_relative_eq!(corner.x, 5.5, epsilon = 1e-9);
        assert_relative_eq!(corner.y, 5.5, epsilon = 1e-9);
        let far = out.graph.node(out.graph.edges[0].end_node).unwrap();
        assert_relative_eq!(far.x, 43.5, epsilon = 1e-9);
        assert_relative_eq!(far.y, 5.5, epsilon = 1e-9);
    }

    #[test]
    fn test_parallel_neighbours_are_merge_candidates() {
        let engine = EngineConfig::default();
        let export = ExportConfig::default();
        let lines = vec![
            line(1, (0.0, 10.0), (20.0, 10.0)),
            line(2, (18.0, 10.5), (40.0, 10.5)),
        ];
        let out = IntersectionSolver::new(&engine, &export).solve(&lines);
        assert_eq!(out.merge_candidates.len(), 1);
        // no junction between them, so each keeps its own endpoints
        assert_eq!(out.graph.edges.len(), 2);
    }

    #[test]
    fn test_openings_become_doors_and_windows() {
        let engine = EngineConfig::default();
        let export = ExportConfig::default();
        let mut wall = line(1, (0.0, 10.0), (100.0, 10.0));
        wall.openings = vec![
            LineOpening {
                center: Point2::new(30.0, 10.0),
                width: 24.0,
            },
            LineOpening {
                center: Point2::new(70.0, 10.0),
                width: 8.0,
            },
        ];
        let out = IntersectionSolver::new(&engine, &export).solve(&[wall]);
        let openings = &out.graph.edges[0].openings;

        assert_eq!(openings[0].opening_type, OpeningType::Door);
        assert_relative_eq!(openings[0].center_x, 30.0);
        assert_relative_eq!(openings[0].bottom_z, 0.0);
        assert_eq!(openings[1].opening_type, OpeningType::Window);
        assert_relative_eq!(openings[1].bottom_z, 0.9);
    }
}
