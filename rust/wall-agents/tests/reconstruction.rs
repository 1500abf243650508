// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end runs from a binary grid to the exported graph.

use approx::assert_relative_eq;
use ifc_lite_wall_agents::{reconstruct, EngineConfig, ExportConfig, GraphDocument, Grid, OpeningType};

#[test]
fn test_straight_band_gives_one_edge() {
    let grid = Grid::from_fn(48, 16, |x, y| (4..=43).contains(&x) && (6..=9).contains(&y));
    let result = reconstruct(grid, &EngineConfig::default(), &ExportConfig::default());

    assert!(result.summary.converged);
    assert_eq!(result.wall_lines.len(), 1);
    assert_eq!(result.graph.edges.len(), 1);
    assert_eq!(result.graph.nodes.len(), 2);

    let line = &result.wall_lines[0];
    assert_relative_eq!(line.width, 4.0, epsilon = 1.0);
    assert_relative_eq!(line.start.y, 7.5, epsilon = 0.5);
    assert_relative_eq!(line.length(), 40.0, epsilon = 1.0);
    assert!(result.graph.edges[0].openings.is_empty());
}

#[test]
fn test_l_shape_shares_a_junction() {
    let grid = Grid::from_fn(50, 50, |x, y| {
        let horizontal = (4..=43).contains(&x) && (4..=7).contains(&y);
        let vertical = (4..=7).contains(&x) && (4..=43).contains(&y);
        horizontal || vertical
    });
    let result = reconstruct(grid, &EngineConfig::default(), &ExportConfig::default());

    assert!(result.summary.converged);
    assert_eq!(result.graph.edges.len(), 2);
    assert_eq!(result.graph.nodes.len(), 3);

    let shared: Vec<u32> = result
        .graph
        .nodes
        .iter()
        .map(|n| n.id)
        .filter(|&id| result.graph.degree(id) == 2)
        .collect();
    assert_eq!(shared.len(), 1);
    let corner = result.graph.node(shared[0]).unwrap();
    assert!((corner.x - 5.5).abs() <= 1.0);
    assert!((corner.y - 5.5).abs() <= 1.0);
}

#[test]
fn test_t_junction_keeps_both_walls_on_their_strokes() {
    let grid = Grid::from_fn(60, 50, |x, y| {
        let bar = (5..=54).contains(&x) && (5..=8).contains(&y);
        let stem = (28..=31).contains(&x) && (5..=44).contains(&y);
        bar || stem
    });
    let result = reconstruct(grid, &EngineConfig::default(), &ExportConfig::default());

    assert!(result.summary.converged);
    assert_eq!(result.wall_lines.len(), 2);
    assert_eq!(result.graph.edges.len(), 2);

    let bar = result
        .wall_lines
        .iter()
        .find(|l| (l.start.y - l.end.y).abs() < 1.0)
        .expect("horizontal wall");
    assert_relative_eq!(bar.start.y, 6.5, epsilon = 0.5);
    assert_relative_eq!(bar.length(), 50.0, epsilon = 1.0);

    let stem = result
        .wall_lines
        .iter()
        .find(|l| (l.start.x - l.end.x).abs() < 1.0)
        .expect("vertical wall");
    assert_relative_eq!(stem.start.x, 29.5, epsilon = 0.5);

    let junction = result
        .graph
        .nodes
        .iter()
        .find(|n| (n.x - 29.5).abs() <= 1.0 && (n.y - 6.5).abs() <= 1.0)
        .expect("junction node");
    assert_eq!(result.graph.degree(junction.id), 1);
}

#[test]
fn test_thin_diagonal_wall_is_kept() {
    // 45° stroke, 4 cells thick along each axis, axis on x - y = 1.5
    let grid = Grid::from_fn(64, 64, |x, y| (0..=3).contains(&(x - y)) && (8..=100).contains(&(x + y)));
    let result = reconstruct(grid, &EngineConfig::default(), &ExportConfig::default());

    assert!(result.summary.converged);
    assert!(!result.wall_lines.is_empty());
    assert!(!result.graph.edges.is_empty());
    for line in &result.wall_lines {
        let (dx, dy) = (line.end.x - line.start.x, line.end.y - line.start.y);
        assert!((dx.abs() - dy.abs()).abs() <= 1.0, "not diagonal: {:?} -> {:?}", line.start, line.end);
    }

    let longest = result
        .wall_lines
        .iter()
        .max_by(|a, b| a.length().total_cmp(&b.length()))
        .unwrap();
    assert!(longest.length() > 50.0);
    let mid = longest.start + (longest.end - longest.start) / 2.0;
    assert!((mid.x - mid.y - 1.5).abs() / std::f64::consts::SQRT_2 <= 1.5);
}

#[test]
fn test_wall_with_doorway_records_an_opening() {
    // one stroke broken by a 24-pixel doorway
    let grid = Grid::from_fn(80, 16, |x, y| {
        (6..=9).contains(&y) && ((4..=29).contains(&x) || (54..=75).contains(&x))
    });
    let result = reconstruct(grid, &EngineConfig::default(), &ExportConfig::default());

    assert_eq!(result.graph.edges.len(), 1);
    let openings = &result.graph.edges[0].openings;
    assert_eq!(openings.len(), 1);
    assert_relative_eq!(openings[0].width, 24.0, epsilon = 1.0);
    assert_eq!(openings[0].opening_type, OpeningType::Door);
}

#[test]
fn test_exported_document_is_scaled() {
    let grid = Grid::from_fn(48, 16, |x, y| (4..=43).contains(&x) && (6..=9).contains(&y));
    let result = reconstruct(grid, &EngineConfig::default(), &ExportConfig::default());

    let pixels = GraphDocument::from_graph(&result.graph, None);
    let meters = GraphDocument::from_graph(&result.graph, Some(0.02));
    for (p, m) in pixels.nodes.iter().zip(&meters.nodes) {
        assert_relative_eq!(p.x * 0.02, m.x);
        assert_relative_eq!(p.y * 0.02, m.y);
    }

    let json: serde_json::Value = serde_json::from_str(&meters.to_json().unwrap()).unwrap();
    for key in ["id", "start_node", "end_node", "wall_type", "stud_type", "height", "openings"] {
        assert!(json["edges"][0].get(key).is_some(), "edge is missing {key}");
    }
    assert!(json["furnitures"].as_array().unwrap().is_empty());
}
