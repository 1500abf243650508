// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine and export configuration.
//!
//! Every threshold the agents use lives here. Defaults are the raster
//! thresholds; `from_env` overrides a handful of them from `WALL_AGENTS_*`
//! variables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::Direction8;

/// Thresholds and bounds for the agent simulation and the graph solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directions probed by the wall scanner
    pub scan_directions: Vec<Direction8>,
    /// Longest run a single sonde may walk before the scan counts as exhausted
    pub max_ray_length: u32,
    /// Minimum perpendicular food run for a scanner step to be accepted
    pub min_perpendicular_run: u32,
    /// Stem length must be strictly greater than this
    pub min_stem_length: f64,
    /// Scanned width must be strictly between these two
    pub min_scan_width: f64,
    pub max_scan_width: f64,
    /// Fitted mushroom width must be strictly between these two
    pub min_wall_width: f64,
    pub max_wall_width: f64,
    /// Fraction of food along a side row that counts as a bleed
    pub bleed_ratio: f64,
    /// Margin asymmetry (pixels) tolerated before re-centering
    pub center_tolerance: f64,
    pub max_center_iterations: u32,
    /// Ticks an exhausted scan is retried before the mushroom gives up
    pub max_scan_retries: u32,
    /// Normal offset (pixels) under which two boxes share an axis
    pub axis_offset_tolerance: f64,
    /// Margin/gap walks stop after this many steps
    pub max_margin: u32,
    /// Crawl rays stop after a non-food run this long
    pub max_opening_length: u32,
    /// Crawl and extend rays stop after this many steps
    pub max_crawl_length: u32,
    /// Gaps between parts narrower than this are not openings
    pub min_opening_width: f64,
    /// Regions with this many cells or fewer are discarded
    pub min_blob_cells: usize,
    pub max_ticks: u64,
    /// Seed a blob at the next unclaimed food cell whenever the scheduler is idle
    pub auto_seed_blobs: bool,
    /// Centre lines closer than this angle (degrees) are the same wall, not a junction
    pub merge_angle_threshold: f64,
    /// How far past a segment end an intersection may lie (pixels)
    pub junction_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_directions: Direction8::AXES.to_vec(),
            max_ray_length: 4096,
            min_perpendicular_run: 3,
            min_stem_length: 2.0,
            min_scan_width: 2.0,
            max_scan_width: 15.0,
            min_wall_width: 2.0,
            max_wall_width: 10.0,
            bleed_ratio: 0.8,
            center_tolerance: 2.0,
            max_center_iterations: 4,
            max_scan_retries: 3,
            axis_offset_tolerance: 1.0,
            max_margin: 256,
            max_opening_length: 100,
            max_crawl_length: 4096,
            min_opening_width: 1.0,
            min_blob_cells: 8,
            max_ticks: 250_000,
            auto_seed_blobs: true,
            merge_angle_threshold: 30.0,
            junction_tolerance: 2.0,
        }
    }
}

impl EngineConfig {
    /// Defaults, overridden by `WALL_AGENTS_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_ticks: env_or("WALL_AGENTS_MAX_TICKS", defaults.max_ticks),
            max_scan_width: env_or("WALL_AGENTS_MAX_SCAN_WIDTH", defaults.max_scan_width),
            max_wall_width: env_or("WALL_AGENTS_MAX_WALL_WIDTH", defaults.max_wall_width),
            max_opening_length: env_or(
                "WALL_AGENTS_MAX_OPENING_LENGTH",
                defaults.max_opening_length,
            ),
            auto_seed_blobs: env_or("WALL_AGENTS_AUTO_SEED", defaults.auto_seed_blobs),
            ..defaults
        }
    }
}

/// How the graph is written out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Scale applied to every planar coordinate; `None` keeps pixels
    pub meter_per_pixel: Option<f64>,
    /// Wall height in meters
    pub wall_height: f64,
    pub exterior_stud_type: String,
    pub interior_stud_type: String,
    /// Openings at least this wide (pixels) are doors, narrower ones windows
    pub door_min_width_px: f64,
    pub door_height: f64,
    pub window_height: f64,
    pub window_sill_height: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            meter_per_pixel: None,
            wall_height: 2.7,
            exterior_stud_type: "2x6".into(),
            interior_stud_type: "2x4".into(),
            door_min_width_px: 20.0,
            door_height: 2.1,
            window_height: 1.2,
            window_sill_height: 0.9,
        }
    }
}

impl ExportConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            meter_per_pixel: std::env::var("WALL_AGENTS_METER_PER_PIXEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.meter_per_pixel),
            wall_height: env_or("WALL_AGENTS_WALL_HEIGHT", defaults.wall_height),
            ..defaults
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_ticks": 10}"#).unwrap();
        assert_eq!(config.max_ticks, 10);
        assert_eq!(config.max_opening_length, 100);
        assert_eq!(config.scan_directions.len(), 4);
    }

    #[test]
    fn test_export_defaults() {
        let config = ExportConfig::default();
        assert!(config.meter_per_pixel.is_none());
        assert_eq!(config.interior_stud_type, "2x4");
    }
}
