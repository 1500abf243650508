// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for wall reconstruction.
//!
//! Only construction-time failures surface here. Agents that end up in an
//! invalid shape are not errors: they die and release their cells.

/// Result type alias for wall reconstruction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building geometry, loading rasters or
/// exporting the graph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two boxes were asked to merge but their rotations differ.
    #[error("boxes are not parallel: rotation {a}° vs {b}°")]
    NotParallel { a: f64, b: f64 },

    /// A box was built from a zero-length direction vector.
    #[error("degenerate direction vector ({dx}, {dy})")]
    DegenerateDirection { dx: f64, dy: f64 },

    /// The raster has no cells.
    #[error("grid must have at least one cell")]
    EmptyGrid,

    /// Rows of the input raster have different lengths.
    #[error("grid row {row} has {found} cells, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Image decoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Graph serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
