// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image loading into the binary food grid

use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::grid::Grid;

/// How pixels become food.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Fixed gray level; `None` picks one with Otsu's method
    pub threshold: Option<u8>,
    /// Dark pixels (wall ink) are food; set to `false` for pre-inverted masks
    pub food_is_dark: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            threshold: None,
            food_is_dark: true,
        }
    }
}

/// Gray level separating ink from paper.
pub fn threshold_level(gray: &GrayImage, options: &RasterOptions) -> u8 {
    options
        .threshold
        .unwrap_or_else(|| imageproc::contrast::otsu_level(gray))
}

/// Pixels at or below the level are dark.
pub fn grid_from_luma(gray: &GrayImage, options: &RasterOptions) -> Result<Grid> {
    if gray.width() == 0 || gray.height() == 0 {
        return Err(Error::EmptyGrid);
    }
    let level = threshold_level(gray, options);
    let grid = Grid::from_fn(gray.width() as usize, gray.height() as usize, |x, y| {
        let dark = gray.get_pixel(x as u32, y as u32).0[0] <= level;
        dark == options.food_is_dark
    });
    debug!(
        width = grid.width(),
        height = grid.height(),
        level,
        food = grid.food_count(),
        "raster binarized"
    );
    Ok(grid)
}

/// Opens an image file and binarizes it.
pub fn load_grid(path: &Path, options: &RasterOptions) -> Result<Grid> {
    let gray = image::open(path)?.to_luma8();
    grid_from_luma(&gray, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;
    use image::Luma;

    /// White page with a dark horizontal stroke on rows 4..=6.
    fn stroke() -> GrayImage {
        GrayImage::from_fn(16, 12, |_, y| {
            if (4..=6).contains(&y) {
                Luma([20])
            } else {
                Luma([240])
            }
        })
    }

    #[test]
    fn test_ink_is_food_by_default() {
        let grid = grid_from_luma(&stroke(), &RasterOptions::default()).unwrap();
        assert!(grid.is_food(Cell::new(3, 5)));
        assert!(!grid.is_food(Cell::new(3, 2)));
        assert_eq!(grid.food_count(), 48);
    }

    #[test]
    fn test_inverted_mask() {
        let options = RasterOptions {
            threshold: Some(128),
            food_is_dark: false,
        };
        let grid = grid_from_luma(&stroke(), &options).unwrap();
        assert!(!grid.is_food(Cell::new(3, 5)));
        assert_eq!(grid.food_count(), 16 * 12 - 48);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let empty = GrayImage::new(0, 0);
        assert!(matches!(
            grid_from_luma(&empty, &RasterOptions::default()),
            Err(Error::EmptyGrid)
        ));
    }
}
