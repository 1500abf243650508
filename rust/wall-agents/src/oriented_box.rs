// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rotated rectangle used by every agent.
//!
//! Rotation is always snapped to a multiple of 45°, so the direction and
//! normal are one of eight exact unit vectors and every walk along them can
//! use integer pixel steps.

use std::cell::OnceCell;

use nalgebra::{Point2, Vector2};

use crate::error::{Error, Result};
use crate::types::{snap_rotation, Cell, Direction8};

/// Tolerance of the cross-triangle-area containment test.
const INSIDE_TOLERANCE: f64 = 1e-5;

/// Rotations closer than this are considered identical.
const ANGLE_EPSILON: f64 = 1e-6;

/// A rectangle with centre, width (across), length (along) and rotation.
#[derive(Debug, Clone)]
pub struct OrientedBox {
    center: Point2<f64>,
    width: f64,
    length: f64,
    rotation: f64,
    corners: OnceCell<[Point2<f64>; 4]>,
}

impl OrientedBox {
    /// Creates a box; `rotation` is in degrees and gets snapped to 45°.
    pub fn new(center: Point2<f64>, width: f64, length: f64, rotation: f64) -> Self {
        Self {
            center,
            width: width.max(0.0),
            length: length.max(0.0),
            rotation: snap_rotation(rotation),
            corners: OnceCell::new(),
        }
    }

    /// Box whose centre line runs from `start` to `end`.
    pub fn from_segment(start: Point2<f64>, end: Point2<f64>, width: f64) -> Result<Self> {
        let delta = end - start;
        if delta.norm() < 1e-9 {
            return Err(Error::DegenerateDirection {
                dx: delta.x,
                dy: delta.y,
            });
        }
        let rotation = delta.y.atan2(delta.x).to_degrees();
        Ok(Self::new(
            nalgebra::center(&start, &end),
            width,
            delta.norm(),
            rotation,
        ))
    }

    pub fn center(&self) -> Point2<f64> {
        self.center
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Rotation in degrees, a multiple of 45 in `[0, 360)`.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn set_center(&mut self, center: Point2<f64>) {
        self.center = center;
        self.corners.take();
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width.max(0.0);
        self.corners.take();
    }

    pub fn set_length(&mut self, length: f64) {
        self.length = length.max(0.0);
        self.corners.take();
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = snap_rotation(rotation);
        self.corners.take();
    }

    pub fn translate(&mut self, offset: Vector2<f64>) {
        self.set_center(self.center + offset);
    }

    pub fn direction8(&self) -> Direction8 {
        Direction8::from_rotation(self.rotation)
    }

    pub fn normal8(&self) -> Direction8 {
        self.direction8().rotated_90()
    }

    /// Unit vector along the length.
    pub fn get_direction(&self) -> Vector2<f64> {
        self.direction8().unit()
    }

    /// Unit vector along the width (direction rotated by +90°).
    pub fn get_normal(&self) -> Vector2<f64> {
        self.normal8().unit()
    }

    /// Corners in order; cached until the next setter call.
    pub fn calculate_corners(&self) -> &[Point2<f64>; 4] {
        self.corners.get_or_init(|| {
            let d = self.get_direction() * (self.length / 2.0);
            let n = self.get_normal() * (self.width / 2.0);
            [
                self.center - d - n,
                self.center + d - n,
                self.center + d + n,
                self.center - d + n,
            ]
        })
    }

    pub fn get_area(&self) -> f64 {
        self.width * self.length
    }

    /// Start of the centre line.
    pub fn start_point(&self) -> Point2<f64> {
        self.center - self.get_direction() * (self.length / 2.0)
    }

    /// End of the centre line.
    pub fn end_point(&self) -> Point2<f64> {
        self.center + self.get_direction() * (self.length / 2.0)
    }

    /// Coordinates of `p` in this box's (direction, normal) basis, relative to the centre.
    pub fn project(&self, p: &Point2<f64>) -> (f64, f64) {
        let rel = p - self.center;
        (rel.dot(&self.get_direction()), rel.dot(&self.get_normal()))
    }

    /// Signed distance of `other`'s centre from this box's axis.
    pub fn normal_offset(&self, other: &OrientedBox) -> f64 {
        (other.center - self.center).dot(&self.get_normal())
    }

    /// Extent of `other`'s corners along this box's direction.
    pub fn span_of(&self, other: &OrientedBox) -> (f64, f64) {
        let d = self.get_direction();
        other
            .calculate_corners()
            .iter()
            .map(|c| (c - self.center).dot(&d))
            .fold((f64::MAX, f64::MIN), |(lo, hi), t| (lo.min(t), hi.max(t)))
    }

    /// Cross-triangle-area test: the four triangles formed by `p` and each
    /// edge cover exactly the box when `p` is inside.
    pub fn is_point_inside(&self, p: &Point2<f64>) -> bool {
        let corners = self.calculate_corners();
        let mut sum = 0.0;
        for i in 0..4 {
            let a = corners[i] - p;
            let b = corners[(i + 1) % 4] - p;
            sum += (a.x * b.y - a.y * b.x).abs() / 2.0;
        }
        sum <= self.get_area() + INSIDE_TOLERANCE
    }

    /// Same or opposite rotation within `tolerance` degrees.
    pub fn is_parallel_to(&self, other: &OrientedBox, tolerance: f64) -> bool {
        let diff = (self.rotation - other.rotation).rem_euclid(180.0);
        diff.min(180.0 - diff) <= tolerance + ANGLE_EPSILON
    }

    /// Parallel and sharing the same infinite centre line.
    pub fn is_on_same_axis_as(&self, other: &OrientedBox, offset_tolerance: f64) -> bool {
        self.is_parallel_to(other, 0.0)
            && self.normal_offset(other).abs() <= offset_tolerance + ANGLE_EPSILON
    }

    /// Smallest box in this box's basis that encloses both boxes.
    pub fn merge_aligned(&self, other: &OrientedBox) -> Result<OrientedBox> {
        if !self.is_parallel_to(other, 0.0) {
            return Err(Error::NotParallel {
                a: self.rotation,
                b: other.rotation,
            });
        }

        let (mut t_min, mut t_max) = (f64::MAX, f64::MIN);
        let (mut n_min, mut n_max) = (f64::MAX, f64::MIN);
        for corner in self
            .calculate_corners()
            .iter()
            .chain(other.calculate_corners().iter())
        {
            let (t, n) = self.project(corner);
            t_min = t_min.min(t);
            t_max = t_max.max(t);
            n_min = n_min.min(n);
            n_max = n_max.max(n);
        }

        let center = self.center
            + self.get_direction() * ((t_min + t_max) / 2.0)
            + self.get_normal() * ((n_min + n_max) / 2.0);
        Ok(OrientedBox::new(
            center,
            n_max - n_min,
            t_max - t_min,
            self.rotation,
        ))
    }

    /// Separating-axis test; touching edges do not count as overlap.
    pub fn overlaps(&self, other: &OrientedBox) -> bool {
        let axes = [
            self.get_direction(),
            self.get_normal(),
            other.get_direction(),
            other.get_normal(),
        ];
        let a = self.calculate_corners();
        let b = other.calculate_corners();

        axes.iter().all(|axis| {
            let (a_lo, a_hi) = project_onto(a, axis);
            let (b_lo, b_hi) = project_onto(b, axis);
            a_hi.min(b_hi) - a_lo.max(b_lo) > 1e-9
        })
    }

    /// Every cell whose centre lies inside the box.
    pub fn iterate_covered_pixels(&self) -> Vec<Cell> {
        let corners = self.calculate_corners();
        let (mut x_min, mut y_min) = (f64::MAX, f64::MAX);
        let (mut x_max, mut y_max) = (f64::MIN, f64::MIN);
        for c in corners {
            x_min = x_min.min(c.x);
            y_min = y_min.min(c.y);
            x_max = x_max.max(c.x);
            y_max = y_max.max(c.y);
        }

        let mut cells = Vec::new();
        for y in y_min.floor() as i32..=y_max.ceil() as i32 {
            for x in x_min.floor() as i32..=x_max.ceil() as i32 {
                let cell = Cell::new(x, y);
                if self.is_point_inside(&cell.center()) {
                    cells.push(cell);
                }
            }
        }
        cells
    }
}

fn project_onto(corners: &[Point2<f64>; 4], axis: &Vector2<f64>) -> (f64, f64) {
    corners
        .iter()
        .map(|c| c.coords.dot(axis))
        .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn shoelace(points: &[Point2<f64>; 4]) -> f64 {
        let mut area = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            area += points[i].x * points[j].y - points[j].x * points[i].y;
        }
        (area / 2.0).abs()
    }

    #[test]
    fn test_directions_are_exact_for_all_rotations() {
        let expected = [
            (1.0, 0.0),
            (std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2),
            (0.0, 1.0),
            (-std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2),
            (-1.0, 0.0),
            (-std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2),
            (0.0, -1.0),
            (std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2),
        ];
        for (i, (dx, dy)) in expected.iter().enumerate() {
            let b = OrientedBox::new(Point2::new(0.0, 0.0), 2.0, 4.0, i as f64 * 45.0 + 10.0);
            let d = b.get_direction();
            assert_eq!((d.x, d.y), (*dx, *dy));
            assert_relative_eq!(d.dot(&b.get_normal()), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_corner_polygon_area_matches() {
        for step in 0..8 {
            let b = OrientedBox::new(Point2::new(12.5, -3.0), 3.0, 11.0, step as f64 * 45.0);
            assert_relative_eq!(shoelace(b.calculate_corners()), 33.0, epsilon = 1e-9);
            assert_relative_eq!(b.get_area(), 33.0);
        }
    }

    #[test]
    fn test_corners_are_cached_until_mutation() {
        let mut b = OrientedBox::new(Point2::new(5.0, 5.0), 2.0, 6.0, 0.0);
        let first = b.calculate_corners() as *const _;
        let second = b.calculate_corners() as *const _;
        assert!(std::ptr::eq(first, second));
        assert_eq!(b.calculate_corners(), b.clone().calculate_corners());

        b.set_length(10.0);
        assert_relative_eq!(b.calculate_corners()[1].x, 10.0);
    }

    #[test]
    fn test_merge_collinear_boxes() {
        let a = OrientedBox::new(Point2::new(10.0, 10.0), 4.0, 6.0, 0.0);
        let b = OrientedBox::new(Point2::new(20.0, 10.0), 4.0, 6.0, 0.0);
        let merged = a.merge_aligned(&b).unwrap();
        assert_relative_eq!(merged.width(), 4.0);
        assert_relative_eq!(merged.length(), 16.0);
        assert_eq!(merged.rotation(), 0.0);
        assert_relative_eq!(merged.center(), Point2::new(15.0, 10.0));
    }

    #[test]
    fn test_merge_covers_both_spans() {
        let a = OrientedBox::new(Point2::new(3.0, 3.0), 3.0, 5.0, 45.0);
        let b = OrientedBox::new(Point2::new(9.0, 10.0), 5.0, 2.0, 225.0);
        let merged = a.merge_aligned(&b).unwrap();
        assert!(merged.width() >= a.width().min(b.width()));

        let (a_lo, a_hi) = a.span_of(&a);
        let (b_lo, b_hi) = a.span_of(&b);
        assert!(merged.length() + 1e-9 >= a_hi.max(b_hi) - a_lo.min(b_lo));
        for corner in a.calculate_corners().iter().chain(b.calculate_corners()) {
            assert!(merged.is_point_inside(corner));
        }
    }

    #[test]
    fn test_merge_rejects_non_parallel() {
        let a = OrientedBox::new(Point2::new(0.0, 0.0), 3.0, 5.0, 0.0);
        let b = OrientedBox::new(Point2::new(0.0, 0.0), 3.0, 5.0, 90.0);
        assert!(matches!(a.merge_aligned(&b), Err(Error::NotParallel { .. })));
    }

    #[test]
    fn test_point_inside() {
        let b = OrientedBox::new(Point2::new(6.5, 5.0), 3.0, 10.0, 0.0);
        assert!(b.is_point_inside(&Point2::new(2.0, 4.0)));
        assert!(b.is_point_inside(&Point2::new(11.5, 6.5)));
        assert!(!b.is_point_inside(&Point2::new(1.0, 5.0)));
        assert!(!b.is_point_inside(&Point2::new(6.0, 7.0)));
    }

    #[test]
    fn test_covered_pixels() {
        let b = OrientedBox::new(Point2::new(6.5, 5.0), 3.0, 10.0, 0.0);
        let cells = b.iterate_covered_pixels();
        assert_eq!(cells.len(), 30);
        assert!(cells.contains(&Cell::new(2, 4)));
        assert!(cells.contains(&Cell::new(11, 6)));
        assert!(!cells.contains(&Cell::new(12, 5)));
    }

    #[test]
    fn test_same_axis() {
        let a = OrientedBox::new(Point2::new(6.5, 5.0), 3.0, 10.0, 0.0);
        let b = OrientedBox::new(Point2::new(30.0, 5.0), 4.0, 8.0, 180.0);
        let c = OrientedBox::new(Point2::new(30.0, 7.0), 4.0, 8.0, 0.0);
        assert!(a.is_on_same_axis_as(&b, 0.0));
        assert!(!a.is_on_same_axis_as(&c, 1.0));
        assert!(a.is_on_same_axis_as(&c, 2.0));
    }

    #[test]
    fn test_overlaps() {
        let a = OrientedBox::new(Point2::new(5.0, 5.0), 2.0, 10.0, 0.0);
        let b = OrientedBox::new(Point2::new(8.0, 5.5), 2.0, 4.0, 0.0);
        let touching = OrientedBox::new(Point2::new(12.0, 5.0), 2.0, 4.0, 0.0);
        let crossing = OrientedBox::new(Point2::new(5.0, 5.0), 2.0, 10.0, 90.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&crossing));
    }

    #[test]
    fn test_from_segment() {
        let b = OrientedBox::from_segment(Point2::new(0.0, 5.0), Point2::new(0.0, 15.0), 3.0).unwrap();
        assert_eq!(b.rotation(), 90.0);
        assert_relative_eq!(b.length(), 10.0);
        assert_relative_eq!(b.center(), Point2::new(0.0, 10.0));

        let degenerate = OrientedBox::from_segment(Point2::new(1.0, 1.0), Point2::new(1.0, 1.0), 3.0);
        assert!(matches!(degenerate, Err(Error::DegenerateDirection { .. })));
    }
}
