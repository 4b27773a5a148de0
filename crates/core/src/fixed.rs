//! Fixed-point coordinate layer.
//!
//! All quadtree arithmetic runs on 64-bit integers scaled by 10^9, so that
//! repeated subdivision, centroid derivation, and intersection tests are exact.
//! Floating point only appears at the system boundary: when a source geometry
//! is read ([`to_fixed`]) and when a snapped result is written back
//! ([`to_float`]).
//!
//! # Why fixed point
//!
//! Halving a floating-point extent 20+ times accumulates rounding that moves
//! quadrant boundaries by more than a deepest-level cell. Integer ordinates
//! make `to_float(to_fixed(x))` recover `x` within 10^-9 and make every
//! comparison between two derived coordinates exact.

use geo::Coord;

/// Number of decimal digits preserved by the fixed-point representation.
pub const PRECISION: u32 = 9;

/// Scale factor between float ordinates and fixed-point ordinates (10^9).
pub const SCALE: i64 = 1_000_000_000;

/// A coordinate ordinate scaled by [`SCALE`].
pub type Ordinate = i64;

/// Convert a float ordinate to fixed point, rounding to the nearest unit.
#[inline]
pub fn to_fixed(value: f64) -> Ordinate {
    (value * SCALE as f64).round() as Ordinate
}

/// Convert a fixed-point ordinate back to float. Zero maps to exactly `0.0`.
#[inline]
pub fn to_float(value: Ordinate) -> f64 {
    value as f64 / SCALE as f64
}

/// A point in the fixed-point integer domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedPoint {
    pub x: Ordinate,
    pub y: Ordinate,
}

impl FixedPoint {
    /// Create a point from fixed-point ordinates.
    pub fn new(x: Ordinate, y: Ordinate) -> Self {
        Self { x, y }
    }

    /// Convert a float coordinate into the fixed-point domain.
    pub fn from_coord(coord: Coord<f64>) -> Self {
        Self {
            x: to_fixed(coord.x),
            y: to_fixed(coord.y),
        }
    }

    /// Convert back to a float coordinate.
    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: to_float(self.x),
            y: to_float(self.y),
        }
    }
}

/// A line segment between two fixed-point points.
///
/// Undirected for intersection purposes; the `start`/`end` order matters when
/// walking a polygon edge and ordering the snapped points along it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedLine {
    pub start: FixedPoint,
    pub end: FixedPoint,
}

impl FixedLine {
    /// Create a segment from two points.
    pub fn new(start: FixedPoint, end: FixedPoint) -> Self {
        Self { start, end }
    }
}

/// An axis-aligned rectangle in the fixed-point domain.
///
/// The minimum edges are **inclusive** and the maximum edges are **exclusive**,
/// so a regular subdivision of an extent tiles the plane with no point counted
/// twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub min_x: Ordinate,
    pub min_y: Ordinate,
    pub max_x: Ordinate,
    pub max_y: Ordinate,
}

impl Extent {
    /// Create an extent from its corner ordinates.
    pub fn new(min_x: Ordinate, min_y: Ordinate, max_x: Ordinate, max_y: Ordinate) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width of the extent.
    pub fn x_span(&self) -> Ordinate {
        self.max_x - self.min_x
    }

    /// Height of the extent.
    pub fn y_span(&self) -> Ordinate {
        self.max_y - self.min_y
    }

    /// Half-open containment: min edges inclusive, max edges exclusive.
    pub fn contains(&self, point: FixedPoint) -> bool {
        point.x >= self.min_x && point.x < self.max_x && point.y >= self.min_y && point.y < self.max_y
    }

    /// The four corners, in fixed order: bottom-left, bottom-right, top-right,
    /// top-left.
    pub fn vertices(&self) -> [FixedPoint; 4] {
        [
            FixedPoint::new(self.min_x, self.min_y),
            FixedPoint::new(self.max_x, self.min_y),
            FixedPoint::new(self.max_x, self.max_y),
            FixedPoint::new(self.min_x, self.max_y),
        ]
    }

    /// The four boundary segments as a counter-clockwise walk from the
    /// bottom-left corner: bottom, right, top, left.
    ///
    /// Bottom and left lie on the inclusive boundary; top and right on the
    /// exclusive one (see [`crate::intersect`] for how that asymmetry is
    /// applied).
    pub fn edges(&self) -> [FixedLine; 4] {
        self.edges_wound(false)
    }

    /// The four boundary segments as a closed walk from the bottom-left
    /// corner, wound clockwise or counter-clockwise as requested.
    pub fn edges_wound(&self, clockwise: bool) -> [FixedLine; 4] {
        let [bl, br, tr, tl] = self.vertices();
        if clockwise {
            [
                FixedLine::new(bl, tl),
                FixedLine::new(tl, tr),
                FixedLine::new(tr, br),
                FixedLine::new(br, bl),
            ]
        } else {
            [
                FixedLine::new(bl, br),
                FixedLine::new(br, tr),
                FixedLine::new(tr, tl),
                FixedLine::new(tl, bl),
            ]
        }
    }
}
