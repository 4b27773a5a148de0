//! Sparse quadtree point index over a fixed-point grid.
//!
//! The index realizes a quadrant hierarchy from level 0 (the whole grid) down
//! to a configured deepest level, but only along the paths of inserted
//! points: a quadrant exists in the `(level, Morton code)` table iff at least
//! one point landed in it. Parent/child relationships are pure bit arithmetic
//! on the code (see [`crate::morton`]); there are no node pointers and no
//! cyclic ownership.
//!
//! Every quadrant extent and centroid is computed directly from
//! `(level, x, y)` against the deepest-level resolution, never by repeatedly
//! halving a parent extent, so coordinates cannot drift across levels.
//!
//! One index serves one polygon (or one batch of polygons sharing a grid and
//! zoom level): insert all vertices first, then issue
//! [`PointIndex::snap_closest_points`] queries per edge. The index also keeps
//! the hit-once/hit-multiple bookkeeping that lets the snapping algorithm
//! detect a ring revisiting a grid centroid.

use std::collections::{BTreeMap, HashMap};

use geo::{Coord, Geometry, Polygon};

use crate::fixed::{FixedLine, FixedPoint, Extent, Ordinate};
use crate::grid::{GridDescriptor, GridError, MAX_LEVEL};
use crate::intersect::{classify_children, line_intersects};
use crate::morton;

/// Identifier of one polygon ring within the lifetime of an index.
pub type RingId = u64;

/// One realized quadtree cell.
#[derive(Debug, Clone)]
pub struct Quadrant {
    /// Level of this quadrant; 0 is the whole grid.
    pub level: u8,
    /// Morton code of the cell within its level.
    pub z: u64,
    /// Covered extent, min edges inclusive, max edges exclusive.
    pub extent: Extent,
    /// The snapped target point: every input point inside the quadrant
    /// collapses to this coordinate. Offset half a deepest-level cell from
    /// the geometric centre so it coincides with the centroid of one of the
    /// quadrant's deepest descendants.
    pub centroid: FixedPoint,
}

/// Sparse quadtree point index; see the module docs for the lifecycle.
#[derive(Debug)]
pub struct PointIndex {
    extent: Extent,
    deepest_level: u8,
    deepest_size: u64,
    resolution_x: Ordinate,
    resolution_y: Ordinate,
    quadrants: HashMap<(u8, u64), Quadrant>,
    hit_once: HashMap<u8, HashMap<FixedPoint, Vec<RingId>>>,
    hit_multiple: HashMap<u8, HashMap<FixedPoint, Vec<RingId>>>,
    next_ring_id: RingId,
}

impl PointIndex {
    /// Build an (empty) index for `grid` subdivided down to `deepest_level`.
    ///
    /// The grid descriptor is validated eagerly; a descriptor that does not
    /// describe a proper doubling quadtree is rejected and no index is
    /// created.
    pub fn new(grid: &GridDescriptor, deepest_level: u8) -> Result<Self, GridError> {
        grid.validate()?;
        if deepest_level > MAX_LEVEL {
            return Err(GridError::LevelTooDeep {
                level: deepest_level,
                max: MAX_LEVEL,
            });
        }

        let extent = grid.extent();
        let deepest_size = 1u64 << deepest_level;
        let resolution_x = extent.x_span() / deepest_size as i64;
        let resolution_y = extent.y_span() / deepest_size as i64;
        if resolution_x <= 0 || resolution_y <= 0 {
            return Err(GridError::ResolutionTooFine {
                level: deepest_level,
            });
        }

        log::debug!(
            "point index: {} cells per axis at level {}, resolution ({}, {}) fixed units",
            deepest_size,
            deepest_level,
            resolution_x,
            resolution_y
        );

        Ok(Self {
            extent,
            deepest_level,
            deepest_size,
            resolution_x,
            resolution_y,
            quadrants: HashMap::new(),
            hit_once: HashMap::new(),
            hit_multiple: HashMap::new(),
            next_ring_id: 0,
        })
    }

    /// The configured deepest level.
    pub fn deepest_level(&self) -> u8 {
        self.deepest_level
    }

    /// Deepest-level cell size in fixed units, per axis.
    pub fn deepest_resolution(&self) -> (Ordinate, Ordinate) {
        (self.resolution_x, self.resolution_y)
    }

    /// Number of realized quadrants across all levels.
    pub fn quadrant_count(&self) -> usize {
        self.quadrants.len()
    }

    /// Look up a realized quadrant.
    pub fn quadrant(&self, level: u8, z: u64) -> Option<&Quadrant> {
        self.quadrants.get(&(level, z))
    }

    /// Hand out a fresh ring identifier for the hit bookkeeping.
    pub fn allocate_ring_id(&mut self) -> RingId {
        let id = self.next_ring_id;
        self.next_ring_id += 1;
        id
    }

    /// Extent of the quadrant at `(level, x, y)`, derived directly from the
    /// deepest resolution.
    ///
    /// The integer resolution truncates, so the nominal cells can cover less
    /// than the grid span; the last row and column absorb the remainder. They
    /// also run one unit past the grid maximum, because the grid's own outer
    /// boundary is inclusive while every interior cell boundary is half-open.
    fn quadrant_extent(&self, level: u8, x: u64, y: u64) -> Extent {
        let cells = (1u64 << (self.deepest_level - level)) as i64;
        let last = (1u64 << level) - 1;
        let min_x = self.extent.min_x + x as i64 * cells * self.resolution_x;
        let min_y = self.extent.min_y + y as i64 * cells * self.resolution_y;
        let max_x = if x == last {
            self.extent.max_x + 1
        } else {
            min_x + cells * self.resolution_x
        };
        let max_y = if y == last {
            self.extent.max_y + 1
        } else {
            min_y + cells * self.resolution_y
        };
        Extent::new(min_x, min_y, max_x, max_y)
    }

    /// Centroid of the quadrant at `(level, x, y)`: the geometric centre
    /// shifted by half a deepest-level cell, putting it at the centre of a
    /// deepest-level cell at every level.
    fn quadrant_centroid(&self, level: u8, x: u64, y: u64) -> FixedPoint {
        let cells = (1u64 << (self.deepest_level - level)) as i64;
        let half = cells / 2;
        FixedPoint::new(
            self.extent.min_x + (x as i64 * cells + half) * self.resolution_x + self.resolution_x / 2,
            self.extent.min_y + (y as i64 * cells + half) * self.resolution_y + self.resolution_y / 2,
        )
    }

    /// Deepest-level cell coordinates of a point. The grid's outer boundary
    /// is inclusive on all four sides.
    ///
    /// # Panics
    ///
    /// Panics when the point lies outside the configured grid extent. Callers
    /// are expected to have filtered their input to the grid; a point outside
    /// it would be snapped to a quadrant that does not exist, which is a
    /// programming error rather than a data condition.
    fn cell_of(&self, point: FixedPoint) -> (u64, u64) {
        let dx = point.x - self.extent.min_x;
        let dy = point.y - self.extent.min_y;
        assert!(
            dx >= 0 && dy >= 0,
            "point ({}, {}) lies below the grid extent minimum",
            point.x,
            point.y
        );
        assert!(
            dx <= self.extent.x_span() && dy <= self.extent.y_span(),
            "point ({}, {}) lies outside the grid extent",
            point.x,
            point.y
        );
        // The nominal cells can undershoot the span (the integer resolution
        // truncates) and the grid's outer boundary is inclusive; both cases
        // belong to the last row/column.
        let cx = ((dx / self.resolution_x) as u64).min(self.deepest_size - 1);
        let cy = ((dy / self.resolution_y) as u64).min(self.deepest_size - 1);
        (cx, cy)
    }

    /// Insert one point, realizing its quadrant chain at every level from 0
    /// down to the deepest.
    ///
    /// # Panics
    ///
    /// Panics when the point lies outside the configured grid extent (see
    /// [`Self::cell_of`]).
    pub fn insert_point(&mut self, coord: Coord<f64>) {
        let point = FixedPoint::from_coord(coord);
        let (cx, cy) = self.cell_of(point);

        for level in 0..=self.deepest_level {
            let shift = self.deepest_level - level;
            let (lx, ly) = (cx >> shift, cy >> shift);
            let z = morton::must_to_z(lx, ly);
            let key = (level, z);
            if !self.quadrants.contains_key(&key) {
                let quadrant = Quadrant {
                    level,
                    z,
                    extent: self.quadrant_extent(level, lx, ly),
                    centroid: self.quadrant_centroid(level, lx, ly),
                };
                self.quadrants.insert(key, quadrant);
            }
        }
    }

    /// Insert every vertex of every ring of a polygon.
    pub fn insert_polygon(&mut self, polygon: &Polygon<f64>) {
        for coord in polygon.exterior().coords() {
            self.insert_point(*coord);
        }
        for ring in polygon.interiors() {
            for coord in ring.coords() {
                self.insert_point(*coord);
            }
        }
    }

    /// Insert the vertices of the polygonal variants of a geometry; other
    /// variants carry nothing to snap and are skipped.
    pub fn insert_geometry(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Polygon(polygon) => self.insert_polygon(polygon),
            Geometry::MultiPolygon(multi) => {
                for polygon in &multi.0 {
                    self.insert_polygon(polygon);
                }
            }
            _ => {}
        }
    }

    /// Centroids of all realized quadrants intersected by `line`, per
    /// requested level, ordered along the segment.
    ///
    /// As a side effect the deepest-level hit bookkeeping is updated for
    /// `ring`: every returned point beyond the first is recorded, a first
    /// touch into hit-once and a repeated touch by the same ring into
    /// hit-multiple (the signal that snapping made the ring's path touch
    /// itself). The first point is skipped because it was already recorded as
    /// the last point of the previous edge of the ring walk.
    pub fn snap_closest_points(
        &mut self,
        line: FixedLine,
        levels: &[u8],
        ring: RingId,
    ) -> BTreeMap<u8, Vec<FixedPoint>> {
        let mut collected: BTreeMap<u8, Vec<(i128, u64, FixedPoint)>> = BTreeMap::new();
        for &level in levels {
            assert!(
                level <= self.deepest_level,
                "requested snap level {} exceeds deepest level {}",
                level,
                self.deepest_level
            );
            collected.insert(level, Vec::new());
        }
        let max_level = match levels.iter().max() {
            Some(max) => *max,
            None => return BTreeMap::new(),
        };

        if let Some(root) = self.quadrants.get(&(0, 0)) {
            self.descend(root, &line, max_level, &mut collected);
        }

        let mut result = BTreeMap::new();
        for (level, mut entries) in collected {
            entries.sort_unstable_by_key(|(t, z, _)| (*t, *z));
            let points: Vec<FixedPoint> = entries.into_iter().map(|(_, _, p)| p).collect();
            for point in points.iter().skip(1) {
                self.record_hit(level, *point, ring);
            }
            result.insert(level, points);
        }
        result
    }

    /// Walk the realized children of `quad`, pruned by the infinite-quadrant
    /// classification of the segment endpoints.
    fn descend(
        &self,
        quad: &Quadrant,
        line: &FixedLine,
        max_level: u8,
        collected: &mut BTreeMap<u8, Vec<(i128, u64, FixedPoint)>>,
    ) {
        if let Some(entries) = collected.get_mut(&quad.level) {
            entries.push((traversal_key(line, quad.centroid), quad.z, quad.centroid));
        }
        if quad.level >= max_level {
            return;
        }

        let checks = classify_children(line, &quad.extent);
        let mut hit = [false; 4];
        for check in checks {
            if let Some(partner) = check.mutex_with {
                if hit[partner as usize] {
                    continue;
                }
            }
            let code = morton::child_code(quad.z, check.child);
            if let Some(child) = self.quadrants.get(&(quad.level + 1, code)) {
                if check.certain || line_intersects(line, &child.extent) {
                    hit[check.child as usize] = true;
                    self.descend(child, line, max_level, collected);
                }
            }
        }
    }

    fn record_hit(&mut self, level: u8, point: FixedPoint, ring: RingId) {
        let seen = self
            .hit_once
            .entry(level)
            .or_default()
            .entry(point)
            .or_default();
        if seen.contains(&ring) {
            let again = self
                .hit_multiple
                .entry(level)
                .or_default()
                .entry(point)
                .or_default();
            if !again.contains(&ring) {
                again.push(ring);
            }
        } else {
            seen.push(ring);
        }
    }

    /// Centroids touched more than once by the same ring at `level`, with the
    /// rings that did so.
    pub fn get_hit_multiple(&self, level: u8) -> Option<&HashMap<FixedPoint, Vec<RingId>>> {
        self.hit_multiple.get(&level)
    }

    /// Whether `ring` revisited any centroid at `level`.
    pub fn ring_revisits(&self, level: u8, ring: RingId) -> bool {
        self.hit_multiple
            .get(&level)
            .map(|hits| hits.values().any(|rings| rings.contains(&ring)))
            .unwrap_or(false)
    }
}

/// Ordering key of a centroid along the query segment: the projection of the
/// centroid onto the segment direction, exact in 128-bit arithmetic.
#[inline]
fn traversal_key(line: &FixedLine, centroid: FixedPoint) -> i128 {
    let dx = (line.end.x - line.start.x) as i128;
    let dy = (line.end.y - line.start.y) as i128;
    (centroid.x - line.start.x) as i128 * dx + (centroid.y - line.start.y) as i128 * dy
}
