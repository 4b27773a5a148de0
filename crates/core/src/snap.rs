//! Vertex snapping and ring repair.
//!
//! Snapping replaces every polygon vertex with the centroid of the quadtree
//! cell it falls in, and inserts the centroids of every populated cell each
//! edge passes through on the way. That keeps neighbouring polygons that
//! shared a boundary before snapping sharing it afterwards, instead of
//! opening slivers between them.
//!
//! Collapsing vertices onto a coarse grid creates degenerate shapes: spikes
//! where an edge doubles back over itself, and pinch points where the ring
//! touches its own path. Both show up as a centroid appearing twice in the
//! walked ring, so repair is a single rule applied recursively: split the
//! ring at the first repeated vertex into the loop between the two
//! occurrences and the remainder, and drop any piece left with fewer than
//! three distinct vertices. A spike's loop is empty and vanishes; a pinched
//! ring becomes two valid rings.
//!
//! When an exterior splits, each hole of the original polygon is reassigned
//! to the piece that contains it; holes left containing by no piece are
//! dropped.

use std::collections::HashMap;

use geo::orient::{Direction, Orient};
use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};

use crate::fixed::{FixedLine, FixedPoint};
use crate::index::{PointIndex, RingId};
use crate::intersect::cross;

/// Position of a point relative to a closed ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Outside,
    Boundary,
    Inside,
}

/// Snap one polygon onto the quadtree grid at `level`.
///
/// Returns zero or more repaired polygons: zero when the polygon collapses
/// below three distinct vertices, more than one when snapping pinches the
/// exterior into separate rings. Exteriors come back wound counter-clockwise
/// and holes clockwise.
pub fn snap_polygon(index: &mut PointIndex, polygon: &Polygon<f64>, level: u8) -> Vec<Polygon<f64>> {
    let (exterior, exterior_id) = snap_ring(index, &ring_coords(polygon.exterior()), level);
    let mut outers = Vec::new();
    collect_rings(index, exterior, exterior_id, level, &mut outers);
    if outers.is_empty() {
        log::debug!("exterior ring collapsed below three distinct vertices, dropping polygon");
        return Vec::new();
    }

    let mut holes: Vec<Vec<Vec<FixedPoint>>> = vec![Vec::new(); outers.len()];
    for interior in polygon.interiors() {
        let (snapped, ring_id) = snap_ring(index, &ring_coords(interior), level);
        let mut pieces = Vec::new();
        collect_rings(index, snapped, ring_id, level, &mut pieces);
        for piece in pieces {
            match find_containing_outer(&outers, &piece) {
                Some(i) => holes[i].push(piece),
                None => {
                    log::debug!("snapped hole fell outside every exterior piece, dropping it");
                }
            }
        }
    }

    outers
        .into_iter()
        .zip(holes)
        .map(|(outer, holes)| build_polygon(outer, holes))
        .collect()
}

/// Snap the polygonal variants of a geometry; everything else has no area to
/// snap and yields `None`, as does a polygon that collapses entirely.
pub fn snap_geometry(
    index: &mut PointIndex,
    geometry: &Geometry<f64>,
    level: u8,
) -> Option<Geometry<f64>> {
    let polygons = match geometry {
        Geometry::Polygon(polygon) => snap_polygon(index, polygon, level),
        Geometry::MultiPolygon(multi) => multi
            .0
            .iter()
            .flat_map(|polygon| snap_polygon(index, polygon, level))
            .collect(),
        _ => return None,
    };
    match polygons.len() {
        0 => None,
        1 => polygons.into_iter().next().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon(polygons))),
    }
}

/// Even-odd ray cast in exact integer arithmetic.
///
/// `ring` is an open list of distinct consecutive vertices; the closing edge
/// is implicit. A point exactly on a ring edge reports [`Containment::Boundary`].
pub fn ring_containment(point: FixedPoint, ring: &[FixedPoint]) -> Containment {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if point_on_edge(a, b, point) {
            return Containment::Boundary;
        }
        // Half-open y-range test, so an edge chain through a shared vertex
        // toggles exactly once.
        let upward = a.y <= point.y && point.y < b.y;
        let downward = b.y <= point.y && point.y < a.y;
        if upward || downward {
            let side = cross(a, b, point);
            if (side > 0) == upward {
                inside = !inside;
            }
        }
    }
    if inside {
        Containment::Inside
    } else {
        Containment::Outside
    }
}

fn point_on_edge(a: FixedPoint, b: FixedPoint, p: FixedPoint) -> bool {
    cross(a, b, p) == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Ring vertices without the closing duplicate.
fn ring_coords(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = ring.coords().copied().collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

/// Walk every cyclic edge of the ring through the index, collecting the
/// ordered centroids of the populated cells it crosses.
///
/// Each edge contributes all but its last centroid; the following edge starts
/// where this one ended. Consecutive duplicates (an edge that enters and
/// leaves a cell without reaching another populated one) are removed, also
/// across the cyclic seam.
fn snap_ring(index: &mut PointIndex, coords: &[Coord<f64>], level: u8) -> (Vec<FixedPoint>, RingId) {
    let ring_id = index.allocate_ring_id();
    let mut out = Vec::new();
    let n = coords.len();
    for i in 0..n {
        let edge = FixedLine::new(
            FixedPoint::from_coord(coords[i]),
            FixedPoint::from_coord(coords[(i + 1) % n]),
        );
        let mut snapped = index.snap_closest_points(edge, &[level], ring_id);
        let points = snapped.remove(&level).unwrap_or_default();
        let keep = points.len().saturating_sub(1);
        out.extend(points.into_iter().take(keep));
    }
    (dedup_cyclic(out), ring_id)
}

/// Deliver a walked ring into `out`, repairing it only when the index
/// recorded the ring touching a centroid more than once during the walk.
///
/// The index bookkeeping counts every raw touch, so it can flag a ring whose
/// repeats were already removed as consecutive duplicates; the repair pass
/// then finds nothing to split and keeps the ring as is.
fn collect_rings(
    index: &PointIndex,
    points: Vec<FixedPoint>,
    ring_id: RingId,
    level: u8,
    out: &mut Vec<Vec<FixedPoint>>,
) {
    if index.ring_revisits(level, ring_id) {
        if let Some(hits) = index.get_hit_multiple(level) {
            let revisited = hits
                .iter()
                .filter(|(_, rings)| rings.contains(&ring_id))
                .count();
            log::debug!("ring touched {} centroids more than once, repairing", revisited);
        }
        split_at_revisits(points, out);
    } else if points.len() >= 3 {
        out.push(points);
    }
}

fn dedup_cyclic(mut points: Vec<FixedPoint>) -> Vec<FixedPoint> {
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Split a walked ring at repeated vertices until no vertex appears twice,
/// keeping every piece with at least three distinct vertices.
///
/// The split takes the loop between the two occurrences of the first repeat
/// as one piece and the remainder (with the repeated vertex kept once) as the
/// other, then recurses into both. A spike leaves an empty loop behind; a
/// pinched ring yields two proper rings.
fn split_at_revisits(points: Vec<FixedPoint>, out: &mut Vec<Vec<FixedPoint>>) {
    let mut seen: HashMap<FixedPoint, usize> = HashMap::new();
    for (j, point) in points.iter().enumerate() {
        if let Some(&i) = seen.get(point) {
            let inner = points[i..j].to_vec();
            let mut rest = points[..i].to_vec();
            rest.extend_from_slice(&points[j..]);
            split_at_revisits(dedup_cyclic(inner), out);
            split_at_revisits(dedup_cyclic(rest), out);
            return;
        }
        seen.insert(*point, j);
    }
    if points.len() >= 3 {
        out.push(points);
    }
}

/// The exterior piece containing the hole, if any. The hole's first vertex
/// stands in for the whole ring; a vertex on a piece's boundary (a pinch
/// centroid) counts as contained.
fn find_containing_outer(outers: &[Vec<FixedPoint>], hole: &[FixedPoint]) -> Option<usize> {
    let probe = *hole.first()?;
    outers
        .iter()
        .position(|outer| ring_containment(probe, outer) != Containment::Outside)
}

/// Assemble and orient a polygon: exterior counter-clockwise, holes
/// clockwise.
fn build_polygon(outer: Vec<FixedPoint>, holes: Vec<Vec<FixedPoint>>) -> Polygon<f64> {
    let interiors = holes.into_iter().map(to_line_string).collect();
    Polygon::new(to_line_string(outer), interiors).orient(Direction::Default)
}

fn to_line_string(points: Vec<FixedPoint>) -> LineString<f64> {
    LineString::from(
        points
            .into_iter()
            .map(FixedPoint::to_coord)
            .collect::<Vec<_>>(),
    )
}
