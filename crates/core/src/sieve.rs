//! Area-threshold filtering.
//!
//! Before snapping, polygons too small to survive on the target grid are
//! sieved out: a polygon whose area is at most one grid cell
//! (`resolution * resolution`) would collapse to a point or sliver anyway,
//! and a hole that small would close up. Dropping them early keeps the point
//! index free of vertices that cannot contribute to the output.
//!
//! The polygon-level decision uses the *net* area, exterior minus holes: a
//! thin donut encloses almost nothing and is dropped even when its exterior
//! alone would clear the threshold.
//!
//! Areas are computed with the shoelace formula on fixed-point ordinates, so
//! the comparison against the threshold is exact. The formula indexes
//! cyclically and therefore accepts both open rings and rings carrying the
//! closing duplicate vertex.

use geo::{Geometry, LineString, MultiPolygon, Polygon};

use crate::fixed::{self, FixedPoint};

/// Twice the enclosed area of a ring, in squared fixed units.
///
/// Doubled to stay integral; callers compare against a doubled threshold.
fn doubled_ring_area(ring: &LineString<f64>) -> i128 {
    let points: Vec<FixedPoint> = ring.coords().map(|c| FixedPoint::from_coord(*c)).collect();
    let n = points.len();
    if n < 3 {
        return 0;
    }
    let mut sum: i128 = 0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.y as i128 * b.x as i128 - a.x as i128 * b.y as i128;
    }
    sum.abs()
}

/// Twice the net enclosed area of a polygon: the exterior minus every hole.
fn doubled_polygon_area(polygon: &Polygon<f64>) -> i128 {
    let holes: i128 = polygon.interiors().iter().map(doubled_ring_area).sum();
    doubled_ring_area(polygon.exterior()) - holes
}

/// Enclosed area of a ring in squared map units.
pub fn ring_area(ring: &LineString<f64>) -> f64 {
    doubled_ring_area(ring) as f64 / (2.0 * fixed::SCALE as f64 * fixed::SCALE as f64)
}

/// Net enclosed area of a polygon in squared map units, exterior minus
/// holes.
pub fn polygon_area(polygon: &Polygon<f64>) -> f64 {
    doubled_polygon_area(polygon) as f64 / (2.0 * fixed::SCALE as f64 * fixed::SCALE as f64)
}

/// Doubled threshold in squared fixed units for a map-unit resolution.
fn doubled_threshold(resolution: f64) -> i128 {
    let res = fixed::to_fixed(resolution) as i128;
    2 * res * res
}

/// Keep `polygon` if its net area exceeds one grid cell, discarding any hole
/// that does not.
pub fn polygon_sieve(polygon: &Polygon<f64>, resolution: f64) -> Option<Polygon<f64>> {
    let threshold = doubled_threshold(resolution);
    if doubled_polygon_area(polygon) <= threshold {
        return None;
    }
    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .filter(|ring| doubled_ring_area(ring) > threshold)
        .cloned()
        .collect();
    Some(Polygon::new(polygon.exterior().clone(), interiors))
}

/// Sieve every member polygon; `None` when none survives.
pub fn multi_polygon_sieve(
    multi: &MultiPolygon<f64>,
    resolution: f64,
) -> Option<MultiPolygon<f64>> {
    let kept: Vec<Polygon<f64>> = multi
        .0
        .iter()
        .filter_map(|polygon| polygon_sieve(polygon, resolution))
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(MultiPolygon(kept))
    }
}

/// Sieve the polygonal variants of a geometry; non-areal geometries carry no
/// area to test and yield `None`.
pub fn sieve_geometry(geometry: &Geometry<f64>, resolution: f64) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => polygon_sieve(polygon, resolution).map(Geometry::Polygon),
        Geometry::MultiPolygon(multi) => {
            multi_polygon_sieve(multi, resolution).map(Geometry::MultiPolygon)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(size: f64) -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: size, y: 0.0),
            (x: size, y: size),
            (x: 0.0, y: size),
        ]
    }

    #[test]
    fn test_ring_area_square() {
        assert_eq!(ring_area(square(3.5).exterior()), 12.25);
    }

    #[test]
    fn test_ring_area_winding_independent() {
        let mut reversed = square(3.5);
        reversed.exterior_mut(|ring| ring.0.reverse());
        assert_eq!(ring_area(reversed.exterior()), 12.25);
    }

    #[test]
    fn test_ring_area_open_ring() {
        // Without the closing duplicate the cyclic indexing closes the ring.
        let open = LineString::from(vec![(0.0, 0.0), (3.5, 0.0), (3.5, 3.5), (0.0, 3.5)]);
        assert_eq!(ring_area(&open), 12.25);
    }

    #[test]
    fn test_polygon_at_threshold_is_dropped() {
        // Area 9 equals one cell at resolution 3; at most one cell drops.
        assert!(polygon_sieve(&square(3.0), 3.0).is_none());
        assert!(polygon_sieve(&square(3.5), 3.0).is_some());
    }

    #[test]
    fn test_hundred_unit_rectangle_thresholds() {
        // 10x10 rectangle, area 100: survives a 9-unit pixel (100 > 81),
        // drops once a pixel reaches it (100 <= 100) or dwarfs it.
        let rect = square(10.0);
        assert!(polygon_sieve(&rect, 9.0).is_some());
        assert!(polygon_sieve(&rect, 10.0).is_none());
        assert!(polygon_sieve(&rect, 101.0).is_none());
    }

    #[test]
    fn test_sieve_subtracts_hole_area() {
        // Outer 100, hole 92.16: the donut's net area 7.84 is below one
        // 9-unit² cell even though the exterior alone clears it.
        let donut = polygon![
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
            ],
            interiors: [
                [
                    (x: 0.2, y: 0.2),
                    (x: 9.8, y: 0.2),
                    (x: 9.8, y: 9.8),
                    (x: 0.2, y: 9.8),
                ],
            ],
        ];
        assert_eq!(polygon_area(&donut), 7.84);
        assert!(polygon_sieve(&donut, 3.0).is_none());

        // A modest hole leaves plenty of net area; both rings survive.
        let ring_shaped = polygon![
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
            ],
            interiors: [
                [
                    (x: 3.0, y: 3.0),
                    (x: 6.5, y: 3.0),
                    (x: 6.5, y: 6.5),
                    (x: 3.0, y: 6.5),
                ],
            ],
        ];
        let sieved = polygon_sieve(&ring_shaped, 3.0).unwrap();
        assert_eq!(sieved.interiors().len(), 1);
    }

    #[test]
    fn test_small_hole_is_discarded() {
        let with_holes = polygon![
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 20.0, y: 0.0),
                (x: 20.0, y: 20.0),
                (x: 0.0, y: 20.0),
            ],
            interiors: [
                [
                    (x: 1.0, y: 1.0),
                    (x: 4.5, y: 1.0),
                    (x: 4.5, y: 4.5),
                    (x: 1.0, y: 4.5),
                ],
                [
                    (x: 10.0, y: 10.0),
                    (x: 13.0, y: 10.0),
                    (x: 13.0, y: 13.0),
                    (x: 10.0, y: 13.0),
                ],
            ],
        ];
        // The 12.25 hole survives at resolution 3, the 9.0 hole does not.
        let sieved = polygon_sieve(&with_holes, 3.0).unwrap();
        assert_eq!(sieved.interiors().len(), 1);
        assert_eq!(ring_area(&sieved.interiors()[0]), 12.25);
    }

    #[test]
    fn test_multi_polygon_sieve_drops_members() {
        let multi = MultiPolygon(vec![square(2.0), square(10.0)]);
        let sieved = multi_polygon_sieve(&multi, 3.0).unwrap();
        assert_eq!(sieved.0.len(), 1);
        assert_eq!(ring_area(sieved.0[0].exterior()), 100.0);

        let tiny = MultiPolygon(vec![square(1.0)]);
        assert!(multi_polygon_sieve(&tiny, 3.0).is_none());
    }

    #[test]
    fn test_sieve_geometry_non_areal_is_dropped() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (5.0, 5.0)]));
        assert!(sieve_geometry(&line, 3.0).is_none());
    }
}
