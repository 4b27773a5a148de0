//! Exact segment/extent intersection with half-open edge semantics.
//!
//! Quadrants tile the plane with inclusive minimum edges and exclusive
//! maximum edges, and the intersection predicate has to mirror that asymmetry
//! exactly or a segment running along a shared boundary gets assigned to both
//! neighbouring quadrants (or to neither). The policy, applied identically at
//! every level:
//!
//! 1. A segment endpoint inside the quadrant (half-open containment) is an
//!    immediate hit.
//! 2. Otherwise the segment is tested against the four boundary edges with
//!    exact integer arithmetic. Top and right edges are *exclusive*: an
//!    intersection that falls exactly on one of the segment's own endpoints
//!    there belongs to the neighbouring quadrant. Bottom and left edges are
//!    *inclusive* except for their far corner (the tip they share with an
//!    exclusive edge), so a corner point is never assigned twice.
//! 3. Collinear overlap counts only along the inclusive edges, again minus
//!    the tip.
//!
//! Bounding-box prefilters are deliberately absent: a segment whose bounding
//! box overlaps a quadrant can still pass entirely outside it, and treating
//! that as a hit corrupts the snapped point order (see the regression test at
//! the bottom).
//!
//! The module also provides the endpoint classification used to prune the
//! quadtree descent: each segment endpoint is assigned to one of the four
//! infinite quadrants around the parent's centre, and the pair relationship
//! (same / adjacent / opposite) decides which children need testing at all.

use crate::fixed::{Extent, FixedLine, FixedPoint};

/// Cross product of `(a - o) x (b - o)`, exact in 128-bit arithmetic.
#[inline]
pub(crate) fn cross(o: FixedPoint, a: FixedPoint, b: FixedPoint) -> i128 {
    let ax = (a.x - o.x) as i128;
    let ay = (a.y - o.y) as i128;
    let bx = (b.x - o.x) as i128;
    let by = (b.y - o.y) as i128;
    ax * by - ay * bx
}

/// Whether `p`, known to be collinear with `line`, lies within its bounds.
#[inline]
fn on_segment(line: &FixedLine, p: FixedPoint) -> bool {
    p.x >= line.start.x.min(line.end.x)
        && p.x <= line.start.x.max(line.end.x)
        && p.y >= line.start.y.min(line.end.y)
        && p.y <= line.start.y.max(line.end.y)
}

#[inline]
fn strictly_opposite(d1: i128, d2: i128) -> bool {
    (d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)
}

/// Edge semantics for [`edge_intersects`].
#[derive(Debug, Clone, Copy)]
enum EdgeRule {
    /// Bottom/left: part of the quadrant, except for the far corner shared
    /// with an exclusive edge.
    Inclusive { tip: FixedPoint },
    /// Top/right: belongs to the neighbouring quadrant.
    Exclusive,
}

/// Exact segment-segment intersection between the query segment and one
/// axis-aligned boundary edge, under the given edge rule.
fn edge_intersects(seg: &FixedLine, edge: &FixedLine, rule: EdgeRule) -> bool {
    let d1 = cross(edge.start, edge.end, seg.start);
    let d2 = cross(edge.start, edge.end, seg.end);

    // Segment collinear with the edge line: overlap only counts on the
    // inclusive boundary.
    if d1 == 0 && d2 == 0 {
        return match rule {
            EdgeRule::Exclusive => false,
            EdgeRule::Inclusive { tip } => collinear_overlap_counts(seg, edge, tip),
        };
    }

    let d3 = cross(seg.start, seg.end, edge.start);
    let d4 = cross(seg.start, seg.end, edge.end);

    // Proper crossing: the intersection is interior to both segments, so it
    // can be neither a segment endpoint nor an edge corner.
    if strictly_opposite(d1, d2) && strictly_opposite(d3, d4) {
        return true;
    }

    match rule {
        EdgeRule::Exclusive => {
            // Only a touch that is not at one of the segment's own endpoints
            // counts: an edge corner sitting on the segment's interior.
            (d3 == 0
                && on_segment(seg, edge.start)
                && edge.start != seg.start
                && edge.start != seg.end)
                || (d4 == 0
                    && on_segment(seg, edge.end)
                    && edge.end != seg.start
                    && edge.end != seg.end)
        }
        EdgeRule::Inclusive { tip } => {
            // A segment endpoint resting on the edge (minus the tip).
            if d1 == 0 && on_segment(edge, seg.start) && seg.start != tip {
                return true;
            }
            if d2 == 0 && on_segment(edge, seg.end) && seg.end != tip {
                return true;
            }
            // An edge corner on the segment (minus the tip).
            if d3 == 0 && on_segment(seg, edge.start) && edge.start != tip {
                return true;
            }
            if d4 == 0 && on_segment(seg, edge.end) && edge.end != tip {
                return true;
            }
            false
        }
    }
}

/// Overlap of a segment collinear with an axis-aligned inclusive edge,
/// excluding an overlap that consists of the tip alone.
fn collinear_overlap_counts(seg: &FixedLine, edge: &FixedLine, tip: FixedPoint) -> bool {
    if edge.start.y == edge.end.y {
        let y = edge.start.y;
        let (e0, e1) = ordered(edge.start.x, edge.end.x);
        let (s0, s1) = ordered(seg.start.x, seg.end.x);
        let lo = e0.max(s0);
        let hi = e1.min(s1);
        lo <= hi && !(lo == hi && FixedPoint::new(lo, y) == tip)
    } else {
        let x = edge.start.x;
        let (e0, e1) = ordered(edge.start.y, edge.end.y);
        let (s0, s1) = ordered(seg.start.y, seg.end.y);
        let lo = e0.max(s0);
        let hi = e1.min(s1);
        lo <= hi && !(lo == hi && FixedPoint::new(x, lo) == tip)
    }
}

#[inline]
fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Decide whether `line` intersects the half-open `extent`.
pub fn line_intersects(line: &FixedLine, extent: &Extent) -> bool {
    if extent.contains(line.start) || extent.contains(line.end) {
        return true;
    }

    let [bl, br, tr, tl] = extent.vertices();
    let bottom = FixedLine::new(bl, br);
    let left = FixedLine::new(tl, bl);
    let top = FixedLine::new(tr, tl);
    let right = FixedLine::new(br, tr);

    edge_intersects(line, &bottom, EdgeRule::Inclusive { tip: br })
        || edge_intersects(line, &left, EdgeRule::Inclusive { tip: tl })
        || edge_intersects(line, &top, EdgeRule::Exclusive)
        || edge_intersects(line, &right, EdgeRule::Exclusive)
}

/// One child quadrant the descent must look at.
#[derive(Debug, Clone, Copy)]
pub struct ChildCheck {
    /// Child index, 0..4 in {bottom-left, bottom-right, top-left, top-right}.
    pub child: u8,
    /// Both segment endpoints are confirmed inside this child; the boundary
    /// test can be skipped.
    pub certain: bool,
    /// At most one of this child and its partner can be hit; a confirmed hit
    /// on the partner suppresses this check.
    pub mutex_with: Option<u8>,
}

/// Infinite quadrant of `p` relative to the split point, using the same
/// half-open convention as the cells: bit 0 set for the right half, bit 1 for
/// the top half.
#[inline]
fn infinite_quadrant(p: FixedPoint, split_x: i64, split_y: i64) -> u8 {
    ((p.y >= split_y) as u8) << 1 | (p.x >= split_x) as u8
}

/// Which children of `parent` can be intersected by `line`, derived from the
/// infinite-quadrant classification of the segment endpoints.
///
/// * Same quadrant: only that child, `certain` when the parent contains both
///   endpoints (they are then inside the child as well).
/// * Adjacent quadrants: the segment stays within the shared half-plane, so
///   only those two children.
/// * Opposite quadrants: all four, but a straight segment can pass through at
///   most one of the two off-diagonal children, so those carry `mutex_with`.
pub fn classify_children(line: &FixedLine, parent: &Extent) -> Vec<ChildCheck> {
    let split_x = parent.min_x + parent.x_span() / 2;
    let split_y = parent.min_y + parent.y_span() / 2;
    let q1 = infinite_quadrant(line.start, split_x, split_y);
    let q2 = infinite_quadrant(line.end, split_x, split_y);

    if q1 == q2 {
        let certain = parent.contains(line.start) && parent.contains(line.end);
        vec![ChildCheck {
            child: q1,
            certain,
            mutex_with: None,
        }]
    } else if q1 ^ q2 == 0b11 {
        let off1 = q1 ^ 0b01;
        let off2 = q1 ^ 0b10;
        vec![
            ChildCheck {
                child: q1,
                certain: false,
                mutex_with: None,
            },
            ChildCheck {
                child: q2,
                certain: false,
                mutex_with: None,
            },
            ChildCheck {
                child: off1,
                certain: false,
                mutex_with: Some(off2),
            },
            ChildCheck {
                child: off2,
                certain: false,
                mutex_with: Some(off1),
            },
        ]
    } else {
        vec![
            ChildCheck {
                child: q1,
                certain: false,
                mutex_with: None,
            },
            ChildCheck {
                child: q2,
                certain: false,
                mutex_with: None,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x1: i64, y1: i64, x2: i64, y2: i64) -> FixedLine {
        FixedLine::new(FixedPoint::new(x1, y1), FixedPoint::new(x2, y2))
    }

    fn unit_extent() -> Extent {
        Extent::new(0, 0, 10, 10)
    }

    #[test]
    fn test_endpoint_inside_is_a_hit() {
        assert!(line_intersects(&seg(5, 5, 50, 50), &unit_extent()));
        // Inclusive minimum corner.
        assert!(line_intersects(&seg(0, 0, -50, -50), &unit_extent()));
    }

    #[test]
    fn test_proper_crossing() {
        // Straight through the middle, both endpoints outside.
        assert!(line_intersects(&seg(-5, 5, 15, 5), &unit_extent()));
        assert!(line_intersects(&seg(5, -5, 5, 15), &unit_extent()));
    }

    #[test]
    fn test_disjoint_segment_misses() {
        assert!(!line_intersects(&seg(20, 20, 30, 25), &unit_extent()));
        assert!(!line_intersects(&seg(-5, 20, 20, 20), &unit_extent()));
    }

    #[test]
    fn test_collinear_on_bottom_edge_counts() {
        assert!(line_intersects(&seg(0, 0, 10, 0), &unit_extent()));
        assert!(line_intersects(&seg(-5, 0, 5, 0), &unit_extent()));
    }

    #[test]
    fn test_collinear_on_top_and_right_edges_excluded() {
        // These runs belong to the neighbouring quadrants.
        assert!(!line_intersects(&seg(0, 10, 10, 10), &unit_extent()));
        assert!(!line_intersects(&seg(10, 0, 10, 10), &unit_extent()));
    }

    #[test]
    fn test_collinear_touching_only_the_tip_excluded() {
        // Overlap with the bottom edge degenerates to the exclusive corner.
        assert!(!line_intersects(&seg(10, 0, 20, 0), &unit_extent()));
        // Same for the left edge's far corner.
        assert!(!line_intersects(&seg(0, 10, 0, 20), &unit_extent()));
    }

    #[test]
    fn test_segment_tip_on_exclusive_edge_excluded() {
        // Segment ends exactly on the top edge and continues away from the
        // quadrant: that point belongs to the cell above.
        assert!(!line_intersects(&seg(5, 10, 5, 20), &unit_extent()));
        assert!(!line_intersects(&seg(10, 5, 20, 5), &unit_extent()));
    }

    #[test]
    fn test_crossing_through_inclusive_corner_counts() {
        // Transversal pass through (0,0), which is part of this quadrant.
        assert!(line_intersects(&seg(-5, -5, 5, 5), &unit_extent()));
    }

    #[test]
    fn test_corner_on_segment_interior_counts_on_exclusive_edge() {
        // The top-left corner lies on the segment's interior; the intersection
        // is not at a segment endpoint, so the exclusive rule keeps it.
        assert!(line_intersects(&seg(-5, 5, 5, 15), &unit_extent()));
    }

    #[test]
    fn test_bounding_box_overlap_is_not_intersection() {
        // Regression: the segment's bounding box overlaps the extent but the
        // segment passes entirely outside it. A naive bbox prefilter reports
        // a hit here and corrupts the snapped sequence.
        let extent = Extent::new(
            135_196_160_000_000,
            516_981_760_000_000,
            135_202_880_000_000,
            516_988_480_000_000,
        );
        let line = seg(
            135_201_147_999_999,
            516_929_654_000_000,
            135_145_991_000_000,
            516_996_354_000_000,
        );
        assert!(!line_intersects(&line, &extent));
    }

    #[test]
    fn test_classify_same_quadrant_is_certain() {
        let parent = Extent::new(0, 0, 100, 100);
        let checks = classify_children(&seg(10, 10, 40, 20), &parent);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].child, 0);
        assert!(checks[0].certain);
    }

    #[test]
    fn test_classify_same_quadrant_outside_parent_not_certain() {
        let parent = Extent::new(0, 0, 100, 100);
        let checks = classify_children(&seg(-10, -10, 40, 20), &parent);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].child, 0);
        assert!(!checks[0].certain);
    }

    #[test]
    fn test_classify_adjacent_quadrants() {
        let parent = Extent::new(0, 0, 100, 100);
        // Bottom-left to bottom-right: top children cannot be touched.
        let checks = classify_children(&seg(10, 10, 90, 40), &parent);
        let children: Vec<u8> = checks.iter().map(|c| c.child).collect();
        assert_eq!(children, vec![0, 1]);
        assert!(checks.iter().all(|c| c.mutex_with.is_none()));
    }

    #[test]
    fn test_classify_opposite_quadrants_sets_mutex() {
        let parent = Extent::new(0, 0, 100, 100);
        let checks = classify_children(&seg(10, 10, 90, 90), &parent);
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[0].child, 0);
        assert_eq!(checks[1].child, 3);
        // The off-diagonal pair excludes each other.
        assert_eq!(checks[2].mutex_with, Some(checks[3].child));
        assert_eq!(checks[3].mutex_with, Some(checks[2].child));
    }

    #[test]
    fn test_half_open_split_assignment() {
        let parent = Extent::new(0, 0, 100, 100);
        // A point exactly on the split lines classifies into the top-right,
        // matching the half-open cell convention.
        let checks = classify_children(&seg(50, 50, 60, 60), &parent);
        assert_eq!(checks[0].child, 3);
    }
}
