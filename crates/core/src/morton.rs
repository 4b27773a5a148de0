//! Morton (Z-order) addressing for quadtree cells.
//!
//! A quadrant is identified by its level plus a single 64-bit code obtained by
//! interleaving the bits of its two axis indices. The interleaving preserves
//! spatial locality and makes parent/child navigation pure bit arithmetic:
//! the four children of code `z` are `z << 2 | pair`, the parent of `z` is
//! `z >> 2`, and two codes at the same level are siblings iff they agree on
//! all but the lowest bit pair.
//!
//! The x bit occupies the high position of each pair, so the four children of
//! a quadrant enumerate as bottom-left, bottom-right, top-left, top-right
//! (see [`child_code`]).

/// Highest axis index that can be interleaved into a 64-bit code.
pub const MAX_COORD: u64 = u32::MAX as u64;

/// Interleave two axis indices into a Z-order code.
///
/// Returns `None` if either index exceeds [`MAX_COORD`]; the interleaving of
/// larger values would not fit 64 bits.
pub fn to_z(x: u64, y: u64) -> Option<u64> {
    if x > MAX_COORD || y > MAX_COORD {
        return None;
    }

    let mut out: u64 = 0;
    for i in 0..32 {
        let bit = 31 - i;
        let vx = (x >> bit) & 1;
        let vy = (y >> bit) & 1;
        out |= (vx << 1 | vy) << (62 - 2 * i);
    }
    Some(out)
}

/// Interleave two axis indices, aborting on out-of-range input.
///
/// An out-of-range index means a caller computed a cell coordinate outside the
/// addressable grid, which is a programming error: continuing would silently
/// address the wrong quadrant.
///
/// # Panics
///
/// Panics if either index exceeds [`MAX_COORD`].
pub fn must_to_z(x: u64, y: u64) -> u64 {
    match to_z(x, y) {
        Some(z) => z,
        None => panic!("invalid coordinate for Z-order encoding: ({}, {}) exceeds 2^32-1", x, y),
    }
}

/// Recover the two axis indices from a Z-order code.
///
/// Exact inverse of [`to_z`]: `from_z(to_z(x, y)) == (x, y)` for all valid
/// inputs.
pub fn from_z(z: u64) -> (u64, u64) {
    let mut x: u64 = 0;
    let mut y: u64 = 0;
    for i in 0..32 {
        let bit = 31 - i;
        let pair = (z >> (62 - 2 * i)) & 0b11;
        x |= (pair >> 1) << bit;
        y |= (pair & 1) << bit;
    }
    (x, y)
}

/// Code of child `child` (0..4) of the quadrant with code `z`.
///
/// Children are ordered bottom-left (0), bottom-right (1), top-left (2),
/// top-right (3): bit 0 of the index selects the x half, bit 1 the y half,
/// with "bottom/left" sharing the parent's inclusive minimum edges.
pub fn child_code(z: u64, child: u8) -> u64 {
    debug_assert!(child < 4);
    let dx = (child & 1) as u64;
    let dy = (child >> 1) as u64;
    z << 2 | dx << 1 | dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let samples = [
            (0u64, 0u64),
            (1, 0),
            (0, 1),
            (123_456, 654_321),
            (MAX_COORD, 0),
            (0, MAX_COORD),
            (MAX_COORD, MAX_COORD),
        ];
        for (x, y) in samples {
            let z = to_z(x, y).expect("in-range coordinates");
            assert_eq!(from_z(z), (x, y), "round trip failed for ({}, {})", x, y);
        }
    }

    #[test]
    fn test_out_of_range_reports_not_ok() {
        assert_eq!(to_z(MAX_COORD + 1, 0), None);
        assert_eq!(to_z(0, MAX_COORD + 1), None);
        assert_eq!(to_z(u64::MAX, u64::MAX), None);
    }

    #[test]
    #[should_panic(expected = "invalid coordinate for Z-order encoding")]
    fn test_must_to_z_panics_out_of_range() {
        must_to_z(MAX_COORD + 1, 0);
    }

    #[test]
    fn test_child_codes_cover_cell_coordinates() {
        // Children of (x, y) at the next level are (2x+dx, 2y+dy).
        let (x, y) = (37u64, 91u64);
        let z = to_z(x, y).unwrap();
        for child in 0..4u8 {
            let dx = (child & 1) as u64;
            let dy = (child >> 1) as u64;
            assert_eq!(from_z(child_code(z, child)), (2 * x + dx, 2 * y + dy));
        }
    }

    #[test]
    fn test_parent_is_shift() {
        let z = to_z(1000, 2000).unwrap();
        for child in 0..4u8 {
            assert_eq!(child_code(z, child) >> 2, z);
        }
    }

    #[test]
    fn test_locality_of_first_pair() {
        // The leading bit pair selects the world quadrant.
        let z = to_z(MAX_COORD, MAX_COORD).unwrap();
        assert_eq!(z >> 62, 0b11);
        let z = to_z(0, MAX_COORD).unwrap();
        assert_eq!(z >> 62, 0b01);
    }
}
