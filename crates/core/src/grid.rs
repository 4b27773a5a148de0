//! Tile grid descriptor and structural validation.
//!
//! The quadtree point index only works on a *proper* quadtree grid: square
//! tiles, square matrices, contiguous level ids starting at 0, each level
//! doubling the previous one, a single origin shared by every level, and no
//! variable-width rows. Those are structural preconditions of the whole
//! snapping pipeline, so they are validated once and eagerly when an index is
//! constructed, and surfaced as recoverable [`GridError`]s.
//!
//! The descriptor is a plain value loaded by the configuration layer (it
//! derives serde traits for that purpose); the core never caches descriptors
//! internally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixed::{self, Extent};

/// Deepest quadtree level addressable with 64-bit Morton codes.
pub const MAX_LEVEL: u8 = 31;

/// Errors detected while validating a grid descriptor.
///
/// All of these indicate a configuration problem, not a data problem: the
/// index is not created and the caller decides whether to abort the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid descriptor defines no tile matrices")]
    Empty,

    #[error("tile matrix level {level} has non-square tiles ({width}x{height})")]
    NonSquareTile { level: u8, width: u32, height: u32 },

    #[error("tile matrix level {level} has a non-square matrix ({width}x{height})")]
    NonSquareMatrix { level: u8, width: u32, height: u32 },

    #[error("tile matrix levels are not contiguous: expected level {expected}, found {found}")]
    NonContiguousLevels { expected: u8, found: u8 },

    #[error("tile matrix level {level} does not double the size of the previous level")]
    NotDoubling { level: u8 },

    #[error("tile matrix level {level} declares an origin different from level 0")]
    InconsistentOrigin { level: u8 },

    #[error("tile matrix level {level} declares a corner-of-origin different from level 0")]
    InconsistentCorner { level: u8 },

    #[error("tile matrix level {level} has variable-width rows")]
    VariableWidths { level: u8 },

    #[error("tile matrix level {level} does not describe a power-of-two pixel grid")]
    NonPowerOfTwoGrid { level: u8 },

    #[error("zoom level {zoom} is not described by the grid")]
    UnknownZoom { zoom: u8 },

    #[error("deepest level {level} exceeds the addressable quadtree depth ({max})")]
    LevelTooDeep { level: u8, max: u8 },

    #[error("grid extent is too small to subdivide to level {level} at fixed-point precision")]
    ResolutionTooFine { level: u8 },
}

/// Which corner of the grid the tile matrix origin refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerOfOrigin {
    #[default]
    BottomLeft,
    TopLeft,
}

/// One zoom level of the tile matrix hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrix {
    /// Zoom level id; must run 0..N without gaps.
    pub level: u8,
    /// Number of tile columns.
    pub matrix_width: u32,
    /// Number of tile rows.
    pub matrix_height: u32,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Matrix origin; defaults to the grid extent minimum when absent.
    #[serde(default)]
    pub origin: Option<(f64, f64)>,
    /// Corner the origin refers to.
    #[serde(default)]
    pub corner_of_origin: CornerOfOrigin,
    /// Per-row matrix widths for grids with variable-width rows. Must be
    /// absent or uniform; non-uniform rows break the quadtree subdivision.
    #[serde(default)]
    pub row_widths: Option<Vec<u32>>,
}

impl TileMatrix {
    /// A plain square matrix level with `2^level` tiles per axis.
    pub fn square(level: u8, tile_size: u32) -> Self {
        let size = 1u32 << level;
        Self {
            level,
            matrix_width: size,
            matrix_height: size,
            tile_width: tile_size,
            tile_height: tile_size,
            origin: None,
            corner_of_origin: CornerOfOrigin::default(),
            row_widths: None,
        }
    }
}

/// Diagnostic for a grid/level combination: how far the fixed-point deepest
/// resolution deviates from the exact floating-point one, accumulated across
/// the whole extent.
///
/// A configuration is safe to use at a given depth when `pixels` stays well
/// below one: snapped coordinates then deviate by less than a deepest-level
/// cell from where an exact-real subdivision would put them. This is a
/// diagnostic, not an error; processing is never blocked on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionDeviation {
    /// Deviation at the far edge of the grid, in coordinate units.
    pub units: f64,
    /// The same deviation expressed in deepest-level cells ("pixels").
    pub pixels: f64,
}

/// The tile grid configuration the index is built from: a root extent plus
/// the tile matrix hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDescriptor {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub matrices: Vec<TileMatrix>,
}

impl GridDescriptor {
    /// Synthesize a valid doubling quadtree grid over `extent` with matrix
    /// levels `0..=max_level`, for callers that have no full tile-matrix-set
    /// table to load.
    pub fn doubling(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        max_level: u8,
        tile_size: u32,
    ) -> Self {
        let matrices = (0..=max_level)
            .map(|level| TileMatrix::square(level, tile_size))
            .collect();
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            matrices,
        }
    }

    /// Root extent in the fixed-point domain.
    pub fn extent(&self) -> Extent {
        Extent::new(
            fixed::to_fixed(self.min_x),
            fixed::to_fixed(self.min_y),
            fixed::to_fixed(self.max_x),
            fixed::to_fixed(self.max_y),
        )
    }

    /// Highest zoom level described by the matrices.
    pub fn max_zoom(&self) -> u8 {
        self.matrices.last().map(|m| m.level).unwrap_or(0)
    }

    /// Units per pixel at the given zoom level, or `None` when the level is
    /// not described.
    pub fn pixel_resolution(&self, zoom: u8) -> Option<f64> {
        let matrix = self.matrices.iter().find(|m| m.level == zoom)?;
        let pixels = matrix.matrix_width as f64 * matrix.tile_width as f64;
        Some((self.max_x - self.min_x) / pixels)
    }

    /// Quadtree level whose cells are exactly one pixel at `zoom`, i.e.
    /// `log2(matrix_width * tile_width)`.
    ///
    /// Fails when the pixel grid at that zoom is not a power of two or would
    /// exceed the addressable quadtree depth.
    pub fn quad_level_for_zoom(&self, zoom: u8) -> Result<u8, GridError> {
        let matrix = self
            .matrices
            .iter()
            .find(|m| m.level == zoom)
            .ok_or(GridError::UnknownZoom { zoom })?;
        let pixels = matrix.matrix_width as u64 * matrix.tile_width as u64;
        if !pixels.is_power_of_two() {
            return Err(GridError::NonPowerOfTwoGrid { level: zoom });
        }
        let level = pixels.trailing_zeros() as u8;
        if level > MAX_LEVEL {
            return Err(GridError::LevelTooDeep {
                level,
                max: MAX_LEVEL,
            });
        }
        Ok(level)
    }

    /// Validate the structural quadtree preconditions.
    pub fn validate(&self) -> Result<(), GridError> {
        let first = self.matrices.first().ok_or(GridError::Empty)?;
        let base_origin = first.origin.unwrap_or((self.min_x, self.min_y));
        let base_corner = first.corner_of_origin;

        let mut previous: Option<&TileMatrix> = None;
        for (i, matrix) in self.matrices.iter().enumerate() {
            if matrix.level as usize != i {
                return Err(GridError::NonContiguousLevels {
                    expected: i as u8,
                    found: matrix.level,
                });
            }
            if matrix.tile_width != matrix.tile_height {
                return Err(GridError::NonSquareTile {
                    level: matrix.level,
                    width: matrix.tile_width,
                    height: matrix.tile_height,
                });
            }
            if matrix.matrix_width != matrix.matrix_height {
                return Err(GridError::NonSquareMatrix {
                    level: matrix.level,
                    width: matrix.matrix_width,
                    height: matrix.matrix_height,
                });
            }
            if matrix.origin.unwrap_or(base_origin) != base_origin {
                return Err(GridError::InconsistentOrigin {
                    level: matrix.level,
                });
            }
            if matrix.corner_of_origin != base_corner {
                return Err(GridError::InconsistentCorner {
                    level: matrix.level,
                });
            }
            if let Some(widths) = &matrix.row_widths {
                if widths.iter().any(|w| *w != matrix.matrix_width) {
                    return Err(GridError::VariableWidths {
                        level: matrix.level,
                    });
                }
            }
            if let Some(prev) = previous {
                if matrix.matrix_width != prev.matrix_width * 2
                    || matrix.tile_width != prev.tile_width
                {
                    return Err(GridError::NotDoubling {
                        level: matrix.level,
                    });
                }
            }
            previous = Some(matrix);
        }
        Ok(())
    }

    /// Compute the fixed-point resolution deviation at `deepest_level`.
    ///
    /// The fixed-point deepest resolution is the integer division of the
    /// extent span by the cell count; whatever that division truncates
    /// accumulates towards the far edge of the grid. See
    /// [`ResolutionDeviation`] for how to read the result.
    pub fn resolution_deviation(&self, deepest_level: u8) -> ResolutionDeviation {
        let cells = 1u64 << deepest_level.min(MAX_LEVEL);
        let extent = self.extent();

        let span = extent.x_span().max(extent.y_span());
        let fixed_resolution = span / cells as i64;
        let covered = fixed_resolution * cells as i64;
        let units = fixed::to_float(span - covered);

        let float_resolution = fixed::to_float(span) / cells as f64;
        let pixels = if float_resolution > 0.0 {
            units / float_resolution
        } else {
            0.0
        };
        ResolutionDeviation { units, pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_descriptor_is_valid() {
        let grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 6, 256);
        assert!(grid.validate().is_ok());
        assert_eq!(grid.max_zoom(), 6);
    }

    #[test]
    fn test_empty_descriptor_rejected() {
        let grid = GridDescriptor {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
            matrices: vec![],
        };
        assert_eq!(grid.validate(), Err(GridError::Empty));
    }

    #[test]
    fn test_non_square_tile_rejected() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 2, 256);
        grid.matrices[1].tile_height = 512;
        assert_eq!(
            grid.validate(),
            Err(GridError::NonSquareTile {
                level: 1,
                width: 256,
                height: 512
            })
        );
    }

    #[test]
    fn test_non_square_matrix_rejected() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 2, 256);
        grid.matrices[2].matrix_height = 3;
        assert!(matches!(
            grid.validate(),
            Err(GridError::NonSquareMatrix { level: 2, .. })
        ));
    }

    #[test]
    fn test_gap_in_levels_rejected() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 3, 256);
        grid.matrices.remove(1);
        assert!(matches!(
            grid.validate(),
            Err(GridError::NonContiguousLevels {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_not_doubling_rejected() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 2, 256);
        grid.matrices[2].matrix_width = 3;
        grid.matrices[2].matrix_height = 3;
        assert_eq!(grid.validate(), Err(GridError::NotDoubling { level: 2 }));
    }

    #[test]
    fn test_inconsistent_origin_rejected() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 2, 256);
        grid.matrices[1].origin = Some((1.0, 0.0));
        assert_eq!(
            grid.validate(),
            Err(GridError::InconsistentOrigin { level: 1 })
        );
    }

    #[test]
    fn test_variable_widths_rejected() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 2, 256);
        grid.matrices[1].row_widths = Some(vec![2, 1]);
        assert_eq!(
            grid.validate(),
            Err(GridError::VariableWidths { level: 1 })
        );
    }

    #[test]
    fn test_uniform_row_widths_accepted() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 2, 256);
        grid.matrices[1].row_widths = Some(vec![2, 2]);
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn test_pixel_resolution() {
        let grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 3, 8);
        // Zoom 3: 8 tiles of 8 pixels -> 64 pixels over 64 units.
        assert_eq!(grid.pixel_resolution(3), Some(1.0));
        assert_eq!(grid.pixel_resolution(0), Some(8.0));
        assert_eq!(grid.pixel_resolution(9), None);
    }

    #[test]
    fn test_quad_level_for_zoom() {
        let grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 3, 8);
        // 2^3 tiles * 8 px = 64 px per axis -> level 6.
        assert_eq!(grid.quad_level_for_zoom(3), Ok(6));
        assert_eq!(grid.quad_level_for_zoom(0), Ok(3));
    }

    #[test]
    fn test_quad_level_rejects_unknown_zoom() {
        let grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 3, 8);
        assert_eq!(
            grid.quad_level_for_zoom(9),
            Err(GridError::UnknownZoom { zoom: 9 })
        );
    }

    #[test]
    fn test_quad_level_rejects_non_power_of_two() {
        let mut grid = GridDescriptor::doubling(0.0, 0.0, 64.0, 64.0, 0, 8);
        grid.matrices[0].tile_width = 10;
        grid.matrices[0].tile_height = 10;
        assert_eq!(
            grid.quad_level_for_zoom(0),
            Err(GridError::NonPowerOfTwoGrid { level: 0 })
        );
    }

    #[test]
    fn test_deviation_zero_for_divisible_span() {
        // 10^10 fixed units split into 8 cells divides exactly.
        let grid = GridDescriptor::doubling(0.0, 0.0, 10.0, 10.0, 3, 256);
        let deviation = grid.resolution_deviation(3);
        assert_eq!(deviation.units, 0.0);
        assert_eq!(deviation.pixels, 0.0);
    }

    #[test]
    fn test_deviation_reported_for_non_round_resolution() {
        // 100 units over 2^30 cells truncates the integer resolution hard.
        let grid = GridDescriptor::doubling(0.0, 0.0, 100.0, 100.0, 3, 256);
        let deviation = grid.resolution_deviation(30);
        assert!(deviation.units > 0.0);
        assert!(deviation.pixels > 1.0, "expected over a cell of drift, got {:?}", deviation);
    }
}
