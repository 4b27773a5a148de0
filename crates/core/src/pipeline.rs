//! End-to-end feature preparation for one zoom level.
//!
//! The pipeline ties the pieces together: pick the quadtree depth matching
//! the zoom's pixel grid, sieve out features below one pixel of area, load
//! every surviving vertex into the point index, then snap each feature and
//! hand the result to the sink.
//!
//! Two passes over the features are inherent to the algorithm: snapping a
//! vertex must see the cells populated by *all* features, or two polygons
//! sharing a boundary could snap it to different cell chains. The pipeline
//! therefore buffers the sieved features between the passes.

use geo::Geometry;
use serde::Serialize;

use crate::fixed;
use crate::grid::GridDescriptor;
use crate::index::PointIndex;
use crate::{sieve, snap, Result};

/// One unit of work flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Caller-assigned identifier, passed through untouched so results can be
    /// matched back to source records.
    pub id: u64,
    pub geometry: Geometry<f64>,
}

/// Streaming producer of input features.
pub trait FeatureSource {
    /// The next feature, or `None` when the source is exhausted.
    fn next_feature(&mut self) -> Result<Option<Feature>>;
}

/// Consumer of prepared features.
pub trait FeatureSink {
    fn write_feature(&mut self, feature: Feature) -> Result<()>;
}

/// In-memory source over a list of geometries, with sequential ids.
#[derive(Debug, Default)]
pub struct MemorySource {
    features: std::vec::IntoIter<Feature>,
}

impl MemorySource {
    pub fn new(geometries: Vec<Geometry<f64>>) -> Self {
        let features: Vec<Feature> = geometries
            .into_iter()
            .enumerate()
            .map(|(i, geometry)| Feature {
                id: i as u64,
                geometry,
            })
            .collect();
        Self {
            features: features.into_iter(),
        }
    }
}

impl FeatureSource for MemorySource {
    fn next_feature(&mut self) -> Result<Option<Feature>> {
        Ok(self.features.next())
    }
}

/// In-memory sink collecting prepared features.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub features: Vec<Feature>,
}

impl FeatureSink for MemorySink {
    fn write_feature(&mut self, feature: Feature) -> Result<()> {
        self.features.push(feature);
        Ok(())
    }
}

/// Counters reported by one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    /// Features read from the source.
    pub processed: u64,
    /// Features dropped by the area sieve (including non-areal geometries).
    pub sieved: u64,
    /// Features whose geometry collapsed entirely during snapping.
    pub collapsed: u64,
    /// Features that came out of snapping with more rings than they went in,
    /// i.e. at least one exterior was pinched apart.
    pub split: u64,
    /// Features delivered to the sink.
    pub written: u64,
}

/// Prepare every feature of `source` for rendering at `zoom` and write the
/// survivors to `sink`.
///
/// The quadtree is subdivided until one cell is one pixel of the zoom's tile
/// matrix, and the sieve threshold is the area of that cell.
pub fn prepare_for_zoom<S, K>(
    source: &mut S,
    sink: &mut K,
    grid: &GridDescriptor,
    zoom: u8,
) -> Result<TransformStats>
where
    S: FeatureSource,
    K: FeatureSink,
{
    let level = grid.quad_level_for_zoom(zoom)?;
    let mut index = PointIndex::new(grid, level)?;
    let resolution = fixed::to_float(index.deepest_resolution().0);

    let deviation = grid.resolution_deviation(level);
    if deviation.pixels >= 1.0 {
        log::warn!(
            "fixed-point resolution deviates by {:.2} cells across the grid at level {}; \
             snapped coordinates near the far edge will be off by more than a pixel",
            deviation.pixels,
            level
        );
    }
    log::info!(
        "preparing features for zoom {} (quadtree level {}, resolution {} units/pixel)",
        zoom,
        level,
        resolution
    );

    let mut stats = TransformStats::default();
    let mut pending: Vec<Feature> = Vec::new();
    while let Some(feature) = source.next_feature()? {
        stats.processed += 1;
        match sieve::sieve_geometry(&feature.geometry, resolution) {
            Some(geometry) => {
                index.insert_geometry(&geometry);
                pending.push(Feature {
                    id: feature.id,
                    geometry,
                });
            }
            None => stats.sieved += 1,
        }
    }
    log::debug!(
        "sieve kept {} of {} features; index holds {} quadrants",
        pending.len(),
        stats.processed,
        index.quadrant_count()
    );

    for feature in pending {
        match snap::snap_geometry(&mut index, &feature.geometry, level) {
            Some(geometry) => {
                if polygon_count(&geometry) > polygon_count(&feature.geometry) {
                    stats.split += 1;
                }
                sink.write_feature(Feature {
                    id: feature.id,
                    geometry,
                })?;
                stats.written += 1;
            }
            None => stats.collapsed += 1,
        }
    }

    log::info!(
        "zoom {} done: {} processed, {} sieved, {} collapsed, {} split, {} written",
        zoom,
        stats.processed,
        stats.sieved,
        stats.collapsed,
        stats.split,
        stats.written
    );
    Ok(stats)
}

fn polygon_count(geometry: &Geometry<f64>) -> usize {
    match geometry {
        Geometry::Polygon(_) => 1,
        Geometry::MultiPolygon(multi) => multi.0.len(),
        _ => 0,
    }
}
