//! Core library for preparing vector polygon data for tiled map rendering.
//!
//! Polygon datasets drawn at multiple resolutions need per-zoom preparation:
//! shapes smaller than a pixel waste space and rendering time, and vertices
//! finer than a pixel produce slivers and seams between neighbouring shapes.
//! This library provides the two transforms that fix both, plus the pipeline
//! wiring them together:
//!
//! - **sieve** ([`sieve`]): drop polygons (and holes) whose area fits inside
//!   a single pixel of the target zoom level.
//! - **snap** ([`snap`]): move every vertex onto a shared pixel-aligned grid
//!   using a quadtree point index ([`index`]), and repair the degenerate
//!   rings the collapse produces.
//!
//! All geometric work runs on fixed-point integers ([`fixed`]) so that
//! results are exact and reproducible; `geo` types are the interchange format
//! at the boundary.
//!
//! # Examples
//!
//! ```no_run
//! use snapsieve_core::grid::GridDescriptor;
//! use snapsieve_core::pipeline::{prepare_for_zoom, MemorySink, MemorySource};
//!
//! let grid = GridDescriptor::doubling(0.0, 0.0, 4096.0, 4096.0, 4, 256);
//! let mut source = MemorySource::new(my_geometries());
//! let mut sink = MemorySink::default();
//! let stats = prepare_for_zoom(&mut source, &mut sink, &grid, 4).unwrap();
//! println!("{} of {} features kept", stats.written, stats.processed);
//! # fn my_geometries() -> Vec<geo::Geometry<f64>> { vec![] }
//! ```

use thiserror::Error;

pub mod fixed;
pub mod grid;
pub mod index;
pub mod intersect;
pub mod morton;
pub mod pipeline;
pub mod sieve;
pub mod snap;

pub use grid::{GridDescriptor, GridError, TileMatrix};
pub use index::PointIndex;
pub use pipeline::{prepare_for_zoom, Feature, FeatureSink, FeatureSource, TransformStats};

/// Errors that can occur while preparing features.
#[derive(Error, Debug)]
pub enum Error {
    /// The grid configuration does not describe a usable quadtree.
    #[error("invalid grid configuration: {0}")]
    Grid(#[from] GridError),

    /// The feature source failed to produce a feature.
    #[error("failed to read feature source: {0}")]
    SourceRead(String),

    /// The feature sink refused a prepared feature.
    #[error("failed to write feature: {0}")]
    SinkWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
