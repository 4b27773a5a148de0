//! CLI for snapsieve - prepare GeoJSON polygons for tiled rendering
//!
//! This is a thin wrapper around the snapsieve-core library: it reads a
//! GeoJSON FeatureCollection, sieves and snaps every feature for the
//! requested zoom level, and writes the result back out as GeoJSON with the
//! original properties preserved.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use geojson::{FeatureCollection, GeoJson};
use snapsieve_core::pipeline::{prepare_for_zoom, MemorySink, MemorySource};
use snapsieve_core::GridDescriptor;

#[derive(Parser, Debug)]
#[command(
    name = "snapsieve",
    about = "Sieve and snap GeoJSON polygons onto a tile grid",
    version
)]
struct Args {
    /// Input GeoJSON file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output GeoJSON file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Zoom level to prepare for
    #[arg(long)]
    zoom: u8,

    /// Grid descriptor JSON file; overrides --extent/--max-zoom/--tile-size
    #[arg(long)]
    grid: Option<PathBuf>,

    /// Grid extent as min-x min-y max-x max-y
    #[arg(long, num_args = 4, value_names = ["MIN_X", "MIN_Y", "MAX_X", "MAX_Y"])]
    extent: Option<Vec<f64>>,

    /// Deepest zoom level of the synthesized grid
    #[arg(long, default_value = "14")]
    max_zoom: u8,

    /// Tile size in pixels of the synthesized grid
    #[arg(long, default_value = "256")]
    tile_size: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn grid_descriptor(&self) -> Result<GridDescriptor> {
        if let Some(path) = &self.grid {
            let file = File::open(path)
                .with_context(|| format!("Failed to open grid file {}", path.display()))?;
            let grid: GridDescriptor = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse grid file {}", path.display()))?;
            return Ok(grid);
        }
        let Some(extent) = &self.extent else {
            bail!("Either --grid or --extent must be given");
        };
        let [min_x, min_y, max_x, max_y] = extent[..] else {
            bail!("--extent takes exactly four values");
        };
        if min_x >= max_x || min_y >= max_y {
            bail!("--extent minimum must be below its maximum on both axes");
        }
        Ok(GridDescriptor::doubling(
            min_x,
            min_y,
            max_x,
            max_y,
            self.max_zoom,
            self.tile_size,
        ))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let grid = args.grid_descriptor()?;
    if args.zoom > grid.max_zoom() {
        bail!(
            "Zoom {} exceeds the grid's deepest level {}",
            args.zoom,
            grid.max_zoom()
        );
    }

    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let geojson: GeoJson = input
        .parse()
        .with_context(|| format!("Failed to parse {} as GeoJSON", args.input.display()))?;
    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        _ => bail!("Input must be a GeoJSON FeatureCollection"),
    };

    // Convert to geo geometries, remembering the original feature per index
    // so properties survive the round trip.
    let mut originals = Vec::new();
    let mut geometries = Vec::new();
    for (i, feature) in collection.features.into_iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            log::warn!("feature {} has no geometry, skipping", i);
            continue;
        };
        let geometry: geo::Geometry<f64> = geometry
            .value
            .clone()
            .try_into()
            .with_context(|| format!("Feature {} has an unsupported geometry", i))?;
        originals.push(feature);
        geometries.push(geometry);
    }

    let mut source = MemorySource::new(geometries);
    let mut sink = MemorySink::default();
    let stats = prepare_for_zoom(&mut source, &mut sink, &grid, args.zoom)
        .context("Failed to prepare features")?;

    let features = sink
        .features
        .into_iter()
        .map(|feature| {
            let original = &originals[feature.id as usize];
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &feature.geometry,
                ))),
                id: original.id.clone(),
                properties: original.properties.clone(),
                foreign_members: None,
            }
        })
        .collect();
    let out_collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &out_collection)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    writer.flush()?;

    println!(
        "✓ Prepared {} of {} features for zoom {} ({} sieved, {} collapsed, {} split)",
        stats.written, stats.processed, args.zoom, stats.sieved, stats.collapsed, stats.split
    );

    Ok(())
}
