//! Subcommand implementations. Each returns the text printed on stdout.

use anyhow::{bail, Context, Result};
use catalog::{split_envelope, Metadata, MetadataMessage, PathRow, WrsGeometry};
use geo::{Coord, MultiPolygon, Rect};
use landsat_common::{utm_epsg_code, BoundingBox, Crs, DataType, LandsatConfig};
use query_filter::QueryFilter;
use raster::{BandSelection, LandsatRequest, RasterEngine};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::MountManager;
use tracing::{debug, info};

/// Catalog SQL for a filter message stored in `filter_path`.
pub fn sql(config: &LandsatConfig, filter_path: &Path, limit: Option<usize>) -> Result<String> {
    let json = std::fs::read_to_string(filter_path)
        .with_context(|| format!("reading filter {}", filter_path.display()))?;
    let filter = QueryFilter::from_wire_json(&json)?;
    Ok(filter.to_sql(&config.catalog_table, limit.unwrap_or(config.default_limit)))
}

/// WRS-2 cells whose polygons intersect a geographic box.
///
/// A box whose west edge lies east of its east edge is split at the antimeridian.
pub fn wrs(geometry: &WrsGeometry, bbox: &BoundingBox) -> Result<BTreeSet<PathRow>> {
    if bbox.min_y > bbox.max_y {
        bail!("min_y {} is greater than max_y {}", bbox.min_y, bbox.max_y);
    }

    let parts = split_envelope(bbox);
    debug!(parts = parts.len(), "Looking up WRS cells");
    Ok(parts
        .iter()
        .flat_map(|part| geometry.lookup_by_polygon(&rect_polygon(part)))
        .collect())
}

fn rect_polygon(bbox: &BoundingBox) -> MultiPolygon<f64> {
    let rect = Rect::new(
        Coord { x: bbox.min_x, y: bbox.min_y },
        Coord { x: bbox.max_x, y: bbox.max_y },
    );
    MultiPolygon(vec![rect.to_polygon()])
}

pub fn utm(lon: f64, lat: f64) -> Result<u32> {
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        bail!("({}, {}) is not a geographic coordinate", lon, lat);
    }
    Ok(utm_epsg_code(lon, lat))
}

/// Inputs of the `vrt` subcommand.
#[derive(Debug, Clone, Default)]
pub struct VrtOptions {
    pub scenes: Vec<PathBuf>,
    pub bands: Vec<String>,
    pub bbox: Option<BoundingBox>,
    pub bbox_crs: Option<String>,
    pub output_type: Option<String>,
    pub resolution: Option<f64>,
    pub output: Option<PathBuf>,
}

/// Read a scene message and point it at the configured mount base.
pub fn load_scene(config: &LandsatConfig, path: &Path) -> Result<Metadata> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading scene {}", path.display()))?;
    let message: MetadataMessage = serde_json::from_str(&json)
        .with_context(|| format!("parsing scene {}", path.display()))?;
    Ok(Metadata::from_message(&message)?.with_mount_base(config.mount_base.clone()))
}

/// Mount the scenes and either print the first scene's VRT or compose all
/// of them into `options.output`.
pub fn vrt(
    config: &LandsatConfig,
    manager: Arc<MountManager>,
    engine: Arc<dyn RasterEngine>,
    options: &VrtOptions,
) -> Result<String> {
    if options.scenes.is_empty() {
        bail!("at least one --scene is required");
    }
    let scenes = options
        .scenes
        .iter()
        .map(|path| load_scene(config, path))
        .collect::<Result<Vec<_>>>()?;
    let selections = options
        .bands
        .iter()
        .map(|band| band.parse::<BandSelection>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = LandsatRequest::builder(scenes).bands(selections);
    if let Some(bbox) = options.bbox {
        let crs = options.bbox_crs.as_deref().map(Crs::parse).transpose()?;
        builder = builder.envelope(bbox, crs);
    }
    if let Some(name) = &options.output_type {
        builder = builder.output_type(name.parse::<DataType>()?);
    }
    if let Some(resolution) = options.resolution {
        builder = builder.resolution(resolution);
    }

    let request = builder.build(manager, engine, config)?;
    match &options.output {
        Some(output) => {
            let written = request.compose(output)?;
            info!(output = %written.display(), "Composition written");
            Ok(written.display().to_string())
        }
        None => Ok(request.vrt(0)?),
    }
}
