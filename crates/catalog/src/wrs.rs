//! WRS-2 path/row grid index.
//!
//! Every path/row cell is stored as one merged multipolygon; the R-tree holds
//! one entry per polygon part, keyed by that part's bounding box.

use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, LineString, MultiPolygon, Polygon};
use landsat_common::{BoundingBox, LandsatError, LandsatResult};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::dateline::split_by_dateline;

/// A WRS-2 cell address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathRow {
    pub path: u32,
    pub row: u32,
}

impl PathRow {
    pub fn new(path: u32, row: u32) -> Self {
        Self { path, row }
    }
}

impl fmt::Display for PathRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}/{:03}", self.path, self.row)
    }
}

/// One indexed polygon part.
#[derive(Debug, Clone)]
struct WrsCell {
    path_row: PathRow,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for WrsCell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// In-memory WRS-2 polygon set with a spatial index.
pub struct WrsGeometry {
    polygons: HashMap<PathRow, MultiPolygon<f64>>,
    index: RTree<WrsCell>,
}

impl WrsGeometry {
    /// Build from `(path_row, polygon)` pairs. Repeated cells are merged.
    pub fn from_polygons<I>(polygons: I) -> Self
    where
        I: IntoIterator<Item = (PathRow, MultiPolygon<f64>)>,
    {
        let mut merged: HashMap<PathRow, MultiPolygon<f64>> = HashMap::new();
        for (path_row, multi) in polygons {
            let parts = multi.0.iter().flat_map(|p| split_by_dateline(p).0);
            merged
                .entry(path_row)
                .or_insert_with(|| MultiPolygon(Vec::new()))
                .0
                .extend(parts);
        }

        let cells: Vec<WrsCell> = merged
            .iter()
            .flat_map(|(path_row, multi)| {
                multi.0.iter().filter_map(move |part| {
                    part.bounding_rect().map(|rect| WrsCell {
                        path_row: *path_row,
                        min: [rect.min().x, rect.min().y],
                        max: [rect.max().x, rect.max().y],
                    })
                })
            })
            .collect();

        debug!(cells = merged.len(), parts = cells.len(), "Built WRS index");

        Self {
            polygons: merged,
            index: RTree::bulk_load(cells),
        }
    }

    /// Parse a GeoJSON FeatureCollection whose features carry `PATH` and `ROW`.
    pub fn from_geojson_str(geojson: &str) -> LandsatResult<Self> {
        let collection: WrsCollection = serde_json::from_str(geojson)?;

        let mut polygons = Vec::with_capacity(collection.features.len());
        for (i, feature) in collection.features.into_iter().enumerate() {
            let properties = feature.properties.unwrap_or_default();
            let path = properties
                .path
                .and_then(|n| n.value())
                .ok_or_else(|| feature_error(i, "missing PATH"))?;
            let row = properties
                .row
                .and_then(|n| n.value())
                .ok_or_else(|| feature_error(i, "missing ROW"))?;
            let multi = feature
                .geometry
                .ok_or_else(|| feature_error(i, "missing geometry"))?
                .into_multi_polygon()
                .map_err(|e| feature_error(i, e))?;
            polygons.push((PathRow::new(path, row), multi));
        }

        Ok(Self::from_polygons(polygons))
    }

    pub fn from_geojson_file(path: impl AsRef<Path>) -> LandsatResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let wrs = Self::from_geojson_str(&contents)?;
        info!(path = %path.display(), cells = wrs.len(), "Loaded WRS-2 grid");
        Ok(wrs)
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Merged polygon of a cell.
    pub fn polygon(&self, path: u32, row: u32) -> Option<&MultiPolygon<f64>> {
        self.polygons.get(&PathRow::new(path, row))
    }

    /// Cells whose part bounds intersect the envelope.
    pub fn lookup_by_envelope(&self, bbox: &BoundingBox) -> BTreeSet<PathRow> {
        let envelope = AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]);
        self.index
            .locate_in_envelope_intersecting(&envelope)
            .map(|cell| cell.path_row)
            .collect()
    }

    /// Cells whose polygon intersects the area of interest.
    pub fn lookup_by_polygon(&self, aoi: &MultiPolygon<f64>) -> BTreeSet<PathRow> {
        let Some(rect) = aoi.bounding_rect() else {
            return BTreeSet::new();
        };
        let bbox = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);

        self.lookup_by_envelope(&bbox)
            .into_iter()
            .filter(|path_row| {
                self.polygons
                    .get(path_row)
                    .map(|polygon| polygon.intersects(aoi))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// `(cell, overlap area)` for every cell with positive overlap, ascending by area.
    pub fn intersection_areas(&self, aoi: &MultiPolygon<f64>) -> Vec<(PathRow, f64)> {
        let mut areas: Vec<(PathRow, f64)> = self
            .lookup_by_polygon(aoi)
            .into_iter()
            .filter_map(|path_row| {
                let polygon = self.polygons.get(&path_row)?;
                let area = polygon.intersection(aoi).unsigned_area();
                (area > 0.0).then_some((path_row, area))
            })
            .collect();

        areas.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        areas
    }
}

impl fmt::Debug for WrsGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrsGeometry")
            .field("cells", &self.polygons.len())
            .field("parts", &self.index.size())
            .finish()
    }
}

fn feature_error(index: usize, message: &str) -> LandsatError {
    LandsatError::Serialization(format!("WRS feature {}: {}", index, message))
}

/// GeoJSON FeatureCollection of WRS-2 cells.
#[derive(Debug, Deserialize)]
struct WrsCollection {
    features: Vec<WrsFeature>,
}

#[derive(Debug, Deserialize)]
struct WrsFeature {
    #[serde(default)]
    properties: Option<WrsProperties>,
    #[serde(default)]
    geometry: Option<WrsGeometryJson>,
}

#[derive(Debug, Default, Deserialize)]
struct WrsProperties {
    #[serde(rename = "PATH", alias = "path", default)]
    path: Option<CellNumber>,
    #[serde(rename = "ROW", alias = "row", default)]
    row: Option<CellNumber>,
}

/// Path or row number; shapefile conversions often write them as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellNumber {
    Number(u32),
    Text(String),
}

impl CellNumber {
    fn value(&self) -> Option<u32> {
        match self {
            CellNumber::Number(n) => Some(*n),
            CellNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Polygonal GeoJSON geometries; positions are `[longitude, latitude]`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WrsGeometryJson {
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl WrsGeometryJson {
    fn into_multi_polygon(self) -> Result<MultiPolygon<f64>, &'static str> {
        match self {
            WrsGeometryJson::Polygon { coordinates } => {
                Ok(MultiPolygon(vec![polygon_from_rings(coordinates)?]))
            }
            WrsGeometryJson::MultiPolygon { coordinates } => coordinates
                .into_iter()
                .map(polygon_from_rings)
                .collect::<Result<Vec<_>, _>>()
                .map(MultiPolygon),
        }
    }
}

fn polygon_from_rings(rings: Vec<Vec<[f64; 2]>>) -> Result<Polygon<f64>, &'static str> {
    let mut rings = rings.into_iter().map(|ring| {
        LineString(ring.into_iter().map(|[x, y]| Coord { x, y }).collect())
    });
    let exterior = rings.next().ok_or("polygon without exterior ring")?;
    Ok(Polygon::new(exterior, rings.collect()))
}

static GLOBAL_WRS: OnceLock<Arc<WrsGeometry>> = OnceLock::new();

/// Install the process-wide WRS index. A second call keeps the first index.
pub fn init(geometry: WrsGeometry) -> Arc<WrsGeometry> {
    GLOBAL_WRS.get_or_init(|| Arc::new(geometry)).clone()
}

/// Load the process-wide WRS index from a GeoJSON file on first use.
pub fn init_from_file(path: impl AsRef<Path>) -> LandsatResult<Arc<WrsGeometry>> {
    if let Some(existing) = GLOBAL_WRS.get() {
        return Ok(existing.clone());
    }
    let geometry = WrsGeometry::from_geojson_file(path)?;
    Ok(init(geometry))
}

/// The process-wide WRS index, if initialized.
pub fn global() -> Option<Arc<WrsGeometry>> {
    GLOBAL_WRS.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use test_utils::assert_approx_eq;

    fn square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ]])
    }

    #[test]
    fn test_lookup_by_envelope() {
        let wrs = WrsGeometry::from_polygons(vec![
            (PathRow::new(1, 1), square(0.0, 0.0)),
            (PathRow::new(2, 1), square(5.0, 0.0)),
        ]);
        let hits = wrs.lookup_by_envelope(&BoundingBox::new(0.5, 0.5, 0.6, 0.6));
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![PathRow::new(1, 1)]);
    }

    #[test]
    fn test_repeated_cells_merge() {
        let wrs = WrsGeometry::from_polygons(vec![
            (PathRow::new(1, 1), square(0.0, 0.0)),
            (PathRow::new(1, 1), square(3.0, 0.0)),
        ]);
        assert_eq!(wrs.len(), 1);
        assert_eq!(wrs.polygon(1, 1).unwrap().0.len(), 2);
        assert!(wrs
            .lookup_by_envelope(&BoundingBox::new(3.2, 0.2, 3.4, 0.4))
            .contains(&PathRow::new(1, 1)));
    }

    #[test]
    fn test_geojson_accepts_text_numbers_and_multipolygons() {
        let doc = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"path":"12","row":" 7"},
             "geometry":{"type":"MultiPolygon","coordinates":[
                [[[0,0],[1,0],[1,1],[0,1],[0,0]]],
                [[[3,0],[4,0],[4,1],[3,1],[3,0]]]]}}]}"#;
        let wrs = WrsGeometry::from_geojson_str(doc).unwrap();

        let cell = wrs.polygon(12, 7).unwrap();
        assert_eq!(cell.0.len(), 2);
        assert_approx_eq!(cell.unsigned_area(), 2.0, 1e-12);
    }

    #[test]
    fn test_geojson_rejects_non_polygon_geometry() {
        let doc = r#"{"type":"FeatureCollection","features":[{"type":"Feature",
            "properties":{"PATH":1,"ROW":1},"geometry":{"type":"Point","coordinates":[0,0]}}]}"#;
        assert!(WrsGeometry::from_geojson_str(doc).is_err());

        let empty = r#"{"type":"FeatureCollection","features":[{"type":"Feature",
            "properties":{"PATH":1,"ROW":1},"geometry":{"type":"Polygon","coordinates":[]}}]}"#;
        let err = WrsGeometry::from_geojson_str(empty).unwrap_err();
        assert!(err.to_string().contains("exterior ring"));
    }

    #[test]
    fn test_geojson_parse_errors_name_the_feature() {
        let doc = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"ROW":1},"geometry":null}]}"#;
        let err = WrsGeometry::from_geojson_str(doc).unwrap_err();
        assert!(err.to_string().contains("feature 0"));
    }
}
