//! Common test fixtures for Landsat tests.
//!
//! Catalog rows are built with [`SceneRow`]; the WRS subset holds the real
//! footprint of path 33 row 35 (New Mexico) plus a strip of synthetic square
//! cells on the equator used by the mosaic tests.

use catalog::{WrsGeometry, CATALOG_COLUMNS};
use geo::{MultiPolygon, Rect};
use serde_json::{json, Map, Value};
use std::path::Path;

/// Catalog table name used in tests.
pub const CATALOG_TABLE: &str = "`bigquery-public-data.cloud_storage_geo_index.landsat_index`";

/// The scene of path 33 row 35 acquired 2017-04-04.
pub mod seed {
    pub const SCENE_ID: &str = "LC80330352017094LGN00";
    pub const PRODUCT_ID: &str = "LC08_L1TP_033035_20170404_20170414_01_T1";
    pub const BASE_URL: &str =
        "gs://gcp-public-data-landsat/LC08/01/033/035/LC08_L1TP_033035_20170404_20170414_01_T1";
    pub const PATH: u32 = 33;
    pub const ROW: u32 = 35;
    pub const NORTH: f64 = 37.10422;
    pub const SOUTH: f64 = 34.96178;
    pub const WEST: f64 = -106.85883;
    pub const EAST: f64 = -104.24596;
}

/// WGS 84 / UTM zone 13N as WKT, the projection of the seed scene's bands.
pub const UTM_13N_WKT: &str = "PROJCS[\"WGS 84 / UTM zone 13N\",GEOGCS[\"WGS 84\",\
DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],\
AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433],\
AUTHORITY[\"EPSG\",\"4326\"]],PROJECTION[\"Transverse_Mercator\"],\
PARAMETER[\"central_meridian\",-105],PARAMETER[\"scale_factor\",0.9996],\
PARAMETER[\"false_easting\",500000],UNIT[\"metre\",1],AUTHORITY[\"EPSG\",\"32613\"]]";

/// One catalog row.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRow {
    pub scene_id: String,
    pub product_id: Option<String>,
    pub spacecraft_id: String,
    pub sensor_id: String,
    pub date_acquired: String,
    pub sensing_time: String,
    pub collection_number: String,
    pub collection_category: String,
    pub data_type: String,
    pub wrs_path: u32,
    pub wrs_row: u32,
    pub cloud_cover: f64,
    /// `(west, south, east, north)`.
    pub bounds: (f64, f64, f64, f64),
    pub total_size: u64,
    pub base_url: String,
}

impl SceneRow {
    /// A Landsat 8 collection 1 row acquired on `date` (`YYYY-MM-DD`).
    pub fn landsat8(
        scene_id: &str,
        path: u32,
        row: u32,
        date: &str,
        bounds: (f64, f64, f64, f64),
    ) -> Self {
        let product_id = format!(
            "LC08_L1TP_{:03}{:03}_{}_{}_01_T1",
            path,
            row,
            date.replace('-', ""),
            date.replace('-', "")
        );
        Self {
            scene_id: scene_id.to_string(),
            base_url: format!(
                "gs://gcp-public-data-landsat/LC08/01/{:03}/{:03}/{}",
                path, row, product_id
            ),
            product_id: Some(product_id),
            spacecraft_id: "LANDSAT_8".to_string(),
            sensor_id: "OLI_TIRS".to_string(),
            date_acquired: date.to_string(),
            sensing_time: format!("{}T17:20:05.1234560Z", date),
            collection_number: "01".to_string(),
            collection_category: "T1".to_string(),
            data_type: "L1TP".to_string(),
            wrs_path: path,
            wrs_row: row,
            cloud_cover: 10.0,
            bounds,
            total_size: 1_000_000,
        }
    }

    pub fn with_cloud_cover(mut self, cloud_cover: f64) -> Self {
        self.cloud_cover = cloud_cover;
        self
    }

    /// Values in catalog column order.
    pub fn to_row(&self) -> Vec<Value> {
        let (west, south, east, north) = self.bounds;
        vec![
            json!(self.scene_id),
            self.product_id.as_ref().map(|p| json!(p)).unwrap_or(Value::Null),
            json!(self.spacecraft_id),
            json!(self.sensor_id),
            json!(self.date_acquired),
            json!(self.sensing_time),
            json!(self.collection_number),
            json!(self.collection_category),
            json!(self.data_type),
            json!(self.wrs_path),
            json!(self.wrs_row),
            json!(self.cloud_cover),
            json!(north),
            json!(south),
            json!(west),
            json!(east),
            json!(self.total_size),
            json!(self.base_url),
        ]
    }

    /// Row keyed by column name.
    pub fn to_record(&self) -> Value {
        let map: Map<String, Value> = CATALOG_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .zip(self.to_row())
            .collect();
        Value::Object(map)
    }
}

/// The seed scene as a catalog row.
pub fn seed_scene_row() -> SceneRow {
    let mut row = SceneRow::landsat8(
        seed::SCENE_ID,
        seed::PATH,
        seed::ROW,
        "2017-04-04",
        (seed::WEST, seed::SOUTH, seed::EAST, seed::NORTH),
    );
    row.product_id = Some(seed::PRODUCT_ID.to_string());
    row.base_url = seed::BASE_URL.to_string();
    row.sensing_time = "2017-04-04T17:33:54.3070280Z".to_string();
    row
}

/// Synthetic square cell on path `path`, row 1: one degree wide, starting at
/// `0.8 * (path - 10)` degrees east.
pub fn strip_cell(path: u32) -> (f64, f64, f64, f64) {
    let west = 0.8 * (path as f64 - 10.0);
    (west, 0.0, west + 1.0, 1.0)
}

/// Landsat 8 row whose bounds are the synthetic strip cell of `path`.
pub fn strip_scene_row(scene_id: &str, path: u32, date: &str) -> SceneRow {
    SceneRow::landsat8(scene_id, path, 1, date, strip_cell(path))
}

/// Axis-aligned rectangle as a multipolygon.
pub fn rect(west: f64, south: f64, east: f64, north: f64) -> MultiPolygon<f64> {
    let rect = Rect::new(
        geo::Coord { x: west, y: south },
        geo::Coord { x: east, y: north },
    );
    MultiPolygon(vec![rect.to_polygon()])
}

fn feature(path: u32, row: u32, ring: Vec<[f64; 2]>) -> Value {
    json!({
        "type": "Feature",
        "properties": {"PATH": path, "ROW": row},
        "geometry": {"type": "Polygon", "coordinates": [ring]},
    })
}

fn square_ring((west, south, east, north): (f64, f64, f64, f64)) -> Vec<[f64; 2]> {
    vec![
        [west, south],
        [east, south],
        [east, north],
        [west, north],
        [west, south],
    ]
}

/// WRS-2 subset as a GeoJSON `FeatureCollection`.
///
/// Holds path 33 row 35 and path 33 row 34, plus strip cells for paths 10,
/// 11 and 12 (row 1).
pub fn wrs_geojson() -> String {
    let mut features = vec![
        feature(
            33,
            35,
            vec![
                [-106.2, 37.1],
                [-104.25, 36.75],
                [-104.7, 34.97],
                [-106.85, 35.3],
                [-106.2, 37.1],
            ],
        ),
        feature(
            33,
            34,
            vec![
                [-105.8, 38.5],
                [-103.8, 38.15],
                [-104.25, 36.4],
                [-106.4, 36.75],
                [-105.8, 38.5],
            ],
        ),
    ];
    features.extend((10..=12).map(|path| feature(path, 1, square_ring(strip_cell(path)))));

    json!({"type": "FeatureCollection", "features": features}).to_string()
}

/// The WRS subset of [`wrs_geojson`], indexed.
pub fn wrs_geometry() -> WrsGeometry {
    match WrsGeometry::from_geojson_str(&wrs_geojson()) {
        Ok(geometry) => geometry,
        Err(e) => panic!("WRS fixture does not parse: {}", e),
    }
}

/// Write the WRS subset to `dir/wrs.geojson`.
pub fn write_wrs_geojson(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("wrs.geojson");
    if let Err(e) = std::fs::write(&path, wrs_geojson()) {
        panic!("cannot write WRS fixture: {}", e);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_have_every_column() {
        assert_eq!(seed_scene_row().to_row().len(), CATALOG_COLUMNS.len());
        assert_eq!(
            seed_scene_row().to_record()["scene_id"],
            json!(seed::SCENE_ID)
        );
    }

    #[test]
    fn test_wrs_fixture_parses() {
        let wrs = wrs_geometry();
        assert_eq!(wrs.len(), 5);
        assert!(wrs.polygon(33, 35).is_some());
        assert!(wrs.polygon(11, 1).is_some());
    }
}
