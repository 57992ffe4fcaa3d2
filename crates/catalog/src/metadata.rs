//! Scene metadata records.
//!
//! A [`Metadata`] is one row of the Landsat catalog plus the values derived
//! from it: UTM zone, day of year, bounds and the local path under which the
//! scene's files appear once mounted.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use geo::{MultiPolygon, Rect};
use landsat_common::{
    utm_epsg_code, BandMap, BandName, BoundingBox, LandsatError, LandsatResult, SpacecraftId,
};
use query_filter::FieldValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::dateline::split_envelope;
use crate::wrs::WrsGeometry;

/// Mount root used when none is configured.
pub const DEFAULT_MOUNT_BASE: &str = "/imagery";

/// Bucket of the alternate provider's Landsat 8 archive.
pub const AWS_BUCKET: &str = "landsat-pds";

/// Catalog columns in positional order.
pub const CATALOG_COLUMNS: [&str; 18] = [
    "scene_id",
    "product_id",
    "spacecraft_id",
    "sensor_id",
    "date_acquired",
    "sensing_time",
    "collection_number",
    "collection_category",
    "data_type",
    "wrs_path",
    "wrs_row",
    "cloud_cover",
    "north_lat",
    "south_lat",
    "west_lon",
    "east_lon",
    "total_size",
    "base_url",
];

/// Object store hosting a scene's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlatformProvider {
    #[default]
    Google,
    Aws,
}

/// One Landsat scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub scene_id: String,
    pub product_id: Option<String>,
    pub spacecraft_id: SpacecraftId,
    pub sensor_id: String,
    pub date_acquired: NaiveDate,
    /// Sensing time in UTC.
    pub sensing_time: NaiveDateTime,
    pub collection_number: String,
    pub collection_category: String,
    pub data_type: String,
    pub wrs_path: u32,
    pub wrs_row: u32,
    pub cloud_cover: f64,
    pub north_lat: f64,
    pub south_lat: f64,
    pub west_lon: f64,
    pub east_lon: f64,
    pub total_size: u64,
    pub base_url: String,
    pub provider: PlatformProvider,
    mount_base: PathBuf,
}

impl Metadata {
    /// Build from one catalog row in [`CATALOG_COLUMNS`] order.
    pub fn from_row(row: &[Value]) -> LandsatResult<Self> {
        let scene_id = row
            .first()
            .and_then(text)
            .ok_or_else(|| LandsatError::SceneNotFound("row without scene_id".to_string()))?;
        let bad = |column: &str| {
            LandsatError::SceneNotFound(format!("{}: invalid or missing {}", scene_id, column))
        };
        if row.len() < CATALOG_COLUMNS.len() {
            return Err(LandsatError::SceneNotFound(format!(
                "{}: row has {} columns, expected {}",
                scene_id,
                row.len(),
                CATALOG_COLUMNS.len()
            )));
        }

        let spacecraft = text(&row[2]).ok_or_else(|| bad("spacecraft_id"))?;
        let sensor_id = text(&row[3]).unwrap_or_default();
        let date_acquired = text(&row[4])
            .and_then(|s| parse_date(&s))
            .ok_or_else(|| bad("date_acquired"))?;
        let sensing_time = parse_timestamp(&row[5]).ok_or_else(|| bad("sensing_time"))?;

        let metadata = Self {
            product_id: text(&row[1]).filter(|s| !s.is_empty()),
            spacecraft_id: SpacecraftId::from_catalog(&spacecraft, &sensor_id),
            sensor_id,
            date_acquired,
            sensing_time,
            collection_number: text(&row[6]).unwrap_or_default(),
            collection_category: text(&row[7]).unwrap_or_default(),
            data_type: text(&row[8]).unwrap_or_default(),
            wrs_path: number(&row[9]).ok_or_else(|| bad("wrs_path"))? as u32,
            wrs_row: number(&row[10]).ok_or_else(|| bad("wrs_row"))? as u32,
            cloud_cover: number(&row[11]).unwrap_or(-1.0),
            north_lat: number(&row[12]).ok_or_else(|| bad("north_lat"))?,
            south_lat: number(&row[13]).ok_or_else(|| bad("south_lat"))?,
            west_lon: number(&row[14]).ok_or_else(|| bad("west_lon"))?,
            east_lon: number(&row[15]).ok_or_else(|| bad("east_lon"))?,
            total_size: number(&row[16]).unwrap_or(0.0) as u64,
            base_url: text(&row[17]).ok_or_else(|| bad("base_url"))?,
            provider: PlatformProvider::Google,
            mount_base: PathBuf::from(DEFAULT_MOUNT_BASE),
            scene_id,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Build from a named-column JSON object (a catalog row keyed by column).
    pub fn from_record(record: &Value) -> LandsatResult<Self> {
        let row: Vec<Value> = CATALOG_COLUMNS
            .iter()
            .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        Self::from_row(&row)
    }

    pub fn from_message(message: &MetadataMessage) -> LandsatResult<Self> {
        let metadata = Self {
            scene_id: message.scene_id.clone(),
            product_id: message.product_id.clone().filter(|s| !s.is_empty()),
            spacecraft_id: message.spacecraft_id,
            sensor_id: message.sensor_id.clone(),
            date_acquired: message.date_acquired,
            sensing_time: message.sensing_time,
            collection_number: message.collection_number.clone(),
            collection_category: message.collection_category.clone(),
            data_type: message.data_type.clone(),
            wrs_path: message.wrs_path,
            wrs_row: message.wrs_row,
            cloud_cover: message.cloud_cover,
            north_lat: message.north_lat,
            south_lat: message.south_lat,
            west_lon: message.west_lon,
            east_lon: message.east_lon,
            total_size: message.total_size,
            base_url: message.base_url.clone(),
            provider: message.platform_provider,
            mount_base: PathBuf::from(DEFAULT_MOUNT_BASE),
        };
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn to_message(&self) -> MetadataMessage {
        MetadataMessage {
            scene_id: self.scene_id.clone(),
            product_id: self.product_id.clone(),
            spacecraft_id: self.spacecraft_id,
            sensor_id: self.sensor_id.clone(),
            date_acquired: self.date_acquired,
            sensing_time: self.sensing_time,
            collection_number: self.collection_number.clone(),
            collection_category: self.collection_category.clone(),
            data_type: self.data_type.clone(),
            wrs_path: self.wrs_path,
            wrs_row: self.wrs_row,
            cloud_cover: self.cloud_cover,
            north_lat: self.north_lat,
            south_lat: self.south_lat,
            west_lon: self.west_lon,
            east_lon: self.east_lon,
            total_size: self.total_size,
            base_url: self.base_url.clone(),
            platform_provider: self.provider,
        }
    }

    /// Build from an object-store URL such as
    /// `gs://gcp-public-data-landsat/LC08/01/044/034/LC08_L1TP_044034_20170310_20170325_01_T1/`.
    ///
    /// Both collection product ids and pre-collection scene ids are accepted.
    /// Bounds come from the WRS cell of the parsed path/row.
    pub fn from_storage_path(url: &str, wrs: &WrsGeometry) -> LandsatResult<Self> {
        let trimmed = url.trim_end_matches('/');
        let name = trimmed.rsplit('/').next().unwrap_or_default();
        let parsed = ParsedId::parse(name)
            .ok_or_else(|| LandsatError::SceneNotFound(format!("unrecognised scene path {}", url)))?;

        let cell = wrs.polygon(parsed.path, parsed.row).ok_or_else(|| {
            LandsatError::SceneNotFound(format!(
                "{}: WRS cell {}/{} unknown",
                name, parsed.path, parsed.row
            ))
        })?;
        let rect = geo::BoundingRect::bounding_rect(cell)
            .ok_or_else(|| LandsatError::SceneNotFound(format!("{}: empty WRS cell", name)))?;

        let metadata = Self {
            scene_id: parsed.scene_id.unwrap_or_else(|| name.to_string()),
            product_id: parsed.product_id,
            spacecraft_id: parsed.spacecraft,
            sensor_id: parsed.sensor_id.to_string(),
            date_acquired: parsed.date,
            sensing_time: parsed.date.and_time(chrono::NaiveTime::default()),
            collection_number: parsed.collection_number,
            collection_category: parsed.collection_category,
            data_type: parsed.data_type,
            wrs_path: parsed.path,
            wrs_row: parsed.row,
            cloud_cover: -1.0,
            north_lat: rect.max().y,
            south_lat: rect.min().y,
            west_lon: rect.min().x,
            east_lon: rect.max().x,
            total_size: 0,
            base_url: trimmed.to_string(),
            provider: PlatformProvider::Google,
            mount_base: PathBuf::from(DEFAULT_MOUNT_BASE),
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Same scene with its files mounted under another root.
    pub fn with_mount_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.mount_base = base.into();
        self
    }

    pub fn with_provider(mut self, provider: PlatformProvider) -> Self {
        self.provider = provider;
        self
    }

    fn validate(&self) -> LandsatResult<()> {
        if self.south_lat > self.north_lat {
            return Err(LandsatError::SceneNotFound(format!(
                "{}: south_lat {} is north of north_lat {}",
                self.scene_id, self.south_lat, self.north_lat
            )));
        }
        Ok(())
    }

    // === Derived values ===

    /// `(west_lon, south_lat, east_lon, north_lat)`.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.west_lon, self.south_lat, self.east_lon, self.north_lat)
    }

    pub fn center(&self) -> (f64, f64) {
        self.bounds().center()
    }

    pub fn utm_epsg_code(&self) -> u32 {
        let (lon, lat) = self.center();
        utm_epsg_code(lon, lat)
    }

    /// Day of year of the acquisition date.
    pub fn doy(&self) -> u32 {
        self.date_acquired.ordinal()
    }

    pub fn band_map(&self) -> LandsatResult<BandMap> {
        BandMap::new(self.spacecraft_id)
    }

    /// File name prefix: the product id when known, else the scene id.
    pub fn name_prefix(&self) -> &str {
        self.product_id.as_deref().unwrap_or(&self.scene_id)
    }

    /// Object-store bucket holding the scene.
    pub fn bucket(&self) -> String {
        match self.provider {
            PlatformProvider::Google => split_url(&self.base_url).0,
            PlatformProvider::Aws => AWS_BUCKET.to_string(),
        }
    }

    /// Prefix of the scene directory inside the bucket.
    pub fn remote_prefix(&self) -> String {
        match self.provider {
            PlatformProvider::Google => split_url(&self.base_url).1,
            PlatformProvider::Aws => format!(
                "c1/L8/{:03}/{:03}/{}",
                self.wrs_path,
                self.wrs_row,
                self.name_prefix()
            ),
        }
    }

    pub fn mount_base(&self) -> &Path {
        &self.mount_base
    }

    /// Local directory holding the scene's files once mounted.
    pub fn full_mount_path(&self) -> PathBuf {
        match self.provider {
            PlatformProvider::Google => self
                .mount_base
                .join(self.bucket())
                .join(self.remote_prefix()),
            PlatformProvider::Aws => self
                .mount_base
                .join("L8")
                .join(format!("{:03}", self.wrs_path))
                .join(format!("{:03}", self.wrs_row))
                .join(self.name_prefix()),
        }
    }

    /// `<full_mount_path>/<prefix>_B<n>.TIF`.
    pub fn band_path(&self, band_number: u32) -> PathBuf {
        self.full_mount_path()
            .join(format!("{}_B{}.TIF", self.name_prefix(), band_number))
    }

    pub fn band_path_for(&self, band: BandName) -> LandsatResult<PathBuf> {
        let number = self.band_map()?.number(band)?;
        Ok(self.band_path(number))
    }

    /// WRS cell polygon when known, otherwise the bounds rectangle, split at
    /// the antimeridian when the west edge lies east of the east edge.
    pub fn footprint(&self, wrs: Option<&WrsGeometry>) -> MultiPolygon<f64> {
        if let Some(polygon) = wrs.and_then(|w| w.polygon(self.wrs_path, self.wrs_row)) {
            return polygon.clone();
        }
        split_envelope(&self.bounds())
            .iter()
            .map(|part| {
                Rect::new(
                    geo::Coord {
                        x: part.min_x,
                        y: part.min_y,
                    },
                    geo::Coord {
                        x: part.max_x,
                        y: part.max_y,
                    },
                )
                .to_polygon()
            })
            .collect()
    }

    /// Value of a catalog column, for sort-boundary refinement.
    pub fn field_value(&self, field: &str) -> Option<FieldValue> {
        let value = match field {
            "scene_id" => FieldValue::Text(self.scene_id.clone()),
            "product_id" => FieldValue::Text(self.product_id.clone()?),
            "sensor_id" => FieldValue::Text(self.sensor_id.clone()),
            "date_acquired" => FieldValue::start_of_day(self.date_acquired),
            "sensing_time" => FieldValue::Timestamp(self.sensing_time),
            "collection_number" => FieldValue::Text(self.collection_number.clone()),
            "collection_category" => FieldValue::Text(self.collection_category.clone()),
            "data_type" => FieldValue::Text(self.data_type.clone()),
            "wrs_path" => FieldValue::Integer(self.wrs_path as i64),
            "wrs_row" => FieldValue::Integer(self.wrs_row as i64),
            "cloud_cover" => FieldValue::Number(self.cloud_cover),
            "north_lat" => FieldValue::Number(self.north_lat),
            "south_lat" => FieldValue::Number(self.south_lat),
            "west_lon" => FieldValue::Number(self.west_lon),
            "east_lon" => FieldValue::Number(self.east_lon),
            "total_size" => FieldValue::Integer(self.total_size as i64),
            _ => return None,
        };
        Some(value)
    }
}

/// Wire form of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataMessage {
    pub scene_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub spacecraft_id: SpacecraftId,
    #[serde(default)]
    pub sensor_id: String,
    pub date_acquired: NaiveDate,
    pub sensing_time: NaiveDateTime,
    #[serde(default)]
    pub collection_number: String,
    #[serde(default)]
    pub collection_category: String,
    #[serde(default)]
    pub data_type: String,
    pub wrs_path: u32,
    pub wrs_row: u32,
    #[serde(default)]
    pub cloud_cover: f64,
    pub north_lat: f64,
    pub south_lat: f64,
    pub west_lon: f64,
    pub east_lon: f64,
    #[serde(default)]
    pub total_size: u64,
    pub base_url: String,
    #[serde(default)]
    pub platform_provider: PlatformProvider,
}

/// `gs://bucket/some/prefix` -> (`bucket`, `some/prefix`).
fn split_url(url: &str) -> (String, String) {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let trimmed = without_scheme.trim_matches('/');
    match trimmed.split_once('/') {
        Some((bucket, prefix)) => (bucket.to_string(), prefix.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

/// ISO-8601 (with optional `Z` and up to nanosecond fraction) or epoch seconds.
fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    if let Some(raw) = value.as_str() {
        let s = raw.trim().trim_end_matches('Z').trim_end_matches("+00:00");
        let s = s.replacen(' ', "T", 1);
        if let Ok(ts) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(ts);
        }
        if let Some(date) = parse_date(&s) {
            if s.len() == 10 {
                return Some(date.and_time(chrono::NaiveTime::default()));
            }
        }
    }

    let seconds = number(value)?;
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).map(|dt| dt.naive_utc())
}

/// Fields recoverable from a scene or product identifier.
struct ParsedId {
    scene_id: Option<String>,
    product_id: Option<String>,
    spacecraft: SpacecraftId,
    sensor_id: &'static str,
    path: u32,
    row: u32,
    date: NaiveDate,
    collection_number: String,
    collection_category: String,
    data_type: String,
}

impl ParsedId {
    fn parse(name: &str) -> Option<Self> {
        if name.contains('_') {
            Self::parse_product_id(name)
        } else {
            Self::parse_scene_id(name)
        }
    }

    /// `LC08_L1TP_044034_20170310_20170325_01_T1`
    fn parse_product_id(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() != 7 || parts[0].len() != 4 || parts[2].len() != 6 {
            return None;
        }
        let (spacecraft, sensor_id) = platform(parts[0].chars().nth(1)?, parts[0].get(2..4)?)?;

        Some(Self {
            scene_id: None,
            product_id: Some(name.to_string()),
            spacecraft,
            sensor_id,
            path: parts[2].get(0..3)?.parse().ok()?,
            row: parts[2].get(3..6)?.parse().ok()?,
            date: NaiveDate::parse_from_str(parts[3], "%Y%m%d").ok()?,
            collection_number: parts[5].to_string(),
            collection_category: parts[6].to_string(),
            data_type: parts[1].to_string(),
        })
    }

    /// `LC80440342017069LGN00`
    fn parse_scene_id(name: &str) -> Option<Self> {
        if name.len() != 21 || !name.is_ascii() {
            return None;
        }
        let (spacecraft, sensor_id) = platform(name.chars().nth(1)?, name.get(2..3)?)?;
        let year: i32 = name.get(9..13)?.parse().ok()?;
        let doy: u32 = name.get(13..16)?.parse().ok()?;

        Some(Self {
            scene_id: Some(name.to_string()),
            product_id: None,
            spacecraft,
            sensor_id,
            path: name.get(3..6)?.parse().ok()?,
            row: name.get(6..9)?.parse().ok()?,
            date: NaiveDate::from_yo_opt(year, doy)?,
            collection_number: "PRE".to_string(),
            collection_category: "N/A".to_string(),
            data_type: String::new(),
        })
    }
}

/// Sensor letter and satellite number to platform id and catalog sensor name.
fn platform(sensor: char, satellite: &str) -> Option<(SpacecraftId, &'static str)> {
    let number: u32 = satellite.parse().ok()?;
    let sensor_id = match sensor {
        'C' => "OLI_TIRS",
        'O' => "OLI",
        'T' if number == 8 => "TIRS",
        'T' => "TM",
        'E' => "ETM",
        'M' => "MSS",
        _ => return None,
    };
    let spacecraft = SpacecraftId::from_catalog(&format!("LANDSAT_{}", number), sensor_id);
    (spacecraft != SpacecraftId::Unknown).then_some((spacecraft, sensor_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_url() {
        assert_eq!(
            split_url("gs://gcp-public-data-landsat/LC08/01/044/034/LC08_X/"),
            (
                "gcp-public-data-landsat".to_string(),
                "LC08/01/044/034/LC08_X".to_string()
            )
        );
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let iso = parse_timestamp(&Value::from("2017-03-12T17:20:05.1234560Z")).unwrap();
        assert_eq!(iso.format("%H:%M:%S").to_string(), "17:20:05");

        let epoch = parse_timestamp(&Value::from(1489339205.0)).unwrap();
        assert_eq!(epoch.date(), NaiveDate::from_ymd_opt(2017, 3, 12).unwrap());
    }

    #[test]
    fn test_parse_scene_id() {
        let parsed = ParsedId::parse("LC80440342017069LGN00").unwrap();
        assert_eq!(parsed.spacecraft, SpacecraftId::Landsat8);
        assert_eq!((parsed.path, parsed.row), (44, 34));
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2017, 3, 10).unwrap());
    }

    #[test]
    fn test_parse_product_id() {
        let parsed = ParsedId::parse("LT05_L1TP_033035_19950620_20160926_01_T1").unwrap();
        assert_eq!(parsed.spacecraft, SpacecraftId::Landsat5);
        assert_eq!(parsed.sensor_id, "TM");
        assert_eq!(parsed.collection_category, "T1");
    }
}
