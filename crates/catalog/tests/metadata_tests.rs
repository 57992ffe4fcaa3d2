//! Scene metadata records and the WRS-2 grid index.

use catalog::{
    split_multi_by_dateline, Metadata, MetadataMessage, PathRow, PlatformProvider, WrsGeometry,
};
use chrono::NaiveDate;
use geo::{polygon, Area, BoundingRect, MultiPolygon};
use landsat_common::{BandName, BoundingBox, LandsatError, SpacecraftId};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;
use test_utils::{
    assert_approx_eq, rect, seed, seed_scene_row, write_wrs_geojson, wrs_geometry, SceneRow,
};

fn seed_scene() -> Metadata {
    Metadata::from_row(&seed_scene_row().to_row()).unwrap()
}

// =============================================================================
// Catalog rows
// =============================================================================

#[test]
fn test_seed_row_parses() {
    let scene = seed_scene();

    assert_eq!(scene.scene_id, seed::SCENE_ID);
    assert_eq!(scene.product_id.as_deref(), Some(seed::PRODUCT_ID));
    assert_eq!(scene.spacecraft_id, SpacecraftId::Landsat8);
    assert_eq!((scene.wrs_path, scene.wrs_row), (seed::PATH, seed::ROW));
    assert_eq!(scene.date_acquired, NaiveDate::from_ymd_opt(2017, 4, 4).unwrap());
    assert_eq!(scene.sensing_time.format("%H:%M:%S").to_string(), "17:33:54");
    assert_eq!(scene.provider, PlatformProvider::Google);
}

#[test]
fn test_record_and_row_agree() {
    let from_record = Metadata::from_record(&seed_scene_row().to_record()).unwrap();
    assert_eq!(from_record, seed_scene());
}

#[test]
fn test_derived_values() {
    let scene = seed_scene();

    assert_eq!(scene.doy(), 94);
    assert_eq!(scene.utm_epsg_code(), 32613);
    assert_eq!(
        scene.bounds(),
        BoundingBox::new(seed::WEST, seed::SOUTH, seed::EAST, seed::NORTH)
    );
    assert_eq!(scene.band_map().unwrap().number(BandName::Red).unwrap(), 4);
}

#[test]
fn test_band_path_layout() {
    let scene = seed_scene();
    let expected = PathBuf::from("/imagery/gcp-public-data-landsat/LC08/01/033/035")
        .join(seed::PRODUCT_ID)
        .join(format!("{}_B4.TIF", seed::PRODUCT_ID));

    assert_eq!(scene.band_path(4), expected);
    assert_eq!(scene.band_path_for(BandName::Red).unwrap(), expected);
}

#[test]
fn test_mount_base_is_configurable() {
    let scene = seed_scene().with_mount_base("/mnt/landsat");
    assert!(scene
        .full_mount_path()
        .starts_with("/mnt/landsat/gcp-public-data-landsat"));
}

#[test]
fn test_aws_provider_layout() {
    let scene = seed_scene().with_provider(PlatformProvider::Aws);

    assert_eq!(scene.bucket(), "landsat-pds");
    assert_eq!(
        scene.remote_prefix(),
        format!("c1/L8/033/035/{}", seed::PRODUCT_ID)
    );
    assert_eq!(
        scene.full_mount_path(),
        PathBuf::from("/imagery/L8/033/035").join(seed::PRODUCT_ID)
    );
}

#[test]
fn test_row_without_base_url_is_rejected() {
    let mut row = seed_scene_row().to_row();
    row[17] = Value::Null;

    let err = Metadata::from_row(&row).unwrap_err();
    assert!(err.is_skippable());
    assert!(err.to_string().contains("base_url"));
}

#[test]
fn test_inverted_latitudes_are_rejected() {
    let mut row = seed_scene_row();
    row.bounds = (seed::WEST, seed::NORTH, seed::EAST, seed::SOUTH);
    assert!(matches!(
        Metadata::from_row(&row.to_row()),
        Err(LandsatError::SceneNotFound(_))
    ));
}

#[test]
fn test_message_round_trip() {
    let scene = seed_scene();
    let json = serde_json::to_string(&scene.to_message()).unwrap();
    let message: MetadataMessage = serde_json::from_str(&json).unwrap();

    assert_eq!(Metadata::from_message(&message).unwrap(), scene);
    assert!(json.contains("\"spacecraft_id\":\"LANDSAT_8\""));
}

// =============================================================================
// Storage paths
// =============================================================================

#[test]
fn test_from_storage_path_with_product_id() {
    let wrs = wrs_geometry();
    let url = format!("{}/", seed::BASE_URL);
    let scene = Metadata::from_storage_path(&url, &wrs).unwrap();

    assert_eq!(scene.product_id.as_deref(), Some(seed::PRODUCT_ID));
    assert_eq!((scene.wrs_path, scene.wrs_row), (33, 35));
    assert_eq!(scene.collection_category, "T1");
    assert_eq!(scene.sensor_id, "OLI_TIRS");
    assert_eq!(scene.base_url, seed::BASE_URL);
    assert_eq!(scene.west_lon, -106.85);
    assert_eq!(scene.north_lat, 37.1);
}

#[test]
fn test_from_storage_path_with_scene_id() {
    let wrs = wrs_geometry();
    let url = format!("gs://gcp-public-data-landsat/L8/033/035/{}/", seed::SCENE_ID);
    let scene = Metadata::from_storage_path(&url, &wrs).unwrap();

    assert_eq!(scene.scene_id, seed::SCENE_ID);
    assert_eq!(scene.product_id, None);
    assert_eq!(scene.date_acquired, NaiveDate::from_ymd_opt(2017, 4, 4).unwrap());
    assert_eq!(scene.collection_number, "PRE");
}

#[test]
fn test_from_storage_path_rejects_unknown_names() {
    let wrs = wrs_geometry();
    assert!(Metadata::from_storage_path("gs://bucket/not-a-scene", &wrs).is_err());
    // Valid id, but the cell is not in the index.
    assert!(Metadata::from_storage_path(
        "gs://bucket/LC08_L1TP_044034_20170310_20170325_01_T1",
        &wrs
    )
    .is_err());
}

// =============================================================================
// WRS index
// =============================================================================

#[test]
fn test_seed_bounds_contain_wrs_cell() {
    let scene = seed_scene();
    let cell = wrs_geometry()
        .polygon(seed::PATH, seed::ROW)
        .cloned()
        .unwrap();
    let cell_rect = cell.bounding_rect().unwrap();

    let cell_bounds = BoundingBox::new(
        cell_rect.min().x,
        cell_rect.min().y,
        cell_rect.max().x,
        cell_rect.max().y,
    );
    assert!(scene.bounds().contains(&cell_bounds));
}

#[test]
fn test_footprint_prefers_wrs_cell() {
    let scene = seed_scene();
    let wrs = wrs_geometry();

    assert_eq!(
        &scene.footprint(Some(&wrs)),
        wrs.polygon(seed::PATH, seed::ROW).unwrap()
    );
    assert_eq!(
        scene.footprint(None),
        rect(seed::WEST, seed::SOUTH, seed::EAST, seed::NORTH)
    );
}

#[test]
fn test_footprint_splits_antimeridian_bounds() {
    let row = SceneRow::landsat8("X1", 70, 60, "2017-05-01", (179.5, 0.0, -179.5, 1.0));
    let scene = Metadata::from_row(&row.to_row()).unwrap();

    let footprint = scene.footprint(None);
    assert_eq!(footprint.0.len(), 2);
    assert_approx_eq!(footprint.unsigned_area(), 1.0, 1e-9);
}

#[test]
fn test_wide_counter_clockwise_aoi_is_not_split() {
    let aoi = rect(-100.0, 0.2, 100.0, 0.8);
    let parts = split_multi_by_dateline(&aoi);
    assert_eq!(parts, aoi);
    assert_approx_eq!(parts.unsigned_area(), 120.0, 1e-9);

    let cells = wrs_geometry().lookup_by_polygon(&parts);
    assert!(cells.contains(&PathRow::new(10, 1)));
    assert!(cells.contains(&PathRow::new(12, 1)));
}

#[test]
fn test_clockwise_aoi_crosses_antimeridian() {
    let aoi = MultiPolygon(vec![polygon![
        (x: -100.0, y: 0.0),
        (x: -100.0, y: 10.0),
        (x: 100.0, y: 10.0),
        (x: 100.0, y: 0.0),
        (x: -100.0, y: 0.0),
    ]]);
    let parts = split_multi_by_dateline(&aoi);
    assert_eq!(parts.0.len(), 2);
    assert_approx_eq!(parts.unsigned_area(), 1600.0, 1e-6);
    assert!(wrs_geometry().lookup_by_polygon(&parts).is_empty());
}

#[test]
fn test_lookup_by_envelope_finds_neighbours() {
    let wrs = wrs_geometry();
    let hits = wrs.lookup_by_envelope(&seed_scene().bounds());

    assert!(hits.contains(&PathRow::new(33, 35)));
    assert!(hits.contains(&PathRow::new(33, 34)));
    assert!(!hits.contains(&PathRow::new(10, 1)));
}

#[test]
fn test_lookup_by_polygon_uses_exact_shapes() {
    let wrs = wrs_geometry();

    let overlap = wrs.lookup_by_polygon(&rect(0.5, 0.5, 0.9, 0.6));
    assert_eq!(
        overlap.into_iter().collect::<Vec<_>>(),
        vec![PathRow::new(10, 1), PathRow::new(11, 1)]
    );

    assert!(wrs.lookup_by_polygon(&rect(50.0, 50.0, 51.0, 51.0)).is_empty());
}

#[test]
fn test_intersection_areas_ascend() {
    let wrs = wrs_geometry();
    let areas = wrs.intersection_areas(&rect(0.2, 0.2, 1.5, 0.8));

    let cells: Vec<PathRow> = areas.iter().map(|(cell, _)| *cell).collect();
    assert_eq!(cells, vec![PathRow::new(11, 1), PathRow::new(10, 1)]);
    assert_approx_eq!(areas[0].1, 0.42, 1e-9);
    assert_approx_eq!(areas[1].1, 0.48, 1e-9);
}

#[test]
fn test_wrs_loads_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_wrs_geojson(dir.path());

    let wrs = WrsGeometry::from_geojson_file(&path).unwrap();
    assert_eq!(wrs.len(), 5);
    assert!(WrsGeometry::from_geojson_file(dir.path().join("missing.geojson")).is_err());
}
