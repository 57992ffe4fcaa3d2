//! SQL compilation and wire round-trip tests for query filters.

use chrono::NaiveDate;
use geo::{polygon, MultiPolygon};
use landsat_common::{BoundingBox, LandsatError};
use query_filter::{FieldValue, QueryFilter, SortDirection, DEFAULT_LIMIT};

const CATALOG: &str = "`bigquery-public-data.cloud_storage_geo_index.landsat_index`";

fn suffix() -> &'static str {
    " ORDER BY t1.sensing_time DESC LIMIT 10"
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const ENVELOPE_SQL: &str = "((((t1.west_lon >= -115.927734375) AND (t1.west_lon <= -78.31054687499999)) \
OR ((t1.west_lon <= -115.927734375) AND (t1.east_lon >= -115.927734375))) \
AND (((t1.south_lat <= 34.52466147177172) AND (t1.north_lat >= 34.52466147177172)) \
OR ((t1.south_lat > 34.52466147177172) AND (t1.south_lat <= 44.84029065139799))))";

fn query_envelope() -> BoundingBox {
    BoundingBox::new(
        -115.927734375,
        34.52466147177172,
        -78.31054687499999,
        44.84029065139799,
    )
}

// =============================================================================
// Equality and ranges
// =============================================================================

#[test]
fn test_simple_equality() {
    let filter = QueryFilter::builder()
        .equals("scene_id", "LC80270312016188LGN00")
        .build()
        .unwrap();

    assert_eq!(
        filter.to_sql(CATALOG, DEFAULT_LIMIT),
        format!(
            "SELECT * FROM {} AS t1 WHERE (t1.scene_id IN (\"LC80270312016188LGN00\")){}",
            CATALOG,
            suffix()
        )
    );
}

#[test]
fn test_not_in_and_range() {
    let filter = QueryFilter::builder()
        .none_of("cloud_cover", [44.0, 48.0, 50.0])
        .any_of("cloud_cover", [64.0, 68.0, 70.0])
        .range(
            "cloud_cover",
            Some(FieldValue::Number(99.0)),
            true,
            Some(FieldValue::Number(42.0)),
            false,
        )
        .build()
        .unwrap();

    let expected = "((((t1.cloud_cover IN (64.0, 68.0, 70.0)) \
AND NOT (t1.cloud_cover IN (44.0, 48.0, 50.0))) \
AND (t1.cloud_cover >= 99.0)) \
AND (t1.cloud_cover < 42.0))";

    assert_eq!(filter.where_clause().unwrap(), expected);
    assert_eq!(
        filter.to_sql(CATALOG, 10),
        format!("SELECT * FROM {} AS t1 WHERE {}{}", CATALOG, expected, suffix())
    );
}

#[test]
fn test_date_equality_with_collection() {
    let filter = QueryFilter::builder()
        .on_date("date_acquired", day(2017, 3, 12))
        .equals("collection_number", "PRE")
        .build()
        .unwrap();

    assert_eq!(
        filter.where_clause().unwrap(),
        "(((t1.collection_number IN (\"PRE\")) \
AND (t1.date_acquired >= \"2017-03-12T00:00:00\")) \
AND (t1.date_acquired <= \"2017-03-12T23:59:59.999999\"))"
    );
}

#[test]
fn test_not_on_date_is_strict_exclusion() {
    let filter = QueryFilter::builder()
        .not_on_date("date_acquired", day(2017, 3, 12))
        .build()
        .unwrap();

    assert_eq!(
        filter.where_clause().unwrap(),
        "((t1.date_acquired > \"2017-03-12T23:59:59.999999\") \
AND (t1.date_acquired < \"2017-03-12T00:00:00\"))"
    );
}

#[test]
fn test_between_dates() {
    let filter = QueryFilter::builder()
        .between_dates("sensing_time", day(2016, 1, 1), day(2016, 12, 31))
        .build()
        .unwrap();

    assert_eq!(
        filter.where_clause().unwrap(),
        "((t1.sensing_time >= \"2016-01-01T00:00:00\") \
AND (t1.sensing_time <= \"2016-12-31T23:59:59.999999\"))"
    );
}

#[test]
fn test_range_without_bounds_is_invalid() {
    let result = QueryFilter::builder()
        .range("cloud_cover", None, true, None, false)
        .build();
    assert!(matches!(result, Err(LandsatError::InvalidRange(field)) if field == "cloud_cover"));
}

#[test]
fn test_field_order_is_sorted_not_insertion() {
    let a = QueryFilter::builder()
        .equals("wrs_path", 33)
        .equals("wrs_row", 35)
        .less_than("cloud_cover", 20.0)
        .build()
        .unwrap();
    let b = QueryFilter::builder()
        .less_than("cloud_cover", 20.0)
        .equals("wrs_row", 35)
        .equals("wrs_path", 33)
        .build()
        .unwrap();

    assert_eq!(a.to_sql(CATALOG, 5), b.to_sql(CATALOG, 5));
    assert!(a
        .where_clause()
        .unwrap()
        .starts_with("(((t1.cloud_cover < 20.0) AND (t1.wrs_path IN (33)))"));
}

#[test]
fn test_invalid_field_name() {
    let result = QueryFilter::builder()
        .equals("scene_id) OR (1=1", "x")
        .build();
    assert!(matches!(result, Err(LandsatError::InvalidField(_))));
}

// =============================================================================
// Envelopes
// =============================================================================

#[test]
fn test_envelope_canonical_form() {
    let filter = QueryFilter::builder()
        .envelope(query_envelope())
        .build()
        .unwrap();

    assert_eq!(filter.where_clause().unwrap(), ENVELOPE_SQL);
}

#[test]
fn test_envelope_combined_in_field_order() {
    let filter = QueryFilter::builder()
        .less_than("cloud_cover", 20.0)
        .envelope(query_envelope())
        .build()
        .unwrap();

    assert_eq!(
        filter.where_clause().unwrap(),
        format!("({} AND (t1.cloud_cover < 20.0))", ENVELOPE_SQL)
    );
}

#[test]
fn test_multiple_envelopes_are_ored() {
    let filter = QueryFilter::builder()
        .envelope(BoundingBox::new(170.0, -10.0, 180.0, 10.0))
        .envelope(BoundingBox::new(-180.0, -10.0, -170.0, 10.0))
        .build()
        .unwrap();

    let clause = filter.where_clause().unwrap();
    assert!(clause.contains(") OR ((((t1.west_lon >= -180.0)"));
    assert_eq!(filter.envelope().unwrap().boxes().len(), 2);
}

#[test]
fn test_antimeridian_envelope_rejected() {
    let result = QueryFilter::builder()
        .envelope(BoundingBox::new(170.0, -10.0, -170.0, 10.0))
        .build();
    assert!(matches!(
        result,
        Err(LandsatError::CrossesAntimeridian { .. })
    ));
}

// =============================================================================
// Derived filters
// =============================================================================

#[test]
fn test_exclusion_refinement() {
    let filter = QueryFilter::builder()
        .equals("wrs_path", 33)
        .build()
        .unwrap();
    let refined = filter
        .with_excluded("scene_id", ["LC80330352017072LGN00", "LC80330352017056LGN00"])
        .unwrap();

    assert_eq!(
        refined.where_clause().unwrap(),
        "(NOT (t1.scene_id IN (\"LC80330352017072LGN00\", \"LC80330352017056LGN00\")) \
AND (t1.wrs_path IN (33)))"
    );
}

#[test]
fn test_sort_boundary_refinement() {
    let filter = QueryFilter::builder().build().unwrap();
    let ts = day(2017, 3, 12).and_hms_opt(17, 20, 5).unwrap();
    let refined = filter.with_range_end("sensing_time", ts, false).unwrap();

    assert_eq!(
        refined.where_clause().unwrap(),
        "(t1.sensing_time < \"2017-03-12T17:20:05\")"
    );
}

// =============================================================================
// Wire round-trip
// =============================================================================

fn rich_filter() -> QueryFilter {
    let aoi = MultiPolygon(vec![polygon![
        (x: -106.0, y: 35.0),
        (x: -105.0, y: 35.0),
        (x: -105.0, y: 36.0),
        (x: -106.0, y: 36.0),
        (x: -106.0, y: 35.0),
    ]]);

    QueryFilter::builder()
        .none_of("cloud_cover", [44.0, 48.0])
        .less_than("cloud_cover", 42.0)
        .on_date("date_acquired", day(2017, 3, 12))
        .equals("collection_number", "PRE")
        .equals("wrs_path", 33)
        .envelope(query_envelope())
        .aoi(aoi)
        .sort_by("cloud_cover", SortDirection::Asc)
        .build()
        .unwrap()
}

#[test]
fn test_wire_round_trip_preserves_filter() {
    let filter = rich_filter();
    let wire = filter.to_wire();

    assert!(wire.contains_key("bounds"));
    assert!(wire.contains_key("geometry_bag"));

    let restored = QueryFilter::from_wire(&wire).unwrap();
    assert_eq!(restored, filter);
    assert_eq!(restored.to_sql(CATALOG, 7), filter.to_sql(CATALOG, 7));
}

#[test]
fn test_wire_json_round_trip() {
    let filter = rich_filter();
    let json = filter.to_wire_json().unwrap();
    let restored = QueryFilter::from_wire_json(&json).unwrap();
    assert_eq!(restored.to_sql(CATALOG, 10), filter.to_sql(CATALOG, 10));
}

#[test]
fn test_wire_json_rejects_garbage() {
    assert!(matches!(
        QueryFilter::from_wire_json("[1, 2, 3]"),
        Err(LandsatError::Serialization(_))
    ));
}
