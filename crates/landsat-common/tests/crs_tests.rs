//! CRS parsing, UTM zone selection and bounding box geometry tests.

use landsat_common::{utm_epsg_code, utm_zone, BoundingBox, Crs, LandsatError, WGS84_EPSG};
use test_utils::{assert_approx_eq, assert_coords_approx_eq};

const UTM_13N_WKT: &str = r#"PROJCS["WGS 84 / UTM zone 13N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32613"]]"#;

// =============================================================================
// Crs
// =============================================================================

#[test]
fn test_wkt_reports_outer_authority() {
    let crs = Crs::parse(UTM_13N_WKT).unwrap();
    assert!(matches!(crs, Crs::Wkt(_)));
    assert_eq!(crs.epsg(), Some(32613));
    assert!(!crs.is_geographic());
    assert!(crs.same_as(&Crs::Epsg(32613)));
}

#[test]
fn test_geographic_aliases() {
    for name in ["EPSG:4326", "CRS:84", "wgs84"] {
        let crs = Crs::parse(name).unwrap();
        assert_eq!(crs.epsg(), Some(WGS84_EPSG));
        assert!(crs.is_geographic());
    }
}

#[test]
fn test_unparseable_crs() {
    for name in ["", "EPSG:abc", "mercator"] {
        assert!(matches!(Crs::parse(name), Err(LandsatError::InvalidCrs(_))));
    }
}

// =============================================================================
// UTM
// =============================================================================

#[test]
fn test_utm_zone_edges() {
    assert_eq!(utm_zone(-180.0), 1);
    assert_eq!(utm_zone(-174.0), 1);
    assert_eq!(utm_zone(-173.9), 2);
    assert_eq!(utm_zone(179.9), 60);
    assert_eq!(utm_zone(180.0), 60);
}

#[test]
fn test_utm_code_follows_hemisphere() {
    assert_eq!(utm_epsg_code(-105.5, 36.0), 32613);
    assert_eq!(utm_epsg_code(-105.5, 0.0), 32613);
    assert_eq!(utm_epsg_code(-105.5, -0.1), 32713);
    assert_eq!(utm_epsg_code(151.2, -33.9), 32756);
}

// =============================================================================
// BoundingBox
// =============================================================================

#[test]
fn test_center_of_scene_envelope() {
    let bbox = BoundingBox::parse("-106.1, 35.1, -103.3, 37.2").unwrap();
    assert_coords_approx_eq!((bbox.center().0, bbox.center().1), (-104.7, 36.15), 1e-9);
    assert_approx_eq!(bbox.width(), 2.8, 1e-9);
    assert_approx_eq!(bbox.height(), 2.1, 1e-9);
}

#[test]
fn test_intersection_of_projected_boxes() {
    let scene = BoundingBox::new(300000.0, 4080000.0, 330000.0, 4100000.0);
    let aoi = BoundingBox::new(303000.5, 4082000.25, 340000.0, 4094000.0);

    let clipped = scene.intersection(&aoi).unwrap();
    assert!(scene.contains(&clipped));
    assert_coords_approx_eq!((clipped.min_x, clipped.min_y), (303000.5, 4082000.25), 1e-6);
    assert_coords_approx_eq!((clipped.max_x, clipped.max_y), (330000.0, 4094000.0), 1e-6);
    assert_approx_eq!(clipped.width() * clipped.height(), 26999.5 * 11999.75, 1e-3);
}

#[test]
fn test_antimeridian_box_fails_validation() {
    let bbox = BoundingBox::new(179.0, -1.0, -179.0, 1.0);
    assert!(bbox.crosses_antimeridian());
    assert!(bbox.validate_geographic().is_err());
    assert!(BoundingBox::new(0.0, 2.0, 1.0, 1.0).validate_geographic().is_err());
}
