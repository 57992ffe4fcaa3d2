//! Band map, spacecraft family and configuration tests.

use landsat_common::{BandMap, BandName, LandsatConfig, LandsatError, SpacecraftId};
use std::io::Write;

const CONCRETE_PLATFORMS: [SpacecraftId; 9] = [
    SpacecraftId::Landsat1Mss,
    SpacecraftId::Landsat2Mss,
    SpacecraftId::Landsat3Mss,
    SpacecraftId::Landsat4Mss,
    SpacecraftId::Landsat5Mss,
    SpacecraftId::Landsat4,
    SpacecraftId::Landsat5,
    SpacecraftId::Landsat7,
    SpacecraftId::Landsat8,
];

// =============================================================================
// BandMap
// =============================================================================

#[test]
fn test_name_inverts_number_for_every_platform() {
    for spacecraft in CONCRETE_PLATFORMS {
        let map = BandMap::new(spacecraft).unwrap();
        for details in map.bands() {
            let number = map.number(details.band).unwrap();
            assert_eq!(
                map.name(number).unwrap(),
                details.band,
                "{} band {}",
                spacecraft,
                number
            );
        }
    }
}

#[test]
fn test_mss_numbering_differs_by_generation() {
    let early = BandMap::new(SpacecraftId::Landsat1Mss).unwrap();
    let late = BandMap::new(SpacecraftId::Landsat4Mss).unwrap();

    assert_eq!(early.number(BandName::Green).unwrap(), 4);
    assert_eq!(late.number(BandName::Green).unwrap(), 1);
    assert_eq!(early.max_resolution(), 60.0);
}

#[test]
fn test_thematic_mapper_has_no_panchromatic() {
    let map = BandMap::new(SpacecraftId::Landsat5).unwrap();
    assert_eq!(map.family(), SpacecraftId::Landsat45);
    assert!(matches!(
        map.number(BandName::Panchromatic),
        Err(LandsatError::UnknownBand { .. })
    ));
    assert_eq!(map.resolution(BandName::Thermal).unwrap(), 120.0);
}

#[test]
fn test_landsat8_band_listing_is_ordered() {
    let map = BandMap::new(SpacecraftId::Landsat8).unwrap();
    let numbers: Vec<u32> = map.bands().iter().map(|d| d.number).collect();
    assert_eq!(numbers, (1..=11).collect::<Vec<_>>());
    assert_eq!(map.max_resolution(), 100.0);
}

#[test]
fn test_unknown_number_is_an_error() {
    let map = BandMap::new(SpacecraftId::Landsat7).unwrap();
    assert!(map.name(12).is_err());
}

#[test]
fn test_unknown_spacecraft_has_no_band_map() {
    assert!(BandMap::new(SpacecraftId::Unknown).is_err());
}

// =============================================================================
// SpacecraftId
// =============================================================================

#[test]
fn test_family_membership_masks() {
    assert!(SpacecraftId::Landsat45.contains(SpacecraftId::Landsat4));
    assert!(SpacecraftId::Landsat45.contains(SpacecraftId::Landsat5));
    assert!(!SpacecraftId::Landsat45.contains(SpacecraftId::Landsat7));
    assert!(SpacecraftId::All.contains(SpacecraftId::Landsat8));
    assert!(!SpacecraftId::All.contains(SpacecraftId::Unknown));
}

#[test]
fn test_from_catalog_strings() {
    assert_eq!(
        SpacecraftId::from_catalog("LANDSAT_8", "OLI_TIRS"),
        SpacecraftId::Landsat8
    );
    assert_eq!(
        SpacecraftId::from_catalog("LANDSAT_5", "MSS"),
        SpacecraftId::Landsat5Mss
    );
    assert_eq!(
        SpacecraftId::from_catalog("LANDSAT_5", "TM"),
        SpacecraftId::Landsat5
    );
    assert_eq!(
        SpacecraftId::from_catalog("SENTINEL_2A", "MSI"),
        SpacecraftId::Unknown
    );
}

#[test]
fn test_spacecraft_serializes_with_catalog_style_names() {
    let json = serde_json::to_string(&SpacecraftId::Landsat123Mss).unwrap();
    assert_eq!(json, "\"LANDSAT_123_MSS\"");
    let band = serde_json::to_string(&BandName::UltraBlue).unwrap();
    assert_eq!(band, "\"ultra_blue\"");
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "catalog_table: my-project.landsat.index").unwrap();
    writeln!(file, "default_limit: 25").unwrap();

    let config = LandsatConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.catalog_table, "my-project.landsat.index");
    assert_eq!(config.default_limit, 25);
    assert_eq!(config.clip_cache_capacity, 32);
}

#[test]
fn test_config_from_yaml_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "clip_cache_capacity: 0").unwrap();

    assert!(matches!(
        LandsatConfig::from_yaml_file(file.path()),
        Err(LandsatError::Config(_))
    ));
}
