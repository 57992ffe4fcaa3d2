//! Landsat band and spacecraft model.
//!
//! Logical band labels ("red", "nir", ...) are mapped to per-sensor band
//! numbers, wavelengths and resolutions. Spacecraft ids double as bit masks so
//! that a family (e.g. `Landsat45`) can be tested for membership of a concrete
//! platform (e.g. `Landsat5`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LandsatError, LandsatResult};

/// Logical band label. Values are opaque tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandName {
    UltraBlue,
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    Panchromatic,
    Cirrus,
    Thermal,
    Tirs1,
    Tirs2,
    Infrared1,
    Infrared2,
    Alpha,
    Unknown,
}

impl BandName {
    pub const ALL: [BandName; 16] = [
        BandName::UltraBlue,
        BandName::Blue,
        BandName::Green,
        BandName::Red,
        BandName::Nir,
        BandName::Swir1,
        BandName::Swir2,
        BandName::Panchromatic,
        BandName::Cirrus,
        BandName::Thermal,
        BandName::Tirs1,
        BandName::Tirs2,
        BandName::Infrared1,
        BandName::Infrared2,
        BandName::Alpha,
        BandName::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BandName::UltraBlue => "ultra_blue",
            BandName::Blue => "blue",
            BandName::Green => "green",
            BandName::Red => "red",
            BandName::Nir => "nir",
            BandName::Swir1 => "swir1",
            BandName::Swir2 => "swir2",
            BandName::Panchromatic => "panchromatic",
            BandName::Cirrus => "cirrus",
            BandName::Thermal => "thermal",
            BandName::Tirs1 => "tirs1",
            BandName::Tirs2 => "tirs2",
            BandName::Infrared1 => "infrared1",
            BandName::Infrared2 => "infrared2",
            BandName::Alpha => "alpha",
            BandName::Unknown => "unknown",
        }
    }

    /// GDAL colour interpretation for this band, if it has one.
    pub fn color_interpretation(&self) -> Option<&'static str> {
        match self {
            BandName::Red => Some("Red"),
            BandName::Green => Some("Green"),
            BandName::Blue => Some("Blue"),
            BandName::Alpha => Some("Alpha"),
            BandName::Panchromatic => Some("Gray"),
            _ => None,
        }
    }
}

impl fmt::Display for BandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BandName {
    type Err = LandsatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        BandName::ALL
            .iter()
            .copied()
            .find(|band| band.as_str() == normalized)
            .ok_or_else(|| LandsatError::UnknownBand {
                band: s.to_string(),
                spacecraft: "any".to_string(),
            })
    }
}

/// Landsat platform or platform family, usable as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SpacecraftId {
    #[serde(rename = "UNKNOWN_SPACECRAFT")]
    Unknown = 0,
    #[serde(rename = "LANDSAT_1_MSS")]
    Landsat1Mss = 1,
    #[serde(rename = "LANDSAT_2_MSS")]
    Landsat2Mss = 2,
    #[serde(rename = "LANDSAT_3_MSS")]
    Landsat3Mss = 4,
    #[serde(rename = "LANDSAT_123_MSS")]
    Landsat123Mss = 7,
    #[serde(rename = "LANDSAT_4_MSS")]
    Landsat4Mss = 8,
    #[serde(rename = "LANDSAT_5_MSS")]
    Landsat5Mss = 16,
    #[serde(rename = "LANDSAT_45_MSS")]
    Landsat45Mss = 24,
    #[serde(rename = "LANDSAT_4")]
    Landsat4 = 32,
    #[serde(rename = "LANDSAT_5")]
    Landsat5 = 64,
    #[serde(rename = "LANDSAT_45")]
    Landsat45 = 96,
    #[serde(rename = "LANDSAT_7")]
    Landsat7 = 128,
    #[serde(rename = "LANDSAT_8")]
    Landsat8 = 256,
    #[serde(rename = "ALL")]
    All = 511,
}

/// Families in the order a concrete platform is resolved against them.
const FAMILY_PRECEDENCE: [SpacecraftId; 5] = [
    SpacecraftId::Landsat123Mss,
    SpacecraftId::Landsat45Mss,
    SpacecraftId::Landsat45,
    SpacecraftId::Landsat7,
    SpacecraftId::Landsat8,
];

impl SpacecraftId {
    pub fn mask(&self) -> u32 {
        *self as u32
    }

    /// True when every bit of `other` is part of this id's mask.
    pub fn contains(&self, other: SpacecraftId) -> bool {
        other.mask() != 0 && self.mask() & other.mask() == other.mask()
    }

    /// Map catalog `spacecraft_id` / `sensor_id` columns to a platform id.
    pub fn from_catalog(spacecraft: &str, sensor: &str) -> SpacecraftId {
        let is_mss = sensor.trim().eq_ignore_ascii_case("MSS");
        match (spacecraft.trim().to_uppercase().as_str(), is_mss) {
            ("LANDSAT_1", _) => SpacecraftId::Landsat1Mss,
            ("LANDSAT_2", _) => SpacecraftId::Landsat2Mss,
            ("LANDSAT_3", _) => SpacecraftId::Landsat3Mss,
            ("LANDSAT_4", true) => SpacecraftId::Landsat4Mss,
            ("LANDSAT_5", true) => SpacecraftId::Landsat5Mss,
            ("LANDSAT_4", false) => SpacecraftId::Landsat4,
            ("LANDSAT_5", false) => SpacecraftId::Landsat5,
            ("LANDSAT_7", _) => SpacecraftId::Landsat7,
            ("LANDSAT_8", _) => SpacecraftId::Landsat8,
            _ => SpacecraftId::Unknown,
        }
    }

    /// Catalog spelling of the platform (`LANDSAT_8`, `LANDSAT_5`, ...).
    pub fn catalog_name(&self) -> &'static str {
        match self {
            SpacecraftId::Landsat1Mss => "LANDSAT_1",
            SpacecraftId::Landsat2Mss => "LANDSAT_2",
            SpacecraftId::Landsat3Mss => "LANDSAT_3",
            SpacecraftId::Landsat4Mss | SpacecraftId::Landsat4 => "LANDSAT_4",
            SpacecraftId::Landsat5Mss | SpacecraftId::Landsat5 => "LANDSAT_5",
            SpacecraftId::Landsat7 => "LANDSAT_7",
            SpacecraftId::Landsat8 => "LANDSAT_8",
            _ => "UNKNOWN",
        }
    }

    /// Most specific family containing this platform.
    pub fn family(&self) -> Option<SpacecraftId> {
        FAMILY_PRECEDENCE
            .iter()
            .copied()
            .find(|family| family.contains(*self))
    }
}

impl fmt::Display for SpacecraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpacecraftId::Unknown => "UNKNOWN_SPACECRAFT",
            SpacecraftId::Landsat1Mss => "LANDSAT_1_MSS",
            SpacecraftId::Landsat2Mss => "LANDSAT_2_MSS",
            SpacecraftId::Landsat3Mss => "LANDSAT_3_MSS",
            SpacecraftId::Landsat123Mss => "LANDSAT_123_MSS",
            SpacecraftId::Landsat4Mss => "LANDSAT_4_MSS",
            SpacecraftId::Landsat5Mss => "LANDSAT_5_MSS",
            SpacecraftId::Landsat45Mss => "LANDSAT_45_MSS",
            SpacecraftId::Landsat4 => "LANDSAT_4",
            SpacecraftId::Landsat5 => "LANDSAT_5",
            SpacecraftId::Landsat45 => "LANDSAT_45",
            SpacecraftId::Landsat7 => "LANDSAT_7",
            SpacecraftId::Landsat8 => "LANDSAT_8",
            SpacecraftId::All => "ALL",
        };
        f.write_str(name)
    }
}

/// One band of one sensor family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandDetails {
    pub band: BandName,
    pub number: u32,
    /// Wavelength range in micrometers.
    pub wavelength_range: (f64, f64),
    pub description: &'static str,
    /// Ground sample distance in meters.
    pub resolution_m: f64,
}

const fn details(
    band: BandName,
    number: u32,
    wavelength_range: (f64, f64),
    description: &'static str,
    resolution_m: f64,
) -> BandDetails {
    BandDetails {
        band,
        number,
        wavelength_range,
        description,
        resolution_m,
    }
}

const LANDSAT_8_BANDS: &[BandDetails] = &[
    details(BandName::UltraBlue, 1, (0.435, 0.451), "Coastal aerosol", 30.0),
    details(BandName::Blue, 2, (0.452, 0.512), "Blue", 30.0),
    details(BandName::Green, 3, (0.533, 0.590), "Green", 30.0),
    details(BandName::Red, 4, (0.636, 0.673), "Red", 30.0),
    details(BandName::Nir, 5, (0.851, 0.879), "Near infrared", 30.0),
    details(BandName::Swir1, 6, (1.566, 1.651), "Shortwave infrared 1", 30.0),
    details(BandName::Swir2, 7, (2.107, 2.294), "Shortwave infrared 2", 30.0),
    details(BandName::Panchromatic, 8, (0.503, 0.676), "Panchromatic", 15.0),
    details(BandName::Cirrus, 9, (1.363, 1.384), "Cirrus", 30.0),
    details(BandName::Tirs1, 10, (10.60, 11.19), "Thermal infrared 1", 100.0),
    details(BandName::Tirs2, 11, (11.50, 12.51), "Thermal infrared 2", 100.0),
];

const LANDSAT_7_BANDS: &[BandDetails] = &[
    details(BandName::Blue, 1, (0.45, 0.52), "Blue", 30.0),
    details(BandName::Green, 2, (0.52, 0.60), "Green", 30.0),
    details(BandName::Red, 3, (0.63, 0.69), "Red", 30.0),
    details(BandName::Nir, 4, (0.77, 0.90), "Near infrared", 30.0),
    details(BandName::Swir1, 5, (1.55, 1.75), "Shortwave infrared 1", 30.0),
    details(BandName::Thermal, 6, (10.40, 12.50), "Thermal", 60.0),
    details(BandName::Swir2, 7, (2.09, 2.35), "Shortwave infrared 2", 30.0),
    details(BandName::Panchromatic, 8, (0.52, 0.90), "Panchromatic", 15.0),
];

const LANDSAT_45_BANDS: &[BandDetails] = &[
    details(BandName::Blue, 1, (0.45, 0.52), "Blue", 30.0),
    details(BandName::Green, 2, (0.52, 0.60), "Green", 30.0),
    details(BandName::Red, 3, (0.63, 0.69), "Red", 30.0),
    details(BandName::Nir, 4, (0.76, 0.90), "Near infrared", 30.0),
    details(BandName::Swir1, 5, (1.55, 1.75), "Shortwave infrared 1", 30.0),
    details(BandName::Thermal, 6, (10.40, 12.50), "Thermal", 120.0),
    details(BandName::Swir2, 7, (2.08, 2.35), "Shortwave infrared 2", 30.0),
];

const LANDSAT_45_MSS_BANDS: &[BandDetails] = &[
    details(BandName::Green, 1, (0.5, 0.6), "Green", 60.0),
    details(BandName::Red, 2, (0.6, 0.7), "Red", 60.0),
    details(BandName::Infrared1, 3, (0.7, 0.8), "Near infrared 1", 60.0),
    details(BandName::Infrared2, 4, (0.8, 1.1), "Near infrared 2", 60.0),
];

const LANDSAT_123_MSS_BANDS: &[BandDetails] = &[
    details(BandName::Green, 4, (0.5, 0.6), "Green", 60.0),
    details(BandName::Red, 5, (0.6, 0.7), "Red", 60.0),
    details(BandName::Infrared1, 6, (0.7, 0.8), "Near infrared 1", 60.0),
    details(BandName::Infrared2, 7, (0.8, 1.1), "Near infrared 2", 60.0),
];

/// Band lookup tables for one sensor family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMap {
    spacecraft: SpacecraftId,
    family: SpacecraftId,
    bands: &'static [BandDetails],
}

impl BandMap {
    /// Resolve the most specific family containing `spacecraft`.
    pub fn new(spacecraft: SpacecraftId) -> LandsatResult<Self> {
        let family = spacecraft.family().ok_or_else(|| LandsatError::UnknownBand {
            band: "any".to_string(),
            spacecraft: spacecraft.to_string(),
        })?;

        let bands = match family {
            SpacecraftId::Landsat123Mss => LANDSAT_123_MSS_BANDS,
            SpacecraftId::Landsat45Mss => LANDSAT_45_MSS_BANDS,
            SpacecraftId::Landsat45 => LANDSAT_45_BANDS,
            SpacecraftId::Landsat7 => LANDSAT_7_BANDS,
            _ => LANDSAT_8_BANDS,
        };

        Ok(Self {
            spacecraft,
            family,
            bands,
        })
    }

    pub fn spacecraft(&self) -> SpacecraftId {
        self.spacecraft
    }

    pub fn family(&self) -> SpacecraftId {
        self.family
    }

    /// Full details for a band.
    pub fn details(&self, band: BandName) -> LandsatResult<&'static BandDetails> {
        self.bands
            .iter()
            .find(|d| d.band == band)
            .ok_or_else(|| self.unknown(band.as_str()))
    }

    /// Band number for a logical band.
    pub fn number(&self, band: BandName) -> LandsatResult<u32> {
        self.details(band).map(|d| d.number)
    }

    /// Logical band for a band number.
    pub fn name(&self, number: u32) -> LandsatResult<BandName> {
        self.bands
            .iter()
            .find(|d| d.number == number)
            .map(|d| d.band)
            .ok_or_else(|| self.unknown(&format!("B{}", number)))
    }

    /// Ground sample distance of a band in meters.
    pub fn resolution(&self, band: BandName) -> LandsatResult<f64> {
        self.details(band).map(|d| d.resolution_m)
    }

    /// Coarsest ground sample distance among the family's bands.
    pub fn max_resolution(&self) -> f64 {
        self.bands
            .iter()
            .map(|d| d.resolution_m)
            .fold(0.0, f64::max)
    }

    /// All supported bands in band-number order.
    pub fn bands(&self) -> Vec<&'static BandDetails> {
        let mut bands: Vec<_> = self.bands.iter().collect();
        bands.sort_by_key(|d| d.number);
        bands
    }

    fn unknown(&self, band: &str) -> LandsatError {
        LandsatError::UnknownBand {
            band: band.to_string(),
            spacecraft: self.spacecraft.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_precedence() {
        assert_eq!(
            SpacecraftId::Landsat5.family(),
            Some(SpacecraftId::Landsat45)
        );
        assert_eq!(
            SpacecraftId::Landsat5Mss.family(),
            Some(SpacecraftId::Landsat45Mss)
        );
        assert_eq!(
            SpacecraftId::Landsat2Mss.family(),
            Some(SpacecraftId::Landsat123Mss)
        );
        assert_eq!(SpacecraftId::Unknown.family(), None);
    }

    #[test]
    fn test_landsat8_numbers() {
        let map = BandMap::new(SpacecraftId::Landsat8).unwrap();
        assert_eq!(map.number(BandName::Red).unwrap(), 4);
        assert_eq!(map.number(BandName::Nir).unwrap(), 5);
        assert_eq!(map.resolution(BandName::Panchromatic).unwrap(), 15.0);
    }

    #[test]
    fn test_unknown_band_for_family() {
        let map = BandMap::new(SpacecraftId::Landsat7).unwrap();
        assert!(matches!(
            map.number(BandName::Cirrus),
            Err(LandsatError::UnknownBand { .. })
        ));
    }

    #[test]
    fn test_band_name_parse() {
        assert_eq!("NIR".parse::<BandName>().unwrap(), BandName::Nir);
        assert_eq!("ultra-blue".parse::<BandName>().unwrap(), BandName::UltraBlue);
        assert!("violet".parse::<BandName>().is_err());
    }
}
