//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LandsatError, LandsatResult};

/// EPSG code of WGS-84 geographic coordinates.
pub const WGS84_EPSG: u32 = 4326;

/// A coordinate reference system, either as an EPSG code or a WKT definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    Epsg(u32),
    Wkt(String),
}

impl Crs {
    pub fn wgs84() -> Self {
        Crs::Epsg(WGS84_EPSG)
    }

    /// Parse "EPSG:32613" style codes or a WKT string.
    pub fn parse(s: &str) -> LandsatResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LandsatError::InvalidCrs("empty CRS".to_string()));
        }

        let upper = trimmed.to_uppercase();
        if let Some(code) = upper.strip_prefix("EPSG:") {
            return code
                .parse()
                .map(Crs::Epsg)
                .map_err(|_| LandsatError::InvalidCrs(s.to_string()));
        }
        if upper == "CRS:84" || upper == "WGS84" {
            return Ok(Crs::wgs84());
        }
        if trimmed.contains('[') {
            return Ok(Crs::Wkt(trimmed.to_string()));
        }

        Err(LandsatError::InvalidCrs(s.to_string()))
    }

    /// EPSG code, extracted from the outermost authority of a WKT definition.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Wkt(wkt) => epsg_from_wkt(wkt),
        }
    }

    pub fn is_geographic(&self) -> bool {
        match self {
            Crs::Epsg(code) => *code == WGS84_EPSG,
            Crs::Wkt(wkt) => {
                let head = wkt.trim_start().to_uppercase();
                head.starts_with("GEOGCS") || head.starts_with("GEOGCRS")
            }
        }
    }

    /// Two definitions describe the same system.
    pub fn same_as(&self, other: &Crs) -> bool {
        match (self.epsg(), other.epsg()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::wgs84()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Wkt(wkt) => match epsg_from_wkt(wkt) {
                Some(code) => write!(f, "EPSG:{}", code),
                None => write!(f, "{}", wkt),
            },
        }
    }
}

/// Last `AUTHORITY["EPSG","n"]` (WKT1) or `ID["EPSG",n]` (WKT2) in the text.
fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    let upper = wkt.to_uppercase();
    let candidates = ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","];

    let (idx, marker) = candidates
        .iter()
        .filter_map(|marker| upper.rfind(marker).map(|idx| (idx, *marker)))
        .max_by_key(|(idx, _)| *idx)?;

    let rest = &upper[idx + marker.len()..];
    let digits: String = rest
        .trim_start_matches('"')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// UTM zone (1..=60) containing a longitude.
pub fn utm_zone(lon: f64) -> u32 {
    let zone = ((lon + 180.0) / 6.0).ceil();
    zone.clamp(1.0, 60.0) as u32
}

/// EPSG code of the WGS-84 / UTM zone containing a point.
///
/// Northern hemisphere zones are 32601..=32660, southern 32701..=32760.
pub fn utm_epsg_code(lon: f64, lat: f64) -> u32 {
    let base = if lat >= 0.0 { 32600 } else { 32700 };
    base + utm_zone(lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::Epsg(4326));
        assert_eq!(Crs::parse("epsg:32613").unwrap(), Crs::Epsg(32613));
        assert_eq!(Crs::parse("CRS:84").unwrap(), Crs::wgs84());
        assert!(Crs::parse("EPSG:abc").is_err());
        assert!(Crs::parse("").is_err());
    }

    #[test]
    fn test_epsg_from_wkt1() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 13N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","32613"]]"#;
        let crs = Crs::parse(wkt).unwrap();
        assert_eq!(crs.epsg(), Some(32613));
        assert!(crs.same_as(&Crs::Epsg(32613)));
        assert!(!crs.is_geographic());
    }

    #[test]
    fn test_epsg_from_wkt2() {
        let wkt = r#"PROJCRS["WGS 84 / UTM zone 13N",BASEGEOGCRS["WGS 84",ID["EPSG",4326]],ID["EPSG",32613]]"#;
        assert_eq!(Crs::Wkt(wkt.to_string()).epsg(), Some(32613));
    }

    #[test]
    fn test_utm_epsg_codes() {
        assert_eq!(utm_epsg_code(-180.0, 45.0), 32601);
        assert_eq!(utm_epsg_code(-180.0, -45.0), 32701);
        assert_eq!(utm_epsg_code(180.0, 45.0), 32660);
        assert_eq!(utm_epsg_code(180.0, -45.0), 32760);
        assert_eq!(utm_epsg_code(-173.99, 45.0), 32602);
        assert_eq!(utm_epsg_code(174.0, 45.0), 32659);
    }
}
