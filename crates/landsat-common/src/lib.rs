//! Common types and utilities shared across the Landsat imagery crates.

pub mod band;
pub mod bbox;
pub mod config;
pub mod crs;
pub mod data_type;
pub mod error;

pub use band::{BandDetails, BandMap, BandName, SpacecraftId};
pub use bbox::BoundingBox;
pub use config::LandsatConfig;
pub use crs::{utm_epsg_code, utm_zone, Crs, WGS84_EPSG};
pub use data_type::DataType;
pub use error::{LandsatError, LandsatResult};
