//! Raster sample data types, spelled the way GDAL spells them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LandsatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    pub fn gdal_name(&self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::UInt16 => "UInt16",
            DataType::Int16 => "Int16",
            DataType::UInt32 => "UInt32",
            DataType::Int32 => "Int32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
        }
    }

    /// Representable value range, used for linear scale parameters.
    pub fn range(&self) -> (f64, f64) {
        match self {
            DataType::Byte => (0.0, u8::MAX as f64),
            DataType::UInt16 => (0.0, u16::MAX as f64),
            DataType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            DataType::UInt32 => (0.0, u32::MAX as f64),
            DataType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            DataType::Float32 => (f32::MIN as f64, f32::MAX as f64),
            DataType::Float64 => (f64::MIN, f64::MAX),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Size of one sample in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::Byte => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.gdal_name())
    }
}

impl FromStr for DataType {
    type Err = LandsatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "byte" | "uint8" => Ok(DataType::Byte),
            "uint16" => Ok(DataType::UInt16),
            "int16" => Ok(DataType::Int16),
            "uint32" => Ok(DataType::UInt32),
            "int32" => Ok(DataType::Int32),
            "float32" => Ok(DataType::Float32),
            "float64" => Ok(DataType::Float64),
            _ => Err(LandsatError::Serialization(format!(
                "unknown raster data type '{}'",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gdal_names() {
        assert_eq!("UInt16".parse::<DataType>().unwrap(), DataType::UInt16);
        assert_eq!("float32".parse::<DataType>().unwrap(), DataType::Float32);
        assert!("complex64".parse::<DataType>().is_err());
    }

    #[test]
    fn test_ranges() {
        assert_eq!(DataType::Byte.range(), (0.0, 255.0));
        assert_eq!(DataType::UInt16.range(), (0.0, 65535.0));
    }
}
