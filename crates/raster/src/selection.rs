//! Band selections for a composition request.

use landsat_common::{BandMap, BandName, DataType, LandsatError, LandsatResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A band feeding a pixel function, by number or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceBand {
    Number(u32),
    Name(BandName),
}

impl SourceBand {
    pub fn resolve(&self, band_map: &BandMap) -> LandsatResult<u32> {
        match self {
            SourceBand::Number(number) => Ok(*number),
            SourceBand::Name(name) => band_map.number(*name),
        }
    }
}

impl From<u32> for SourceBand {
    fn from(number: u32) -> Self {
        SourceBand::Number(number)
    }
}

impl From<BandName> for SourceBand {
    fn from(name: BandName) -> Self {
        SourceBand::Name(name)
    }
}

/// A derived band computed by a named pixel function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDetails {
    pub name: String,
    pub band_definitions: Vec<SourceBand>,
    pub data_type: DataType,
    /// Inline function body; opaque to this crate.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub transfer_type: Option<DataType>,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

impl FunctionDetails {
    pub fn new(name: impl Into<String>, bands: Vec<SourceBand>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            band_definitions: bands,
            data_type,
            code: None,
            transfer_type: None,
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_transfer_type(mut self, transfer_type: DataType) -> Self {
        self.transfer_type = Some(transfer_type);
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Language tag for inline code.
    pub fn language(&self) -> Option<&'static str> {
        self.code.as_ref().map(|_| "Python")
    }

    /// Reject functions that cannot be written into a virtual dataset.
    pub fn validate_structure(&self) -> LandsatResult<()> {
        if self.name.trim().is_empty() {
            return Err(LandsatError::invalid_pixel_function(
                &self.name,
                "function name is empty",
            ));
        }
        if self.band_definitions.is_empty() {
            return Err(LandsatError::invalid_pixel_function(
                &self.name,
                "function has no source bands",
            ));
        }
        if self.code.as_deref().is_some_and(|code| code.trim().is_empty()) {
            return Err(LandsatError::invalid_pixel_function(
                &self.name,
                "inline code is empty",
            ));
        }
        Ok(())
    }

    /// Distinct source band numbers, in first-use order.
    pub fn source_numbers(&self, band_map: &BandMap) -> LandsatResult<Vec<u32>> {
        let mut numbers = Vec::new();
        for band in &self.band_definitions {
            let number = band.resolve(band_map)?;
            if !numbers.contains(&number) {
                numbers.push(number);
            }
        }
        Ok(numbers)
    }
}

/// Pre-flight check of user-supplied pixel functions, run before any scene
/// is mounted.
pub trait PixelFunctionValidator: Send + Sync {
    fn validate(&self, function: &FunctionDetails) -> LandsatResult<()>;
}

/// Accepts every structurally valid function.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl PixelFunctionValidator for StructuralValidator {
    fn validate(&self, function: &FunctionDetails) -> LandsatResult<()> {
        function.validate_structure()
    }
}

/// One output band of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BandSelection {
    Raw(u32),
    Named(BandName),
    Function(FunctionDetails),
}

impl BandSelection {
    pub fn is_alpha(&self) -> bool {
        matches!(self, BandSelection::Named(BandName::Alpha))
    }

    pub fn function(&self) -> Option<&FunctionDetails> {
        match self {
            BandSelection::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Band numbers this selection reads. Alpha reads none.
    pub fn source_numbers(&self, band_map: &BandMap) -> LandsatResult<Vec<u32>> {
        match self {
            BandSelection::Raw(number) => Ok(vec![*number]),
            BandSelection::Named(BandName::Alpha) => Ok(Vec::new()),
            BandSelection::Named(name) => Ok(vec![band_map.number(*name)?]),
            BandSelection::Function(function) => function.source_numbers(band_map),
        }
    }
}

impl From<u32> for BandSelection {
    fn from(number: u32) -> Self {
        BandSelection::Raw(number)
    }
}

impl From<BandName> for BandSelection {
    fn from(name: BandName) -> Self {
        BandSelection::Named(name)
    }
}

impl From<FunctionDetails> for BandSelection {
    fn from(function: FunctionDetails) -> Self {
        BandSelection::Function(function)
    }
}

impl FromStr for BandSelection {
    type Err = LandsatError;

    /// `"4"` selects a raw band, `"red"` a named one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<u32>() {
            Ok(number) => Ok(BandSelection::Raw(number)),
            Err(_) => Ok(BandSelection::Named(trimmed.parse()?)),
        }
    }
}

impl fmt::Display for BandSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandSelection::Raw(number) => write!(f, "{}", number),
            BandSelection::Named(name) => write!(f, "{}", name),
            BandSelection::Function(function) => write!(f, "{}()", function.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landsat_common::SpacecraftId;

    fn ndvi() -> FunctionDetails {
        FunctionDetails::new(
            "ndvi",
            vec![BandName::Nir.into(), BandName::Red.into(), SourceBand::Number(5)],
            DataType::Float32,
        )
    }

    #[test]
    fn test_function_sources_are_distinct() {
        let map = BandMap::new(SpacecraftId::Landsat8).unwrap();
        assert_eq!(ndvi().source_numbers(&map).unwrap(), vec![5, 4]);
    }

    #[test]
    fn test_structural_validation() {
        assert!(ndvi().validate_structure().is_ok());

        let no_bands = FunctionDetails::new("f", Vec::new(), DataType::Float32);
        assert!(matches!(
            StructuralValidator.validate(&no_bands),
            Err(LandsatError::InvalidPixelFunction { .. })
        ));

        let blank_code = ndvi().with_code("   ");
        assert!(blank_code.validate_structure().is_err());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!("4".parse::<BandSelection>().unwrap(), BandSelection::Raw(4));
        assert_eq!(
            "nir".parse::<BandSelection>().unwrap(),
            BandSelection::Named(BandName::Nir)
        );
        assert!("not-a-band".parse::<BandSelection>().is_err());
    }

    #[test]
    fn test_alpha_reads_nothing() {
        let map = BandMap::new(SpacecraftId::Landsat8).unwrap();
        let alpha = BandSelection::Named(BandName::Alpha);
        assert!(alpha.is_alpha());
        assert!(alpha.source_numbers(&map).unwrap().is_empty());
    }
}
