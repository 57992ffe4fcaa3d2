//! Error types for the Landsat imagery services.

use thiserror::Error;

/// Result type alias using LandsatError.
pub type LandsatResult<T> = Result<T, LandsatError>;

/// Primary error type shared by every crate in the workspace.
#[derive(Debug, Error)]
pub enum LandsatError {
    // === Model Errors ===
    #[error("Band {band} is not available for {spacecraft}")]
    UnknownBand { band: String, spacecraft: String },

    #[error("Invalid range for '{0}': a range needs a start, an end, or both")]
    InvalidRange(String),

    #[error("Envelope crosses the antimeridian (xmin {xmin} > xmax {xmax}); split it first")]
    CrossesAntimeridian { xmin: f64, xmax: f64 },

    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid field name '{0}'")]
    InvalidField(String),

    // === Catalog Errors ===
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Transient catalog error: {0}")]
    CatalogTransient(String),

    #[error("Catalog query failed: {0}")]
    CatalogFatal(String),

    // === Storage Errors ===
    #[error("Failed to mount {prefix}: {message}")]
    MountFailed { prefix: String, message: String },

    #[error("Not mounted: {0}")]
    NotMounted(String),

    // === Raster Errors ===
    #[error("Raster mismatch on band {band}: {field} differs ({expected} vs {actual})")]
    RasterMismatch {
        band: u32,
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Extent does not overlap raster: {0}")]
    OutsideExtent(String),

    #[error("Raster composition failed for scene {scene}: {message}")]
    RasterComposition { scene: String, message: String },

    #[error("Invalid pixel function '{name}': {message}")]
    InvalidPixelFunction { name: String, message: String },

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl LandsatError {
    /// Create a MountFailed error.
    pub fn mount_failed(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MountFailed {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    /// Create a RasterComposition error naming the offending scene.
    pub fn composition(scene: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RasterComposition {
            scene: scene.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidPixelFunction error.
    pub fn invalid_pixel_function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPixelFunction {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LandsatError::CatalogTransient(_))
    }

    /// Row-level errors that a search logs and skips instead of aborting.
    pub fn is_skippable(&self) -> bool {
        matches!(self, LandsatError::SceneNotFound(_))
    }

    /// Stable short code for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LandsatError::UnknownBand { .. } => "unknown_band",
            LandsatError::InvalidRange(_) => "invalid_range",
            LandsatError::CrossesAntimeridian { .. } => "crosses_antimeridian",
            LandsatError::InvalidBbox(_) => "invalid_bbox",
            LandsatError::InvalidCrs(_) => "invalid_crs",
            LandsatError::InvalidField(_) => "invalid_field",
            LandsatError::SceneNotFound(_) => "scene_not_found",
            LandsatError::CatalogTransient(_) => "catalog_transient",
            LandsatError::CatalogFatal(_) => "catalog_fatal",
            LandsatError::MountFailed { .. } => "mount_failed",
            LandsatError::NotMounted(_) => "not_mounted",
            LandsatError::RasterMismatch { .. } => "raster_mismatch",
            LandsatError::OutsideExtent(_) => "outside_extent",
            LandsatError::RasterComposition { .. } => "raster_composition",
            LandsatError::InvalidPixelFunction { .. } => "invalid_pixel_function",
            LandsatError::Config(_) => "config",
            LandsatError::Serialization(_) => "serialization",
            LandsatError::Io(_) => "io",
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for LandsatError {
    fn from(err: std::io::Error) -> Self {
        LandsatError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LandsatError {
    fn from(err: serde_json::Error) -> Self {
        LandsatError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for LandsatError {
    fn from(err: serde_yaml::Error) -> Self {
        LandsatError::Config(format!("YAML error: {}", err))
    }
}
