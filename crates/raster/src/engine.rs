//! The raster engine seam.
//!
//! The engine opens rasters, translates a virtual dataset into a concrete one
//! and warp-merges several datasets. Everything the core knows about pixels
//! goes through this trait.

use landsat_common::{BoundingBox, Crs, DataType, LandsatError, LandsatResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Size, type and georeferencing of one single-band raster file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub x_size: usize,
    pub y_size: usize,
    pub data_type: DataType,
    /// `(top_left_x, pixel_width, 0, top_left_y, 0, -pixel_height)`.
    pub geo_transform: [f64; 6],
    /// Projection as WKT.
    pub projection: String,
}

impl RasterInfo {
    /// Footprint in projection units.
    pub fn bounds(&self) -> BoundingBox {
        let gt = &self.geo_transform;
        let x_max = gt[0] + self.x_size as f64 * gt[1];
        let y_min = gt[3] + self.y_size as f64 * gt[5];
        BoundingBox::new(gt[0], y_min.min(gt[3]), x_max, y_min.max(gt[3]))
    }
}

/// Options for turning one dataset into another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslateOptions {
    pub output_type: Option<DataType>,
    /// Linear rescale `(src_min, src_max, dst_min, dst_max)`.
    pub scale: Option<(f64, f64, f64, f64)>,
    /// Enforced output pixel size `(x_res, y_res)`.
    pub resolution: Option<(f64, f64)>,
    pub no_data: Option<f64>,
}

/// Options for merging several datasets into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarpOptions {
    pub output_type: Option<DataType>,
    /// GeoJSON file with a single cutline feature.
    pub cutline: Option<PathBuf>,
    pub dst_alpha: bool,
    pub resolution: Option<(f64, f64)>,
    pub target_crs: Option<Crs>,
}

/// External raster engine.
///
/// All operations block until the engine is done.
pub trait RasterEngine: Send + Sync {
    fn raster_info(&self, path: &Path) -> LandsatResult<RasterInfo>;

    fn translate(&self, src: &Path, dst: &Path, options: &TranslateOptions) -> LandsatResult<()>;

    fn warp(&self, sources: &[PathBuf], dst: &Path, options: &WarpOptions) -> LandsatResult<()>;

    fn transform_points(
        &self,
        points: &[(f64, f64)],
        from: &Crs,
        to: &Crs,
    ) -> LandsatResult<Vec<(f64, f64)>>;
}

/// Reproject a box by its lower-left and upper-right corners.
pub fn reproject_bounds(
    engine: &dyn RasterEngine,
    bounds: &BoundingBox,
    from: &Crs,
    to: &Crs,
) -> LandsatResult<BoundingBox> {
    if from.same_as(to) {
        return Ok(*bounds);
    }

    let corners = engine.transform_points(
        &[(bounds.min_x, bounds.min_y), (bounds.max_x, bounds.max_y)],
        from,
        to,
    )?;
    let [(x0, y0), (x1, y1)] = corners[..] else {
        return Err(LandsatError::InvalidCrs(format!(
            "expected 2 transformed corners from {} to {}, got {}",
            from,
            to,
            corners.len()
        )));
    };

    Ok(BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_bounds_from_geo_transform() {
        let info = RasterInfo {
            x_size: 100,
            y_size: 50,
            data_type: DataType::UInt16,
            geo_transform: [500000.0, 30.0, 0.0, 4000000.0, 0.0, -30.0],
            projection: String::new(),
        };
        assert_eq!(
            info.bounds(),
            BoundingBox::new(500000.0, 3998500.0, 503000.0, 4000000.0)
        );
    }
}
