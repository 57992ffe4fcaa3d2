//! Per-band raster geometry and clipping.

use landsat_common::{BoundingBox, Crs, DataType, LandsatError, LandsatResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::RasterInfo;

/// Geometry of one band of one scene, and the window of it a virtual
/// dataset reads.
///
/// `x_src_size`/`y_src_size` describe the whole file. The source window starts
/// at `(x_src_offset, y_src_offset)` and spans `x_dst_size` by `y_dst_size`
/// pixels; before any clip it is the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterBandMetadata {
    pub band_number: u32,
    pub file_path: PathBuf,
    /// Projection as WKT.
    pub projection: String,
    pub data_type: DataType,
    pub x_src_size: usize,
    pub y_src_size: usize,
    pub x_dst_size: usize,
    pub y_dst_size: usize,
    /// Source offsets may be fractional.
    pub x_src_offset: f64,
    pub y_src_offset: f64,
    pub x_dst_offset: usize,
    pub y_dst_offset: usize,
    pub geo_transform: [f64; 6],
    /// Window footprint in projection units.
    pub bounds: BoundingBox,
}

impl RasterBandMetadata {
    pub fn from_info(band_number: u32, file_path: impl Into<PathBuf>, info: &RasterInfo) -> Self {
        Self {
            band_number,
            file_path: file_path.into(),
            projection: info.projection.clone(),
            data_type: info.data_type,
            x_src_size: info.x_size,
            y_src_size: info.y_size,
            x_dst_size: info.x_size,
            y_dst_size: info.y_size,
            x_src_offset: 0.0,
            y_src_offset: 0.0,
            x_dst_offset: 0,
            y_dst_offset: 0,
            geo_transform: info.geo_transform,
            bounds: info.bounds(),
        }
    }

    pub fn crs(&self) -> Crs {
        Crs::Wkt(self.projection.clone())
    }

    pub fn pixel_width(&self) -> f64 {
        self.geo_transform[1]
    }

    /// Negative for north-up rasters.
    pub fn pixel_height(&self) -> f64 {
        self.geo_transform[5]
    }

    /// Shrink the window to its intersection with `target` (in band
    /// projection units).
    ///
    /// Sizes and offsets are computed against the current window before the
    /// bounds and geotransform are replaced. Pixel sizes are kept.
    pub fn clip_by_boundary(&mut self, target: &BoundingBox) -> LandsatResult<()> {
        let original = self.bounds;
        let calculated = original.intersection(target).ok_or_else(|| {
            LandsatError::OutsideExtent(format!(
                "band {} bounds {:?} do not overlap {:?}",
                self.band_number,
                original.to_array(),
                target.to_array()
            ))
        })?;

        let original_width = original.width();
        let original_height = original.height();
        let x_window = self.x_dst_size as f64;
        let y_window = self.y_dst_size as f64;

        self.x_dst_size = ((calculated.width() / original_width) * x_window).round() as usize;
        self.y_dst_size = ((calculated.height() / original_height) * y_window).round() as usize;
        self.x_src_offset += (calculated.min_x - original.min_x) / original_width * x_window;
        self.y_src_offset += -(calculated.max_y - original.max_y) / original_height * y_window;

        self.geo_transform = [
            calculated.min_x,
            self.pixel_width(),
            0.0,
            calculated.max_y,
            0.0,
            self.pixel_height(),
        ];
        self.bounds = calculated;
        Ok(())
    }

    /// Same geometry: projection, geotransform, data type, source size and bounds.
    ///
    /// Returns the name of the first field that differs with both values.
    pub(crate) fn geometry_difference(&self, other: &Self) -> Option<(&'static str, String, String)> {
        if !Crs::Wkt(self.projection.clone()).same_as(&Crs::Wkt(other.projection.clone())) {
            return Some(("projection", self.projection.clone(), other.projection.clone()));
        }
        if self
            .geo_transform
            .iter()
            .zip(other.geo_transform.iter())
            .any(|(a, b)| (a - b).abs() > 1e-9)
        {
            return Some((
                "geo_transform",
                format!("{:?}", self.geo_transform),
                format!("{:?}", other.geo_transform),
            ));
        }
        if self.data_type != other.data_type {
            return Some(("data_type", self.data_type.to_string(), other.data_type.to_string()));
        }
        if (self.x_src_size, self.y_src_size) != (other.x_src_size, other.y_src_size) {
            return Some((
                "src_size",
                format!("{}x{}", self.x_src_size, self.y_src_size),
                format!("{}x{}", other.x_src_size, other.y_src_size),
            ));
        }
        if self.bounds != other.bounds {
            return Some((
                "bounds",
                format!("{:?}", self.bounds.to_array()),
                format!("{:?}", other.bounds.to_array()),
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn band() -> RasterBandMetadata {
        let info = RasterInfo {
            x_size: 1000,
            y_size: 800,
            data_type: DataType::UInt16,
            geo_transform: [300000.0, 30.0, 0.0, 4100000.0, 0.0, -30.0],
            projection: "PROJCS[\"WGS 84 / UTM zone 13N\",AUTHORITY[\"EPSG\",\"32613\"]]".into(),
        };
        RasterBandMetadata::from_info(4, "/imagery/B4.TIF", &info)
    }

    #[test]
    fn test_unclipped_bounds_match_pixel_grid() {
        let b = band();
        assert_eq!(b.bounds.width(), b.x_src_size as f64 * b.pixel_width());
        assert_eq!(b.bounds.height(), b.y_src_size as f64 * b.pixel_height().abs());
    }

    #[test]
    fn test_clip_window() {
        let mut b = band();
        // 300 px in from the west, 200 px down from the north, 400 x 100 px.
        let target = BoundingBox::new(309000.0, 4091000.0, 321000.0, 4094000.0);
        b.clip_by_boundary(&target).unwrap();

        assert_eq!((b.x_dst_size, b.y_dst_size), (400, 100));
        assert!(close(b.x_src_offset, 300.0));
        assert!(close(b.y_src_offset, 200.0));
        assert_eq!(b.geo_transform, [309000.0, 30.0, 0.0, 4094000.0, 0.0, -30.0]);
        assert_eq!(b.bounds, target);
        assert_eq!((b.x_src_size, b.y_src_size), (1000, 800));
    }

    #[test]
    fn test_clip_is_limited_to_raster() {
        let mut b = band();
        let original = b.bounds;
        b.clip_by_boundary(&BoundingBox::new(0.0, 0.0, 315000.0, 1e8)).unwrap();

        assert!(original.contains(&b.bounds));
        assert_eq!(b.x_src_offset, 0.0);
        assert_eq!(b.y_src_offset, 0.0);
        assert_eq!((b.x_dst_size, b.y_dst_size), (500, 800));
    }

    #[test]
    fn test_repeated_clip_accumulates_offsets() {
        let mut b = band();
        b.clip_by_boundary(&BoundingBox::new(303000.0, 4076000.0, 330000.0, 4097000.0))
            .unwrap();
        b.clip_by_boundary(&BoundingBox::new(306000.0, 4076000.0, 330000.0, 4094000.0))
            .unwrap();

        assert!(close(b.x_src_offset, 200.0));
        assert!(close(b.y_src_offset, 200.0));
        assert_eq!((b.x_dst_size, b.y_dst_size), (800, 600));
    }

    #[test]
    fn test_clip_outside_fails() {
        let mut b = band();
        let err = b
            .clip_by_boundary(&BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, LandsatError::OutsideExtent(_)));
    }
}
