//! Raster engine backed by the GDAL library.
//!
//! Translation reads every band through GDAL's resampling reader and writes a
//! GeoTIFF. Warping reprojects each source onto one shared grid; when a
//! cutline or an alpha band is requested the result is staged and masked
//! strip by strip.

use gdal::errors::GdalError;
use gdal::raster::{reproject, Buffer, ColorInterpretation, ResampleAlg};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::LayerAccess;
use gdal::{Dataset, DriverManager};
use geo::{Contains, MultiPolygon, Point};
use landsat_common::{Crs, DataType, LandsatConfig, LandsatError, LandsatResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::engine::{RasterEngine, RasterInfo, TranslateOptions, WarpOptions};

/// Output rows read and written per step.
const STRIP_ROWS: usize = 256;

/// Alpha of a pixel covered by at least one source.
const OPAQUE: f64 = 255.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct GdalEngine;

impl GdalEngine {
    pub fn new() -> Self {
        Self
    }

    /// Engine with the process-wide GDAL settings of `config` applied.
    pub fn from_config(config: &LandsatConfig) -> LandsatResult<Self> {
        if let Some(cache_max) = config.gdal_cache_max_mb {
            gdal::config::set_config_option("GDAL_CACHEMAX", &cache_max.to_string())
                .map_err(gdal_error("setting GDAL_CACHEMAX"))?;
            debug!(cache_max, "GDAL block cache configured");
        }
        Ok(Self)
    }
}

fn gdal_error(context: impl Into<String>) -> impl FnOnce(GdalError) -> LandsatError {
    let context = context.into();
    move |e| LandsatError::Io(format!("{}: {}", context, e))
}

fn open(path: &Path) -> LandsatResult<Dataset> {
    Dataset::open(path).map_err(gdal_error(format!("opening {}", path.display())))
}

fn spatial_ref(crs: &Crs) -> LandsatResult<SpatialRef> {
    let mut srs = match crs {
        Crs::Epsg(code) => SpatialRef::from_epsg(*code),
        Crs::Wkt(wkt) => SpatialRef::from_wkt(wkt),
    }
    .map_err(|e| LandsatError::InvalidCrs(format!("{}: {}", crs, e)))?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

fn dataset_spatial_ref(dataset: &Dataset, path: &Path) -> LandsatResult<SpatialRef> {
    let mut srs = dataset
        .spatial_ref()
        .map_err(|e| LandsatError::InvalidCrs(format!("{}: {}", path.display(), e)))?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

fn band_type(dataset: &Dataset) -> LandsatResult<DataType> {
    let band = dataset.rasterband(1).map_err(gdal_error("reading band 1"))?;
    band.band_type().name().parse::<DataType>()
}

fn create_geotiff(
    path: &Path,
    data_type: DataType,
    (width, height): (usize, usize),
    bands: usize,
) -> LandsatResult<Dataset> {
    let driver =
        DriverManager::get_driver_by_name("GTiff").map_err(gdal_error("loading GTiff driver"))?;
    match data_type {
        DataType::Byte => driver.create_with_band_type::<u8, _>(path, width, height, bands),
        DataType::UInt16 => driver.create_with_band_type::<u16, _>(path, width, height, bands),
        DataType::Int16 => driver.create_with_band_type::<i16, _>(path, width, height, bands),
        DataType::UInt32 => driver.create_with_band_type::<u32, _>(path, width, height, bands),
        DataType::Int32 => driver.create_with_band_type::<i32, _>(path, width, height, bands),
        DataType::Float32 => driver.create_with_band_type::<f32, _>(path, width, height, bands),
        DataType::Float64 => driver.create_with_band_type::<f64, _>(path, width, height, bands),
    }
    .map_err(gdal_error(format!("creating {}", path.display())))
}

/// Pixel grid of an output raster.
#[derive(Debug, Clone, PartialEq)]
struct Grid {
    geo_transform: [f64; 6],
    width: usize,
    height: usize,
}

impl Grid {
    /// Smallest north-up grid at `(x_res, y_res)` holding every point.
    fn covering(xs: &[f64], ys: &[f64], (x_res, y_res): (f64, f64)) -> Self {
        let min = |values: &[f64]| values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = |values: &[f64]| values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (min_x, max_x, min_y, max_y) = (min(xs), max(xs), min(ys), max(ys));

        Self {
            geo_transform: [min_x, x_res, 0.0, max_y, 0.0, -y_res],
            width: (((max_x - min_x) / x_res).round() as usize).max(1),
            height: (((max_y - min_y) / y_res).round() as usize).max(1),
        }
    }

    /// Source grid resampled to `resolution`, keeping its origin.
    fn resampled(
        geo_transform: [f64; 6],
        size: (usize, usize),
        resolution: Option<(f64, f64)>,
    ) -> Self {
        let (width, height) = size;
        match resolution {
            Some((x_res, y_res)) if x_res > 0.0 && y_res > 0.0 => Self {
                geo_transform: [
                    geo_transform[0],
                    x_res,
                    0.0,
                    geo_transform[3],
                    0.0,
                    y_res.copysign(geo_transform[5]),
                ],
                width: ((width as f64 * geo_transform[1].abs() / x_res).round() as usize).max(1),
                height: ((height as f64 * geo_transform[5].abs() / y_res).round() as usize).max(1),
            },
            _ => Self {
                geo_transform,
                width,
                height,
            },
        }
    }

    /// `(first_row, rows)` blocks of at most [`STRIP_ROWS`].
    fn strips(&self) -> impl Iterator<Item = (usize, usize)> {
        let height = self.height;
        (0..height)
            .step_by(STRIP_ROWS)
            .map(move |row| (row, STRIP_ROWS.min(height - row)))
    }

    fn pixel_centres(&self, row: usize, rows: usize) -> (Vec<f64>, Vec<f64>) {
        let gt = &self.geo_transform;
        let count = self.width * rows;
        let mut xs = Vec::with_capacity(count);
        let mut ys = Vec::with_capacity(count);
        for r in row..row + rows {
            for c in 0..self.width {
                xs.push(gt[0] + (c as f64 + 0.5) * gt[1]);
                ys.push(gt[3] + (r as f64 + 0.5) * gt[5]);
            }
        }
        (xs, ys)
    }

    fn create(
        &self,
        path: &Path,
        data_type: DataType,
        projection: &str,
        bands: usize,
    ) -> LandsatResult<Dataset> {
        let mut dataset = create_geotiff(path, data_type, (self.width, self.height), bands)?;
        dataset
            .set_geo_transform(&self.geo_transform)
            .map_err(gdal_error("setting geotransform"))?;
        dataset
            .set_projection(projection)
            .map_err(gdal_error("setting projection"))?;
        Ok(dataset)
    }
}

/// Source rows `(first_row, rows)` feeding output rows starting at `row`.
fn source_window(row: usize, rows: usize, source_height: usize, height: usize) -> (usize, usize) {
    let ratio = source_height as f64 / height as f64;
    let start = ((row as f64 * ratio).round() as usize).min(source_height.saturating_sub(1));
    let end = (((row + rows) as f64 * ratio).round() as usize)
        .clamp(start + 1, source_height.max(1));
    (start, end - start)
}

/// Map one source sample to its output value.
fn rescale(value: f64, source_no_data: Option<f64>, options: &TranslateOptions) -> f64 {
    if source_no_data == Some(value) {
        return options.no_data.unwrap_or(value);
    }
    match options.scale {
        Some((src_min, src_max, dst_min, dst_max)) if src_max > src_min => {
            dst_min + (value - src_min) * (dst_max - dst_min) / (src_max - src_min)
        }
        _ => value,
    }
}

fn read_strip(
    band: &gdal::raster::RasterBand,
    width: usize,
    row: usize,
    rows: usize,
) -> LandsatResult<Vec<f64>> {
    let buffer = band
        .read_as::<f64>((0, row as isize), (width, rows), (width, rows), None)
        .map_err(gdal_error(format!("reading rows {}..{}", row, row + rows)))?;
    Ok(buffer.data().to_vec())
}

fn write_strip(
    band: &mut gdal::raster::RasterBand,
    width: usize,
    row: usize,
    values: Vec<f64>,
) -> LandsatResult<()> {
    let rows = values.len() / width.max(1);
    let mut buffer = Buffer::new((width, rows), values);
    band.write((0, row as isize), (width, rows), &mut buffer)
        .map_err(gdal_error(format!("writing rows {}..{}", row, row + rows)))
}

/// Cutline polygons with the transform from the output CRS into their
/// geographic coordinates.
struct Cutline {
    polygons: MultiPolygon<f64>,
    to_geographic: CoordTransform,
}

impl Cutline {
    /// Read the polygons of the first layer of a vector file.
    fn load(path: &Path, target: &SpatialRef) -> LandsatResult<Self> {
        let dataset = open(path)?;
        let mut layer = dataset
            .layer(0)
            .map_err(gdal_error(format!("reading cutline layer of {}", path.display())))?;

        let mut polygons = Vec::new();
        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                continue;
            };
            match geometry.to_geo().map_err(gdal_error("converting cutline"))? {
                geo::Geometry::Polygon(polygon) => polygons.push(polygon),
                geo::Geometry::MultiPolygon(multi) => polygons.extend(multi.0),
                _ => debug!("Ignoring non-polygon cutline geometry"),
            }
        }
        if polygons.is_empty() {
            return Err(LandsatError::Io(format!(
                "cutline {} holds no polygon",
                path.display()
            )));
        }

        let geographic = spatial_ref(&Crs::wgs84())?;
        let to_geographic = CoordTransform::new(target, &geographic)
            .map_err(|e| LandsatError::InvalidCrs(format!("cutline transform: {}", e)))?;
        Ok(Self {
            polygons: MultiPolygon(polygons),
            to_geographic,
        })
    }

    /// Whether each pixel centre of the strip lies inside the cutline.
    fn covers(&self, grid: &Grid, row: usize, rows: usize) -> LandsatResult<Vec<bool>> {
        let (mut xs, mut ys) = grid.pixel_centres(row, rows);
        self.to_geographic
            .transform_coords(&mut xs, &mut ys, &mut [])
            .map_err(|e| LandsatError::InvalidCrs(format!("cutline transform: {}", e)))?;
        Ok(xs
            .iter()
            .zip(&ys)
            .map(|(&x, &y)| self.polygons.contains(&Point::new(x, y)))
            .collect())
    }
}

/// Path next to `dst` for the unmasked warp result.
fn staging_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!("{}.staging.tif", name))
}

/// Where the warp output lands and what it is made of.
struct WarpPlan {
    grid: Grid,
    projection: String,
    target_srs: SpatialRef,
    output_type: DataType,
    bands: usize,
    no_data: Option<f64>,
}

impl WarpPlan {
    fn new(sources: &[(PathBuf, Dataset)], options: &WarpOptions) -> LandsatResult<Self> {
        let Some((first_path, first)) = sources.first() else {
            return Err(LandsatError::Io("no rasters to warp".to_string()));
        };

        let target_srs = match &options.target_crs {
            Some(crs) => spatial_ref(crs)?,
            None => dataset_spatial_ref(first, first_path)?,
        };
        let projection = target_srs
            .to_wkt()
            .map_err(|e| LandsatError::InvalidCrs(e.to_string()))?;

        let resolution = match options.resolution {
            Some(resolution) => resolution,
            None => {
                let gt = first
                    .geo_transform()
                    .map_err(gdal_error(format!("reading {}", first_path.display())))?;
                (gt[1].abs(), gt[5].abs())
            }
        };

        let mut xs = Vec::with_capacity(sources.len() * 4);
        let mut ys = Vec::with_capacity(sources.len() * 4);
        for (path, dataset) in sources {
            let gt = dataset
                .geo_transform()
                .map_err(gdal_error(format!("reading {}", path.display())))?;
            let (width, height) = dataset.raster_size();
            let x1 = gt[0] + width as f64 * gt[1];
            let y1 = gt[3] + height as f64 * gt[5];
            let mut corner_xs = vec![gt[0], x1, gt[0], x1];
            let mut corner_ys = vec![gt[3], gt[3], y1, y1];

            let source_srs = dataset_spatial_ref(dataset, path)?;
            CoordTransform::new(&source_srs, &target_srs)
                .and_then(|t| t.transform_coords(&mut corner_xs, &mut corner_ys, &mut []))
                .map_err(|e| LandsatError::InvalidCrs(format!("{}: {}", path.display(), e)))?;
            xs.extend(corner_xs);
            ys.extend(corner_ys);
        }

        let output_type = match options.output_type {
            Some(output_type) => output_type,
            None => band_type(first)?,
        };
        let no_data = first
            .rasterband(1)
            .map_err(gdal_error("reading band 1"))?
            .no_data_value();

        Ok(Self {
            grid: Grid::covering(&xs, &ys, resolution),
            projection,
            target_srs,
            output_type,
            bands: first.raster_count(),
            no_data,
        })
    }

    /// Reproject every source, in order, into a new file at `path`.
    fn reproject_into(
        &self,
        sources: &[(PathBuf, Dataset)],
        path: &Path,
    ) -> LandsatResult<Dataset> {
        let dataset = self
            .grid
            .create(path, self.output_type, &self.projection, self.bands)?;
        for index in 1..=self.bands {
            let mut band = dataset.rasterband(index).map_err(gdal_error("opening output band"))?;
            band.set_no_data_value(self.no_data)
                .map_err(gdal_error("setting no-data value"))?;
        }
        for (source_path, source) in sources {
            reproject(source, &dataset)
                .map_err(gdal_error(format!("reprojecting {}", source_path.display())))?;
        }
        Ok(dataset)
    }

    /// Copy the staged bands into `dst`, blanking pixels outside the cutline
    /// and adding an alpha band when asked.
    fn mask_into(
        &self,
        staged: &Dataset,
        dst: &Path,
        cutline: Option<&Cutline>,
        alpha: bool,
    ) -> LandsatResult<Dataset> {
        let grid = &self.grid;
        let bands = self.bands + usize::from(alpha);
        let mut output = grid.create(dst, self.output_type, &self.projection, bands)?;
        let fill = self.no_data.unwrap_or(0.0);

        for (row, rows) in grid.strips() {
            let inside = match cutline {
                Some(cutline) => cutline.covers(grid, row, rows)?,
                None => vec![true; grid.width * rows],
            };
            let mut covered = vec![false; inside.len()];

            for index in 1..=self.bands {
                let source = staged.rasterband(index).map_err(gdal_error("opening staged band"))?;
                let mut values = read_strip(&source, grid.width, row, rows)?;
                for ((value, inside), covered) in values.iter_mut().zip(&inside).zip(&mut covered) {
                    if !inside {
                        *value = fill;
                    } else if self.no_data != Some(*value) {
                        *covered = true;
                    }
                }
                let mut band = output.rasterband(index).map_err(gdal_error("opening output band"))?;
                write_strip(&mut band, grid.width, row, values)?;
            }

            if alpha {
                let values = covered.iter().map(|&c| if c { OPAQUE } else { 0.0 }).collect();
                let mut band = output.rasterband(bands).map_err(gdal_error("opening alpha band"))?;
                write_strip(&mut band, grid.width, row, values)?;
            }
        }

        for index in 1..=self.bands {
            let mut band = output.rasterband(index).map_err(gdal_error("opening output band"))?;
            band.set_no_data_value(self.no_data)
                .map_err(gdal_error("setting no-data value"))?;
        }
        if alpha {
            let mut band = output.rasterband(bands).map_err(gdal_error("opening alpha band"))?;
            band.set_color_interpretation(ColorInterpretation::AlphaBand)
                .map_err(gdal_error("marking alpha band"))?;
        }
        output.flush_cache().map_err(gdal_error("flushing output"))?;
        Ok(output)
    }
}

impl RasterEngine for GdalEngine {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn raster_info(&self, path: &Path) -> LandsatResult<RasterInfo> {
        let dataset = open(path)?;
        let (x_size, y_size) = dataset.raster_size();
        let geo_transform = dataset
            .geo_transform()
            .map_err(gdal_error(format!("reading geotransform of {}", path.display())))?;
        // Unreferenced rasters report an empty projection.
        let projection = dataset
            .spatial_ref()
            .and_then(|srs| srs.to_wkt())
            .unwrap_or_default();

        Ok(RasterInfo {
            x_size,
            y_size,
            data_type: band_type(&dataset)?,
            geo_transform,
            projection,
        })
    }

    #[instrument(skip(self, options), fields(src = %src.display(), dst = %dst.display()))]
    fn translate(&self, src: &Path, dst: &Path, options: &TranslateOptions) -> LandsatResult<()> {
        let source = open(src)?;
        let size = source.raster_size();
        let geo_transform = source
            .geo_transform()
            .map_err(gdal_error(format!("reading geotransform of {}", src.display())))?;
        let output_type = match options.output_type {
            Some(output_type) => output_type,
            None => band_type(&source)?,
        };
        let grid = Grid::resampled(geo_transform, size, options.resolution);
        let bands = source.raster_count();

        let mut output = grid.create(dst, output_type, &source.projection(), bands)?;
        for index in 1..=bands {
            let band = source
                .rasterband(index)
                .map_err(gdal_error(format!("reading band {} of {}", index, src.display())))?;
            let source_no_data = band.no_data_value();
            let mut target = output.rasterband(index).map_err(gdal_error("opening output band"))?;

            for (row, rows) in grid.strips() {
                let (source_row, source_rows) = source_window(row, rows, size.1, grid.height);
                let buffer = band
                    .read_as::<f64>(
                        (0, source_row as isize),
                        (size.0, source_rows),
                        (grid.width, rows),
                        Some(ResampleAlg::NearestNeighbour),
                    )
                    .map_err(gdal_error(format!("reading band {} of {}", index, src.display())))?;
                let values = buffer
                    .data()
                    .iter()
                    .map(|&value| rescale(value, source_no_data, options))
                    .collect();
                write_strip(&mut target, grid.width, row, values)?;
            }

            if options.no_data.is_some() {
                target
                    .set_no_data_value(options.no_data)
                    .map_err(gdal_error("setting no-data value"))?;
            }
        }
        output.flush_cache().map_err(gdal_error("flushing output"))?;

        debug!(width = grid.width, height = grid.height, bands, "Translated raster");
        Ok(())
    }

    #[instrument(skip(self, sources, options), fields(sources = sources.len(), dst = %dst.display()))]
    fn warp(&self, sources: &[PathBuf], dst: &Path, options: &WarpOptions) -> LandsatResult<()> {
        let sources = sources
            .iter()
            .map(|path| Ok((path.clone(), open(path)?)))
            .collect::<LandsatResult<Vec<_>>>()?;
        let plan = WarpPlan::new(&sources, options)?;

        if options.cutline.is_none() && !options.dst_alpha {
            let mut output = plan.reproject_into(&sources, dst)?;
            output.flush_cache().map_err(gdal_error("flushing output"))?;
        } else {
            let staging = staging_path(dst);
            let result = plan.reproject_into(&sources, &staging).and_then(|staged| {
                let cutline = match &options.cutline {
                    Some(path) => Some(Cutline::load(path, &plan.target_srs)?),
                    None => None,
                };
                plan.mask_into(&staged, dst, cutline.as_ref(), options.dst_alpha)
                    .map(|_| ())
            });
            if let Err(e) = std::fs::remove_file(&staging) {
                debug!(path = %staging.display(), error = %e, "Staging raster not removed");
            }
            result?;
        }

        info!(
            width = plan.grid.width,
            height = plan.grid.height,
            alpha = options.dst_alpha,
            "Warped rasters"
        );
        Ok(())
    }

    fn transform_points(
        &self,
        points: &[(f64, f64)],
        from: &Crs,
        to: &Crs,
    ) -> LandsatResult<Vec<(f64, f64)>> {
        let source = spatial_ref(from)?;
        let target = spatial_ref(to)?;
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();

        CoordTransform::new(&source, &target)
            .and_then(|transform| transform.transform_coords(&mut xs, &mut ys, &mut []))
            .map_err(|e| LandsatError::InvalidCrs(format!("{} to {}: {}", from, to, e)))?;
        Ok(xs.into_iter().zip(ys).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::cutline_geojson;
    use geo::{Coord, Polygon};
    use tempfile::TempDir;
    use test_utils::{assert_approx_eq, assert_coords_approx_eq};

    const UTM_13N: u32 = 32613;

    fn write_tif(path: &Path, origin: (f64, f64), size: (usize, usize), values: Vec<u16>) {
        let (width, height) = size;
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut dataset = driver
            .create_with_band_type::<u16, _>(path, width, height, 1)
            .unwrap();
        dataset
            .set_geo_transform(&[origin.0, 30.0, 0.0, origin.1, 0.0, -30.0])
            .unwrap();
        let wkt = SpatialRef::from_epsg(UTM_13N).unwrap().to_wkt().unwrap();
        dataset.set_projection(&wkt).unwrap();

        let mut band = dataset.rasterband(1).unwrap();
        band.write((0, 0), size, &mut Buffer::new(size, values)).unwrap();
        band.set_no_data_value(Some(0.0)).unwrap();
    }

    fn read_band(path: &Path, index: usize) -> Vec<f64> {
        let dataset = Dataset::open(path).unwrap();
        let (width, height) = dataset.raster_size();
        let band = dataset.rasterband(index).unwrap();
        band.read_as::<f64>((0, 0), (width, height), (width, height), None)
            .unwrap()
            .data()
            .to_vec()
    }

    // =========================================================================
    // Grid math
    // =========================================================================

    #[test]
    fn test_resampled_grid_keeps_origin() {
        let gt = [300000.0, 30.0, 0.0, 4100000.0, 0.0, -30.0];

        let grid = Grid::resampled(gt, (7621, 7771), Some((60.0, 60.0)));
        assert_eq!((grid.width, grid.height), (3811, 3886));
        assert_eq!(grid.geo_transform, [300000.0, 60.0, 0.0, 4100000.0, 0.0, -60.0]);

        let same = Grid::resampled(gt, (10, 5), None);
        assert_eq!((same.width, same.height, same.geo_transform), (10, 5, gt));
    }

    #[test]
    fn test_covering_grid_snaps_to_resolution() {
        let grid = Grid::covering(&[500000.0, 500120.0], &[3999940.0, 4000000.0], (30.0, 30.0));
        assert_eq!((grid.width, grid.height), (4, 2));
        assert_eq!(grid.geo_transform[0], 500000.0);
        assert_eq!(grid.geo_transform[3], 4000000.0);

        let (xs, ys) = grid.pixel_centres(1, 1);
        assert_coords_approx_eq!((xs[0], ys[0]), (500015.0, 3999955.0), 1e-9);
    }

    #[test]
    fn test_strips_cover_every_row_once() {
        let grid = Grid {
            geo_transform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            width: 1,
            height: STRIP_ROWS * 2 + 3,
        };
        let strips: Vec<_> = grid.strips().collect();
        assert_eq!(strips, vec![(0, STRIP_ROWS), (STRIP_ROWS, STRIP_ROWS), (STRIP_ROWS * 2, 3)]);
    }

    #[test]
    fn test_source_window_scales_rows() {
        assert_eq!(source_window(0, 256, 1000, 500), (0, 512));
        assert_eq!(source_window(256, 244, 1000, 500), (512, 488));
        assert_eq!(source_window(10, 5, 100, 100), (10, 5));
        // Upsampling still reads at least one row.
        assert_eq!(source_window(3, 1, 2, 10), (1, 1));
    }

    #[test]
    fn test_rescale_keeps_no_data() {
        let options = TranslateOptions {
            scale: Some((0.0, 65535.0, 0.0, 255.0)),
            no_data: Some(0.0),
            ..TranslateOptions::default()
        };
        assert_approx_eq!(rescale(65535.0, Some(0.0), &options), 255.0, 1e-9);
        assert_approx_eq!(rescale(257.0, Some(0.0), &options), 1.0, 1e-9);
        assert_eq!(rescale(0.0, Some(0.0), &options), 0.0);
        assert_eq!(rescale(7.0, None, &TranslateOptions::default()), 7.0);
    }

    #[test]
    fn test_staging_path_sits_next_to_output() {
        assert_eq!(
            staging_path(Path::new("/work/out.tif")),
            PathBuf::from("/work/out.staging.tif")
        );
    }

    // =========================================================================
    // Against GeoTIFFs
    // =========================================================================

    #[test]
    fn test_raster_info_reads_geotiff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("B4.TIF");
        write_tif(&path, (320085.0, 4107915.0), (3, 2), vec![1, 2, 3, 4, 5, 6]);

        let info = GdalEngine::new().raster_info(&path).unwrap();
        assert_eq!((info.x_size, info.y_size), (3, 2));
        assert_eq!(info.data_type, DataType::UInt16);
        assert_eq!(info.geo_transform, [320085.0, 30.0, 0.0, 4107915.0, 0.0, -30.0]);
        assert_eq!(Crs::Wkt(info.projection).epsg(), Some(UTM_13N));
    }

    #[test]
    fn test_missing_raster_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = GdalEngine::new()
            .raster_info(&dir.path().join("missing.TIF"))
            .unwrap_err();
        assert!(matches!(err, LandsatError::Io(_)));
    }

    #[test]
    fn test_translate_scales_and_casts() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.tif");
        let dst = dir.path().join("dst.tif");
        write_tif(&src, (500000.0, 4000000.0), (2, 2), vec![0, 65535, 257, 514]);

        let options = TranslateOptions {
            output_type: Some(DataType::Byte),
            scale: Some((0.0, 65535.0, 0.0, 255.0)),
            resolution: Some((30.0, 30.0)),
            no_data: Some(0.0),
        };
        GdalEngine::new().translate(&src, &dst, &options).unwrap();

        let info = GdalEngine::new().raster_info(&dst).unwrap();
        assert_eq!(info.data_type, DataType::Byte);
        assert_eq!(read_band(&dst, 1), vec![0.0, 255.0, 1.0, 2.0]);
        let no_data = Dataset::open(&dst).unwrap().rasterband(1).unwrap().no_data_value();
        assert_eq!(no_data, Some(0.0));
    }

    #[test]
    fn test_translate_enforces_resolution() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.tif");
        let dst = dir.path().join("dst.tif");
        write_tif(&src, (500000.0, 4000000.0), (4, 2), vec![5; 8]);

        let options = TranslateOptions {
            resolution: Some((60.0, 60.0)),
            ..TranslateOptions::default()
        };
        GdalEngine::new().translate(&src, &dst, &options).unwrap();

        let info = GdalEngine::new().raster_info(&dst).unwrap();
        assert_eq!((info.x_size, info.y_size), (2, 1));
        assert_eq!(info.geo_transform[1], 60.0);
        assert_eq!(info.data_type, DataType::UInt16);
        assert_eq!(read_band(&dst, 1), vec![5.0, 5.0]);
    }

    #[test]
    fn test_warp_merges_sources_with_alpha() {
        let dir = TempDir::new().unwrap();
        let west = dir.path().join("west.tif");
        let east = dir.path().join("east.tif");
        let dst = dir.path().join("merged.tif");
        // One empty column between the two sources.
        write_tif(&west, (500000.0, 4000000.0), (2, 2), vec![10; 4]);
        write_tif(&east, (500090.0, 4000000.0), (2, 2), vec![20; 4]);

        let options = WarpOptions {
            dst_alpha: true,
            ..WarpOptions::default()
        };
        GdalEngine::new()
            .warp(&[west, east], &dst, &options)
            .unwrap();

        let info = GdalEngine::new().raster_info(&dst).unwrap();
        assert_eq!((info.x_size, info.y_size), (5, 2));
        assert_eq!(Crs::Wkt(info.projection).epsg(), Some(UTM_13N));

        let row = [10.0, 10.0, 0.0, 20.0, 20.0];
        assert_eq!(read_band(&dst, 1), [row, row].concat());
        let alpha = [OPAQUE, OPAQUE, 0.0, OPAQUE, OPAQUE];
        assert_eq!(read_band(&dst, 2), [alpha, alpha].concat());
        assert!(!staging_path(&dst).exists());
    }

    #[test]
    fn test_warp_applies_cutline() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.tif");
        let dst = dir.path().join("clipped.tif");
        write_tif(&src, (500000.0, 4000000.0), (4, 2), vec![7; 8]);

        // Geographic quadrilateral over the western half of the raster.
        let engine = GdalEngine::new();
        let corners = engine
            .transform_points(
                &[
                    (499990.0, 3999930.0),
                    (500060.0, 3999930.0),
                    (500060.0, 4000010.0),
                    (499990.0, 4000010.0),
                ],
                &Crs::Epsg(UTM_13N),
                &Crs::wgs84(),
            )
            .unwrap();
        let mut ring: Vec<Coord<f64>> = corners.iter().map(|&(x, y)| Coord { x, y }).collect();
        ring.push(ring[0]);
        let cutline = MultiPolygon(vec![Polygon::new(ring.into(), vec![])]);
        let cutline_path = dir.path().join("cutline.geojson");
        std::fs::write(&cutline_path, cutline_geojson(&cutline)).unwrap();

        let options = WarpOptions {
            cutline: Some(cutline_path),
            ..WarpOptions::default()
        };
        engine.warp(&[src], &dst, &options).unwrap();

        let row = [7.0, 7.0, 0.0, 0.0];
        assert_eq!(read_band(&dst, 1), [row, row].concat());
    }

    #[test]
    fn test_transform_points_round_trip() {
        let engine = GdalEngine::new();
        let utm = engine
            .transform_points(&[(-105.0, 36.0)], &Crs::wgs84(), &Crs::Epsg(UTM_13N))
            .unwrap();
        assert_approx_eq!(utm[0].0, 500000.0, 1e-6);

        let back = engine
            .transform_points(&utm, &Crs::Epsg(UTM_13N), &Crs::wgs84())
            .unwrap();
        assert_coords_approx_eq!((back[0].0, back[0].1), (-105.0, 36.0), 1e-7);
    }

    #[test]
    fn test_unknown_crs_is_rejected() {
        let err = GdalEngine::new()
            .transform_points(&[(0.0, 0.0)], &Crs::Epsg(999999), &Crs::wgs84())
            .unwrap_err();
        assert!(matches!(err, LandsatError::InvalidCrs(_)));
    }
}
