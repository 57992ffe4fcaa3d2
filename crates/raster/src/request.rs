//! Per-request composition pipeline.
//!
//! A [`LandsatRequest`] mounts every scene it covers (through a
//! [`SceneLease`] released when the request is dropped), reads the band
//! geometry of each scene, writes one virtual dataset per scene and hands
//! them to the raster engine:
//!
//! - one scene, no cutline, no alpha: a single translate
//! - otherwise: translate each scene, then warp-merge them

use catalog::Metadata;
use geo::MultiPolygon;
use landsat_common::{
    BandMap, BoundingBox, Crs, DataType, LandsatConfig, LandsatError, LandsatResult,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{MountManager, SceneLease};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::composite::RasterMetadata;
use crate::engine::{RasterEngine, TranslateOptions, WarpOptions};
use crate::selection::{BandSelection, PixelFunctionValidator, StructuralValidator};
use crate::vrt::write_vrt;

/// No-data value written by the translate step.
pub const NO_DATA: f64 = 0.0;

/// Single-feature GeoJSON document for a cutline polygon.
pub fn cutline_geojson(cutline: &MultiPolygon<f64>) -> String {
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = cutline
        .0
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
                .collect()
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "MultiPolygon", "coordinates": polygons},
        }],
    })
    .to_string()
}

/// Builder for a [`LandsatRequest`].
pub struct LandsatRequestBuilder {
    scenes: Vec<Metadata>,
    selections: Vec<BandSelection>,
    envelope: Option<(BoundingBox, Crs)>,
    cutline: Option<MultiPolygon<f64>>,
    output_type: Option<DataType>,
    resolution: Option<f64>,
    validator: Arc<dyn PixelFunctionValidator>,
}

impl LandsatRequestBuilder {
    pub fn bands<I, B>(mut self, bands: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BandSelection>,
    {
        self.selections.extend(bands.into_iter().map(Into::into));
        self
    }

    /// Clip every scene to `extent`, given in `crs` (WGS-84 when `None`).
    pub fn envelope(mut self, extent: BoundingBox, crs: Option<Crs>) -> Self {
        self.envelope = Some((extent, crs.unwrap_or_default()));
        self
    }

    /// Mask the output to a geographic polygon during the warp step.
    pub fn cutline(mut self, cutline: MultiPolygon<f64>) -> Self {
        self.cutline = Some(cutline);
        self
    }

    pub fn output_type(mut self, data_type: DataType) -> Self {
        self.output_type = Some(data_type);
        self
    }

    /// Output pixel size in projection units.
    pub fn resolution(mut self, resolution: f64) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn PixelFunctionValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Validate the selections, mount the scenes and read their geometry.
    #[instrument(skip_all, fields(scenes = self.scenes.len(), bands = self.selections.len()))]
    pub fn build(
        self,
        manager: Arc<MountManager>,
        engine: Arc<dyn RasterEngine>,
        config: &LandsatConfig,
    ) -> LandsatResult<LandsatRequest> {
        if self.scenes.is_empty() {
            return Err(LandsatError::SceneNotFound("request has no scenes".to_string()));
        }
        if self.selections.is_empty() {
            return Err(LandsatError::Config("request selects no bands".to_string()));
        }
        for function in self.selections.iter().filter_map(BandSelection::function) {
            function.validate_structure()?;
            self.validator.validate(function)?;
        }

        let lease = SceneLease::acquire_scenes(manager, &self.scenes)?;

        let mut band_maps = Vec::with_capacity(self.scenes.len());
        let mut composites = Vec::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            let band_map = scene.band_map()?;
            let mut composite = RasterMetadata::new(config.clip_cache_capacity);

            let mut numbers = Vec::new();
            for selection in &self.selections {
                for number in selection.source_numbers(&band_map)? {
                    if !numbers.contains(&number) {
                        numbers.push(number);
                    }
                }
            }
            for number in numbers {
                composite
                    .add_metadata(number, scene, engine.as_ref())
                    .map_err(|e| match e {
                        LandsatError::RasterMismatch { .. } => e,
                        other => LandsatError::composition(&scene.scene_id, other.to_string()),
                    })?;
            }

            debug!(scene_id = %scene.scene_id, bands = ?composite.band_numbers(), "Scene geometry read");
            band_maps.push(band_map);
            composites.push(composite);
        }

        Ok(LandsatRequest {
            scenes: self.scenes,
            selections: self.selections,
            envelope: self.envelope,
            cutline: self.cutline,
            output_type: self.output_type,
            resolution: self.resolution,
            band_maps,
            composites,
            engine,
            work_dir: config.work_dir.clone(),
            lease,
        })
    }
}

/// A composition over one or more scenes.
pub struct LandsatRequest {
    scenes: Vec<Metadata>,
    selections: Vec<BandSelection>,
    envelope: Option<(BoundingBox, Crs)>,
    cutline: Option<MultiPolygon<f64>>,
    output_type: Option<DataType>,
    resolution: Option<f64>,
    band_maps: Vec<BandMap>,
    composites: Vec<RasterMetadata>,
    engine: Arc<dyn RasterEngine>,
    work_dir: PathBuf,
    lease: SceneLease,
}

impl LandsatRequest {
    pub fn builder(scenes: Vec<Metadata>) -> LandsatRequestBuilder {
        LandsatRequestBuilder {
            scenes,
            selections: Vec::new(),
            envelope: None,
            cutline: None,
            output_type: None,
            resolution: None,
            validator: Arc::new(StructuralValidator),
        }
    }

    pub fn scenes(&self) -> &[Metadata] {
        &self.scenes
    }

    pub fn selections(&self) -> &[BandSelection] {
        &self.selections
    }

    pub fn lease(&self) -> &SceneLease {
        &self.lease
    }

    pub fn wants_alpha(&self) -> bool {
        self.selections.iter().any(BandSelection::is_alpha)
    }

    /// Whether the output can come from a single translate.
    pub fn is_single_translate(&self) -> bool {
        self.scenes.len() == 1 && self.cutline.is_none() && !self.wants_alpha()
    }

    fn scene_error(&self, index: usize, e: LandsatError) -> LandsatError {
        match e {
            LandsatError::RasterComposition { .. } | LandsatError::RasterMismatch { .. } => e,
            other => LandsatError::composition(&self.scenes[index].scene_id, other.to_string()),
        }
    }

    /// Composite of scene `index`, clipped to the envelope when one is set.
    pub fn composite(&self, index: usize) -> LandsatResult<Arc<RasterMetadata>> {
        let composite = self.composites.get(index).ok_or_else(|| {
            LandsatError::SceneNotFound(format!("no scene at index {}", index))
        })?;
        match &self.envelope {
            Some((extent, crs)) => composite
                .calculate_clipped(extent, Some(crs), self.engine.as_ref())
                .map_err(|e| self.scene_error(index, e)),
            None => Ok(Arc::new(composite.clone())),
        }
    }

    /// VRT document of scene `index`.
    pub fn vrt(&self, index: usize) -> LandsatResult<String> {
        let composite = self.composite(index)?;
        write_vrt(
            &self.scenes[index].scene_id,
            &composite,
            &self.band_maps[index],
            &self.selections,
        )
    }

    fn translate_options(&self, index: usize) -> LandsatResult<TranslateOptions> {
        let composite = &self.composites[index];
        let source_type = composite.data_type().map_err(|e| self.scene_error(index, e))?;
        let (x_res, y_res) = match self.resolution {
            Some(resolution) => (resolution, resolution),
            None => composite.resolution().map_err(|e| self.scene_error(index, e))?,
        };

        let scale = match self.output_type {
            Some(output) if output != source_type && !output.is_float() => {
                let (src_min, src_max) = source_type.range();
                let (dst_min, dst_max) = output.range();
                Some((src_min, src_max, dst_min, dst_max))
            }
            _ => None,
        };

        Ok(TranslateOptions {
            output_type: self.output_type,
            scale,
            resolution: Some((x_res, y_res)),
            no_data: Some(NO_DATA),
        })
    }

    fn write_file(&self, path: &Path, contents: &str, index: usize) -> LandsatResult<()> {
        std::fs::write(path, contents).map_err(|e| self.scene_error(index, e.into()))
    }

    /// Run the translate/warp pipeline and write the result to `output`.
    #[instrument(skip(self), fields(scenes = self.scenes.len(), output = %output.display()))]
    pub fn compose(&self, output: &Path) -> LandsatResult<PathBuf> {
        std::fs::create_dir_all(&self.work_dir)?;
        let request_id = Uuid::new_v4();
        let mut scratch = Vec::new();

        let result = self.run_pipeline(request_id, output, &mut scratch);

        for path in scratch {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "Scratch file not removed");
            }
        }
        result.map(|()| output.to_path_buf())
    }

    fn run_pipeline(
        &self,
        request_id: Uuid,
        output: &Path,
        scratch: &mut Vec<PathBuf>,
    ) -> LandsatResult<()> {
        let mut vrt_paths = Vec::with_capacity(self.scenes.len());
        for (index, scene) in self.scenes.iter().enumerate() {
            let path = self
                .work_dir
                .join(format!("{}_{}.vrt", request_id, scene.scene_id));
            self.write_file(&path, &self.vrt(index)?, index)?;
            scratch.push(path.clone());
            vrt_paths.push(path);
        }

        if self.is_single_translate() {
            info!(scene_id = %self.scenes[0].scene_id, "Translating single scene");
            let options = self.translate_options(0)?;
            return self
                .engine
                .translate(&vrt_paths[0], output, &options)
                .map_err(|e| self.scene_error(0, e));
        }

        let mut translated = Vec::with_capacity(vrt_paths.len());
        for (index, vrt_path) in vrt_paths.iter().enumerate() {
            let path = self
                .work_dir
                .join(format!("{}_{}.tif", request_id, self.scenes[index].scene_id));
            let options = self.translate_options(index)?;
            self.engine
                .translate(vrt_path, &path, &options)
                .map_err(|e| self.scene_error(index, e))?;
            scratch.push(path.clone());
            translated.push(path);
        }

        let cutline = match &self.cutline {
            Some(cutline) => {
                let path = self.work_dir.join(format!("{}_cutline.geojson", request_id));
                std::fs::write(&path, cutline_geojson(cutline))?;
                scratch.push(path.clone());
                Some(path)
            }
            None => None,
        };

        let options = WarpOptions {
            output_type: self.output_type,
            cutline,
            dst_alpha: self.wants_alpha(),
            resolution: self.resolution.map(|r| (r, r)),
            target_crs: None,
        };
        info!(
            sources = translated.len(),
            alpha = options.dst_alpha,
            cutline = options.cutline.is_some(),
            "Warping scenes"
        );
        self.engine.warp(&translated, output, &options).map_err(|e| {
            warn!(error = %e, "Warp failed");
            let scenes: Vec<&str> = self.scenes.iter().map(|s| s.scene_id.as_str()).collect();
            LandsatError::composition(scenes.join(","), e.to_string())
        })
    }
}

impl std::fmt::Debug for LandsatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scenes: Vec<&str> = self.scenes.iter().map(|s| s.scene_id.as_str()).collect();
        f.debug_struct("LandsatRequest")
            .field("scenes", &scenes)
            .field("selections", &self.selections)
            .field("envelope", &self.envelope)
            .field("lease", &self.lease)
            .finish()
    }
}
