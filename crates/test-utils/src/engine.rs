//! Raster engine that answers from fixed geometry and records every call.

use landsat_common::{Crs, DataType, LandsatError, LandsatResult};
use raster::{RasterEngine, RasterInfo, TranslateOptions, WarpOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::fixtures::UTM_13N_WKT;

/// One call made to a [`FakeRasterEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Info(PathBuf),
    Translate {
        src: PathBuf,
        dst: PathBuf,
        options: TranslateOptions,
    },
    Warp {
        sources: Vec<PathBuf>,
        dst: PathBuf,
        options: WarpOptions,
    },
    Transform {
        points: Vec<(f64, f64)>,
        from: Crs,
        to: Crs,
    },
}

type PointTransform = fn(f64, f64) -> (f64, f64);

#[derive(Debug)]
pub struct FakeRasterEngine {
    default_info: RasterInfo,
    /// `(file name suffix, info)` overrides, first match wins.
    overrides: Vec<(String, RasterInfo)>,
    transform: PointTransform,
    failing_suffix: Option<String>,
    calls: Mutex<Vec<EngineCall>>,
}

/// A 30 m UTM 13N band of 1000 x 800 pixels with its north-west corner at
/// (300000, 4100000).
pub fn utm_band_info() -> RasterInfo {
    RasterInfo {
        x_size: 1000,
        y_size: 800,
        data_type: DataType::UInt16,
        geo_transform: [300000.0, 30.0, 0.0, 4100000.0, 0.0, -30.0],
        projection: UTM_13N_WKT.to_string(),
    }
}

impl Default for FakeRasterEngine {
    fn default() -> Self {
        Self::new(utm_band_info())
    }
}

impl FakeRasterEngine {
    pub fn new(default_info: RasterInfo) -> Self {
        Self {
            default_info,
            overrides: Vec::new(),
            transform: |x, y| (x, y),
            failing_suffix: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `raster_info` for paths ending in `suffix` with `info`.
    pub fn with_info(mut self, suffix: impl Into<String>, info: RasterInfo) -> Self {
        self.overrides.push((suffix.into(), info));
        self
    }

    pub fn with_transform(mut self, transform: PointTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Fail translate and warp when the destination ends in `suffix`.
    pub fn failing_on(mut self, suffix: impl Into<String>) -> Self {
        self.failing_suffix = Some(suffix.into());
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn translates(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Translate { .. }))
            .collect()
    }

    pub fn warps(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Warp { .. }))
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).push(call);
    }

    fn produce(&self, dst: &Path) -> LandsatResult<()> {
        let failing = self
            .failing_suffix
            .as_deref()
            .is_some_and(|suffix| dst.to_string_lossy().ends_with(suffix));
        if failing {
            return Err(LandsatError::Io(format!("injected failure for {}", dst.display())));
        }
        std::fs::write(dst, b"FAKE")?;
        Ok(())
    }
}

impl RasterEngine for FakeRasterEngine {
    fn raster_info(&self, path: &Path) -> LandsatResult<RasterInfo> {
        self.record(EngineCall::Info(path.to_path_buf()));
        let name = path.to_string_lossy();
        let info = self
            .overrides
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix.as_str()))
            .map(|(_, info)| info)
            .unwrap_or(&self.default_info);
        Ok(info.clone())
    }

    fn translate(&self, src: &Path, dst: &Path, options: &TranslateOptions) -> LandsatResult<()> {
        self.record(EngineCall::Translate {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            options: options.clone(),
        });
        self.produce(dst)
    }

    fn warp(&self, sources: &[PathBuf], dst: &Path, options: &WarpOptions) -> LandsatResult<()> {
        self.record(EngineCall::Warp {
            sources: sources.to_vec(),
            dst: dst.to_path_buf(),
            options: options.clone(),
        });
        self.produce(dst)
    }

    fn transform_points(
        &self,
        points: &[(f64, f64)],
        from: &Crs,
        to: &Crs,
    ) -> LandsatResult<Vec<(f64, f64)>> {
        self.record(EngineCall::Transform {
            points: points.to_vec(),
            from: from.clone(),
            to: to.clone(),
        });
        Ok(points.iter().map(|(x, y)| (self.transform)(*x, *y)).collect())
    }
}
