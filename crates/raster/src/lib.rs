//! Landsat raster composition.
//!
//! - [`RasterBandMetadata`]: one band's geometry and its clip math
//! - [`RasterMetadata`]: bands of one scene, checked for matching geometry,
//!   with a per-extent cache of clipped copies
//! - [`write_vrt`]: the virtual dataset document for a set of band selections
//! - [`LandsatRequest`]: mount, reconcile, write and hand off to a [`RasterEngine`]
//! - [`GdalEngine`]: the [`RasterEngine`] over the GDAL library

pub mod band;
pub mod composite;
pub mod engine;
pub mod gdal_engine;
pub mod request;
pub mod selection;
pub mod vrt;

pub use band::RasterBandMetadata;
pub use composite::{ClipCacheStats, RasterMetadata, DEFAULT_CLIP_CACHE_CAPACITY};
pub use engine::{reproject_bounds, RasterEngine, RasterInfo, TranslateOptions, WarpOptions};
pub use gdal_engine::GdalEngine;
pub use request::{cutline_geojson, LandsatRequest, LandsatRequestBuilder, NO_DATA};
pub use selection::{
    BandSelection, FunctionDetails, PixelFunctionValidator, SourceBand, StructuralValidator,
};
pub use vrt::{format_sci, write_vrt, SOURCE_BLOCK_SIZE};
