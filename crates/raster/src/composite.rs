//! Multi-band composite of one scene.
//!
//! Every band added to a [`RasterMetadata`] must share the first band's
//! geometry. Clipped copies are cached per extent so repeated requests for
//! the same window return the same `Arc`.

use catalog::Metadata;
use landsat_common::{BoundingBox, Crs, DataType, LandsatError, LandsatResult};
use lru::LruCache;
use metrics::counter;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument};

use crate::band::RasterBandMetadata;
use crate::engine::{reproject_bounds, RasterEngine};

/// Default number of clipped extents kept per composite.
pub const DEFAULT_CLIP_CACHE_CAPACITY: usize = 32;

/// Clip cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct ClipCache {
    entries: LruCache<String, Arc<RasterMetadata>>,
    stats: ClipCacheStats,
}

/// The bands of one scene read together.
pub struct RasterMetadata {
    bands: BTreeMap<u32, RasterBandMetadata>,
    capacity: NonZeroUsize,
    cache: Mutex<ClipCache>,
}

impl RasterMetadata {
    pub fn new(cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            bands: BTreeMap::new(),
            capacity,
            cache: Mutex::new(ClipCache {
                entries: LruCache::new(capacity),
                stats: ClipCacheStats::default(),
            }),
        }
    }

    fn cache(&self) -> MutexGuard<'_, ClipCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read band `band_number` of `scene` through the engine and add it.
    #[instrument(skip(self, scene, engine), fields(scene_id = %scene.scene_id))]
    pub fn add_metadata(
        &mut self,
        band_number: u32,
        scene: &Metadata,
        engine: &dyn RasterEngine,
    ) -> LandsatResult<()> {
        let path = scene.band_path(band_number);
        let info = engine.raster_info(&path)?;
        self.add_band(RasterBandMetadata::from_info(band_number, path, &info))
    }

    /// Add a band, checking it against the bands already present.
    pub fn add_band(&mut self, band: RasterBandMetadata) -> LandsatResult<()> {
        if let Some(reference) = self.bands.values().next() {
            if let Some((field, expected, actual)) = reference.geometry_difference(&band) {
                return Err(LandsatError::RasterMismatch {
                    band: band.band_number,
                    field,
                    expected,
                    actual,
                });
            }
        }

        debug!(band = band.band_number, path = %band.file_path.display(), "Band added");
        self.bands.insert(band.band_number, band);
        self.cache().entries.clear();
        Ok(())
    }

    pub fn band(&self, band_number: u32) -> Option<&RasterBandMetadata> {
        self.bands.get(&band_number)
    }

    /// Bands in band-number order.
    pub fn bands(&self) -> impl Iterator<Item = &RasterBandMetadata> {
        self.bands.values()
    }

    pub fn band_numbers(&self) -> Vec<u32> {
        self.bands.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    fn reference(&self) -> LandsatResult<&RasterBandMetadata> {
        self.bands
            .values()
            .next()
            .ok_or_else(|| LandsatError::OutsideExtent("composite has no bands".to_string()))
    }

    // === Shared geometry ===

    pub fn projection(&self) -> LandsatResult<&str> {
        Ok(&self.reference()?.projection)
    }

    pub fn crs(&self) -> LandsatResult<Crs> {
        Ok(self.reference()?.crs())
    }

    pub fn data_type(&self) -> LandsatResult<DataType> {
        Ok(self.reference()?.data_type)
    }

    pub fn geo_transform(&self) -> LandsatResult<[f64; 6]> {
        Ok(self.reference()?.geo_transform)
    }

    pub fn bounds(&self) -> LandsatResult<BoundingBox> {
        Ok(self.reference()?.bounds)
    }

    /// Window size in pixels.
    pub fn size(&self) -> LandsatResult<(usize, usize)> {
        let reference = self.reference()?;
        Ok((reference.x_dst_size, reference.y_dst_size))
    }

    /// `(pixel_width, |pixel_height|)`.
    pub fn resolution(&self) -> LandsatResult<(f64, f64)> {
        let reference = self.reference()?;
        Ok((reference.pixel_width(), reference.pixel_height().abs()))
    }

    /// Copy of this composite with every band clipped to `extent`.
    ///
    /// `extent_crs` defaults to WGS-84; extents in another system are
    /// reprojected into the band projection first.
    #[instrument(skip(self, engine), fields(extent = %extent.cache_key()))]
    pub fn calculate_clipped(
        &self,
        extent: &BoundingBox,
        extent_crs: Option<&Crs>,
        engine: &dyn RasterEngine,
    ) -> LandsatResult<Arc<RasterMetadata>> {
        let extent_crs = extent_crs.cloned().unwrap_or_default();
        let key = format!("{}|{}", extent.cache_key(), extent_crs);

        {
            let mut cache = self.cache();
            if let Some(hit) = cache.entries.get(&key).cloned() {
                cache.stats.hits += 1;
                counter!("landsat_clip_cache_hits_total").increment(1);
                debug!("Clip cache hit");
                return Ok(hit);
            }
            cache.stats.misses += 1;
        }
        counter!("landsat_clip_cache_misses_total").increment(1);

        let band_crs = self.crs()?;
        let target = reproject_bounds(engine, extent, &extent_crs, &band_crs)?;

        let mut clipped = RasterMetadata::new(self.capacity.get());
        for band in self.bands.values() {
            let mut band = band.clone();
            band.clip_by_boundary(&target)?;
            clipped.bands.insert(band.band_number, band);
        }
        let clipped = Arc::new(clipped);

        let mut cache = self.cache();
        cache.entries.put(key, clipped.clone());
        let entries = cache.entries.len();
        cache.stats.entries = entries;
        debug!(entries = cache.stats.entries, "Clip cached");
        Ok(clipped)
    }

    pub fn cache_stats(&self) -> ClipCacheStats {
        let cache = self.cache();
        ClipCacheStats {
            entries: cache.entries.len(),
            ..cache.stats
        }
    }
}

impl Clone for RasterMetadata {
    /// Bands are copied; the clip cache starts empty.
    fn clone(&self) -> Self {
        let mut copy = RasterMetadata::new(self.capacity.get());
        copy.bands = self.bands.clone();
        copy
    }
}

impl PartialEq for RasterMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.bands == other.bands
    }
}

impl fmt::Debug for RasterMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterMetadata")
            .field("bands", &self.bands)
            .field("cache", &self.cache_stats())
            .finish()
    }
}

impl Default for RasterMetadata {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_CACHE_CAPACITY)
    }
}
