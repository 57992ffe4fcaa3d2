//! Catalog search.
//!
//! [`MetadataService`] compiles a [`QueryFilter`] to SQL, runs it through a
//! [`CatalogClient`] and streams [`Metadata`] records. Searches re-query with
//! the already-seen scene and product ids excluded until the requested number
//! of scenes is reached or the catalog runs dry.

use geo::{BoundingRect, Intersects, MultiPolygon};
use landsat_common::{BoundingBox, LandsatConfig, LandsatError, LandsatResult};
use metrics::counter;
use query_filter::QueryFilter;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

use crate::dateline::split_multi_by_dateline;
use crate::metadata::{Metadata, PlatformProvider};
use crate::mosaic::{LayerGroup, MosaicMode};
use crate::wrs::WrsGeometry;

/// One catalog row in column order.
pub type CatalogRow = Vec<Value>;

/// Executes catalog SQL. Implementations block until the result is available.
pub trait CatalogClient: Send + Sync {
    /// Run a statement and return its rows.
    ///
    /// Rate limiting and other retryable provider failures are reported as
    /// [`LandsatError::CatalogTransient`].
    fn execute(&self, sql: &str) -> LandsatResult<Vec<CatalogRow>>;
}

/// Scene search over the catalog.
pub struct MetadataService {
    client: Arc<dyn CatalogClient>,
    wrs: Option<Arc<WrsGeometry>>,
    catalog_table: String,
    default_limit: usize,
    retries: u32,
    mount_base: PathBuf,
    provider: PlatformProvider,
}

impl MetadataService {
    pub fn new(client: Arc<dyn CatalogClient>, config: &LandsatConfig) -> Self {
        Self {
            client,
            wrs: None,
            catalog_table: config.catalog_table.clone(),
            default_limit: config.default_limit,
            retries: config.catalog_retries,
            mount_base: config.mount_base.clone(),
            provider: PlatformProvider::Google,
        }
    }

    /// Use a WRS index for footprint tests and area mosaics.
    pub fn with_wrs(mut self, wrs: Arc<WrsGeometry>) -> Self {
        self.wrs = Some(wrs);
        self
    }

    pub fn with_provider(mut self, provider: PlatformProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn wrs(&self) -> Option<&WrsGeometry> {
        self.wrs.as_deref()
    }

    pub fn catalog_table(&self) -> &str {
        &self.catalog_table
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// SQL for one batch of a search.
    pub fn sql(&self, filter: &QueryFilter, limit: usize) -> String {
        filter.to_sql(&self.catalog_table, limit)
    }

    /// Run a statement, retrying transient failures.
    ///
    /// A transient failure that survives every retry becomes `CatalogFatal`.
    #[instrument(skip(self, sql), fields(table = %self.catalog_table))]
    pub fn execute(&self, sql: &str) -> LandsatResult<Vec<CatalogRow>> {
        let mut attempt = 0;
        loop {
            counter!("landsat_catalog_queries_total").increment(1);
            debug!(attempt, sql, "Executing catalog query");

            match self.client.execute(sql) {
                Ok(rows) => {
                    debug!(rows = rows.len(), "Catalog query returned");
                    return Ok(rows);
                }
                Err(e) if e.is_transient() && attempt < self.retries => {
                    counter!("landsat_catalog_retries_total").increment(1);
                    warn!(attempt, error = %e, "Transient catalog error, retrying");
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(LandsatError::CatalogFatal(format!(
                        "gave up after {} attempts: {}",
                        attempt + 1,
                        e
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn scene_from_row(&self, row: &[Value]) -> LandsatResult<Metadata> {
        Ok(Metadata::from_row(row)?
            .with_mount_base(self.mount_base.clone())
            .with_provider(self.provider))
    }

    /// Lazily search for up to `limit` scenes (the configured default when `None`).
    pub fn search(&self, filter: &QueryFilter, limit: Option<usize>) -> LandsatResult<SceneSearch<'_>> {
        let limit = limit.unwrap_or(self.default_limit);
        let filter = with_aoi_envelopes(filter)?;
        info!(limit, sql = %self.sql(&filter, limit), "Starting scene search");
        Ok(SceneSearch::new(self, filter, limit))
    }

    /// Layer scenes over an area of interest until it is covered.
    pub fn mosaic(
        &self,
        aoi: &MultiPolygon<f64>,
        filter: &QueryFilter,
        mode: MosaicMode,
    ) -> LandsatResult<LayerGroup<'_>> {
        LayerGroup::new(self, aoi, filter, mode)
    }

    /// Footprint used for the AOI test and for mosaic subtraction.
    pub fn footprint(&self, scene: &Metadata) -> MultiPolygon<f64> {
        scene.footprint(self.wrs())
    }
}

/// Add envelope predicates covering the area of interest unless the caller
/// already constrained bounds.
fn with_aoi_envelopes(filter: &QueryFilter) -> LandsatResult<QueryFilter> {
    let Some(aoi) = filter.aoi() else {
        return Ok(filter.clone());
    };
    if filter.envelope().is_some() {
        return Ok(filter.clone());
    }

    let boxes: Vec<BoundingBox> = split_multi_by_dateline(aoi)
        .0
        .iter()
        .filter_map(|part| part.bounding_rect())
        .map(|rect| BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
        .collect();
    filter.with_envelopes(boxes)
}

static GLOBAL_SERVICE: OnceLock<Arc<MetadataService>> = OnceLock::new();

/// Install the process-wide search service. A second call keeps the first.
pub fn init(service: MetadataService) -> Arc<MetadataService> {
    GLOBAL_SERVICE.get_or_init(|| Arc::new(service)).clone()
}

/// The process-wide search service, if initialized.
pub fn global() -> Option<Arc<MetadataService>> {
    GLOBAL_SERVICE.get().cloned()
}

/// Iterator over search results.
///
/// A catalog failure is yielded once as an `Err` and ends the iteration.
pub struct SceneSearch<'a> {
    service: &'a MetadataService,
    filter: QueryFilter,
    aoi: Option<MultiPolygon<f64>>,
    limit: usize,
    yielded: usize,
    seen_scene_ids: BTreeSet<String>,
    seen_product_ids: BTreeSet<String>,
    buffer: VecDeque<Metadata>,
    batches: usize,
    exhausted: bool,
}

impl<'a> SceneSearch<'a> {
    fn new(service: &'a MetadataService, filter: QueryFilter, limit: usize) -> Self {
        let aoi = filter.aoi().map(split_multi_by_dateline);
        Self {
            service,
            filter,
            aoi,
            limit,
            yielded: 0,
            seen_scene_ids: BTreeSet::new(),
            seen_product_ids: BTreeSet::new(),
            buffer: VecDeque::new(),
            batches: 0,
            exhausted: false,
        }
    }

    /// Number of catalog queries issued so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Filter for the next batch, excluding every row already seen.
    fn batch_filter(&self) -> LandsatResult<QueryFilter> {
        self.filter
            .with_excluded("scene_id", self.seen_scene_ids.iter().map(String::as_str))?
            .with_excluded("product_id", self.seen_product_ids.iter().map(String::as_str))
    }

    fn accepts(&self, scene: &Metadata) -> bool {
        match &self.aoi {
            Some(aoi) => self.service.footprint(scene).intersects(aoi),
            None => true,
        }
    }

    fn fetch(&mut self) -> LandsatResult<()> {
        let wanted = self.limit - self.yielded;
        let filter = self.batch_filter()?;
        let sql = self.service.sql(&filter, wanted);
        self.batches += 1;

        let rows = self.service.execute(&sql)?;
        if rows.len() < wanted {
            self.exhausted = true;
        }

        let seen_before = self.seen_scene_ids.len();
        for row in &rows {
            let scene = match self.service.scene_from_row(row) {
                Ok(scene) => scene,
                Err(e) if e.is_skippable() => {
                    warn!(error = %e, "Skipping catalog row");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let new_scene = self.seen_scene_ids.insert(scene.scene_id.clone());
            if let Some(product_id) = &scene.product_id {
                self.seen_product_ids.insert(product_id.clone());
            }
            if !new_scene {
                continue;
            }

            if self.accepts(&scene) {
                self.buffer.push_back(scene);
            } else {
                debug!(scene_id = %scene.scene_id, "Scene footprint misses area of interest");
            }
        }

        // Rows that cannot be excluded would come back forever.
        if self.seen_scene_ids.len() == seen_before {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for SceneSearch<'_> {
    type Item = LandsatResult<Metadata>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.yielded >= self.limit {
                return None;
            }
            if let Some(scene) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(scene));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch() {
                self.exhausted = true;
                self.buffer.clear();
                return Some(Err(e));
            }
        }
    }
}
