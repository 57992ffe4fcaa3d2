//! Greedy mosaic layering over an area of interest.
//!
//! Each step finds one scene, subtracts its (slightly enlarged) footprint from
//! the remaining area and yields it. Iteration stops once the remaining area
//! is negligible or no candidate is left.

use geo::{Area, BooleanOps, Centroid, MultiPolygon, Scale};
use landsat_common::{LandsatError, LandsatResult};
use query_filter::{FieldValue, QueryFilter, SortDirection};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::dateline::split_multi_by_dateline;
use crate::metadata::Metadata;
use crate::search::MetadataService;
use crate::wrs::PathRow;

/// Relative enlargement of a footprint before subtraction, to avoid slivers.
pub const FOOTPRINT_BUFFER: f64 = 1e-6;

/// Remaining area, in square degrees, treated as covered.
pub const AREA_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosaicMode {
    /// Largest WRS overlap first, one scene per cell.
    ByArea,
    /// Best sort value first; each scene's sort value bounds the next query.
    BySort,
}

/// Iterator of mosaic layers.
pub struct LayerGroup<'a> {
    service: &'a MetadataService,
    filter: QueryFilter,
    mode: MosaicMode,
    remaining: MultiPolygon<f64>,
    /// By-area candidates, ascending by overlap; popped from the back.
    candidates: Vec<(PathRow, f64)>,
    boundary: Option<FieldValue>,
    used: BTreeSet<String>,
    done: bool,
}

impl<'a> LayerGroup<'a> {
    pub(crate) fn new(
        service: &'a MetadataService,
        aoi: &MultiPolygon<f64>,
        filter: &QueryFilter,
        mode: MosaicMode,
    ) -> LandsatResult<Self> {
        let remaining = split_multi_by_dateline(aoi);

        let candidates = match mode {
            MosaicMode::ByArea => {
                let wrs = service.wrs().ok_or_else(|| {
                    LandsatError::Config("area mosaic requires a WRS index".to_string())
                })?;
                wrs.intersection_areas(&remaining)
            }
            MosaicMode::BySort => Vec::new(),
        };

        info!(
            ?mode,
            area = remaining.unsigned_area(),
            candidates = candidates.len(),
            "Planning mosaic"
        );

        Ok(Self {
            service,
            filter: filter.with_aoi(None),
            mode,
            remaining,
            candidates,
            boundary: None,
            used: BTreeSet::new(),
            done: false,
        })
    }

    /// Area of interest not yet covered by a yielded scene.
    pub fn remaining(&self) -> &MultiPolygon<f64> {
        &self.remaining
    }

    pub fn remaining_area(&self) -> f64 {
        self.remaining.unsigned_area()
    }

    fn excluding_used(&self, filter: QueryFilter) -> LandsatResult<QueryFilter> {
        filter.with_excluded("scene_id", self.used.iter().map(String::as_str))
    }

    fn first_scene(&self, filter: &QueryFilter) -> LandsatResult<Option<Metadata>> {
        self.service.search(filter, Some(1))?.next().transpose()
    }

    fn next_by_area(&mut self) -> LandsatResult<Option<Metadata>> {
        while let Some((path_row, area)) = self.candidates.pop() {
            let cell_still_open = self
                .service
                .wrs()
                .and_then(|wrs| wrs.polygon(path_row.path, path_row.row))
                .map(|cell| cell.intersection(&self.remaining).unsigned_area() > AREA_TOLERANCE)
                .unwrap_or(false);
            if !cell_still_open {
                debug!(%path_row, "WRS cell already covered");
                continue;
            }

            let filter = self
                .filter
                .with_pinned("wrs_path", path_row.path)?
                .with_pinned("wrs_row", path_row.row)?
                .with_aoi(Some(self.remaining.clone()));
            let filter = self.excluding_used(filter)?;

            if let Some(scene) = self.first_scene(&filter)? {
                debug!(%path_row, overlap = area, scene_id = %scene.scene_id, "Layer found");
                return Ok(Some(scene));
            }
            debug!(%path_row, "No scene for WRS cell");
        }
        Ok(None)
    }

    fn next_by_sort(&mut self) -> LandsatResult<Option<Metadata>> {
        let sort = self.filter.sort();
        let mut filter = self.filter.with_aoi(Some(self.remaining.clone()));

        if let Some(boundary) = &self.boundary {
            filter = match sort.direction {
                SortDirection::Desc => filter.with_range_end(&sort.field, boundary.clone(), false)?,
                SortDirection::Asc => {
                    filter.with_range_start(&sort.field, boundary.clone(), false)?
                }
            };
        }
        let filter = self.excluding_used(filter)?;

        let scene = self.first_scene(&filter)?;
        if let Some(scene) = &scene {
            self.boundary = scene.field_value(&sort.field);
            if self.boundary.is_none() {
                // Without a boundary the next query could only rely on exclusions.
                debug!(field = %sort.field, "Sort field is not a scene column");
            }
        }
        Ok(scene)
    }

    fn consume(&mut self, scene: &Metadata) {
        let footprint = buffered(&self.service.footprint(scene));
        self.remaining = self.remaining.difference(&footprint);
        self.used.insert(scene.scene_id.clone());
        debug!(
            scene_id = %scene.scene_id,
            remaining = self.remaining_area(),
            "Subtracted scene footprint"
        );
    }
}

/// Enlarge each part about its own centroid; parts on either side of the
/// antimeridian must not drift apart.
fn buffered(footprint: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let factor = 1.0 + FOOTPRINT_BUFFER;
    footprint
        .0
        .iter()
        .map(|part| match part.centroid() {
            Some(centre) => part.scale_around_point(factor, factor, centre),
            None => part.clone(),
        })
        .collect()
}

impl Iterator for LayerGroup<'_> {
    type Item = LandsatResult<Metadata>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining_area() <= AREA_TOLERANCE {
            return None;
        }

        let found = match self.mode {
            MosaicMode::ByArea => self.next_by_area(),
            MosaicMode::BySort => self.next_by_sort(),
        };

        match found {
            Ok(Some(scene)) => {
                self.consume(&scene);
                Some(Ok(scene))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
