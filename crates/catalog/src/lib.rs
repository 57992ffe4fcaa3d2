//! Landsat scene catalog: metadata records, the WRS-2 grid index, catalog
//! search with exclusion fill and greedy mosaic planning.

pub mod dateline;
pub mod metadata;
pub mod mosaic;
pub mod search;
pub mod wrs;

pub use dateline::{split_by_dateline, split_envelope, split_multi_by_dateline};
pub use metadata::{Metadata, MetadataMessage, PlatformProvider, CATALOG_COLUMNS};
pub use mosaic::{LayerGroup, MosaicMode};
pub use search::{CatalogClient, CatalogRow, MetadataService, SceneSearch};
pub use wrs::{PathRow, WrsGeometry};
