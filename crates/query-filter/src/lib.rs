//! Typed catalog query filters.
//!
//! Filters are built with [`QueryFilter::builder`], compiled to a portable SQL
//! statement with [`QueryFilter::to_sql`] and exchanged as a flat
//! field-keyed wire message with [`QueryFilter::to_wire`].

pub mod expr;
pub mod filter;
pub mod predicate;
pub mod value;
pub mod wire;

pub use expr::Expr;
pub use filter::{QueryFilter, QueryFilterBuilder, Sort, SortDirection, DEFAULT_LIMIT, DEFAULT_SORT_FIELD};
pub use predicate::{envelope_cover, EnvelopePredicate, Predicate, Range, ScalarPredicate, BOUNDS_FIELD};
pub use value::FieldValue;
pub use wire::{QueryParams, WireBounds, WireFilter, GEOMETRY_BAG_FIELD};
