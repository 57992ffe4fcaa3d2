//! Query filters and their fluent builder.
//!
//! A [`QueryFilter`] is an immutable value: a map of field name to predicate,
//! an optional sort and an optional free-form area of interest. Compiling it
//! to SQL is a pure function of that value.
//!
//! ```rust
//! use query_filter::{QueryFilter, SortDirection};
//!
//! let filter = QueryFilter::builder()
//!     .equals("spacecraft_id", "LANDSAT_8")
//!     .less_than("cloud_cover", 20.0)
//!     .sort_by("cloud_cover", SortDirection::Asc)
//!     .build()
//!     .unwrap();
//!
//! let sql = filter.to_sql("landsat_index", 5);
//! assert!(sql.ends_with("ORDER BY t1.cloud_cover LIMIT 5"));
//! ```

use chrono::NaiveDate;
use geo::MultiPolygon;
use landsat_common::{BoundingBox, LandsatError, LandsatResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::expr::Expr;
use crate::predicate::{
    column, validate_field, EnvelopePredicate, Predicate, Range, ScalarPredicate, BOUNDS_FIELD,
};
use crate::value::FieldValue;

/// Row limit when the caller does not give one.
pub const DEFAULT_LIMIT: usize = 10;

/// Sort column when the caller does not give one.
pub const DEFAULT_SORT_FIELD: &str = "sensing_time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: DEFAULT_SORT_FIELD.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// A compiled-on-demand set of catalog predicates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryFilter {
    pub(crate) predicates: BTreeMap<String, Predicate>,
    pub(crate) sort: Option<Sort>,
    pub(crate) aoi: Option<MultiPolygon<f64>>,
}

impl QueryFilter {
    pub fn builder() -> QueryFilterBuilder {
        QueryFilterBuilder::default()
    }

    /// Predicates in field-name order.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn predicate(&self, field: &str) -> Option<&Predicate> {
        self.predicates.get(field)
    }

    pub fn envelope(&self) -> Option<&EnvelopePredicate> {
        self.predicates.get(BOUNDS_FIELD).and_then(Predicate::as_envelope)
    }

    /// Free-form area of interest, tested against scene footprints after the query.
    pub fn aoi(&self) -> Option<&MultiPolygon<f64>> {
        self.aoi.as_ref()
    }

    /// Explicit sort, if one was given.
    pub fn explicit_sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    /// Effective sort, falling back to `sensing_time DESC`.
    pub fn sort(&self) -> Sort {
        self.sort.clone().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    // === Derived filters ===

    /// Copy with extra excluded values on a field.
    pub fn with_excluded<I, V>(&self, field: &str, values: I) -> LandsatResult<QueryFilter>
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        let mut filter = self.clone();
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return Ok(filter);
        }
        let predicate = filter.scalar_mut(field)?;
        for value in values {
            predicate.set_not_value(value.into());
        }
        Ok(filter)
    }

    /// Copy with the `IN` set of a field replaced by one value.
    pub fn with_pinned(&self, field: &str, value: impl Into<FieldValue>) -> LandsatResult<QueryFilter> {
        let mut filter = self.clone();
        filter.scalar_mut(field)?.pin_value(value.into());
        Ok(filter)
    }

    /// Copy with the upper bound of a field's range replaced.
    pub fn with_range_end(
        &self,
        field: &str,
        value: impl Into<FieldValue>,
        inclusive: bool,
    ) -> LandsatResult<QueryFilter> {
        let mut filter = self.clone();
        filter.scalar_mut(field)?.set_range_end(value.into(), inclusive);
        Ok(filter)
    }

    /// Copy with the lower bound of a field's range replaced.
    pub fn with_range_start(
        &self,
        field: &str,
        value: impl Into<FieldValue>,
        inclusive: bool,
    ) -> LandsatResult<QueryFilter> {
        let mut filter = self.clone();
        filter.scalar_mut(field)?.set_range_start(value.into(), inclusive);
        Ok(filter)
    }

    /// Copy with additional envelope boxes.
    pub fn with_envelopes(
        &self,
        boxes: impl IntoIterator<Item = BoundingBox>,
    ) -> LandsatResult<QueryFilter> {
        let mut filter = self.clone();
        let entry = filter
            .predicates
            .entry(BOUNDS_FIELD.to_string())
            .or_insert_with(|| Predicate::Envelope(EnvelopePredicate::new()));
        match entry {
            Predicate::Envelope(envelope) => {
                for bbox in boxes {
                    envelope.add(bbox)?;
                }
            }
            Predicate::Scalar(_) => {
                return Err(LandsatError::InvalidField(BOUNDS_FIELD.to_string()));
            }
        }
        filter.predicates.retain(|_, p| p.is_active());
        Ok(filter)
    }

    /// Copy with the area of interest replaced.
    pub fn with_aoi(&self, aoi: Option<MultiPolygon<f64>>) -> QueryFilter {
        let mut filter = self.clone();
        filter.aoi = aoi;
        filter
    }

    fn scalar_mut(&mut self, field: &str) -> LandsatResult<&mut ScalarPredicate> {
        scalar_entry(&mut self.predicates, field)
    }

    // === SQL ===

    /// Conjunction of every active predicate in sorted field order.
    pub fn to_expr(&self) -> Option<Expr> {
        Expr::all(
            self.predicates
                .values()
                .filter(|p| p.is_active())
                .flat_map(Predicate::to_exprs),
        )
    }

    /// Rendered `WHERE` condition, without the keyword.
    pub fn where_clause(&self) -> Option<String> {
        self.to_expr().map(|expr| expr.render())
    }

    /// `SELECT * FROM <table> AS t1 [WHERE ...] ORDER BY t1.<sort> [DESC] LIMIT <n>`.
    pub fn to_sql(&self, catalog_ref: &str, limit: usize) -> String {
        let mut sql = format!("SELECT * FROM {} AS t1", catalog_ref);

        if let Some(condition) = self.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }

        let sort = self.sort();
        sql.push_str(" ORDER BY ");
        sql.push_str(&column(&sort.field));
        if sort.direction == SortDirection::Desc {
            sql.push_str(" DESC");
        }
        sql.push_str(&format!(" LIMIT {}", limit));
        sql
    }
}

fn scalar_entry<'a>(
    predicates: &'a mut BTreeMap<String, Predicate>,
    field: &str,
) -> LandsatResult<&'a mut ScalarPredicate> {
    validate_field(field)?;
    if field == BOUNDS_FIELD {
        return Err(LandsatError::InvalidField(field.to_string()));
    }
    match predicates
        .entry(field.to_string())
        .or_insert_with(|| Predicate::Scalar(ScalarPredicate::new(field)))
    {
        Predicate::Scalar(p) => Ok(p),
        Predicate::Envelope(_) => Err(LandsatError::InvalidField(field.to_string())),
    }
}

/// Fluent builder for [`QueryFilter`].
///
/// Each step either applies or records the first error, which is returned
/// from [`QueryFilterBuilder::build`].
#[derive(Debug, Default)]
pub struct QueryFilterBuilder {
    filter: QueryFilter,
    error: Option<LandsatError>,
}

impl QueryFilterBuilder {
    fn apply<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut QueryFilter) -> LandsatResult<()>,
    {
        if self.error.is_none() {
            if let Err(e) = f(&mut self.filter) {
                self.error = Some(e);
            }
        }
        self
    }

    fn scalar<F>(self, field: &str, f: F) -> Self
    where
        F: FnOnce(&mut ScalarPredicate) -> LandsatResult<()>,
    {
        self.apply(|filter| f(scalar_entry(&mut filter.predicates, field)?))
    }

    /// `field IN (value)`.
    pub fn equals(self, field: &str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        self.scalar(field, |p| {
            p.set_value(value);
            Ok(())
        })
    }

    /// `field IN (values...)`.
    pub fn any_of<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        let values: Vec<FieldValue> = values.into_iter().map(Into::into).collect();
        self.scalar(field, |p| {
            values.into_iter().for_each(|v| p.set_value(v));
            Ok(())
        })
    }

    /// `NOT (field IN (value))`.
    pub fn not_equals(self, field: &str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        self.scalar(field, |p| {
            p.set_not_value(value);
            Ok(())
        })
    }

    /// `NOT (field IN (values...))`.
    pub fn none_of<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        let values: Vec<FieldValue> = values.into_iter().map(Into::into).collect();
        self.scalar(field, |p| {
            values.into_iter().for_each(|v| p.set_not_value(v));
            Ok(())
        })
    }

    /// Range with optional bounds; at least one bound is required.
    pub fn range(
        self,
        field: &str,
        start: Option<FieldValue>,
        start_inclusive: bool,
        end: Option<FieldValue>,
        end_inclusive: bool,
    ) -> Self {
        self.scalar(field, |p| {
            p.set_range(Range::new(start, start_inclusive, end, end_inclusive))
        })
    }

    /// `field > value`.
    pub fn greater_than(self, field: &str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        self.scalar(field, |p| {
            p.set_range_start(value, false);
            Ok(())
        })
    }

    /// `field < value`.
    pub fn less_than(self, field: &str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        self.scalar(field, |p| {
            p.set_range_end(value, false);
            Ok(())
        })
    }

    /// Every instant of the day: `[D 00:00:00, D 23:59:59.999999]`.
    pub fn on_date(self, field: &str, date: NaiveDate) -> Self {
        self.range(
            field,
            Some(FieldValue::start_of_day(date)),
            true,
            Some(FieldValue::end_of_day(date)),
            true,
        )
    }

    /// Strict exclusion of the day: `> D 23:59:59.999999` and `< D 00:00:00`.
    pub fn not_on_date(self, field: &str, date: NaiveDate) -> Self {
        self.range(
            field,
            Some(FieldValue::end_of_day(date)),
            false,
            Some(FieldValue::start_of_day(date)),
            false,
        )
    }

    /// Closed range from the start of `first` to the end of `last`.
    pub fn between_dates(self, field: &str, first: NaiveDate, last: NaiveDate) -> Self {
        self.range(
            field,
            Some(FieldValue::start_of_day(first)),
            true,
            Some(FieldValue::end_of_day(last)),
            true,
        )
    }

    /// Scenes whose footprint bounds overlap `bbox`.
    pub fn envelope(self, bbox: BoundingBox) -> Self {
        self.apply(|filter| {
            *filter = filter.with_envelopes([bbox])?;
            Ok(())
        })
    }

    /// Free-form area of interest in geographic coordinates.
    pub fn aoi(self, aoi: MultiPolygon<f64>) -> Self {
        self.apply(|filter| {
            filter.aoi = Some(aoi);
            Ok(())
        })
    }

    pub fn sort_by(self, field: &str, direction: SortDirection) -> Self {
        let field = field.to_string();
        self.apply(|filter| {
            validate_field(&field)?;
            filter.sort = Some(Sort { field, direction });
            Ok(())
        })
    }

    pub fn build(self) -> LandsatResult<QueryFilter> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.filter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_sql() {
        let filter = QueryFilter::builder().build().unwrap();
        assert_eq!(
            filter.to_sql("landsat", DEFAULT_LIMIT),
            "SELECT * FROM landsat AS t1 ORDER BY t1.sensing_time DESC LIMIT 10"
        );
    }

    #[test]
    fn test_first_error_is_kept() {
        let result = QueryFilter::builder()
            .range("cloud_cover", None, true, None, true)
            .envelope(BoundingBox::new(170.0, 0.0, -170.0, 10.0))
            .build();
        assert!(matches!(result, Err(LandsatError::InvalidRange(_))));
    }

    #[test]
    fn test_with_excluded_leaves_original_untouched() {
        let filter = QueryFilter::builder()
            .equals("spacecraft_id", "LANDSAT_8")
            .build()
            .unwrap();
        let refined = filter
            .with_excluded("scene_id", ["LC80440342017069LGN00"])
            .unwrap();

        assert!(filter.predicate("scene_id").is_none());
        assert!(refined.predicate("scene_id").is_some());
    }

    #[test]
    fn test_ascending_sort_has_no_direction_keyword() {
        let filter = QueryFilter::builder()
            .sort_by("cloud_cover", SortDirection::Asc)
            .build()
            .unwrap();
        assert!(filter
            .to_sql("landsat", 3)
            .ends_with("ORDER BY t1.cloud_cover LIMIT 3"));
    }
}
