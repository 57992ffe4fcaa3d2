//! Predicates over a single catalog field.

use landsat_common::{BoundingBox, LandsatError, LandsatResult};
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::value::FieldValue;

/// Table alias used by every column reference.
pub const TABLE_ALIAS: &str = "t1";

/// Field key of the envelope predicate.
pub const BOUNDS_FIELD: &str = "bounds";

pub(crate) fn column(field: &str) -> String {
    format!("{}.{}", TABLE_ALIAS, field)
}

/// Catalog columns are plain identifiers; anything else is rejected before it
/// reaches SQL.
pub fn validate_field(field: &str) -> LandsatResult<()> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !field.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(LandsatError::InvalidField(field.to_string()))
    }
}

/// Optional lower and upper bound of a range comparison.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Option<FieldValue>,
    pub start_inclusive: bool,
    pub end: Option<FieldValue>,
    pub end_inclusive: bool,
}

impl Range {
    pub fn new(
        start: Option<FieldValue>,
        start_inclusive: bool,
        end: Option<FieldValue>,
        end_inclusive: bool,
    ) -> Self {
        Self {
            start,
            start_inclusive,
            end,
            end_inclusive,
        }
    }

    pub fn is_set(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Equality, exclusion and range tests on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarPredicate {
    pub field: String,
    included: Vec<FieldValue>,
    excluded: Vec<FieldValue>,
    range: Range,
}

impl ScalarPredicate {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            included: Vec::new(),
            excluded: Vec::new(),
            range: Range::default(),
        }
    }

    pub fn included(&self) -> &[FieldValue] {
        &self.included
    }

    pub fn excluded(&self) -> &[FieldValue] {
        &self.excluded
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    /// An inactive predicate contributes nothing to SQL.
    pub fn is_active(&self) -> bool {
        !self.included.is_empty() || !self.excluded.is_empty() || self.range.is_set()
    }

    /// Add a value to the `IN` set, keeping insertion order without duplicates.
    pub fn set_value(&mut self, value: FieldValue) {
        if !self.included.contains(&value) {
            self.included.push(value);
        }
    }

    /// Add a value to the `NOT IN` set.
    pub fn set_not_value(&mut self, value: FieldValue) {
        if !self.excluded.contains(&value) {
            self.excluded.push(value);
        }
    }

    /// Replace the `IN` set with a single value.
    pub fn pin_value(&mut self, value: FieldValue) {
        self.included = vec![value];
    }

    /// Replace the range. A range needs at least one bound.
    pub fn set_range(&mut self, range: Range) -> LandsatResult<()> {
        if !range.is_set() {
            return Err(LandsatError::InvalidRange(self.field.clone()));
        }
        self.range = range;
        Ok(())
    }

    pub fn set_range_start(&mut self, value: FieldValue, inclusive: bool) {
        self.range.start = Some(value);
        self.range.start_inclusive = inclusive;
    }

    pub fn set_range_end(&mut self, value: FieldValue, inclusive: bool) {
        self.range.end = Some(value);
        self.range.end_inclusive = inclusive;
    }

    /// Terms in fixed order: `IN`, `NOT IN`, lower bound, upper bound.
    pub fn to_exprs(&self) -> Vec<Expr> {
        let column = column(&self.field);
        let mut exprs = Vec::new();

        if !self.included.is_empty() {
            exprs.push(Expr::compare(&column, "IN", &value_list(&self.included)));
        }

        if !self.excluded.is_empty() {
            exprs.push(Expr::compare(&column, "IN", &value_list(&self.excluded)).not());
        }

        if let Some(start) = &self.range.start {
            let op = if self.range.start_inclusive { ">=" } else { ">" };
            exprs.push(Expr::compare(&column, op, &start.to_sql()));
        }

        if let Some(end) = &self.range.end {
            let op = if self.range.end_inclusive { "<=" } else { "<" };
            exprs.push(Expr::compare(&column, op, &end.to_sql()));
        }

        exprs
    }
}

fn value_list(values: &[FieldValue]) -> String {
    let rendered: Vec<String> = values.iter().map(FieldValue::to_sql).collect();
    format!("({})", rendered.join(", "))
}

/// A set of geographic envelopes; a scene matches when its footprint bounds
/// overlap any of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvelopePredicate {
    boxes: Vec<BoundingBox>,
}

impl EnvelopePredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a box. Antimeridian-crossing boxes must be split by the caller.
    pub fn add(&mut self, bbox: BoundingBox) -> LandsatResult<()> {
        bbox.validate_geographic()?;
        if !self.boxes.contains(&bbox) {
            self.boxes.push(bbox);
        }
        Ok(())
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn is_active(&self) -> bool {
        !self.boxes.is_empty()
    }

    /// Overlap cover of every box, joined with `OR`.
    pub fn to_expr(&self) -> Option<Expr> {
        Expr::any(self.boxes.iter().map(envelope_cover))
    }
}

/// Overlap test of a scene footprint `(W, S, E, N)` against one box.
///
/// `((W >= xmin AND W <= xmax) OR (W <= xmin AND E >= xmin))
///  AND ((S <= ymin AND N >= ymin) OR (S > ymin AND S <= ymax))`
pub fn envelope_cover(bbox: &BoundingBox) -> Expr {
    let west = column("west_lon");
    let east = column("east_lon");
    let south = column("south_lat");
    let north = column("north_lat");

    let xmin = format!("{:?}", bbox.min_x);
    let xmax = format!("{:?}", bbox.max_x);
    let ymin = format!("{:?}", bbox.min_y);
    let ymax = format!("{:?}", bbox.max_y);

    let x_overlap = Expr::compare(&west, ">=", &xmin)
        .and(Expr::compare(&west, "<=", &xmax))
        .or(Expr::compare(&west, "<=", &xmin).and(Expr::compare(&east, ">=", &xmin)));

    let y_overlap = Expr::compare(&south, "<=", &ymin)
        .and(Expr::compare(&north, ">=", &ymin))
        .or(Expr::compare(&south, ">", &ymin).and(Expr::compare(&south, "<=", &ymax)));

    x_overlap.and(y_overlap)
}

/// A predicate stored under one field key of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Scalar(ScalarPredicate),
    Envelope(EnvelopePredicate),
}

impl Predicate {
    pub fn is_active(&self) -> bool {
        match self {
            Predicate::Scalar(p) => p.is_active(),
            Predicate::Envelope(p) => p.is_active(),
        }
    }

    pub fn to_exprs(&self) -> Vec<Expr> {
        match self {
            Predicate::Scalar(p) => p.to_exprs(),
            Predicate::Envelope(p) => p.to_expr().into_iter().collect(),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarPredicate> {
        match self {
            Predicate::Scalar(p) => Some(p),
            Predicate::Envelope(_) => None,
        }
    }

    pub fn as_envelope(&self) -> Option<&EnvelopePredicate> {
        match self {
            Predicate::Envelope(p) => Some(p),
            Predicate::Scalar(_) => None,
        }
    }
}
