//! Flat wire representation of a [`QueryFilter`].
//!
//! Each field maps to one [`QueryParams`] record. The envelope predicate lives
//! under the `bounds` key and the free-form area of interest under
//! `geometry_bag`. Inactive predicates are not written.

use geo::MultiPolygon;
use landsat_common::{BoundingBox, LandsatError, LandsatResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::filter::{QueryFilter, Sort, SortDirection};
use crate::predicate::{validate_field, EnvelopePredicate, Predicate, Range, ScalarPredicate, BOUNDS_FIELD};
use crate::value::FieldValue;

/// Wire key of the free-form area of interest.
pub const GEOMETRY_BAG_FIELD: &str = "geometry_bag";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireBounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl From<&BoundingBox> for WireBounds {
    fn from(bbox: &BoundingBox) -> Self {
        Self {
            xmin: bbox.min_x,
            ymin: bbox.min_y,
            xmax: bbox.max_x,
            ymax: bbox.max_y,
        }
    }
}

impl From<&WireBounds> for BoundingBox {
    fn from(b: &WireBounds) -> Self {
        BoundingBox::new(b.xmin, b.ymin, b.xmax, b.ymax)
    }
}

/// Parameters of one field on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub param_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<FieldValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_values: Vec<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<FieldValue>,
    pub start_inclusive: bool,
    pub end_inclusive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bounds: Vec<WireBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_bag: Option<MultiPolygon<f64>>,
}

impl QueryParams {
    fn named(name: &str) -> Self {
        Self {
            param_name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Wire message for a whole filter.
pub type WireFilter = BTreeMap<String, QueryParams>;

impl QueryFilter {
    pub fn to_wire(&self) -> WireFilter {
        let mut wire = WireFilter::new();

        for (field, predicate) in self.predicates() {
            if !predicate.is_active() {
                continue;
            }
            let mut params = QueryParams::named(field);
            match predicate {
                Predicate::Scalar(p) => {
                    params.values = p.included().to_vec();
                    params.excluded_values = p.excluded().to_vec();
                    let range = p.range();
                    params.start = range.start.clone();
                    params.start_inclusive = range.start_inclusive;
                    params.end = range.end.clone();
                    params.end_inclusive = range.end_inclusive;
                }
                Predicate::Envelope(p) => {
                    params.bounds = p.boxes().iter().map(WireBounds::from).collect();
                }
            }
            wire.insert(field.to_string(), params);
        }

        if let Some(sort) = self.explicit_sort() {
            wire.entry(sort.field.clone())
                .or_insert_with(|| QueryParams::named(&sort.field))
                .sort_direction = Some(sort.direction);
        }

        if let Some(aoi) = self.aoi() {
            let mut params = QueryParams::named(GEOMETRY_BAG_FIELD);
            params.geometry_bag = Some(aoi.clone());
            wire.insert(GEOMETRY_BAG_FIELD.to_string(), params);
        }

        wire
    }

    pub fn from_wire(wire: &WireFilter) -> LandsatResult<QueryFilter> {
        let mut filter = QueryFilter::default();

        for (field, params) in wire {
            if let Some(direction) = params.sort_direction {
                validate_field(field)?;
                filter.sort = Some(Sort {
                    field: field.clone(),
                    direction,
                });
            }

            if field == GEOMETRY_BAG_FIELD {
                filter.aoi = params.geometry_bag.clone();
                continue;
            }

            if field == BOUNDS_FIELD {
                let mut envelope = EnvelopePredicate::new();
                for b in &params.bounds {
                    envelope.add(BoundingBox::from(b))?;
                }
                if envelope.is_active() {
                    filter
                        .predicates
                        .insert(field.clone(), Predicate::Envelope(envelope));
                }
                continue;
            }

            validate_field(field)?;
            let mut predicate = ScalarPredicate::new(field.as_str());
            params
                .values
                .iter()
                .for_each(|v| predicate.set_value(v.clone()));
            params
                .excluded_values
                .iter()
                .for_each(|v| predicate.set_not_value(v.clone()));
            let range = Range::new(
                params.start.clone(),
                params.start_inclusive,
                params.end.clone(),
                params.end_inclusive,
            );
            if range.is_set() {
                predicate.set_range(range)?;
            }

            if predicate.is_active() {
                filter
                    .predicates
                    .insert(field.clone(), Predicate::Scalar(predicate));
            }
        }

        Ok(filter)
    }

    pub fn to_wire_json(&self) -> LandsatResult<String> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }

    pub fn from_wire_json(json: &str) -> LandsatResult<QueryFilter> {
        let wire: WireFilter = serde_json::from_str(json)
            .map_err(|e| LandsatError::Serialization(format!("invalid filter message: {}", e)))?;
        QueryFilter::from_wire(&wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_only_entry() {
        let filter = QueryFilter::builder()
            .sort_by("cloud_cover", SortDirection::Asc)
            .build()
            .unwrap();
        let wire = filter.to_wire();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire["cloud_cover"].sort_direction, Some(SortDirection::Asc));
        assert_eq!(QueryFilter::from_wire(&wire).unwrap(), filter);
    }

    #[test]
    fn test_wire_bounds_rejects_antimeridian() {
        let mut wire = WireFilter::new();
        let mut params = QueryParams::named(BOUNDS_FIELD);
        params.bounds.push(WireBounds {
            xmin: 179.0,
            ymin: 0.0,
            xmax: -179.0,
            ymax: 1.0,
        });
        wire.insert(BOUNDS_FIELD.to_string(), params);

        assert!(matches!(
            QueryFilter::from_wire(&wire),
            Err(LandsatError::CrossesAntimeridian { .. })
        ));
    }
}
