//! Splitting geographic geometries at the antimeridian.
//!
//! A ring is taken to cross ±180° when consecutive vertices jump by more than
//! 180° of longitude and the ring, read literally, winds clockwise. Exterior
//! rings wind counter-clockwise, so a clockwise reading means the short way
//! round was intended. A counter-clockwise ring is kept as drawn, however wide.
//!
//! A crossing ring is first unwrapped into a continuous longitude
//! range (possibly beyond ±180), then cut against the three world copies
//! `[-540, -180]`, `[-180, 180]` and `[180, 540]`, and each piece shifted back
//! into `[-180, 180]`.

use geo::winding_order::WindingOrder;
use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon, Rect, Winding};
use landsat_common::BoundingBox;

/// Longitude jump between consecutive vertices treated as a wrap.
const WRAP_THRESHOLD: f64 = 180.0;

/// Split a polygon into parts that do not cross the antimeridian.
pub fn split_by_dateline(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    if !crosses_dateline(polygon.exterior()) {
        return MultiPolygon(vec![polygon.clone()]);
    }

    let exterior = unwrap_ring(polygon.exterior(), None);
    let (min_lon, max_lon) = lon_extent(&exterior);

    if min_lon >= -180.0 && max_lon <= 180.0 {
        return MultiPolygon(vec![polygon.clone()]);
    }

    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| unwrap_ring(ring, Some((min_lon, max_lon))))
        .collect();
    let unwrapped = Polygon::new(exterior, interiors);

    let mut parts = Vec::new();
    for shift in [-360.0, 0.0, 360.0] {
        let window = Rect::new(
            Coord {
                x: -180.0 + shift,
                y: -90.0,
            },
            Coord {
                x: 180.0 + shift,
                y: 90.0,
            },
        )
        .to_polygon();

        let piece = unwrapped.intersection(&window);
        for part in piece.0 {
            parts.push(shift_polygon(&part, -shift));
        }
    }

    MultiPolygon(parts)
}

/// Split every member of a multipolygon.
pub fn split_multi_by_dateline(multi: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon(
        multi
            .0
            .iter()
            .flat_map(|polygon| split_by_dateline(polygon).0)
            .collect(),
    )
}

/// Split an envelope whose west edge lies east of its east edge.
pub fn split_envelope(bbox: &BoundingBox) -> Vec<BoundingBox> {
    if !bbox.crosses_antimeridian() {
        return vec![*bbox];
    }
    vec![
        BoundingBox::new(bbox.min_x, bbox.min_y, 180.0, bbox.max_y),
        BoundingBox::new(-180.0, bbox.min_y, bbox.max_x, bbox.max_y),
    ]
}

/// Whether an exterior ring takes the short way across ±180°.
pub fn crosses_dateline(ring: &LineString<f64>) -> bool {
    let wraps = ring
        .0
        .windows(2)
        .any(|pair| (pair[1].x - pair[0].x).abs() > WRAP_THRESHOLD);
    wraps && ring.winding_order() == Some(WindingOrder::Clockwise)
}

/// Remove longitude jumps so consecutive vertices differ by at most 180°.
///
/// With `reference`, the whole ring is moved by a multiple of 360° so that its
/// first vertex lands inside the reference longitude range.
fn unwrap_ring(ring: &LineString<f64>, reference: Option<(f64, f64)>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    let mut offset = 0.0;
    let mut previous: Option<f64> = None;

    for coord in &ring.0 {
        if let Some(prev) = previous {
            let delta = coord.x - prev;
            if delta > WRAP_THRESHOLD {
                offset -= 360.0;
            } else if delta < -WRAP_THRESHOLD {
                offset += 360.0;
            }
        }
        previous = Some(coord.x);
        coords.push(Coord {
            x: coord.x + offset,
            y: coord.y,
        });
    }

    if let (Some((min_lon, max_lon)), Some(first)) = (reference, coords.first().copied()) {
        let mut shift = 0.0;
        while first.x + shift < min_lon {
            shift += 360.0;
        }
        while first.x + shift > max_lon {
            shift -= 360.0;
        }
        for coord in &mut coords {
            coord.x += shift;
        }
    }

    LineString(coords)
}

fn lon_extent(ring: &LineString<f64>) -> (f64, f64) {
    ring.0
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c.x), hi.max(c.x))
        })
}

fn shift_polygon(polygon: &Polygon<f64>, dx: f64) -> Polygon<f64> {
    let shift = |ring: &LineString<f64>| {
        LineString(
            ring.0
                .iter()
                .map(|c| Coord { x: c.x + dx, y: c.y })
                .collect(),
        )
    };
    Polygon::new(
        shift(polygon.exterior()),
        polygon.interiors().iter().map(shift).collect(),
    )
}
