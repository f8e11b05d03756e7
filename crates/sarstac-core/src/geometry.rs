//! `GeoJSON` geometry helpers: bounds and dimensionality.

use geojson::Value as GeometryValue;

use crate::types::Bbox;

/// Axis-aligned bounds `(minx, miny, maxx, maxy)` over every position of the
/// geometry, geometry collections included.
///
/// Returns `None` when the geometry holds no position with at least two
/// ordinates.
#[must_use]
pub fn geometry_bounds(geometry: &geojson::Geometry) -> Option<Bbox> {
    let mut bounds: Option<Bbox> = None;
    visit_positions(&geometry.value, &mut |position: &[f64]| {
        let [x, y, ..] = *position else {
            return;
        };
        bounds = Some(match bounds {
            None => Bbox {
                xmin: x,
                ymin: y,
                xmax: x,
                ymax: y,
            },
            Some(b) => Bbox {
                xmin: b.xmin.min(x),
                ymin: b.ymin.min(y),
                xmax: b.xmax.max(x),
                ymax: b.ymax.max(y),
            },
        });
    });
    bounds
}

/// Drops every ordinate beyond the second, including from geometry-level
/// bounding boxes.
pub fn force_2d(geometry: &mut geojson::Geometry) {
    if let Some(bbox) = geometry.bbox.as_mut()
        && bbox.len() >= 6
    {
        *bbox = vec![bbox[0], bbox[1], bbox[3], bbox[4]];
    }
    match &mut geometry.value {
        GeometryValue::GeometryCollection(members) => members.iter_mut().for_each(force_2d),
        value => visit_positions_mut(value, &mut |position: &mut Vec<f64>| position.truncate(2)),
    }
}

/// Returns `true` when any position carries more than two ordinates.
#[must_use]
pub fn has_z(geometry: &geojson::Geometry) -> bool {
    let mut found = false;
    visit_positions(&geometry.value, &mut |position: &[f64]| {
        found |= position.len() > 2;
    });
    found
}

fn visit_positions<F: FnMut(&[f64])>(value: &GeometryValue, f: &mut F) {
    match value {
        GeometryValue::Point(position) => f(position.as_slice()),
        GeometryValue::MultiPoint(positions) | GeometryValue::LineString(positions) => {
            positions.iter().for_each(|p| f(p.as_slice()));
        },
        GeometryValue::MultiLineString(lines) | GeometryValue::Polygon(lines) => {
            lines.iter().flatten().for_each(|p| f(p.as_slice()));
        },
        GeometryValue::MultiPolygon(polygons) => {
            polygons
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| f(p.as_slice()));
        },
        GeometryValue::GeometryCollection(members) => {
            for member in members {
                visit_positions(&member.value, f);
            }
        },
    }
}

fn visit_positions_mut<F: FnMut(&mut Vec<f64>)>(value: &mut GeometryValue, f: &mut F) {
    match value {
        GeometryValue::Point(position) => f(position),
        GeometryValue::MultiPoint(positions) | GeometryValue::LineString(positions) => {
            positions.iter_mut().for_each(|p| f(p));
        },
        GeometryValue::MultiLineString(lines) | GeometryValue::Polygon(lines) => {
            lines.iter_mut().flatten().for_each(|p| f(p));
        },
        GeometryValue::MultiPolygon(polygons) => {
            polygons
                .iter_mut()
                .flatten()
                .flatten()
                .for_each(|p| f(p));
        },
        GeometryValue::GeometryCollection(members) => {
            for member in members {
                visit_positions_mut(&mut member.value, f);
            }
        },
    }
}
