//! Field extractors: bounding box and temporal range of an item.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use crate::error::ItemError;
use crate::geometry::geometry_bounds;
use crate::types::Bbox;
use crate::value::{Mapping, Value};

/// Naive layouts accepted after RFC 3339, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset layouts not covered by RFC 3339 (e.g. `+0000`).
const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Resolves the bounding box of an item.
///
/// An explicit item-level bbox with at least four numeric components is trusted
/// and returned verbatim from its first four entries. Otherwise the bounds are
/// computed from the geometry as `(minx, miny, maxx, maxy)`.
///
/// # Errors
///
/// Returns [`ItemError::EmptyGeometry`] if the bbox has to be computed and the
/// geometry holds no positions.
pub fn extract_bbox(
    geometry: &geojson::Geometry,
    explicit_bbox: Option<&JsonValue>,
) -> Result<Bbox, ItemError> {
    if let Some(bbox) = explicit_bbox.and_then(explicit_bounds) {
        return Ok(bbox);
    }
    geometry_bounds(geometry).ok_or(ItemError::EmptyGeometry)
}

fn explicit_bounds(value: &JsonValue) -> Option<Bbox> {
    let components = value.as_array()?;
    if components.len() < 4 {
        return None;
    }
    let n = components
        .iter()
        .take(4)
        .map(JsonValue::as_f64)
        .collect::<Option<Vec<f64>>>()?;
    Some(Bbox {
        xmin: n[0],
        ymin: n[1],
        xmax: n[2],
        ymax: n[3],
    })
}

/// Start and end instants of an item.
pub type DatetimeRange = (Option<DateTime<Utc>>, Option<DateTime<Utc>>);

/// Resolves `(start, end)` from the item properties.
///
/// `start` is `start_datetime`, falling back to `datetime`; `end` is
/// `end_datetime`, falling back to `start`. Absent, `null` and empty values are
/// skipped. With no source at all both ends are `None`.
///
/// # Errors
///
/// Returns [`ItemError::InvalidDatetime`] if a present value cannot be parsed.
pub fn extract_datetime_range(properties: &Mapping) -> Result<DatetimeRange, ItemError> {
    let start = first_present(properties, &["start_datetime", "datetime"])
        .map(|(field, value)| datetime_value(field, value))
        .transpose()?;
    let end = match first_present(properties, &["end_datetime"]) {
        Some((field, value)) => Some(datetime_value(field, value)?),
        None => start,
    };
    Ok((start, end))
}

fn first_present<'a>(
    properties: &'a Mapping,
    fields: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    fields.iter().find_map(|&field| match properties.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some((field, value)),
    })
}

fn datetime_value(field: &str, value: &Value) -> Result<DateTime<Utc>, ItemError> {
    let parsed = match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::String(text) => parse_datetime(text),
        _ => None,
    };
    parsed.ok_or_else(|| ItemError::InvalidDatetime {
        field: field.to_string(),
        value: value.to_json_string(),
    })
}

/// Parses a datetime in any of the layouts providers publish.
///
/// Accepts RFC 3339 (with `Z` or an offset, converted to UTC), offsets without
/// a colon, naive date-times (taken as UTC) and bare dates (midnight UTC).
#[must_use]
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
