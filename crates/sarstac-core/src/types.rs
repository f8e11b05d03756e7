//! Data types for STAC item normalization.
//!
//! This module defines the raw item as received from a provider, the bounding box
//! struct, the flat record produced by the flattener, and the output kinds.

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::{Map as JsonMap, Value as JsonValue, json};

use crate::error::ItemError;
use crate::value::{Mapping, Value};

/// Column names the flattener owns. Promoted properties never override them.
pub const RESERVED_KEYS: [&str; 8] = [
    "id",
    "geometry",
    "bbox",
    "start_datetime",
    "end_datetime",
    "provider",
    "assets",
    "links",
];

/// Axis-aligned bounding rectangle of an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bbox {
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        json!({
            "xmin": self.xmin,
            "ymin": self.ymin,
            "xmax": self.xmax,
            "ymax": self.ymax,
        })
    }

    /// Returns `true` when the box has a positive extent on both axes.
    #[must_use]
    pub fn is_proper(&self) -> bool {
        self.xmin < self.xmax && self.ymin < self.ymax
    }
}

/// A provider's metadata document, split into the members the pipeline reads.
#[derive(Debug, Clone)]
pub struct RawItem {
    /// Item identifier
    pub id: Option<String>,
    /// Footprint geometry, absent when the document carries none
    pub geometry: Option<geojson::Geometry>,
    /// Item-level bounding box exactly as published
    pub bbox: Option<JsonValue>,
    /// Provider properties
    pub properties: JsonMap<String, JsonValue>,
    /// Raw `assets` member (normally an object)
    pub assets: JsonValue,
    /// Raw `links` member (normally an array)
    pub links: JsonValue,
}

impl RawItem {
    /// Splits a parsed JSON document into a [`RawItem`].
    ///
    /// # Errors
    ///
    /// Returns an [`ItemError`] if the document is not an object, if its
    /// geometry is not valid `GeoJSON`, or if `properties` is not an object.
    pub fn from_json(document: JsonValue) -> Result<Self, ItemError> {
        let JsonValue::Object(mut object) = document else {
            return Err(ItemError::NotAnObject {
                found: json_kind(&document),
            });
        };

        let id = match object.remove("id") {
            Some(JsonValue::String(id)) => Some(id),
            Some(JsonValue::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        let geometry = match object.remove("geometry") {
            None | Some(JsonValue::Null) => None,
            Some(raw) => Some(serde_json::from_value::<geojson::Geometry>(raw).map_err(
                |err| ItemError::InvalidGeometry {
                    item: id.clone(),
                    message: err.to_string(),
                },
            )?),
        };

        let properties = match object.remove("properties") {
            None | Some(JsonValue::Null) => JsonMap::new(),
            Some(JsonValue::Object(properties)) => properties,
            Some(other) => {
                return Err(ItemError::InvalidProperties {
                    item: id,
                    found: json_kind(&other),
                });
            },
        };

        Ok(Self {
            id,
            geometry,
            bbox: object.remove("bbox").filter(|bbox| !bbox.is_null()),
            properties,
            assets: object.remove("assets").unwrap_or(JsonValue::Null),
            links: object.remove("links").unwrap_or(JsonValue::Null),
        })
    }

    /// Identifier for diagnostics.
    #[must_use]
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("<no id>")
    }
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// One normalized item, ready to become a row of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord {
    pub id: Option<String>,
    pub geometry: geojson::Geometry,
    pub bbox: Bbox,
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub provider: String,
    /// Resolved assets keyed by asset name
    pub assets: Mapping,
    /// Resolved links
    pub links: Vec<Value>,
    /// Promoted provider properties, without reserved keys
    pub properties: Mapping,
}

impl FlatRecord {
    /// Assembles the row: reserved keys first, then the promoted properties.
    ///
    /// A property sharing its name with a reserved key is discarded.
    #[must_use]
    pub fn into_row(self) -> Mapping {
        let mut row = Mapping::with_capacity(RESERVED_KEYS.len() + self.properties.len());
        row.insert("id", Value::from(self.id));
        row.insert("geometry", Value::Geometry(self.geometry));
        row.insert("bbox", Value::Bbox(self.bbox));
        row.insert(
            "start_datetime",
            self.start_datetime.map_or(Value::Null, Value::Timestamp),
        );
        row.insert(
            "end_datetime",
            self.end_datetime.map_or(Value::Null, Value::Timestamp),
        );
        row.insert("provider", Value::String(self.provider));

        for (key, value) in self.properties {
            if RESERVED_KEYS.contains(&key.as_str()) {
                debug!("Property '{key}' collides with a reserved column and is dropped");
                continue;
            }
            row.insert(key, value);
        }

        row.insert("assets", Value::Mapping(self.assets));
        row.insert("links", Value::Sequence(self.links));
        row
    }
}

/// The two tabular products built from every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Map-ready table with nested `assets` and `links` columns.
    Map,
    /// Analysis-ready table with one flat column per asset.
    Ard,
}

impl OutputKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Map => "map",
            OutputKind::Ard => "ard",
        }
    }

    #[must_use]
    pub fn all() -> [OutputKind; 2] {
        [OutputKind::Map, OutputKind::Ard]
    }
}
