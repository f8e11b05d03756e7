//! Item flattening: one raw item in, one flat row out.
//!
//! [`flatten`] builds the map-ready record with nested `assets` and `links`.
//! [`flatten_ard`] builds the analysis-ready row with one column per asset.

use serde_json::Value as JsonValue;

use crate::assets::{resolve_assets, split_item_url};
use crate::error::ItemError;
use crate::extract::{extract_bbox, extract_datetime_range};
use crate::links::resolve_links;
use crate::providers::ProviderRules;
use crate::types::{FlatRecord, RawItem};
use crate::value::{Mapping, Value, normalize, normalize_mapping};

/// Column holding the public URL of the item in analysis-ready rows.
pub const STAC_ITEM_URL: &str = "stac_item_url";

/// How analysis-ready rows name and fill their asset columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArdAssetNaming {
    /// `asset_<key>` holding the asset's href
    ByKey,
    /// `asset_<title>` holding the item directory joined with the asset key
    ByTitle,
}

/// Flattens a raw item into a [`FlatRecord`].
///
/// The provider name selects the asset and link rules; unknown names use the
/// default rules.
///
/// # Errors
///
/// Returns an [`ItemError`] if the item has no geometry or its bounds or
/// datetimes cannot be extracted. Assets and links whose href cannot be
/// resolved are left out of the record.
pub fn flatten(raw: &RawItem, item_url: &str, provider: &str) -> Result<FlatRecord, ItemError> {
    let rules = ProviderRules::for_name(provider);

    let properties = normalize_mapping(Mapping::from(raw.properties.clone()));
    let geometry = raw
        .geometry
        .clone()
        .ok_or_else(|| ItemError::MissingGeometry {
            item: raw.id.clone(),
        })?;
    let bbox = extract_bbox(&geometry, raw.bbox.as_ref())?;
    let (start_datetime, end_datetime) = extract_datetime_range(&properties)?;
    let assets = resolve_assets(&raw.assets, item_url, &rules.assets);
    let links = resolve_links(&raw.links, item_url, &rules.links);

    Ok(FlatRecord {
        id: raw.id.clone(),
        geometry,
        bbox,
        start_datetime,
        end_datetime,
        provider: provider.to_string(),
        assets,
        links,
        properties,
    })
}

/// Flattens a raw item into an analysis-ready row.
///
/// The row starts with `id`, `geometry` and `stac_item_url`, followed by the
/// promoted properties and one `asset_<name>` column per asset.
///
/// # Errors
///
/// Returns [`ItemError::MissingGeometry`] if the item has no geometry.
pub fn flatten_ard(raw: &RawItem, item_url: &str, provider: &str) -> Result<Mapping, ItemError> {
    let rules = ProviderRules::for_name(provider);
    let geometry = raw
        .geometry
        .clone()
        .ok_or_else(|| ItemError::MissingGeometry {
            item: raw.id.clone(),
        })?;

    let mut row = Mapping::with_capacity(raw.properties.len() + 3);
    row.insert("id", Value::from(raw.id.clone()));
    row.insert("geometry", Value::Geometry(geometry));
    row.insert(STAC_ITEM_URL, Value::from(item_url));

    for (key, value) in normalize_mapping(Mapping::from(raw.properties.clone())) {
        if row.contains_key(&key) {
            continue;
        }
        row.insert(key, value);
    }

    if let JsonValue::Object(assets) = &raw.assets {
        let (directory, _) = split_item_url(item_url);
        for (key, asset) in assets {
            let Some(asset) = asset.as_object() else {
                continue;
            };
            match rules.ard_assets {
                ArdAssetNaming::ByTitle => {
                    let Some(title) = asset.get("title").and_then(JsonValue::as_str) else {
                        continue;
                    };
                    if title.is_empty() {
                        continue;
                    }
                    let column = format!("asset_{}", title.replace(['-', '.'], "_").to_lowercase());
                    row.insert(column, Value::String(format!("{directory}{key}")));
                },
                ArdAssetNaming::ByKey => {
                    let column = format!("asset_{}", key.replace('-', "_"));
                    let href = asset
                        .get("href")
                        .cloned()
                        .map_or(Value::Null, |href| normalize(Value::from(href)));
                    row.insert(column, href);
                },
            }
        }
    }
    Ok(row)
}
