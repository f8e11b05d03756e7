//! Asset resolution: href repair, semantic key renaming and filtering.
//!
//! Every resolved asset is a mapping `{href, type, roles}` (plus `title` when
//! the href was rebuilt from it). Assets without a usable href are dropped
//! silently.

use std::collections::HashSet;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::links::resolve_href;
use crate::value::{Mapping, Value, normalize};

/// Longest sanitized key the fallback rule produces.
const MAX_KEY_LEN: usize = 50;

/// Maps a case-insensitive title pattern to the file suffix of the public asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleSuffix {
    pub pattern: &'static str,
    pub suffix: &'static str,
}

/// Title patterns in match order. The first matching pattern wins.
pub const TITLE_SUFFIXES: &[TitleSuffix] = &[
    TitleSuffix {
        pattern: "CSI-SIDD",
        suffix: "_CSI-SIDD.nitf",
    },
    TitleSuffix {
        pattern: "CSI",
        suffix: "_CSI.tif",
    },
    TitleSuffix {
        pattern: "SIDD",
        suffix: "_SIDD.nitf",
    },
    TitleSuffix {
        pattern: "SICD",
        suffix: "_SICD.nitf",
    },
    TitleSuffix {
        pattern: "GEC",
        suffix: "_GEC.tif",
    },
    TitleSuffix {
        pattern: "CPHD",
        suffix: "_CPHD.cphd",
    },
    TitleSuffix {
        pattern: "METADATA",
        suffix: "_METADATA.json",
    },
];

/// Condition a key descriptor is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    /// Descriptor contains the marker
    Contains(&'static str),
    /// Descriptor contains every marker
    ContainsAll(&'static [&'static str]),
    /// Descriptor stem (extension removed) ends with the marker
    StemEndsWith(&'static str),
    /// Descriptor extension is one of these
    Extension(&'static [&'static str]),
}

/// Name produced by a matching [`KeyRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    Fixed(&'static str),
    /// The base name, with `_mm` appended when the stem ends in `_MM`
    Product(&'static str),
    /// The sanitized stem
    Stem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRule {
    pub matcher: KeyMatch,
    pub name: KeyName,
}

/// Key classification rules in match order.
pub const KEY_RULES: &[KeyRule] = &[
    KeyRule {
        matcher: KeyMatch::Contains("STAC"),
        name: KeyName::Fixed("stac_metadata"),
    },
    KeyRule {
        matcher: KeyMatch::Contains("ANALYSIS"),
        name: KeyName::Fixed("analysis_metadata"),
    },
    KeyRule {
        matcher: KeyMatch::ContainsAll(&["CSI", "SIDD"]),
        name: KeyName::Fixed("csi_sidd"),
    },
    KeyRule {
        matcher: KeyMatch::Contains("CSI"),
        name: KeyName::Product("csi"),
    },
    KeyRule {
        matcher: KeyMatch::Contains("SICD"),
        name: KeyName::Product("sicd"),
    },
    KeyRule {
        matcher: KeyMatch::Contains("SIDD"),
        name: KeyName::Product("sidd"),
    },
    KeyRule {
        matcher: KeyMatch::StemEndsWith("MM"),
        name: KeyName::Stem,
    },
    KeyRule {
        matcher: KeyMatch::Extension(&["json"]),
        name: KeyName::Fixed("metadata"),
    },
    KeyRule {
        matcher: KeyMatch::Extension(&["parquet"]),
        name: KeyName::Fixed("raw_data"),
    },
    KeyRule {
        matcher: KeyMatch::Extension(&["cphd"]),
        name: KeyName::Fixed("cphd"),
    },
    KeyRule {
        matcher: KeyMatch::Extension(&["zip"]),
        name: KeyName::Fixed("archive"),
    },
    KeyRule {
        matcher: KeyMatch::Extension(&["tif", "tiff"]),
        name: KeyName::Fixed("geotiff"),
    },
    KeyRule {
        matcher: KeyMatch::Extension(&["nitf", "ntf"]),
        name: KeyName::Fixed("nitf"),
    },
    KeyRule {
        matcher: KeyMatch::Extension(&["xml"]),
        name: KeyName::Fixed("metadata_xml"),
    },
];

/// Asset handling rules for a provider. `None` disables a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRules {
    /// Rebuild hrefs from titles and drop assets with unknown titles
    pub href_repair: Option<&'static [TitleSuffix]>,
    /// Replace machine-generated keys with semantic names
    pub key_renaming: Option<&'static [KeyRule]>,
}

impl AssetRules {
    pub const DEFAULT: AssetRules = AssetRules {
        href_repair: None,
        key_renaming: None,
    };
}

/// Resolves the raw `assets` member of an item.
///
/// Href repair runs first on the original keys, key renaming second on the
/// result. A missing or non-object member yields an empty mapping.
#[must_use]
pub fn resolve_assets(raw: &JsonValue, item_url: &str, rules: &AssetRules) -> Mapping {
    let Some(object) = raw.as_object() else {
        return Mapping::new();
    };
    let assets = match rules.href_repair {
        Some(table) => repair_asset_hrefs(object, item_url, table),
        None => compact_assets(object, item_url),
    };
    match rules.key_renaming {
        Some(table) => rename_asset_keys(assets, table),
        None => assets,
    }
}

/// Keeps every asset with a string href, resolved against the item URL.
///
/// Assets whose relative href cannot be resolved are dropped.
#[must_use]
pub fn compact_assets(object: &JsonMap<String, JsonValue>, item_url: &str) -> Mapping {
    let mut assets = Mapping::with_capacity(object.len());
    for (key, entry) in object {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let Some(href) = entry.get("href").and_then(JsonValue::as_str) else {
            continue;
        };
        let Some(href) = resolve_href(href, item_url) else {
            debug!("Dropping asset '{key}': cannot resolve '{href}' against '{item_url}'");
            continue;
        };
        assets.insert(key.clone(), Value::Mapping(asset_entry(href, entry, false)));
    }
    assets
}

/// Rebuilds each asset's public href from its title.
///
/// The href is the item URL directory, the item file stem and the suffix of
/// the first matching title pattern. Untitled and unmatched assets are dropped.
#[must_use]
pub fn repair_asset_hrefs(
    object: &JsonMap<String, JsonValue>,
    item_url: &str,
    table: &[TitleSuffix],
) -> Mapping {
    let (directory, file_name) = split_item_url(item_url);
    let stem = item_file_stem(file_name);

    let mut assets = Mapping::with_capacity(object.len());
    for (key, entry) in object {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let Some(title) = entry.get("title").and_then(JsonValue::as_str) else {
            continue;
        };
        let Some(rule) = match_title(title, table) else {
            continue;
        };
        let href = format!("{directory}{stem}{}", rule.suffix);
        assets.insert(key.clone(), Value::Mapping(asset_entry(href, entry, true)));
    }
    assets
}

fn match_title<'a>(title: &str, table: &'a [TitleSuffix]) -> Option<&'a TitleSuffix> {
    let title = title.to_ascii_uppercase();
    table.iter().find(|rule| title.contains(rule.pattern))
}

fn asset_entry(href: String, entry: &JsonMap<String, JsonValue>, keep_title: bool) -> Mapping {
    let member = |name: &str| {
        entry
            .get(name)
            .cloned()
            .map_or(Value::Null, |v| normalize(Value::from(v)))
    };
    let mut asset = Mapping::with_capacity(4);
    asset.insert("href", Value::String(href));
    asset.insert("type", member("type"));
    asset.insert("roles", member("roles"));
    if keep_title {
        asset.insert("title", member("title"));
    }
    asset
}

/// Renames every asset key with [`semantic_asset_key`].
///
/// Keys that classify to an already used name get `_2`, `_3`, ... appended so
/// no asset is lost.
#[must_use]
pub fn rename_asset_keys(assets: Mapping, table: &[KeyRule]) -> Mapping {
    let mut used = HashSet::with_capacity(assets.len());
    let mut renamed = Mapping::with_capacity(assets.len());
    for (key, asset) in assets {
        let base = semantic_asset_key(&key, table);
        let mut name = base.clone();
        let mut n = 2;
        while used.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        used.insert(name.clone());
        renamed.insert(name, asset);
    }
    renamed
}

fn timestamp_prefix() -> &'static Regex {
    static TIMESTAMP_PREFIX: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP_PREFIX.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}_").expect("valid timestamp regex")
    })
}

fn satellite_segment() -> &'static Regex {
    static SATELLITE_SEGMENT: OnceLock<Regex> = OnceLock::new();
    SATELLITE_SEGMENT
        .get_or_init(|| Regex::new(r"(?i)^UMBRA-\d+_").expect("valid satellite regex"))
}

/// Derives a semantic name from a machine-generated asset key.
///
/// The timestamp prefix and satellite segment are stripped, then the remaining
/// descriptor is classified with the first matching rule. Without a match the
/// sanitized descriptor is used.
///
/// ```
/// use sarstac_core::assets::{KEY_RULES, semantic_asset_key};
///
/// assert_eq!(
///     semantic_asset_key("2025-06-22-23-57-52_UMBRA-10_CSI_MM.tif", KEY_RULES),
///     "csi_mm"
/// );
/// ```
#[must_use]
pub fn semantic_asset_key(key: &str, table: &[KeyRule]) -> String {
    let descriptor = timestamp_prefix().replace(key, "");
    let descriptor = satellite_segment().replace(&descriptor, "");
    let upper = descriptor.to_ascii_uppercase();
    let (stem, extension) = match upper.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (upper.as_str(), None),
    };

    for rule in table {
        let matched = match rule.matcher {
            KeyMatch::Contains(marker) => upper.contains(marker),
            KeyMatch::ContainsAll(markers) => markers.iter().all(|m| upper.contains(m)),
            KeyMatch::StemEndsWith(marker) => stem.ends_with(marker),
            KeyMatch::Extension(extensions) => {
                extension.is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
            },
        };
        if !matched {
            continue;
        }
        return match rule.name {
            KeyName::Fixed(name) => name.to_string(),
            KeyName::Product(base) if stem.ends_with("_MM") => format!("{base}_mm"),
            KeyName::Product(base) => base.to_string(),
            KeyName::Stem => sanitize_key(stem),
        };
    }
    sanitize_key(&descriptor)
}

/// Lowercases, collapses runs of non-alphanumerics into `_` and trims the
/// result to at most 50 characters.
#[must_use]
pub fn sanitize_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
        } else if !key.is_empty() && !key.ends_with('_') {
            key.push('_');
        }
    }
    key.truncate(MAX_KEY_LEN);
    let key = key.trim_end_matches('_');
    if key.is_empty() {
        "asset".to_string()
    } else {
        key.to_string()
    }
}

/// Splits an item URL into its directory (with trailing `/`) and file name.
pub(crate) fn split_item_url(item_url: &str) -> (&str, &str) {
    match item_url.rfind('/') {
        Some(index) => item_url.split_at(index + 1),
        None => ("", item_url),
    }
}

/// Item file name without its `.stac.v2.json` or `.json` extension.
pub(crate) fn item_file_stem(file_name: &str) -> &str {
    file_name
        .strip_suffix(".stac.v2.json")
        .or_else(|| file_name.strip_suffix(".json"))
        .unwrap_or(file_name)
}
