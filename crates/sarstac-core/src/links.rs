//! Link resolution.
//!
//! By default every link is kept with its href resolved against the item URL.
//! Providers whose catalogs publish links to documents that do not resolve get
//! the repair rules: broken relations are dropped and exactly one `self` link,
//! pointing at the item's public URL, is guaranteed.

use log::debug;
use serde_json::Value as JsonValue;
use url::Url;

use crate::value::{Mapping, Value, normalize_mapping};

/// Relations known to point at documents that do not resolve.
pub const BROKEN_RELS: &[&str] = &["collection", "parent"];

/// Media type given to a pinned `self` link that has none.
pub const DEFAULT_SELF_TYPE: &str = "application/json";

/// Link handling rules for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRules {
    /// Relations to drop
    pub broken_rels: &'static [&'static str],
    /// Rewrite (or add) exactly one `self` link pointing at the item URL
    pub pin_self: bool,
}

impl LinkRules {
    pub const DEFAULT: LinkRules = LinkRules {
        broken_rels: &[],
        pin_self: false,
    };
}

/// Returns `true` for hrefs that are used as published.
#[must_use]
pub fn is_absolute_href(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    ["http://", "https://", "s3://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Resolves `href` against the item URL unless it is already absolute.
///
/// Returns `None` when a relative href needs resolving and the item URL cannot
/// act as a base.
#[must_use]
pub fn resolve_href(href: &str, item_url: &str) -> Option<String> {
    if is_absolute_href(href) {
        return Some(href.to_string());
    }
    let base = Url::parse(item_url).ok()?;
    base.join(href).ok().map(String::from)
}

/// Resolves the raw `links` member of an item.
///
/// Entries that are not objects are skipped, as are links whose relative href
/// cannot be resolved. A missing or non-array member is treated as an empty
/// list, so the repair rules still add a `self` link.
#[must_use]
pub fn resolve_links(raw: &JsonValue, item_url: &str, rules: &LinkRules) -> Vec<Value> {
    let entries = raw.as_array().map_or(&[][..], Vec::as_slice);
    let mut links = Vec::with_capacity(entries.len() + 1);
    let mut has_self = false;

    for entry in entries {
        let JsonValue::Object(object) = entry else {
            continue;
        };
        let mut link = normalize_mapping(Mapping::from(object.clone()));
        let rel = link.get("rel").and_then(Value::as_str).map(str::to_owned);

        if let Some(rel) = rel.as_deref()
            && rules.broken_rels.contains(&rel)
        {
            continue;
        }

        if rules.pin_self && rel.as_deref() == Some("self") {
            if has_self {
                continue;
            }
            has_self = true;
            link.insert("href", Value::from(item_url));
            if link.get("type").is_none_or(Value::is_null) {
                link.insert("type", Value::from(DEFAULT_SELF_TYPE));
            }
            links.push(Value::Mapping(link));
            continue;
        }

        if let Some(href) = link.get("href").and_then(Value::as_str) {
            let Some(resolved) = resolve_href(href, item_url) else {
                debug!("Dropping link '{href}': cannot resolve against '{item_url}'");
                continue;
            };
            link.insert("href", Value::String(resolved));
        }
        links.push(Value::Mapping(link));
    }

    if rules.pin_self && !has_self {
        links.push(Value::Mapping(self_link(item_url)));
    }
    links
}

fn self_link(item_url: &str) -> Mapping {
    let mut link = Mapping::with_capacity(3);
    link.insert("rel", Value::from("self"));
    link.insert("href", Value::from(item_url));
    link.insert("type", Value::from(DEFAULT_SELF_TYPE));
    link
}
