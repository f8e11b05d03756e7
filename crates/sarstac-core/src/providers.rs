//! Provider registry and the rule tables each provider selects.
//!
//! Providers are a closed enumeration. Every provider-specific behavior of the
//! pipeline (asset repair, key renaming, link repair, column cleaning, output
//! partitioning) is looked up here as data, so the resolvers themselves stay
//! provider-agnostic and can be tested against the tables directly.
//!
//! # Examples
//!
//! ```
//! use sarstac_core::providers::{Provider, ProviderRules, find_provider};
//!
//! let umbra = find_provider("Umbra").expect("umbra is registered");
//! assert_eq!(umbra.provider, Provider::Umbra);
//! assert!(umbra.rules.links.pin_self);
//!
//! // Unknown names fall back to the default rules.
//! let rules = ProviderRules::for_name("sentinel-1");
//! assert!(rules.assets.href_repair.is_none());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::assets::{AssetRules, KEY_RULES, TITLE_SUFFIXES};
use crate::clean::{CleaningRules, GroupKey, ScalarField, SplitColumn};
use crate::error::{ProviderError, provider_not_found};
use crate::flatten::ArdAssetNaming;
use crate::links::{BROKEN_RELS, LinkRules};

/// A commercial SAR data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    Capella,
    Iceye,
    Umbra,
}

impl Provider {
    /// Every registered provider, in registry order.
    pub const ALL: [Provider; 3] = [Provider::Capella, Provider::Iceye, Provider::Umbra];

    /// Lowercase name used in output paths, the `provider` column and the CLI.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Capella => "capella",
            Provider::Iceye => "iceye",
            Provider::Umbra => "umbra",
        }
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
    }

    /// The rule set applied to this provider's items.
    #[must_use]
    pub fn rules(&self) -> ProviderRules {
        match self {
            Provider::Capella => ProviderRules {
                cleaning: CAPELLA_CLEANING,
                ..ProviderRules::DEFAULT
            },
            Provider::Iceye => ProviderRules {
                cleaning: ICEYE_CLEANING,
                ..ProviderRules::DEFAULT
            },
            Provider::Umbra => ProviderRules {
                assets: AssetRules {
                    href_repair: Some(TITLE_SUFFIXES),
                    key_renaming: Some(KEY_RULES),
                },
                links: LinkRules {
                    broken_rels: BROKEN_RELS,
                    pin_self: true,
                },
                ard_assets: ArdAssetNaming::ByTitle,
                ..ProviderRules::DEFAULT
            },
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| provider_not_found(s))
    }
}

const SHAPE_SPLIT: &[SplitColumn] = &[SplitColumn {
    source: "proj:shape",
    targets: &["rows", "cols"],
}];

const CAPELLA_CLEANING: CleaningRules = CleaningRules {
    drop_columns: &["proj:centroid"],
    split_columns: SHAPE_SPLIT,
    scalar_fields: &[],
    group_by: Some(GroupKey {
        column: "sar:product_type",
        missing: "unknown",
    }),
};

const ICEYE_CLEANING: CleaningRules = CleaningRules {
    drop_columns: &["proj:centroid", "raster:bands"],
    split_columns: SHAPE_SPLIT,
    scalar_fields: &[ScalarField {
        column: "processing:software",
        field: "processor",
    }],
    group_by: None,
};

/// The complete set of provider-specific rules.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRules {
    /// Asset href repair and key renaming tables
    pub assets: AssetRules,
    /// Link repair rules
    pub links: LinkRules,
    /// Column cleaning and partitioning rules
    pub cleaning: CleaningRules,
    /// How the analysis-ready table names its asset columns
    pub ard_assets: ArdAssetNaming,
}

impl ProviderRules {
    /// Rules for providers without special handling.
    pub const DEFAULT: ProviderRules = ProviderRules {
        assets: AssetRules::DEFAULT,
        links: LinkRules::DEFAULT,
        cleaning: CleaningRules::DEFAULT,
        ard_assets: ArdAssetNaming::ByKey,
    };

    /// Rules for a provider name, or [`ProviderRules::DEFAULT`] when the name
    /// is not registered.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        Provider::from_name(name).map_or(Self::DEFAULT, |p| p.rules())
    }
}

/// Registry entry describing a provider and its public catalog.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub provider: Provider,
    /// Descriptive name for display purposes
    pub long_name: &'static str,
    /// Entry point of the provider's public STAC catalog
    pub catalog: &'static str,
    pub rules: ProviderRules,
}

impl ProviderSpec {
    /// Short summary of the asset rules, for display.
    #[must_use]
    pub fn asset_rules_label(&self) -> String {
        let assets = &self.rules.assets;
        let mut parts = Vec::new();
        if assets.href_repair.is_some() {
            parts.push("href repair");
        }
        if assets.key_renaming.is_some() {
            parts.push("key renaming");
        }
        if parts.is_empty() {
            "default".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Short summary of the link rules, for display.
    #[must_use]
    pub fn link_rules_label(&self) -> String {
        let links = &self.rules.links;
        if links.pin_self || !links.broken_rels.is_empty() {
            format!("pin self, drop {}", links.broken_rels.join("/"))
        } else {
            "default".to_string()
        }
    }

    /// The column used to split output files, if any.
    #[must_use]
    pub fn partition_label(&self) -> &'static str {
        self.rules
            .cleaning
            .group_by
            .map_or("-", |group| group.column)
    }
}

/// Returns the complete provider registry.
#[must_use]
pub fn get_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec {
            provider: Provider::Capella,
            long_name: "Capella Space Open Data",
            catalog: "https://capella-open-data.s3.us-west-2.amazonaws.com/stac/capella-open-data-by-product-type/catalog.json",
            rules: Provider::Capella.rules(),
        },
        ProviderSpec {
            provider: Provider::Iceye,
            long_name: "ICEYE Open Data",
            catalog: "https://iceye-open-data-catalog.s3-us-west-2.amazonaws.com/collections/iceye-sar.json",
            rules: Provider::Iceye.rules(),
        },
        ProviderSpec {
            provider: Provider::Umbra,
            long_name: "Umbra Open Data",
            catalog: "s3://umbra-open-data-catalog/sar-data/",
            rules: Provider::Umbra.rules(),
        },
    ]
}

/// Finds a provider by name, ignoring case.
#[must_use]
pub fn find_provider(name: &str) -> Option<ProviderSpec> {
    let provider = Provider::from_name(name)?;
    get_providers().into_iter().find(|p| p.provider == provider)
}

/// Returns the names of all registered providers.
#[must_use]
pub fn get_provider_names() -> Vec<&'static str> {
    Provider::ALL.iter().map(Provider::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_provider() {
        let provider = find_provider("iceye").unwrap();
        assert_eq!(provider.provider, Provider::Iceye);
        assert!(find_provider("sentinel").is_none());
    }

    #[test]
    fn test_find_provider_case_insensitive() {
        assert_eq!(
            find_provider(" CAPELLA ").map(|p| p.provider),
            Some(Provider::Capella)
        );
    }

    #[test]
    fn test_from_str_reports_available() {
        let err = "nope".parse::<Provider>().unwrap_err();
        assert!(err.to_string().contains("capella, iceye, umbra"));
    }

    #[test]
    fn test_registry_matches_enum() {
        let names: Vec<_> = get_providers().iter().map(|p| p.provider.as_str()).collect();
        assert_eq!(names, get_provider_names());
    }

    #[test]
    fn test_only_umbra_repairs_assets_and_links() {
        for provider in Provider::ALL {
            let rules = provider.rules();
            let special = provider == Provider::Umbra;
            assert_eq!(rules.assets.href_repair.is_some(), special);
            assert_eq!(rules.assets.key_renaming.is_some(), special);
            assert_eq!(rules.links.pin_self, special);
        }
    }

    #[test]
    fn test_only_capella_partitions() {
        let partitioned: Vec<_> = get_providers()
            .into_iter()
            .filter(|p| p.rules.cleaning.group_by.is_some())
            .map(|p| p.provider)
            .collect();
        assert_eq!(partitioned, vec![Provider::Capella]);
    }

    #[test]
    fn test_unknown_name_uses_default_rules() {
        let rules = ProviderRules::for_name("sentinel");
        assert!(rules.assets.href_repair.is_none());
        assert!(rules.links.broken_rels.is_empty());
        assert!(rules.cleaning.drop_columns.is_empty());
        assert_eq!(rules.ard_assets, ArdAssetNaming::ByKey);
    }

    #[test]
    fn test_labels() {
        let umbra = find_provider("umbra").unwrap();
        assert_eq!(umbra.asset_rules_label(), "href repair, key renaming");
        assert_eq!(umbra.link_rules_label(), "pin self, drop collection/parent");
        let capella = find_provider("capella").unwrap();
        assert_eq!(capella.asset_rules_label(), "default");
        assert_eq!(capella.partition_label(), "sar:product_type");
    }
}
