//! Provider cleaning rules and output partitioning.
//!
//! Cleaning runs once per provider on the unified batch. Rules read composite
//! values either natively or from the JSON text the unifier produced.

use std::collections::BTreeMap;

use log::debug;

use crate::batch::Batch;
use crate::unify::encode_composite;
use crate::value::{Value, normalize};

/// Splits a sequence column into one scalar column per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitColumn {
    pub source: &'static str,
    /// Target column for each position, in order
    pub targets: &'static [&'static str],
}

/// Replaces mapping values of a column with one of their fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarField {
    pub column: &'static str,
    pub field: &'static str,
}

/// Column whose string value partitions the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupKey {
    pub column: &'static str,
    /// Group label for rows where the column is `null`
    pub missing: &'static str,
}

/// The column-level rules of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningRules {
    pub drop_columns: &'static [&'static str],
    pub split_columns: &'static [SplitColumn],
    pub scalar_fields: &'static [ScalarField],
    pub group_by: Option<GroupKey>,
}

impl CleaningRules {
    pub const DEFAULT: CleaningRules = CleaningRules {
        drop_columns: &[],
        split_columns: &[],
        scalar_fields: &[],
        group_by: None,
    };
}

/// Applies the cleaning rules: drops, then splits, then scalar fields.
///
/// Rules naming a column the batch does not have are skipped.
pub fn clean(batch: &mut Batch, rules: &CleaningRules) {
    for &name in rules.drop_columns {
        if batch.drop_column(name).is_some() {
            debug!("Dropped column '{name}' from {} batch", batch.provider());
        }
    }

    for split in rules.split_columns {
        let Some(source) = batch.drop_column(split.source) else {
            continue;
        };
        for (position, &target) in split.targets.iter().enumerate() {
            let values = source
                .values
                .iter()
                .map(|value| {
                    decode_composite(value)
                        .and_then(|decoded| decoded.as_sequence()?.get(position).cloned())
                        .map_or(Value::Null, encode_composite)
                })
                .collect();
            batch.set_column(target, values);
        }
        debug!(
            "Split column '{}' into {}",
            split.source,
            split.targets.join(", ")
        );
    }

    for rule in rules.scalar_fields {
        let Some(column) = batch.column(rule.column) else {
            continue;
        };
        let values = column
            .values
            .iter()
            .map(|value| match decode_composite(value) {
                Some(Value::Mapping(mapping)) => mapping
                    .get(rule.field)
                    .cloned()
                    .map_or(Value::Null, encode_composite),
                _ => value.clone(),
            })
            .collect();
        batch.set_column(rule.column, values);
    }
}

/// Reads a composite value natively or from JSON text.
///
/// Returns `None` for scalars and for text that is not a JSON array or object.
#[must_use]
pub fn decode_composite(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim_start();
            if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
                return None;
            }
            let json: serde_json::Value = serde_json::from_str(text).ok()?;
            Some(normalize(Value::from(json)))
        },
        value if value.is_composite() => Some(normalize(value.clone())),
        _ => None,
    }
}

/// One persisted table: a provider's batch or one partition of it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGroup {
    pub name: String,
    pub batch: Batch,
}

/// Splits a cleaned batch into output groups.
///
/// With a grouping key, rows are grouped by the key's value (groups sorted by
/// value, `null` counted as the missing label) and the key column is removed
/// from every group, named `<provider>_<value>`. Otherwise the whole batch is
/// one group named after the provider. An empty batch yields no groups.
#[must_use]
pub fn partition(batch: Batch, rules: &CleaningRules) -> Vec<OutputGroup> {
    if batch.is_empty() {
        return Vec::new();
    }
    let provider = batch.provider().to_string();
    let Some(key) = rules.group_by else {
        return vec![OutputGroup {
            name: provider,
            batch,
        }];
    };

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let label = batch
            .column(key.column)
            .and_then(|c| c.values.get(row))
            .map_or_else(|| key.missing.to_string(), |v| group_label(v, key.missing));
        groups.entry(label).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(label, rows)| {
            let mut group = batch.select_rows(&rows);
            group.drop_column(key.column);
            OutputGroup {
                name: format!("{provider}_{label}"),
                batch: group,
            }
        })
        .collect()
}

fn group_label(value: &Value, missing: &str) -> String {
    match value {
        Value::Null => missing.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_json_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Provider;
    use crate::value::Mapping;
    use serde_json::json;

    fn batch(provider: &str, rows: serde_json::Value) -> Batch {
        let rows = rows
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| Value::from(r.clone()).as_mapping().cloned())
            .collect::<Vec<Mapping>>();
        Batch::from_rows(provider, rows)
    }

    fn values(batch: &Batch, name: &str) -> Vec<Value> {
        batch.column(name).unwrap().values.clone()
    }

    #[test]
    fn capella_rules_drop_and_split() {
        let mut b = batch(
            "capella",
            json!([
                {"id": "a", "proj:centroid": {"lat": 1}, "proj:shape": [100, 200]},
                {"id": "b", "proj:centroid": null, "proj:shape": "[300,400]"},
                {"id": "c", "proj:shape": [5]}
            ]),
        );
        clean(&mut b, &Provider::Capella.rules().cleaning);

        assert!(b.column("proj:centroid").is_none());
        assert!(b.column("proj:shape").is_none());
        assert_eq!(
            values(&b, "rows"),
            vec![Value::Int(100), Value::Int(300), Value::Int(5)]
        );
        assert_eq!(
            values(&b, "cols"),
            vec![Value::Int(200), Value::Int(400), Value::Null]
        );
    }

    #[test]
    fn iceye_rules_take_processor() {
        let mut b = batch(
            "iceye",
            json!([
                {"processing:software": {"processor": "ICEYE_P", "version": "1"}, "raster:bands": [{}]},
                {"processing:software": "{\"processor\":\"ICEYE_Q\"}"},
                {"processing:software": "legacy"},
                {"processing:software": null}
            ]),
        );
        clean(&mut b, &Provider::Iceye.rules().cleaning);

        assert!(b.column("raster:bands").is_none());
        assert_eq!(
            values(&b, "processing:software"),
            vec![
                Value::from("ICEYE_P"),
                Value::from("ICEYE_Q"),
                Value::from("legacy"),
                Value::Null
            ]
        );
    }

    #[test]
    fn umbra_rules_leave_columns() {
        let mut b = batch("umbra", json!([{"proj:shape": [1, 2], "proj:centroid": [0, 0]}]));
        let before = b.clone();
        clean(&mut b, &Provider::Umbra.rules().cleaning);
        assert_eq!(b, before);
    }

    #[test]
    fn partition_by_product_type() {
        let b = batch(
            "capella",
            json!([
                {"id": "1", "sar:product_type": "SLC"},
                {"id": "2", "sar:product_type": "GEO"},
                {"id": "3"},
                {"id": "4", "sar:product_type": "SLC"}
            ]),
        );
        let groups = partition(b, &Provider::Capella.rules().cleaning);

        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["capella_GEO", "capella_SLC", "capella_unknown"]);
        let slc = &groups[1].batch;
        assert_eq!(slc.num_rows(), 2);
        assert!(slc.column("sar:product_type").is_none());
        assert_eq!(values(slc, "id"), vec![Value::from("1"), Value::from("4")]);
    }

    #[test]
    fn partition_without_key_column_uses_missing_label() {
        let b = batch("capella", json!([{"id": "1"}]));
        let groups = partition(b, &Provider::Capella.rules().cleaning);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "capella_unknown");
    }

    #[test]
    fn partition_without_grouping_is_one_group() {
        let b = batch("iceye", json!([{"id": "1"}, {"id": "2"}]));
        let groups = partition(b, &CleaningRules::DEFAULT);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "iceye");
        assert_eq!(groups[0].batch.num_rows(), 2);
    }

    #[test]
    fn empty_batch_has_no_groups() {
        assert!(partition(Batch::new("iceye"), &CleaningRules::DEFAULT).is_empty());
    }

    #[test]
    fn decode_accepts_native_and_text() {
        assert_eq!(
            decode_composite(&Value::from("[1, 2]")),
            Some(Value::from(json!([1, 2])))
        );
        assert_eq!(decode_composite(&Value::from("[broken")), None);
        assert_eq!(decode_composite(&Value::from("plain")), None);
        assert_eq!(decode_composite(&Value::Int(3)), None);
        assert_eq!(
            decode_composite(&Value::Array(vec![1.0])),
            Some(Value::Sequence(vec![Value::Float(1.0)]))
        );
    }
}
