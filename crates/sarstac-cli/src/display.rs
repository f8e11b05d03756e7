//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting provider runs and the provider registry in a human-readable format.

use tabled::{Table, Tabled};

use sarstac_core::operations::{ProviderOutcome, ProviderRun};
use sarstac_core::providers::ProviderSpec;
use sarstac_core::utils::describe_schema;

/// Table row representation for displaying a registered provider.
#[derive(Tabled)]
pub struct ProviderRow {
    /// Lowercase provider name accepted on the command line.
    #[tabled(rename = "Name")]
    pub name: String,
    /// Full descriptive name of the provider.
    #[tabled(rename = "Long Name")]
    pub long_name: String,
    /// Entry point of the public catalog.
    #[tabled(rename = "Catalog")]
    pub catalog: String,
    #[tabled(rename = "Assets")]
    pub assets: String,
    #[tabled(rename = "Links")]
    pub links: String,
    /// Column splitting the output into one file per value.
    #[tabled(rename = "Partition")]
    pub partition: String,
}

/// Table row representation for one output kind of a provider run.
#[derive(Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Provider")]
    pub provider: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    /// Documents discovered.
    #[tabled(rename = "Items")]
    pub items: usize,
    #[tabled(rename = "Normalized")]
    pub normalized: usize,
    /// Items without geometry.
    #[tabled(rename = "Skipped")]
    pub skipped: usize,
    /// Unreadable documents plus items that failed to normalize.
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Files")]
    pub files: usize,
    #[tabled(rename = "Rows")]
    pub rows: usize,
}

/// Table row representation for displaying field/column information.
#[derive(Tabled)]
pub struct FieldRow {
    /// Name of the field.
    #[tabled(rename = "Field")]
    pub name: String,
    /// Inferred data type of the field.
    #[tabled(rename = "Type")]
    pub data_type: String,
    /// Whether the field holds the `GeoJSON` geometry.
    #[tabled(rename = "Geometry")]
    pub geometry: String,
}

/// Builds one row per registered provider.
#[must_use]
pub fn provider_rows(providers: &[ProviderSpec]) -> Vec<ProviderRow> {
    providers
        .iter()
        .map(|spec| ProviderRow {
            name: spec.provider.to_string(),
            long_name: spec.long_name.to_string(),
            catalog: spec.catalog.to_string(),
            assets: spec.asset_rules_label(),
            links: spec.link_rules_label(),
            partition: spec.partition_label().to_string(),
        })
        .collect()
}

/// Builds one row per provider and output kind.
#[must_use]
pub fn summary_rows(runs: &[ProviderRun]) -> Vec<SummaryRow> {
    runs.iter()
        .flat_map(|run| {
            run.kinds.iter().map(move |kind| SummaryRow {
                provider: run.provider.to_string(),
                kind: kind.kind.as_str().to_string(),
                items: run.discovered,
                normalized: kind.report.normalized,
                skipped: kind.report.skipped,
                failed: kind.report.failed + kind.report.unavailable,
                files: kind.written.len(),
                rows: kind.written.iter().map(|w| w.rows).sum(),
            })
        })
        .collect()
}

/// Display the provider registry in a formatted table.
pub fn display_providers(providers: &[ProviderSpec]) {
    println!("Available providers:\n");
    let table = Table::new(provider_rows(providers)).to_string();
    println!("{table}");
}

/// Display the outcome of every provider run, followed by the written files.
pub fn display_summary(runs: &[ProviderRun]) {
    let rows = summary_rows(runs);
    if rows.is_empty() {
        println!("No provider produced output.");
        return;
    }

    println!("\n=== Summary ===");
    let table = Table::new(rows).to_string();
    println!("{table}");

    let paths: Vec<_> = runs
        .iter()
        .flat_map(|run| &run.kinds)
        .flat_map(|kind| &kind.written)
        .collect();
    if !paths.is_empty() {
        println!("\n=== Files ===");
        for written in paths {
            println!("{} ({} rows)", written.path.display(), written.rows);
        }
    }
}

/// Display the column schema of every produced table.
pub fn display_schemas(runs: &[ProviderRun]) {
    for run in runs {
        for kind in &run.kinds {
            let ProviderOutcome::Produced(output) = &kind.outcome else {
                continue;
            };
            println!("\n=== Schema: {} ({}) ===", run.provider, kind.kind.as_str());

            let field_rows: Vec<FieldRow> = describe_schema(&output.schema)
                .into_iter()
                .map(|(name, data_type, geometry)| FieldRow {
                    name,
                    data_type,
                    geometry: if geometry { "Yes" } else { "No" }.to_string(),
                })
                .collect();
            println!("{}", Table::new(field_rows));

            if !output.encoded_columns.is_empty() {
                println!("Encoded as JSON text: {}", output.encoded_columns.join(", "));
            }
        }
    }
}
