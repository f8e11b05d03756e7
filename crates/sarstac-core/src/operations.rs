//! Provider runs: discovery, concurrent fetch, normalization and output.
//!
//! A run fetches every item of one provider, normalizes each item on its own
//! (a failing item is logged and dropped, never aborting its siblings), then
//! unifies, cleans, partitions and writes one table per output kind.

use std::path::{Path, PathBuf};

use arrow_schema::Schema;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use url::Url;

use crate::batch::Batch;
use crate::clean::{OutputGroup, clean, partition};
use crate::error::{ConfigError, IoError, IoErrorExt, Result};
use crate::flatten::{flatten, flatten_ard};
use crate::providers::{Provider, ProviderRules};
use crate::types::{FlatRecord, OutputKind, RawItem};
use crate::unify::unify;
use crate::value::Mapping;
use crate::writer::{GeoJsonWriterOptions, WrittenGroup, write_output_groups};

/// Default number of documents fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Source of item documents.
///
/// Implementations return `None` on any read or parse failure; a missing
/// document is never an error.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Option<JsonValue>;
}

/// Reads item documents from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileFetcher;

#[async_trait]
impl ItemFetcher for LocalFileFetcher {
    async fn fetch(&self, location: &str) -> Option<JsonValue> {
        let bytes = match tokio::fs::read(location).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {location}: {e}");
                return None;
            },
        };
        match serde_json::from_slice(&bytes) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("Failed to parse {location}: {e}");
                None
            },
        }
    }
}

/// Where an item document lives and the public URL it is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLocation {
    /// Location handed to the fetcher
    pub location: String,
    /// Canonical URL of the item, base for relative hrefs
    pub item_url: String,
}

/// Finds every `*.json` document below `directory`, sorted by path.
///
/// With a `base_url`, item URLs are the base joined with the path relative to
/// `directory`; otherwise they are `file://` URLs of the documents.
///
/// # Errors
///
/// Returns a [`ConfigError`] if `base_url` is not an absolute URL,
/// [`IoError::DirectoryNotFound`] if `directory` does not exist and an
/// [`IoError::Read`] if it cannot be listed.
pub async fn discover_local_items(
    directory: &Path,
    base_url: Option<&str>,
) -> Result<Vec<ItemLocation>> {
    if let Some(base) = base_url {
        validate_base_url(base)?;
    }
    if !tokio::fs::metadata(directory)
        .await
        .is_ok_and(|m| m.is_dir())
    {
        return Err(IoError::DirectoryNotFound {
            path: directory.to_path_buf(),
        }
        .into());
    }

    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_read_context(&current)?;
        while let Some(entry) = entries.next_entry().await.with_read_context(&current)? {
            let path = entry.path();
            let file_type = entry.file_type().await.with_read_context(&path)?;
            if file_type.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            {
                files.push(path);
            }
        }
    }
    files.sort();

    let root = tokio::fs::canonicalize(directory)
        .await
        .with_read_context(directory)?;
    Ok(files
        .into_iter()
        .map(|path| {
            let item_url = item_url_for(&path, directory, &root, base_url);
            ItemLocation {
                location: path.to_string_lossy().into_owned(),
                item_url,
            }
        })
        .collect())
}

/// Checks that `base_url` can act as the base of item URLs.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] unless `base_url` is an absolute
/// URL such as `https://host/path`.
pub fn validate_base_url(base_url: &str) -> std::result::Result<(), ConfigError> {
    match Url::parse(base_url) {
        Ok(url) if !url.cannot_be_a_base() => Ok(()),
        _ => Err(ConfigError::InvalidOption {
            option: "base-url".to_string(),
            message: format!("'{base_url}' is not an absolute URL"),
        }),
    }
}

fn item_url_for(path: &Path, directory: &Path, root: &Path, base_url: Option<&str>) -> String {
    let relative = path.strip_prefix(directory).unwrap_or(path);
    if let Some(base) = base_url {
        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        return format!("{}/{}", base.trim_end_matches('/'), segments.join("/"));
    }
    let absolute = root.join(relative);
    Url::from_file_path(&absolute)
        .map_or_else(|()| absolute.to_string_lossy().into_owned(), String::from)
}

/// Settings of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory the writer places its files under
    pub output_root: PathBuf,
    /// Number of documents fetched at once
    pub concurrency: usize,
    /// Tables to build for every provider
    pub kinds: Vec<OutputKind>,
    /// Indent written files
    pub pretty: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output"),
            concurrency: DEFAULT_CONCURRENCY,
            kinds: OutputKind::all().to_vec(),
            pretty: false,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_kinds(mut self, kinds: Vec<OutputKind>) -> Self {
        self.kinds = kinds;
        self
    }

    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the concurrency is zero or no output kind is
    /// selected.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidOption {
                option: "concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.kinds.is_empty() {
            return Err(ConfigError::MissingRequired {
                option: "kind".to_string(),
            });
        }
        Ok(())
    }
}

/// A fetched document, `None` when the fetch failed.
pub type FetchedItem = (ItemLocation, Option<JsonValue>);

/// Fetches documents with at most `concurrency` requests in flight.
///
/// Results are returned in the order of `locations`.
pub async fn fetch_items(
    fetcher: &dyn ItemFetcher,
    locations: &[ItemLocation],
    concurrency: usize,
) -> Vec<FetchedItem> {
    stream::iter(locations.iter().cloned())
        .map(|location| async move {
            let document = fetcher.fetch(&location.location).await;
            (location, document)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Counts of what happened to the items of one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Documents handed to the pass
    pub total: usize,
    /// Documents the fetcher could not provide
    pub unavailable: usize,
    /// Items without geometry
    pub skipped: usize,
    /// Items that failed to normalize
    pub failed: usize,
    /// Rows produced
    pub normalized: usize,
}

/// Normalizes fetched documents into rows of the given output kind.
///
/// Failures are isolated per item: the item is logged and excluded.
#[must_use]
pub fn normalize_items(
    documents: &[FetchedItem],
    provider: &str,
    kind: OutputKind,
) -> (Vec<Mapping>, NormalizeReport) {
    let mut report = NormalizeReport {
        total: documents.len(),
        ..NormalizeReport::default()
    };
    let mut rows = Vec::with_capacity(documents.len());

    for (location, document) in documents {
        let Some(document) = document else {
            report.unavailable += 1;
            continue;
        };
        let raw = match RawItem::from_json(document.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping item at {}: {e}", location.location);
                report.failed += 1;
                continue;
            },
        };
        if raw.geometry.is_none() {
            debug!("Item {} has no geometry, skipping", raw.label());
            report.skipped += 1;
            continue;
        }

        let row = match kind {
            OutputKind::Map => flatten(&raw, &location.item_url, provider).map(FlatRecord::into_row),
            OutputKind::Ard => flatten_ard(&raw, &location.item_url, provider),
        };
        match row {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!(
                    "Skipping item {} ({}): {e}",
                    raw.label(),
                    location.location
                );
                report.failed += 1;
            },
        }
    }

    report.normalized = rows.len();
    (rows, report)
}

/// A unified, cleaned and partitioned table.
#[derive(Debug, Clone)]
pub struct ProviderOutput {
    /// Columnar schema of the unified table
    pub schema: Schema,
    /// Columns whose values were encoded as JSON text
    pub encoded_columns: Vec<String>,
    pub groups: Vec<OutputGroup>,
}

/// Result of building one table.
#[derive(Debug, Clone)]
pub enum ProviderOutcome {
    Produced(ProviderOutput),
    /// No item survived normalization
    NoOutput,
}

/// Unifies, cleans and partitions the rows of one provider.
#[must_use]
pub fn build_output(rows: Vec<Mapping>, provider: &str) -> ProviderOutcome {
    if rows.is_empty() {
        return ProviderOutcome::NoOutput;
    }
    let rules = ProviderRules::for_name(provider);
    let mut batch = Batch::from_rows(provider, rows);
    let encoded_columns = unify(&mut batch);
    clean(&mut batch, &rules.cleaning);
    let schema = batch.arrow_schema();
    let groups = partition(batch, &rules.cleaning);
    ProviderOutcome::Produced(ProviderOutput {
        schema,
        encoded_columns,
        groups,
    })
}

/// One output kind of a provider run.
#[derive(Debug, Clone)]
pub struct KindRun {
    pub kind: OutputKind,
    pub report: NormalizeReport,
    pub outcome: ProviderOutcome,
    pub written: Vec<WrittenGroup>,
}

/// Summary of a provider run.
#[derive(Debug, Clone)]
pub struct ProviderRun {
    pub provider: Provider,
    /// Documents discovered for the provider
    pub discovered: usize,
    pub kinds: Vec<KindRun>,
}

impl ProviderRun {
    /// Number of rows written across every kind.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.kinds
            .iter()
            .flat_map(|k| &k.written)
            .map(|w| w.rows)
            .sum()
    }
}

/// Runs the whole pipeline for one provider and writes its tables.
///
/// # Errors
///
/// Returns a [`ConfigError`] for invalid settings and an [`IoError`] if an
/// output file cannot be written. Item-level problems never fail the run.
pub async fn process_provider(
    fetcher: &dyn ItemFetcher,
    provider: Provider,
    locations: &[ItemLocation],
    config: &PipelineConfig,
) -> Result<ProviderRun> {
    config.validate()?;
    info!(
        "Processing {} item(s) for {provider}",
        locations.len()
    );

    let documents = fetch_items(fetcher, locations, config.concurrency).await;
    let options = GeoJsonWriterOptions::new().with_pretty(config.pretty);

    let mut kinds = Vec::with_capacity(config.kinds.len());
    for &kind in &config.kinds {
        let (rows, report) = normalize_items(&documents, provider.as_str(), kind);
        info!(
            "{provider} ({}): {} of {} item(s) normalized",
            kind.as_str(),
            report.normalized,
            report.total
        );

        let outcome = build_output(rows, provider.as_str());
        let (outcome, written) = match outcome {
            ProviderOutcome::Produced(output) => {
                write_output(output, &config.output_root, kind, provider, &options).await?
            },
            ProviderOutcome::NoOutput => {
                info!("No output for {provider} ({})", kind.as_str());
                (ProviderOutcome::NoOutput, Vec::new())
            },
        };
        kinds.push(KindRun {
            kind,
            report,
            outcome,
            written,
        });
    }

    Ok(ProviderRun {
        provider,
        discovered: locations.len(),
        kinds,
    })
}

/// Writes the groups of one table on the blocking thread pool.
async fn write_output(
    output: ProviderOutput,
    root: &Path,
    kind: OutputKind,
    provider: Provider,
    options: &GeoJsonWriterOptions,
) -> Result<(ProviderOutcome, Vec<WrittenGroup>)> {
    let task_root = root.to_path_buf();
    let options = options.clone();
    tokio::task::spawn_blocking(move || -> Result<_> {
        let written =
            write_output_groups(&task_root, kind, provider.as_str(), &output.groups, &options)?;
        Ok((ProviderOutcome::Produced(output), written))
    })
    .await
    .with_write_context(root)?
}
