//! `GeoJSON` writer for output groups.
//!
//! Each output group becomes one `FeatureCollection`. The `geometry` column
//! becomes the feature geometry, `id` the feature id, and every other column a
//! property.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write as IoWrite};
use std::path::{Path, PathBuf};

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, JsonObject};
use log::{info, warn};

use crate::batch::Batch;
use crate::clean::OutputGroup;
use crate::error::{IoErrorExt, Result};
use crate::types::OutputKind;
use crate::value::Value;

/// Extension of every written file.
pub const FILE_EXTENSION: &str = "geojson";

/// Options for `GeoJSON` writing
#[derive(Debug, Clone, Default)]
pub struct GeoJsonWriterOptions {
    /// Indent the output (default: false)
    pub pretty: bool,
}

impl GeoJsonWriterOptions {
    /// Create new writer options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to indent the output
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// A group written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenGroup {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Converts a batch into a `FeatureCollection`, one feature per row.
#[must_use]
pub fn batch_to_feature_collection(batch: &Batch) -> FeatureCollection {
    let features = batch
        .rows()
        .map(|row| {
            let mut geometry = None;
            let mut id = None;
            let mut properties = JsonObject::new();
            for (key, value) in row {
                match value {
                    Value::Geometry(g) if key == "geometry" => geometry = Some(g),
                    Value::String(s) if key == "id" => id = Some(Id::String(s)),
                    value => {
                        properties.insert(key, value.to_json());
                    },
                }
            }
            Feature {
                bbox: None,
                geometry,
                id,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Write a batch as a `GeoJSON` `FeatureCollection`
///
/// # Errors
///
/// Returns an error if serialization or writing to the output fails
pub fn write_geojson<W: IoWrite>(
    writer: &mut W,
    batch: &Batch,
    options: &GeoJsonWriterOptions,
) -> std::io::Result<()> {
    let collection = batch_to_feature_collection(batch);
    if options.pretty {
        serde_json::to_writer_pretty(&mut *writer, &collection)?;
    } else {
        serde_json::to_writer(&mut *writer, &collection)?;
    }
    writer.flush()
}

/// Path of a group file: `<root>/<provider>/<group>.geojson` for map output and
/// `<root>/ard/<provider>/<group>.geojson` for analysis-ready output.
#[must_use]
pub fn output_path(root: &Path, kind: OutputKind, provider: &str, group: &str) -> PathBuf {
    let directory = match kind {
        OutputKind::Map => root.join(provider),
        OutputKind::Ard => root.join("ard").join(provider),
    };
    let file_name = group.replace(['/', '\\'], "_");
    directory.join(format!("{file_name}.{FILE_EXTENSION}"))
}

/// Returns `path`, or the first `<stem>_<n>.geojson` sibling not in `used`.
fn unique_path(path: PathBuf, used: &HashSet<PathBuf>) -> PathBuf {
    if !used.contains(&path) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let candidate = (2..)
        .map(|n| path.with_file_name(format!("{stem}_{n}.{FILE_EXTENSION}")))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| path.clone());
    warn!(
        "Output file {} is already taken, writing to {}",
        path.display(),
        candidate.display()
    );
    candidate
}

/// Writes every group of one provider and output kind.
///
/// Groups whose file names collide after separator replacement get a `_2`,
/// `_3`, ... suffix in group order, so no group overwrites another.
///
/// # Errors
///
/// Returns an [`IoError::Write`](crate::error::IoError::Write) if a directory
/// or file cannot be created or written.
pub fn write_output_groups(
    root: &Path,
    kind: OutputKind,
    provider: &str,
    groups: &[OutputGroup],
    options: &GeoJsonWriterOptions,
) -> Result<Vec<WrittenGroup>> {
    let mut written = Vec::with_capacity(groups.len());
    let mut used = HashSet::with_capacity(groups.len());
    for group in groups {
        let path = unique_path(output_path(root, kind, provider, &group.name), &used);
        used.insert(path.clone());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_write_context(parent)?;
        }

        let file = File::create(&path).with_write_context(&path)?;
        let mut writer = BufWriter::new(file);
        write_geojson(&mut writer, &group.batch, options).with_write_context(&path)?;

        info!(
            "Wrote {} row(s) to {}",
            group.batch.num_rows(),
            path.display()
        );
        written.push(WrittenGroup {
            name: group.name.clone(),
            path,
            rows: group.batch.num_rows(),
        });
    }
    Ok(written)
}
