//! Schema unification over a complete batch.
//!
//! After unification every column holds values of one shape, so the batch can
//! be written by a columnar writer without per-row type conflicts.

use log::info;

use crate::batch::{Batch, Column};
use crate::geometry::force_2d;
use crate::value::{Shape, Value};

/// Columns whose composite values are kept native by the first pass.
pub const NEVER_SERIALIZE: [&str; 6] = [
    "geometry",
    "bbox",
    "links",
    "assets",
    "start_datetime",
    "end_datetime",
];

/// Unifies the column types of a batch in place.
///
/// 1. Geometries are forced to two dimensions.
/// 2. Outside [`NEVER_SERIALIZE`], a column holding any composite value has
///    its composites encoded as JSON text.
/// 3. Any column mixing sequences with other non-null values has its
///    composites encoded as JSON text.
///
/// All-null columns are left unchanged. Returns the names of the columns whose
/// values were encoded, in column order, without duplicates.
pub fn unify(batch: &mut Batch) -> Vec<String> {
    if let Some(column) = batch.column("geometry") {
        let values = column.values.iter().cloned().map(flatten_geometry).collect();
        batch.set_column("geometry", values);
    }

    let mut rewritten = Vec::new();
    let first_pass: Vec<String> = batch
        .columns()
        .iter()
        .filter(|c| !NEVER_SERIALIZE.contains(&c.name.as_str()))
        .filter(|c| c.values.iter().any(Value::is_composite))
        .map(|c| c.name.clone())
        .collect();
    for name in first_pass {
        info!("Normalizing composite column '{name}' to JSON text");
        encode_column(batch, &name);
        rewritten.push(name);
    }

    let second_pass: Vec<String> = batch
        .columns()
        .iter()
        .filter(|c| mixes_sequences(c))
        .map(|c| c.name.clone())
        .collect();
    for name in second_pass {
        info!("Normalizing mixed sequence column '{name}' to JSON text");
        encode_column(batch, &name);
        if !rewritten.contains(&name) {
            rewritten.push(name);
        }
    }
    rewritten
}

fn flatten_geometry(value: Value) -> Value {
    match value {
        Value::Geometry(mut geometry) => {
            force_2d(&mut geometry);
            Value::Geometry(geometry)
        },
        other => other,
    }
}

fn mixes_sequences(column: &Column) -> bool {
    let shapes = column.shapes();
    shapes.contains(&Shape::Sequence) && shapes.len() > 1
}

fn encode_column(batch: &mut Batch, name: &str) {
    let Some(column) = batch.column(name) else {
        return;
    };
    let values = column.values.iter().cloned().map(encode_composite).collect();
    batch.set_column(name, values);
}

/// Encodes a composite value as compact JSON text; other values pass through.
pub(crate) fn encode_composite(value: Value) -> Value {
    if value.is_composite() {
        Value::String(value.to_json_string())
    } else {
        value
    }
}
