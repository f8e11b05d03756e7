//! Column-oriented batches of flat records.
//!
//! A [`Batch`] holds every record of one provider run. Its columns are the union
//! of the record keys in first-seen order; a record without a key contributes
//! `null`. Columns are only ever replaced as a whole.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema, TimeUnit};

use crate::value::{Mapping, Shape, Value};

/// Metadata key marking the `GeoJSON` text encoding of a geometry column.
pub const GEOMETRY_ENCODING_KEY: &str = "encoding";

/// A named column of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Shapes of the non-null values.
    #[must_use]
    pub fn shapes(&self) -> BTreeSet<Shape> {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .map(Value::shape)
            .collect()
    }

    /// Returns `true` when every value is `null`.
    #[must_use]
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    /// Arrow field describing the column.
    #[must_use]
    pub fn arrow_field(&self) -> Field {
        let field = Field::new(&self.name, infer_data_type(&self.values), true);
        if self.shapes().contains(&Shape::Geometry) {
            field.with_metadata(HashMap::from([(
                GEOMETRY_ENCODING_KEY.to_string(),
                "geojson".to_string(),
            )]))
        } else {
            field
        }
    }
}

/// An ordered, column-oriented set of records sharing one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    provider: String,
    columns: Vec<Column>,
    num_rows: usize,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            columns: Vec::new(),
            num_rows: 0,
        }
    }

    /// Builds a batch from rows. Columns appear in first-seen key order.
    #[must_use]
    pub fn from_rows(provider: impl Into<String>, rows: Vec<Mapping>) -> Self {
        let num_rows = rows.len();
        let mut columns: Vec<Column> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (row_index, row) in rows.into_iter().enumerate() {
            for (key, value) in row {
                let position = match index.get(&key) {
                    Some(&position) => position,
                    None => {
                        index.insert(key.clone(), columns.len());
                        columns.push(Column::new(key, vec![Value::Null; num_rows]));
                        columns.len() - 1
                    },
                };
                columns[position].values[row_index] = value;
            }
        }

        Self {
            provider: provider.into(),
            columns,
            num_rows,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Replaces the values of a column, or appends it when absent.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not hold exactly one value per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        assert_eq!(
            values.len(),
            self.num_rows,
            "column '{name}' must hold one value per row"
        );
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column::new(name, values)),
        }
    }

    /// Removes a column, returning it if present.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let position = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(position))
    }

    /// Builds a new batch holding the given rows, in the given order.
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Batch {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                Column::new(
                    column.name.clone(),
                    rows.iter()
                        .map(|&row| column.values.get(row).cloned().unwrap_or(Value::Null))
                        .collect(),
                )
            })
            .collect();
        Batch {
            provider: self.provider.clone(),
            columns,
            num_rows: rows.len(),
        }
    }

    /// Reassembles one row as a mapping in column order.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Mapping> {
        if index >= self.num_rows {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[index].clone()))
                .collect(),
        )
    }

    pub fn rows(&self) -> impl Iterator<Item = Mapping> + '_ {
        (0..self.num_rows).filter_map(|index| self.row(index))
    }

    /// The columnar schema of the batch, inferred from its values.
    ///
    /// Integer and float mixes widen to `Float64`, any other scalar mix falls
    /// back to `Utf8`, and geometries are typed as `GeoJSON` text.
    #[must_use]
    pub fn arrow_schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(Column::arrow_field)
                .collect::<Vec<_>>(),
        )
    }
}

fn infer_data_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
    values
        .into_iter()
        .filter(|v| !v.is_null())
        .map(value_data_type)
        .reduce(merge_data_types)
        .unwrap_or(DataType::Null)
}

fn value_data_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Int(_) => DataType::Int64,
        Value::Float(_) => DataType::Float64,
        Value::Wrapped(n) => value_data_type(&n.into_native()),
        Value::String(_) | Value::Geometry(_) => DataType::Utf8,
        Value::Timestamp(_) => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        Value::Array(_) => list_of(DataType::Float64),
        Value::Sequence(items) => list_of(infer_data_type(items)),
        Value::Mapping(mapping) => DataType::Struct(
            mapping
                .iter()
                .map(|(key, value)| Field::new(key, value_data_type(value), true))
                .collect(),
        ),
        Value::Bbox(_) => DataType::Struct(
            ["xmin", "ymin", "xmax", "ymax"]
                .into_iter()
                .map(|name| Field::new(name, DataType::Float64, false))
                .collect(),
        ),
    }
}

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new_list_field(item, true)))
}

fn merge_data_types(left: DataType, right: DataType) -> DataType {
    if left == right {
        return left;
    }
    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => other,
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        },
        (DataType::List(a), DataType::List(b)) => list_of(merge_data_types(
            a.data_type().clone(),
            b.data_type().clone(),
        )),
        (DataType::Struct(a), DataType::Struct(b)) => DataType::Struct(merge_fields(&a, &b)),
        _ => DataType::Utf8,
    }
}

fn merge_fields(left: &Fields, right: &Fields) -> Fields {
    let mut merged: Vec<Field> = left
        .iter()
        .map(|field| match right.find(field.name()) {
            Some((_, other)) => Field::new(
                field.name(),
                merge_data_types(field.data_type().clone(), other.data_type().clone()),
                true,
            ),
            None => field.as_ref().clone().with_nullable(true),
        })
        .collect();
    merged.extend(
        right
            .iter()
            .filter(|field| left.find(field.name()).is_none())
            .map(|field| field.as_ref().clone().with_nullable(true)),
    );
    Fields::from(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Mapping {
        Value::from(value).as_mapping().cloned().unwrap()
    }

    fn sample() -> Batch {
        Batch::from_rows(
            "capella",
            vec![
                row(json!({"id": "a", "mode": "spotlight"})),
                row(json!({"id": "b", "look": 2})),
                row(json!({"id": "c", "mode": "stripmap", "look": 1.5})),
            ],
        )
    }

    #[test]
    fn columns_are_the_union_in_first_seen_order() {
        let batch = sample();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.column_names().collect::<Vec<_>>(), vec!["id", "mode", "look"]);
        assert_eq!(
            batch.column("mode").unwrap().values,
            vec![Value::from("spotlight"), Value::Null, Value::from("stripmap")]
        );
        assert_eq!(batch.column("look").unwrap().values[0], Value::Null);
    }

    #[test]
    fn select_rows_keeps_columns() {
        let subset = sample().select_rows(&[2, 0]);
        assert_eq!(subset.num_rows(), 2);
        assert_eq!(subset.provider(), "capella");
        assert_eq!(
            subset.column("id").unwrap().values,
            vec![Value::from("c"), Value::from("a")]
        );
    }

    #[test]
    fn rows_round_trip_in_column_order() {
        let batch = sample();
        let second = batch.row(1).unwrap();
        assert_eq!(second.keys().collect::<Vec<_>>(), vec!["id", "mode", "look"]);
        assert_eq!(second.get("mode"), Some(&Value::Null));
        assert!(batch.row(3).is_none());
        assert_eq!(batch.rows().count(), 3);
    }

    #[test]
    fn set_and_drop_columns() {
        let mut batch = sample();
        batch.set_column("look", vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        batch.set_column("extra", vec![Value::Null, Value::Null, Value::Null]);
        assert_eq!(batch.num_columns(), 4);
        assert!(batch.column("extra").unwrap().is_all_null());
        assert!(batch.drop_column("mode").is_some());
        assert!(batch.drop_column("mode").is_none());
        assert_eq!(
            batch.column_names().collect::<Vec<_>>(),
            vec!["id", "look", "extra"]
        );
    }

    #[test]
    #[should_panic(expected = "one value per row")]
    fn set_column_rejects_wrong_length() {
        sample().set_column("id", vec![Value::Null]);
    }

    #[test]
    fn schema_inference() {
        let geometry: geojson::Geometry =
            serde_json::from_value(json!({"type": "Point", "coordinates": [1.0, 2.0]})).unwrap();
        let mut first = row(json!({"n": 1, "tags": ["a"], "s": {"x": 1}, "mixed": 1, "empty": null}));
        first.insert("geometry", Value::Geometry(geometry));
        let second = row(json!({"n": 2.5, "tags": [], "s": {"y": true}, "mixed": "one"}));
        let schema = Batch::from_rows("iceye", vec![first, second]).arrow_schema();

        assert_eq!(schema.field_with_name("n").unwrap().data_type(), &DataType::Float64);
        assert_eq!(schema.field_with_name("mixed").unwrap().data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("empty").unwrap().data_type(), &DataType::Null);
        assert_eq!(
            schema.field_with_name("tags").unwrap().data_type(),
            &list_of(DataType::Utf8)
        );
        let DataType::Struct(fields) = schema.field_with_name("s").unwrap().data_type() else {
            panic!("expected a struct");
        };
        assert_eq!(fields.len(), 2);

        let geometry = schema.field_with_name("geometry").unwrap();
        assert_eq!(geometry.data_type(), &DataType::Utf8);
        assert_eq!(
            geometry.metadata().get(GEOMETRY_ENCODING_KEY).map(String::as_str),
            Some("geojson")
        );
    }
}
