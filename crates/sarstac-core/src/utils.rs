//! Display helpers for inferred column types.

use arrow_schema::{DataType, Schema};

use crate::batch::GEOMETRY_ENCODING_KEY;

/// Extension trait for formatting Arrow [`DataType`] into short labels.
///
/// Nested types show their children, so a schema can be read at a glance.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use arrow_schema::{DataType, Field};
/// use sarstac_core::utils::ArrowDataTypeExt;
///
/// assert_eq!(DataType::Utf8.format(), "String");
///
/// let list = DataType::List(Arc::new(Field::new_list_field(DataType::Int64, true)));
/// assert_eq!(list.format(), "List<Int64>");
/// ```
pub trait ArrowDataTypeExt {
    fn format(&self) -> String;
}

impl ArrowDataTypeExt for DataType {
    fn format(&self) -> String {
        match self {
            DataType::Null => "Null".to_string(),
            DataType::Utf8 => "String".to_string(),
            DataType::Timestamp(unit, tz) => {
                let tz = tz.as_deref().unwrap_or("naive");
                format!("Timestamp({unit:?}, {tz})")
            },
            DataType::List(item) => format!("List<{}>", item.data_type().format()),
            DataType::Struct(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.name().as_str()).collect();
                format!("Struct{{{}}}", names.join(", "))
            },
            _ => format!("{self:?}"),
        }
    }
}

/// `(column, type label, geometry)` for every field of a schema.
#[must_use]
pub fn describe_schema(schema: &Schema) -> Vec<(String, String, bool)> {
    schema
        .fields()
        .iter()
        .map(|field| {
            (
                field.name().clone(),
                field.data_type().format(),
                field.metadata().contains_key(GEOMETRY_ENCODING_KEY),
            )
        })
        .collect()
}
