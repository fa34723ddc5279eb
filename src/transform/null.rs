//! Null transformer
//!
//! Replaces the value of selected columns with `Null`, typically to keep
//! sensitive data out of an export while preserving its shape.

use crate::etl::Transformer;
use crate::schema::{Row, Schema, Value};
use eyre::Result;

/// Transformer that sets specified columns to `Null`
///
/// Each configured value is a column name or a comma-separated list of
/// names. Columns missing from the schema are skipped with a warning.
///
/// # Example
/// ```
/// use querydump::transform::NullTransformer;
/// use querydump::etl::Transformer;
/// use querydump::schema::{Column, LogicalType, Schema, Value};
///
/// let mut nuller = NullTransformer::new(&["SSN".to_string()]);
/// let schema = Schema::new(vec![
///     Column::new("ID", LogicalType::Integer),
///     Column::new("SSN", LogicalType::Text),
/// ]);
/// nuller.initialize(&schema).unwrap();
///
/// let row = nuller
///     .transform(vec![Value::Int(1), Value::from("123-45-6789")])
///     .unwrap();
/// assert_eq!(row, vec![Value::Int(1), Value::Null]);
/// ```
pub struct NullTransformer {
    columns: Vec<String>,
    indices: Vec<usize>,
}

impl NullTransformer {
    /// Create a null transformer for the given column lists
    pub fn new(values: &[String]) -> Self {
        let columns = values
            .iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            columns,
            indices: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Transformer for NullTransformer {
    fn name(&self) -> &str {
        "null"
    }

    fn priority(&self) -> i32 {
        super::NULL_PRIORITY
    }

    fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
        let mut output = schema.clone();
        self.indices.clear();

        for column in &self.columns {
            let Some(index) = schema.index_of(column) else {
                log::warn!("Null: column '{}' not found, skipping", column);
                continue;
            };
            if !self.indices.contains(&index) {
                self.indices.push(index);
            }
            let nullable = output.columns()[index].clone().with_nullable(true);
            output = output.replace_column(index, nullable);
        }

        Ok(output)
    }

    fn transform(&mut self, mut row: Row) -> Result<Row> {
        for &index in &self.indices {
            row[index] = Value::Null;
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, LogicalType};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("ID", LogicalType::Integer),
            Column::new("NAME", LogicalType::Text).with_nullable(false),
            Column::new("EMAIL", LogicalType::Text),
        ])
    }

    #[test]
    fn test_nulls_listed_columns() {
        let mut nuller = NullTransformer::new(&["NAME, EMAIL".to_string()]);
        let output = nuller.initialize(&schema()).unwrap();
        assert!(output.columns()[1].nullable);

        let row = nuller
            .transform(vec![Value::Int(1), Value::from("Alice"), Value::from("a@x.io")])
            .unwrap();
        assert_eq!(row, vec![Value::Int(1), Value::Null, Value::Null]);
    }

    #[test]
    fn test_unknown_column_is_skipped() {
        let mut nuller = NullTransformer::new(&["MISSING".to_string(), "ID".to_string()]);
        let output = nuller.initialize(&schema()).unwrap();
        assert_eq!(output.len(), 3);

        let row = nuller
            .transform(vec![Value::Int(1), Value::from("Alice"), Value::Null])
            .unwrap();
        assert_eq!(row[0], Value::Null);
        assert_eq!(row[1], Value::from("Alice"));
    }

    #[test]
    fn test_splits_comma_lists() {
        let nuller = NullTransformer::new(&["A,B".to_string(), " C ".to_string()]);
        assert_eq!(nuller.columns(), &["A", "B", "C"]);
    }
}
