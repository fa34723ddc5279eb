//! Overwrite transformer
//!
//! Sets columns to a fixed literal on every row.

use crate::etl::Transformer;
use crate::schema::{Row, Schema, Value};
use eyre::Result;

/// Transformer that writes a literal into specified columns
///
/// Values take the form `COLUMN:literal`. The literal is parsed once, at
/// initialization, into the column's logical type.
///
/// # Example
/// ```
/// use querydump::transform::OverwriteTransformer;
/// use querydump::etl::Transformer;
/// use querydump::schema::{Column, LogicalType, Schema, Value};
///
/// let mut overwrite = OverwriteTransformer::new(&["CITY:Paris".to_string()]).unwrap();
/// let schema = Schema::new(vec![Column::new("CITY", LogicalType::Text)]);
/// overwrite.initialize(&schema).unwrap();
///
/// let row = overwrite.transform(vec![Value::from("London")]).unwrap();
/// assert_eq!(row, vec![Value::from("Paris")]);
/// ```
pub struct OverwriteTransformer {
    mappings: Vec<(String, String)>,
    bound: Vec<(usize, Value)>,
}

impl OverwriteTransformer {
    /// Parse `COLUMN:literal` mappings
    ///
    /// # Errors
    /// Returns an error if a value has no `:` separator or an empty column
    pub fn new(values: &[String]) -> Result<Self> {
        let mappings = values
            .iter()
            .map(|value| {
                let (column, literal) = value
                    .split_once(':')
                    .ok_or_else(|| eyre::eyre!("Invalid overwrite '{}': expected COLUMN:VALUE", value))?;
                let column = column.trim();
                if column.is_empty() {
                    eyre::bail!("Invalid overwrite '{}': column name is empty", value);
                }
                Ok((column.to_string(), literal.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mappings,
            bound: Vec::new(),
        })
    }
}

impl Transformer for OverwriteTransformer {
    fn name(&self) -> &str {
        "overwrite"
    }

    fn priority(&self) -> i32 {
        super::OVERWRITE_PRIORITY
    }

    fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
        self.bound.clear();

        for (column, literal) in &self.mappings {
            let Some(index) = schema.index_of(column) else {
                log::warn!("Overwrite: column '{}' not found, skipping", column);
                continue;
            };
            let logical_type = schema.columns()[index].logical_type;
            let value = Value::parse_as(literal, logical_type).map_err(|e| {
                eyre::eyre!("Overwrite value for column '{}' is invalid: {}", column, e)
            })?;
            self.bound.push((index, value));
        }

        Ok(schema.clone())
    }

    fn transform(&mut self, mut row: Row) -> Result<Row> {
        for (index, value) in &self.bound {
            row[*index] = value.clone();
        }
        Ok(row)
    }
}
