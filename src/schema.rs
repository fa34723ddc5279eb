//! Tabular data model shared by every pipeline stage
//!
//! A [`Schema`] is an ordered list of [`Column`]s and a [`Row`] is a list of
//! [`Value`]s aligned to it by position.

use serde_json::Number;
use std::fmt;

/// Logical type of a column, independent of any storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Boolean,
    Integer,
    Float,
    Text,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Boolean => "boolean",
            LogicalType::Integer => "integer",
            LogicalType::Float => "float",
            LogicalType::Text => "text",
        };
        f.write_str(name)
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse a literal string into a value of the given logical type
    ///
    /// Used by transformers that accept literals on the command line.
    pub fn parse_as(literal: &str, logical_type: LogicalType) -> eyre::Result<Self> {
        let value = match logical_type {
            LogicalType::Text => Value::Text(literal.to_string()),
            LogicalType::Integer => Value::Int(
                literal
                    .trim()
                    .parse()
                    .map_err(|e| eyre::eyre!("'{}' is not an integer: {}", literal, e))?,
            ),
            LogicalType::Float => Value::Float(
                literal
                    .trim()
                    .parse()
                    .map_err(|e| eyre::eyre!("'{}' is not a float: {}", literal, e))?,
            ),
            LogicalType::Boolean => Value::Bool(
                literal
                    .trim()
                    .parse()
                    .map_err(|e| eyre::eyre!("'{}' is not a boolean: {}", literal, e))?,
            ),
        };
        Ok(value)
    }
}

/// String form used for hashing and template rendering
///
/// `Null` renders as an empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(x) => Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// One positionally-typed record
pub type Row = Vec<Value>;

/// A block of rows moved together between adapters and the pipeline
pub type Batch = Vec<Row>;

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
    /// Produced for intermediate transformer use and never exported
    pub is_virtual: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: true,
            is_virtual: false,
        }
    }

    pub fn virtual_column(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            is_virtual: true,
            ..Self::new(name, logical_type)
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Ordered sequence of columns
///
/// Schemas are never mutated in place by the pipeline: a transformer that
/// changes shape builds a new value with [`Schema::with_column`] or
/// [`Schema::replace_column`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by exact name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// New schema with `column` appended
    pub fn with_column(&self, column: Column) -> Self {
        let mut columns = self.columns.clone();
        columns.push(column);
        Self { columns }
    }

    /// New schema with the column at `index` replaced
    pub fn replace_column(&self, index: usize, column: Column) -> Self {
        let mut columns = self.columns.clone();
        columns[index] = column;
        Self { columns }
    }

    pub fn has_virtual(&self) -> bool {
        self.columns.iter().any(|c| c.is_virtual)
    }

    /// The sink-facing schema: every virtual column removed
    pub fn without_virtual(&self) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .filter(|c| !c.is_virtual)
                .cloned()
                .collect(),
        }
    }

    /// Positions of the non-virtual columns, in order
    pub fn exported_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_virtual)
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether `self` starts with the same column names as `other`
    pub fn extends(&self, other: &Schema) -> bool {
        self.columns.len() >= other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.name == b.name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", column.name, column.logical_type)?;
            if column.is_virtual {
                f.write_str(" (virtual)")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Schema {
        Schema::new(vec![
            Column::new("NAME", LogicalType::Text),
            Column::new("AGE", LogicalType::Integer),
        ])
    }

    #[test]
    fn test_without_virtual() {
        let schema = people().with_column(Column::virtual_column("TMP", LogicalType::Text));
        assert!(schema.has_virtual());
        assert_eq!(schema.len(), 3);

        let exported = schema.without_virtual();
        assert_eq!(exported, people());
        assert_eq!(schema.exported_indices(), vec![0, 1]);
    }

    #[test]
    fn test_with_column_leaves_original_untouched() {
        let original = people();
        let wider = original.with_column(Column::new("CITY", LogicalType::Text));
        assert_eq!(original.len(), 2);
        assert_eq!(wider.len(), 3);
        assert!(wider.extends(&original));
        assert!(!original.extends(&wider));
    }

    #[test]
    fn test_extends_detects_reorder() {
        let reordered = Schema::new(vec![
            Column::new("AGE", LogicalType::Integer),
            Column::new("NAME", LogicalType::Text),
        ]);
        assert!(!reordered.extends(&people()));
    }

    #[test]
    fn test_value_display_matches_across_types() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::from("42").to_string(), "42");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(
            Value::parse_as("12", LogicalType::Integer).unwrap(),
            Value::Int(12)
        );
        assert_eq!(
            Value::parse_as("Paris", LogicalType::Text).unwrap(),
            Value::from("Paris")
        );
        assert!(Value::parse_as("abc", LogicalType::Integer).is_err());
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(Value::from(&json!(7)), Value::Int(7));
        assert_eq!(Value::from(&json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(&json!(null)), Value::Null);
        assert_eq!(serde_json::Value::from(&Value::from("x")), json!("x"));
        assert_eq!(serde_json::Value::from(&Value::Float(f64::NAN)), json!(null));
    }
}
