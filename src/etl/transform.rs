//! Transformer trait and the ordered chain that applies it

use crate::schema::{Row, Schema};
use eyre::{Context, Result};

/// A unit of row transformation
///
/// Implementors define how to rewrite rows flowing through the pipeline:
/// - Nulling sensitive columns
/// - Overwriting columns with literals
/// - Generating fake data
/// - Deriving columns from templates
///
/// # Example
/// ```
/// use querydump::etl::Transformer;
/// use querydump::schema::{Row, Schema, Value};
/// use eyre::Result;
///
/// struct Upper {
///     index: usize,
/// }
///
/// impl Transformer for Upper {
///     fn name(&self) -> &str {
///         "upper"
///     }
///
///     fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
///         Ok(schema.clone())
///     }
///
///     fn transform(&mut self, mut row: Row) -> Result<Row> {
///         if let Value::Text(s) = &row[self.index] {
///             row[self.index] = Value::Text(s.to_uppercase());
///         }
///         Ok(row)
///     }
/// }
/// ```
pub trait Transformer: Send {
    /// Short name used in logs and progress reports
    fn name(&self) -> &str;

    /// Ordering key for chains built without explicit order. Lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Bind to the incoming schema and return the schema of emitted rows
    ///
    /// Called once per run, in chain order, before any row flows. May append
    /// virtual columns but must keep `schema` as a prefix of the result.
    ///
    /// # Errors
    /// Returns an error when the configuration does not fit the schema
    fn initialize(&mut self, schema: &Schema) -> Result<Schema>;

    /// Transform a single row
    ///
    /// Must not block or perform I/O.
    ///
    /// # Errors
    /// Any error aborts the whole run
    fn transform(&mut self, row: Row) -> Result<Row>;
}

/// Ordered sequence of transformers applied to every row
#[derive(Default)]
pub struct TransformerChain {
    elements: Vec<Box<dyn Transformer>>,
    widths: Vec<usize>,
}

impl TransformerChain {
    pub fn new(elements: Vec<Box<dyn Transformer>>) -> Self {
        Self {
            elements,
            widths: Vec::new(),
        }
    }

    /// Build a chain ordered by ascending priority
    ///
    /// Only for configurations that carry no explicit order. The sort is
    /// stable so equal priorities keep their given order.
    pub fn sorted_by_priority(mut elements: Vec<Box<dyn Transformer>>) -> Self {
        elements.sort_by_key(|t| t.priority());
        Self::new(elements)
    }

    pub fn push(&mut self, element: Box<dyn Transformer>) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.elements.iter().map(|t| t.name().to_string()).collect()
    }

    /// Cascade `schema` through every element, in order
    ///
    /// # Errors
    /// Returns an error if an element rejects its input or drops/reorders
    /// columns it was given
    pub fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
        let mut current = schema.clone();
        self.widths.clear();

        for (position, element) in self.elements.iter_mut().enumerate() {
            let next = element.initialize(&current).with_context(|| {
                format!(
                    "Failed to initialize transformer #{} ({})",
                    position + 1,
                    element.name()
                )
            })?;

            if !next.extends(&current) {
                eyre::bail!(
                    "Transformer #{} ({}) removed or reordered columns: [{}] -> [{}]",
                    position + 1,
                    element.name(),
                    current,
                    next
                );
            }

            log::debug!(
                "Transformer #{} ({}) schema: {}",
                position + 1,
                element.name(),
                next
            );
            self.widths.push(next.len());
            current = next;
        }

        Ok(current)
    }

    /// Apply every element to `row`, calling `on_element` after each one
    ///
    /// # Errors
    /// Returns the first transformer error, or an error when an element emits
    /// a row whose width differs from its declared schema
    pub fn apply(&mut self, mut row: Row, mut on_element: impl FnMut(usize)) -> Result<Row> {
        for (position, element) in self.elements.iter_mut().enumerate() {
            row = element.transform(row).with_context(|| {
                format!("Transformer #{} ({}) failed", position + 1, element.name())
            })?;

            if let Some(&width) = self.widths.get(position)
                && row.len() != width
            {
                eyre::bail!(
                    "Transformer #{} ({}) emitted {} values, schema declares {}",
                    position + 1,
                    element.name(),
                    row.len(),
                    width
                );
            }
            on_element(position);
        }
        Ok(row)
    }
}

impl std::fmt::Debug for TransformerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, LogicalType, Value};

    struct Passthrough;

    impl Transformer for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }
        fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
            Ok(schema.clone())
        }
        fn transform(&mut self, row: Row) -> Result<Row> {
            Ok(row)
        }
    }

    struct Appender;

    impl Transformer for Appender {
        fn name(&self) -> &str {
            "appender"
        }
        fn priority(&self) -> i32 {
            50
        }
        fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
            Ok(schema.with_column(Column::virtual_column("EXTRA", LogicalType::Text)))
        }
        fn transform(&mut self, mut row: Row) -> Result<Row> {
            row.push(Value::from("x"));
            Ok(row)
        }
    }

    struct Dropper;

    impl Transformer for Dropper {
        fn name(&self) -> &str {
            "dropper"
        }
        fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
            Ok(Schema::new(schema.columns()[1..].to_vec()))
        }
        fn transform(&mut self, mut row: Row) -> Result<Row> {
            row.remove(0);
            Ok(row)
        }
    }

    /// Declares the schema unchanged but emits a wider row
    struct Liar;

    impl Transformer for Liar {
        fn name(&self) -> &str {
            "liar"
        }
        fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
            Ok(schema.clone())
        }
        fn transform(&mut self, mut row: Row) -> Result<Row> {
            row.push(Value::Null);
            Ok(row)
        }
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("A", LogicalType::Text),
            Column::new("B", LogicalType::Text),
        ])
    }

    #[test]
    fn test_schema_cascades_in_order() {
        let mut chain = TransformerChain::new(vec![
            Box::new(Passthrough),
            Box::new(Appender),
        ]);
        let out = chain.initialize(&schema()).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.columns()[2].is_virtual);

        let mut seen = Vec::new();
        let row = chain
            .apply(vec![Value::from("a"), Value::from("b")], |i| seen.push(i))
            .unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_rejects_dropped_columns() {
        let mut chain = TransformerChain::new(vec![Box::new(Dropper)]);
        let err = chain.initialize(&schema()).unwrap_err();
        assert!(err.to_string().contains("removed or reordered"));
    }

    #[test]
    fn test_rejects_width_mismatch() {
        let mut chain = TransformerChain::new(vec![Box::new(Liar)]);
        chain.initialize(&schema()).unwrap();
        let err = chain
            .apply(vec![Value::from("a"), Value::from("b")], |_| {})
            .unwrap_err();
        assert!(err.to_string().contains("emitted 3 values"));
    }

    #[test]
    fn test_sorted_by_priority_is_stable() {
        let chain = TransformerChain::sorted_by_priority(vec![
            Box::new(Appender),
            Box::new(Passthrough),
            Box::new(Liar),
        ]);
        assert_eq!(chain.names(), vec!["passthrough", "liar", "appender"]);
    }
}
