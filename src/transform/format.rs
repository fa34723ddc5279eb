//! Format transformer
//!
//! Renders a column from a template that references other columns by name,
//! e.g. `EMAIL:{FIRST}.{LAST}@example.com`.

use crate::etl::Transformer;
use crate::schema::{Column, LogicalType, Row, Schema, Value};
use eyre::{Context, Result};
use regex::Regex;

const PLACEHOLDER_PATTERN: &str = r"\{([^{}]+)\}";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Column(usize),
}

struct Template {
    target: String,
    source: String,
}

/// Transformer that derives text columns from templates
///
/// Placeholders resolve against every column present when the transformer
/// is initialized, virtual ones included, so a template can combine values
/// produced by earlier transformers. Mappings run in the order given; a
/// later mapping sees the output of an earlier one.
pub struct FormatTransformer {
    templates: Vec<Template>,
    compiled: Vec<(usize, Vec<Segment>)>,
}

impl FormatTransformer {
    /// Parse `COLUMN:template` mappings
    ///
    /// # Errors
    /// Returns an error if a value has no `:` separator or an empty column
    pub fn new(values: &[String]) -> Result<Self> {
        let templates = values
            .iter()
            .map(|value| {
                let (target, source) = value.split_once(':').ok_or_else(|| {
                    eyre::eyre!("Invalid format '{}': expected COLUMN:TEMPLATE", value)
                })?;
                let target = target.trim();
                if target.is_empty() {
                    eyre::bail!("Invalid format '{}': column name is empty", value);
                }
                Ok(Template {
                    target: target.to_string(),
                    source: source.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            templates,
            compiled: Vec::new(),
        })
    }
}

/// Split a template into literal text and column references
fn compile(pattern: &Regex, template: &str, schema: &Schema) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for captures in pattern.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(template[last..whole.start()].to_string()));
        }
        let index = schema.index_of(name.as_str()).ok_or_else(|| {
            eyre::eyre!(
                "Template '{}' references unknown column '{}'",
                template,
                name.as_str()
            )
        })?;
        segments.push(Segment::Column(index));
        last = whole.end();
    }

    if last < template.len() {
        segments.push(Segment::Literal(template[last..].to_string()));
    }
    Ok(segments)
}

fn render(segments: &[Segment], row: &Row) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Column(index) => out.push_str(&row[*index].to_string()),
        }
    }
    out
}

impl Transformer for FormatTransformer {
    fn name(&self) -> &str {
        "format"
    }

    fn priority(&self) -> i32 {
        super::FORMAT_PRIORITY
    }

    fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
        let pattern = Regex::new(PLACEHOLDER_PATTERN)
            .with_context(|| format!("Invalid placeholder pattern: {}", PLACEHOLDER_PATTERN))?;

        let mut output = schema.clone();
        self.compiled.clear();

        for template in &self.templates {
            let index = schema.index_of(&template.target).ok_or_else(|| {
                eyre::eyre!("Format target column '{}' not found", template.target)
            })?;
            let segments = compile(&pattern, &template.source, schema)?;

            let current = &schema.columns()[index];
            output = output.replace_column(
                index,
                Column {
                    logical_type: LogicalType::Text,
                    ..current.clone()
                },
            );
            self.compiled.push((index, segments));
        }

        Ok(output)
    }

    fn transform(&mut self, mut row: Row) -> Result<Row> {
        for (index, segments) in &self.compiled {
            let text = render(segments, &row);
            row[*index] = Value::Text(text);
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("FIRST", LogicalType::Text),
            Column::new("LAST", LogicalType::Text),
            Column::new("AGE", LogicalType::Integer),
        ])
    }

    #[test]
    fn test_renders_placeholders() {
        let mut format = FormatTransformer::new(&["LAST:{FIRST} {LAST} ({AGE})".to_string()]).unwrap();
        let output = format.initialize(&schema()).unwrap();
        assert_eq!(output.columns()[1].logical_type, LogicalType::Text);

        let row = format
            .transform(vec![Value::from("Ada"), Value::from("Lovelace"), Value::Int(36)])
            .unwrap();
        assert_eq!(row[1], Value::from("Ada Lovelace (36)"));
    }

    #[test]
    fn test_null_renders_empty() {
        let mut format = FormatTransformer::new(&["AGE:<{FIRST}>".to_string()]).unwrap();
        let output = format.initialize(&schema()).unwrap();
        assert_eq!(output.columns()[2].logical_type, LogicalType::Text);

        let row = format
            .transform(vec![Value::Null, Value::Null, Value::Int(1)])
            .unwrap();
        assert_eq!(row[2], Value::from("<>"));
    }

    #[test]
    fn test_unknown_placeholder_fails() {
        let mut format = FormatTransformer::new(&["FIRST:{NOPE}".to_string()]).unwrap();
        let err = format.initialize(&schema()).unwrap_err();
        assert!(err.to_string().contains("unknown column 'NOPE'"));
    }

    #[test]
    fn test_unknown_target_fails() {
        let mut format = FormatTransformer::new(&["NOPE:{FIRST}".to_string()]).unwrap();
        assert!(format.initialize(&schema()).is_err());
    }

    #[test]
    fn test_later_mapping_sees_earlier_result() {
        let mut format = FormatTransformer::new(&[
            "FIRST:{LAST}".to_string(),
            "LAST:{FIRST}!".to_string(),
        ])
        .unwrap();
        format.initialize(&schema()).unwrap();

        let row = format
            .transform(vec![Value::from("a"), Value::from("b"), Value::Null])
            .unwrap();
        assert_eq!(row[0], Value::from("b"));
        assert_eq!(row[1], Value::from("b!"));
    }

    #[test]
    fn test_template_without_placeholders() {
        let mut format = FormatTransformer::new(&["FIRST:redacted".to_string()]).unwrap();
        format.initialize(&schema()).unwrap();
        let row = format
            .transform(vec![Value::from("a"), Value::Null, Value::Null])
            .unwrap();
        assert_eq!(row[0], Value::from("redacted"));
    }
}
