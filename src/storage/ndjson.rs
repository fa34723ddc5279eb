//! NDJSON (Newline Delimited JSON) file operations

use crate::etl::{BatchStream, Extractor, Loader};
use crate::schema::{Batch, Column, LogicalType, Row, Schema, Value};

use async_trait::async_trait;
use eyre::{Context, Result};
use serde_json::Map;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};

type Record = Map<String, serde_json::Value>;

/// Stream rows from an NDJSON file
///
/// The schema is inferred from the first non-empty line, which must be a
/// JSON object. Keys absent from later lines read as `Null`; keys not in the
/// first line are ignored.
pub struct NdjsonReader {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    first: Option<Record>,
    columns: Vec<String>,
    line_number: usize,
}

impl NdjsonReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lines: None,
            first: None,
            columns: Vec::new(),
            line_number: 0,
        }
    }

    fn row_from(columns: &[String], record: &Record) -> Row {
        columns
            .iter()
            .map(|name| record.get(name).map(Value::from).unwrap_or(Value::Null))
            .collect()
    }
}

fn parse_record(line: &str, line_number: usize) -> Result<Record> {
    match serde_json::from_str(line)
        .with_context(|| format!("Failed to parse JSON on line {}", line_number))?
    {
        serde_json::Value::Object(record) => Ok(record),
        other => eyre::bail!(
            "Line {} is not a JSON object: {}",
            line_number,
            truncate(&other.to_string(), 60)
        ),
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

fn infer_type(value: &serde_json::Value) -> LogicalType {
    match value {
        serde_json::Value::Bool(_) => LogicalType::Boolean,
        serde_json::Value::Number(n) if n.is_i64() => LogicalType::Integer,
        serde_json::Value::Number(_) => LogicalType::Float,
        _ => LogicalType::Text,
    }
}

/// Reader state threaded through the batch stream
struct ReadState {
    lines: Option<Lines<BufReader<File>>>,
    pending: Option<Record>,
    columns: Vec<String>,
    line_number: usize,
}

#[async_trait]
impl Extractor for NdjsonReader {
    async fn open(&mut self) -> Result<Schema> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open NDJSON file: {}", self.path.display()))?;
        let mut lines = BufReader::new(file).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("Failed to read NDJSON file: {}", self.path.display()))?
        {
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let record = parse_record(&line, self.line_number)?;
            let schema = Schema::new(
                record
                    .iter()
                    .map(|(name, value)| Column::new(name.clone(), infer_type(value)))
                    .collect(),
            );
            self.columns = record.keys().cloned().collect();
            self.first = Some(record);
            self.lines = Some(lines);

            log::debug!(
                "Inferred schema from {}: {}",
                self.path.display(),
                schema
            );
            return Ok(schema);
        }

        log::warn!("NDJSON file {} is empty", self.path.display());
        Ok(Schema::default())
    }

    fn into_batches(self: Box<Self>, batch_size: usize) -> BatchStream {
        let batch_size = batch_size.max(1);
        let state = ReadState {
            lines: self.lines,
            pending: self.first,
            columns: self.columns,
            line_number: self.line_number,
        };

        Box::pin(futures::stream::try_unfold(state, move |state| {
            next_batch(state, batch_size)
        }))
    }
}

/// Read up to `batch_size` rows; `None` once the file is exhausted
async fn next_batch(
    mut state: ReadState,
    batch_size: usize,
) -> Result<Option<(Batch, ReadState)>> {
    let mut batch: Batch = Vec::with_capacity(batch_size.min(4096));

    if let Some(first) = state.pending.take() {
        batch.push(NdjsonReader::row_from(&state.columns, &first));
    }

    while batch.len() < batch_size {
        let Some(lines) = state.lines.as_mut() else {
            break;
        };
        let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read NDJSON line")?
        else {
            state.lines = None;
            break;
        };

        state.line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(&line, state.line_number)?;
        batch.push(NdjsonReader::row_from(&state.columns, &record));
    }

    if batch.is_empty() {
        Ok(None)
    } else {
        Ok(Some((batch, state)))
    }
}

/// Write rows to an NDJSON file
///
/// Each row becomes one JSON object with keys in schema order.
pub struct NdjsonWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    columns: Vec<String>,
    bytes_written: u64,
}

impl NdjsonWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            columns: Vec::new(),
            bytes_written: 0,
        }
    }

    /// Serialize rows into one NDJSON chunk
    fn encode(&self, rows: &[Row]) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(rows.len() * 64);
        for row in rows {
            let object: Record = self
                .columns
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (name.clone(), serde_json::Value::from(value)))
                .collect();
            serde_json::to_writer(&mut buffer, &object)?;
            buffer.push(b'\n');
        }
        Ok(buffer)
    }
}

#[async_trait]
impl Loader for NdjsonWriter {
    async fn initialize(&mut self, schema: &Schema) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(&self.path)
            .await
            .with_context(|| format!("Failed to create NDJSON file: {}", self.path.display()))?;
        self.writer = Some(BufWriter::new(file));
        self.columns = schema.names().map(str::to_string).collect();
        log::debug!("Writing to {}", self.path.display());
        Ok(())
    }

    async fn write_batch(&mut self, rows: &[Row]) -> Result<()> {
        let chunk = self.encode(rows)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| eyre::eyre!("NDJSON writer used before initialize"))?;

        writer
            .write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write NDJSON file: {}", self.path.display()))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    async fn complete(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .await
                .with_context(|| format!("Failed to flush NDJSON file: {}", self.path.display()))?;
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn fixture(content: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", content).unwrap();
        temp
    }

    async fn read_all(path: &Path, batch_size: usize) -> Result<(Schema, Vec<Batch>)> {
        let mut reader = Box::new(NdjsonReader::new(path));
        let schema = reader.open().await?;
        let batches: Vec<Result<Batch>> = reader.into_batches(batch_size).collect().await;
        Ok((schema, batches.into_iter().collect::<Result<Vec<_>>>()?))
    }

    #[tokio::test]
    async fn test_infers_schema_from_first_line() {
        let temp = fixture(
            "{\"ID\": 1, \"NAME\": \"Alice\", \"SCORE\": 1.5, \"ACTIVE\": true}\n\
             \n\
             {\"ID\": 2, \"NAME\": \"Bob\"}\n",
        );

        let (schema, batches) = read_all(temp.path(), 10).await.unwrap();
        let names: Vec<&str> = schema.names().collect();
        assert_eq!(names, vec!["ID", "NAME", "SCORE", "ACTIVE"]);
        assert_eq!(schema.columns()[0].logical_type, LogicalType::Integer);
        assert_eq!(schema.columns()[2].logical_type, LogicalType::Float);
        assert_eq!(schema.columns()[3].logical_type, LogicalType::Boolean);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][1][1], Value::from("Bob"));
        assert_eq!(batches[0][1][2], Value::Null);
    }

    #[tokio::test]
    async fn test_batches_respect_size() {
        let content: String = (0..5).map(|i| format!("{{\"ID\": {}}}\n", i)).collect();
        let temp = fixture(&content);

        let (_, batches) = read_all(temp.path(), 2).await.unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[2][0][0], Value::Int(4));
    }

    #[tokio::test]
    async fn test_rejects_non_object_line() {
        let temp = fixture("{\"ID\": 1}\n[1, 2]\n");
        let err = read_all(temp.path(), 10).await.unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[tokio::test]
    async fn test_empty_file_has_empty_schema() {
        let temp = fixture("\n\n");
        let (schema, batches) = read_all(temp.path(), 10).await.unwrap();
        assert!(schema.is_empty());
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_writer_preserves_column_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.ndjson");
        let schema = Schema::new(vec![
            Column::new("Z", LogicalType::Text),
            Column::new("A", LogicalType::Integer),
        ]);

        let mut writer = NdjsonWriter::new(&path);
        writer.initialize(&schema).await.unwrap();
        writer
            .write_batch(&[
                vec![Value::from("first"), Value::Int(1)],
                vec![Value::Null, Value::Int(2)],
            ])
            .await
            .unwrap();
        writer.complete().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "{\"Z\":\"first\",\"A\":1}\n{\"Z\":null,\"A\":2}\n"
        );
        assert_eq!(writer.bytes_written(), content.len() as u64);
    }

    #[tokio::test]
    async fn test_write_before_initialize_fails() {
        let dir = TempDir::new().unwrap();
        let mut writer = NdjsonWriter::new(dir.path().join("out.ndjson"));
        assert!(writer.write_batch(&[vec![Value::Int(1)]]).await.is_err());
    }
}
