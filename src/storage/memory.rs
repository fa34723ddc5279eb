//! In-memory extractor and loader
//!
//! Used to embed the pipeline in other programs and to drive it in tests.

use crate::etl::{BatchStream, Extractor, Loader};
use crate::schema::{Batch, Row, Schema};
use async_trait::async_trait;
use eyre::Result;
use std::sync::{Arc, Mutex, MutexGuard};

/// Serve a fixed set of rows
pub struct MemoryExtractor {
    schema: Schema,
    rows: Vec<Row>,
}

impl MemoryExtractor {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }
}

#[async_trait]
impl Extractor for MemoryExtractor {
    async fn open(&mut self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    fn into_batches(self: Box<Self>, batch_size: usize) -> BatchStream {
        let batch_size = batch_size.max(1);
        let mut rows = self.rows.into_iter().peekable();
        let batches = std::iter::from_fn(move || {
            rows.peek()?;
            let batch: Result<Batch> = Ok(rows.by_ref().take(batch_size).collect());
            Some(batch)
        });
        Box::pin(futures::stream::iter(batches))
    }
}

#[derive(Debug, Default)]
struct Collected {
    schema: Option<Schema>,
    batches: Vec<Vec<Row>>,
    completed: bool,
}

/// Collect written batches
///
/// Clones share the same buffer, so a test can keep one handle and give the
/// other to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    inner: Arc<Mutex<Collected>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collected> {
        // A poisoned buffer still holds every batch written before the panic
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schema passed to `initialize`, if it was called
    pub fn schema(&self) -> Option<Schema> {
        self.lock().schema.clone()
    }

    /// Every batch in write order
    pub fn batches(&self) -> Vec<Vec<Row>> {
        self.lock().batches.clone()
    }

    /// Every row in write order
    pub fn rows(&self) -> Vec<Row> {
        self.lock().batches.iter().flatten().cloned().collect()
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }
}

#[async_trait]
impl Loader for MemoryLoader {
    async fn initialize(&mut self, schema: &Schema) -> Result<()> {
        self.lock().schema = Some(schema.clone());
        Ok(())
    }

    async fn write_batch(&mut self, rows: &[Row]) -> Result<()> {
        self.lock().batches.push(rows.to_vec());
        Ok(())
    }

    async fn complete(&mut self) -> Result<()> {
        let mut collected = self.lock();
        if collected.completed {
            eyre::bail!("Loader completed twice");
        }
        collected.completed = true;
        Ok(())
    }
}
