//! Extractor trait for reading rows from a source

use crate::schema::{Batch, Schema};
use async_trait::async_trait;
use eyre::Result;
use futures::Stream;
use std::pin::Pin;

/// A lazy, finite stream of row batches
pub type BatchStream = Pin<Box<dyn Stream<Item = Result<Batch>> + Send>>;

/// Extractor trait for extracting rows from a source
///
/// Implementors define how to read tabular data from sources like:
/// - NDJSON files
/// - Databases
/// - In-memory fixtures
///
/// The batch stream can be taken only once: `into_batches` consumes the
/// extractor, so a source is never restarted within a run.
///
/// # Example
/// ```no_run
/// use querydump::etl::{BatchStream, Extractor};
/// use querydump::schema::{Batch, Column, LogicalType, Schema};
/// use async_trait::async_trait;
/// use eyre::Result;
///
/// struct Fixture {
///     batches: Vec<Batch>,
/// }
///
/// #[async_trait]
/// impl Extractor for Fixture {
///     async fn open(&mut self) -> Result<Schema> {
///         Ok(Schema::new(vec![Column::new("ID", LogicalType::Integer)]))
///     }
///
///     fn into_batches(self: Box<Self>, _batch_size: usize) -> BatchStream {
///         Box::pin(futures::stream::iter(self.batches.into_iter().map(Ok)))
///     }
/// }
/// ```
#[async_trait]
pub trait Extractor: Send {
    /// Open the source and report its schema
    ///
    /// # Errors
    /// Returns an error if the source cannot be opened or described
    async fn open(&mut self) -> Result<Schema>;

    /// Stream the rows in batches of at most `batch_size`
    ///
    /// Only called after a successful [`Extractor::open`].
    fn into_batches(self: Box<Self>, batch_size: usize) -> BatchStream;
}
