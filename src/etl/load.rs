//! Loader trait for writing rows to a sink

use crate::schema::{Row, Schema};
use async_trait::async_trait;
use eyre::Result;

/// Loader trait for loading rows to a destination
///
/// Implementors define how batches are written to destinations:
/// - NDJSON files
/// - Databases
/// - In-memory collectors
///
/// The pipeline calls `initialize` once with the sink-facing schema,
/// `write_batch` once per batch, and `complete` once after every stage has
/// finished successfully.
///
/// # Example
/// ```no_run
/// use querydump::etl::Loader;
/// use querydump::schema::{Row, Schema};
/// use async_trait::async_trait;
/// use eyre::Result;
///
/// #[derive(Default)]
/// struct Collector {
///     rows: Vec<Row>,
/// }
///
/// #[async_trait]
/// impl Loader for Collector {
///     async fn initialize(&mut self, _schema: &Schema) -> Result<()> {
///         Ok(())
///     }
///
///     async fn write_batch(&mut self, rows: &[Row]) -> Result<()> {
///         self.rows.extend_from_slice(rows);
///         Ok(())
///     }
///
///     async fn complete(&mut self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Loader: Send {
    /// Prepare the destination for rows of `schema`
    ///
    /// # Errors
    /// Returns an error if the destination cannot be created
    async fn initialize(&mut self, schema: &Schema) -> Result<()>;

    /// Write one batch of rows
    ///
    /// # Errors
    /// Returns an error if writing fails (I/O, serialization, ...)
    async fn write_batch(&mut self, rows: &[Row]) -> Result<()>;

    /// Flush and finalize the destination
    ///
    /// # Errors
    /// Returns an error if the final flush fails
    async fn complete(&mut self) -> Result<()>;

    /// Cumulative bytes written so far
    fn bytes_written(&self) -> u64 {
        0
    }
}
