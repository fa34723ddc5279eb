//! QueryDump
//!
//! Streams tabular data from a source to a sink through an ordered chain of
//! row transformers that anonymize, overwrite, fake or derive column values.

pub mod cli;
pub mod config;
pub mod etl;
pub mod export;
pub mod hash;
pub mod schema;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use config::{ExportConfig, FakeOptions, TransformerSpec};
pub use etl::{
    CancelReason, ExportOutcome, ExportProgress, ExportStatus, Extractor, Loader, Pipeline,
    Transformer, TransformerChain,
};
pub use export::{describe, prepare, run_export};
pub use schema::{Column, LogicalType, Row, Schema, Value};
pub use storage::{MemoryExtractor, MemoryLoader, NdjsonReader, NdjsonWriter};
