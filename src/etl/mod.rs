//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides the trait definitions for sources, sinks and row
//! transformers, and the concurrent [`Pipeline`] that connects them.

mod extract;
mod load;
mod pipeline;
mod progress;
mod transform;

pub use extract::{BatchStream, Extractor};
pub use load::Loader;
pub use pipeline::{
    CancelReason, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY, ExportOutcome, ExportStatus,
    Pipeline,
};
pub use progress::{
    ExportProgress, NoopObserver, ProgressObserver, ProgressSnapshot, RunState, format_bytes,
};
pub use transform::{Transformer, TransformerChain};
