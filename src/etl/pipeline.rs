//! Pipeline orchestration for export runs
//!
//! Three tokio tasks joined by two bounded queues:
//!
//! ```text
//! extractor -> [produce] -> queue A -> [transform] -> queue B -> [consume] -> loader
//! ```
//!
//! Each queue has exactly one sender and one receiver, so rows reach the
//! loader in the order the extractor produced them. A full queue suspends its
//! sender, which throttles the whole pipeline to the slowest stage.

use super::progress::{ExportProgress, NoopObserver, ProgressObserver, RunState};
use super::{Extractor, Loader, TransformerChain};
use crate::schema::{Row, Value};
use eyre::{Context, Result};
use futures::StreamExt;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Rows per source read and per sink write
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Capacity of each inter-stage queue, in rows
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Why a run stopped before the source was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The configured row limit was reached
    Limit,
    /// The caller's cancellation token fired
    Requested,
}

/// Terminal state of a run that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Completed,
    Cancelled(CancelReason),
}

/// Result of a run that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOutcome {
    pub rows_written: u64,
    pub bytes_written: u64,
    pub status: ExportStatus,
}

impl ExportOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == ExportStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, ExportStatus::Cancelled(_))
    }
}

/// How a stage left its loop when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageExit {
    Finished,
    LimitReached,
    Cancelled,
}

/// Export pipeline that connects an [`Extractor`] to a [`Loader`] through a
/// [`TransformerChain`]
///
/// # Example
/// ```no_run
/// use querydump::etl::{Pipeline, TransformerChain};
/// use querydump::storage::{MemoryExtractor, MemoryLoader};
/// use querydump::schema::{Column, LogicalType, Schema, Value};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> eyre::Result<()> {
/// let schema = Schema::new(vec![Column::new("NAME", LogicalType::Text)]);
/// let extractor = MemoryExtractor::new(schema, vec![vec![Value::from("Alice")]]);
/// let loader = MemoryLoader::new();
///
/// let outcome = Pipeline::new(Box::new(extractor), TransformerChain::default(), Box::new(loader))
///     .with_batch_size(100)
///     .run(CancellationToken::new())
///     .await?;
/// println!("Wrote {} rows", outcome.rows_written);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    extractor: Box<dyn Extractor>,
    chain: TransformerChain,
    loader: Box<dyn Loader>,
    batch_size: usize,
    limit: u64,
    queue_capacity: usize,
    observer: Arc<dyn ProgressObserver>,
    progress: Arc<ExportProgress>,
}

impl Pipeline {
    /// Create a new pipeline
    pub fn new(
        extractor: Box<dyn Extractor>,
        chain: TransformerChain,
        loader: Box<dyn Loader>,
    ) -> Self {
        let progress = Arc::new(ExportProgress::new(chain.len()));
        Self {
            extractor,
            chain,
            loader,
            batch_size: DEFAULT_BATCH_SIZE,
            limit: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            observer: Arc::new(NoopObserver),
            progress,
        }
    }

    /// Rows per source read and per sink write (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Stop after this many rows; `0` means unlimited
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Capacity of each inter-stage queue (minimum 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Counters for this run, readable while it executes
    pub fn progress(&self) -> Arc<ExportProgress> {
        Arc::clone(&self.progress)
    }

    /// Run the export to completion, failure or cancellation
    ///
    /// Steps:
    /// 1. Open the source and cascade its schema through the chain
    /// 2. Open the sink with the non-virtual columns
    /// 3. Run produce, transform and consume concurrently
    /// 4. Complete the sink once every stage has joined
    ///
    /// Reaching the row limit is reported as
    /// `ExportStatus::Cancelled(CancelReason::Limit)`, not as an error.
    ///
    /// # Errors
    /// Returns the first error raised by the source, the chain, or the sink
    pub async fn run(self, cancel: CancellationToken) -> Result<ExportOutcome> {
        let progress = Arc::clone(&self.progress);
        let result = self.execute(cancel).await;

        match &result {
            Ok(outcome) => {
                progress.set_state(if outcome.is_completed() {
                    RunState::Completed
                } else {
                    RunState::Cancelled
                });
                match outcome.status {
                    ExportStatus::Completed => {
                        log::info!("Export complete: {} rows", outcome.rows_written)
                    }
                    ExportStatus::Cancelled(CancelReason::Limit) => log::info!(
                        "Export stopped at row limit: {} rows",
                        outcome.rows_written
                    ),
                    ExportStatus::Cancelled(CancelReason::Requested) => log::warn!(
                        "Export cancelled: {} rows written before stopping",
                        outcome.rows_written
                    ),
                }
            }
            Err(e) => {
                progress.set_state(RunState::Failed);
                log::error!("Export failed: {:#}", e);
            }
        }

        result
    }

    async fn execute(self, cancel: CancellationToken) -> Result<ExportOutcome> {
        let Pipeline {
            mut extractor,
            mut chain,
            mut loader,
            batch_size,
            limit,
            queue_capacity,
            observer,
            progress,
        } = self;

        progress.set_state(RunState::Initializing);

        let source_schema = extractor.open().await.wrap_err("Failed to open source")?;
        if source_schema.is_empty() {
            log::warn!("Source returned no columns; writing an empty sink");
            loader
                .initialize(&source_schema)
                .await
                .wrap_err("Failed to initialize sink")?;
            loader.complete().await.wrap_err("Failed to complete sink")?;
            return Ok(ExportOutcome {
                rows_written: 0,
                bytes_written: loader.bytes_written(),
                status: ExportStatus::Completed,
            });
        }
        log::info!("Schema: {} columns", source_schema.len());

        let schema = chain.initialize(&source_schema)?;
        if !chain.is_empty() {
            log::info!("Transformation pipeline: {}", chain.names().join(" -> "));
        }

        let sink_schema = schema.without_virtual();
        loader
            .initialize(&sink_schema)
            .await
            .wrap_err("Failed to initialize sink")?;

        if cancel.is_cancelled() {
            return Ok(ExportOutcome {
                rows_written: 0,
                bytes_written: 0,
                status: ExportStatus::Cancelled(CancelReason::Requested),
            });
        }

        let projection = schema.has_virtual().then(|| schema.exported_indices());
        let token = cancel.child_token();
        let first_error = Arc::new(OnceLock::new());
        let (rows_tx, rows_rx) = mpsc::channel::<Row>(queue_capacity);
        let (out_tx, out_rx) = mpsc::channel::<Row>(queue_capacity);

        progress.set_state(RunState::Running);

        let producer = tokio::spawn(supervise(
            "produce",
            produce(
                extractor,
                rows_tx,
                batch_size,
                limit,
                Arc::clone(&progress),
                Arc::clone(&observer),
                token.clone(),
            ),
            token.clone(),
            Arc::clone(&first_error),
            Some(Arc::clone(&progress)),
        ));

        let transformer = tokio::spawn(supervise(
            "transform",
            transform(
                chain,
                rows_rx,
                out_tx,
                projection,
                batch_size,
                Arc::clone(&progress),
                Arc::clone(&observer),
                token.clone(),
            ),
            token.clone(),
            Arc::clone(&first_error),
            None,
        ));

        let consumer = tokio::spawn(consume(
            loader,
            out_rx,
            batch_size,
            Arc::clone(&progress),
            Arc::clone(&observer),
            token.clone(),
            Arc::clone(&first_error),
        ));

        let produced = join_stage("produce", producer.await, &token, &first_error);
        let transformed = join_stage("transform", transformer.await, &token, &first_error);
        let (loader, consumed) = match consumer.await {
            Ok((loader, exit)) => (Some(loader), exit),
            Err(e) => (
                None,
                record_exit(
                    "consume",
                    Err(eyre::eyre!("Stage panicked: {}", e)),
                    &token,
                    &first_error,
                ),
            ),
        };

        // Every task has joined, so this is normally the last reference
        let failure = match Arc::try_unwrap(first_error) {
            Ok(slot) => slot.into_inner(),
            Err(shared) => shared.get().map(|e| eyre::eyre!("{:#}", e)),
        };
        if let Some(error) = failure {
            return Err(error);
        }

        let rows_written = progress.rows_written();
        let bytes_written = progress.bytes_written();
        let exits = [produced, transformed, consumed];

        if exits.contains(&Some(StageExit::Cancelled)) {
            return Ok(ExportOutcome {
                rows_written,
                bytes_written,
                status: ExportStatus::Cancelled(CancelReason::Requested),
            });
        }

        let mut loader = loader.ok_or_else(|| eyre::eyre!("Sink was lost during the run"))?;
        loader.complete().await.wrap_err("Failed to complete sink")?;

        let status = if produced == Some(StageExit::LimitReached) {
            ExportStatus::Cancelled(CancelReason::Limit)
        } else {
            ExportStatus::Completed
        };

        Ok(ExportOutcome {
            rows_written,
            bytes_written,
            status,
        })
    }
}

/// Run a stage and publish its failure
///
/// The first error wins the `first_error` slot; every error cancels the run
/// so sibling stages unwind instead of waiting on a queue.
async fn supervise(
    stage: &'static str,
    work: impl Future<Output = Result<StageExit>>,
    token: CancellationToken,
    first_error: Arc<OnceLock<eyre::Report>>,
    drain_on_exit: Option<Arc<ExportProgress>>,
) -> Option<StageExit> {
    let result = work.await;
    if let (Ok(StageExit::Finished | StageExit::LimitReached), Some(progress)) =
        (&result, drain_on_exit)
    {
        progress.set_state(RunState::Draining);
    }
    record_exit(stage, result, &token, &first_error)
}

fn record_exit(
    stage: &'static str,
    result: Result<StageExit>,
    token: &CancellationToken,
    first_error: &OnceLock<eyre::Report>,
) -> Option<StageExit> {
    match result {
        Ok(exit) => {
            log::debug!("Stage {} exited: {:?}", stage, exit);
            Some(exit)
        }
        Err(e) => {
            log::debug!("Stage {} failed: {:#}", stage, e);
            let _ = first_error.set(e.wrap_err(format!("Stage '{}' failed", stage)));
            token.cancel();
            None
        }
    }
}

fn join_stage(
    stage: &'static str,
    joined: std::result::Result<Option<StageExit>, tokio::task::JoinError>,
    token: &CancellationToken,
    first_error: &OnceLock<eyre::Report>,
) -> Option<StageExit> {
    match joined {
        Ok(exit) => exit,
        Err(e) => record_exit(
            stage,
            Err(eyre::eyre!("Stage panicked: {}", e)),
            token,
            first_error,
        ),
    }
}

/// Read batches from the source and forward them one row at a time
///
/// `output` is owned here and dropped on every exit path, which closes
/// queue A for the transform stage.
async fn produce(
    extractor: Box<dyn Extractor>,
    output: mpsc::Sender<Row>,
    batch_size: usize,
    limit: u64,
    progress: Arc<ExportProgress>,
    observer: Arc<dyn ProgressObserver>,
    token: CancellationToken,
) -> Result<StageExit> {
    let mut batches = extractor.into_batches(batch_size);
    let mut forwarded: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StageExit::Cancelled),
            next = batches.next() => next,
        };
        let Some(batch) = next else {
            log::debug!("Source exhausted after {} rows", forwarded);
            return Ok(StageExit::Finished);
        };
        let batch = batch.wrap_err("Failed to read batch from source")?;

        let mut sent: u64 = 0;
        for row in batch {
            let delivered = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StageExit::Cancelled),
                res = output.send(row) => res.is_ok(),
            };
            if !delivered {
                // Transform stage is gone; its supervisor reports why
                return Ok(StageExit::Cancelled);
            }

            sent += 1;
            forwarded += 1;
            progress.add_read(1);

            if limit > 0 && forwarded >= limit {
                observer.on_rows_read(sent);
                log::info!("Row limit of {} reached, stopping source", limit);
                return Ok(StageExit::LimitReached);
            }
        }
        observer.on_rows_read(sent);
    }
}

/// Apply the chain to every row, strip virtual columns, and forward
#[allow(clippy::too_many_arguments)]
async fn transform(
    mut chain: TransformerChain,
    mut input: mpsc::Receiver<Row>,
    output: mpsc::Sender<Row>,
    projection: Option<Vec<usize>>,
    report_every: usize,
    progress: Arc<ExportProgress>,
    observer: Arc<dyn ProgressObserver>,
    token: CancellationToken,
) -> Result<StageExit> {
    let names = chain.names();
    let mut pending = vec![0u64; chain.len()];
    let mut since_report = 0usize;

    let flush = |pending: &mut [u64]| {
        for (position, count) in pending.iter_mut().enumerate() {
            if *count > 0 {
                progress.add_transformer_rows(position, *count);
                observer.on_rows_transformed(position, &names[position], *count);
                *count = 0;
            }
        }
    };

    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break StageExit::Cancelled,
            row = input.recv() => row,
        };
        let Some(row) = next else {
            break StageExit::Finished;
        };

        let row = chain.apply(row, |position| pending[position] += 1)?;
        let row = match &projection {
            Some(keep) => project(row, keep),
            None => row,
        };

        let delivered = tokio::select! {
            biased;
            _ = token.cancelled() => break StageExit::Cancelled,
            res = output.send(row) => res.is_ok(),
        };
        if !delivered {
            break StageExit::Cancelled;
        }
        progress.add_transformed(1);

        since_report += 1;
        if since_report >= report_every {
            flush(&mut pending);
            since_report = 0;
        }
    };

    flush(&mut pending);
    Ok(exit)
}

/// Keep only the values at `keep`, in order
fn project(mut row: Row, keep: &[usize]) -> Row {
    keep.iter()
        .map(|&i| std::mem::replace(&mut row[i], Value::Null))
        .collect()
}

/// Rebatch rows and write them to the sink
///
/// The loader is handed back so it can be completed after every stage has
/// joined.
async fn consume(
    mut loader: Box<dyn Loader>,
    mut input: mpsc::Receiver<Row>,
    batch_size: usize,
    progress: Arc<ExportProgress>,
    observer: Arc<dyn ProgressObserver>,
    token: CancellationToken,
    first_error: Arc<OnceLock<eyre::Report>>,
) -> (Box<dyn Loader>, Option<StageExit>) {
    let result = write_all(
        loader.as_mut(),
        &mut input,
        batch_size,
        &progress,
        observer.as_ref(),
        &token,
    )
    .await;
    // Close queue B before reporting so the transform stage cannot block on it
    drop(input);
    let exit = record_exit("consume", result, &token, &first_error);
    (loader, exit)
}

async fn write_all(
    loader: &mut dyn Loader,
    input: &mut mpsc::Receiver<Row>,
    batch_size: usize,
    progress: &ExportProgress,
    observer: &dyn ProgressObserver,
    token: &CancellationToken,
) -> Result<StageExit> {
    let mut buffer: Vec<Row> = Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE));
    let mut last_bytes = loader.bytes_written();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StageExit::Cancelled),
            row = input.recv() => row,
        };
        let Some(row) = next else { break };
        buffer.push(row);

        if buffer.len() >= batch_size
            && !write_batch(loader, &mut buffer, &mut last_bytes, progress, observer, token)
                .await?
        {
            return Ok(StageExit::Cancelled);
        }
    }

    if !buffer.is_empty()
        && !write_batch(loader, &mut buffer, &mut last_bytes, progress, observer, token).await?
    {
        return Ok(StageExit::Cancelled);
    }

    Ok(StageExit::Finished)
}

/// Write and clear `buffer`; returns `false` when cancelled mid-write
async fn write_batch(
    loader: &mut dyn Loader,
    buffer: &mut Vec<Row>,
    last_bytes: &mut u64,
    progress: &ExportProgress,
    observer: &dyn ProgressObserver,
    token: &CancellationToken,
) -> Result<bool> {
    let written = tokio::select! {
        biased;
        _ = token.cancelled() => return Ok(false),
        res = loader.write_batch(&buffer[..]) => res,
    };
    written.wrap_err_with(|| format!("Failed to write batch of {} rows", buffer.len()))?;

    let rows = buffer.len() as u64;
    let bytes = loader.bytes_written();
    let delta = bytes.saturating_sub(*last_bytes);
    *last_bytes = bytes;

    progress.add_written(rows, delta);
    observer.on_rows_written(rows, delta);
    log::debug!("Wrote batch of {} rows ({} bytes)", rows, delta);

    buffer.clear();
    Ok(true)
}
