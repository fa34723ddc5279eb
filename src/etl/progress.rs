//! Progress accounting for export runs
//!
//! [`ExportProgress`] holds the atomic counters shared by the pipeline
//! stages; [`ProgressObserver`] receives the deltas as they happen.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Lifecycle of one export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Initializing = 0,
    Running = 1,
    Draining = 2,
    Completed = 3,
    Failed = 4,
    Cancelled = 5,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunState::Initializing,
            1 => RunState::Running,
            2 => RunState::Draining,
            3 => RunState::Completed,
            4 => RunState::Failed,
            _ => RunState::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Initializing => "initializing",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Callbacks for progress deltas
///
/// Every method has a no-op default so observers only implement what they
/// display. Calls arrive from the stage tasks, hence `Send + Sync`.
pub trait ProgressObserver: Send + Sync {
    /// Rows pulled from the source since the previous call
    fn on_rows_read(&self, _rows: u64) {}

    /// Rows processed by the transformer at `position` since the previous call
    fn on_rows_transformed(&self, _position: usize, _name: &str, _rows: u64) {}

    /// Rows handed to the sink, with the bytes the sink reported for them
    fn on_rows_written(&self, _rows: u64, _bytes: u64) {}
}

/// Observer that ignores every callback
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Counters for one run
///
/// Updated with atomic adds from the three stages; read at any time by a
/// reporter.
#[derive(Debug)]
pub struct ExportProgress {
    state: AtomicU8,
    rows_read: AtomicU64,
    rows_transformed: AtomicU64,
    rows_written: AtomicU64,
    bytes_written: AtomicU64,
    per_transformer: Vec<AtomicU64>,
}

impl Default for ExportProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ExportProgress {
    /// Create counters for a chain of `transformers` elements
    pub fn new(transformers: usize) -> Self {
        Self {
            state: AtomicU8::new(RunState::Initializing as u8),
            rows_read: AtomicU64::new(0),
            rows_transformed: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            per_transformer: (0..transformers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: RunState) {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        log::debug!(
            "Export state: {} -> {}",
            RunState::from_u8(previous),
            state
        );
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read.load(Ordering::Relaxed)
    }

    pub fn rows_transformed(&self) -> u64 {
        self.rows_transformed.load(Ordering::Relaxed)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Rows processed by the transformer at `position`
    pub fn transformer_rows(&self, position: usize) -> u64 {
        self.per_transformer
            .get(position)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub(crate) fn add_read(&self, rows: u64) {
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    pub(crate) fn add_transformed(&self, rows: u64) {
        self.rows_transformed.fetch_add(rows, Ordering::Relaxed);
    }

    pub(crate) fn add_transformer_rows(&self, position: usize, rows: u64) {
        if let Some(counter) = self.per_transformer.get(position) {
            counter.fetch_add(rows, Ordering::Relaxed);
        }
    }

    pub(crate) fn add_written(&self, rows: u64, bytes: u64) {
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            state: self.state(),
            rows_read: self.rows_read(),
            rows_transformed: self.rows_transformed(),
            rows_written: self.rows_written(),
            bytes_written: self.bytes_written(),
        }
    }
}

/// Plain copy of [`ExportProgress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub state: RunState,
    pub rows_read: u64,
    pub rows_transformed: u64,
    pub rows_written: u64,
    pub bytes_written: u64,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} read, {} transformed, {} written ({})",
            self.state,
            self.rows_read,
            self.rows_transformed,
            self.rows_written,
            format_bytes(self.bytes_written)
        )
    }
}

/// Human readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
