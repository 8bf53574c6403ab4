//! Core types for the record store.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Byte offset marking a record's start within the backing file.
///
/// Cursors are only meaningful until the next compaction, which rewrites the
/// file and renumbers every offset. They must never be retained across a
/// [`defragment`](crate::RecordStore::defragment) call.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor(pub u64);

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({})", self.0)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Path to the backing file.
    pub path: PathBuf,

    /// Window size for the backward scan, in bytes.
    pub window_size: usize,

    /// Read-ahead buffer size for forward scans, in bytes.
    pub read_buffer: usize,

    /// Sentinel byte that marks a tombstoned record.
    pub tombstone: u8,

    /// Fragmentation ratio at or above which `remove`/`remove_first`
    /// trigger compaction.
    pub defrag_threshold: f64,
}

impl StoreConfig {
    /// Configuration for `path` with default tunables.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./records.dat"),
            window_size: 512,
            read_buffer: 64,
            tombstone: b'$',
            defrag_threshold: 0.6,
        }
    }
}

/// Aggregate read-only snapshot of a store.
#[derive(Clone, Debug, Serialize)]
pub struct StoreStats {
    /// Number of live records.
    pub size: usize,

    /// Fraction of the file occupied by tombstoned records, in `[0, 1]`.
    pub fragmentation: f64,

    /// Total file size in bytes.
    pub file_size: u64,
}
