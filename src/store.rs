//! Main RecordStore tying all components together.

use crate::codec::{PayloadCodec, PlainCodec};
use crate::compact::Compactor;
use crate::error::{Result, StoreError};
use crate::medium::{Medium, OpenMode, StdFs, StoreLock};
use crate::reader::{BufferedLineReader, Line, DELIMITER};
use crate::scan::BackwardScanner;
use crate::types::{StoreConfig, StoreStats};
use parking_lot::RwLock;
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A single-file FIFO record store.
///
/// Records are appended as delimiter-terminated lines; deletion tombstones a
/// record in place, and compaction rewrites the file once tombstones take up
/// enough of it. The store keeps only a cached live-record count in memory,
/// so arbitrarily large files can be driven with a fixed-size buffer.
///
/// All file access goes through an injected [`Medium`], payload validation
/// through an injected [`PayloadCodec`]. Operations are fallible and never
/// poison the store; serializing access to one store is the caller's
/// obligation.
pub struct RecordStore {
    /// Store configuration.
    config: StoreConfig,

    /// Storage medium hosting the backing file.
    medium: Arc<dyn Medium>,

    /// Payload validation.
    codec: Arc<dyn PayloadCodec>,

    /// Exclusive lock on the backing path, held for the store's lifetime.
    _lock: Box<dyn StoreLock>,

    /// Cached count of live records. Invariant: equals the number of lines
    /// on disk whose first byte is not the tombstone sentinel.
    size: RwLock<usize>,
}

impl RecordStore {
    /// Open or create a store at `path` on the real file system, accepting
    /// any line-safe payload.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(
            StoreConfig::new(path),
            Arc::new(StdFs::new()),
            Arc::new(PlainCodec),
        )
    }

    /// Open or create a store with explicit configuration, medium, and codec.
    pub fn open_with(
        config: StoreConfig,
        medium: Arc<dyn Medium>,
        codec: Arc<dyn PayloadCodec>,
    ) -> Result<Self> {
        let lock = medium
            .lock_exclusive(&Self::lock_path(&config.path))
            .map_err(|e| match e.kind() {
                ErrorKind::WouldBlock => StoreError::Locked,
                _ => StoreError::Io(e),
            })?;

        if !medium.exists(&config.path) {
            medium.open(&config.path, OpenMode::Append)?;
        }

        let size = Self::count_live(medium.as_ref(), &config)?;
        debug!(size, path = %config.path.display(), "opened store");

        Ok(Self {
            config,
            medium,
            codec,
            _lock: lock,
            size: RwLock::new(size),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // --- Record Operations ---

    /// Append a record.
    ///
    /// The payload is trimmed before writing; empty, delimiter-containing,
    /// sentinel-leading, or codec-invalid payloads are rejected. The cached
    /// size is only adjusted after the write committed.
    pub fn push(&self, payload: &str) -> Result<()> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(StoreError::InvalidPayload("empty payload".into()));
        }
        if payload.as_bytes().contains(&DELIMITER) {
            return Err(StoreError::InvalidPayload(
                "payload contains the line delimiter".into(),
            ));
        }
        if payload.as_bytes()[0] == self.config.tombstone {
            return Err(StoreError::InvalidPayload(
                "payload starts with the tombstone sentinel".into(),
            ));
        }
        if !self.codec.is_valid(payload) {
            return Err(StoreError::InvalidPayload(
                "payload rejected by codec".into(),
            ));
        }

        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload.as_bytes());
        frame.push(DELIMITER);

        let mut file = self.medium.open(&self.config.path, OpenMode::Append)?;
        file.write_all(&frame)?;
        if let Err(e) = file.flush() {
            warn!("flush after append failed: {}", e);
        }

        *self.size.write() += 1;
        trace!(len = payload.len(), "pushed record");
        Ok(())
    }

    /// Number of live records.
    pub fn size(&self) -> usize {
        *self.size.read()
    }

    /// Whether the store holds no live records.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Payload of the `index`-th live record (FIFO order).
    pub fn get(&self, index: usize) -> Result<String> {
        let size = self.size();
        if index >= size {
            return Err(StoreError::IndexOutOfBounds { index, size });
        }
        match self.find_live(index)? {
            Some(line) => Ok(line.text.trim().to_string()),
            None => Err(StoreError::Corruption(format!(
                "live record {} missing on disk (cached size {})",
                index, size
            ))),
        }
    }

    /// Payload of the most recent live record.
    ///
    /// Uses the fixed-window backward scan, so only `window_size` bytes are
    /// resident at a time no matter how large the file is.
    pub fn get_last(&self) -> Result<String> {
        if self.is_empty() {
            return Err(StoreError::Empty);
        }
        let scanner = BackwardScanner::new(
            self.medium.as_ref(),
            &self.config.path,
            self.config.window_size,
            self.config.tombstone,
        )?;
        match scanner.last_live()? {
            Some(payload) => Ok(payload),
            None => Err(StoreError::Corruption(
                "no live record on disk despite non-zero cached size".into(),
            )),
        }
    }

    /// The first `min(count, size)` live payloads, in FIFO order.
    ///
    /// All-or-nothing: if any collected payload fails codec validation the
    /// whole result is discarded and `Corruption` is returned.
    pub fn get_first(&self, count: usize) -> Result<Vec<String>> {
        let want = count.min(self.size());
        let mut out = Vec::with_capacity(want);
        if want == 0 {
            return Ok(out);
        }
        for line in self.forward_reader()? {
            let line = line?;
            if !line.is_live(self.config.tombstone) {
                continue;
            }
            let payload = line.text.trim().to_string();
            if !self.codec.is_valid(&payload) {
                return Err(StoreError::Corruption(format!(
                    "record at offset {} failed payload validation",
                    line.cursor
                )));
            }
            out.push(payload);
            if out.len() == want {
                break;
            }
        }
        Ok(out)
    }

    /// Tombstone the `index`-th live record in place and return its payload.
    ///
    /// Triggers compaction automatically when the fragmentation threshold is
    /// reached; a failed auto-compaction is logged, not propagated.
    pub fn remove(&self, index: usize) -> Result<String> {
        let size = self.size();
        if index >= size {
            return Err(StoreError::IndexOutOfBounds { index, size });
        }
        let line = self.find_live(index)?.ok_or_else(|| {
            StoreError::Corruption(format!(
                "live record {} missing on disk (cached size {})",
                index, size
            ))
        })?;

        let mut file = self.medium.open(&self.config.path, OpenMode::Overwrite)?;
        file.seek(SeekFrom::Start(line.cursor.0))?;
        file.write_all(&[self.config.tombstone])?;
        if let Err(e) = file.flush() {
            warn!("flush after tombstoning failed: {}", e);
        }
        drop(file);

        *self.size.write() -= 1;
        debug!(index, cursor = %line.cursor, "tombstoned record");

        self.auto_defragment();
        Ok(line.text.trim().to_string())
    }

    /// Tombstone up to `min(count, size)` records from the front.
    ///
    /// One forward pass collects the cursors, a second pass tombstones them.
    /// Returns the number actually removed; the cached size only shrinks by
    /// tombstones that committed.
    pub fn remove_first(&self, count: usize) -> Result<usize> {
        let want = count.min(self.size());
        if want == 0 {
            return Ok(0);
        }

        let mut cursors = Vec::with_capacity(want);
        for line in self.forward_reader()? {
            let line = line?;
            if line.is_live(self.config.tombstone) {
                cursors.push(line.cursor);
                if cursors.len() == want {
                    break;
                }
            }
        }

        let mut file = self.medium.open(&self.config.path, OpenMode::Overwrite)?;
        let mut removed = 0usize;
        for cursor in cursors {
            let committed = file
                .seek(SeekFrom::Start(cursor.0))
                .and_then(|_| file.write_all(&[self.config.tombstone]));
            if let Err(e) = committed {
                warn!(cursor = %cursor, "tombstone write failed: {}", e);
                break;
            }
            removed += 1;
        }
        if let Err(e) = file.flush() {
            warn!("flush after tombstoning failed: {}", e);
        }
        drop(file);

        *self.size.write() -= removed;
        debug!(removed, "removed records from the front");

        self.auto_defragment();
        Ok(removed)
    }

    /// Delete every record by removing and recreating the backing file.
    pub fn clear(&self) -> Result<()> {
        let mut size = self.size.write();
        if self.medium.exists(&self.config.path) {
            self.medium.remove(&self.config.path)?;
        }
        self.medium.open(&self.config.path, OpenMode::Truncate)?;
        *size = 0;
        debug!("cleared store");
        Ok(())
    }

    // --- Fragmentation & Compaction ---

    /// Fraction of the file occupied by tombstoned records, in `[0, 1]`.
    ///
    /// Valid bytes are `line length + 1` summed over live lines; an empty
    /// file has ratio 0.
    pub fn fragmentation_ratio(&self) -> Result<f64> {
        let total = self.medium.len(&self.config.path)?;
        if total == 0 {
            return Ok(0.0);
        }
        let mut valid = 0u64;
        for line in self.forward_reader()? {
            let line = line?;
            if line.is_live(self.config.tombstone) {
                valid += line.text.len() as u64 + 1;
            }
        }
        Ok(total.saturating_sub(valid) as f64 / total as f64)
    }

    /// Whether the fragmentation ratio is at or above `threshold`.
    pub fn should_defragment(&self, threshold: f64) -> Result<bool> {
        Ok(self.fragmentation_ratio()? >= threshold)
    }

    /// Rewrite the backing file, physically dropping tombstoned records.
    ///
    /// On success the cached size is recomputed from the copy count. On
    /// failure the pre-compaction file is left intact and fragmentation
    /// simply stays elevated. Any [`Cursor`](crate::Cursor) captured before
    /// this call is invalid afterward.
    pub fn defragment(&self) -> Result<()> {
        let mut size = self.size.write();
        let live = Compactor::new(
            self.medium.as_ref(),
            &self.config.path,
            self.config.read_buffer,
            self.config.tombstone,
        )
        .run()?;
        *size = live;
        Ok(())
    }

    /// Aggregate read-only snapshot.
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            size: self.size(),
            fragmentation: self.fragmentation_ratio()?,
            file_size: self.medium.len(&self.config.path)?,
        })
    }

    // --- Private Helpers ---

    fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn count_live(medium: &dyn Medium, config: &StoreConfig) -> Result<usize> {
        let file = medium.open(&config.path, OpenMode::Read)?;
        let mut count = 0usize;
        for line in BufferedLineReader::new(file, config.read_buffer, 0)? {
            if line?.is_live(config.tombstone) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn forward_reader(&self) -> Result<BufferedLineReader> {
        let file = self.medium.open(&self.config.path, OpenMode::Read)?;
        BufferedLineReader::new(file, self.config.read_buffer, 0)
    }

    /// Forward scan to the `index`-th live line.
    fn find_live(&self, index: usize) -> Result<Option<Line>> {
        let mut seen = 0usize;
        for line in self.forward_reader()? {
            let line = line?;
            if !line.is_live(self.config.tombstone) {
                continue;
            }
            if seen == index {
                return Ok(Some(line));
            }
            seen += 1;
        }
        Ok(None)
    }

    fn auto_defragment(&self) {
        match self.should_defragment(self.config.defrag_threshold) {
            Ok(true) => {
                if let Err(e) = self.defragment() {
                    warn!("automatic compaction failed: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!("fragmentation check failed: {}", e),
        }
    }
}
