//! Log compaction.
//!
//! Rewrites the backing file into a fresh sibling temp file, keeping only
//! live records, then swaps the copy into place with remove + rename. The
//! swap is the only destructive step; a failure anywhere before it leaves
//! the original file intact.

use crate::error::{Result, StoreError};
use crate::medium::{Medium, OpenMode};
use crate::reader::{BufferedLineReader, DELIMITER};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One-shot compaction pass over a backing file.
pub struct Compactor<'a> {
    medium: &'a dyn Medium,
    path: &'a Path,
    read_buffer: usize,
    tombstone: u8,
}

impl<'a> Compactor<'a> {
    pub fn new(medium: &'a dyn Medium, path: &'a Path, read_buffer: usize, tombstone: u8) -> Self {
        Self {
            medium,
            path,
            read_buffer,
            tombstone,
        }
    }

    /// Sibling temp file the compacted copy is staged in.
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Rewrite the file keeping only live records.
    ///
    /// Returns the number of records copied, which the caller adopts as the
    /// new live count. An empty source file is a no-op success.
    pub fn run(&self) -> Result<usize> {
        if self.medium.len(self.path)? == 0 {
            return Ok(0);
        }

        let temp = Self::temp_path(self.path);
        let source = self.medium.open(self.path, OpenMode::Read)?;
        let mut dest = self
            .medium
            .open(&temp, OpenMode::Truncate)
            .map_err(|e| StoreError::Compaction(format!("cannot open temp file: {}", e)))?;

        let mut live = 0usize;
        for line in BufferedLineReader::new(source, self.read_buffer, 0)? {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    drop(dest);
                    self.discard_temp(&temp);
                    return Err(e);
                }
            };
            if !line.is_live(self.tombstone) {
                continue;
            }
            let write = dest
                .write_all(line.text.trim().as_bytes())
                .and_then(|_| dest.write_all(&[DELIMITER]));
            if let Err(e) = write {
                drop(dest);
                self.discard_temp(&temp);
                return Err(StoreError::Compaction(format!(
                    "write to temp file failed: {}",
                    e
                )));
            }
            live += 1;
        }

        if let Err(e) = dest.flush() {
            drop(dest);
            self.discard_temp(&temp);
            return Err(StoreError::Compaction(format!(
                "flush of temp file failed: {}",
                e
            )));
        }
        drop(dest);

        if let Err(e) = self.medium.remove(self.path) {
            self.discard_temp(&temp);
            return Err(StoreError::Compaction(format!(
                "cannot remove original file: {}",
                e
            )));
        }
        if let Err(e) = self.medium.rename(&temp, self.path) {
            self.discard_temp(&temp);
            return Err(StoreError::Compaction(format!(
                "cannot rename temp file into place: {}",
                e
            )));
        }

        debug!(live, path = %self.path.display(), "compaction complete");
        Ok(live)
    }

    fn discard_temp(&self, temp: &Path) {
        if let Err(e) = self.medium.remove(temp) {
            warn!(temp = %temp.display(), "failed to discard temp file: {}", e);
        }
    }
}
