//! Fixed-window backward scan.
//!
//! Locates the most recent live record from end-of-file without loading the
//! whole file: the scanner steps back one window at a time, classifies every
//! delimiter it sees right-to-left, and resolves candidates with short
//! forward reads. Window classification is a pure function
//! ([`scan_window`]) so boundary handling is testable without I/O.

use crate::error::{Result, StoreError};
use crate::medium::{Medium, MediumFile, OpenMode};
use crate::reader::DELIMITER;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// A possible record start discovered while scanning a window backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Candidate {
    /// Record starts at `start`; its first byte lies outside this window,
    /// in the already-scanned region or past end-of-file.
    Boundary { start: u64 },

    /// Record starts at `start` and `first` is its first byte, so the
    /// tombstone check needs no extra read.
    Inline { start: u64, first: u8 },
}

impl Candidate {
    pub fn start(&self) -> u64 {
        match *self {
            Candidate::Boundary { start } => start,
            Candidate::Inline { start, .. } => start,
        }
    }
}

/// Classify one window right-to-left.
///
/// `base` is the file offset of `buf[0]`. Candidates come back in scan
/// order, highest start offset first. A delimiter at the window's last byte
/// becomes a [`Candidate::Boundary`]; any other delimiter exposes the
/// following byte as the candidate's first. When the window touches offset 0
/// the remaining prefix forms the final candidate.
pub fn scan_window(buf: &[u8], base: u64) -> Vec<Candidate> {
    let mut found = Vec::new();
    for i in (0..buf.len()).rev() {
        if buf[i] == DELIMITER {
            let start = base + i as u64 + 1;
            if i + 1 == buf.len() {
                found.push(Candidate::Boundary { start });
            } else {
                found.push(Candidate::Inline {
                    start,
                    first: buf[i + 1],
                });
            }
        } else if i == 0 && base == 0 {
            found.push(Candidate::Inline {
                start: 0,
                first: buf[0],
            });
        }
    }
    found
}

/// Backward scanner over one backing file.
pub struct BackwardScanner {
    file: Box<dyn MediumFile>,
    file_len: u64,
    window_size: usize,
    tombstone: u8,
}

impl BackwardScanner {
    /// Open `path` for a single backward pass.
    pub fn new(
        medium: &dyn Medium,
        path: &Path,
        window_size: usize,
        tombstone: u8,
    ) -> Result<Self> {
        let file_len = medium.len(path)?;
        let file = medium.open(path, OpenMode::Read)?;
        Ok(Self {
            file,
            file_len,
            window_size: window_size.max(1),
            tombstone,
        })
    }

    /// Trimmed payload of the highest-offset live record, or `None` when the
    /// whole file holds no live record.
    pub fn last_live(mut self) -> Result<Option<String>> {
        let mut window = vec![0u8; self.window_size];
        let mut pos = self.file_len;

        while pos > 0 {
            let read_size = self.window_size.min(pos as usize);
            pos -= read_size as u64;
            self.file.seek(SeekFrom::Start(pos))?;
            self.file.read_exact(&mut window[..read_size])?;

            for candidate in scan_window(&window[..read_size], pos) {
                if let Some(payload) = self.resolve(candidate)? {
                    return Ok(Some(payload));
                }
            }
        }

        Ok(None)
    }

    /// Check a candidate for liveness, reading forward from its start when
    /// the first byte is not already known.
    fn resolve(&mut self, candidate: Candidate) -> Result<Option<String>> {
        if let Candidate::Inline { first, .. } = candidate {
            if first == self.tombstone {
                return Ok(None);
            }
        }

        let raw = self.read_line_from(candidate.start())?;
        if matches!(candidate, Candidate::Boundary { .. }) {
            match raw.as_bytes().first() {
                Some(&b) if b != self.tombstone => {}
                _ => return Ok(None),
            }
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    fn read_line_from(&mut self, offset: u64) -> Result<String> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 64];
        'read: loop {
            let n = self.file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            for &b in &chunk[..n] {
                if b == DELIMITER {
                    break 'read;
                }
                bytes.push(b);
            }
        }
        String::from_utf8(bytes).map_err(|_| {
            StoreError::Corruption(format!("invalid UTF-8 in record at offset {}", offset))
        })
    }
}
