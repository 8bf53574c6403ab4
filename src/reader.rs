//! Buffered forward line reader.
//!
//! Every forward scan (size counting, indexed lookup, fragmentation
//! accounting, the compaction source pass) goes through
//! [`BufferedLineReader`]: a finite, non-restartable, lazy sequence of
//! delimiter-terminated lines read through a small fixed buffer. Once
//! exhausted it must be rebuilt (reopen + reseek) to scan again.

use crate::error::{Result, StoreError};
use crate::medium::MediumFile;
use crate::types::Cursor;
use std::io::{Read, Seek, SeekFrom};

/// Line delimiter of the on-disk format.
pub const DELIMITER: u8 = b'\n';

/// One line of the backing file, without its delimiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// Byte offset of the line's first byte.
    pub cursor: Cursor,

    /// Line content, delimiter excluded, untrimmed.
    pub text: String,

    /// Whether a delimiter terminated the line (false only for a
    /// trailing line cut off at end-of-file).
    pub terminated: bool,
}

impl Line {
    /// Bytes this line occupies on disk, delimiter included.
    pub fn frame_len(&self) -> u64 {
        self.text.len() as u64 + u64::from(self.terminated)
    }

    /// A record is live when it is non-empty and its first byte is not
    /// the tombstone sentinel.
    pub fn is_live(&self, tombstone: u8) -> bool {
        !self.text.is_empty() && self.text.as_bytes()[0] != tombstone
    }
}

/// Forward reader over a medium file handle.
pub struct BufferedLineReader {
    file: Box<dyn MediumFile>,
    buf: Vec<u8>,
    buf_pos: usize,
    buf_len: usize,
    next_offset: u64,
    eof: bool,
}

impl BufferedLineReader {
    /// Start reading at `start` with a `capacity`-byte read-ahead buffer.
    pub fn new(mut file: Box<dyn MediumFile>, capacity: usize, start: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(start))?;
        Ok(Self {
            file,
            buf: vec![0u8; capacity.max(1)],
            buf_pos: 0,
            buf_len: 0,
            next_offset: start,
            eof: false,
        })
    }

    fn refill(&mut self) -> Result<()> {
        let n = self.file.read(&mut self.buf)?;
        self.buf_pos = 0;
        self.buf_len = n;
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

impl Iterator for BufferedLineReader {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_offset;
        let mut bytes = Vec::new();
        let mut terminated = false;

        loop {
            if self.buf_pos >= self.buf_len {
                if self.eof {
                    break;
                }
                if let Err(e) = self.refill() {
                    return Some(Err(e));
                }
                if self.buf_len == 0 {
                    break;
                }
            }
            let b = self.buf[self.buf_pos];
            self.buf_pos += 1;
            self.next_offset += 1;
            if b == DELIMITER {
                terminated = true;
                break;
            }
            bytes.push(b);
        }

        if bytes.is_empty() && !terminated {
            return None;
        }

        match String::from_utf8(bytes) {
            Ok(text) => Some(Ok(Line {
                cursor: Cursor(start),
                text,
                terminated,
            })),
            Err(_) => Some(Err(StoreError::Corruption(format!(
                "invalid UTF-8 in record at offset {}",
                start
            )))),
        }
    }
}
