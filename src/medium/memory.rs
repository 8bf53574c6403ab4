//! In-memory medium for testing.

use super::{Medium, MediumFile, OpenMode, StoreLock};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type FileData = Arc<RwLock<Vec<u8>>>;

/// An in-memory medium.
///
/// Stores every file as a byte vector, suitable for unit and integration
/// tests that need to drive exact buffer boundaries without touching disk.
/// Clones share the same files.
#[derive(Clone, Default)]
pub struct MemoryMedium {
    files: Arc<Mutex<HashMap<PathBuf, FileData>>>,
    locks: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MemoryMedium {
    /// Creates a new empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the raw bytes of `path`, if it exists.
    ///
    /// Useful for asserting on the on-disk layout in tests.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).map(|d| d.read().clone())
    }

    /// Replaces the contents of `path`, creating it if needed.
    pub fn write_file(&self, path: &Path, data: Vec<u8>) {
        let mut files = self.files.lock();
        match files.get(path) {
            Some(existing) => *existing.write() = data,
            None => {
                files.insert(path.to_path_buf(), Arc::new(RwLock::new(data)));
            }
        }
    }
}

struct MemoryFile {
    data: FileData,
    pos: u64,
    mode: OpenMode,
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.read();
        let pos = self.pos.min(data.len() as u64) as usize;
        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        drop(data);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode == OpenMode::Read {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file opened read-only",
            ));
        }
        let mut data = self.data.write();
        if self.mode == OpenMode::Append {
            self.pos = data.len() as u64;
        }
        let pos = self.pos as usize;
        if pos + buf.len() > data.len() {
            data.resize(pos + buf.len(), 0);
        }
        data[pos..pos + buf.len()].copy_from_slice(buf);
        drop(data);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.read().len() as i64;
        let target = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => len + n,
            SeekFrom::Current(n) => self.pos as i64 + n,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

struct MemoryLock {
    locks: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl StoreLock for MemoryLock {}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.path);
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

impl Medium for MemoryMedium {
    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn MediumFile>> {
        let mut files = self.files.lock();
        let data = match mode {
            OpenMode::Read | OpenMode::Overwrite => {
                files.get(path).cloned().ok_or_else(|| not_found(path))?
            }
            OpenMode::Append => files
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                .clone(),
            OpenMode::Truncate => {
                let data = files
                    .entry(path.to_path_buf())
                    .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                    .clone();
                data.write().clear();
                data
            }
        };
        Ok(Box::new(MemoryFile { data, pos: 0, mode }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        self.files
            .lock()
            .get(path)
            .map(|d| d.read().len() as u64)
            .ok_or_else(|| not_found(path))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn lock_exclusive(&self, path: &Path) -> io::Result<Box<dyn StoreLock>> {
        let mut locks = self.locks.lock();
        if !locks.insert(path.to_path_buf()) {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "path already locked",
            ));
        }
        Ok(Box::new(MemoryLock {
            locks: Arc::clone(&self.locks),
            path: path.to_path_buf(),
        }))
    }
}
