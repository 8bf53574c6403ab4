//! File-system backed medium.

use super::{Medium, MediumFile, OpenMode, StoreLock};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// The real file system.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFs;

impl StdFs {
    pub fn new() -> Self {
        StdFs
    }
}

/// Holds the lock file; fs2 releases the lock when the handle closes.
struct FsLock {
    _file: File,
}

impl StoreLock for FsLock {}

impl Medium for StdFs {
    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn MediumFile>> {
        let file = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(path)?,
            OpenMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
            OpenMode::Overwrite => OpenOptions::new().read(true).write(true).open(path)?,
            OpenMode::Truncate => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
        };
        Ok(Box::new(file))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn lock_exclusive(&self, path: &Path) -> io::Result<Box<dyn StoreLock>> {
        let file = File::create(path)?;
        file.try_lock_exclusive()?;
        Ok(Box::new(FsLock { _file: file }))
    }
}
