//! Error handling and failure-injection tests.

use fifolog::{
    JsonCodec, Medium, MediumFile, MemoryMedium, OpenMode, PlainCodec, RecordStore, StoreConfig,
    StoreError, StoreLock,
};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn memory_store(medium: &MemoryMedium) -> RecordStore {
    RecordStore::open_with(
        StoreConfig::new("queue.dat"),
        Arc::new(medium.clone()),
        Arc::new(PlainCodec),
    )
    .unwrap()
}

// --- Index & emptiness errors ---

#[test]
fn test_get_out_of_bounds() {
    let medium = MemoryMedium::new();
    let store = memory_store(&medium);
    store.push("only").unwrap();

    let result = store.get(1);
    assert!(matches!(
        result,
        Err(StoreError::IndexOutOfBounds { index: 1, size: 1 })
    ));
}

#[test]
fn test_remove_out_of_bounds() {
    let medium = MemoryMedium::new();
    let store = memory_store(&medium);

    assert!(matches!(
        store.remove(0),
        Err(StoreError::IndexOutOfBounds { index: 0, size: 0 })
    ));
}

#[test]
fn test_get_last_on_empty_store() {
    let medium = MemoryMedium::new();
    let store = memory_store(&medium);

    assert!(matches!(store.get_last(), Err(StoreError::Empty)));
}

#[test]
fn test_remove_first_on_empty_store() {
    let medium = MemoryMedium::new();
    let store = memory_store(&medium);

    assert_eq!(store.remove_first(5).unwrap(), 0);
}

// --- Codec validation ---

#[test]
fn test_get_first_is_all_or_nothing() {
    // A store opened with the JSON codec over a file holding one good and
    // one bad line: the bad element discards the whole result.
    let medium = MemoryMedium::new();
    medium.write_file(
        Path::new("queue.dat"),
        b"{\"ok\":1}\n{broken\n{\"ok\":2}\n".to_vec(),
    );

    let store = RecordStore::open_with(
        StoreConfig::new("queue.dat"),
        Arc::new(medium),
        Arc::new(JsonCodec),
    )
    .unwrap();

    assert!(store.get_first(1).is_ok());
    assert!(matches!(
        store.get_first(2),
        Err(StoreError::Corruption(_))
    ));
}

// --- Locking ---

#[test]
fn test_double_open_on_disk_is_locked() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.dat");

    let _store = RecordStore::open(&path).unwrap();
    assert!(matches!(
        RecordStore::open(&path),
        Err(StoreError::Locked)
    ));
}

#[test]
fn test_lock_released_on_drop() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.dat");

    drop(RecordStore::open(&path).unwrap());
    assert!(RecordStore::open(&path).is_ok());
}

// --- Failure injection ---

/// Medium wrapper that injects failures at configurable points.
#[derive(Clone, Default)]
struct FaultyMedium {
    inner: MemoryMedium,
    fail_truncate_open: Arc<AtomicBool>,
    fail_remove_of: Arc<parking_lot::Mutex<Option<PathBuf>>>,
    fail_rename: Arc<AtomicBool>,
    fail_overwrite_open: Arc<AtomicBool>,
    /// Bytes the next Truncate handle accepts before erroring (usize::MAX
    /// when unlimited).
    write_budget: Arc<AtomicUsize>,
}

impl FaultyMedium {
    fn new() -> Self {
        let medium = Self::default();
        medium.write_budget.store(usize::MAX, Ordering::SeqCst);
        medium
    }
}

/// File handle that fails writes once the shared budget runs out.
struct BudgetedFile {
    inner: Box<dyn MediumFile>,
    budget: Arc<AtomicUsize>,
}

impl Read for BudgetedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BudgetedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let budget = self.budget.load(Ordering::SeqCst);
        if buf.len() > budget {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "medium full"));
        }
        self.budget.store(budget - buf.len(), Ordering::SeqCst);
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for BudgetedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Medium for FaultyMedium {
    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn MediumFile>> {
        match mode {
            OpenMode::Truncate if self.fail_truncate_open.load(Ordering::SeqCst) => {
                return Err(io::Error::new(io::ErrorKind::Other, "injected open failure"));
            }
            OpenMode::Overwrite if self.fail_overwrite_open.load(Ordering::SeqCst) => {
                return Err(io::Error::new(io::ErrorKind::Other, "injected open failure"));
            }
            _ => {}
        }
        let inner = self.inner.open(path, mode)?;
        Ok(Box::new(BudgetedFile {
            inner,
            budget: Arc::clone(&self.write_budget),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        self.inner.len(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove_of.lock().as_deref() == Some(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected remove failure",
            ));
        }
        self.inner.remove(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected rename failure",
            ));
        }
        self.inner.rename(from, to)
    }

    fn lock_exclusive(&self, path: &Path) -> io::Result<Box<dyn StoreLock>> {
        self.inner.lock_exclusive(path)
    }
}

fn faulty_store(medium: &FaultyMedium) -> RecordStore {
    RecordStore::open_with(
        StoreConfig::new("queue.dat"),
        Arc::new(medium.clone()),
        Arc::new(PlainCodec),
    )
    .unwrap()
}

#[test]
fn test_defragment_temp_open_failure_leaves_original() {
    let medium = FaultyMedium::new();
    let store = faulty_store(&medium);

    store.push("a").unwrap();
    store.push("b").unwrap();
    store.remove(0).unwrap();
    let before = medium.inner.contents(Path::new("queue.dat")).unwrap();

    medium.fail_truncate_open.store(true, Ordering::SeqCst);
    assert!(matches!(
        store.defragment(),
        Err(StoreError::Compaction(_))
    ));

    assert_eq!(
        medium.inner.contents(Path::new("queue.dat")).unwrap(),
        before
    );
    assert_eq!(store.size(), 1);
    assert_eq!(store.get(0).unwrap(), "b");
}

#[test]
fn test_defragment_mid_copy_failure_discards_temp() {
    let medium = FaultyMedium::new();
    let store = faulty_store(&medium);

    store.push("aaaa").unwrap();
    store.push("bbbb").unwrap();
    store.push("cccc").unwrap();
    store.remove(0).unwrap();
    let before = medium.inner.contents(Path::new("queue.dat")).unwrap();

    // Enough budget for the first live record but not the second.
    medium.write_budget.store(6, Ordering::SeqCst);
    assert!(matches!(
        store.defragment(),
        Err(StoreError::Compaction(_))
    ));

    assert_eq!(
        medium.inner.contents(Path::new("queue.dat")).unwrap(),
        before
    );
    assert!(!medium.inner.exists(Path::new("queue.dat.tmp")));
    assert_eq!(store.size(), 2);
}

#[test]
fn test_defragment_remove_failure_leaves_original() {
    let medium = FaultyMedium::new();
    let store = faulty_store(&medium);

    store.push("a").unwrap();
    store.push("b").unwrap();
    store.remove(1).unwrap();
    let before = medium.inner.contents(Path::new("queue.dat")).unwrap();

    *medium.fail_remove_of.lock() = Some(PathBuf::from("queue.dat"));
    assert!(matches!(
        store.defragment(),
        Err(StoreError::Compaction(_))
    ));

    assert_eq!(
        medium.inner.contents(Path::new("queue.dat")).unwrap(),
        before
    );
    assert_eq!(store.get(0).unwrap(), "a");
}

#[test]
fn test_defragment_rename_failure_reports_and_recovers() {
    let medium = FaultyMedium::new();
    let store = faulty_store(&medium);

    store.push("a").unwrap();
    store.push("b").unwrap();
    store.remove(0).unwrap();

    medium.fail_rename.store(true, Ordering::SeqCst);
    assert!(matches!(
        store.defragment(),
        Err(StoreError::Compaction(_))
    ));
    assert!(!medium.inner.exists(Path::new("queue.dat.tmp")));

    // The original was already removed by the swap; the store stays usable
    // and appends recreate the file.
    medium.fail_rename.store(false, Ordering::SeqCst);
    store.push("fresh").unwrap();
    assert_eq!(store.get_last().unwrap(), "fresh");
}

#[test]
fn test_failed_tombstone_write_keeps_size() {
    let medium = FaultyMedium::new();
    let store = faulty_store(&medium);

    store.push("a").unwrap();
    store.push("b").unwrap();

    medium.fail_overwrite_open.store(true, Ordering::SeqCst);
    assert!(matches!(store.remove(0), Err(StoreError::Io(_))));

    assert_eq!(store.size(), 2);
    medium.fail_overwrite_open.store(false, Ordering::SeqCst);
    assert_eq!(store.get(0).unwrap(), "a");
}
