//! # fifolog
//!
//! A single-file FIFO record store for memory-constrained targets: records
//! are appended as delimiter-framed lines, deleted by tombstoning in place,
//! and physically reclaimed by self-triggered compaction. No operation ever
//! loads the whole file; scans run through a fixed-size buffer and the last
//! record is found with a windowed backward scan.
//!
//! ## Core Concepts
//!
//! - **Records**: opaque single-line payloads, FIFO-indexed over live lines
//! - **Tombstones**: a sentinel byte over a record's first byte marks
//!   logical deletion without moving data
//! - **Compaction**: rewrite-and-rename pass that drops tombstoned records
//!   once they take up enough of the file
//! - **Medium**: injected file-system capability set, so tests run against
//!   an in-memory fake
//!
//! ## Example
//!
//! ```ignore
//! use fifolog::RecordStore;
//!
//! let store = RecordStore::open("./queue.dat")?;
//!
//! store.push(r#"{"reading":23.5}"#)?;
//! store.push(r#"{"reading":24.1}"#)?;
//!
//! let newest = store.get_last()?;
//! let oldest = store.remove(0)?;
//!
//! if store.should_defragment(0.6)? {
//!     store.defragment()?;
//! }
//! ```

pub mod codec;
pub mod compact;
pub mod error;
pub mod medium;
pub mod reader;
pub mod scan;
pub mod store;
pub mod types;

// Re-exports
pub use codec::{JsonCodec, PayloadCodec, PlainCodec};
pub use compact::Compactor;
pub use error::{Result, StoreError};
pub use medium::{Medium, MediumFile, MemoryMedium, OpenMode, StdFs, StoreLock};
pub use reader::{BufferedLineReader, Line, DELIMITER};
pub use scan::{scan_window, BackwardScanner, Candidate};
pub use store::RecordStore;
pub use types::{Cursor, StoreConfig, StoreStats};
