//! Physical table storage for colstore.
//!
//! The catalog and the query processor never touch files directly; they go
//! through the [`Table`] trait, which models a keyed, append-only row file
//! with positional access. Concrete implementations are selected by a
//! backend tag string (the value stored in the catalog's `backend` column)
//! through [`TableFactory`].
//!
//! # Backends
//!
//! ## `write-once`
//! - Rows are appended once and never updated in place
//! - Read-only handles memory-map the file (configurable)
//! - Row offsets are absolute byte offsets in the file, so a row can be
//!   addressed positionally as well as by key
//!
//! # Example
//!
//! ```
//! use colstore::storage::{OpenMode, StorageConfig, TableFactory, DEFAULT_BACKEND};
//!
//! # fn main() -> colstore::error::Result<()> {
//! let dir = tempfile::TempDir::new()?;
//! let path = dir.path().join("words");
//! let config = StorageConfig::default();
//!
//! let mut table = TableFactory::open(DEFAULT_BACKEND, &path, OpenMode::Truncate, &config)?;
//! let offset = table.insert_row("hello", &[b"world".as_slice()])?;
//! table.sync()?;
//!
//! let mut table = TableFactory::open(DEFAULT_BACKEND, &path, OpenMode::ReadOnly, &config)?;
//! assert!(table.seek_to_key("hello")?);
//! let row = table.read_row()?.unwrap();
//! assert_eq!(row.offset, offset);
//! assert_eq!(row.value, b"world");
//! # Ok(())
//! # }
//! ```

use std::io::SeekFrom;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ColstoreError, Result};

pub mod write_once;

pub use write_once::WriteOnceTable;

/// Backend tag used for every table the catalog creates.
pub const DEFAULT_BACKEND: &str = "write-once";

/// Storage configuration shared by all table handles of a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Memory-map read-only tables instead of reading them into memory.
    pub use_mmap: bool,

    /// Buffer size for table writers.
    pub buffer_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            use_mmap: true,
            buffer_size: 64 * 1024,
        }
    }
}

/// How a table file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing table for reading. Fails with a NotFound I/O error
    /// if the file does not exist.
    ReadOnly,

    /// Create the table, truncating any existing file. The handle accepts
    /// inserts and reads back whatever has been synced.
    Truncate,
}

/// A single row read from a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Byte offset of the row within the table file.
    pub offset: u64,

    /// Row key.
    pub key: String,

    /// Row value: the concatenation of the columns given at insert time.
    pub value: Vec<u8>,
}

/// A physical table handle.
///
/// Handles keep a read cursor. [`Table::seek_to_key`] and [`Table::seek`]
/// move it, [`Table::read_row`] reads the row under it and advances past it.
pub trait Table: Send + std::fmt::Debug {
    /// Location of the table on disk.
    fn path(&self) -> &Path;

    /// Move the cursor to the first row whose key equals `key`.
    ///
    /// Returns `false`, leaving the cursor where it was, when no row has that
    /// key.
    fn seek_to_key(&mut self, key: &str) -> Result<bool>;

    /// Read the row under the cursor and advance past it.
    ///
    /// Returns `None` at the end of the table.
    fn read_row(&mut self) -> Result<Option<TableRow>>;

    /// Move the cursor to a byte position.
    ///
    /// Positions are absolute file offsets, the same values returned by
    /// [`Table::insert_row`] and reported in [`TableRow::offset`].
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Append a row. The value is the concatenation of `columns`.
    ///
    /// Returns the byte offset at which the row was written.
    fn insert_row(&mut self, key: &str, columns: &[&[u8]]) -> Result<u64>;

    /// Flush pending rows to stable storage and make them readable through
    /// this handle.
    fn sync(&mut self) -> Result<()>;

    /// Release the handle. Unsynced rows are flushed but not fsynced.
    fn close(&mut self) -> Result<()>;
}

/// Factory for opening tables by backend tag.
pub struct TableFactory;

impl TableFactory {
    /// Open a table with the backend named by `backend`.
    ///
    /// Unknown backend tags are a storage error; a missing file in
    /// [`OpenMode::ReadOnly`] is an I/O error for which
    /// [`ColstoreError::is_not_found`] holds.
    pub fn open(
        backend: &str,
        path: &Path,
        mode: OpenMode,
        config: &StorageConfig,
    ) -> Result<Box<dyn Table>> {
        match backend {
            DEFAULT_BACKEND => Ok(Box::new(WriteOnceTable::open(path, mode, config)?)),
            other => Err(ColstoreError::storage(format!(
                "Unknown table backend '{other}'"
            ))),
        }
    }
}
