//! Error types for the colstore library.
//!
//! Every fallible operation returns [`Result`], whose error type is the
//! [`ColstoreError`] enum. There is no process-wide "last error" state: the
//! error value itself carries the message.
//!
//! # Examples
//!
//! ```
//! use colstore::error::{ColstoreError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ColstoreError::invalid_schema("Table must have at least one column"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for colstore operations.
#[derive(Error, Debug)]
pub enum ColstoreError {
    /// Catalog path is not absolute or ends with a path separator.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Wrong field count or field types, or a table declared without fields.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Catalog rows are structurally inconsistent.
    #[error("Catalog corrupt: {0}")]
    CatalogCorrupt(String),

    /// No table with the given name exists in the schema.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// The index references a summary row that is not present.
    #[error("Stale index: {0}")]
    StaleIndex(String),

    /// Unsupported score comparator.
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(char),

    /// A bounded name exceeded its on-disk slot.
    #[error("Name '{name}' is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },

    /// Malformed binary payload.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Storage backend errors (bad table file, unknown backend, ...).
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors propagated from the file system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with ColstoreError.
pub type Result<T> = std::result::Result<T, ColstoreError>;

impl ColstoreError {
    /// Create a new invalid path error.
    pub fn invalid_path<S: Into<String>>(msg: S) -> Self {
        ColstoreError::InvalidPath(msg.into())
    }

    /// Create a new invalid schema error.
    pub fn invalid_schema<S: Into<String>>(msg: S) -> Self {
        ColstoreError::InvalidSchema(msg.into())
    }

    /// Create a new catalog corruption error.
    pub fn catalog_corrupt<S: Into<String>>(msg: S) -> Self {
        ColstoreError::CatalogCorrupt(msg.into())
    }

    /// Create a new table-not-found error.
    pub fn table_not_found<S: Into<String>>(name: S) -> Self {
        ColstoreError::TableNotFound(name.into())
    }

    /// Create a new stale index error.
    pub fn stale_index<S: Into<String>>(msg: S) -> Self {
        ColstoreError::StaleIndex(msg.into())
    }

    /// Create a new codec error.
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        ColstoreError::Codec(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        ColstoreError::Storage(msg.into())
    }

    /// Whether this error means the underlying file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ColstoreError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}
