//! # colstore
//!
//! A self-describing catalog of write-once tables and a ranked query
//! processor over an inverted index stored in them.
//!
//! ## Features
//!
//! - Catalog of tables and columns stored in its own tables
//! - Append-only keyed tables with positional access
//! - Posting-list algebra (intersect, subtract, filter, rank)
//! - Ranked queries that emit JSON summaries

pub mod cli;
pub mod codec;
pub mod error;
pub mod query;
pub mod schema;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::error::{ColstoreError, Result};
    pub use crate::query::{OffsetScore, PostingList, execute_query, rank_offsets};
    pub use crate::schema::{Field, FieldType, Schema, SchemaConfig, TableDescriptor};
    pub use crate::storage::{OpenMode, StorageConfig, Table, TableFactory};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
