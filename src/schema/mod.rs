//! Schema module for colstore.
//!
//! This module holds the self-describing catalog: field and table
//! declarations, the catalog row encodings, and the [`Schema`] manager that
//! loads, persists and resolves tables.

pub mod catalog;
pub mod field;
#[allow(clippy::module_inception)]
pub mod schema;

// Re-export commonly used types
pub use catalog::{CATALOG_COLUMNS, CATALOG_TABLES};
pub use field::{Field, FieldFlags, FieldName, FieldType, MAX_FIELD_NAME_LEN, TableDescriptor};
pub use schema::{Schema, SchemaConfig, SchemaTable};
