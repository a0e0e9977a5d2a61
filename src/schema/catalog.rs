//! Catalog tables and their row encodings.
//!
//! The catalog describes itself: `ca_catalog.ca_tables` holds one row per
//! table (its own included) and `ca_catalog.ca_columns` one row per column.
//!
//! Row values:
//! - `ca_tables`: `path \0 backend \0`
//! - `ca_columns`: `name \0`, type code (i64 LE), not-null byte, primary-key byte

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ColstoreError, Result};
use crate::schema::field::{Field, FieldFlags, FieldName, FieldType, TableDescriptor};

/// Name of the catalog table listing tables.
pub const CATALOG_TABLES: &str = "ca_catalog.ca_tables";

/// Name of the catalog table listing columns.
pub const CATALOG_COLUMNS: &str = "ca_catalog.ca_columns";

/// Whether `name` names one of the two catalog tables.
pub fn is_catalog_table(name: &str) -> bool {
    name == CATALOG_TABLES || name == CATALOG_COLUMNS
}

/// Built-in descriptor of `ca_catalog.ca_tables` for a catalog in `dir`.
pub fn tables_descriptor(dir: &Path) -> Result<TableDescriptor> {
    TableDescriptor::new(
        dir.join(CATALOG_TABLES),
        vec![
            Field::new("table_name", FieldType::Text)?.primary_key().not_null(),
            Field::new("path", FieldType::Text)?.not_null(),
            Field::new("backend", FieldType::Text)?.not_null(),
        ],
    )
}

/// Built-in descriptor of `ca_catalog.ca_columns` for a catalog in `dir`.
pub fn columns_descriptor(dir: &Path) -> Result<TableDescriptor> {
    TableDescriptor::new(
        dir.join(CATALOG_COLUMNS),
        vec![
            Field::new("table_name", FieldType::Text)?.primary_key().not_null(),
            Field::new("column_name", FieldType::Text)?.primary_key().not_null(),
            Field::new("type", FieldType::Int64)?.not_null(),
            Field::new("null", FieldType::Boolean)?.not_null(),
            Field::new("primary_key", FieldType::Boolean)?.not_null(),
        ],
    )
}

/// Encode a `ca_tables` row value.
pub fn encode_table_row(path: &str, backend: &str) -> Result<Vec<u8>> {
    if path.contains('\0') || backend.contains('\0') {
        return Err(ColstoreError::invalid_schema(
            "Table path and backend cannot contain NUL",
        ));
    }

    let mut value = Vec::with_capacity(path.len() + backend.len() + 2);
    value.extend_from_slice(path.as_bytes());
    value.push(0);
    value.extend_from_slice(backend.as_bytes());
    value.push(0);
    Ok(value)
}

/// Decode a `ca_tables` row value into `(path, backend)`.
pub fn decode_table_row(table: &str, value: &[u8]) -> Result<(String, String)> {
    let (path, rest) = split_nul(value)
        .ok_or_else(|| ColstoreError::catalog_corrupt(format!("Missing path for table '{table}'")))?;
    let (backend, rest) = split_nul(rest).ok_or_else(|| {
        ColstoreError::catalog_corrupt(format!("Missing backend for table '{table}'"))
    })?;

    if !rest.is_empty() {
        return Err(ColstoreError::catalog_corrupt(format!(
            "Trailing bytes in catalog row for table '{table}'"
        )));
    }

    if path.is_empty() || backend.is_empty() {
        return Err(ColstoreError::catalog_corrupt(format!(
            "Empty path or backend for table '{table}'"
        )));
    }

    Ok((utf8(table, path)?, utf8(table, backend)?))
}

const COLUMN_TAIL_LEN: usize = 8 + 1 + 1;

/// Encode a `ca_columns` row value.
pub fn encode_column_row(field: &Field) -> Vec<u8> {
    let name = field.name.as_str().as_bytes();
    let mut value = Vec::with_capacity(name.len() + 1 + COLUMN_TAIL_LEN);

    value.extend_from_slice(name);
    value.push(0);

    let mut code = [0u8; 8];
    LittleEndian::write_i64(&mut code, field.field_type.code());
    value.extend_from_slice(&code);

    value.push(u8::from(field.is_not_null()));
    value.push(u8::from(field.is_primary_key()));
    value
}

/// Decode a `ca_columns` row value.
pub fn decode_column_row(table: &str, value: &[u8]) -> Result<Field> {
    let (name, tail) = split_nul(value).ok_or_else(|| {
        ColstoreError::catalog_corrupt(format!("Missing column name for table '{table}'"))
    })?;

    if tail.len() != COLUMN_TAIL_LEN {
        return Err(ColstoreError::catalog_corrupt(format!(
            "Column row for table '{table}' has {} trailing bytes, expected {COLUMN_TAIL_LEN}",
            tail.len()
        )));
    }

    let name = FieldName::new(utf8(table, name)?).map_err(|e| {
        ColstoreError::catalog_corrupt(format!("Bad column name in table '{table}': {e}"))
    })?;

    let field_type = FieldType::from_code(LittleEndian::read_i64(&tail[..8]));

    let mut flags = FieldFlags::empty();
    if tail[8] != 0 {
        flags.insert(FieldFlags::NOT_NULL);
    }
    if tail[9] != 0 {
        flags.insert(FieldFlags::PRIMARY_KEY);
    }

    Ok(Field {
        name,
        field_type,
        flags,
    })
}

fn split_nul(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = bytes.iter().position(|&b| b == 0)?;
    Some((&bytes[..end], &bytes[end + 1..]))
}

fn utf8(table: &str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        ColstoreError::catalog_corrupt(format!("Invalid UTF-8 in catalog row for table '{table}'"))
    })
}
