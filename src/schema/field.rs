//! Field types and table descriptors.

use std::fmt;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ColstoreError, Result};

/// Longest field name that fits the on-disk name slot (64 bytes including
/// the terminator).
pub const MAX_FIELD_NAME_LEN: usize = 63;

/// A field name, at most [`MAX_FIELD_NAME_LEN`] bytes and free of NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldName(String);

impl FieldName {
    /// Validate and wrap a field name.
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(ColstoreError::invalid_schema("Field name cannot be empty"));
        }

        if name.contains('\0') {
            return Err(ColstoreError::invalid_schema(format!(
                "Field name {name:?} contains NUL"
            )));
        }

        if name.len() > MAX_FIELD_NAME_LEN {
            return Err(ColstoreError::NameTooLong {
                name,
                max: MAX_FIELD_NAME_LEN,
            });
        }

        Ok(FieldName(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FieldName {
    type Error = ColstoreError;

    fn try_from(name: String) -> Result<Self> {
        FieldName::new(name)
    }
}

impl From<FieldName> for String {
    fn from(name: FieldName) -> Self {
        name.0
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column data types, stored on disk as an i64 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Numeric,
    /// List of (offset, score) postings.
    OffsetScore,
    Text,
    /// Time series of f32 samples.
    TimeFloat4,
    /// Timestamp with time zone.
    Timestamptz,
    /// A code this version does not know; preserved as-is.
    Other(i64),
}

impl FieldType {
    /// The on-disk type code.
    pub fn code(self) -> i64 {
        match self {
            FieldType::Boolean => 0,
            FieldType::Int16 => 1,
            FieldType::Int32 => 2,
            FieldType::Int64 => 3,
            FieldType::Numeric => 4,
            FieldType::OffsetScore => 5,
            FieldType::Text => 6,
            FieldType::TimeFloat4 => 7,
            FieldType::Timestamptz => 8,
            FieldType::Other(code) => code,
        }
    }

    /// Map an on-disk type code back to a type.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FieldType::Boolean,
            1 => FieldType::Int16,
            2 => FieldType::Int32,
            3 => FieldType::Int64,
            4 => FieldType::Numeric,
            5 => FieldType::OffsetScore,
            6 => FieldType::Text,
            7 => FieldType::TimeFloat4,
            8 => FieldType::Timestamptz,
            other => FieldType::Other(other),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => f.write_str("BOOLEAN"),
            FieldType::Int16 => f.write_str("INT16"),
            FieldType::Int32 => f.write_str("INT32"),
            FieldType::Int64 => f.write_str("INT64"),
            FieldType::Numeric => f.write_str("NUMERIC"),
            FieldType::OffsetScore => f.write_str("OFFSET_SCORE[]"),
            FieldType::Text => f.write_str("TEXT"),
            FieldType::TimeFloat4 => f.write_str("TIME_FLOAT4[]"),
            FieldType::Timestamptz => f.write_str("TIMESTAMP WITH TIME ZONE"),
            FieldType::Other(code) => write!(f, "TYPE({code})"),
        }
    }
}

impl FromStr for FieldType {
    type Err = ColstoreError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();

        let field_type = match normalized.as_str() {
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "INT16" | "SMALLINT" => FieldType::Int16,
            "INT32" | "INTEGER" | "INT" => FieldType::Int32,
            "INT64" | "BIGINT" => FieldType::Int64,
            "NUMERIC" => FieldType::Numeric,
            "OFFSET_SCORE[]" | "OFFSET_SCORE" => FieldType::OffsetScore,
            "TEXT" => FieldType::Text,
            "TIME_FLOAT4[]" | "TIME_FLOAT4" => FieldType::TimeFloat4,
            "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => FieldType::Timestamptz,
            other => {
                let code = other
                    .strip_prefix("TYPE(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|code| code.parse::<i64>().ok())
                    .ok_or_else(|| {
                        ColstoreError::invalid_schema(format!("Unknown field type '{s}'"))
                    })?;
                FieldType::from_code(code)
            }
        };

        Ok(field_type)
    }
}

impl TryFrom<String> for FieldType {
    type Error = ColstoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.to_string()
    }
}

/// Field constraint flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldFlags(u8);

impl FieldFlags {
    /// The field may not hold NULL.
    pub const NOT_NULL: FieldFlags = FieldFlags(0x01);
    /// The field is part of the primary key.
    pub const PRIMARY_KEY: FieldFlags = FieldFlags(0x02);

    /// No flags set.
    pub const fn empty() -> Self {
        FieldFlags(0)
    }

    /// Whether every flag in `other` is set.
    pub fn contains(self, other: FieldFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags in `other`.
    pub fn insert(&mut self, other: FieldFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for FieldFlags {
    type Output = FieldFlags;

    fn bitor(self, rhs: FieldFlags) -> FieldFlags {
        FieldFlags(self.0 | rhs.0)
    }
}

/// A column declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: FieldName,
    pub field_type: FieldType,
    pub flags: FieldFlags,
}

impl Field {
    /// Create a nullable, non-key field.
    pub fn new<S: Into<String>>(name: S, field_type: FieldType) -> Result<Self> {
        Ok(Field {
            name: FieldName::new(name)?,
            field_type,
            flags: FieldFlags::empty(),
        })
    }

    /// Mark the field NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.flags.insert(FieldFlags::NOT_NULL);
        self
    }

    /// Mark the field as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.flags.insert(FieldFlags::PRIMARY_KEY);
        self
    }

    pub fn is_not_null(&self) -> bool {
        self.flags.contains(FieldFlags::NOT_NULL)
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(FieldFlags::PRIMARY_KEY)
    }
}

/// Where a table lives and what columns it has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Storage path of the table file.
    pub path: PathBuf,
    /// Columns in declaration order.
    pub fields: Vec<Field>,
}

impl TableDescriptor {
    /// Create a descriptor. A table needs at least one field.
    pub fn new<P: Into<PathBuf>>(path: P, fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(ColstoreError::invalid_schema(
                "Table must have at least one column",
            ));
        }

        Ok(TableDescriptor {
            path: path.into(),
            fields,
        })
    }

    /// Storage path of the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of declared fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field types in declaration order.
    pub fn field_types(&self) -> Vec<FieldType> {
        self.fields.iter().map(|field| field.field_type).collect()
    }
}
