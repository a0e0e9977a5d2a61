//! Output formatting for CLI commands.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cli::args::{ColstoreArgs, OutputFormat};
use crate::error::Result;
use crate::query::OffsetScore;
use crate::schema::{SchemaTable, TableDescriptor};

/// One line of the table listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub backend: String,
    pub path: String,
    pub field_count: usize,
}

impl From<&SchemaTable> for TableSummary {
    fn from(table: &SchemaTable) -> Self {
        TableSummary {
            name: table.name().to_string(),
            backend: table.backend().to_string(),
            path: table.declaration().path().to_string_lossy().to_string(),
            field_count: table.declaration().field_count(),
        }
    }
}

/// Result structure for listing tables.
#[derive(Debug, Serialize, Deserialize)]
pub struct TableListResult {
    pub catalog: String,
    pub tables: Vec<TableSummary>,
}

impl fmt::Display for TableListResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.tables.iter().map(|t| t.name.len()).max().unwrap_or(0);
        for table in &self.tables {
            writeln!(
                f,
                "{:<width$}  {}  {} ({} fields)",
                table.name, table.backend, table.path, table.field_count
            )?;
        }
        Ok(())
    }
}

/// A column as shown by `describe`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub field_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Result structure for describing a table.
#[derive(Debug, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub backend: String,
    pub path: String,
    pub columns: Vec<ColumnDescription>,
}

impl TableDescription {
    pub fn new(name: &str, backend: &str, declaration: &TableDescriptor) -> Self {
        TableDescription {
            name: name.to_string(),
            backend: backend.to_string(),
            path: declaration.path().to_string_lossy().to_string(),
            columns: declaration
                .fields
                .iter()
                .map(|field| ColumnDescription {
                    name: field.name.to_string(),
                    field_type: field.field_type.to_string(),
                    not_null: field.is_not_null(),
                    primary_key: field.is_primary_key(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for TableDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table: {}", self.name)?;
        writeln!(f, "Backend: {}", self.backend)?;
        writeln!(f, "Path: {}", self.path)?;
        writeln!(f, "Columns:")?;
        for column in &self.columns {
            write!(f, "  {} {}", column.name, column.field_type)?;
            if column.primary_key {
                write!(f, " PRIMARY KEY")?;
            }
            if column.not_null {
                write!(f, " NOT NULL")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Result structure for table creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct TableCreationResult {
    pub name: String,
    pub path: String,
    pub field_count: usize,
}

impl fmt::Display for TableCreationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Created table '{}' at {} ({} fields)",
            self.name, self.path, self.field_count
        )
    }
}

/// Ranked postings, printed as `offset<TAB>score` lines.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostingsResult {
    /// Query string or dumped key.
    pub source: String,
    /// Number of postings before any limit was applied.
    pub total: usize,
    pub postings: Vec<OffsetScore>,
}

impl fmt::Display for PostingsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for posting in &self.postings {
            writeln!(f, "{}\t{}", posting.offset, posting.score)?;
        }
        Ok(())
    }
}

/// One dumped row.
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpedRow {
    pub offset: u64,
    pub key: String,
    /// Row value up to its first NUL byte, lossily decoded.
    pub value: String,
}

/// Result structure for dumping a table file.
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpResult {
    pub path: String,
    pub rows: Vec<DumpedRow>,
}

impl fmt::Display for DumpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}", row.value)?;
        }
        Ok(())
    }
}

/// Output a result in the specified format.
pub fn output_result<T>(message: &str, result: &T, args: &ColstoreArgs) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: fmt::Display>(message: &str, result: &T, args: &ColstoreArgs) -> Result<()> {
    if args.verbosity() > 1 {
        println!("{message}");
        println!();
    }

    print!("{result}");
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &ColstoreArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Decode a row value for display: the bytes up to the first NUL.
pub fn display_value(value: &[u8]) -> String {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    String::from_utf8_lossy(&value[..end]).into_owned()
}
