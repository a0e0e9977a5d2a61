//! Command line argument parsing for the colstore CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::schema::{Field, FieldType};

/// colstore - catalog management and ranked queries over write-once tables
#[derive(Parser, Debug, Clone)]
#[command(name = "colstore")]
#[command(about = "Catalog management and ranked queries over write-once tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct ColstoreArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Schema configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "COLSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl ColstoreArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a ranked query and print the matching summaries as a JSON array
    Query(QueryArgs),

    /// List the tables of a catalog
    Tables(TablesArgs),

    /// Show the columns of a table
    Describe(DescribeArgs),

    /// Add a table to a catalog
    #[command(name = "create-table")]
    CreateTable(CreateTableArgs),

    /// Print the rows of a table file
    Dump(DumpArgs),
}

/// Arguments for querying
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// Path to the catalog directory (absolute)
    #[arg(value_name = "CATALOG")]
    pub catalog: PathBuf,

    /// Query string, e.g. "cat -dog ~bird>0.5"
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Index table (TEXT term, OFFSET_SCORE[] postings)
    #[arg(long, value_name = "TABLE")]
    pub index: String,

    /// Summary table (key, TIMESTAMP WITH TIME ZONE, TEXT)
    #[arg(long, value_name = "TABLE")]
    pub summary: String,

    /// Maximum number of results to return
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Print ranked offsets and scores instead of summaries
    #[arg(long)]
    pub offsets: bool,
}

/// Arguments for listing tables
#[derive(Parser, Debug, Clone)]
pub struct TablesArgs {
    /// Path to the catalog directory (absolute)
    #[arg(value_name = "CATALOG")]
    pub catalog: PathBuf,
}

/// Arguments for describing a table
#[derive(Parser, Debug, Clone)]
pub struct DescribeArgs {
    /// Path to the catalog directory (absolute)
    #[arg(value_name = "CATALOG")]
    pub catalog: PathBuf,

    /// Table name
    #[arg(value_name = "TABLE")]
    pub table: String,
}

/// Arguments for creating a table
#[derive(Parser, Debug, Clone)]
pub struct CreateTableArgs {
    /// Path to the catalog directory (absolute)
    #[arg(value_name = "CATALOG")]
    pub catalog: PathBuf,

    /// Table name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Table file; relative paths are placed in the catalog directory
    #[arg(short, long, value_name = "PATH")]
    pub path: PathBuf,

    /// Column as name:TYPE[:pk][:not-null]; repeat for each column
    #[arg(long = "field", value_name = "SPEC", required = true, value_parser = parse_field_spec)]
    pub fields: Vec<Field>,
}

/// Arguments for dumping a table file
#[derive(Parser, Debug, Clone)]
pub struct DumpArgs {
    /// Path to the table file
    #[arg(value_name = "TABLE_FILE")]
    pub table_file: PathBuf,

    /// Only print the row with this key
    #[arg(value_name = "KEY")]
    pub key: Option<String>,

    /// Decode the row value as an offset/score posting list
    #[arg(long, requires = "key")]
    pub offset_scores: bool,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Parse a `name:TYPE[:pk][:not-null]` column specification.
pub fn parse_field_spec(spec: &str) -> Result<Field, String> {
    let mut parts = spec.split(':');

    let name = parts.next().unwrap_or_default();
    let field_type = parts
        .next()
        .ok_or_else(|| format!("Missing type in field spec '{spec}'"))?
        .parse::<FieldType>()
        .map_err(|e| e.to_string())?;

    let mut field = Field::new(name, field_type).map_err(|e| e.to_string())?;
    for flag in parts {
        field = match flag.to_ascii_lowercase().as_str() {
            "pk" | "primary-key" => field.primary_key(),
            "not-null" | "nn" => field.not_null(),
            other => return Err(format!("Unknown field flag '{other}' in '{spec}'")),
        };
    }

    Ok(field)
}
