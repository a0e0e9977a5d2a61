//! Command implementations for the colstore CLI.

use std::io::{self, Write};

use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::codec::decode_offset_scores;
use crate::error::{ColstoreError, Result};
use crate::query::{execute_query, rank_offsets};
use crate::schema::{Schema, SchemaConfig, TableDescriptor};
use crate::storage::{DEFAULT_BACKEND, OpenMode, TableFactory};

/// Execute a CLI command.
pub fn execute_command(args: ColstoreArgs) -> Result<()> {
    match &args.command {
        Command::Query(query_args) => run_query(query_args, &args),
        Command::Tables(tables_args) => list_tables(tables_args, &args),
        Command::Describe(describe_args) => describe_table(describe_args, &args),
        Command::CreateTable(create_args) => create_table(create_args, &args),
        Command::Dump(dump_args) => dump_table(dump_args, &args),
    }
}

fn load_config(cli_args: &ColstoreArgs) -> Result<SchemaConfig> {
    match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SchemaConfig::from_file(path)
        }
        None => Ok(SchemaConfig::default()),
    }
}

fn open_schema(catalog: &std::path::Path, cli_args: &ColstoreArgs) -> Result<Schema> {
    Schema::open_with_config(catalog, load_config(cli_args)?)
}

/// Run a query.
fn run_query(args: &QueryArgs, cli_args: &ColstoreArgs) -> Result<()> {
    let mut schema = open_schema(&args.catalog, cli_args)?;
    let limit = args.limit.unwrap_or(usize::MAX);

    if args.offsets {
        let mut ranked = rank_offsets(&mut schema, &args.query, &args.index)?;
        let total = ranked.len();
        ranked.truncate(limit);
        let postings = ranked.into_inner();

        output_result(
            "Ranked offsets",
            &PostingsResult {
                source: args.query.clone(),
                total,
                postings,
            },
            cli_args,
        )?;
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let emitted = execute_query(
            &mut schema,
            &args.query,
            &args.index,
            &args.summary,
            limit,
            &mut out,
        )?;
        out.flush()?;
        info!("Query returned {emitted} results");
    }

    schema.close()
}

/// List the tables of a catalog.
fn list_tables(args: &TablesArgs, cli_args: &ColstoreArgs) -> Result<()> {
    let schema = open_schema(&args.catalog, cli_args)?;

    let result = TableListResult {
        catalog: schema.path().to_string_lossy().to_string(),
        tables: schema.iter().map(TableSummary::from).collect(),
    };
    output_result("Tables", &result, cli_args)?;

    schema.close()
}

/// Describe one table.
fn describe_table(args: &DescribeArgs, cli_args: &ColstoreArgs) -> Result<()> {
    let schema = open_schema(&args.catalog, cli_args)?;

    let table = schema
        .table(&args.table)
        .ok_or_else(|| ColstoreError::table_not_found(args.table.as_str()))?;
    let result = TableDescription::new(table.name(), table.backend(), table.declaration());
    output_result("Table description", &result, cli_args)?;

    schema.close()
}

/// Register a new table.
fn create_table(args: &CreateTableArgs, cli_args: &ColstoreArgs) -> Result<()> {
    let mut schema = open_schema(&args.catalog, cli_args)?;

    let declaration = TableDescriptor::new(args.path.clone(), args.fields.clone())?;
    schema.create_table(&args.name, declaration)?;

    let table = schema
        .table(&args.name)
        .ok_or_else(|| ColstoreError::table_not_found(args.name.as_str()))?;
    let result = TableCreationResult {
        name: table.name().to_string(),
        path: table.declaration().path().to_string_lossy().to_string(),
        field_count: table.declaration().field_count(),
    };
    output_result("Table created successfully", &result, cli_args)?;

    schema.close()
}

/// Print the rows of a table file, or the row with one key.
fn dump_table(args: &DumpArgs, cli_args: &ColstoreArgs) -> Result<()> {
    let config = load_config(cli_args)?;
    let mut table = TableFactory::open(
        DEFAULT_BACKEND,
        &args.table_file,
        OpenMode::ReadOnly,
        &config.storage,
    )?;
    let path = args.table_file.to_string_lossy().to_string();

    let Some(key) = &args.key else {
        let mut rows = Vec::new();
        while let Some(row) = table.read_row()? {
            rows.push(DumpedRow {
                offset: row.offset,
                value: display_value(&row.value),
                key: row.key,
            });
        }
        output_result("Table rows", &DumpResult { path, rows }, cli_args)?;
        return table.close();
    };

    if !table.seek_to_key(key)? {
        return Err(ColstoreError::storage(format!(
            "Key '{key}' not found in {path}"
        )));
    }
    let row = table
        .read_row()?
        .ok_or_else(|| ColstoreError::storage(format!("Row for key '{key}' could not be read")))?;

    if args.offset_scores {
        let postings = decode_offset_scores(&row.value)?.into_inner();
        let result = PostingsResult {
            source: key.clone(),
            total: postings.len(),
            postings,
        };
        output_result("Postings", &result, cli_args)?;
    } else {
        let result = DumpResult {
            path,
            rows: vec![DumpedRow {
                offset: row.offset,
                value: display_value(&row.value),
                key: row.key,
            }],
        };
        output_result("Table row", &result, cli_args)?;
    }

    table.close()
}
