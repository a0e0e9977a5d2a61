//! Query execution against an index table and a summary table.
//!
//! The index table maps a term (TEXT key) to an OFFSET_SCORE[] posting list.
//! The summary table holds one row per document, addressed by its byte
//! offset: a key, a TIMESTAMP WITH TIME ZONE and a TEXT column whose content
//! is emitted verbatim for each ranked hit.

use std::io::{SeekFrom, Write};

use log::debug;

use crate::codec::{decode_offset_scores, decode_summary};
use crate::error::{ColstoreError, Result};
use crate::query::parser::{QueryToken, parse_query};
use crate::query::posting::PostingList;
use crate::schema::{FieldType, Schema, TableDescriptor};
use crate::storage::Table;

/// Run `query` and write the summaries of the top `limit` hits to `out` as a
/// JSON array.
///
/// Returns the number of summaries written. A term missing from the index
/// is not an error; it empties the result.
pub fn execute_query<W: Write>(
    schema: &mut Schema,
    query: &str,
    index_table: &str,
    summary_table: &str,
    limit: usize,
    out: &mut W,
) -> Result<usize> {
    // Both tables must exist before either layout is checked.
    for name in [index_table, summary_table] {
        schema.resolve(name)?;
    }

    check_index_table(schema.resolve(index_table)?.1)?;
    check_summary_table(schema.resolve(summary_table)?.1)?;

    let ranked = {
        let (index, _) = schema.resolve(index_table)?;
        rank_tokens(index, &parse_query(query))?
    };
    let limit = limit.min(ranked.len());

    let (summary, _) = schema.resolve(summary_table)?;

    out.write_all(b"[")?;
    for (i, posting) in ranked.iter().take(limit).enumerate() {
        if i > 0 {
            out.write_all(b",\n")?;
        }
        out.write_all(fetch_summary(summary, posting.offset)?.as_bytes())?;
    }
    out.write_all(b"]\n")?;

    debug!("Query {query:?} matched {} documents, emitted {limit}", ranked.len());
    Ok(limit)
}

/// Fold the query's posting lists and rank the result by descending score,
/// without reading the summary table.
pub fn rank_offsets(schema: &mut Schema, query: &str, index_table: &str) -> Result<PostingList> {
    let (index, declaration) = schema.resolve(index_table)?;
    check_index_table(declaration)?;
    rank_tokens(index, &parse_query(query))
}

fn rank_tokens(index: &mut dyn Table, tokens: &[QueryToken]) -> Result<PostingList> {
    let mut ranked = fold_postings(index, tokens)?;
    ranked.sort_by_score_desc();
    Ok(ranked)
}

fn fold_postings(index: &mut dyn Table, tokens: &[QueryToken]) -> Result<PostingList> {
    let mut accumulator: Option<PostingList> = None;

    for token in tokens {
        if !index.seek_to_key(&token.term)? {
            debug!("Term '{}' is not in the index", token.term);
            return Ok(PostingList::new());
        }

        let row = index.read_row()?.ok_or_else(|| {
            ColstoreError::storage(format!("Index row for '{}' could not be read", token.term))
        })?;
        let mut postings = decode_offset_scores(&row.value)?;

        if let Some(filter) = token.filter {
            postings.retain_by_score(filter.operator, filter.threshold);
        }

        if token.invert {
            postings.negate_scores();
        }

        debug!(
            "Term '{}' contributes {} postings (exclude: {})",
            token.term,
            postings.len(),
            token.exclude
        );

        accumulator = Some(match accumulator.take() {
            None => postings,
            Some(mut folded) => {
                if token.exclude {
                    folded.subtract(&postings);
                } else {
                    folded.intersect(&postings);
                }
                folded
            }
        });
    }

    Ok(accumulator.unwrap_or_default())
}

fn fetch_summary(summary: &mut dyn Table, offset: u64) -> Result<String> {
    let stale = |reason: String| {
        ColstoreError::stale_index(format!(
            "{reason} at summary offset {offset}. Is the index stale?"
        ))
    };

    let lookup_error = |e: ColstoreError| match e {
        io @ ColstoreError::Io(_) => io,
        other => stale(other.to_string()),
    };

    summary.seek(SeekFrom::Start(offset)).map_err(lookup_error)?;

    let row = summary
        .read_row()
        .map_err(lookup_error)?
        .ok_or_else(|| stale("No row".to_string()))?;

    let decoded = decode_summary(&row.value).map_err(|e| stale(e.to_string()))?;
    Ok(decoded.text)
}

fn check_index_table(declaration: &TableDescriptor) -> Result<()> {
    let types = declaration.field_types();

    if types.len() != 2 {
        return Err(ColstoreError::invalid_schema(
            "Incorrect field count in index table",
        ));
    }

    if types[0] != FieldType::Text {
        return Err(ColstoreError::invalid_schema(
            "First field in index table must be TEXT",
        ));
    }

    if types[1] != FieldType::OffsetScore {
        return Err(ColstoreError::invalid_schema(format!(
            "Second field in index table must be {}, is {}",
            FieldType::OffsetScore,
            types[1]
        )));
    }

    Ok(())
}

fn check_summary_table(declaration: &TableDescriptor) -> Result<()> {
    let types = declaration.field_types();

    if types.len() != 3 {
        return Err(ColstoreError::invalid_schema(
            "Incorrect field count in summary table",
        ));
    }

    if types[1] != FieldType::Timestamptz {
        return Err(ColstoreError::invalid_schema(format!(
            "Second field in summary table must be {}",
            FieldType::Timestamptz
        )));
    }

    if types[2] != FieldType::Text {
        return Err(ColstoreError::invalid_schema(
            "Third field in summary table must be TEXT",
        ));
    }

    Ok(())
}
