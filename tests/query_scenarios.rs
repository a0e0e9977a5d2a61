use std::path::Path;

use chrono::{TimeZone, Utc};
use colstore::codec::{encode_offset_scores, encode_summary};
use colstore::error::ColstoreError;
use colstore::query::{OffsetScore, execute_query, rank_offsets};
use colstore::schema::{Field, FieldType, Schema, TableDescriptor};
use colstore::storage::{DEFAULT_BACKEND, OpenMode, StorageConfig, TableFactory};
use serde_json::Value;
use tempfile::tempdir;

fn index_descriptor() -> TableDescriptor {
    TableDescriptor::new(
        "words.tbl",
        vec![
            Field::new("term", FieldType::Text).unwrap().primary_key().not_null(),
            Field::new("postings", FieldType::OffsetScore).unwrap().not_null(),
        ],
    )
    .unwrap()
}

fn summary_descriptor() -> TableDescriptor {
    TableDescriptor::new(
        "summaries.tbl",
        vec![
            Field::new("id", FieldType::Text).unwrap().primary_key().not_null(),
            Field::new("published", FieldType::Timestamptz).unwrap(),
            Field::new("summary", FieldType::Text).unwrap(),
        ],
    )
    .unwrap()
}

/// Write one summary row per document and return their offsets.
fn write_summaries(catalog: &Path, count: usize) -> Vec<u64> {
    let mut table = TableFactory::open(
        DEFAULT_BACKEND,
        &catalog.join("summaries.tbl"),
        OpenMode::Truncate,
        &StorageConfig::default(),
    )
    .unwrap();
    let published = Utc.with_ymd_and_hms(2013, 5, 1, 12, 0, 0).unwrap();

    let offsets = (0..count)
        .map(|id| {
            let value = encode_summary(&published, &format!("{{\"id\":{id}}}")).unwrap();
            table
                .insert_row(&format!("doc{id}"), &[value.as_slice()])
                .unwrap()
        })
        .collect();

    table.sync().unwrap();
    table.close().unwrap();
    offsets
}

/// Write index rows whose postings point at documents by position.
fn write_index(catalog: &Path, offsets: &[u64], terms: &[(&str, Vec<(usize, f32)>)]) {
    let mut table = TableFactory::open(
        DEFAULT_BACKEND,
        &catalog.join("words.tbl"),
        OpenMode::Truncate,
        &StorageConfig::default(),
    )
    .unwrap();

    for (term, postings) in terms {
        let postings: Vec<OffsetScore> = postings
            .iter()
            .map(|&(doc, score)| OffsetScore::new(offsets[doc], score))
            .collect();
        let value = encode_offset_scores(&postings).unwrap();
        table.insert_row(term, &[value.as_slice()]).unwrap();
    }

    table.sync().unwrap();
    table.close().unwrap();
}

/// Catalog with the cat/dog index over documents 0..4.
fn animal_catalog(dir: &Path) -> Schema {
    let catalog = dir.join("catalog");
    let mut schema = Schema::open(&catalog).unwrap();
    schema.create_table("words", index_descriptor()).unwrap();
    schema.create_table("summaries", summary_descriptor()).unwrap();

    let offsets = write_summaries(&catalog, 4);
    write_index(
        &catalog,
        &offsets,
        &[
            ("cat", vec![(1, 0.5), (2, 0.9), (3, 0.2)]),
            ("dog", vec![(2, 0.9), (3, 0.1)]),
        ],
    );
    schema
}

fn run(schema: &mut Schema, query: &str, limit: usize) -> (usize, String) {
    let mut out = Vec::new();
    let emitted = execute_query(schema, query, "words", "summaries", limit, &mut out).unwrap();
    (emitted, String::from_utf8(out).unwrap())
}

fn ids(output: &str) -> Vec<u64> {
    let hits: Vec<Value> = serde_json::from_str(output).unwrap();
    hits.iter().map(|hit| hit["id"].as_u64().unwrap()).collect()
}

#[test]
fn test_two_term_and_query() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let (emitted, output) = run(&mut schema, "cat dog", 10);
    assert_eq!(emitted, 2);
    assert_eq!(output, "[{\"id\":2},\n{\"id\":3}]\n");
    assert_eq!(ids(&output), vec![2, 3]);
}

#[test]
fn test_exclusion_query() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let (_, output) = run(&mut schema, "cat -dog", 10);
    assert_eq!(ids(&output), vec![1]);
}

#[test]
fn test_score_filter_query() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let (_, output) = run(&mut schema, "cat>0.3", 10);
    assert_eq!(ids(&output), vec![2, 1]);

    let (_, output) = run(&mut schema, "cat<0.3", 10);
    assert_eq!(ids(&output), vec![3]);
}

#[test]
fn test_inverted_ranking() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let (_, output) = run(&mut schema, "~cat", 10);
    assert_eq!(ids(&output), vec![3, 1, 2]);
}

#[test]
fn test_missing_term_is_empty_success() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let (emitted, output) = run(&mut schema, "cat elephant", 10);
    assert_eq!(emitted, 0);
    assert_eq!(output, "[]\n");

    let (emitted, output) = run(&mut schema, "", 10);
    assert_eq!(emitted, 0);
    assert_eq!(output, "[]\n");
}

#[test]
fn test_limit_is_clamped() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let (emitted, output) = run(&mut schema, "cat", 2);
    assert_eq!(emitted, 2);
    assert_eq!(ids(&output), vec![2, 1]);

    let (emitted, _) = run(&mut schema, "cat", 0);
    assert_eq!(emitted, 0);

    let (emitted, _) = run(&mut schema, "cat", usize::MAX);
    assert_eq!(emitted, 3);
}

#[test]
fn test_rank_offsets_matches_summary_order() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let ranked = rank_offsets(&mut schema, "cat dog", "words").unwrap();
    assert_eq!(ranked.len(), 2);
    assert!(ranked.as_slice()[0].score >= ranked.as_slice()[1].score);
    assert!(ranked.as_slice()[0].offset < ranked.as_slice()[1].offset);
}

#[test]
fn test_stale_index() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog");
    let mut schema = Schema::open(&catalog).unwrap();
    schema.create_table("words", index_descriptor()).unwrap();
    schema.create_table("summaries", summary_descriptor()).unwrap();

    let mut offsets = write_summaries(&catalog, 2);
    offsets.push(1 << 20);
    write_index(&catalog, &offsets, &[("cat", vec![(0, 0.1), (2, 0.9)])]);

    let mut out = Vec::new();
    match execute_query(&mut schema, "cat", "words", "summaries", 10, &mut out) {
        Err(ColstoreError::StaleIndex(msg)) => assert!(msg.contains(&(1u64 << 20).to_string())),
        other => panic!("Expected StaleIndex, got {other:?}"),
    }
}

#[test]
fn test_summary_table_schema_is_checked() {
    let dir = tempdir().unwrap();
    let mut schema = Schema::open(dir.path().join("catalog")).unwrap();
    schema.create_table("words", index_descriptor()).unwrap();

    let two_fields = TableDescriptor::new(
        "short.tbl",
        vec![
            Field::new("id", FieldType::Text).unwrap(),
            Field::new("summary", FieldType::Text).unwrap(),
        ],
    )
    .unwrap();
    schema.create_table("short", two_fields).unwrap();

    let wrong_time = TableDescriptor::new(
        "wrong.tbl",
        vec![
            Field::new("id", FieldType::Text).unwrap(),
            Field::new("published", FieldType::Int64).unwrap(),
            Field::new("summary", FieldType::Text).unwrap(),
        ],
    )
    .unwrap();
    schema.create_table("wrong", wrong_time).unwrap();

    let mut out = Vec::new();
    for summary in ["short", "wrong"] {
        let result = execute_query(&mut schema, "cat", "words", summary, 10, &mut out);
        assert!(matches!(result, Err(ColstoreError::InvalidSchema(_))));
    }
    assert!(out.is_empty());
}

#[test]
fn test_index_table_schema_is_checked() {
    let dir = tempdir().unwrap();
    let mut schema = Schema::open(dir.path().join("catalog")).unwrap();
    schema.create_table("summaries", summary_descriptor()).unwrap();

    let mut out = Vec::new();
    let result = execute_query(
        &mut schema,
        "cat",
        "summaries",
        "summaries",
        10,
        &mut out,
    );
    match result {
        Err(ColstoreError::InvalidSchema(msg)) => assert!(msg.contains("index table")),
        other => panic!("Expected InvalidSchema, got {other:?}"),
    }
}

#[test]
fn test_unknown_tables() {
    let dir = tempdir().unwrap();
    let mut schema = animal_catalog(dir.path());

    let mut out = Vec::new();
    match execute_query(&mut schema, "cat", "nope", "summaries", 10, &mut out) {
        Err(ColstoreError::TableNotFound(name)) => assert_eq!(name, "nope"),
        other => panic!("Expected TableNotFound, got {other:?}"),
    }
    match execute_query(&mut schema, "cat", "words", "nope", 10, &mut out) {
        Err(ColstoreError::TableNotFound(name)) => assert_eq!(name, "nope"),
        other => panic!("Expected TableNotFound, got {other:?}"),
    }
}
