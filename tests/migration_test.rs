// ABOUTME: Integration tests for the collection copier and migration runner
// ABOUTME: Drives full runs between in-memory stores, including injected failures

mod common;

use common::{docs_indexes, docs_rows, docs_schema, row_ids};
use milvus_cloud_migrator::filters::CollectionFilter;
use milvus_cloud_migrator::migration::{
    copy_collection, run_migration, CollectionStatus, MigrationOptions,
};
use milvus_cloud_migrator::store::{CollectionSchema, MemoryStore, VectorStore};

fn options(batch_size: usize) -> MigrationOptions {
    MigrationOptions {
        batch_size,
        ..Default::default()
    }
}

fn source_with_docs(rows: i64) -> MemoryStore {
    MemoryStore::new("source").with_collection(
        "docs",
        docs_schema(),
        docs_indexes(),
        docs_rows(0..rows),
    )
}

#[tokio::test]
async fn test_fresh_target_gets_identical_schema_and_all_rows() {
    let source = source_with_docs(2500);
    let target = MemoryStore::new("target");

    let report = run_migration(&source, &target, &options(1000)).await;

    assert_eq!(report.outcomes.len(), 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, CollectionStatus::Migrated);
    assert!(outcome.created);
    assert_eq!(outcome.source_rows, 2500);
    assert_eq!(outcome.rows_inserted, 2500);
    assert!(outcome.index_failures.is_empty());

    assert_eq!(target.schema("docs"), Some(docs_schema()));
    assert_eq!(target.indexes("docs"), docs_indexes());
    assert_eq!(row_ids(&target.rows("docs")), (0..2500).collect::<Vec<_>>());
    assert_eq!(target.insert_calls(), 3);
    assert_eq!(target.flush_calls(), 1);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_existing_target_collection_is_appended_to() {
    let source = source_with_docs(30);
    let target = MemoryStore::new("target").with_collection(
        "docs",
        docs_schema(),
        Vec::new(),
        docs_rows(1000..1005),
    );

    let report = run_migration(&source, &target, &options(1000)).await;
    let outcome = &report.outcomes[0];

    assert_eq!(outcome.status, CollectionStatus::Migrated);
    assert!(!outcome.created);
    assert_eq!(target.create_collection_calls(), 0);
    assert_eq!(target.create_index_calls(), 0);
    assert!(target.rows("docs").len() as u64 >= outcome.source_rows);
    assert_eq!(target.rows("docs").len(), 35);
}

#[tokio::test]
async fn test_rerun_duplicates_rows_on_non_empty_target() {
    // Append-only: a second run inserts every row again.
    let source = source_with_docs(10);
    let target = MemoryStore::new("target");

    run_migration(&source, &target, &options(4)).await;
    let second = run_migration(&source, &target, &options(4)).await;

    assert_eq!(second.outcomes[0].status, CollectionStatus::Migrated);
    assert!(!second.outcomes[0].created);

    let ids = row_ids(&target.rows("docs"));
    assert_eq!(ids.len(), 20);
    assert_eq!(ids.iter().filter(|id| **id == 7).count(), 2);
}

#[tokio::test]
async fn test_empty_collection_creates_schema_only() {
    let source = MemoryStore::new("source").with_collection(
        "empty",
        docs_schema(),
        docs_indexes(),
        Vec::new(),
    );
    let target = MemoryStore::new("target");

    let report = run_migration(&source, &target, &options(1000)).await;
    let outcome = &report.outcomes[0];

    assert_eq!(outcome.status, CollectionStatus::Migrated);
    assert!(outcome.created);
    assert_eq!(outcome.source_rows, 0);
    assert_eq!(target.schema("empty"), Some(docs_schema()));
    assert_eq!(target.indexes("empty").len(), 2);
    assert_eq!(target.insert_calls(), 0);
    assert_eq!(target.flush_calls(), 0);
}

#[tokio::test]
async fn test_no_source_collections_is_a_no_op() {
    let source = MemoryStore::new("source");
    let target = MemoryStore::new("target");

    let report = run_migration(&source, &target, &options(1000)).await;

    assert!(report.outcomes.is_empty());
    assert!(report.is_complete());
    assert_eq!(source.list_collections_calls(), 1);
    assert_eq!(target.create_collection_calls(), 0);
    assert_eq!(target.insert_calls(), 0);
}

#[tokio::test]
async fn test_unlistable_source_is_a_no_op() {
    let source = source_with_docs(5).fail_list_collections();
    let target = MemoryStore::new("target");

    let report = run_migration(&source, &target, &options(1000)).await;

    assert!(report.outcomes.is_empty());
    assert!(!target.has_collection("docs").await.unwrap());
}

#[tokio::test]
async fn test_index_failure_does_not_stop_creation_or_data() {
    let source = source_with_docs(50);
    let target = MemoryStore::new("target").fail_index_on("vector");

    let report = run_migration(&source, &target, &options(20)).await;
    let outcome = &report.outcomes[0];

    assert_eq!(outcome.status, CollectionStatus::Migrated);
    assert!(outcome.created);
    assert_eq!(outcome.index_failures.len(), 1);
    assert!(outcome.index_failures[0].contains("vector"));
    assert_eq!(outcome.rows_inserted, 50);
    assert_eq!(target.rows("docs").len(), 50);

    let copied: Vec<_> = target
        .indexes("docs")
        .into_iter()
        .map(|i| i.field_name)
        .collect();
    assert_eq!(copied, vec!["title"]);
}

#[tokio::test]
async fn test_unlistable_source_indexes_are_not_fatal() {
    let source = source_with_docs(5).fail_list_indexes();
    let target = MemoryStore::new("target");

    let outcome = copy_collection(&source, &target, "docs", &options(1000)).await;

    assert_eq!(outcome.status, CollectionStatus::Migrated);
    assert_eq!(outcome.index_failures.len(), 1);
    assert!(target.indexes("docs").is_empty());
    assert_eq!(target.rows("docs").len(), 5);
}

#[tokio::test]
async fn test_insert_failure_leaves_partial_and_continues() {
    let source = source_with_docs(2500).with_collection(
        "faq",
        docs_schema(),
        Vec::new(),
        Vec::new(),
    );
    let target = MemoryStore::new("target").fail_insert_after(1);

    let report = run_migration(&source, &target, &options(1000)).await;

    assert_eq!(report.outcomes.len(), 2);
    let docs = &report.outcomes[0];
    assert!(matches!(docs.status, CollectionStatus::Partial { .. }));
    assert_eq!(docs.rows_inserted, 1000);
    assert_eq!(target.rows("docs").len(), 1000);
    // the target is still flushed after a failed transfer
    assert_eq!(target.flush_calls(), 1);

    assert_eq!(report.outcomes[1].name, "faq");
    assert_eq!(report.outcomes[1].status, CollectionStatus::Migrated);
    assert_eq!(report.partial(), 1);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_flush_failure_marks_partial() {
    let source = source_with_docs(3);
    let target = MemoryStore::new("target").fail_flush();

    let outcome = copy_collection(&source, &target, "docs", &options(1000)).await;

    match &outcome.status {
        CollectionStatus::Partial { reason } => assert!(reason.contains("flush")),
        other => panic!("expected partial outcome, got {:?}", other),
    }
    assert_eq!(outcome.rows_inserted, 3);
}

#[tokio::test]
async fn test_schema_failure_skips_collection() {
    let source = source_with_docs(5)
        .with_collection("faq", docs_schema(), Vec::new(), docs_rows(0..2))
        .fail_describe("docs");
    let target = MemoryStore::new("target");

    let report = run_migration(&source, &target, &options(1000)).await;

    assert!(matches!(
        report.outcomes[0].status,
        CollectionStatus::Failed { .. }
    ));
    assert!(!target.has_collection("docs").await.unwrap());
    assert_eq!(report.outcomes[1].status, CollectionStatus::Migrated);
    assert_eq!(target.rows("faq").len(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.migrated(), 1);
}

#[tokio::test]
async fn test_load_failure_fails_collection() {
    let source = source_with_docs(5).fail_load("docs");
    let target = MemoryStore::new("target");

    let outcome = copy_collection(&source, &target, "docs", &options(1000)).await;

    match &outcome.status {
        CollectionStatus::Failed { reason } => assert!(reason.contains("load")),
        other => panic!("expected failed outcome, got {:?}", other),
    }
    assert_eq!(target.create_collection_calls(), 0);
}

#[tokio::test]
async fn test_create_failure_fails_collection() {
    let source = source_with_docs(5);
    let target = MemoryStore::new("target").fail_create("docs");

    let outcome = copy_collection(&source, &target, "docs", &options(1000)).await;

    assert!(matches!(outcome.status, CollectionStatus::Failed { .. }));
    assert_eq!(target.insert_calls(), 0);
}

#[tokio::test]
async fn test_filter_limits_collections() {
    let source = source_with_docs(5)
        .with_collection("faq", docs_schema(), Vec::new(), docs_rows(0..2))
        .with_collection("logs", CollectionSchema::default(), Vec::new(), Vec::new());
    let target = MemoryStore::new("target");
    let options = MigrationOptions {
        filter: CollectionFilter::new(Some(vec!["faq".to_string()]), None).unwrap(),
        ..Default::default()
    };

    let report = run_migration(&source, &target, &options).await;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].name, "faq");
    assert!(!target.has_collection("docs").await.unwrap());
}

#[tokio::test]
async fn test_page_size_controls_insert_calls() {
    let source = source_with_docs(3);
    let target = MemoryStore::new("target");

    let outcome = copy_collection(&source, &target, "docs", &options(1)).await;

    assert_eq!(outcome.rows_inserted, 3);
    assert_eq!(target.insert_calls(), 3);
}
