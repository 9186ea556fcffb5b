//! Audit reader tests
//!
//! The first group runs against a pool that cannot connect, so any test that
//! passes there proves the call failed before touching storage. The second
//! group requires a PostgreSQL database.
//! Run with: cargo test --test reader_tests -- --include-ignored

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use trail_core::{
    AccessScope, AuditError, AuditFilter, AuditQuery, AuditReader, AuditType, StaticIdentity,
};

mod helpers;

use helpers::{TestSchema, AUDITOR_ROLE};

fn offline_reader() -> AuditReader {
    let metadata = Arc::new(helpers::metadata(None));
    let registry = helpers::registry(&metadata);
    AuditReader::new(helpers::lazy_pool(), registry, metadata)
}

// ============================================================================
// Pre-storage failures
// ============================================================================

#[tokio::test]
async fn test_unknown_entity_is_not_auditable() {
    let reader = offline_reader();

    let result = reader.query_audits("Comment", &AuditQuery::new()).await;
    assert!(matches!(result, Err(AuditError::NotAuditable(entity)) if entity == "Comment"));
}

#[tokio::test]
async fn test_every_read_rejects_unaudited_entity() {
    let reader = offline_reader();

    assert!(matches!(
        reader.query_audits("Session", &AuditQuery::new()).await,
        Err(AuditError::NotAuditable(_))
    ));
    assert!(matches!(reader.count("Session", None).await, Err(AuditError::NotAuditable(_))));
    assert!(matches!(reader.query_one("Session", 1).await, Err(AuditError::NotAuditable(_))));
    assert!(matches!(
        reader
            .query_audits_with_associations("Session", &AuditQuery::new().object_id(1))
            .await,
        Err(AuditError::NotAuditable(_))
    ));
    assert!(matches!(
        reader.paginate("Session", None, 1, None).await,
        Err(AuditError::NotAuditable(_))
    ));
}

#[tokio::test]
async fn test_invalid_paging_rejected() {
    let reader = offline_reader();

    for (page, page_size) in [(0, 10), (1, 0), (-3, 10), (2, -1)] {
        let query = AuditQuery::new().page(page).page_size(page_size);
        let result = reader.query_audits("Author", &query).await;
        assert!(
            matches!(result, Err(AuditError::InvalidArgument(_))),
            "page={page} page_size={page_size}"
        );
    }

    assert!(matches!(
        reader.paginate("Author", None, 0, Some(10)).await,
        Err(AuditError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_associations_require_object_id() {
    let reader = offline_reader();

    let result = reader
        .query_audits_with_associations("Author", &AuditQuery::new())
        .await;
    assert!(matches!(result, Err(AuditError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_role_guarded_entity_denies_without_role() {
    let reader = offline_reader()
        .with_identity(Arc::new(StaticIdentity::user("7", "dana").with_role("ROLE_USER")));

    let result = reader.query_audits("Invoice", &AuditQuery::new()).await;
    assert!(matches!(
        result,
        Err(AuditError::AccessDenied { entity, scope: AccessScope::View }) if entity == "Invoice"
    ));
}

#[tokio::test]
async fn test_anonymous_caller_denied_on_guarded_entity() {
    let reader = offline_reader();
    assert!(matches!(
        reader.count("Invoice", None).await,
        Err(AuditError::AccessDenied { .. })
    ));
}

#[tokio::test]
async fn test_list_auditable_entities() {
    let reader = offline_reader();
    let entities = reader.list_auditable_entities();

    assert_eq!(
        entities.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Author", "Invoice", "Post"]
    );
    assert_eq!(entities["Author"], "author");
}

#[tokio::test]
async fn test_session_filter_is_per_reader() {
    let mut reader = offline_reader();
    reader.set_type_filter([AuditType::Insert, AuditType::Update]);
    reader.set_transaction_filter(Some("T1".to_string()));

    let other = reader.with_filter(AuditFilter::new());

    assert_eq!(reader.filter().types.len(), 2);
    assert_eq!(reader.filter().transaction_hash.as_deref(), Some("T1"));
    assert!(other.filter().is_empty());
}

// ============================================================================
// Database-backed reads
// ============================================================================

async fn reader_for(schema: &TestSchema) -> AuditReader {
    let metadata = Arc::new(schema.metadata());
    let registry = helpers::registry(&metadata);
    AuditReader::new(schema.pool.clone(), registry, metadata)
}

#[tokio::test]
#[ignore] // Requires database
async fn test_paginate_middle_page() {
    let schema = TestSchema::create().await;
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    for i in 0..25 {
        schema
            .insert_audit("author_audit", "update", "1", None, json!({}), base + Duration::seconds(i))
            .await;
    }

    let reader = reader_for(&schema).await;
    let pager = reader.paginate("Author", None, 2, Some(10)).await.unwrap();

    assert_eq!(pager.results.len(), 10);
    assert!(pager.has_previous_page);
    assert!(pager.has_next_page);
    assert_eq!(pager.num_pages, 3);
    assert!(pager.have_to_paginate);
    assert_eq!(pager.total_count, 25);
    assert_eq!(pager.results[0].created_at, base + Duration::seconds(14));

    schema.drop().await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_timestamp_ties_order_by_id_desc() {
    let schema = TestSchema::create().await;
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let first = schema.insert_audit("author_audit", "insert", "1", None, json!({}), at).await;
    let second = schema.insert_audit("author_audit", "update", "1", None, json!({}), at).await;
    let third = schema.insert_audit("author_audit", "update", "1", None, json!({}), at).await;

    let reader = reader_for(&schema).await;
    let query = AuditQuery::new().object_id(1);
    let records = reader.query_audits("Author", &query).await.unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![third, second, first]);

    let again = reader.query_audits("Author", &query).await.unwrap();
    assert_eq!(records, again);

    schema.drop().await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_type_and_transaction_filters_combine() {
    let schema = TestSchema::create().await;
    let at = Utc::now();
    for (audit_type, hash) in [
        ("insert", "T1"),
        ("update", "T1"),
        ("remove", "T1"),
        ("insert", "T2"),
        ("update", "T2"),
        ("remove", "T2"),
    ] {
        schema
            .insert_audit("author_audit", audit_type, "1", Some(hash), json!({}), at)
            .await;
    }

    let mut reader = reader_for(&schema).await;
    reader.set_type_filter([AuditType::Insert, AuditType::Update]);
    reader.set_transaction_filter(Some("T1".to_string()));

    let records = reader.query_audits("Author", &AuditQuery::new()).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.transaction_hash.as_deref() == Some("T1")));
    assert!(records.iter().all(|r| r.audit_type != AuditType::Remove));
    assert_eq!(reader.count("Author", Some("1")).await.unwrap(), 2);

    // A per-call hash overrides the session filter
    let query = AuditQuery::new().transaction_hash("T2");
    assert_eq!(reader.query_audits("Author", &query).await.unwrap().len(), 2);

    schema.drop().await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_query_one() {
    let schema = TestSchema::create().await;
    let id = schema
        .insert_audit("post_audit", "insert", "3", None, json!({"title": {"old": null, "new": "Hi"}}), Utc::now())
        .await;

    let reader = reader_for(&schema).await;
    let records = reader.query_one("Post", id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].new_value("title"), Some(&json!("Hi")));

    assert!(reader.query_one("Post", id + 100).await.unwrap().is_empty());

    schema.drop().await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_association_union_includes_related_rows() {
    let schema = TestSchema::create().await;
    schema
        .execute(&format!(
            "INSERT INTO {s}.author (id, name) VALUES (1, 'Ann'), (2, 'Bob');
             INSERT INTO {s}.post (id, title, author_id) VALUES (10, 'First', 1), (11, 'Other', 2);",
            s = schema.name
        ))
        .await;

    let at = Utc::now();
    let own = schema
        .insert_audit("author_audit", "update", "1", None, json!({}), at - Duration::seconds(3))
        .await;
    // Live row points at author 1
    let live = schema
        .insert_audit("post_audit", "update", "10", None, json!({}), at - Duration::seconds(2))
        .await;
    // Post 11 now belongs to author 2 but used to belong to author 1
    let moved = schema
        .insert_audit(
            "post_audit",
            "update",
            "11",
            None,
            json!({"author": {"old": {"id": "1"}, "new": {"id": "2"}}}),
            at - Duration::seconds(1),
        )
        .await;
    // Unrelated post change
    schema
        .insert_audit("post_audit", "update", "11", None, json!({}), at)
        .await;

    let reader = reader_for(&schema).await;
    let rows = reader
        .query_audits_with_associations("Author", &AuditQuery::new().object_id(1))
        .await
        .unwrap();

    let keys: Vec<(&str, i64)> = rows.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec![("Post", moved), ("Post", live), ("Author", own)]);

    let paged = reader
        .query_audits_with_associations("Author", &AuditQuery::new().object_id(1).page(2).page_size(2))
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].source_entity, "Author");

    schema.drop().await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_transaction_grouping_skips_denied_entities() {
    let schema = TestSchema::create().await;
    let at = Utc::now();
    schema.insert_audit("author_audit", "insert", "1", Some("TX"), json!({}), at).await;
    schema.insert_audit("post_audit", "insert", "5", Some("TX"), json!({}), at).await;
    schema.insert_audit("invoice_audit", "insert", "9", Some("TX"), json!({}), at).await;
    schema.insert_audit("post_audit", "insert", "6", Some("OTHER"), json!({}), at).await;

    let reader = reader_for(&schema).await;
    let grouped = reader.query_audits_by_transaction("TX").await.unwrap();
    assert_eq!(grouped.keys().map(String::as_str).collect::<Vec<_>>(), vec!["Author", "Post"]);
    assert_eq!(grouped["Post"].len(), 1);

    let auditor = reader.with_identity(Arc::new(StaticIdentity::user("1", "ida").with_role(AUDITOR_ROLE)));
    let grouped = auditor.query_audits_by_transaction("TX").await.unwrap();
    assert_eq!(
        grouped.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Author", "Invoice", "Post"]
    );

    schema.drop().await;
}
