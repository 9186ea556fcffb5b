//! Shared test helpers
//!
//! Database-backed tests each create a throwaway schema holding the live
//! tables and their audit tables, and drop it afterwards.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::sync::Arc;
use trail_core::{
    db, AccessScope, AssociationMapping, DatabaseConfig, EntityDefinition, EntityRegistry,
    StaticMetadata, TableNaming,
};
use uuid::Uuid;

pub const AUDITOR_ROLE: &str = "ROLE_AUDITOR";

/// Metadata used across tests
///
/// - `Author` owns `posts` through `post.author_id`
/// - `Post` is plain
/// - `Invoice` requires `ROLE_AUDITOR` to view
/// - `Session` is not audited
pub fn metadata(schema: Option<&str>) -> StaticMetadata {
    let with_schema = |definition: EntityDefinition| match schema {
        Some(schema) => definition.schema(schema),
        None => definition,
    };

    StaticMetadata::new([
        with_schema(EntityDefinition::new("Author", "author")).association(AssociationMapping {
            name: "posts".to_string(),
            target_type: "Post".to_string(),
            mapped_by: Some("author".to_string()),
            join_column: Some("author_id".to_string()),
        }),
        with_schema(EntityDefinition::new("Post", "post")),
        with_schema(EntityDefinition::new("Invoice", "invoice"))
            .require_role(AccessScope::View, AUDITOR_ROLE),
        with_schema(EntityDefinition::new("Session", "session")).auditable(false),
    ])
    .expect("Test metadata is valid")
}

pub fn registry(metadata: &StaticMetadata) -> Arc<EntityRegistry> {
    Arc::new(
        EntityRegistry::build(metadata, &TableNaming::default()).expect("Registry builds"),
    )
}

/// Pool that never connects unless a query is actually issued
pub fn lazy_pool() -> PgPool {
    let config = DatabaseConfig {
        url: "postgresql://127.0.0.1:1/trail_unreachable".to_string(),
        connect_timeout_secs: 1,
        ..DatabaseConfig::default()
    };
    db::create_lazy_pool(&config).expect("Lazy pool builds")
}

/// Helper to create a test database pool
pub async fn create_test_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/trail_test".to_string());

    PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database")
}

/// Throwaway schema with `author`, `post`, `invoice` and their audit tables
pub struct TestSchema {
    pub pool: PgPool,
    pub name: String,
}

impl TestSchema {
    pub async fn create() -> Self {
        let pool = create_test_pool().await;
        let name = format!("trail_test_{}", Uuid::new_v4().simple());

        let ddl = format!(
            r#"
            CREATE SCHEMA {s};
            CREATE TABLE {s}.author (id BIGINT PRIMARY KEY, name TEXT NOT NULL);
            CREATE TABLE {s}.post (
                id BIGINT PRIMARY KEY,
                title TEXT NOT NULL,
                author_id BIGINT REFERENCES {s}.author (id)
            );
            CREATE TABLE {s}.invoice (id BIGINT PRIMARY KEY, total BIGINT NOT NULL);
            {author_audit}
            {post_audit}
            {invoice_audit}
            "#,
            s = name,
            author_audit = audit_table_ddl(&name, "author_audit"),
            post_audit = audit_table_ddl(&name, "post_audit"),
            invoice_audit = audit_table_ddl(&name, "invoice_audit"),
        );

        sqlx::raw_sql(&ddl)
            .execute(&pool)
            .await
            .expect("Failed to create test schema");

        Self { pool, name }
    }

    pub fn metadata(&self) -> StaticMetadata {
        metadata(Some(self.name.as_str()))
    }

    pub async fn execute(&self, sql: &str) {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .expect("Failed to run test statement");
    }

    /// Insert one audit row directly
    pub async fn insert_audit(
        &self,
        table: &str,
        audit_type: &str,
        object_id: &str,
        transaction_hash: Option<&str>,
        diffs: JsonValue,
        created_at: DateTime<Utc>,
    ) -> i64 {
        sqlx::query_scalar(&format!(
            "INSERT INTO {}.{} (type, object_id, transaction_hash, diffs, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
            self.name, table
        ))
        .bind(audit_type)
        .bind(object_id)
        .bind(transaction_hash)
        .bind(diffs)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert audit row")
    }

    pub async fn count_rows(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}.{}", self.name, table))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count rows")
    }

    /// Helper to cleanup test data
    pub async fn drop(self) {
        let _ = sqlx::raw_sql(&format!("DROP SCHEMA {} CASCADE", self.name))
            .execute(&self.pool)
            .await;
    }
}

/// Minimal audit table layout
pub fn audit_table_ddl(schema: &str, table: &str) -> String {
    format!(
        r#"
        CREATE TABLE {schema}.{table} (
            id BIGSERIAL PRIMARY KEY,
            type TEXT NOT NULL,
            object_id TEXT NOT NULL,
            discriminator TEXT,
            transaction_hash TEXT,
            diffs JSONB NOT NULL DEFAULT '{{}}',
            blame_id TEXT,
            blame_user TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        "#
    )
}
