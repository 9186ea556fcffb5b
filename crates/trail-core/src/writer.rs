//! Standard flush callback: one INSERT per staged record

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AuditResult;
use crate::flush::FlushCallback;
use crate::observer::StatementExecutor;
use crate::policy::IdentityProvider;
use crate::record::PendingAudit;
use crate::registry::EntityRegistry;
use crate::sql::{SqlBuilder, SqlParam, Statement};

/// Columns written on insert; `id` is assigned by the audit table
const INSERT_COLUMNS: &str =
    "type, object_id, discriminator, transaction_hash, diffs, blame_id, blame_user, created_at";

/// Writes staged records into their entity's audit table
#[derive(Clone)]
pub struct AuditWriter {
    registry: Arc<EntityRegistry>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl AuditWriter {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            registry,
            identity: None,
        }
    }

    /// Stamp blame from `identity` on records that carry none
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// INSERT statement for one record
    pub fn insert_statement(&self, audit: &PendingAudit) -> AuditResult<Statement> {
        let entry = self.registry.resolve(&audit.entity)?;
        let (blame_id, blame_user) = self.blame(audit);

        let mut sql = SqlBuilder::new();
        sql.push("INSERT INTO ")
            .push(&entry.audit_table.quoted())
            .push(" (")
            .push(INSERT_COLUMNS)
            .push(") VALUES (");

        let values = [
            SqlParam::Text(audit.audit_type.as_str().to_string()),
            SqlParam::Text(audit.object_id.clone()),
            SqlParam::OptionalText(audit.discriminator.clone()),
            SqlParam::OptionalText(audit.transaction_hash.clone()),
            SqlParam::Json(audit.diffs.clone()),
            SqlParam::OptionalText(blame_id),
            SqlParam::OptionalText(blame_user),
            SqlParam::Timestamp(audit.created_at),
        ];
        for (index, value) in values.into_iter().enumerate() {
            if index > 0 {
                sql.push(", ");
            }
            sql.push_bind(value);
        }
        sql.push(")");

        Ok(sql.build())
    }

    fn blame(&self, audit: &PendingAudit) -> (Option<String>, Option<String>) {
        if audit.blame_id.is_some() || audit.blame_user.is_some() {
            return (audit.blame_id.clone(), audit.blame_user.clone());
        }
        match self.identity.as_ref().and_then(|i| i.current_user()) {
            Some(user) => (Some(user.id), Some(user.username)),
            None => (None, None),
        }
    }
}

#[async_trait]
impl FlushCallback for AuditWriter {
    async fn flush(
        &self,
        executor: &mut dyn StatementExecutor,
        batch: Vec<PendingAudit>,
    ) -> AuditResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Build everything first so an unknown entity fails before any insert.
        let statements = batch
            .iter()
            .map(|audit| self.insert_statement(audit))
            .collect::<AuditResult<Vec<_>>>()?;

        for statement in &statements {
            executor.execute(statement).await?;
        }

        tracing::info!(records = statements.len(), "Audit records flushed");
        Ok(())
    }
}

impl std::fmt::Debug for AuditWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditWriter")
            .field("entities", &self.registry.len())
            .field("has_identity", &self.identity.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TableNaming;
    use crate::error::AuditError;
    use crate::metadata::{EntityDefinition, StaticMetadata};
    use crate::observer::tests::RecordingExecutor;
    use crate::policy::StaticIdentity;
    use serde_json::json;
    use trail_common::AuditType;

    fn writer() -> AuditWriter {
        let metadata = StaticMetadata::new([
            EntityDefinition::new("Author", "author").schema("blog"),
        ])
        .unwrap();
        let registry = EntityRegistry::build(&metadata, &TableNaming::default()).unwrap();
        AuditWriter::new(Arc::new(registry))
    }

    fn pending() -> PendingAudit {
        PendingAudit::builder("Author", AuditType::Update)
            .object_id(7)
            .transaction_hash("abc")
            .field("name", json!("Ann"), json!("Anna"))
            .build()
    }

    #[test]
    fn test_insert_statement() {
        let statement = writer().insert_statement(&pending()).unwrap();

        assert_eq!(
            statement.sql(),
            "INSERT INTO \"blog\".\"author_audit\" (type, object_id, discriminator, transaction_hash, \
             diffs, blame_id, blame_user, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );
        assert_eq!(statement.params()[0], SqlParam::Text("update".into()));
        assert_eq!(statement.params()[1], SqlParam::Text("7".into()));
        assert_eq!(statement.params()[3], SqlParam::OptionalText(Some("abc".into())));
        assert_eq!(statement.params()[5], SqlParam::OptionalText(None));
    }

    #[test]
    fn test_blame_from_identity() {
        let writer = writer().with_identity(Arc::new(StaticIdentity::user("42", "dana")));
        let statement = writer.insert_statement(&pending()).unwrap();

        assert_eq!(statement.params()[5], SqlParam::OptionalText(Some("42".into())));
        assert_eq!(statement.params()[6], SqlParam::OptionalText(Some("dana".into())));
    }

    #[test]
    fn test_explicit_blame_wins() {
        let writer = writer().with_identity(Arc::new(StaticIdentity::user("42", "dana")));
        let audit = PendingAudit::builder("Author", AuditType::Remove)
            .object_id(7)
            .blame("1", "system")
            .build();
        let statement = writer.insert_statement(&audit).unwrap();

        assert_eq!(statement.params()[6], SqlParam::OptionalText(Some("system".into())));
    }

    #[tokio::test]
    async fn test_unknown_entity_fails_whole_batch() {
        let stray = PendingAudit::builder("Comment", AuditType::Insert)
            .object_id(1)
            .build();

        let mut executor = RecordingExecutor::default();
        let result = writer().flush(&mut executor, vec![pending(), stray]).await;

        assert!(matches!(result, Err(AuditError::NotAuditable(entity)) if entity == "Comment"));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn test_flush_writes_in_order() {
        let second = PendingAudit::builder("Author", AuditType::Remove)
            .object_id(8)
            .build();

        let mut executor = RecordingExecutor::default();
        writer().flush(&mut executor, vec![pending(), second]).await.unwrap();

        assert_eq!(executor.statements.len(), 2);
        assert_eq!(executor.statements[1].params()[1], SqlParam::Text("8".into()));
    }
}
